// HTTP handlers module structure

pub mod auth_handlers;
pub(crate) mod health_handlers;
pub(crate) mod member_handlers;
pub(crate) mod project_handlers;
pub(crate) mod session_cookies;
pub(crate) mod task_handlers;
pub(crate) mod user_handlers;
pub(crate) mod workspace_handlers;
