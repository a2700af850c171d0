pub mod connection;
pub mod project_repo;
pub mod task_repo;
pub mod workspace_repo;
