pub mod config;
pub mod db;
pub mod ids;
pub mod project;
pub mod rbac;
pub mod task;
pub mod user;
pub mod workspace;
pub mod workspace_member;
