pub mod db;
pub(crate) mod users;
