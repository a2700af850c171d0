pub(crate) mod access;
pub(crate) mod members;
pub(crate) mod service;
