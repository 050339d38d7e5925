pub(crate) mod config;
pub(crate) mod link;
pub(crate) mod time;
