pub mod config;
pub mod interpret;
pub mod sanitize;
pub mod serve;
