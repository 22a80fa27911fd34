pub mod cli;
pub mod common;
pub mod config;
pub mod history;
pub mod samples;
pub mod session;
pub mod shell;
pub mod store;
pub mod utils;
