//! Stateless helpers shared by the store, the session and the shell.

pub mod form;
pub mod format;
pub mod images;
pub mod timing;

pub use format::{format_date, format_file_size, generate_id, validate_password};
