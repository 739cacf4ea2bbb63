//! Small shared helpers.
pub mod devlog;
pub mod num;
pub mod time;
