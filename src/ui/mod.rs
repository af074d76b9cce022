//! # User Interface
//!
//! Colored terminal output with clickable file links.

pub mod log;

pub use log::{debug, error, file_ingested, header, info, path_link, print_logo, success, timed, warn, Log};
