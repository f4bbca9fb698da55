//! Utility functions shared by the stores and the CLI.
//!
//! - [`app_data`] - application data directory and configuration
//! - [`encoding`] - varints, segment headers and the bounds-checked record reader
//! - [`progress`] - progress bars, no-ops without the `progress` feature

pub mod app_data;
pub mod encoding;
pub mod progress;

pub use app_data::*;
pub use encoding::*;
