//! Service implementations
//!
//! This module contains real implementations of all service traits.
//! These are the production implementations that handle actual I/O operations.

pub mod downloader;
pub mod file_system;
pub mod http_client;
pub mod process_output;
pub mod process_supervisor;

#[cfg(test)]
mod tests;

// Re-export all service implementations
pub use downloader::RealDownloader;
pub use file_system::RealFileSystem;
pub use http_client::RealHttpClient;
pub use process_output::{OutputLine, OutputStream};
pub use process_supervisor::ProcessSupervisor;
