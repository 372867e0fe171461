//! Wallbox add-on status module
//!
//! Polls the wallbox add-on's status endpoint on its own schedule.

pub mod client;
pub mod types;

pub use client::WallboxClient;
pub use types::*;
