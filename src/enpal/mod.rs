//! Enpal device page module
//!
//! Fetches the local status page and turns its cards into typed sensor records.

pub mod calculated;
pub mod client;
pub mod normalize;
pub mod parser;
pub mod types;

pub use client::EnpalClient;
pub use types::*;
