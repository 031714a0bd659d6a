//! Clients for the third-party HTTP APIs the cogs proxy.

pub mod jeyy;
pub mod radio_browser;
