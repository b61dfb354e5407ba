//! Domain objects, parsing, and tool integrations
//!
//! Provides the web-search business logic exposed over the MCP protocol

pub mod tools;
pub mod utils;
