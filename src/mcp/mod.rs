//! Model Context Protocol (MCP) server handling and JSON-RPC implementations
//!
//! Provides protocol-level specifics surrounding JSON-RPC validation, negotiation, formatting, and routing.

pub mod rpc;
pub mod server;
