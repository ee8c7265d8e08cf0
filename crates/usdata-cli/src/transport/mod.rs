//! Newline-delimited JSON-RPC 2.0 transport over stdio.

pub mod framing;
pub mod handler;
pub mod message;
pub mod stdio;

pub use handler::ProtocolHandler;
pub use stdio::StdioTransport;
