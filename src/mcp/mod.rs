pub mod client;
pub mod http_transport;
pub mod sse;
pub mod stdio_transport;
pub mod transport;

pub use client::{McpClient, McpTool};
