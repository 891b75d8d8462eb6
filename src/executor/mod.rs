pub mod dispatcher;

pub use dispatcher::{ToolBackend, ToolInvoker};
