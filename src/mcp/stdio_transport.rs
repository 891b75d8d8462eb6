use async_trait::async_trait;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;

use crate::errors::{RentClawError, RentClawResult};
use crate::mcp::transport::McpTransport;

struct ServerProcess {
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    // Killed when dropped.
    _child: Child,
}

/// MCP over a spawned server process: one JSON message per line.
///
/// The process is started on the first message and restarted on the next
/// one after it closed its output. A server that cannot be started fails
/// each call with a transport error.
pub struct StdioTransport {
    pub command: String,
    pub args: Vec<String>,
    process: Mutex<Option<ServerProcess>>,
}

impl StdioTransport {
    pub fn new(command: &str, args: &[String]) -> Self {
        Self {
            command: command.to_string(),
            args: args.to_vec(),
            process: Mutex::new(None),
        }
    }

    fn spawn(&self) -> RentClawResult<ServerProcess> {
        let mut child = Command::new(&self.command)
            .args(&self.args)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                RentClawError::Transport(format!("could not start MCP server '{}': {e}", self.command))
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| RentClawError::Transport("server stdin unavailable".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| RentClawError::Transport("server stdout unavailable".into()))?;

        tracing::info!(command = %self.command, args = ?self.args, "MCP server process spawned");
        Ok(ServerProcess {
            stdin,
            stdout: BufReader::new(stdout),
            _child: child,
        })
    }

    async fn write_line(process: &mut ServerProcess, message: &Value) -> RentClawResult<()> {
        let mut line = serde_json::to_string(message)?;
        line.push('\n');
        process.stdin.write_all(line.as_bytes()).await?;
        process.stdin.flush().await?;
        Ok(())
    }

    async fn read_response(process: &mut ServerProcess, id: &Value) -> RentClawResult<Value> {
        let mut line = String::new();
        loop {
            line.clear();
            let read = process.stdout.read_line(&mut line).await?;
            if read == 0 {
                return Err(RentClawError::Transport("MCP server closed its output".into()));
            }
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<Value>(trimmed) {
                Ok(message) if message.get("id") == Some(id) => return Ok(message),
                Ok(_) => tracing::debug!("skipping unrelated MCP message"),
                Err(_) => tracing::debug!(line = %trimmed, "skipping non-JSON server output"),
            }
        }
    }
}

#[async_trait]
impl McpTransport for StdioTransport {
    #[tracing::instrument(skip(self, request), fields(command = %self.command, method = ?request.get("method")))]
    async fn request(&self, request: Value) -> RentClawResult<Value> {
        let id = request.get("id").cloned().unwrap_or(Value::Null);
        let mut slot = self.process.lock().await;
        if slot.is_none() {
            *slot = Some(self.spawn()?);
        }
        let Some(process) = slot.as_mut() else {
            return Err(RentClawError::Transport("MCP server not running".into()));
        };

        let result = match Self::write_line(process, &request).await {
            Ok(()) => Self::read_response(process, &id).await,
            Err(e) => Err(e),
        };
        if result.is_err() {
            // Start over with a fresh process next time.
            *slot = None;
        }
        result
    }

    async fn notify(&self, notification: Value) -> RentClawResult<()> {
        let mut slot = self.process.lock().await;
        if slot.is_none() {
            *slot = Some(self.spawn()?);
        }
        let Some(process) = slot.as_mut() else {
            return Err(RentClawError::Transport("MCP server not running".into()));
        };
        let result = Self::write_line(process, &notification).await;
        if result.is_err() {
            *slot = None;
        }
        result
    }
}
