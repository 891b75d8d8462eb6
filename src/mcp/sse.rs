use crate::errors::{RentClawError, RentClawResult};

/// Returns the payload of an SSE `data:` line.
/// Returns None if the line is a keep-alive, comment or non-data field.
pub fn parse_sse_line(line: &str) -> Option<&str> {
    if line.is_empty() || line.starts_with(':') {
        return None;
    }
    let data = line.strip_prefix("data:")?;
    Some(data.strip_prefix(' ').unwrap_or(data).trim_end())
}

/// Finds the JSON-RPC response with `id` in a `text/event-stream` body.
/// Multi-line `data:` fields of one event are joined before parsing.
pub fn find_response(body: &str, id: &serde_json::Value) -> RentClawResult<serde_json::Value> {
    let mut event_data = String::new();

    for line in body.lines().chain(std::iter::once("")) {
        let line = line.trim_end_matches('\r');
        if line.is_empty() {
            if !event_data.is_empty() {
                match serde_json::from_str::<serde_json::Value>(&event_data) {
                    Ok(message) if message.get("id") == Some(id) => return Ok(message),
                    Ok(_) => {}
                    Err(e) => tracing::debug!("SSE event skipped: {e}"),
                }
                event_data.clear();
            }
            continue;
        }
        if let Some(data) = parse_sse_line(line) {
            if !event_data.is_empty() {
                event_data.push('\n');
            }
            event_data.push_str(data);
        }
    }

    Err(RentClawError::Transport(
        "event stream ended without a response".into(),
    ))
}
