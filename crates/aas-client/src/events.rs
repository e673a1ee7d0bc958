//! Server-sent event consumer for `/api/v1/events`.

use std::time::Duration;

use aas_core::api::EventSnapshot;
use futures_util::StreamExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::client::ApiClient;

/// Wait before reopening a dropped stream.
pub const RECONNECT_DELAY: Duration = Duration::from_secs(3);

pub const PARSE_ERROR: &str = "Failed to parse SSE data";
pub const CONNECTION_ERROR: &str = "SSE connection error";

/// Live state fed by the event stream.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventStreamState {
    /// Last snapshot that parsed.
    pub data: Option<EventSnapshot>,
    pub error: Option<String>,
    pub connected: bool,
}

impl EventStreamState {
    /// Apply one `data:` payload. A payload that does not parse sets the
    /// error flag and leaves the last snapshot in place.
    pub fn apply_payload(&mut self, payload: &str) {
        match serde_json::from_str::<EventSnapshot>(payload) {
            Ok(snapshot) => {
                self.data = Some(snapshot);
                self.error = None;
            }
            Err(e) => {
                debug!(error = %e, "Malformed event payload");
                self.error = Some(PARSE_ERROR.to_string());
            }
        }
    }
}

/// Incremental `text/event-stream` parser.
///
/// Only `data` fields are kept; comments, `event`, `id` and `retry` lines
/// are ignored.
#[derive(Debug, Default)]
pub struct SseParser {
    buffer: Vec<u8>,
    data: Vec<String>,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes; returns the data of every event completed by them.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);
        let mut events = Vec::new();

        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim_end_matches(['\n', '\r']);

            if line.is_empty() {
                if !self.data.is_empty() {
                    events.push(self.data.join("\n"));
                    self.data.clear();
                }
                continue;
            }
            if line.starts_with(':') {
                continue;
            }

            let (field, value) = match line.split_once(':') {
                Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
                None => (line, ""),
            };
            if field == "data" {
                self.data.push(value.to_string());
            }
        }
        events
    }
}

/// Handle of the background consumer. Dropping it closes the stream.
#[derive(Debug)]
pub struct EventStream {
    rx: watch::Receiver<EventStreamState>,
    handle: JoinHandle<()>,
}

impl EventStream {
    /// Open the stream in the background, reopening it `RECONNECT_DELAY`
    /// after every disconnect.
    pub fn connect(client: &ApiClient) -> Self {
        Self::connect_with_delay(client, RECONNECT_DELAY)
    }

    pub fn connect_with_delay(client: &ApiClient, reconnect_delay: Duration) -> Self {
        let (tx, rx) = watch::channel(EventStreamState::default());
        let client = client.clone();
        let handle = tokio::spawn(async move {
            loop {
                consume(&client, &tx).await;
                tx.send_modify(|s| {
                    s.connected = false;
                    s.error = Some(CONNECTION_ERROR.to_string());
                });
                if tx.is_closed() {
                    break;
                }
                tokio::time::sleep(reconnect_delay).await;
            }
        });
        Self { rx, handle }
    }

    pub fn latest(&self) -> EventStreamState {
        self.rx.borrow().clone()
    }

    /// Receiver notified on every state change.
    pub fn subscribe(&self) -> watch::Receiver<EventStreamState> {
        self.rx.clone()
    }

    pub fn close(&self) {
        self.handle.abort();
    }
}

impl Drop for EventStream {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Read one connection until it ends.
async fn consume(client: &ApiClient, tx: &watch::Sender<EventStreamState>) {
    let response = match client.open_events().await {
        Ok(response) => response,
        Err(e) => {
            warn!(error = %e, "Event stream connection failed");
            return;
        }
    };

    info!(url = %client.events_url(), "Event stream connected");
    tx.send_modify(|s| {
        s.connected = true;
        s.error = None;
    });

    let mut parser = SseParser::new();
    let mut body = response.bytes_stream();
    while let Some(chunk) = body.next().await {
        match chunk {
            Ok(bytes) => {
                for payload in parser.feed(&bytes) {
                    tx.send_modify(|s| s.apply_payload(&payload));
                }
            }
            Err(e) => {
                warn!(error = %e, "Event stream read failed");
                return;
            }
        }
    }
    debug!("Event stream ended");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parser_handles_split_chunks() {
        let mut parser = SseParser::new();
        assert!(parser.feed(b"data: {\"a\":").is_empty());
        assert!(parser.feed(b" 1}\n").is_empty());
        assert_eq!(parser.feed(b"\n"), vec!["{\"a\": 1}".to_string()]);
    }

    #[test]
    fn test_parser_ignores_comments_and_other_fields() {
        let mut parser = SseParser::new();
        let events = parser.feed(b":keep-alive\n\nevent: update\nid: 7\ndata:first\r\ndata: second\r\n\r\n");
        assert_eq!(events, vec!["first\nsecond".to_string()]);
    }

    #[test]
    fn test_parser_multiple_events_in_one_chunk() {
        let mut parser = SseParser::new();
        let events = parser.feed(b"data: 1\n\ndata: 2\n\ndata: 3");
        assert_eq!(events, vec!["1".to_string(), "2".to_string()]);
        assert_eq!(parser.feed(b"\n\n"), vec!["3".to_string()]);
    }

    #[test]
    fn test_malformed_payload_sets_error_and_keeps_data() {
        let mut state = EventStreamState {
            connected: true,
            ..EventStreamState::default()
        };
        state.apply_payload("not json");
        assert_eq!(state.error.as_deref(), Some(PARSE_ERROR));
        assert!(state.connected);
        assert!(state.data.is_none());
    }

    #[test]
    fn test_snapshot_missing_usage_cost_is_accepted() {
        let mut parser = SseParser::new();
        let frames = parser.feed(
            b"data: {\"timestamp\":\"t1\",\"devices\":{\"engraver\":{\"billing\":{\"energyConsumed\":0.2}},\"agv\":{}}}\n\n",
        );
        assert_eq!(frames.len(), 1);

        let mut state = EventStreamState::default();
        state.apply_payload(&frames[0]);
        assert!(state.error.is_none());
        let data = state.data.expect("snapshot decoded");
        assert_eq!(data.timestamp, "t1");
        assert_eq!(data.devices.engraver.billing.energy_consumed, 0.2);
        assert_eq!(data.devices.engraver.billing.usage_cost, 0.0);
    }
}
