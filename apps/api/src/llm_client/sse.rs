//! Incremental decoder for the Messages API server-sent event stream.
//!
//! Bytes arrive in arbitrary chunks; only complete lines are interpreted, so a
//! UTF-8 sequence or JSON payload split across chunks is reassembled first.

use serde::Deserialize;

#[derive(Debug, Clone, PartialEq)]
pub enum StreamItem {
    Text(String),
    Error(String),
    Stop,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ApiEvent {
    ContentBlockDelta { delta: Delta },
    MessageStop,
    Error { error: ApiErrorBody },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Delta {
    TextDelta { text: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds a chunk and returns the items completed by it, in arrival order.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<StreamItem> {
        self.buffer.extend_from_slice(chunk);

        let mut items = Vec::new();
        while let Some(newline) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=newline).collect();
            let line = String::from_utf8_lossy(&line);
            if let Some(item) = parse_line(line.trim_end_matches(['\r', '\n'])) {
                items.push(item);
            }
        }
        items
    }
}

fn parse_line(line: &str) -> Option<StreamItem> {
    let payload = line.strip_prefix("data:")?.trim_start();
    if payload.is_empty() {
        return None;
    }

    match serde_json::from_str::<ApiEvent>(payload) {
        Ok(ApiEvent::ContentBlockDelta {
            delta: Delta::TextDelta { text },
        }) => Some(StreamItem::Text(text)),
        Ok(ApiEvent::MessageStop) => Some(StreamItem::Stop),
        Ok(ApiEvent::Error { error }) => Some(StreamItem::Error(error.message)),
        Ok(_) => None,
        Err(e) => {
            tracing::debug!("Skipping undecodable stream line: {e}");
            None
        }
    }
}
