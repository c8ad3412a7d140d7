//! Incremental server-sent-events decoding.

use crate::routing::{Action, ChangeEvent, MappingRequest};
use crate::routing_api::TransportError;

/// One dispatched SSE message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseFrame {
    pub event: Option<String>,
    pub data: String,
}

/// Upper bound on bytes held for a frame that has not been dispatched yet.
pub const MAX_FRAME_LEN: usize = 1024 * 1024;

/// Accumulates body chunks and yields complete frames.
///
/// Lines may be split across chunks; a blank line dispatches the frame.
#[derive(Debug)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
    data_len: usize,
    max_frame_len: usize,
}

impl Default for SseDecoder {
    fn default() -> Self {
        Self::with_max_frame_len(MAX_FRAME_LEN)
    }
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_frame_len(max_frame_len: usize) -> Self {
        Self {
            buffer: Vec::new(),
            event: None,
            data: Vec::new(),
            data_len: 0,
            max_frame_len,
        }
    }

    /// Feed one body chunk. Fails once the undispatched frame outgrows the
    /// limit; the decoder is unusable afterwards.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<SseFrame>, TransportError> {
        self.buffer.extend_from_slice(chunk);

        let mut frames = Vec::new();
        while let Some(newline) = self.buffer.iter().position(|b| *b == b'\n') {
            let mut line: Vec<u8> = self.buffer.drain(..=newline).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            let line = String::from_utf8_lossy(&line);
            if let Some(frame) = self.process_line(&line) {
                frames.push(frame);
            }
        }

        let pending = self.buffer.len() + self.data_len;
        if pending > self.max_frame_len {
            return Err(TransportError::Stream(format!(
                "event frame exceeds {} bytes",
                self.max_frame_len
            )));
        }
        Ok(frames)
    }

    fn process_line(&mut self, line: &str) -> Option<SseFrame> {
        if line.is_empty() {
            if self.event.is_none() && self.data.is_empty() {
                return None;
            }
            self.data_len = 0;
            return Some(SseFrame {
                event: self.event.take(),
                data: std::mem::take(&mut self.data).join("\n"),
            });
        }

        // Comment / keep-alive
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => {
                self.data_len += value.len() + 1;
                self.data.push(value.to_string());
            }
            // id and retry carry nothing we act on
            _ => {}
        }
        None
    }
}

/// Map a frame to a change event. Frames of other event types yield `None`.
pub fn decode_change_event(frame: &SseFrame) -> Option<Result<ChangeEvent, TransportError>> {
    let action = match frame.event.as_deref() {
        Some(name) if name.eq_ignore_ascii_case("upsert") => Action::Upsert,
        Some(name) if name.eq_ignore_ascii_case("delete") => Action::Delete,
        _ => return None,
    };

    Some(
        serde_json::from_str::<MappingRequest>(&frame.data)
            .map(|mapping| ChangeEvent { action, mapping })
            .map_err(|e| TransportError::Decode(e.to_string())),
    )
}
