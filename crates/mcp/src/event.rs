//! Server-sent event decoding for the client side of the SSE transport.

use std::collections::VecDeque;

use futures::{Stream, StreamExt};

use crate::MAX_OUTPUT_SIZE;
use crate::error::Result;

/// One decoded server-sent event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    /// Event name; `message` when the server sent none.
    pub event: String,
    pub data: String,
    /// Full data size when the event outgrew the limit. `data` then holds
    /// only its leading bytes.
    pub oversized: Option<usize>,
}

impl SseEvent {
    fn new(event: Option<String>, data: String) -> Self {
        Self {
            event: event.unwrap_or_else(|| "message".to_string()),
            data,
            oversized: None,
        }
    }
}

/// Leading bytes kept from an oversized event.
const HEAD_LEN: usize = 256;

/// Incremental `text/event-stream` decoder.
///
/// Bytes are buffered until a full line is available, so chunks may split
/// lines (and UTF-8 sequences) anywhere. The size limit applies to each
/// event: data past it is dropped and the event is reported as oversized,
/// and decoding carries on with the next one.
#[derive(Debug)]
pub struct SseDecoder {
    buf: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
    limit: usize,
    /// Data bytes seen for the current event.
    size: usize,
    /// Head of the current event once it went over `limit`.
    overflow: Option<String>,
    /// Dropping the rest of an overlong line until its newline arrives.
    skipping: bool,
}

impl Default for SseDecoder {
    fn default() -> Self {
        Self::with_limit(MAX_OUTPUT_SIZE)
    }
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decoder with a custom per-event data limit.
    pub fn with_limit(limit: usize) -> Self {
        Self {
            buf: Vec::new(),
            event: None,
            data: Vec::new(),
            limit,
            size: 0,
            overflow: None,
            skipping: false,
        }
    }

    /// Feed a chunk and return every event it completed.
    pub fn feed(&mut self, mut chunk: &[u8]) -> Vec<SseEvent> {
        if self.skipping {
            match chunk.iter().position(|b| *b == b'\n') {
                Some(pos) => {
                    self.size += pos;
                    chunk = &chunk[pos + 1..];
                    self.skipping = false;
                }
                None => {
                    self.size += chunk.len();
                    return Vec::new();
                }
            }
        }
        self.buf.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(pos) = self.buf.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.buf.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim_end_matches(['\n', '\r']);
            if let Some(event) = self.process_line(line) {
                events.push(event);
            }
        }

        // A single unfinished line may not grow past the limit either.
        if self.buf.len() > self.limit {
            let raw = std::mem::take(&mut self.buf);
            let line = String::from_utf8_lossy(&raw);
            if let Some(value) = line.strip_prefix("data:") {
                let value = value.strip_prefix(' ').unwrap_or(value);
                self.size += value.len();
                self.start_overflow(value);
            }
            self.skipping = true;
        }
        events
    }

    fn process_line(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
            return self.dispatch();
        }
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
                self.size += value.len();
                if self.overflow.is_some() {
                    return None;
                }
                self.data.push(value.to_string());
                if self.size > self.limit {
                    let joined = std::mem::take(&mut self.data).join("\n");
                    self.start_overflow(&joined);
                }
            }
            _ => {}
        }
        None
    }

    /// Switch the current event to oversized, keeping the head of its data.
    fn start_overflow(&mut self, data: &str) {
        if self.overflow.is_some() {
            return;
        }
        let mut head = String::new();
        for line in self.data.drain(..) {
            head.push_str(&line);
            head.push('\n');
        }
        head.extend(data.chars().take(HEAD_LEN));
        self.overflow = Some(head.chars().take(HEAD_LEN).collect());
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        let event = self.event.take();
        let size = std::mem::take(&mut self.size);
        if let Some(head) = self.overflow.take() {
            return Some(SseEvent {
                oversized: Some(size),
                ..SseEvent::new(event, head)
            });
        }
        if self.data.is_empty() {
            return None;
        }
        let data = std::mem::take(&mut self.data).join("\n");
        Some(SseEvent::new(event, data))
    }
}

/// Pulls decoded events out of an HTTP body stream.
pub struct EventStream<S> {
    body: S,
    decoder: SseDecoder,
    ready: VecDeque<SseEvent>,
}

impl<S, B> EventStream<S>
where
    S: Stream<Item = reqwest::Result<B>> + Unpin,
    B: AsRef<[u8]>,
{
    pub fn new(body: S) -> Self {
        Self {
            body,
            decoder: SseDecoder::new(),
            ready: VecDeque::new(),
        }
    }

    /// Next event, or `None` once the body ends.
    pub async fn next_event(&mut self) -> Option<Result<SseEvent>> {
        loop {
            if let Some(event) = self.ready.pop_front() {
                return Some(Ok(event));
            }
            match self.body.next().await? {
                Ok(chunk) => self.ready.extend(self.decoder.feed(chunk.as_ref())),
                Err(e) => return Some(Err(e.into())),
            }
        }
    }
}
