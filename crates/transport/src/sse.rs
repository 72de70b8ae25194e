use std::collections::VecDeque;

use chunkferry_protocol::NotifyMessage;
use futures_util::stream::{self, BoxStream};
use futures_util::{Stream, StreamExt};

use crate::TransportError;

/// One dispatched `text/event-stream` event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    /// `event:` field, if the server set one.
    pub event: Option<String>,
    /// Joined `data:` lines.
    pub data: String,
    /// Last seen `id:` field.
    pub id: Option<String>,
}

impl SseEvent {
    /// Decodes `data` as a backend [`NotifyMessage`].
    pub fn notify_message(&self) -> Result<NotifyMessage, serde_json::Error> {
        NotifyMessage::from_event_data(&self.data)
    }
}

/// Incremental `text/event-stream` parser.
///
/// Feed it raw body chunks in any split; it returns events as their
/// terminating blank line arrives.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buf: Vec<u8>,
    event: Option<String>,
    data: String,
    has_data: bool,
    last_id: Option<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buf.extend_from_slice(chunk);
        let mut out = Vec::new();
        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = self.buf.drain(..=pos).collect();
            let text = String::from_utf8_lossy(&raw[..raw.len() - 1]);
            let line = text.strip_suffix('\r').unwrap_or(&text);
            if let Some(ev) = self.line(line) {
                out.push(ev);
            }
        }
        out
    }

    fn line(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((f, v)) => (f, v.strip_prefix(' ').unwrap_or(v)),
            None => (line, ""),
        };
        match field {
            "data" => {
                if self.has_data {
                    self.data.push('\n');
                }
                self.data.push_str(value);
                self.has_data = true;
            }
            "event" => self.event = Some(value.to_string()),
            "id" => self.last_id = Some(value.to_string()),
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        let event = self.event.take();
        if !self.has_data {
            return None;
        }
        self.has_data = false;
        Some(SseEvent {
            event,
            data: std::mem::take(&mut self.data),
            id: self.last_id.clone(),
        })
    }
}

/// Turns a body byte stream into a stream of events.
pub(crate) fn events<S, B>(bytes: S) -> BoxStream<'static, Result<SseEvent, TransportError>>
where
    S: Stream<Item = Result<B, reqwest::Error>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
{
    let state = (Box::pin(bytes), SseDecoder::new(), VecDeque::new());
    stream::unfold(state, |(mut bytes, mut decoder, mut ready)| async move {
        loop {
            if let Some(ev) = ready.pop_front() {
                return Some((Ok(ev), (bytes, decoder, ready)));
            }
            match bytes.next().await {
                Some(Ok(chunk)) => ready.extend(decoder.push(chunk.as_ref())),
                Some(Err(e)) => return Some((Err(TransportError::Network(e)), (bytes, decoder, ready))),
                None => return None,
            }
        }
    })
    .boxed()
}
