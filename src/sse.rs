//! Server-sent-event parsing.
//!
//! [`SseParser`] is a pure line-oriented state machine; the iterator and
//! stream adapters feed it from a blocking or futures transport. Frames
//! decode either to bare payloads (plain streams) or to named [`Event`]s.

use crate::codec::Codec;
use crate::error::Error;
use crate::transport::{LineIter, LineStream};
use crate::{BoxStream, Result};
use futures::{stream, StreamExt};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

pub const DATA_PREFIX: &str = "data: ";
pub const EVENT_PREFIX: &str = "event: ";

/// Default end-of-stream sentinel.
pub const DEFAULT_SENTINEL: &str = "[DONE]";

/// One reconstructed logical frame: optional event name plus accumulated
/// data, bounded by blank separator lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    pub event: Option<String>,
    pub data: String,
}

/// The unit yielded by named-event streams.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub name: String,
    pub payload: Value,
}

/// What one input line did to the parser state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineStep {
    /// State absorbed the line; nothing to emit yet.
    Continue,
    /// A blank separator completed a frame that had seen data.
    Frame(SseFrame),
    /// The end-of-stream sentinel was reached; no frame is emitted.
    End,
}

/// Line-by-line SSE state machine. One parser per stream.
#[derive(Debug)]
pub struct SseParser {
    sentinel: String,
    event: Option<String>,
    data: String,
    has_data: bool,
    ended: bool,
}

impl SseParser {
    pub fn new(sentinel: impl Into<String>) -> Self {
        Self {
            sentinel: sentinel.into(),
            event: None,
            data: String::new(),
            has_data: false,
            ended: false,
        }
    }

    pub fn ended(&self) -> bool {
        self.ended
    }

    pub fn push_line(&mut self, line: &str) -> LineStep {
        if self.ended {
            return LineStep::End;
        }
        if line == self.sentinel {
            self.ended = true;
            return LineStep::End;
        }
        if let Some(content) = line.strip_prefix(DATA_PREFIX) {
            if self.has_data {
                self.data.push('\n');
            }
            self.data.push_str(content.trim());
            self.has_data = true;
            return LineStep::Continue;
        }
        if let Some(name) = line.strip_prefix(EVENT_PREFIX) {
            self.event = Some(name.trim().to_string());
            return LineStep::Continue;
        }
        if line.is_empty() {
            // Separator: dispatch if the frame saw data, then reset for the
            // next frame.
            let frame = if self.has_data {
                Some(SseFrame {
                    event: self.event.take(),
                    data: std::mem::take(&mut self.data),
                })
            } else {
                None
            };
            self.event = None;
            self.data.clear();
            self.has_data = false;
            return match frame {
                Some(frame) => LineStep::Frame(frame),
                None => LineStep::Continue,
            };
        }
        // Non-data field lines (id:, retry:, comments) are filtered out.
        LineStep::Continue
    }
}

/// Pull-based frame sequence over a blocking line iterator. Single-pass,
/// non-restartable.
pub struct FrameIter {
    lines: LineIter,
    parser: SseParser,
}

impl FrameIter {
    pub fn new(lines: LineIter, sentinel: impl Into<String>) -> Self {
        Self {
            lines,
            parser: SseParser::new(sentinel),
        }
    }
}

impl Iterator for FrameIter {
    type Item = Result<SseFrame>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.parser.ended() {
                return None;
            }
            match self.lines.next()? {
                Err(e) => return Some(Err(Error::Transport(e))),
                Ok(line) => match self.parser.push_line(&line) {
                    LineStep::Frame(frame) => return Some(Ok(frame)),
                    LineStep::End => return None,
                    LineStep::Continue => {}
                },
            }
        }
    }
}

/// Frame sequence over a futures line stream.
pub fn frame_stream(lines: LineStream, sentinel: impl Into<String>) -> BoxStream<'static, SseFrame> {
    let parser = SseParser::new(sentinel);
    let frames = stream::unfold((lines, parser), |(mut lines, mut parser)| async move {
        loop {
            if parser.ended() {
                return None;
            }
            match lines.next().await? {
                Err(e) => return Some((Err(Error::Transport(e)), (lines, parser))),
                Ok(line) => match parser.push_line(&line) {
                    LineStep::Frame(frame) => return Some((Ok(frame), (lines, parser))),
                    LineStep::End => return None,
                    LineStep::Continue => {}
                },
            }
        }
    });
    Box::pin(frames)
}

/// Lazy payload sequence for blocking plain streams.
pub type PayloadIter = Box<dyn Iterator<Item = Result<Value>> + Send>;

/// Lazy event sequence for blocking named-event streams.
pub type EventIter = Box<dyn Iterator<Item = Result<Event>> + Send>;

/// Plain-stream mode: every frame's data decodes to the declared element
/// type.
pub fn plain_payloads(frames: FrameIter, codec: Arc<dyn Codec>, element: String) -> PayloadIter {
    Box::new(frames.map(move |frame| {
        frame.and_then(|f| codec.decode(&f.data, &element).map_err(Error::from))
    }))
}

/// Named-event mode: the frame's event name selects the payload type;
/// frames with no name or an unmapped name are silently dropped.
pub fn named_events(
    frames: FrameIter,
    codec: Arc<dyn Codec>,
    events: HashMap<String, String>,
) -> EventIter {
    Box::new(frames.filter_map(move |frame| match frame {
        Err(e) => Some(Err(e)),
        Ok(f) => {
            let name = f.event.as_deref()?;
            let target = events.get(name)?;
            Some(
                codec
                    .decode(&f.data, target)
                    .map(|payload| Event {
                        name: name.to_string(),
                        payload,
                    })
                    .map_err(Error::from),
            )
        }
    }))
}

/// Plain-stream mode over a futures frame stream.
pub fn plain_payload_stream(
    frames: BoxStream<'static, SseFrame>,
    codec: Arc<dyn Codec>,
    element: String,
) -> BoxStream<'static, Value> {
    Box::pin(frames.map(move |frame| {
        frame.and_then(|f| codec.decode(&f.data, &element).map_err(Error::from))
    }))
}

/// Named-event mode over a futures frame stream.
pub fn named_event_stream(
    frames: BoxStream<'static, SseFrame>,
    codec: Arc<dyn Codec>,
    events: HashMap<String, String>,
) -> BoxStream<'static, Event> {
    Box::pin(frames.filter_map(move |frame| {
        let item = match frame {
            Err(e) => Some(Err(e)),
            Ok(f) => match f.event.as_deref().and_then(|name| {
                events.get(name).map(|target| (name.to_string(), target))
            }) {
                None => None,
                Some((name, target)) => Some(
                    codec
                        .decode(&f.data, target)
                        .map(|payload| Event { name, payload })
                        .map_err(Error::from),
                ),
            },
        };
        futures::future::ready(item)
    }))
}
