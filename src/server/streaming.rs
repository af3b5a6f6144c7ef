//! SSE (Server-Sent Events) pseudo-streaming.
//!
//! The upstream hands back one finished string. [`PseudoStream`] replays it as
//! the OpenAI streaming format: one `chat.completion.chunk` per fixed-size
//! slice, an empty-delta stop chunk, then the `[DONE]` sentinel.
//! [`into_sse`] paces those frames onto an axum SSE body.

use std::convert::Infallible;
use std::time::Duration;

use axum::response::sse::Event;
use futures::stream::{self, Stream, StreamExt};
use serde::Serialize;
use tracing::{debug, warn};

use crate::server::shaper::unix_now;

/// Sentinel payload closing every stream.
pub const DONE_SENTINEL: &str = "[DONE]";

/// Streaming chat completion chunk (OpenAI-compatible).
#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionChunk {
    pub id: String,
    pub object: String,
    pub created: u64,
    pub model: String,
    pub choices: Vec<ChunkChoice>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChunkChoice {
    pub index: usize,
    pub delta: ChunkDelta,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ChunkDelta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

/// One unit of output.
#[derive(Debug, Clone)]
pub enum StreamFrame {
    Chunk(ChatCompletionChunk),
    Done,
}

impl StreamFrame {
    /// Whether this frame carries a content slice (and is followed by a pause).
    pub fn is_content(&self) -> bool {
        matches!(
            self,
            StreamFrame::Chunk(chunk) if chunk.choices.iter().all(|c| c.finish_reason.is_none())
        )
    }

    /// Render as one SSE `data:` record.
    pub fn to_event(&self) -> Result<Event, axum::Error> {
        match self {
            StreamFrame::Chunk(chunk) => Event::default().json_data(chunk),
            StreamFrame::Done => Ok(Event::default().data(DONE_SENTINEL)),
        }
    }
}

/// Split `text` into slices of `size` characters; the last slice may be shorter.
pub fn partition(text: &str, size: usize) -> Vec<&str> {
    let size = size.max(1);
    let mut slices = Vec::new();
    let mut start = 0;
    let mut count = 0;
    for (offset, _) in text.char_indices() {
        if count == size {
            slices.push(&text[start..offset]);
            start = offset;
            count = 0;
        }
        count += 1;
    }
    if start < text.len() {
        slices.push(&text[start..]);
    }
    slices
}

#[derive(Debug)]
enum EmitState {
    Content,
    Finalize,
    Failed(String),
    Done,
    Closed,
}

/// Lazy, finite, non-restartable frame sequence for one request.
#[derive(Debug)]
pub struct PseudoStream {
    id: String,
    model: String,
    slices: std::vec::IntoIter<String>,
    state: EmitState,
}

impl PseudoStream {
    pub fn new(id: String, model: String, text: String, chunk_size: usize) -> Self {
        let slices: Vec<String> = partition(&text, chunk_size)
            .into_iter()
            .map(str::to_string)
            .collect();
        Self {
            id,
            model,
            slices: slices.into_iter(),
            state: EmitState::Content,
        }
    }

    /// Abandon the remaining content: the next frames are an in-band error
    /// chunk and the sentinel. No-op once the stream has finished.
    pub fn fail(&mut self, message: impl Into<String>) {
        if !matches!(self.state, EmitState::Done | EmitState::Closed) {
            self.state = EmitState::Failed(message.into());
        }
    }

    fn chunk(&self, delta: ChunkDelta, finish_reason: Option<&str>) -> ChatCompletionChunk {
        ChatCompletionChunk {
            id: self.id.clone(),
            object: "chat.completion.chunk".to_string(),
            created: unix_now(),
            model: self.model.clone(),
            choices: vec![ChunkChoice {
                index: 0,
                delta,
                finish_reason: finish_reason.map(str::to_string),
            }],
        }
    }

    fn stop(&mut self) -> Option<StreamFrame> {
        self.state = EmitState::Done;
        Some(StreamFrame::Chunk(self.chunk(ChunkDelta::default(), Some("stop"))))
    }
}

impl Iterator for PseudoStream {
    type Item = StreamFrame;

    fn next(&mut self) -> Option<StreamFrame> {
        match std::mem::replace(&mut self.state, EmitState::Closed) {
            EmitState::Content => match self.slices.next() {
                Some(slice) => {
                    self.state = if !self.slices.as_slice().is_empty() {
                        EmitState::Content
                    } else {
                        EmitState::Finalize
                    };
                    let delta = ChunkDelta {
                        content: Some(slice),
                    };
                    Some(StreamFrame::Chunk(self.chunk(delta, None)))
                }
                None => self.stop(),
            },
            EmitState::Finalize => self.stop(),
            EmitState::Failed(message) => {
                self.state = EmitState::Done;
                let delta = ChunkDelta {
                    content: Some(format!("\n\n[gateway error: {message}]")),
                };
                Some(StreamFrame::Chunk(self.chunk(delta, Some("stop"))))
            }
            EmitState::Done => Some(StreamFrame::Done),
            EmitState::Closed => None,
        }
    }
}

/// Drive a [`PseudoStream`] as SSE events, pausing `delay` after each content frame.
///
/// Dropping the returned stream (client disconnect) cancels at the next pause.
pub fn into_sse(
    emitter: PseudoStream,
    delay: Duration,
) -> impl Stream<Item = Result<Event, Infallible>> {
    paced(emitter, delay, StreamFrame::to_event).map(Ok::<_, Infallible>)
}

/// Pace `emitter` through `render`. A frame that fails to render moves the
/// emitter to its failed state, so the client still sees an error chunk and
/// the sentinel.
fn paced<T, E, R>(emitter: PseudoStream, delay: Duration, render: R) -> impl Stream<Item = T>
where
    R: Fn(&StreamFrame) -> Result<T, E>,
    E: std::fmt::Display,
{
    stream::unfold(
        (emitter, render, false),
        move |(mut emitter, render, pause)| async move {
            if pause && !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            loop {
                let frame = emitter.next()?;
                match render(&frame) {
                    Ok(item) => {
                        if matches!(frame, StreamFrame::Done) {
                            debug!(id = %emitter.id, "Pseudo-stream finished");
                        }
                        let pause = frame.is_content();
                        return Some((item, (emitter, render, pause)));
                    }
                    Err(e) => {
                        warn!(id = %emitter.id, error = %e, "Failed to render stream frame");
                        emitter.fail(e.to_string());
                    }
                }
            }
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contents(frames: &[StreamFrame]) -> Vec<Option<String>> {
        frames
            .iter()
            .map(|f| match f {
                StreamFrame::Chunk(c) => c.choices[0].delta.content.clone(),
                StreamFrame::Done => None,
            })
            .collect()
    }

    #[test]
    fn test_partition_hello_there() {
        assert_eq!(
            partition("hello there", 2),
            vec!["he", "ll", "o ", "th", "er", "e"]
        );
    }

    #[test]
    fn test_partition_multibyte() {
        assert_eq!(partition("你好世界!", 2), vec!["你好", "世界", "!"]);
        assert!(partition("", 3).is_empty());
    }

    #[test]
    fn test_partition_is_repeatable() {
        let text = "Pseudo-streaming replays a finished summary, 一段一段地.";
        for size in 1..6 {
            assert_eq!(partition(text, size), partition(text, size));
            let first: Vec<_> =
                PseudoStream::new("a".into(), "m".into(), text.into(), size).collect();
            let second: Vec<_> =
                PseudoStream::new("b".into(), "m".into(), text.into(), size).collect();
            assert_eq!(first.len(), second.len());
            assert_eq!(contents(&first), contents(&second));
        }
    }

    #[test]
    fn test_frames_follow_partition() {
        let frames: Vec<_> =
            PseudoStream::new("chatcmpl-1".into(), "m".into(), "hello there".into(), 2).collect();
        assert_eq!(frames.len(), 8);

        let deltas: Vec<_> = contents(&frames[..6]).into_iter().flatten().collect();
        assert_eq!(deltas, partition("hello there", 2));

        match &frames[6] {
            StreamFrame::Chunk(c) => {
                assert!(c.choices[0].delta.content.is_none());
                assert_eq!(c.choices[0].finish_reason.as_deref(), Some("stop"));
            }
            StreamFrame::Done => panic!("expected stop chunk"),
        }
        assert!(matches!(frames[7], StreamFrame::Done));
    }

    #[test]
    fn test_empty_text_emits_only_stop_and_done() {
        let frames: Vec<_> = PseudoStream::new("id".into(), "m".into(), String::new(), 2).collect();
        assert_eq!(frames.len(), 2);
        assert!(!frames[0].is_content());
        assert!(matches!(frames[1], StreamFrame::Done));
    }

    #[test]
    fn test_not_restartable() {
        let mut emitter = PseudoStream::new("id".into(), "m".into(), "ab".into(), 4);
        assert_eq!(emitter.by_ref().count(), 3);
        assert!(emitter.next().is_none());
    }

    #[test]
    fn test_fail_mid_stream() {
        let mut emitter = PseudoStream::new("id".into(), "m".into(), "abcdef".into(), 2);
        assert!(emitter.next().unwrap().is_content());
        emitter.fail("slice exploded");

        let rest: Vec<_> = emitter.collect();
        assert_eq!(rest.len(), 2);
        match &rest[0] {
            StreamFrame::Chunk(c) => {
                let content = c.choices[0].delta.content.as_deref().unwrap();
                assert!(content.contains("slice exploded"));
                assert_eq!(c.choices[0].finish_reason.as_deref(), Some("stop"));
            }
            StreamFrame::Done => panic!("expected error chunk"),
        }
        assert!(matches!(rest[1], StreamFrame::Done));
    }

    #[test]
    fn test_stop_chunk_serializes_empty_delta() {
        let mut emitter = PseudoStream::new("id".into(), "m".into(), String::new(), 2);
        let StreamFrame::Chunk(chunk) = emitter.next().unwrap() else {
            panic!("expected chunk");
        };
        let value = serde_json::to_value(&chunk).unwrap();
        assert_eq!(value["choices"][0]["delta"], serde_json::json!({}));
        assert_eq!(value["object"], "chat.completion.chunk");
    }

    #[tokio::test]
    async fn test_sse_adapter_yields_every_frame() {
        let emitter = PseudoStream::new("id".into(), "m".into(), "hello".into(), 2);
        let events: Vec<_> = into_sse(emitter, Duration::from_millis(1)).collect().await;
        // 3 slices + stop chunk + [DONE]
        assert_eq!(events.len(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_follows_each_content_slice() {
        let delay = Duration::from_millis(20);
        let emitter = PseudoStream::new("id".into(), "m".into(), "hello there".into(), 2);
        let mut events = std::pin::pin!(into_sse(emitter, delay));

        let start = tokio::time::Instant::now();
        let mut arrivals = Vec::new();
        while let Some(event) = events.next().await {
            assert!(event.is_ok());
            arrivals.push(start.elapsed());
        }

        // 6 slices + stop chunk + [DONE]
        assert_eq!(arrivals.len(), 8);
        assert!(arrivals[0] < delay);
        let gaps: Vec<_> = arrivals.windows(2).map(|w| w[1] - w[0]).collect();
        // A pause after every content slice, including the last one before stop.
        assert!(gaps[..6].iter().all(|gap| *gap >= delay));
        // None between the stop chunk and the sentinel.
        assert!(gaps[6] < delay);
        assert!(start.elapsed() < delay * 7);
    }

    #[tokio::test]
    async fn test_render_failure_becomes_error_chunk() {
        let emitter = PseudoStream::new("id".into(), "m".into(), "hello there".into(), 2);
        let render = |frame: &StreamFrame| match frame {
            StreamFrame::Chunk(c) if c.choices[0].delta.content.as_deref() == Some("ll") => {
                Err("cannot encode slice")
            }
            StreamFrame::Chunk(c) => Ok(c.choices[0].delta.content.clone().unwrap_or_default()),
            StreamFrame::Done => Ok(DONE_SENTINEL.to_string()),
        };

        let items: Vec<String> = paced(emitter, Duration::ZERO, render).collect().await;
        assert_eq!(
            items,
            vec![
                "he".to_string(),
                "\n\n[gateway error: cannot encode slice]".to_string(),
                DONE_SENTINEL.to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_failed_emitter_still_closes_sse() {
        let mut emitter = PseudoStream::new("id".into(), "m".into(), "abcdef".into(), 2);
        assert!(emitter.next().unwrap().is_content());
        emitter.fail("upstream went away");

        let events: Vec<_> = into_sse(emitter, Duration::from_millis(1)).collect().await;
        // error chunk + [DONE]
        assert_eq!(events.len(), 2);
    }
}
