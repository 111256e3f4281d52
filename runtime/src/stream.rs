use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::{Duration, Instant};

/// Progress never reaches 100 before a `complete` chunk arrives.
const PARTIAL_PROGRESS_CAP: u8 = 90;
const BYTES_PER_PERCENT: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkKind {
    Partial,
    Complete,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamChunk {
    #[serde(rename = "type")]
    pub kind: ChunkKind,
    #[serde(default)]
    pub data: Value,
    #[serde(rename = "sequenceId", default, skip_serializing_if = "Option::is_none")]
    pub sequence_id: Option<u64>,
}

impl StreamChunk {
    pub fn partial(data: Value) -> Self {
        Self {
            kind: ChunkKind::Partial,
            data,
            sequence_id: None,
        }
    }

    pub fn complete(data: Value) -> Self {
        Self {
            kind: ChunkKind::Complete,
            data,
            sequence_id: None,
        }
    }

    pub fn error(data: Value) -> Self {
        Self {
            kind: ChunkKind::Error,
            data,
            sequence_id: None,
        }
    }

    pub fn with_sequence(mut self, sequence_id: u64) -> Self {
        self.sequence_id = Some(sequence_id);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamState {
    #[default]
    Idle,
    Streaming,
    Complete,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamOptions {
    /// Drop chunks whose `sequenceId` does not increase.
    pub enforce_sequence: bool,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            enforce_sequence: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkOutcome {
    Accumulated,
    Completed,
    Failed,
    /// The controller was not streaming.
    Ignored,
    Stale,
}

#[derive(Debug, Default)]
pub struct StreamController {
    options: StreamOptions,
    state: StreamState,
    chunks: Vec<StreamChunk>,
    accumulated_bytes: usize,
    progress: u8,
    last_sequence: Option<u64>,
    schema: Option<Value>,
    error: Option<String>,
    started_at: Option<Instant>,
}

impl StreamController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: StreamOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    /// Starts a new stream. Anything accumulated so far is discarded, even
    /// if the previous stream never finished.
    pub fn start_streaming(&mut self) {
        if self.state == StreamState::Streaming {
            tracing::debug!(
                discarded = self.chunks.len(),
                "restarting stream; dropping in-flight chunks"
            );
        }

        let options = self.options;
        *self = Self {
            options,
            state: StreamState::Streaming,
            started_at: Some(Instant::now()),
            ..Self::default()
        };
    }

    pub fn add_chunk(&mut self, chunk: StreamChunk) -> ChunkOutcome {
        if self.state != StreamState::Streaming {
            tracing::warn!(state = ?self.state, kind = ?chunk.kind, "ignoring chunk outside of a stream");
            return ChunkOutcome::Ignored;
        }

        if let Some(sequence_id) = chunk.sequence_id {
            if self.options.enforce_sequence
                && self.last_sequence.is_some_and(|last| sequence_id <= last)
            {
                tracing::warn!(
                    sequence_id,
                    last = self.last_sequence,
                    "dropping stale chunk"
                );
                return ChunkOutcome::Stale;
            }
            self.last_sequence = Some(sequence_id);
        }

        match chunk.kind {
            ChunkKind::Partial => {
                self.accumulated_bytes += serialized_len(&chunk.data);
                self.progress = partial_progress(self.accumulated_bytes);
                self.chunks.push(chunk);
                tracing::debug!(
                    chunks = self.chunks.len(),
                    bytes = self.accumulated_bytes,
                    progress = self.progress,
                    "accumulated partial chunk"
                );
                ChunkOutcome::Accumulated
            }
            ChunkKind::Complete => {
                self.schema = Some(chunk.data);
                self.state = StreamState::Complete;
                self.progress = 100;
                self.error = None;
                tracing::debug!(chunks = self.chunks.len(), "stream complete");
                ChunkOutcome::Completed
            }
            ChunkKind::Error => {
                let message = error_message(&chunk.data);
                tracing::warn!(%message, "stream failed");
                self.error = Some(message);
                self.state = StreamState::Error;
                ChunkOutcome::Failed
            }
        }
    }

    pub fn clear(&mut self) {
        let options = self.options;
        *self = Self::with_options(options);
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    pub fn is_streaming(&self) -> bool {
        self.state == StreamState::Streaming
    }

    pub fn progress(&self) -> u8 {
        self.progress
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn chunks(&self) -> &[StreamChunk] {
        &self.chunks
    }

    pub fn current_schema(&self) -> Option<&Value> {
        self.schema.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn started_at(&self) -> Option<Instant> {
        self.started_at
    }

    pub fn elapsed(&self) -> Option<Duration> {
        self.started_at.map(|started| started.elapsed())
    }
}

fn partial_progress(bytes: usize) -> u8 {
    let percent = (bytes / BYTES_PER_PERCENT).min(usize::from(PARTIAL_PROGRESS_CAP));
    u8::try_from(percent).unwrap_or(PARTIAL_PROGRESS_CAP)
}

fn serialized_len(value: &Value) -> usize {
    serde_json::to_vec(value).map(|bytes| bytes.len()).unwrap_or(0)
}

fn error_message(data: &Value) -> String {
    match data {
        Value::String(message) => message.clone(),
        Value::Null => "stream failed".to_string(),
        Value::Object(map) => match map.get("message").and_then(Value::as_str) {
            Some(message) => message.to_string(),
            None => data.to_string(),
        },
        other => other.to_string(),
    }
}
