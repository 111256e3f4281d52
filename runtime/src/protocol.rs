use crate::capability::Capability;
use crate::events::UiEvent;
use crate::patch::PatchOperation;
use crate::stream::{StreamChunk, StreamState};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io::{self, Read, Write};
use std::sync::mpsc::Receiver;

pub const HOST_TO_AGENT_CAP: usize = 1_048_576;
pub const AGENT_TO_HOST_CAP: usize = 1_048_576;

/// Every frame is a 4-byte big-endian payload length followed by JSON.
pub const TRANSPORT: &str = "stdio-packet-4";

const PREFIX_LEN: usize = 4;

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("transport failed: {0}")]
    Io(#[from] io::Error),
    #[error("envelope does not decode: {0}")]
    Json(#[from] serde_json::Error),
    #[error("frame of {len} bytes is over the {cap} byte cap")]
    Oversized { len: usize, cap: usize },
    #[error("input ended inside a frame")]
    Truncated,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum HostEnvelope {
    Ready {
        sid: String,
        transport: String,
        components: Vec<Capability>,
    },
    Progress {
        sid: String,
        state: StreamState,
        progress: u8,
        chunks: usize,
    },
    Rendered {
        sid: String,
        seq: u64,
        outline: String,
        nodes: usize,
        errors: Vec<String>,
        diagnostics: Vec<String>,
        skipped: Vec<String>,
    },
    Intent {
        sid: String,
        id: u64,
        event: UiEvent,
    },
    Error {
        sid: String,
        code: String,
        message: String,
    },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum AgentEnvelope {
    Start {
        sid: String,
    },
    Chunk {
        sid: String,
        chunk: StreamChunk,
    },
    Patch {
        sid: String,
        ops: Vec<PatchOperation>,
    },
    Fire {
        sid: String,
        id: String,
        event: String,
        #[serde(default)]
        data: Value,
    },
    Clear {
        sid: String,
    },
}

impl AgentEnvelope {
    pub fn sid(&self) -> &str {
        match self {
            Self::Start { sid }
            | Self::Chunk { sid, .. }
            | Self::Patch { sid, .. }
            | Self::Fire { sid, .. }
            | Self::Clear { sid } => sid,
        }
    }
}

pub fn ready_envelope(sid: String, components: Vec<Capability>) -> HostEnvelope {
    HostEnvelope::Ready {
        sid,
        transport: TRANSPORT.to_string(),
        components,
    }
}

pub fn intent_envelope(sid: String, id: u64, event: UiEvent) -> HostEnvelope {
    HostEnvelope::Intent { sid, id, event }
}

pub fn error_envelope(sid: String, code: impl Into<String>, message: impl Into<String>) -> HostEnvelope {
    HostEnvelope::Error {
        sid,
        code: code.into(),
        message: message.into(),
    }
}

pub fn writer_loop(rx: Receiver<HostEnvelope>, mut writer: impl Write) -> Result<(), ProtocolError> {
    for envelope in rx {
        writer.write_all(&encode_frame(&envelope)?)?;
        writer.flush()?;
    }

    Ok(())
}

/// Undecodable payloads are handed to `on_envelope`; a framing or transport
/// error ends the loop. End of input between frames is a clean stop.
pub fn reader_loop<F>(mut reader: impl Read, mut on_envelope: F) -> Result<(), ProtocolError>
where
    F: FnMut(Result<AgentEnvelope, ProtocolError>),
{
    while let Some(payload) = next_frame(&mut reader)? {
        on_envelope(decode_agent_envelope(&payload));
    }

    Ok(())
}

pub fn decode_agent_envelope(payload: &[u8]) -> Result<AgentEnvelope, ProtocolError> {
    Ok(serde_json::from_slice(payload)?)
}

pub fn encode_frame(envelope: &HostEnvelope) -> Result<Vec<u8>, ProtocolError> {
    let mut frame = vec![0_u8; PREFIX_LEN];
    serde_json::to_writer(&mut frame, envelope)?;

    let len = frame.len() - PREFIX_LEN;
    if len > HOST_TO_AGENT_CAP {
        return Err(ProtocolError::Oversized {
            len,
            cap: HOST_TO_AGENT_CAP,
        });
    }

    frame[..PREFIX_LEN].copy_from_slice(&(len as u32).to_be_bytes());
    Ok(frame)
}

fn next_frame(reader: &mut impl Read) -> Result<Option<Vec<u8>>, ProtocolError> {
    let mut prefix = [0_u8; PREFIX_LEN];
    let mut filled = 0;

    while filled < PREFIX_LEN {
        match reader.read(&mut prefix[filled..]) {
            Ok(0) if filled == 0 => return Ok(None),
            Ok(0) => return Err(ProtocolError::Truncated),
            Ok(read) => filled += read,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
            Err(err) => return Err(err.into()),
        }
    }

    let len = u32::from_be_bytes(prefix) as usize;
    if len > AGENT_TO_HOST_CAP {
        return Err(ProtocolError::Oversized {
            len,
            cap: AGENT_TO_HOST_CAP,
        });
    }

    let mut payload = vec![0_u8; len];
    reader.read_exact(&mut payload).map_err(|err| match err.kind() {
        io::ErrorKind::UnexpectedEof => ProtocolError::Truncated,
        _ => ProtocolError::Io(err),
    })?;

    Ok(Some(payload))
}
