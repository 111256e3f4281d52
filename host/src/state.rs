use genui_runtime::protocol::{AgentEnvelope, HostEnvelope, ProtocolError, error_envelope};
use genui_runtime::{
    CapabilityRegistry, ChunkOutcome, EventHandler, InstanceId, OutlineHost, StreamChunk, UiEvent,
    UiHost, UiSession,
};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::mpsc::Sender;

pub struct HostState {
    sid: String,
    session: UiSession<OutlineHost>,
    host: OutlineHost,
    seq: u64,
    ids: HashMap<String, InstanceId>,
}

impl HostState {
    /// Every bound action is forwarded to `events`.
    pub fn new(
        sid: String,
        registry: Arc<CapabilityRegistry<OutlineHost>>,
        events: Sender<UiEvent>,
    ) -> Self {
        let mut session = UiSession::new(registry);
        session.actions_mut().set_fallback(EventHandler::Sink(events));

        Self {
            sid,
            session,
            host: OutlineHost::new(),
            seq: 0,
            ids: HashMap::new(),
        }
    }

    pub fn handle(&mut self, envelope: Result<AgentEnvelope, ProtocolError>) -> Vec<HostEnvelope> {
        let envelope = match envelope {
            Ok(envelope) => envelope,
            Err(err) => {
                tracing::warn!(error = %err, "undecodable envelope");
                return vec![self.error("decode_error", err.to_string())];
            }
        };

        if envelope.sid() != self.sid {
            tracing::warn!(expected = %self.sid, got = %envelope.sid(), "sid mismatch");
            let message = format!("expected sid {}, got {}", self.sid, envelope.sid());
            return vec![self.error("sid_mismatch", message)];
        }

        match envelope {
            AgentEnvelope::Start { .. } => {
                self.session.start_streaming();
                vec![self.progress()]
            }
            AgentEnvelope::Chunk { chunk, .. } => self.on_chunk(chunk),
            AgentEnvelope::Patch { ops, .. } => match self.session.apply_patch_updates(&ops) {
                Ok(skipped) => {
                    let skipped = skipped
                        .iter()
                        .map(|skip| format!("#{} {} {}: {}", skip.index, skip.op, skip.path, skip.error))
                        .collect();
                    self.render(skipped)
                }
                Err(err) => vec![self.error("patch_rejected", err.to_string())],
            },
            AgentEnvelope::Fire { id, event, data, .. } => self.fire(&id, &event, data),
            AgentEnvelope::Clear { .. } => {
                self.session.clear();
                let root = self.host.root();
                self.host.clear(root);
                self.ids.clear();
                vec![self.progress()]
            }
        }
    }

    fn on_chunk(&mut self, chunk: StreamChunk) -> Vec<HostEnvelope> {
        match self.session.handle_chunk(chunk) {
            Ok(ChunkOutcome::Accumulated) => vec![self.progress()],
            Ok(ChunkOutcome::Completed) => {
                let mut out = vec![self.progress()];
                out.extend(self.render(Vec::new()));
                out
            }
            Ok(ChunkOutcome::Failed) => {
                let message = self.session.stream().error().unwrap_or("stream failed").to_string();
                vec![self.progress(), self.error("stream_error", message)]
            }
            Ok(ChunkOutcome::Ignored | ChunkOutcome::Stale) => Vec::new(),
            Err(err) => vec![self.progress(), self.error("schema_rejected", err.to_string())],
        }
    }

    fn render(&mut self, skipped: Vec<String>) -> Vec<HostEnvelope> {
        let root = self.host.root();
        let result = match self.session.render_current_schema(&mut self.host, Some(root)) {
            Ok(result) => result,
            Err(err) => return vec![self.error("render_failed", err.to_string())],
        };

        self.ids = result
            .instances_by_id()
            .into_iter()
            .map(|(id, instance)| (id.to_string(), instance))
            .collect();
        let errors = result.errors();
        let diagnostics = result.all_diagnostics();

        self.seq += 1;
        tracing::info!(seq = self.seq, nodes = self.host.instance_count(), errors = errors.len(), "rendered");

        vec![HostEnvelope::Rendered {
            sid: self.sid.clone(),
            seq: self.seq,
            outline: self.host.outline(root),
            nodes: self.host.instance_count(),
            errors,
            diagnostics,
            skipped,
        }]
    }

    fn fire(&mut self, id: &str, event: &str, data: Value) -> Vec<HostEnvelope> {
        let Some(instance) = self.ids.get(id).copied() else {
            return vec![self.error("unknown_node", format!("no rendered node with id '{id}'"))];
        };

        if self.host.fire(instance, event, data) {
            Vec::new()
        } else {
            vec![self.error("unbound_event", format!("node '{id}' has no '{event}' listener"))]
        }
    }

    fn progress(&self) -> HostEnvelope {
        let stream = self.session.stream();
        HostEnvelope::Progress {
            sid: self.sid.clone(),
            state: stream.state(),
            progress: stream.progress(),
            chunks: stream.chunk_count(),
        }
    }

    fn error(&self, code: &str, message: String) -> HostEnvelope {
        error_envelope(self.sid.clone(), code, message)
    }
}
