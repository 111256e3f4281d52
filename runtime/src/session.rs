use crate::capability::Capability;
use crate::events::{ActionTable, EventHandler};
use crate::host::UiHost;
use crate::node::UiNode;
use crate::normalize::{NormalizeError, normalize};
use crate::patch::{PatchError, PatchOperation, SkippedOperation, apply_patch};
use crate::registry::CapabilityRegistry;
use crate::render::{RenderError, RenderOptions, RenderResult, TreeRenderer};
use crate::stream::{ChunkOutcome, StreamChunk, StreamController, StreamOptions};
use crate::validate::validate;
use serde_json::Value;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Malformed(#[from] NormalizeError),
    #[error("schema failed validation: {}", .0.join("; "))]
    Invalid(Vec<String>),
    #[error("no schema is loaded")]
    NoSchema,
    #[error(transparent)]
    Patch(#[from] PatchError),
    #[error(transparent)]
    Render(#[from] RenderError),
}

pub struct UiSession<H: UiHost> {
    registry: Arc<CapabilityRegistry<H>>,
    actions: ActionTable,
    render_options: RenderOptions,
    stream: StreamController,
    schema: Option<UiNode>,
    error: Option<String>,
}

impl<H: UiHost> UiSession<H> {
    pub fn new(registry: Arc<CapabilityRegistry<H>>) -> Self {
        Self {
            registry,
            actions: ActionTable::new(),
            render_options: RenderOptions::default(),
            stream: StreamController::new(),
            schema: None,
            error: None,
        }
    }

    pub fn with_render_options(mut self, options: RenderOptions) -> Self {
        self.render_options = options;
        self
    }

    pub fn with_stream_options(mut self, options: StreamOptions) -> Self {
        self.stream = StreamController::with_options(options);
        self
    }

    pub fn on_action(&mut self, action: impl Into<String>, handler: EventHandler) -> &mut Self {
        self.actions.on(action, handler);
        self
    }

    pub fn actions_mut(&mut self) -> &mut ActionTable {
        &mut self.actions
    }

    pub fn registry(&self) -> &CapabilityRegistry<H> {
        &self.registry
    }

    /// Normalizes and validates `raw`, then makes it the current tree. On
    /// failure the previous tree stays current.
    pub fn load_schema(&mut self, raw: &Value) -> Result<&UiNode, SessionError> {
        let candidate = normalize(raw).map_err(SessionError::from);
        let accepted = candidate.and_then(|node| self.check(node));
        let node = self.record(accepted)?;

        tracing::debug!(
            kind = node.kind().unwrap_or_default(),
            nodes = node.node_count(),
            "schema loaded"
        );
        let node: &UiNode = self.schema.insert(node);
        Ok(node)
    }

    /// Applies `operations` to the current tree. Operations that fail are
    /// skipped and returned; the rest still apply.
    pub fn apply_patch_updates(
        &mut self,
        operations: &[PatchOperation],
    ) -> Result<Vec<SkippedOperation>, SessionError> {
        let Some(current) = &self.schema else {
            return self.record(Err(SessionError::NoSchema));
        };

        let patched = apply_patch(current, operations).map_err(SessionError::from);
        let outcome = patched.and_then(|outcome| {
            let tree = self.check(outcome.tree)?;
            Ok((tree, outcome.applied, outcome.skipped))
        });
        let (tree, applied, skipped) = self.record(outcome)?;

        tracing::debug!(applied, skipped = skipped.len(), "patch updates applied");
        self.schema = Some(tree);
        Ok(skipped)
    }

    pub fn current_schema(&self) -> Option<&UiNode> {
        self.schema.as_ref()
    }

    pub fn clear_schema(&mut self) {
        self.schema = None;
        self.error = None;
    }

    /// Renders the current tree into `mount`, replacing what was there.
    pub fn render_current_schema<'a>(
        &'a self,
        host: &mut H,
        mount: Option<H::Mount>,
    ) -> Result<RenderResult<'a, H::Handle>, SessionError> {
        let schema = self.schema.as_ref().ok_or(SessionError::NoSchema)?;
        let renderer =
            TreeRenderer::new(&self.registry, &self.actions).with_options(self.render_options);
        Ok(renderer.render(host, schema, mount)?)
    }

    pub fn available_component_types(&self) -> Vec<String> {
        self.registry.registered_types()
    }

    pub fn component_capability(&self, kind: &str) -> Option<&Capability> {
        self.registry.get_capability(kind)
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn start_streaming(&mut self) {
        self.stream.start_streaming();
    }

    /// Feeds a chunk to the stream. A `complete` chunk is loaded as the new
    /// schema; if that load fails the error is returned and the stream still
    /// counts as complete.
    pub fn handle_chunk(&mut self, chunk: StreamChunk) -> Result<ChunkOutcome, SessionError> {
        let outcome = self.stream.add_chunk(chunk);

        if outcome == ChunkOutcome::Completed {
            if let Some(raw) = self.stream.current_schema().cloned() {
                self.load_schema(&raw)?;
            }
        }

        Ok(outcome)
    }

    pub fn stream(&self) -> &StreamController {
        &self.stream
    }

    pub fn clear(&mut self) {
        self.clear_schema();
        self.stream.clear();
    }

    fn check(&self, node: UiNode) -> Result<UiNode, SessionError> {
        let report = validate(self.registry.as_ref(), &node);
        if report.valid {
            Ok(node)
        } else {
            Err(SessionError::Invalid(report.errors))
        }
    }

    fn record<T>(&mut self, result: Result<T, SessionError>) -> Result<T, SessionError> {
        match &result {
            Ok(_) => self.error = None,
            Err(err) => {
                tracing::warn!(error = %err, "keeping previous schema");
                self.error = Some(err.to_string());
            }
        }
        result
    }
}

impl<H: UiHost> std::fmt::Debug for UiSession<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UiSession")
            .field("schema", &self.schema)
            .field("error", &self.error)
            .field("stream", &self.stream)
            .finish_non_exhaustive()
    }
}
