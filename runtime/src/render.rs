use crate::events::{ActionTable, UiEvent};
use crate::host::{EventListener, UiHost};
use crate::node::{EventBinding, UiNode};
use crate::registry::{CapabilityRegistry, RegistryEntry};
use crate::validate::validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderOptions {
    pub validate_children: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            validate_children: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RenderError {
    #[error("node has no component type")]
    MissingType,
    #[error("no mount target to render into")]
    MissingMount,
    #[error("unknown component type '{0}'")]
    Unregistered(String),
    #[error("invalid '{kind}' node: {}", .errors.join("; "))]
    Invalid { kind: String, errors: Vec<String> },
    #[error("failed to instantiate '{kind}': {reason}")]
    Instantiate { kind: String, reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderResult<'a, Handle> {
    pub instance: Option<Handle>,
    pub node: &'a UiNode,
    pub error: Option<String>,
    pub children: Vec<RenderResult<'a, Handle>>,
    /// Non-fatal problems: unbindable props, unresolved actions, children
    /// dropped by a non-container.
    pub diagnostics: Vec<String>,
}

impl<'a, Handle: Copy> RenderResult<'a, Handle> {
    fn rendered(instance: Handle, node: &'a UiNode) -> Self {
        Self {
            instance: Some(instance),
            node,
            error: None,
            children: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    fn failed(node: &'a UiNode, error: &RenderError) -> Self {
        Self {
            instance: None,
            node,
            error: Some(error.to_string()),
            children: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    /// Errors anywhere in the subtree, prefixed with the result's pointer.
    pub fn errors(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect(&mut out, "", &|result: &Self| result.error.iter().cloned().collect());
        out
    }

    pub fn all_diagnostics(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect(&mut out, "", &|result: &Self| result.diagnostics.clone());
        out
    }

    fn collect(&self, out: &mut Vec<String>, pointer: &str, pick: &dyn Fn(&Self) -> Vec<String>) {
        let location = if pointer.is_empty() { "/" } else { pointer };
        out.extend(pick(self).into_iter().map(|message| format!("{location}: {message}")));
        for (index, child) in self.children.iter().enumerate() {
            child.collect(out, &format!("{pointer}/children/{index}"), pick);
        }
    }

    pub fn instances_by_id(&self) -> Vec<(&'a str, Handle)> {
        let mut out = Vec::new();
        self.collect_ids(&mut out);
        out
    }

    fn collect_ids(&self, out: &mut Vec<(&'a str, Handle)>) {
        if let (Some(id), Some(instance)) = (self.node.id.as_deref(), self.instance) {
            out.push((id, instance));
        }
        for child in &self.children {
            child.collect_ids(out);
        }
    }
}

pub struct TreeRenderer<'r, H: UiHost> {
    registry: &'r CapabilityRegistry<H>,
    actions: &'r ActionTable,
    options: RenderOptions,
}

impl<'r, H: UiHost> TreeRenderer<'r, H> {
    pub fn new(registry: &'r CapabilityRegistry<H>, actions: &'r ActionTable) -> Self {
        Self {
            registry,
            actions,
            options: RenderOptions::default(),
        }
    }

    pub fn with_options(mut self, options: RenderOptions) -> Self {
        self.options = options;
        self
    }

    /// Renders `node` into `mount`, replacing whatever was mounted there.
    /// The old instances are torn down only after the new root has been
    /// instantiated, so a root-level `Err` leaves them on screen. Failures
    /// below the root degrade into the result tree.
    pub fn render<'a>(
        &self,
        host: &mut H,
        node: &'a UiNode,
        mount: Option<H::Mount>,
    ) -> Result<RenderResult<'a, H::Handle>, RenderError> {
        let kind = node.kind().ok_or(RenderError::MissingType)?;
        let mount = mount.ok_or(RenderError::MissingMount)?;
        let entry = self
            .registry
            .get(kind)
            .ok_or_else(|| RenderError::Unregistered(kind.to_string()))?;

        let previous = host.mounted_instances(mount);
        let instance = self.instantiate(host, kind, entry, mount)?;
        for handle in previous {
            host.unmount(handle);
        }

        Ok(self.populate(host, node, kind, entry, instance))
    }

    fn render_child<'a>(
        &self,
        host: &mut H,
        node: &'a UiNode,
        mount: H::Mount,
    ) -> RenderResult<'a, H::Handle> {
        let outcome = self.resolve(node).and_then(|(kind, entry)| {
            let instance = self.instantiate(host, kind, entry, mount)?;
            Ok(self.populate(host, node, kind, entry, instance))
        });

        outcome.unwrap_or_else(|err| {
            tracing::warn!(error = %err, "child node failed to render");
            RenderResult::failed(node, &err)
        })
    }

    fn resolve<'a>(
        &self,
        node: &'a UiNode,
    ) -> Result<(&'a str, &'r RegistryEntry<H>), RenderError> {
        let kind = node.kind().ok_or(RenderError::MissingType)?;
        let entry = self
            .registry
            .get(kind)
            .ok_or_else(|| RenderError::Unregistered(kind.to_string()))?;

        if self.options.validate_children {
            let report = validate(self.registry, node);
            if !report.valid {
                return Err(RenderError::Invalid {
                    kind: kind.to_string(),
                    errors: report.errors,
                });
            }
        }

        Ok((kind, entry))
    }

    fn instantiate(
        &self,
        host: &mut H,
        kind: &str,
        entry: &RegistryEntry<H>,
        mount: H::Mount,
    ) -> Result<H::Handle, RenderError> {
        (entry.factory)(&mut *host, mount).map_err(|reason| RenderError::Instantiate {
            kind: kind.to_string(),
            reason,
        })
    }

    fn populate<'a>(
        &self,
        host: &mut H,
        node: &'a UiNode,
        kind: &str,
        entry: &RegistryEntry<H>,
        instance: H::Handle,
    ) -> RenderResult<'a, H::Handle> {
        let mut result = RenderResult::rendered(instance, node);

        for (name, value) in &node.props {
            let bound = host
                .set_input(instance, name, value)
                .unwrap_or_else(|| host.set_prop(instance, name, value));
            if let Err(reason) = bound {
                result
                    .diagnostics
                    .push(format!("prop '{name}' could not be set: {reason}"));
            }
        }

        for (event, binding) in &node.events {
            if !entry.capability.declares_event(event) {
                result
                    .diagnostics
                    .push(format!("'{kind}' does not declare event '{event}'"));
            }

            let Some(listener) = self.listener(node, kind, event, binding) else {
                result.diagnostics.push(format!(
                    "no handler for action '{}' bound to '{event}'",
                    binding.action
                ));
                continue;
            };

            if let Err(reason) = host.subscribe(instance, event, listener) {
                result
                    .diagnostics
                    .push(format!("event '{event}' could not be bound: {reason}"));
            }
        }

        host.refresh(instance);

        if !node.children.is_empty() {
            let capability = &entry.capability;
            let child_mount = if capability.is_container {
                host.child_mount(instance, capability.content_host.as_deref())
            } else {
                None
            };

            match child_mount {
                Some(child_mount) => {
                    for child in &node.children {
                        let child_result = self.render_child(host, child, child_mount);
                        result.children.push(child_result);
                    }
                }
                None => {
                    let message = format!(
                        "'{kind}' has no child mount point; {} child node(s) not rendered",
                        node.children.len()
                    );
                    tracing::warn!(%kind, children = node.children.len(), "children dropped by non-container");
                    result.diagnostics.push(message);
                }
            }
        }

        host.refresh(instance);

        for diagnostic in &result.diagnostics {
            tracing::debug!(%kind, %diagnostic, "render diagnostic");
        }

        result
    }

    fn listener(
        &self,
        node: &UiNode,
        kind: &str,
        event: &str,
        binding: &EventBinding,
    ) -> Option<EventListener> {
        let handler = self.actions.resolve(&binding.action)?.clone();
        let node_id = node.id.clone();
        let node_type = kind.to_string();
        let event = event.to_string();
        let action = binding.action.clone();
        let payload = binding.payload.clone();

        Some(Box::new(move |data| {
            handler.dispatch(UiEvent {
                node_id: node_id.clone(),
                node_type: node_type.clone(),
                event: event.clone(),
                action: action.clone(),
                payload: payload.clone(),
                data,
            });
        }))
    }
}
