use crate::host::{EventListener, Factory, UiHost};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::fmt::Write as _;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstanceId(pub(crate) usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MountId(pub(crate) usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropSetter {
    Input,
    Prop,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutlineInstance {
    pub kind: String,
    pub mount: MountId,
    pub props: Map<String, Value>,
    /// Every prop write, in order, with the setter that performed it.
    pub writes: Vec<(String, PropSetter)>,
    pub events: Vec<String>,
    pub refreshes: u32,
    pub content: Option<(String, MountId)>,
}

pub struct OutlineHost {
    instances: HashMap<InstanceId, OutlineInstance>,
    mounts: HashMap<MountId, Vec<InstanceId>>,
    listeners: HashMap<(InstanceId, String), EventListener>,
    inputs: HashSet<String>,
    next_instance: usize,
    next_mount: usize,
}

impl OutlineHost {
    pub fn new() -> Self {
        let mut mounts = HashMap::new();
        mounts.insert(MountId(0), Vec::new());

        Self {
            instances: HashMap::new(),
            mounts,
            listeners: HashMap::new(),
            inputs: HashSet::new(),
            next_instance: 0,
            next_mount: 1,
        }
    }

    /// A host whose instances expose reactive inputs for `names`.
    pub fn with_inputs<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            inputs: names.into_iter().map(Into::into).collect(),
            ..Self::new()
        }
    }

    pub fn root(&self) -> MountId {
        MountId(0)
    }

    pub fn factory(kind: impl Into<String>) -> Factory<Self> {
        let kind = kind.into();
        Arc::new(move |host: &mut OutlineHost, mount| host.instantiate(&kind, mount))
    }

    pub fn instantiate(&mut self, kind: &str, mount: MountId) -> Result<InstanceId, String> {
        let Some(siblings) = self.mounts.get_mut(&mount) else {
            return Err(format!("mount {mount:?} does not exist"));
        };

        let id = InstanceId(self.next_instance);
        self.next_instance += 1;
        siblings.push(id);
        self.instances.insert(
            id,
            OutlineInstance {
                kind: kind.to_string(),
                mount,
                props: Map::new(),
                writes: Vec::new(),
                events: Vec::new(),
                refreshes: 0,
                content: None,
            },
        );
        Ok(id)
    }

    pub fn instance(&self, id: InstanceId) -> Option<&OutlineInstance> {
        self.instances.get(&id)
    }

    pub fn mounted(&self, mount: MountId) -> &[InstanceId] {
        self.mounts.get(&mount).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    /// Fires `event` on an instance. Returns false when nothing listens.
    pub fn fire(&self, id: InstanceId, event: &str, data: Value) -> bool {
        match self.listeners.get(&(id, event.to_string())) {
            Some(listener) => {
                listener(data);
                true
            }
            None => false,
        }
    }

    /// Indented outline of everything mounted under `mount`, one instance
    /// per line: `kind key=value ...`.
    pub fn outline(&self, mount: MountId) -> String {
        let mut out = String::new();
        self.write_mount(&mut out, mount, 0);
        out
    }

    fn write_mount(&self, out: &mut String, mount: MountId, depth: usize) {
        for id in self.mounted(mount) {
            let Some(instance) = self.instances.get(id) else {
                continue;
            };

            let _ = write!(out, "{:indent$}{}", "", instance.kind, indent = depth * 2);
            for (name, value) in &instance.props {
                let _ = write!(out, " {name}={value}");
            }
            out.push('\n');

            if let Some((_, content)) = instance.content {
                self.write_mount(out, content, depth + 1);
            }
        }
    }

    fn drop_instance(&mut self, id: InstanceId) {
        self.listeners.retain(|(owner, _), _| *owner != id);
        if let Some(instance) = self.instances.remove(&id) {
            if let Some((_, content)) = instance.content {
                self.clear(content);
                self.mounts.remove(&content);
            }
        }
    }

    fn write_prop(
        &mut self,
        handle: InstanceId,
        name: &str,
        value: &Value,
        setter: PropSetter,
    ) -> Result<(), String> {
        let instance = self.instance_mut(handle)?;
        instance.props.insert(name.to_string(), value.clone());
        instance.writes.push((name.to_string(), setter));
        Ok(())
    }

    fn instance_mut(&mut self, id: InstanceId) -> Result<&mut OutlineInstance, String> {
        self.instances
            .get_mut(&id)
            .ok_or_else(|| format!("instance {id:?} does not exist"))
    }
}

impl Default for OutlineHost {
    fn default() -> Self {
        Self::new()
    }
}

impl UiHost for OutlineHost {
    type Handle = InstanceId;
    type Mount = MountId;

    fn clear(&mut self, mount: MountId) {
        let mounted = match self.mounts.get_mut(&mount) {
            Some(mounted) => std::mem::take(mounted),
            None => return,
        };

        for id in mounted {
            self.drop_instance(id);
        }
    }

    fn mounted_instances(&self, mount: MountId) -> Vec<InstanceId> {
        self.mounted(mount).to_vec()
    }

    fn unmount(&mut self, handle: InstanceId) {
        let Some(mount) = self.instances.get(&handle).map(|instance| instance.mount) else {
            return;
        };
        if let Some(siblings) = self.mounts.get_mut(&mount) {
            siblings.retain(|id| *id != handle);
        }
        self.drop_instance(handle);
    }

    fn set_prop(&mut self, handle: InstanceId, name: &str, value: &Value) -> Result<(), String> {
        self.write_prop(handle, name, value, PropSetter::Prop)
    }

    fn set_input(
        &mut self,
        handle: InstanceId,
        name: &str,
        value: &Value,
    ) -> Option<Result<(), String>> {
        self.inputs
            .contains(name)
            .then(|| self.write_prop(handle, name, value, PropSetter::Input))
    }

    fn subscribe(
        &mut self,
        handle: InstanceId,
        event: &str,
        listener: EventListener,
    ) -> Result<(), String> {
        self.instance_mut(handle)?.events.push(event.to_string());
        self.listeners.insert((handle, event.to_string()), listener);
        Ok(())
    }

    fn refresh(&mut self, handle: InstanceId) {
        if let Ok(instance) = self.instance_mut(handle) {
            instance.refreshes += 1;
        }
    }

    fn child_mount(&mut self, handle: InstanceId, content_host: Option<&str>) -> Option<MountId> {
        let name = content_host?;
        let instance = self.instances.get_mut(&handle)?;

        if let Some((existing, mount)) = &instance.content {
            return (existing == name).then_some(*mount);
        }

        let mount = MountId(self.next_mount);
        self.next_mount += 1;
        instance.content = Some((name.to_string(), mount));
        self.mounts.insert(mount, Vec::new());
        Some(mount)
    }
}
