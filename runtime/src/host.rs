use serde_json::Value;
use std::fmt::Debug;
use std::sync::Arc;

pub type EventListener = Box<dyn Fn(Value) + Send + Sync>;

pub type Factory<H> = Arc<
    dyn Fn(&mut H, <H as UiHost>::Mount) -> Result<<H as UiHost>::Handle, String> + Send + Sync,
>;

/// The hosting UI runtime, as seen by the renderer.
///
/// The host owns every live instance; the engine only holds handles.
pub trait UiHost {
    type Handle: Copy + Eq + Debug;
    type Mount: Copy + Eq + Debug;

    /// Tears down every instance mounted under `mount`.
    fn clear(&mut self, mount: Self::Mount);

    /// Instances mounted directly under `mount`, in mount order.
    fn mounted_instances(&self, mount: Self::Mount) -> Vec<Self::Handle>;

    /// Tears down one instance together with everything mounted inside it.
    fn unmount(&mut self, handle: Self::Handle);

    fn set_prop(&mut self, handle: Self::Handle, name: &str, value: &Value) -> Result<(), String>;

    /// Reactive input binding. Hosts that have one return `Some`; the
    /// renderer falls back to `set_prop` on `None`.
    fn set_input(
        &mut self,
        handle: Self::Handle,
        name: &str,
        value: &Value,
    ) -> Option<Result<(), String>> {
        let _ = (handle, name, value);
        None
    }

    fn subscribe(
        &mut self,
        handle: Self::Handle,
        event: &str,
        listener: EventListener,
    ) -> Result<(), String>;

    /// Synchronously flushes pending state so mount points exist.
    fn refresh(&mut self, handle: Self::Handle);

    fn child_mount(
        &mut self,
        handle: Self::Handle,
        content_host: Option<&str>,
    ) -> Option<Self::Mount>;
}
