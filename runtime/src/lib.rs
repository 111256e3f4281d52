pub mod capability;
pub mod catalog;
pub mod events;
pub mod host;
pub mod node;
pub mod normalize;
pub mod outline;
pub mod patch;
pub mod protocol;
pub mod registry;
pub mod render;
pub mod session;
pub mod stream;
pub mod validate;

pub use capability::{Capability, EventSpec, PropKind, PropSpec, TypeSpec};
pub use catalog::{CONTENT_HOST, default_capabilities, register_catalog};
pub use events::{ActionTable, EventEmitter, EventHandler, UiEvent};
pub use host::{EventListener, Factory, UiHost};
pub use node::{EventBinding, UiNode};
pub use normalize::{MappedComponent, NormalizeError, UnsupportedComponent, map_component, normalize};
pub use outline::{InstanceId, MountId, OutlineHost, PropSetter};
pub use patch::{PatchError, PatchOperation, PatchOutcome, SkippedOperation, apply_operations, apply_patch};
pub use registry::{CapabilityCatalog, CapabilityRegistry, RegistryEntry};
pub use render::{RenderError, RenderOptions, RenderResult, TreeRenderer};
pub use session::{SessionError, UiSession};
pub use stream::{ChunkKind, ChunkOutcome, StreamChunk, StreamController, StreamOptions, StreamState};
pub use validate::{ValidationReport, validate, validate_tree};

pub use serde_json;
