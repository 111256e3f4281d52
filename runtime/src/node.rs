use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// One node of the canonical UI tree.
///
/// `type` is optional on the wire so that a tree missing it can still be
/// loaded and reported by the validator instead of failing to parse.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct UiNode {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub props: Map<String, Value>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub children: Vec<UiNode>,
    #[serde(
        default,
        deserialize_with = "null_as_empty",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub events: BTreeMap<String, EventBinding>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl UiNode {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: Some(kind.into()),
            ..Self::default()
        }
    }

    pub fn with_prop(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.props.insert(name.into(), value.into());
        self
    }

    pub fn with_child(mut self, child: UiNode) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_event(mut self, event: impl Into<String>, binding: EventBinding) -> Self {
        self.events.insert(event.into(), binding);
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// The component type, treating an empty string as missing.
    pub fn kind(&self) -> Option<&str> {
        self.kind.as_deref().filter(|kind| !kind.is_empty())
    }

    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(UiNode::node_count).sum::<usize>()
    }
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// Declarative event wiring: which application action an instance event
/// triggers. A bare string is accepted as shorthand for `{ "action": .. }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "BindingRepr")]
pub struct EventBinding {
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

impl EventBinding {
    pub fn action(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            payload: None,
        }
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum BindingRepr {
    Action(String),
    Detailed {
        action: String,
        #[serde(default)]
        payload: Option<Value>,
    },
}

impl From<BindingRepr> for EventBinding {
    fn from(repr: BindingRepr) -> Self {
        match repr {
            BindingRepr::Action(action) => Self::action(action),
            BindingRepr::Detailed { action, payload } => Self { action, payload },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_node_without_optional_fields() {
        let node: UiNode = serde_json::from_value(json!({"type": "divider"})).expect("decode");
        assert_eq!(node.kind(), Some("divider"));
        assert!(node.props.is_empty());
        assert!(node.children.is_empty());
        assert!(node.events.is_empty());
        assert_eq!(node.id, None);
    }

    #[test]
    fn null_collections_decode_as_empty() {
        let node: UiNode = serde_json::from_value(json!({
            "type": "card",
            "props": null,
            "events": null,
            "children": [{"type": "divider", "children": null}]
        }))
        .expect("decode");

        assert!(node.props.is_empty());
        assert!(node.events.is_empty());
        assert_eq!(node.children.len(), 1);
        assert!(node.children[0].children.is_empty());
    }

    #[test]
    fn missing_type_still_decodes() {
        let node: UiNode = serde_json::from_value(json!({"props": {"text": "hi"}})).expect("decode");
        assert_eq!(node.kind(), None);
        assert_eq!(node.props["text"], "hi");
    }

    #[test]
    fn empty_type_counts_as_missing() {
        let node = UiNode::new("");
        assert_eq!(node.kind(), None);
    }

    #[test]
    fn json_round_trip_keeps_every_field() {
        let raw = json!({
            "type": "card",
            "id": "profile",
            "props": {"title": "Profile", "tags": ["a", "b"]},
            "events": {
                "click": "open-profile",
                "close": {"action": "dismiss", "payload": {"reason": "user"}}
            },
            "children": [{"type": "paragraph", "props": {"text": "Body"}, "children": []}]
        });

        let node: UiNode = serde_json::from_value(raw).expect("decode");
        let encoded = serde_json::to_value(&node).expect("encode");
        let decoded: UiNode = serde_json::from_value(encoded).expect("decode again");

        assert_eq!(node, decoded);
        assert_eq!(decoded.events["click"], EventBinding::action("open-profile"));
        assert_eq!(
            decoded.events["close"].payload,
            Some(json!({"reason": "user"}))
        );
    }

    #[test]
    fn node_count_includes_descendants() {
        let tree = UiNode::new("grid")
            .with_child(UiNode::new("heading"))
            .with_child(UiNode::new("card").with_child(UiNode::new("paragraph")));
        assert_eq!(tree.node_count(), 4);
    }
}
