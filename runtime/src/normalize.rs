use crate::node::UiNode;
use serde_json::{Map, Value, json};

const VERSION_MARKERS: [&str; 2] = ["schemaVersion", "schema_version"];

#[derive(Debug, thiserror::Error)]
pub enum NormalizeError {
    #[error("schema is not a canonical UI tree: {0}")]
    Malformed(#[from] serde_json::Error),
}

pub fn is_wire_schema(raw: &Value) -> bool {
    let Some(object) = raw.as_object() else {
        return false;
    };

    VERSION_MARKERS.iter().any(|marker| object.contains_key(*marker))
        && object.get("components").is_some_and(Value::is_array)
}

/// Wire schemas never fail to normalize; unknown components become `error`
/// nodes. Anything else must already decode as a canonical tree.
pub fn normalize(raw: &Value) -> Result<UiNode, NormalizeError> {
    if is_wire_schema(raw) {
        return Ok(normalize_wire(raw));
    }

    Ok(serde_json::from_value(raw.clone())?)
}

fn normalize_wire(raw: &Value) -> UiNode {
    let empty = Map::new();
    let layout = raw.get("layout").and_then(Value::as_object).unwrap_or(&empty);
    let kind = layout_kind(layout.get("type").and_then(Value::as_str));

    let mut root = UiNode::new(kind);
    root.props = layout_props(kind, layout);
    root.children = map_components(raw.get("components"));
    root
}

/// Total, case-insensitive mapping from a layout kind to a node type.
pub fn layout_kind(raw: Option<&str>) -> &'static str {
    match raw.map(str::to_ascii_lowercase).as_deref() {
        Some("flexbox") => "flexbox",
        Some("grid") => "grid",
        Some("card") => "card",
        _ => "container",
    }
}

fn layout_props(kind: &str, layout: &Map<String, Value>) -> Map<String, Value> {
    let mut props = Map::new();

    match kind {
        "flexbox" => {
            for field in ["direction", "gap", "padding", "alignItems", "justifyContent"] {
                copy_field(layout, &mut props, field);
            }
        }
        "grid" => {
            field_or(layout, &mut props, "columns", json!(1));
            field_or(layout, &mut props, "gap", json!(16));
        }
        "card" => field_or(layout, &mut props, "title", json!("")),
        _ => {
            field_or(layout, &mut props, "maxWidth", json!(1200));
            field_or(layout, &mut props, "variant", json!("default"));
        }
    }

    props
}

#[derive(Debug, Clone, PartialEq)]
pub enum MappedComponent {
    Node(UiNode),
    Unsupported(UnsupportedComponent),
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnsupportedComponent {
    pub original_type: String,
    pub details: String,
}

impl From<UnsupportedComponent> for UiNode {
    fn from(unsupported: UnsupportedComponent) -> Self {
        UiNode::new("error")
            .with_prop("title", "Unsupported component")
            .with_prop(
                "message",
                format!(
                    "Component type '{}' is not supported yet.",
                    unsupported.original_type
                ),
            )
            .with_prop("details", unsupported.details)
            .with_prop("dismissible", false)
            .with_prop("visible", true)
    }
}

impl From<MappedComponent> for UiNode {
    fn from(mapped: MappedComponent) -> Self {
        match mapped {
            MappedComponent::Node(node) => node,
            MappedComponent::Unsupported(unsupported) => unsupported.into(),
        }
    }
}

fn map_components(components: Option<&Value>) -> Vec<UiNode> {
    components
        .and_then(Value::as_array)
        .map(|items| items.iter().map(|item| map_component(item).into()).collect())
        .unwrap_or_default()
}

pub fn map_component(component: &Value) -> MappedComponent {
    let original_type = component.get("type").and_then(Value::as_str);
    let (Some(fields), Some(original_type)) = (component.as_object(), original_type) else {
        return MappedComponent::Unsupported(UnsupportedComponent {
            original_type: original_type.unwrap_or("(missing)").to_string(),
            details: component.to_string(),
        });
    };

    let kind = original_type.to_ascii_lowercase();
    let node = match kind.as_str() {
        "heading" => {
            let mut node = UiNode::new("heading");
            field_or(fields, &mut node.props, "text", json!(""));
            field_or(fields, &mut node.props, "level", json!(2));
            field_or(fields, &mut node.props, "ariaLabel", json!(""));
            node
        }
        "paragraph" => {
            let mut node = UiNode::new("paragraph");
            field_or(fields, &mut node.props, "text", json!(""));
            field_or(fields, &mut node.props, "ariaLabel", json!(""));
            node
        }
        "divider" => {
            let mut node = UiNode::new("divider");
            field_or(fields, &mut node.props, "ariaLabel", json!(""));
            node
        }
        "text-input" | "number-input" => map_input(fields, kind == "number-input"),
        "select" | "checkbox" | "radio" | "textarea" | "button" | "card" | "grid" | "list" => {
            map_pass_through(&kind, fields)
        }
        _ => {
            return MappedComponent::Unsupported(UnsupportedComponent {
                original_type: original_type.to_string(),
                details: component.to_string(),
            });
        }
    };

    MappedComponent::Node(with_wire_bindings(node, fields))
}

fn map_input(fields: &Map<String, Value>, numeric: bool) -> UiNode {
    let mut node = UiNode::new("input");
    copy_field(fields, &mut node.props, "id");
    node.props.insert(
        "type".to_string(),
        json!(if numeric { "number" } else { "text" }),
    );
    field_or(fields, &mut node.props, "label", json!(""));
    for field in ["placeholder", "value"] {
        copy_field(fields, &mut node.props, field);
    }
    field_or(fields, &mut node.props, "disabled", json!(false));
    field_or(fields, &mut node.props, "required", json!(false));
    for field in ["pattern", "error"] {
        copy_field(fields, &mut node.props, field);
    }
    node
}

/// Keeps every field except `type` as a prop; a `components` array becomes
/// the node's children instead.
fn map_pass_through(kind: &str, fields: &Map<String, Value>) -> UiNode {
    let mut node = UiNode::new(kind);

    for (name, value) in fields {
        match name.as_str() {
            "type" | "events" => {}
            "components" if value.is_array() => node.children = map_components(Some(value)),
            _ => {
                node.props.insert(name.clone(), value.clone());
            }
        }
    }

    node
}

fn with_wire_bindings(mut node: UiNode, fields: &Map<String, Value>) -> UiNode {
    if let Some(id) = fields.get("id").and_then(Value::as_str) {
        node.id = Some(id.to_string());
    }

    if let Some(events) = fields.get("events") {
        match serde_json::from_value(events.clone()) {
            Ok(events) => node.events = events,
            Err(err) => tracing::warn!(error = %err, "ignoring malformed component events"),
        }
    }

    node
}

fn copy_field(from: &Map<String, Value>, to: &mut Map<String, Value>, field: &str) {
    if let Some(value) = from.get(field).filter(|value| !value.is_null()) {
        to.insert(field.to_string(), value.clone());
    }
}

fn field_or(from: &Map<String, Value>, to: &mut Map<String, Value>, field: &str, default: Value) {
    let value = from
        .get(field)
        .filter(|value| !value.is_null())
        .cloned()
        .unwrap_or(default);
    to.insert(field.to_string(), value);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_layout_with_heading() {
        let raw = json!({
            "schemaVersion": "1",
            "layout": {"type": "grid", "columns": 2},
            "components": [{"type": "heading", "text": "Hi", "level": 1}]
        });

        let node = normalize(&raw).expect("normalize");
        let expected: UiNode = serde_json::from_value(json!({
            "type": "grid",
            "props": {"columns": 2, "gap": 16},
            "children": [{"type": "heading", "props": {"text": "Hi", "level": 1, "ariaLabel": ""}}]
        }))
        .expect("expected tree");

        assert_eq!(node, expected);
    }

    #[test]
    fn unknown_component_becomes_error_node() {
        let raw = json!({
            "schemaVersion": "1",
            "layout": {"type": "flexbox"},
            "components": [{"type": "map-view", "foo": 1}]
        });

        let node = normalize(&raw).expect("normalize");
        let error = &node.children[0];

        assert_eq!(error.kind(), Some("error"));
        assert_eq!(error.props["title"], "Unsupported component");
        assert!(
            error.props["message"]
                .as_str()
                .expect("message")
                .contains("map-view")
        );
        let details: Value =
            serde_json::from_str(error.props["details"].as_str().expect("details")).expect("json");
        assert_eq!(details, json!({"type": "map-view", "foo": 1}));
        assert_eq!(error.props["dismissible"], false);
        assert_eq!(error.props["visible"], true);
    }

    #[test]
    fn malformed_components_never_fail() {
        let raw = json!({
            "schemaVersion": 2,
            "components": [42, {"text": "no type"}, null]
        });

        let node = normalize(&raw).expect("normalize");

        assert_eq!(node.kind(), Some("container"));
        assert_eq!(node.children.len(), 3);
        assert!(node.children.iter().all(|child| child.kind() == Some("error")));
        assert!(
            node.children[1].props["message"]
                .as_str()
                .expect("message")
                .contains("(missing)")
        );
    }

    #[test]
    fn layout_kind_mapping_is_case_insensitive_and_total() {
        assert_eq!(layout_kind(Some("FlexBox")), "flexbox");
        assert_eq!(layout_kind(Some("GRID")), "grid");
        assert_eq!(layout_kind(Some("card")), "card");
        assert_eq!(layout_kind(Some("stack")), "container");
        assert_eq!(layout_kind(None), "container");
    }

    #[test]
    fn root_props_follow_the_resolved_kind() {
        let container = normalize(&json!({
            "schemaVersion": "1",
            "layout": {"type": "page", "columns": 4},
            "components": []
        }))
        .expect("normalize");
        assert_eq!(
            Value::Object(container.props),
            json!({"maxWidth": 1200, "variant": "default"})
        );

        let flex = normalize(&json!({
            "schemaVersion": "1",
            "layout": {"type": "flexbox", "direction": "row", "gap": 8, "wrap": true},
            "components": []
        }))
        .expect("normalize");
        assert_eq!(Value::Object(flex.props), json!({"direction": "row", "gap": 8}));

        let card = normalize(&json!({"schemaVersion": "1", "layout": {"type": "Card"}, "components": []}))
            .expect("normalize");
        assert_eq!(card.kind(), Some("card"));
        assert_eq!(Value::Object(card.props), json!({"title": ""}));
    }

    #[test]
    fn inputs_are_unified() {
        let raw = json!({
            "schemaVersion": "1",
            "layout": {"type": "card", "title": "Signup"},
            "components": [
                {"type": "text-input", "id": "email", "label": "Email", "placeholder": "you@example.com", "extra": 1},
                {"type": "Number-Input", "id": "age", "label": "Age", "value": 30, "required": true}
            ]
        });

        let node = normalize(&raw).expect("normalize");

        let email = &node.children[0];
        assert_eq!(email.kind(), Some("input"));
        assert_eq!(email.id.as_deref(), Some("email"));
        assert_eq!(
            Value::Object(email.props.clone()),
            json!({
                "id": "email",
                "type": "text",
                "label": "Email",
                "placeholder": "you@example.com",
                "disabled": false,
                "required": false
            })
        );

        let age = &node.children[1];
        assert_eq!(age.props["type"], "number");
        assert_eq!(age.props["value"], 30);
        assert_eq!(age.props["required"], true);
    }

    #[test]
    fn pass_through_types_recurse_into_components() {
        let raw = json!({
            "schemaVersion": "1",
            "layout": {"type": "grid"},
            "components": [{
                "type": "Card",
                "title": "Details",
                "components": [
                    {"type": "paragraph", "text": "Inside"},
                    {"type": "button", "label": "Go", "variant": "primary"}
                ]
            }]
        });

        let node = normalize(&raw).expect("normalize");
        let card = &node.children[0];

        assert_eq!(card.kind(), Some("card"));
        assert_eq!(Value::Object(card.props.clone()), json!({"title": "Details"}));
        assert_eq!(card.children.len(), 2);
        assert_eq!(card.children[0].props["text"], "Inside");
        assert_eq!(card.children[1].kind(), Some("button"));
        assert_eq!(card.children[1].props["variant"], "primary");
    }

    #[test]
    fn wire_ids_and_events_become_bindings() {
        let button = map_component(&json!({
            "type": "button",
            "id": "go",
            "label": "Go",
            "events": {"click": {"action": "submit", "payload": {"step": 1}}}
        }));
        let MappedComponent::Node(button) = button else {
            panic!("button should map");
        };

        assert_eq!(button.id.as_deref(), Some("go"));
        assert!(!button.props.contains_key("events"));
        assert_eq!(
            button.events["click"],
            crate::node::EventBinding::action("submit").with_payload(json!({"step": 1}))
        );

        let MappedComponent::Node(broken) =
            map_component(&json!({"type": "button", "events": [1, 2]}))
        else {
            panic!("button should map");
        };
        assert!(broken.events.is_empty());
    }

    #[test]
    fn canonical_input_passes_through() {
        let raw = json!({
            "type": "card",
            "props": {"title": "Already canonical"},
            "children": [{"type": "divider", "props": {}}]
        });

        let node = normalize(&raw).expect("normalize");
        assert_eq!(node.kind(), Some("card"));
        assert_eq!(node.children[0].kind(), Some("divider"));
    }

    #[test]
    fn canonical_input_with_null_collections_loads() {
        let node = normalize(&json!({"type": "divider", "props": {}, "children": null}))
            .expect("normalize");
        assert_eq!(node, UiNode::new("divider"));

        let node = normalize(&json!({"type": "card", "props": null, "children": [{"type": "divider"}]}))
            .expect("normalize");
        assert!(node.props.is_empty());
        assert_eq!(node.children.len(), 1);
    }

    #[test]
    fn components_without_version_marker_are_canonical() {
        let raw = json!({"type": "list", "components": [{"type": "heading"}]});
        assert!(!is_wire_schema(&raw));
        let node = normalize(&raw).expect("normalize");
        assert_eq!(node.kind(), Some("list"));
        assert!(node.children.is_empty());
    }

    #[test]
    fn malformed_canonical_input_is_an_error() {
        let raw = json!({"type": "card", "props": "not-an-object"});
        assert!(matches!(normalize(&raw), Err(NormalizeError::Malformed(_))));
    }
}
