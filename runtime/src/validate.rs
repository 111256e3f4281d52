use crate::capability::PropKind;
use crate::node::UiNode;
use crate::registry::CapabilityCatalog;
use serde::Serialize;
use serde_json::Value;

/// Prop name that, when declared required, demands at least one child.
const CHILDREN_PROP: &str = "children";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
}

impl ValidationReport {
    fn from_errors(errors: Vec<String>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
        }
    }
}

/// Shallow: checks `node` itself and never descends into its children.
pub fn validate<C>(catalog: &C, node: &UiNode) -> ValidationReport
where
    C: CapabilityCatalog + ?Sized,
{
    ValidationReport::from_errors(node_errors(catalog, node))
}

/// Validates every node. Errors are prefixed with the JSON pointer of the
/// offending node, e.g. `/children/1: ...`.
pub fn validate_tree<C>(catalog: &C, node: &UiNode) -> ValidationReport
where
    C: CapabilityCatalog + ?Sized,
{
    let mut errors = Vec::new();
    collect_tree_errors(catalog, node, "", &mut errors);
    ValidationReport::from_errors(errors)
}

fn collect_tree_errors<C>(catalog: &C, node: &UiNode, pointer: &str, errors: &mut Vec<String>)
where
    C: CapabilityCatalog + ?Sized,
{
    let location = if pointer.is_empty() { "/" } else { pointer };
    errors.extend(
        node_errors(catalog, node)
            .into_iter()
            .map(|error| format!("{location}: {error}")),
    );

    for (index, child) in node.children.iter().enumerate() {
        collect_tree_errors(catalog, child, &format!("{pointer}/children/{index}"), errors);
    }
}

fn node_errors<C>(catalog: &C, node: &UiNode) -> Vec<String>
where
    C: CapabilityCatalog + ?Sized,
{
    let Some(kind) = node.kind() else {
        return vec!["component type is missing".to_string()];
    };

    let Some(capability) = catalog.capability(kind) else {
        return vec![format!("unknown component type '{kind}'")];
    };

    let mut errors = Vec::new();

    for (name, spec) in &capability.props_schema {
        if name == CHILDREN_PROP {
            if spec.required && node.children.is_empty() {
                errors.push(format!("'{kind}' requires at least one child"));
            }
            continue;
        }

        let value = node.props.get(name).filter(|value| !value.is_null());
        let Some(value) = value else {
            if spec.required {
                errors.push(format!("required prop '{name}' is missing on '{kind}'"));
            }
            continue;
        };

        if let Some(expected) = &spec.kind {
            if !expected.accepts(value) {
                errors.push(format!(
                    "prop '{name}' on '{kind}' expected {expected}, got {}",
                    PropKind::of(value)
                ));
            }
        }

        if let Some(allowed) = &spec.allowed {
            if !allowed.contains(value) {
                errors.push(format!(
                    "prop '{name}' on '{kind}' must be one of {}, got {value}",
                    Value::Array(allowed.clone())
                ));
            }
        }
    }

    errors
}
