use crate::node::UiNode;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchOperation {
    pub op: String,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    /// `None` only when the key is absent; `"value": null` is `Some(Null)`.
    #[serde(
        default,
        deserialize_with = "present_value",
        skip_serializing_if = "Option::is_none"
    )]
    pub value: Option<Value>,
}

fn present_value<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

impl PatchOperation {
    fn new(op: &str, path: impl Into<String>) -> Self {
        Self {
            op: op.to_string(),
            path: path.into(),
            from: None,
            value: None,
        }
    }

    pub fn add(path: impl Into<String>, value: Value) -> Self {
        Self {
            value: Some(value),
            ..Self::new("add", path)
        }
    }

    pub fn remove(path: impl Into<String>) -> Self {
        Self::new("remove", path)
    }

    pub fn replace(path: impl Into<String>, value: Value) -> Self {
        Self {
            value: Some(value),
            ..Self::new("replace", path)
        }
    }

    pub fn copy(from: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            from: Some(from.into()),
            ..Self::new("copy", path)
        }
    }

    pub fn move_to(from: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            from: Some(from.into()),
            ..Self::new("move", path)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PatchError {
    #[error("unknown patch operation '{0}'")]
    UnknownOp(String),
    #[error("'{op}' operation requires a '{field}' field")]
    MissingField { op: String, field: &'static str },
    #[error("invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },
    #[error("path does not exist: {0}")]
    PathNotFound(String),
    #[error("array index out of bounds '{token}' at path {path}")]
    IndexOutOfBounds { path: String, token: String },
    #[error("cannot address '{token}' inside a non-container value at path {path}")]
    NotAContainer { path: String, token: String },
    #[error("cannot move '{from}' into its own descendant '{path}'")]
    MoveIntoSelf { from: String, path: String },
    #[error("patched document is not a valid UI tree: {0}")]
    InvalidTree(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedOperation {
    pub index: usize,
    pub op: String,
    pub path: String,
    pub error: PatchError,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PatchOutcome {
    pub tree: UiNode,
    pub applied: usize,
    pub skipped: Vec<SkippedOperation>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum PatchOp<'a> {
    Add { path: &'a str, value: &'a Value },
    Remove { path: &'a str },
    Replace { path: &'a str, value: &'a Value },
    Copy { from: &'a str, path: &'a str },
    Move { from: &'a str, path: &'a str },
}

impl<'a> TryFrom<&'a PatchOperation> for PatchOp<'a> {
    type Error = PatchError;

    fn try_from(operation: &'a PatchOperation) -> Result<Self, Self::Error> {
        let path = operation.path.as_str();
        let value = || {
            operation.value.as_ref().ok_or_else(|| PatchError::MissingField {
                op: operation.op.clone(),
                field: "value",
            })
        };
        let from = || {
            operation.from.as_deref().ok_or_else(|| PatchError::MissingField {
                op: operation.op.clone(),
                field: "from",
            })
        };

        match operation.op.as_str() {
            "add" => Ok(Self::Add { path, value: value()? }),
            "remove" => Ok(Self::Remove { path }),
            "replace" => Ok(Self::Replace { path, value: value()? }),
            "copy" => Ok(Self::Copy { from: from()?, path }),
            "move" => Ok(Self::Move { from: from()?, path }),
            other => Err(PatchError::UnknownOp(other.to_string())),
        }
    }
}

impl PatchOp<'_> {
    /// Whether running this op against `document` may mutate it and then
    /// fail. `add` and `copy` only can when they have to create intermediate
    /// containers; `move` always can, since the source is removed first.
    fn can_fail_midway(&self, document: &Value) -> bool {
        match self {
            Self::Move { .. } => true,
            Self::Add { path, .. } | Self::Copy { path, .. } => !parent_is_container(document, path),
            Self::Remove { .. } | Self::Replace { .. } => false,
        }
    }
}

/// Per-operation failures end up in [`PatchOutcome::skipped`]. An `Err` is
/// returned only when the patched document no longer decodes as a tree.
pub fn apply_patch(tree: &UiNode, operations: &[PatchOperation]) -> Result<PatchOutcome, PatchError> {
    let mut document =
        serde_json::to_value(tree).map_err(|err| PatchError::InvalidTree(err.to_string()))?;

    let skipped = apply_operations(&mut document, operations);
    let tree = serde_json::from_value(document)
        .map_err(|err| PatchError::InvalidTree(err.to_string()))?;

    Ok(PatchOutcome {
        tree,
        applied: operations.len() - skipped.len(),
        skipped,
    })
}

pub fn apply_operations(document: &mut Value, operations: &[PatchOperation]) -> Vec<SkippedOperation> {
    let mut skipped = Vec::new();

    for (index, operation) in operations.iter().enumerate() {
        if let Err(error) = apply_operation(document, operation) {
            tracing::warn!(
                index,
                op = %operation.op,
                path = %operation.path,
                %error,
                "skipping patch operation"
            );
            skipped.push(SkippedOperation {
                index,
                op: operation.op.clone(),
                path: operation.path.clone(),
                error,
            });
        } else {
            tracing::debug!(index, op = %operation.op, path = %operation.path, "applied patch operation");
        }
    }

    skipped
}

fn apply_operation(document: &mut Value, operation: &PatchOperation) -> Result<(), PatchError> {
    let op = PatchOp::try_from(operation)?;

    if !op.can_fail_midway(document) {
        return run(document, op);
    }

    let snapshot = document.clone();
    run(document, op).inspect_err(|_| *document = snapshot)
}

fn run(document: &mut Value, op: PatchOp<'_>) -> Result<(), PatchError> {
    match op {
        PatchOp::Add { path, value } => add_path(document, path, value.clone()),
        PatchOp::Remove { path } => remove_path(document, path).map(|_| ()),
        PatchOp::Replace { path, value } => replace_path(document, path, value.clone()),
        PatchOp::Copy { from, path } => {
            let value = read_path(document, from)?.clone();
            add_path(document, path, value)
        }
        PatchOp::Move { from, path } => {
            if is_descendant(from, path)? {
                return Err(PatchError::MoveIntoSelf {
                    from: from.to_string(),
                    path: path.to_string(),
                });
            }
            // `path` resolves against the document after the source is gone.
            let value = remove_path(document, from)?;
            add_path(document, path, value)
        }
    }
}

fn add_path(root: &mut Value, path: &str, value: Value) -> Result<(), PatchError> {
    let tokens = parse_pointer(path)?;

    let Some((last, parents)) = tokens.split_last() else {
        *root = value;
        return Ok(());
    };

    let mut current = root;

    for (position, token) in parents.iter().enumerate() {
        let next = &tokens[position + 1];
        current = descend_or_create(current, token, next, path)?;
    }

    match current {
        Value::Object(map) => {
            map.insert(last.clone(), value);
            Ok(())
        }
        Value::Array(items) => {
            if last == "-" {
                items.push(value);
            } else {
                let index = parse_index(last, items.len(), path)?;
                items.insert(index, value);
            }
            Ok(())
        }
        _ => Err(PatchError::NotAContainer {
            path: path.to_string(),
            token: last.clone(),
        }),
    }
}

fn replace_path(root: &mut Value, path: &str, value: Value) -> Result<(), PatchError> {
    let tokens = parse_pointer(path)?;

    let Some((last, parents)) = tokens.split_last() else {
        *root = value;
        return Ok(());
    };

    let current = descend_existing_path(root, parents, path)?;

    match current {
        Value::Object(map) => {
            map.insert(last.clone(), value);
            Ok(())
        }
        Value::Array(items) => {
            let index = parse_index(last, items.len().saturating_sub(1), path)?;
            let slot = items
                .get_mut(index)
                .ok_or_else(|| out_of_bounds(last, path))?;
            *slot = value;
            Ok(())
        }
        _ => Err(PatchError::NotAContainer {
            path: path.to_string(),
            token: last.clone(),
        }),
    }
}

fn remove_path(root: &mut Value, path: &str) -> Result<Value, PatchError> {
    let tokens = parse_pointer(path)?;

    let Some((last, parents)) = tokens.split_last() else {
        return Err(PatchError::InvalidPath {
            path: path.to_string(),
            reason: "cannot remove the document root".to_string(),
        });
    };

    let current = descend_existing_path(root, parents, path)?;

    match current {
        Value::Object(map) => map
            .remove(last)
            .ok_or_else(|| PatchError::PathNotFound(path.to_string())),
        Value::Array(items) => {
            let index = parse_index(last, items.len().saturating_sub(1), path)?;
            if index < items.len() {
                Ok(items.remove(index))
            } else {
                Err(out_of_bounds(last, path))
            }
        }
        _ => Err(PatchError::NotAContainer {
            path: path.to_string(),
            token: last.clone(),
        }),
    }
}

fn read_path<'a>(root: &'a Value, path: &str) -> Result<&'a Value, PatchError> {
    let tokens = parse_pointer(path)?;
    lookup(root, &tokens).ok_or_else(|| PatchError::PathNotFound(path.to_string()))
}

fn lookup<'a>(root: &'a Value, tokens: &[String]) -> Option<&'a Value> {
    tokens.iter().try_fold(root, |current, token| match current {
        Value::Object(map) => map.get(token),
        Value::Array(items) => token.parse::<usize>().ok().and_then(|index| items.get(index)),
        _ => None,
    })
}

fn parent_is_container(document: &Value, path: &str) -> bool {
    let Ok(tokens) = parse_pointer(path) else {
        return true;
    };
    let Some((_, parents)) = tokens.split_last() else {
        return true;
    };

    matches!(lookup(document, parents), Some(Value::Object(_) | Value::Array(_)))
}

// Leading `/` is required; empty segments are dropped, so `//a/` is `/a`.
fn parse_pointer(path: &str) -> Result<Vec<String>, PatchError> {
    if path.is_empty() {
        return Ok(vec![]);
    }

    if !path.starts_with('/') {
        return Err(PatchError::InvalidPath {
            path: path.to_string(),
            reason: "must start with '/'".to_string(),
        });
    }

    path.split('/')
        .filter(|token| !token.is_empty())
        .map(|token| unescape_json_pointer_token(token, path))
        .collect()
}

fn unescape_json_pointer_token(token: &str, path: &str) -> Result<String, PatchError> {
    let invalid = |reason: String| PatchError::InvalidPath {
        path: path.to_string(),
        reason,
    };
    let mut out = String::with_capacity(token.len());
    let mut chars = token.chars();

    while let Some(ch) = chars.next() {
        if ch == '~' {
            match chars.next() {
                Some('0') => out.push('~'),
                Some('1') => out.push('/'),
                Some(other) => {
                    return Err(invalid(format!("invalid escape ~{other} in token")));
                }
                None => return Err(invalid("trailing ~ in token".to_string())),
            }
        } else {
            out.push(ch);
        }
    }

    Ok(out)
}

fn is_descendant(from: &str, path: &str) -> Result<bool, PatchError> {
    let from = parse_pointer(from)?;
    let path = parse_pointer(path)?;
    Ok(path.len() > from.len() && path.starts_with(&from))
}

// Missing containers become arrays when `next` is numeric, else objects.
fn descend_or_create<'a>(
    value: &'a mut Value,
    token: &str,
    next: &str,
    path: &str,
) -> Result<&'a mut Value, PatchError> {
    let fresh = || {
        if next.parse::<usize>().is_ok() {
            Value::Array(Vec::new())
        } else {
            Value::Object(serde_json::Map::new())
        }
    };

    let slot = match value {
        Value::Object(map) => map.entry(token.to_string()).or_insert_with(fresh),
        Value::Array(items) => {
            let index = if token == "-" {
                items.len()
            } else {
                parse_index(token, items.len(), path)?
            };
            if index == items.len() {
                items.push(fresh());
            }
            &mut items[index]
        }
        _ => {
            return Err(PatchError::NotAContainer {
                path: path.to_string(),
                token: token.to_string(),
            });
        }
    };

    if slot.is_null() {
        *slot = fresh();
    }

    Ok(slot)
}

fn descend_existing_path<'a>(
    root: &'a mut Value,
    tokens: &[String],
    path: &str,
) -> Result<&'a mut Value, PatchError> {
    let mut current = root;

    for token in tokens {
        current = descend_existing(current, token)
            .ok_or_else(|| PatchError::PathNotFound(path.to_string()))?;
    }

    Ok(current)
}

fn descend_existing<'a>(value: &'a mut Value, token: &str) -> Option<&'a mut Value> {
    match value {
        Value::Object(map) => map.get_mut(token),
        Value::Array(items) => token
            .parse::<usize>()
            .ok()
            .and_then(|index| items.get_mut(index)),
        _ => None,
    }
}

fn parse_index(token: &str, max_index: usize, path: &str) -> Result<usize, PatchError> {
    let index = token
        .parse::<usize>()
        .map_err(|_| PatchError::InvalidPath {
            path: path.to_string(),
            reason: format!("invalid array index '{token}'"),
        })?;

    if index > max_index {
        Err(out_of_bounds(token, path))
    } else {
        Ok(index)
    }
}

fn out_of_bounds(token: &str, path: &str) -> PatchError {
    PatchError::IndexOutOfBounds {
        path: path.to_string(),
        token: token.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tree() -> UiNode {
        serde_json::from_value(json!({
            "type": "card",
            "props": {"title": "Profile"},
            "children": [
                {"type": "heading", "props": {"text": "A"}},
                {"type": "paragraph", "props": {"text": "B"}}
            ]
        }))
        .expect("tree")
    }

    fn texts(node: &UiNode) -> Vec<&str> {
        node.children
            .iter()
            .map(|child| child.props["text"].as_str().unwrap_or(""))
            .collect()
    }

    #[test]
    fn append_child_with_dash() {
        let outcome = apply_patch(
            &tree(),
            &[PatchOperation::add(
                "/children/-",
                json!({"type": "divider", "props": {}}),
            )],
        )
        .expect("patch");

        assert_eq!(outcome.tree.children.len(), 3);
        assert_eq!(outcome.tree.children[2].kind(), Some("divider"));
        assert_eq!(outcome.applied, 1);
        assert!(outcome.skipped.is_empty());
    }

    #[test]
    fn input_tree_is_never_mutated() {
        let original = tree();
        let outcome = apply_patch(&original, &[PatchOperation::remove("/children/0")]).expect("patch");
        assert_eq!(original, tree());
        assert_eq!(outcome.tree.children.len(), 1);
    }

    #[test]
    fn add_inserts_at_index_and_shifts_right() {
        let outcome = apply_patch(
            &tree(),
            &[PatchOperation::add(
                "/children/1",
                json!({"type": "paragraph", "props": {"text": "new"}}),
            )],
        )
        .expect("patch");

        assert_eq!(texts(&outcome.tree), vec!["A", "new", "B"]);
    }

    #[test]
    fn add_creates_missing_intermediates() {
        let mut document = json!({});
        let skipped = apply_operations(
            &mut document,
            &[
                PatchOperation::add("/props/style/color", json!("red")),
                PatchOperation::add("/props/tags/0", json!("first")),
            ],
        );

        assert!(skipped.is_empty());
        assert_eq!(
            document,
            json!({"props": {"style": {"color": "red"}, "tags": ["first"]}})
        );
    }

    #[test]
    fn add_then_remove_restores_object_and_array() {
        let original = tree();

        let object = apply_patch(
            &original,
            &[
                PatchOperation::add("/props/subtitle", json!("Sub")),
                PatchOperation::remove("/props/subtitle"),
            ],
        )
        .expect("patch");
        assert_eq!(object.tree, original);

        let array = apply_patch(
            &original,
            &[
                PatchOperation::add("/children/1", json!({"type": "divider"})),
                PatchOperation::remove("/children/1"),
            ],
        )
        .expect("patch");
        assert_eq!(array.tree, original);
    }

    #[test]
    fn replace_with_same_value_is_a_no_op() {
        let original = tree();
        let outcome = apply_patch(
            &original,
            &[PatchOperation::replace("/props/title", json!("Profile"))],
        )
        .expect("patch");

        assert_eq!(
            serde_json::to_string(&outcome.tree).expect("encode"),
            serde_json::to_string(&original).expect("encode")
        );
    }

    #[test]
    fn replace_overwrites_without_shifting() {
        let outcome = apply_patch(
            &tree(),
            &[PatchOperation::replace(
                "/children/0",
                json!({"type": "paragraph", "props": {"text": "Z"}}),
            )],
        )
        .expect("patch");

        assert_eq!(texts(&outcome.tree), vec!["Z", "B"]);
    }

    #[test]
    fn replace_past_the_end_is_skipped() {
        let outcome = apply_patch(
            &tree(),
            &[PatchOperation::replace("/children/2", json!({"type": "divider"}))],
        )
        .expect("patch");

        assert_eq!(outcome.tree.children.len(), 2);
        assert!(matches!(
            outcome.skipped[0].error,
            PatchError::IndexOutOfBounds { .. }
        ));
    }

    #[test]
    fn unknown_op_is_skipped_and_others_apply() {
        let operations: Vec<PatchOperation> = serde_json::from_value(json!([
            {"op": "replace", "path": "/props/title", "value": "X"},
            {"op": "bogus", "path": "/x"},
            {"op": "add", "path": "/props/subtitle", "value": "Y"}
        ]))
        .expect("operations");

        let outcome = apply_patch(&tree(), &operations).expect("patch");

        assert_eq!(outcome.tree.props["title"], "X");
        assert_eq!(outcome.tree.props["subtitle"], "Y");
        assert_eq!(outcome.applied, 2);
        assert_eq!(outcome.skipped.len(), 1);
        assert_eq!(outcome.skipped[0].index, 1);
        assert_eq!(outcome.skipped[0].error, PatchError::UnknownOp("bogus".to_string()));
    }

    #[test]
    fn failed_walk_is_skipped() {
        let outcome = apply_patch(
            &tree(),
            &[
                PatchOperation::remove("/children/5/props"),
                PatchOperation::replace("/missing/deep", json!(1)),
                PatchOperation::remove("relative/path"),
                PatchOperation::add("/props/title/inner", json!(1)),
            ],
        )
        .expect("patch");

        assert_eq!(outcome.applied, 0);
        assert_eq!(
            outcome.skipped.iter().map(|s| s.error.clone()).collect::<Vec<_>>(),
            vec![
                PatchError::PathNotFound("/children/5/props".to_string()),
                PatchError::PathNotFound("/missing/deep".to_string()),
                PatchError::InvalidPath {
                    path: "relative/path".to_string(),
                    reason: "must start with '/'".to_string(),
                },
                PatchError::NotAContainer {
                    path: "/props/title/inner".to_string(),
                    token: "inner".to_string(),
                },
            ]
        );
        assert_eq!(outcome.tree, tree());
    }

    #[test]
    fn missing_value_field_is_reported() {
        let operation = PatchOperation {
            op: "add".to_string(),
            path: "/props/x".to_string(),
            from: None,
            value: None,
        };
        let outcome = apply_patch(&tree(), &[operation]).expect("patch");
        assert_eq!(
            outcome.skipped[0].error,
            PatchError::MissingField {
                op: "add".to_string(),
                field: "value",
            }
        );
    }

    #[test]
    fn explicit_null_value_is_applied() {
        let operations: Vec<PatchOperation> = serde_json::from_value(json!([
            {"op": "replace", "path": "/props/error", "value": null},
            {"op": "add", "path": "/props/value", "value": null},
            {"op": "add", "path": "/props/missing"}
        ]))
        .expect("operations");
        assert_eq!(operations[0].value, Some(Value::Null));
        assert_eq!(operations[2].value, None);

        let mut document = json!({"props": {"error": "bad", "value": 3}});
        let skipped = apply_operations(&mut document, &operations);

        assert_eq!(skipped.len(), 1);
        assert_eq!(skipped[0].index, 2);
        assert_eq!(document, json!({"props": {"error": null, "value": null}}));
    }

    #[test]
    fn failed_add_into_fresh_intermediates_is_undone() {
        let mut document = json!({"props": {"list": null}});
        let skipped = apply_operations(
            &mut document,
            &[
                PatchOperation::add("/props/list/3", json!("x")),
                PatchOperation::add("/props/style/tags/2", json!("y")),
            ],
        );

        assert_eq!(skipped.len(), 2);
        assert_eq!(document, json!({"props": {"list": null}}));
    }

    #[test]
    fn copy_deep_clones_the_source() {
        let outcome = apply_patch(
            &tree(),
            &[
                PatchOperation::copy("/children/0", "/children/-"),
                PatchOperation::replace("/children/0/props/text", json!("changed")),
            ],
        )
        .expect("patch");

        assert_eq!(texts(&outcome.tree), vec!["changed", "B", "A"]);
    }

    #[test]
    fn move_resolves_path_after_removal() {
        let mut document = json!({"items": ["a", "b", "c"]});
        let skipped = apply_operations(&mut document, &[PatchOperation::move_to("/items/0", "/items/2")]);

        assert!(skipped.is_empty());
        assert_eq!(document, json!({"items": ["b", "c", "a"]}));
    }

    #[test]
    fn move_between_containers() {
        let outcome = apply_patch(
            &tree(),
            &[
                PatchOperation::add("/children/-", json!({"type": "card", "children": []})),
                PatchOperation::move_to("/children/0", "/children/1/children/-"),
            ],
        )
        .expect("patch");

        assert_eq!(outcome.tree.children.len(), 2);
        assert_eq!(outcome.tree.children[0].props["text"], "B");
        assert_eq!(outcome.tree.children[1].children[0].props["text"], "A");
    }

    #[test]
    fn failed_move_keeps_the_source() {
        let mut document = json!({"items": ["a", "b"], "other": 1});
        let skipped = apply_operations(
            &mut document,
            &[PatchOperation::move_to("/items/0", "/other/nested")],
        );

        assert_eq!(skipped.len(), 1);
        assert_eq!(document, json!({"items": ["a", "b"], "other": 1}));
    }

    #[test]
    fn move_into_own_descendant_is_rejected() {
        let outcome = apply_patch(
            &tree(),
            &[PatchOperation::move_to("/children/0", "/children/0/children/-")],
        )
        .expect("patch");

        assert!(matches!(
            outcome.skipped[0].error,
            PatchError::MoveIntoSelf { .. }
        ));
        assert_eq!(outcome.tree, tree());
    }

    #[test]
    fn empty_segments_are_dropped_and_escapes_decoded() {
        let mut document = json!({"props": {}});
        let skipped = apply_operations(
            &mut document,
            &[
                PatchOperation::add("//props//a~1b/", json!(1)),
                PatchOperation::add("/props/c~0d", json!(2)),
            ],
        );

        assert!(skipped.is_empty());
        assert_eq!(document, json!({"props": {"a/b": 1, "c~d": 2}}));
    }

    #[test]
    fn root_remove_is_rejected_but_replace_swaps_the_tree() {
        let outcome = apply_patch(
            &tree(),
            &[
                PatchOperation::remove("/"),
                PatchOperation::replace("", json!({"type": "divider"})),
            ],
        )
        .expect("patch");

        assert_eq!(outcome.skipped.len(), 1);
        assert_eq!(outcome.tree, UiNode::new("divider"));
    }

    #[test]
    fn result_that_is_not_a_tree_is_an_error() {
        let result = apply_patch(
            &tree(),
            &[PatchOperation::replace("/children", json!("not a list"))],
        );
        assert!(matches!(result, Err(PatchError::InvalidTree(_))));
    }
}
