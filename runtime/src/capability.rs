use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Runtime kind of a JSON prop value. Arrays are a distinct kind from objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropKind {
    String,
    Number,
    Boolean,
    Object,
    Array,
    Null,
    Any,
}

impl PropKind {
    pub fn of(value: &Value) -> Self {
        match value {
            Value::String(_) => Self::String,
            Value::Number(_) => Self::Number,
            Value::Bool(_) => Self::Boolean,
            Value::Object(_) => Self::Object,
            Value::Array(_) => Self::Array,
            Value::Null => Self::Null,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Object => "object",
            Self::Array => "array",
            Self::Null => "null",
            Self::Any => "any",
        }
    }

    pub fn accepts(self, value: &Value) -> bool {
        self == Self::Any || self == Self::of(value)
    }
}

impl fmt::Display for PropKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TypeSpec {
    One(PropKind),
    AnyOf(Vec<PropKind>),
}

impl TypeSpec {
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            Self::One(kind) => kind.accepts(value),
            Self::AnyOf(kinds) => kinds.iter().any(|kind| kind.accepts(value)),
        }
    }
}

impl fmt::Display for TypeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::One(kind) => write!(f, "{kind}"),
            Self::AnyOf(kinds) => {
                let names: Vec<&str> = kinds.iter().map(|kind| kind.as_str()).collect();
                f.write_str(&names.join(" | "))
            }
        }
    }
}

/// Validation-only description of a prop. Never used to coerce values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PropSpec {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<TypeSpec>,
    #[serde(rename = "enum", default, skip_serializing_if = "Option::is_none")]
    pub allowed: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl PropSpec {
    pub fn of(kind: PropKind) -> Self {
        Self {
            kind: Some(TypeSpec::One(kind)),
            ..Self::default()
        }
    }

    pub fn any_of(kinds: impl IntoIterator<Item = PropKind>) -> Self {
        Self {
            kind: Some(TypeSpec::AnyOf(kinds.into_iter().collect())),
            ..Self::default()
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn one_of(mut self, allowed: impl IntoIterator<Item = Value>) -> Self {
        self.allowed = Some(allowed.into_iter().collect());
        self
    }

    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Capability {
    pub name: String,
    #[serde(default)]
    pub props_schema: BTreeMap<String, PropSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub events_schema: Option<BTreeMap<String, EventSpec>>,
    #[serde(default)]
    pub is_container: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_host: Option<String>,
}

impl Capability {
    pub fn leaf(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            props_schema: BTreeMap::new(),
            events_schema: None,
            is_container: false,
            content_host: None,
        }
    }

    pub fn container(name: impl Into<String>, content_host: impl Into<String>) -> Self {
        Self {
            is_container: true,
            content_host: Some(content_host.into()),
            ..Self::leaf(name)
        }
    }

    pub fn prop(mut self, name: impl Into<String>, spec: PropSpec) -> Self {
        self.props_schema.insert(name.into(), spec);
        self
    }

    pub fn event(mut self, name: impl Into<String>) -> Self {
        self.events_schema
            .get_or_insert_with(BTreeMap::new)
            .insert(name.into(), EventSpec::default());
        self
    }

    /// Whether `event` is allowed. Capabilities without an events schema
    /// accept any event name.
    pub fn declares_event(&self, event: &str) -> bool {
        self.events_schema
            .as_ref()
            .is_none_or(|events| events.contains_key(event))
    }
}
