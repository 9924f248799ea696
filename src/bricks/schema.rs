//! Input schemas - what arguments a brick accepts

use crate::core::expression::TYPE_KEY;
use serde_json::{json, Map, Value};

/// Accepted type of a brick argument
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Any,
    String,
    Number,
    Integer,
    Boolean,
    Array,
    Object,
    /// An unresolved `pipeline` expression
    Pipeline,
}

impl ValueKind {
    fn matches(&self, value: &Value) -> bool {
        match self {
            ValueKind::Any => true,
            ValueKind::String => value.is_string(),
            ValueKind::Number => value.is_number(),
            ValueKind::Integer => value.is_i64() || value.is_u64(),
            ValueKind::Boolean => value.is_boolean(),
            ValueKind::Array => value.is_array(),
            ValueKind::Object => value.is_object(),
            ValueKind::Pipeline => value.get(TYPE_KEY).and_then(Value::as_str) == Some("pipeline"),
        }
    }

    fn json_type(&self) -> Option<&'static str> {
        match self {
            ValueKind::Any => None,
            ValueKind::String => Some("string"),
            ValueKind::Number => Some("number"),
            ValueKind::Integer => Some("integer"),
            ValueKind::Boolean => Some("boolean"),
            ValueKind::Array => Some("array"),
            ValueKind::Object | ValueKind::Pipeline => Some("object"),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            ValueKind::Any => "any",
            ValueKind::Pipeline => "pipeline",
            other => other.json_type().unwrap_or("any"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PropertySchema {
    pub name: String,
    pub kind: ValueKind,
    pub required: bool,
    pub description: Option<String>,
}

/// Properties a brick accepts. Unknown properties are allowed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputSchema {
    properties: Vec<PropertySchema>,
}

impl InputSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn required(mut self, name: impl Into<String>, kind: ValueKind) -> Self {
        self.properties.push(PropertySchema {
            name: name.into(),
            kind,
            required: true,
            description: None,
        });
        self
    }

    pub fn optional(mut self, name: impl Into<String>, kind: ValueKind) -> Self {
        self.properties.push(PropertySchema {
            name: name.into(),
            kind,
            required: false,
            description: None,
        });
        self
    }

    /// Describe the most recently added property
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        if let Some(property) = self.properties.last_mut() {
            property.description = Some(description.into());
        }
        self
    }

    pub fn properties(&self) -> &[PropertySchema] {
        &self.properties
    }

    /// Check resolved arguments; returns one message per problem
    pub fn validate(&self, args: &Map<String, Value>) -> Vec<String> {
        let mut errors = Vec::new();
        for property in &self.properties {
            match args.get(&property.name) {
                None | Some(Value::Null) if property.required => {
                    errors.push(format!("missing required property '{}'", property.name));
                }
                None | Some(Value::Null) => {}
                Some(value) if !property.kind.matches(value) => {
                    errors.push(format!(
                        "property '{}' must be {}",
                        property.name,
                        property.kind.name()
                    ));
                }
                Some(_) => {}
            }
        }
        errors
    }

    /// JSON Schema rendering, for listings
    pub fn to_json_schema(&self) -> Value {
        let properties: Map<String, Value> = self
            .properties
            .iter()
            .map(|property| {
                let mut schema = Map::new();
                if let Some(json_type) = property.kind.json_type() {
                    schema.insert("type".to_string(), json!(json_type));
                }
                if let Some(description) = &property.description {
                    schema.insert("description".to_string(), json!(description));
                }
                (property.name.clone(), Value::Object(schema))
            })
            .collect();
        let required: Vec<&str> = self
            .properties
            .iter()
            .filter(|property| property.required)
            .map(|property| property.name.as_str())
            .collect();

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }
}
