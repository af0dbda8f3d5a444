//! Tool input schemas as a tagged-variant tree
//!
//! Each tool declares its parameter shape once at registration. The same
//! tree serializes to the JSON-Schema form the LLM sees and drives runtime
//! validation, with no reflection involved.

use serde_json::{Value, json};

/// Schema node for one value position
#[derive(Debug, Clone)]
pub enum SchemaNode {
    Object {
        /// Property name → schema, in declaration order
        properties: Vec<(String, SchemaNode)>,
        required: Vec<String>,
    },
    Array {
        items: Box<SchemaNode>,
    },
    String {
        description: Option<String>,
        enum_values: Option<Vec<String>>,
    },
    Integer {
        description: Option<String>,
        minimum: Option<i64>,
    },
    Number {
        description: Option<String>,
    },
    Boolean {
        description: Option<String>,
    },
}

impl SchemaNode {
    /// Object with properties and a required list
    pub fn object(properties: Vec<(&str, SchemaNode)>, required: &[&str]) -> Self {
        SchemaNode::Object {
            properties: properties.into_iter().map(|(k, v)| (k.to_string(), v)).collect(),
            required: required.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn array(items: SchemaNode) -> Self {
        SchemaNode::Array { items: Box::new(items) }
    }

    pub fn string(description: &str) -> Self {
        SchemaNode::String {
            description: Some(description.to_string()),
            enum_values: None,
        }
    }

    pub fn string_enum(description: &str, values: &[&str]) -> Self {
        SchemaNode::String {
            description: Some(description.to_string()),
            enum_values: Some(values.iter().map(|s| s.to_string()).collect()),
        }
    }

    pub fn integer(description: &str) -> Self {
        SchemaNode::Integer {
            description: Some(description.to_string()),
            minimum: None,
        }
    }

    pub fn integer_min(description: &str, minimum: i64) -> Self {
        SchemaNode::Integer {
            description: Some(description.to_string()),
            minimum: Some(minimum),
        }
    }

    pub fn number(description: &str) -> Self {
        SchemaNode::Number {
            description: Some(description.to_string()),
        }
    }

    pub fn boolean(description: &str) -> Self {
        SchemaNode::Boolean {
            description: Some(description.to_string()),
        }
    }

    /// JSON-Schema form for the LLM wire
    pub fn to_json(&self) -> Value {
        match self {
            SchemaNode::Object { properties, required } => {
                let mut props = serde_json::Map::new();
                for (name, node) in properties {
                    props.insert(name.clone(), node.to_json());
                }
                let mut obj = json!({"type": "object", "properties": props});
                if !required.is_empty() {
                    obj["required"] = json!(required);
                }
                obj
            }
            SchemaNode::Array { items } => json!({"type": "array", "items": items.to_json()}),
            SchemaNode::String {
                description,
                enum_values,
            } => {
                let mut obj = json!({"type": "string"});
                if let Some(d) = description {
                    obj["description"] = json!(d);
                }
                if let Some(values) = enum_values {
                    obj["enum"] = json!(values);
                }
                obj
            }
            SchemaNode::Integer { description, minimum } => {
                let mut obj = json!({"type": "integer"});
                if let Some(d) = description {
                    obj["description"] = json!(d);
                }
                if let Some(m) = minimum {
                    obj["minimum"] = json!(m);
                }
                obj
            }
            SchemaNode::Number { description } => {
                let mut obj = json!({"type": "number"});
                if let Some(d) = description {
                    obj["description"] = json!(d);
                }
                obj
            }
            SchemaNode::Boolean { description } => {
                let mut obj = json!({"type": "boolean"});
                if let Some(d) = description {
                    obj["description"] = json!(d);
                }
                obj
            }
        }
    }

    /// Validate a value; violations are path-qualified messages
    pub fn validate(&self, value: &Value) -> Result<(), Vec<String>> {
        let mut violations = Vec::new();
        self.check(value, "$", &mut violations);
        if violations.is_empty() { Ok(()) } else { Err(violations) }
    }

    fn check(&self, value: &Value, path: &str, violations: &mut Vec<String>) {
        match self {
            SchemaNode::Object { properties, required } => {
                let Some(map) = value.as_object() else {
                    violations.push(format!("{}: expected object", path));
                    return;
                };
                for name in required {
                    if !map.contains_key(name) {
                        violations.push(format!("{}.{}: required property missing", path, name));
                    }
                }
                for (name, node) in properties {
                    if let Some(v) = map.get(name) {
                        node.check(v, &format!("{}.{}", path, name), violations);
                    }
                }
            }
            SchemaNode::Array { items } => {
                let Some(arr) = value.as_array() else {
                    violations.push(format!("{}: expected array", path));
                    return;
                };
                for (i, v) in arr.iter().enumerate() {
                    items.check(v, &format!("{}[{}]", path, i), violations);
                }
            }
            SchemaNode::String { enum_values, .. } => {
                let Some(s) = value.as_str() else {
                    violations.push(format!("{}: expected string", path));
                    return;
                };
                if let Some(values) = enum_values
                    && !values.iter().any(|v| v == s)
                {
                    violations.push(format!("{}: '{}' not in {:?}", path, s, values));
                }
            }
            SchemaNode::Integer { minimum, .. } => {
                let Some(n) = value.as_i64() else {
                    violations.push(format!("{}: expected integer", path));
                    return;
                };
                if let Some(m) = minimum
                    && n < *m
                {
                    violations.push(format!("{}: {} below minimum {}", path, n, m));
                }
            }
            SchemaNode::Number { .. } => {
                if !value.is_number() {
                    violations.push(format!("{}: expected number", path));
                }
            }
            SchemaNode::Boolean { .. } => {
                if !value.is_boolean() {
                    violations.push(format!("{}: expected boolean", path));
                }
            }
        }
    }
}
