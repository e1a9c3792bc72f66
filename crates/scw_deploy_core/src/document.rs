//! In-memory Terraform JSON document.
//!
//! The document is kept as a `serde_json` tree with insertion order preserved
//! so that every field the generator does not manage survives a
//! parse/serialize cycle untouched.

use serde_json::{Map, Value};

use crate::contract::ValidationError;

pub const RESOURCE_SECTION: &str = "resource";
pub const NAMESPACE_RESOURCE: &str = "scaleway_function_namespace";
pub const FUNCTION_RESOURCE: &str = "scaleway_function";

pub type ResourceBody = Map<String, Value>;

#[derive(Debug, Clone, PartialEq)]
pub struct ConfigDocument {
    root: Map<String, Value>,
}

impl ConfigDocument {
    pub fn empty() -> Self {
        let mut root = Map::new();
        root.insert(RESOURCE_SECTION.to_string(), Value::Object(Map::new()));
        Self { root }
    }

    /// Wrap a parsed JSON value, rejecting shapes the merge cannot work with.
    pub fn from_value(value: Value) -> Result<Self, ValidationError> {
        let Value::Object(root) = value else {
            return Err(ValidationError::new(
                "terraform document root must be a JSON object",
            ));
        };

        if let Some(section) = root.get(RESOURCE_SECTION) {
            let Some(types) = section.as_object() else {
                return Err(ValidationError::new(format!(
                    "'{RESOURCE_SECTION}' must be a JSON object"
                )));
            };
            for resource_type in [NAMESPACE_RESOURCE, FUNCTION_RESOURCE] {
                let Some(instances) = types.get(resource_type) else {
                    continue;
                };
                let Some(instances) = instances.as_object() else {
                    return Err(ValidationError::new(format!(
                        "'{RESOURCE_SECTION}.{resource_type}' must be a JSON object"
                    )));
                };
                if let Some((name, _)) = instances.iter().find(|(_, body)| !body.is_object()) {
                    return Err(ValidationError::new(format!(
                        "'{RESOURCE_SECTION}.{resource_type}.{name}' must be a JSON object"
                    )));
                }
            }
        }

        Ok(Self { root })
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.root)
    }

    /// Two-space indented JSON followed by a newline.
    pub fn to_pretty_json(&self) -> Result<String, serde_json::Error> {
        let mut serialized = serde_json::to_string_pretty(&self.root)?;
        serialized.push('\n');
        Ok(serialized)
    }

    pub fn resource_type(&self, resource_type: &str) -> Option<&Map<String, Value>> {
        self.root
            .get(RESOURCE_SECTION)
            .and_then(Value::as_object)
            .and_then(|types| types.get(resource_type))
            .and_then(Value::as_object)
    }

    pub fn resource(&self, resource_type: &str, name: &str) -> Option<&ResourceBody> {
        self.resource_type(resource_type)
            .and_then(|instances| instances.get(name))
            .and_then(Value::as_object)
    }

    pub fn resource_names(&self, resource_type: &str) -> Vec<String> {
        self.resource_type(resource_type)
            .map(|instances| instances.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Run `f` on the instances of `resource_type`, creating the section and
    /// type on demand.
    pub fn with_resource_type<R>(
        &mut self,
        resource_type: &str,
        f: impl FnOnce(&mut Map<String, Value>) -> R,
    ) -> R {
        with_object_entry(&mut self.root, RESOURCE_SECTION, |section| {
            with_object_entry(section, resource_type, f)
        })
    }
}

impl Default for ConfigDocument {
    fn default() -> Self {
        Self::empty()
    }
}

/// Run `f` on the object stored under `key`.
///
/// A missing key is inserted and a non-object value is replaced by an empty
/// object. The entry keeps its position in `map` either way.
pub(crate) fn with_object_entry<R>(
    map: &mut Map<String, Value>,
    key: &str,
    f: impl FnOnce(&mut Map<String, Value>) -> R,
) -> R {
    let slot = map.entry(key.to_string()).or_insert(Value::Null);
    let mut object = match std::mem::take(slot) {
        Value::Object(object) => object,
        _ => Map::new(),
    };
    let result = f(&mut object);
    *slot = Value::Object(object);
    result
}
