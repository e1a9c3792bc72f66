use std::collections::{BTreeMap, HashSet};

use serde::Deserialize;
use serde_json::{Map, Value};

pub const TERRAFORM_OUTPUT_FILE: &str = "terraform.tf.json";
pub const FUNCTIONS_ARCHIVE_FILE: &str = "functions.zip";

pub type FunctionArgs = Map<String, Value>;
pub type Environment = BTreeMap<String, String>;

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct FunctionSpec {
    #[serde(rename = "function_name", alias = "name")]
    pub name: String,
    pub handler: String,
    #[serde(default)]
    pub args: FunctionArgs,
}

impl FunctionSpec {
    pub fn new(name: impl Into<String>, handler: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            handler: handler.into(),
            args: FunctionArgs::new(),
        }
    }

    pub fn with_arg(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.args.insert(key.into(), value.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceContext {
    pub service_name: String,
    pub environment: Option<Environment>,
}

impl ServiceContext {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            environment: None,
        }
    }

    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = Some(environment);
        self
    }
}

/// Serialized application model: the service and the functions it exposes.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct AppManifest {
    pub service_name: String,
    #[serde(default, alias = "environment")]
    pub env: Option<Environment>,
    #[serde(default)]
    pub functions: Vec<FunctionSpec>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedApp {
    pub service: ServiceContext,
    pub functions: Vec<FunctionSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    message: String,
}

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ValidationError {}

impl AppManifest {
    pub fn normalize(self) -> Result<NormalizedApp, ValidationError> {
        let service_name = self.service_name.trim().to_string();
        if service_name.is_empty() {
            return Err(ValidationError::new("service_name cannot be empty"));
        }

        let mut seen = HashSet::with_capacity(self.functions.len());
        for function in &self.functions {
            if function.name.trim().is_empty() {
                return Err(ValidationError::new("function names must be non-empty"));
            }
            if function.handler.trim().is_empty() {
                return Err(ValidationError::new(format!(
                    "Function '{}' must declare a handler",
                    function.name
                )));
            }
            if !seen.insert(function.name.as_str()) {
                return Err(ValidationError::new(format!(
                    "Function '{}' is declared more than once",
                    function.name
                )));
            }
        }

        Ok(NormalizedApp {
            service: ServiceContext {
                service_name,
                environment: self.env,
            },
            functions: self.functions,
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn manifest_accepts_function_name_and_env_spellings() {
        let manifest: AppManifest = serde_json::from_value(json!({
            "service_name": "shop",
            "env": {"STAGE": "prod"},
            "functions": [
                {"function_name": "checkout", "handler": "handler.checkout", "args": {"memory_limit": 256}},
                {"name": "refund", "handler": "handler.refund"}
            ]
        }))
        .expect("manifest should parse");

        let app = manifest.normalize().expect("manifest should pass");
        assert_eq!(app.service.service_name, "shop");
        assert_eq!(
            app.service.environment,
            Some(Environment::from([("STAGE".to_string(), "prod".to_string())]))
        );
        assert_eq!(app.functions[0].name, "checkout");
        assert_eq!(app.functions[0].args.get("memory_limit"), Some(&json!(256)));
        assert_eq!(app.functions[1].name, "refund");
        assert!(app.functions[1].args.is_empty());
    }

    #[test]
    fn normalize_rejects_blank_service_name() {
        let manifest = AppManifest {
            service_name: "  ".to_string(),
            env: None,
            functions: Vec::new(),
        };

        let error = manifest.normalize().expect_err("manifest should fail");
        assert_eq!(error.message(), "service_name cannot be empty");
    }

    #[test]
    fn normalize_rejects_duplicate_function_names() {
        let manifest = AppManifest {
            service_name: "shop".to_string(),
            env: None,
            functions: vec![
                FunctionSpec::new("checkout", "handler.checkout"),
                FunctionSpec::new("checkout", "handler.other"),
            ],
        };

        let error = manifest.normalize().expect_err("manifest should fail");
        assert_eq!(
            error.message(),
            "Function 'checkout' is declared more than once"
        );
    }

    #[test]
    fn normalize_trims_service_name_and_keeps_missing_env() {
        let manifest = AppManifest {
            service_name: " shop ".to_string(),
            env: None,
            functions: vec![FunctionSpec::new("checkout", "handler.checkout")],
        };

        let app = manifest.normalize().expect("manifest should pass");
        assert_eq!(app.service, ServiceContext::new("shop"));
    }
}
