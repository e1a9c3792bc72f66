//! Merge strategies applied to a loaded [`ConfigDocument`].
//!
//! The namespace entry and the function entries are merged differently on
//! purpose. The namespace is upsert-only: fields the caller did not supply,
//! such as a previously written environment, are left alone, and the entry is
//! never removed. Function entries are fully reconciled: every declared
//! function is upserted and every undeclared one is pruned.

use std::collections::HashSet;

use serde_json::Value;

use crate::allowlist::{clear_allowed_args, filter_args};
use crate::contract::{FunctionSpec, ServiceContext};
use crate::digest::ArchiveDigest;
use crate::document::{with_object_entry, ConfigDocument, FUNCTION_RESOURCE, NAMESPACE_RESOURCE};

/// Package fields stamped on every function body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionPackage {
    pub runtime: String,
    pub zip_file: String,
    pub zip_hash: ArchiveDigest,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub upserted: Vec<String>,
    pub pruned: Vec<String>,
}

pub fn namespace_display_name(service_name: &str) -> String {
    format!("{service_name}-function-namespace")
}

pub fn namespace_description(service_name: &str) -> String {
    format!("{service_name} function namespace")
}

/// Terraform interpolation resolving to the namespace id at apply time.
pub fn namespace_reference(service_name: &str) -> String {
    format!("${{{NAMESPACE_RESOURCE}.{service_name}.id}}")
}

pub fn upsert_namespace(document: &mut ConfigDocument, service: &ServiceContext) {
    document.with_resource_type(NAMESPACE_RESOURCE, |namespaces| {
        with_object_entry(namespaces, &service.service_name, |body| {
            body.insert(
                "name".to_string(),
                Value::from(namespace_display_name(&service.service_name)),
            );
            body.insert(
                "description".to_string(),
                Value::from(namespace_description(&service.service_name)),
            );
            if let Some(environment) = &service.environment {
                let variables = environment
                    .iter()
                    .map(|(key, value)| (key.clone(), Value::from(value.as_str())))
                    .collect();
                body.insert("environment_variables".to_string(), Value::Object(variables));
            }
        });
    });
}

pub fn upsert_functions(
    document: &mut ConfigDocument,
    service: &ServiceContext,
    functions: &[FunctionSpec],
    package: &FunctionPackage,
) -> Vec<String> {
    let namespace_id = namespace_reference(&service.service_name);
    document.with_resource_type(FUNCTION_RESOURCE, |instances| {
        let mut upserted = Vec::with_capacity(functions.len());
        for function in functions {
            with_object_entry(instances, &function.name, |body| {
                clear_allowed_args(body);

                body.insert("namespace_id".to_string(), Value::from(namespace_id.as_str()));
                body.insert("runtime".to_string(), Value::from(package.runtime.as_str()));
                body.insert("handler".to_string(), Value::from(function.handler.as_str()));
                body.insert("name".to_string(), Value::from(function.name.as_str()));
                body.insert("zip_file".to_string(), Value::from(package.zip_file.as_str()));
                body.insert(
                    "zip_hash".to_string(),
                    Value::from(package.zip_hash.as_str()),
                );
                body.insert("deploy".to_string(), Value::Bool(true));

                filter_args(body, &function.args);
            });
            upserted.push(function.name.clone());
        }
        upserted
    })
}

/// Drop every function entry that is not declared. Returns the pruned names.
pub fn prune_functions(document: &mut ConfigDocument, functions: &[FunctionSpec]) -> Vec<String> {
    let declared: HashSet<&str> = functions.iter().map(|f| f.name.as_str()).collect();
    document.with_resource_type(FUNCTION_RESOURCE, |instances| {
        let pruned: Vec<String> = instances
            .keys()
            .filter(|name| !declared.contains(name.as_str()))
            .cloned()
            .collect();
        instances.retain(|name, _| declared.contains(name.as_str()));
        pruned
    })
}

pub fn reconcile_document(
    document: &mut ConfigDocument,
    service: &ServiceContext,
    functions: &[FunctionSpec],
    package: &FunctionPackage,
) -> ReconcileSummary {
    upsert_namespace(document, service);
    let upserted = upsert_functions(document, service, functions, package);
    let pruned = prune_functions(document, functions);
    ReconcileSummary { upserted, pruned }
}
