//! Filesystem-facing adapters and the Terraform generator entry point.
//!
//! This crate owns packaging (zip archive of the project tree), loading and
//! atomically persisting `terraform.tf.json`, and the dependency
//! materialization hook. Document merge rules live in `scw_deploy_core`.

pub mod adapters;
pub mod error;
pub mod generator;

pub use error::{GenerateError, Result};
pub use generator::{GenerationReport, Generator, GeneratorOptions, TerraformGenerator};
