//! Shared deployment-generation domain primitives.
//!
//! This crate owns the function/service model, the argument allowlist, the
//! archive digest and the Terraform document merge strategies. It
//! intentionally excludes filesystem, archive and process concerns, which
//! live in `scw_deploy_terraform`.

pub mod allowlist;
pub mod contract;
pub mod digest;
pub mod document;
pub mod reconcile;
