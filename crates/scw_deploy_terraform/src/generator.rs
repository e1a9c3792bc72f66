use std::path::{Path, PathBuf};

use scw_deploy_core::contract::{
    FunctionSpec, ServiceContext, FUNCTIONS_ARCHIVE_FILE, TERRAFORM_OUTPUT_FILE,
};
use scw_deploy_core::digest::{digest, ArchiveDigest};
use scw_deploy_core::reconcile::{reconcile_document, FunctionPackage, ReconcileSummary};
use tracing::info;

use crate::adapters::config_store::{load_document, save_document_atomic, TemplateSource};
use crate::adapters::dependencies::DependencyMaterializer;
use crate::adapters::packager::pack_excluding;
use crate::error::Result;

pub const DEFAULT_RUNTIME: &str = "python311";

/// Produces deployment configuration for an application into `output_dir`.
pub trait Generator {
    fn write(&self, output_dir: &Path) -> Result<GenerationReport>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratorOptions {
    pub project_root: PathBuf,
    pub runtime: String,
    pub template: TemplateSource,
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        Self {
            project_root: PathBuf::from("."),
            runtime: DEFAULT_RUNTIME.to_string(),
            template: TemplateSource::Bundled,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationReport {
    pub config_path: PathBuf,
    pub archive_path: PathBuf,
    pub zip_hash: ArchiveDigest,
    pub summary: ReconcileSummary,
}

/// Reconciles `terraform.tf.json` against the declared functions and
/// packages the project tree as `functions.zip`.
pub struct TerraformGenerator<D> {
    service: ServiceContext,
    functions: Vec<FunctionSpec>,
    dependencies: D,
    options: GeneratorOptions,
}

impl<D: DependencyMaterializer> TerraformGenerator<D> {
    pub fn new(
        service: ServiceContext,
        functions: Vec<FunctionSpec>,
        dependencies: D,
        options: GeneratorOptions,
    ) -> Self {
        Self {
            service,
            functions,
            dependencies,
            options,
        }
    }
}

impl<D: DependencyMaterializer> Generator for TerraformGenerator<D> {
    fn write(&self, output_dir: &Path) -> Result<GenerationReport> {
        let config_path = output_dir.join(TERRAFORM_OUTPUT_FILE);
        let archive_path = output_dir.join(FUNCTIONS_ARCHIVE_FILE);

        let mut document = load_document(&config_path, &self.options.template)?;

        self.dependencies.materialize(&self.options.project_root)?;

        // The generated document embeds the digest, so it must not feed it.
        let bytes = pack_excluding(
            &self.options.project_root,
            &archive_path,
            std::slice::from_ref(&config_path),
        )?;
        let zip_hash = digest(&bytes);

        let package = FunctionPackage {
            runtime: self.options.runtime.clone(),
            zip_file: FUNCTIONS_ARCHIVE_FILE.to_string(),
            zip_hash: zip_hash.clone(),
        };
        let summary = reconcile_document(&mut document, &self.service, &self.functions, &package);
        info!(
            service = %self.service.service_name,
            upserted = summary.upserted.len(),
            pruned = ?summary.pruned,
            zip_hash = %zip_hash,
            "reconciled terraform document"
        );

        save_document_atomic(&config_path, &document)?;

        Ok(GenerationReport {
            config_path,
            archive_path,
            zip_hash,
            summary,
        })
    }
}
