use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use scw_deploy_core::contract::{AppManifest, NormalizedApp, FUNCTIONS_ARCHIVE_FILE};
use scw_deploy_core::digest::digest;
use scw_deploy_terraform::adapters::config_store::TemplateSource;
use scw_deploy_terraform::adapters::dependencies::{
    CommandMaterializer, DependencyMaterializer, SkipDependencies,
};
use scw_deploy_terraform::adapters::packager::pack;
use scw_deploy_terraform::generator::DEFAULT_RUNTIME;
use scw_deploy_terraform::{GenerationReport, Generator, GeneratorOptions, TerraformGenerator};
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

// ── CLI definition ─────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "scw-deploy",
    version,
    about = "Package serverless functions and generate their Terraform configuration",
    long_about = "Packages the project tree into a content-addressed zip archive and\n\
                  reconciles terraform.tf.json against the functions declared in an\n\
                  application manifest, keeping hand-edited configuration intact."
)]
struct Cli {
    /// Tracing filter, e.g. `info` or `scw_deploy_terraform=debug`
    #[arg(long, global = true, env = "SCW_DEPLOY_LOG", default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Package the project and reconcile terraform.tf.json
    Generate {
        /// Application manifest (JSON) declaring the service and its functions
        #[arg(long, env = "SCW_DEPLOY_MANIFEST", default_value = "scw-deploy.json")]
        manifest: PathBuf,
        /// Directory receiving terraform.tf.json and functions.zip
        #[arg(long, env = "SCW_DEPLOY_OUTPUT_DIR", default_value = ".scw")]
        output_dir: PathBuf,
        /// Root of the source tree to package
        #[arg(long, default_value = ".")]
        project_root: PathBuf,
        /// Runtime identifier written on every function
        #[arg(long, env = "SCW_DEPLOY_RUNTIME", default_value = DEFAULT_RUNTIME)]
        runtime: String,
        /// Starting document used when no terraform.tf.json exists yet
        #[arg(long)]
        template: Option<PathBuf>,
        /// Command run in the project root before packaging, e.g.
        /// "pip install -r requirements.txt --target package"
        #[arg(long, env = "SCW_DEPLOY_INSTALL_COMMAND")]
        install_command: Option<String>,
    },
    /// Package a directory and print the archive digest
    Package {
        /// Directory to package
        #[arg(long, default_value = ".")]
        source: PathBuf,
        /// Archive path
        #[arg(long, default_value = FUNCTIONS_ARCHIVE_FILE)]
        output: PathBuf,
    },
}

// ── helpers ────────────────────────────────────────────────────────

fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

fn load_manifest(path: &Path) -> Result<NormalizedApp> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read manifest '{}'", path.display()))?;
    let manifest: AppManifest = serde_json::from_str(&contents)
        .with_context(|| format!("invalid manifest '{}'", path.display()))?;
    manifest
        .normalize()
        .with_context(|| format!("invalid manifest '{}'", path.display()))
}

fn write_with<D: DependencyMaterializer>(
    app: NormalizedApp,
    dependencies: D,
    options: GeneratorOptions,
    output_dir: &Path,
) -> Result<GenerationReport> {
    let generator = TerraformGenerator::new(app.service, app.functions, dependencies, options);
    generator
        .write(output_dir)
        .with_context(|| format!("failed to generate into '{}'", output_dir.display()))
}

// ── commands ───────────────────────────────────────────────────────

fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Generate {
            manifest,
            output_dir,
            project_root,
            runtime,
            template,
            install_command,
        } => {
            let app = load_manifest(&manifest)?;
            info!(
                service = %app.service.service_name,
                functions = app.functions.len(),
                "loaded manifest"
            );

            let options = GeneratorOptions {
                project_root,
                runtime,
                template: template.map(TemplateSource::File).unwrap_or_default(),
            };
            let installer = install_command
                .as_deref()
                .and_then(CommandMaterializer::from_command_line);
            let report = match installer {
                Some(installer) => write_with(app, installer, options, &output_dir)?,
                None => write_with(app, SkipDependencies, options, &output_dir)?,
            };

            println!("config:   {}", report.config_path.display());
            println!("archive:  {}", report.archive_path.display());
            println!("zip_hash: {}", report.zip_hash);
            if !report.summary.pruned.is_empty() {
                println!("pruned:   {}", report.summary.pruned.join(", "));
            }
        }
        Commands::Package { source, output } => {
            let bytes = pack(&source, &output)
                .with_context(|| format!("failed to package '{}'", source.display()))?;
            println!("{}  {}", digest(&bytes), output.display());
        }
    }
    Ok(())
}

// ── main ───────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);
    run(cli.command)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_manifest(dir: &Path, contents: &str) -> PathBuf {
        let path = dir.join("scw-deploy.json");
        fs::write(&path, contents).expect("manifest should be written");
        path
    }

    #[test]
    fn generate_defaults() {
        let cli = Cli::try_parse_from(["scw-deploy", "generate"]).expect("cli should parse");
        match cli.command {
            Commands::Generate {
                manifest,
                output_dir,
                runtime,
                template,
                ..
            } => {
                assert_eq!(manifest, PathBuf::from("scw-deploy.json"));
                assert_eq!(output_dir, PathBuf::from(".scw"));
                assert_eq!(runtime, DEFAULT_RUNTIME);
                assert!(template.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
        assert_eq!(cli.log_level, "info");
    }

    #[test]
    fn manifest_validation_errors_name_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_manifest(dir.path(), r#"{"service_name": "", "functions": []}"#);

        let error = load_manifest(&path).expect_err("blank service should fail");
        let rendered = format!("{error:#}");
        assert!(rendered.contains("invalid manifest"));
        assert!(rendered.contains("service_name cannot be empty"));
    }

    #[test]
    fn generate_command_writes_document_and_archive() {
        let dir = tempfile::tempdir().unwrap();
        let project = dir.path().join("project");
        fs::create_dir_all(&project).unwrap();
        fs::write(project.join("handler.py"), "def handle(e, c):\n    return 1\n").unwrap();
        let manifest = write_manifest(
            dir.path(),
            r#"{
                "service_name": "shop",
                "env": {"STAGE": "dev"},
                "functions": [
                    {"function_name": "checkout", "handler": "handler.handle", "args": {"max_scale": 2, "timeout": 30}}
                ]
            }"#,
        );
        let output_dir = dir.path().join("out");

        run(Commands::Generate {
            manifest,
            output_dir: output_dir.clone(),
            project_root: project,
            runtime: "python310".to_string(),
            template: None,
            install_command: None,
        })
        .expect("generate should succeed");

        let document: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(output_dir.join("terraform.tf.json")).unwrap())
                .unwrap();
        let function = &document["resource"]["scaleway_function"]["checkout"];
        assert_eq!(function["runtime"], "python310");
        assert_eq!(function["max_scale"], 2);
        assert!(function.get("timeout").is_none());
        assert_eq!(
            document["resource"]["scaleway_function_namespace"]["shop"]["environment_variables"]
                ["STAGE"],
            "dev"
        );
        assert!(output_dir.join(FUNCTIONS_ARCHIVE_FILE).is_file());
    }
}
