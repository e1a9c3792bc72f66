use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use scw_deploy_core::document::ConfigDocument;
use serde_json::Value;
use tracing::info;

use crate::error::{GenerateError, Result};

pub const BUNDLED_TEMPLATE: &str = include_str!("../../templates/terraform.tf.json");
const BUNDLED_TEMPLATE_NAME: &str = "<bundled terraform.tf.json>";

/// Starting document used when no generated file exists yet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TemplateSource {
    #[default]
    Bundled,
    File(PathBuf),
}

/// Load the document at `path`, or the template when `path` does not exist.
///
/// The two are never merged. A malformed existing file is an error rather
/// than a reason to fall back to the template.
pub fn load_document(path: &Path, template: &TemplateSource) -> Result<ConfigDocument> {
    if path.exists() {
        info!(path = %path.display(), "loading existing terraform document");
        let contents = read_to_string(path)?;
        return parse_document(&contents, path);
    }

    match template {
        TemplateSource::Bundled => {
            info!("bootstrapping terraform document from bundled template");
            parse_document(BUNDLED_TEMPLATE, Path::new(BUNDLED_TEMPLATE_NAME))
        }
        TemplateSource::File(template_path) => {
            info!(template = %template_path.display(), "bootstrapping terraform document from template");
            let contents = read_to_string(template_path)?;
            parse_document(&contents, template_path)
        }
    }
}

fn read_to_string(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|error| {
        GenerateError::io(
            format!("failed to read terraform document '{}'", path.display()),
            error,
        )
    })
}

fn parse_document(contents: &str, path: &Path) -> Result<ConfigDocument> {
    let value: Value = serde_json::from_str(contents).map_err(|source| GenerateError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    ConfigDocument::from_value(value).map_err(|source| GenerateError::InvalidDocument {
        path: path.to_path_buf(),
        source,
    })
}

/// Write `document` next to `path` and rename it into place.
pub fn save_document_atomic(path: &Path, document: &ConfigDocument) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|error| {
                GenerateError::io(
                    format!("failed to create output directory '{}'", parent.display()),
                    error,
                )
            })?;
        }
    }

    let serialized = document.to_pretty_json().map_err(|error| {
        GenerateError::io("failed to serialize terraform document", error.into())
    })?;

    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_nanos())
        .unwrap_or(0);
    let temp_path = path.with_extension(format!("json.tmp.{nanos}"));
    let mut temp_file = File::create(&temp_path).map_err(|error| {
        GenerateError::io(
            format!("failed to create temp file '{}'", temp_path.display()),
            error,
        )
    })?;
    temp_file
        .write_all(serialized.as_bytes())
        .map_err(|error| {
            GenerateError::io(
                format!("failed to write temp file '{}'", temp_path.display()),
                error,
            )
        })?;
    temp_file.sync_all().map_err(|error| {
        GenerateError::io(
            format!("failed to flush temp file '{}'", temp_path.display()),
            error,
        )
    })?;
    drop(temp_file);

    replace_file(&temp_path, path)?;
    info!(path = %path.display(), "wrote terraform document");
    Ok(())
}

pub(crate) fn replace_file(temp_path: &Path, target_path: &Path) -> Result<()> {
    let Err(first_error) = fs::rename(temp_path, target_path) else {
        return Ok(());
    };

    if !target_path.exists() {
        let _ = fs::remove_file(temp_path);
        return Err(GenerateError::io(
            format!(
                "failed to move '{}' to '{}'",
                temp_path.display(),
                target_path.display()
            ),
            first_error,
        ));
    }

    // Some platforms refuse to rename over an existing file.
    fs::remove_file(target_path).map_err(|remove_error| {
        let _ = fs::remove_file(temp_path);
        GenerateError::io(
            format!(
                "failed to replace '{}' (rename failed: {first_error})",
                target_path.display()
            ),
            remove_error,
        )
    })?;
    fs::rename(temp_path, target_path).map_err(|rename_error| {
        let _ = fs::remove_file(temp_path);
        GenerateError::io(
            format!(
                "failed to move '{}' to '{}'",
                temp_path.display(),
                target_path.display()
            ),
            rename_error,
        )
    })
}
