use std::fs::{self, File, Metadata};
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, info};
use walkdir::WalkDir;
use zip::write::FileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

use crate::adapters::config_store::replace_file;
use crate::error::{GenerateError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub path: PathBuf,
    pub name: String,
    pub unix_mode: u32,
}

/// Zip every regular file under `source_root` into `output_path` and return
/// the archive bytes.
///
/// Entries are written in file-name order with a fixed timestamp, so an
/// unchanged tree packs to identical bytes. The output file itself is never
/// archived, even when it lives inside `source_root`.
pub fn pack(source_root: &Path, output_path: &Path) -> Result<Vec<u8>> {
    pack_excluding(source_root, output_path, &[])
}

/// [`pack`], additionally skipping `also_excluded` paths that exist.
///
/// The archive is written to a sibling temp file and renamed over
/// `output_path` once complete. A failed run leaves any previous archive
/// untouched.
pub fn pack_excluding(
    source_root: &Path,
    output_path: &Path,
    also_excluded: &[PathBuf],
) -> Result<Vec<u8>> {
    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|error| {
                GenerateError::io(
                    format!("failed to create archive directory '{}'", parent.display()),
                    error,
                )
            })?;
        }
    }

    let temp_path = temp_archive_path(output_path);
    let mut excluded = vec![resolved_target(output_path)?, resolved_target(&temp_path)?];
    for path in also_excluded.iter().filter(|path| path.exists()) {
        excluded.push(canonical(path)?);
    }
    let entries = collect_entries(source_root, &excluded)?;

    if let Err(error) = write_archive(&temp_path, &entries) {
        let _ = fs::remove_file(&temp_path);
        return Err(error);
    }
    replace_file(&temp_path, output_path)?;

    let bytes = fs::read(output_path).map_err(|error| {
        GenerateError::io(
            format!("failed to read archive '{}'", output_path.display()),
            error,
        )
    })?;
    info!(
        archive = %output_path.display(),
        files = entries.len(),
        bytes = bytes.len(),
        "packaged source tree"
    );
    Ok(bytes)
}

fn write_archive(path: &Path, entries: &[ArchiveEntry]) -> Result<()> {
    let file = File::create(path).map_err(|error| {
        GenerateError::io(format!("failed to create archive '{}'", path.display()), error)
    })?;

    let mut zip = ZipWriter::new(file);
    for entry in entries {
        let options = FileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .last_modified_time(DateTime::default())
            .unix_permissions(entry.unix_mode);
        zip.start_file(entry.name.as_str(), options)?;

        let mut source = File::open(&entry.path).map_err(|error| {
            GenerateError::io(
                format!("failed to open '{}'", entry.path.display()),
                error,
            )
        })?;
        io::copy(&mut source, &mut zip).map_err(|error| {
            GenerateError::io(
                format!("failed to archive '{}'", entry.path.display()),
                error,
            )
        })?;
        debug!(entry = %entry.name, "archived file");
    }

    let file = zip.finish()?;
    file.sync_all().map_err(|error| {
        GenerateError::io(format!("failed to flush archive '{}'", path.display()), error)
    })
}

/// Regular files under `source_root`, sorted by path, minus the canonical
/// paths in `excluded`.
///
/// Symlinks are followed when they resolve to a regular file; symlinked
/// directories are not descended into and dangling symlinks are skipped.
pub fn collect_entries(source_root: &Path, excluded: &[PathBuf]) -> Result<Vec<ArchiveEntry>> {
    if !source_root.is_dir() {
        return Err(GenerateError::io(
            format!("cannot package '{}'", source_root.display()),
            io::Error::new(io::ErrorKind::NotFound, "source root is not a directory"),
        ));
    }

    let mut entries = Vec::new();
    for entry in WalkDir::new(source_root).sort_by_file_name() {
        let entry = entry?;
        if entry.file_type().is_dir() {
            continue;
        }

        let path = entry.path();
        let metadata = match fs::metadata(path) {
            Ok(metadata) => metadata,
            Err(error) if error.kind() == io::ErrorKind::NotFound && entry.path_is_symlink() => {
                debug!(path = %path.display(), "skipping dangling symlink");
                continue;
            }
            Err(error) => {
                return Err(GenerateError::io(
                    format!("failed to stat '{}'", path.display()),
                    error,
                ))
            }
        };
        if !metadata.is_file() {
            continue;
        }
        if excluded.contains(&canonical(path)?) {
            continue;
        }

        entries.push(ArchiveEntry {
            path: path.to_path_buf(),
            name: entry_name(source_root, path)?,
            unix_mode: unix_mode(&metadata),
        });
    }
    Ok(entries)
}

fn canonical(path: &Path) -> Result<PathBuf> {
    fs::canonicalize(path).map_err(|error| {
        GenerateError::io(format!("failed to resolve '{}'", path.display()), error)
    })
}

/// Canonical location of `path`, which may not exist yet.
fn resolved_target(path: &Path) -> Result<PathBuf> {
    if path.exists() {
        return canonical(path);
    }

    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let file_name = path.file_name().ok_or_else(|| {
        GenerateError::io(
            format!("archive path '{}' has no file name", path.display()),
            io::Error::new(io::ErrorKind::InvalidInput, "missing file name"),
        )
    })?;
    Ok(canonical(parent)?.join(file_name))
}

fn temp_archive_path(output_path: &Path) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_nanos())
        .unwrap_or(0);
    output_path.with_extension(format!("zip.tmp.{nanos}"))
}

/// Slash-separated path of `path` relative to `source_root`.
///
/// Zip entry names are UTF-8, so a non UTF-8 component is an error rather
/// than a lossy rename that could collide with another file.
fn entry_name(source_root: &Path, path: &Path) -> Result<String> {
    let relative = path.strip_prefix(source_root).unwrap_or(path);
    let mut components = Vec::new();
    for component in relative.components() {
        let Some(component) = component.as_os_str().to_str() else {
            return Err(GenerateError::io(
                format!("cannot archive non UTF-8 path '{}'", path.display()),
                io::Error::new(io::ErrorKind::InvalidData, "file name is not valid UTF-8"),
            ));
        };
        components.push(component);
    }
    Ok(components.join("/"))
}

#[cfg(unix)]
fn unix_mode(metadata: &Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o777
}

#[cfg(not(unix))]
fn unix_mode(_metadata: &Metadata) -> u32 {
    0o644
}
