use std::fs::{self, File};
use std::io::Read;
use std::path::Path;

use scw_deploy_core::digest::digest;
use scw_deploy_terraform::adapters::packager::pack;
use scw_deploy_terraform::GenerateError;

fn write_tree(root: &Path) {
    fs::create_dir_all(root.join("app").join("routes")).unwrap();
    fs::write(root.join("app").join("__init__.py"), "").unwrap();
    fs::write(
        root.join("app").join("routes").join("orders.py"),
        "def list_orders(event, context):\n    return []\n",
    )
    .unwrap();
    fs::write(root.join("requirements.txt"), "requests==2.31.0\n").unwrap();
}

fn entry_names(archive_path: &Path) -> Vec<String> {
    let mut archive = zip::ZipArchive::new(File::open(archive_path).unwrap()).unwrap();
    (0..archive.len())
        .map(|index| archive.by_index(index).unwrap().name().to_string())
        .collect()
}

#[test]
fn archive_lists_files_in_sorted_relative_order() {
    let dir = tempfile::tempdir().unwrap();
    write_tree(dir.path());
    let output = dir.path().join("functions.zip");

    pack(dir.path(), &output).expect("pack should succeed");

    assert_eq!(
        entry_names(&output),
        vec![
            "app/__init__.py",
            "app/routes/orders.py",
            "requirements.txt"
        ]
    );
}

#[test]
fn archive_contents_match_source_files() {
    let dir = tempfile::tempdir().unwrap();
    write_tree(dir.path());
    let output = dir.path().join("dist").join("functions.zip");

    pack(dir.path(), &output).unwrap();

    let mut archive = zip::ZipArchive::new(File::open(&output).unwrap()).unwrap();
    let mut contents = String::new();
    archive
        .by_name("app/routes/orders.py")
        .unwrap()
        .read_to_string(&mut contents)
        .unwrap();
    assert_eq!(contents, "def list_orders(event, context):\n    return []\n");
}

#[test]
fn repacking_unchanged_tree_is_byte_identical_and_never_nests_itself() {
    let dir = tempfile::tempdir().unwrap();
    write_tree(dir.path());
    let output = dir.path().join("functions.zip");

    let first = pack(dir.path(), &output).unwrap();
    let second = pack(dir.path(), &output).unwrap();
    let third = pack(dir.path(), &output).unwrap();

    assert_eq!(first, second);
    assert_eq!(digest(&second), digest(&third));
    assert!(!entry_names(&output).contains(&"functions.zip".to_string()));
}

#[test]
fn one_changed_byte_changes_digest() {
    let dir = tempfile::tempdir().unwrap();
    write_tree(dir.path());
    let output = dir.path().join("functions.zip");
    let before = digest(&pack(dir.path(), &output).unwrap());

    fs::write(dir.path().join("requirements.txt"), "requests==2.31.1\n").unwrap();
    let after = digest(&pack(dir.path(), &output).unwrap());

    assert_ne!(before, after);
}

#[cfg(unix)]
#[test]
fn symlink_to_output_is_excluded_by_canonical_path() {
    let dir = tempfile::tempdir().unwrap();
    write_tree(dir.path());
    let output = dir.path().join("functions.zip");
    fs::write(&output, "previous archive").unwrap();
    std::os::unix::fs::symlink(&output, dir.path().join("latest.zip")).unwrap();

    pack(dir.path(), &output).unwrap();

    let names = entry_names(&output);
    assert!(!names.contains(&"latest.zip".to_string()));
    assert!(!names.contains(&"functions.zip".to_string()));
}

#[cfg(unix)]
#[test]
fn symlinked_files_are_archived_with_target_contents() {
    let dir = tempfile::tempdir().unwrap();
    write_tree(dir.path());
    std::os::unix::fs::symlink(
        dir.path().join("requirements.txt"),
        dir.path().join("requirements-lock.txt"),
    )
    .unwrap();
    let output = dir.path().join("functions.zip");

    pack(dir.path(), &output).unwrap();

    assert!(entry_names(&output).contains(&"requirements-lock.txt".to_string()));
}

#[test]
fn missing_source_root_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let result = pack(&dir.path().join("missing"), &dir.path().join("functions.zip"));
    assert!(result.is_err());
}

#[test]
fn unwritable_output_path_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    write_tree(dir.path());
    let blocker = dir.path().join("dist");
    fs::write(&blocker, "a file, not a directory").unwrap();

    let result = pack(dir.path(), &blocker.join("functions.zip"));

    assert!(matches!(result, Err(GenerateError::Io { .. })));
    assert_eq!(fs::read_to_string(&blocker).unwrap(), "a file, not a directory");
}

#[test]
fn failed_pack_leaves_existing_archive_untouched() {
    let dir = tempfile::tempdir().unwrap();
    write_tree(dir.path());
    let output = dir.path().join("out").join("functions.zip");
    let previous = pack(dir.path(), &output).unwrap();

    let result = pack(&dir.path().join("missing"), &output);

    assert!(matches!(result, Err(GenerateError::Io { .. })));
    assert_eq!(fs::read(&output).unwrap(), previous);
    assert_eq!(fs::read_dir(dir.path().join("out")).unwrap().count(), 1);
}
