//! Zip archive construction for artifact paths.

use std::fs;
use std::io::{Cursor, Write};
use std::path::Path;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

use crate::errors::{DeployError, Result};

const ZIP_MAGIC: [u8; 4] = [0x50, 0x4b, 0x03, 0x04];

/// Returns true if `bytes` start with a zip local file header.
#[must_use]
pub fn is_zip(bytes: &[u8]) -> bool {
    bytes.starts_with(&ZIP_MAGIC)
}

/// Produces zip bytes for `path`.
///
/// An existing zip file is returned unchanged. A directory is archived
/// recursively with paths relative to it; any other file is archived alone
/// under its file name. Entries are sorted and timestamps fixed, so the
/// same content always yields the same bytes.
pub fn archive_path(path: &Path) -> Result<Vec<u8>> {
    let metadata = fs::metadata(path).map_err(|e| DeployError::io(path, e))?;
    if metadata.is_dir() {
        return archive_directory(path);
    }

    let contents = fs::read(path).map_err(|e| DeployError::io(path, e))?;
    if is_zip(&contents) {
        return Ok(contents);
    }

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| DeployError::Validation(format!("{} has no file name", path.display())))?;

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    writer.start_file(name, entry_options(file_mode(&metadata)))?;
    writer
        .write_all(&contents)
        .map_err(|e| DeployError::io(path, e))?;
    Ok(writer.finish()?.into_inner())
}

fn archive_directory(root: &Path) -> Result<Vec<u8>> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));

    // Links are archived as the files and directories they point at.
    for entry in WalkDir::new(root)
        .follow_links(true)
        .sort_by_file_name()
        .min_depth(1)
    {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(root).to_path_buf();
            DeployError::io(path, e.into())
        })?;
        let relative = entry
            .path()
            .strip_prefix(root)
            .map_err(|e| DeployError::Validation(e.to_string()))?;
        let name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        let metadata = entry
            .metadata()
            .map_err(|e| DeployError::io(entry.path(), e.into()))?;

        if metadata.is_dir() {
            writer.add_directory(name, entry_options(file_mode(&metadata)))?;
        } else if metadata.is_file() {
            let contents = fs::read(entry.path()).map_err(|e| DeployError::io(entry.path(), e))?;
            writer.start_file(name, entry_options(file_mode(&metadata)))?;
            writer
                .write_all(&contents)
                .map_err(|e| DeployError::io(entry.path(), e))?;
        }
    }

    Ok(writer.finish()?.into_inner())
}

fn entry_options(mode: u32) -> SimpleFileOptions {
    SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(DateTime::default())
        .unix_permissions(mode)
}

#[cfg(unix)]
fn file_mode(metadata: &fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o777
}

#[cfg(not(unix))]
fn file_mode(metadata: &fs::Metadata) -> u32 {
    if metadata.is_dir() {
        0o755
    } else {
        0o644
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use zip::ZipArchive;

    fn entry_names(bytes: Vec<u8>) -> Vec<String> {
        let archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        archive.file_names().map(ToString::to_string).collect::<Vec<_>>()
    }

    #[test]
    fn test_directory_archive_uses_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("lib")).unwrap();
        fs::write(dir.path().join("index.js"), "exports.handler = 1;").unwrap();
        fs::write(dir.path().join("lib/util.js"), "module.exports = {};").unwrap();

        let bytes = archive_path(dir.path()).unwrap();
        assert!(is_zip(&bytes));

        let mut names = entry_names(bytes);
        names.sort();
        assert_eq!(names, vec!["index.js", "lib/", "lib/util.js"]);
    }

    #[test]
    fn test_single_file_archived_by_name() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("schema.graphql");
        fs::write(&file, "type Query { ping: String }").unwrap();

        let bytes = archive_path(&file).unwrap();
        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut entry = archive.by_name("schema.graphql").unwrap();
        let mut contents = String::new();
        entry.read_to_string(&mut contents).unwrap();
        assert_eq!(contents, "type Query { ping: String }");
    }

    #[test]
    fn test_existing_zip_passed_through() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("code.txt");
        fs::write(&source, "print('hi')").unwrap();
        let zipped = archive_path(&source).unwrap();

        let zip_file = dir.path().join("code.zip");
        fs::write(&zip_file, &zipped).unwrap();
        assert_eq!(archive_path(&zip_file).unwrap(), zipped);
    }

    #[test]
    fn test_archives_are_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "alpha").unwrap();
        fs::write(dir.path().join("b.txt"), "beta").unwrap();

        assert_eq!(archive_path(dir.path()).unwrap(), archive_path(dir.path()).unwrap());
    }

    #[test]
    fn test_missing_path_is_io_error() {
        let err = archive_path(Path::new("/definitely/not/here")).unwrap_err();
        assert!(matches!(err, DeployError::Io { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinks_archived_as_their_targets() {
        use std::os::unix::fs::symlink;

        let shared = tempfile::tempdir().unwrap();
        fs::write(shared.path().join("shared.js"), "module.exports = 'shared';").unwrap();
        fs::create_dir(shared.path().join("vendor")).unwrap();
        fs::write(shared.path().join("vendor/lib.js"), "module.exports = 'lib';").unwrap();

        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("index.js"), "exports.handler = 1;").unwrap();
        symlink(shared.path().join("shared.js"), dir.path().join("shared.js")).unwrap();
        symlink(shared.path().join("vendor"), dir.path().join("vendor")).unwrap();

        let bytes = archive_path(dir.path()).unwrap();
        let mut names = entry_names(bytes.clone());
        names.sort();
        assert_eq!(names, vec!["index.js", "shared.js", "vendor/", "vendor/lib.js"]);

        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut entry = archive.by_name("shared.js").unwrap();
        let mut contents = String::new();
        entry.read_to_string(&mut contents).unwrap();
        assert_eq!(contents, "module.exports = 'shared';");
    }

    #[cfg(unix)]
    #[test]
    fn test_permissions_preserved() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("bootstrap");
        fs::write(&script, "#!/bin/sh\n").unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();

        let bytes = archive_path(dir.path()).unwrap();
        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        let entry = archive.by_name("bootstrap").unwrap();
        assert_eq!(entry.unix_mode().map(|m| m & 0o777), Some(0o755));
    }
}
