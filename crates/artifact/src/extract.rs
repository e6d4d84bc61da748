//! Archive extraction.
//!
//! Both extractors refuse entries that would land outside the target
//! directory (absolute paths, `..` segments, links pointing out).

use crate::error::{Error, Result};
use crate::types::ArchiveFormat;
use flate2::read::GzDecoder;
use std::fs::{self, File};
use std::io;
use std::path::{Component, Path, PathBuf};

/// Unpack `archive` into `target` according to `format`.
///
/// Returns the number of files written.
pub fn extract(archive: &Path, target: &Path, format: ArchiveFormat) -> Result<usize> {
    fs::create_dir_all(target).map_err(|e| Error::io(target, e))?;
    match format {
        ArchiveFormat::TarGz { strip_components } => {
            extract_tar_gz(archive, target, strip_components)
        }
        ArchiveFormat::Zip => extract_zip(archive, target),
    }
}

/// Unpack a gzipped tarball, dropping `strip` leading path components.
pub fn extract_tar_gz(archive: &Path, target: &Path, strip: usize) -> Result<usize> {
    let file = File::open(archive).map_err(|e| Error::io(archive, e))?;
    let mut tarball = tar::Archive::new(GzDecoder::new(file));
    tarball.set_preserve_permissions(true);

    let entries = tarball
        .entries()
        .map_err(|e| Error::extract(archive, e))?;

    let mut files = 0;
    for entry in entries {
        let mut entry = entry.map_err(|e| Error::extract(archive, e))?;
        let path = entry
            .path()
            .map_err(|e| Error::extract(archive, e))?
            .into_owned();

        let Some(relative) = contained_path(&path, strip).map_err(|m| Error::extract(archive, m))?
        else {
            continue;
        };

        let entry_type = entry.header().entry_type();
        if entry_type.is_symlink() || entry_type.is_hard_link() {
            let link = entry
                .link_name()
                .map_err(|e| Error::extract(archive, e))?
                .map(std::borrow::Cow::into_owned)
                .unwrap_or_default();
            if link.is_absolute() || link.components().any(|c| c == Component::ParentDir) {
                return Err(Error::extract(
                    archive,
                    format!("link {} points outside the archive", path.display()),
                ));
            }
        }

        let dest = target.join(&relative);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }
        entry
            .unpack(&dest)
            .map_err(|e| Error::extract(archive, format!("{}: {e}", relative.display())))?;

        if !entry_type.is_dir() {
            files += 1;
        }
    }

    if files == 0 {
        return Err(Error::extract(archive, "archive contains no files"));
    }
    Ok(files)
}

/// Unpack a zip archive as-is, keeping unix modes when recorded.
pub fn extract_zip(archive: &Path, target: &Path) -> Result<usize> {
    let file = File::open(archive).map_err(|e| Error::io(archive, e))?;
    let mut zip = zip::ZipArchive::new(file).map_err(|e| Error::extract(archive, e))?;

    let mut files = 0;
    for i in 0..zip.len() {
        let mut entry = zip.by_index(i).map_err(|e| Error::extract(archive, e))?;
        let Some(relative) = entry.enclosed_name() else {
            return Err(Error::extract(
                archive,
                format!("entry {} escapes the target directory", entry.name()),
            ));
        };

        let dest = target.join(relative);
        if entry.is_dir() {
            fs::create_dir_all(&dest).map_err(|e| Error::io(&dest, e))?;
            continue;
        }

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }
        let mut out = File::create(&dest).map_err(|e| Error::io(&dest, e))?;
        io::copy(&mut entry, &mut out).map_err(|e| Error::extract(archive, e))?;

        #[cfg(unix)]
        if let Some(mode) = entry.unix_mode() {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&dest, fs::Permissions::from_mode(mode & 0o7777))
                .map_err(|e| Error::io(&dest, e))?;
        }

        files += 1;
    }

    if files == 0 {
        return Err(Error::extract(archive, "archive contains no files"));
    }
    Ok(files)
}

/// Validate an entry path and drop its first `strip` components.
///
/// `Ok(None)` means the entry is entirely consumed by stripping (the
/// wrapping directory itself).
fn contained_path(path: &Path, strip: usize) -> std::result::Result<Option<PathBuf>, String> {
    let mut parts = Vec::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => parts.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(format!(
                    "entry {} escapes the target directory",
                    path.display()
                ));
            }
        }
    }

    if parts.len() <= strip {
        return Ok(None);
    }
    Ok(Some(parts[strip..].iter().collect()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_tar_gz(path: &Path, entries: &[(&str, &[u8])]) {
        let file = File::create(path).unwrap();
        let encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
        let mut builder = tar::Builder::new(encoder);
        for (name, data) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, name, *data).unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap();
    }

    /// Raw tar bytes with an unchecked entry name (the builder rejects `..`).
    fn write_tar_gz_raw_name(path: &Path, name: &str, data: &[u8]) {
        let mut header = tar::Header::new_old();
        {
            let bytes = header.as_old_mut();
            bytes.name[..name.len()].copy_from_slice(name.as_bytes());
        }
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_entry_type(tar::EntryType::Regular);
        header.set_cksum();

        let mut raw = Vec::new();
        raw.extend_from_slice(header.as_bytes());
        raw.extend_from_slice(data);
        raw.resize(raw.len().div_ceil(512) * 512, 0);
        raw.extend_from_slice(&[0u8; 1024]);

        let file = File::create(path).unwrap();
        let mut encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
        encoder.write_all(&raw).unwrap();
        encoder.finish().unwrap();
    }

    fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
        let file = File::create(path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Stored)
            .unix_permissions(0o755);
        for (name, data) in entries {
            zip.start_file(*name, options).unwrap();
            zip.write_all(data).unwrap();
        }
        zip.finish().unwrap();
    }

    #[test]
    fn test_tar_gz_strips_top_level_directory() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("src.tar.gz");
        write_tar_gz(
            &archive,
            &[
                ("panel-master/main.py", b"print('hi')"),
                ("panel-master/app/__init__.py", b""),
            ],
        );

        let target = dir.path().join("out");
        let count = extract(
            &archive,
            &target,
            ArchiveFormat::TarGz {
                strip_components: 1,
            },
        )
        .unwrap();

        assert_eq!(count, 2);
        assert_eq!(
            fs::read_to_string(target.join("main.py")).unwrap(),
            "print('hi')"
        );
        assert!(target.join("app/__init__.py").exists());
        assert!(!target.join("panel-master").exists());
    }

    #[test]
    fn test_tar_gz_rejects_parent_traversal() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("evil.tar.gz");
        write_tar_gz_raw_name(&archive, "top/../../escape.txt", b"x");

        let target = dir.path().join("out");
        let err = extract_tar_gz(&archive, &target, 1).unwrap_err();

        assert!(matches!(err, Error::Extract { .. }));
        assert!(!dir.path().join("escape.txt").exists());
    }

    #[test]
    fn test_tar_gz_corrupt_archive() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("broken.tar.gz");
        fs::write(&archive, b"definitely not gzip").unwrap();

        let err = extract_tar_gz(&archive, dir.path(), 1).unwrap_err();
        assert!(matches!(err, Error::Extract { .. }));
    }

    #[test]
    fn test_tar_gz_only_wrapper_directory_is_empty() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("empty.tar.gz");
        write_tar_gz(&archive, &[("wrapper", b"")]);

        let err = extract_tar_gz(&archive, &dir.path().join("out"), 1).unwrap_err();
        assert!(err.to_string().contains("no files"));
    }

    #[test]
    fn test_zip_extracts_with_mode() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("core.zip");
        write_zip(&archive, &[("xray", b"\x7fELF"), ("geoip.dat", b"geo")]);

        let target = dir.path().join("core");
        let count = extract(&archive, &target, ArchiveFormat::Zip).unwrap();

        assert_eq!(count, 2);
        assert_eq!(fs::read(target.join("xray")).unwrap(), b"\x7fELF");

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(target.join("xray")).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o755);
        }
    }

    #[test]
    fn test_zip_rejects_escaping_entry() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("evil.zip");
        write_zip(&archive, &[("../escape", b"x")]);

        let err = extract_zip(&archive, &dir.path().join("out")).unwrap_err();
        assert!(matches!(err, Error::Extract { .. }));
        assert!(!dir.path().join("escape").exists());
    }

    #[test]
    fn test_contained_path() {
        assert_eq!(
            contained_path(Path::new("top/a/b"), 1).unwrap(),
            Some(PathBuf::from("a/b"))
        );
        assert_eq!(contained_path(Path::new("top/"), 1).unwrap(), None);
        assert_eq!(
            contained_path(Path::new("./a"), 0).unwrap(),
            Some(PathBuf::from("a"))
        );
        assert!(contained_path(Path::new("/etc/passwd"), 0).is_err());
        assert!(contained_path(Path::new("a/../../b"), 0).is_err());
    }
}
