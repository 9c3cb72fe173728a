//! Reading, extracting and rebuilding package archives.
//!
//! A package archive is a zip whose first entry names the single root
//! directory holding everything else. Extraction goes into a fresh temporary
//! directory owned by the returned [`ExtractedPackage`]; repackaging zips the
//! whole temporary tree back and replaces the original archive in one rename.

use crate::constants::MARKER_FILENAME;
use crate::error::PipelineError;
use std::fs::{self, File};
use std::io::{self, Seek, Write};
use std::path::{Component, Path, PathBuf};
use tempfile::{NamedTempFile, TempDir};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Prefix for the per-run temporary directory
const TEMP_PREFIX: &str = "packager-extras-";

/// A package archive unpacked into a temporary directory.
///
/// Dropping it deletes the temporary directory.
#[derive(Debug)]
pub struct ExtractedPackage {
    temp_dir: TempDir,
    root: PathBuf,
}

impl ExtractedPackage {
    /// Directory containing the packaged application (the archive's root folder)
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The temporary directory the archive was extracted into
    pub fn temp_path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Delete the temporary directory, reporting any failure.
    pub fn remove(self) -> io::Result<()> {
        self.temp_dir.close()
    }
}

/// Name of the root directory, taken from the first entry of the archive.
pub fn inspect(archive_path: &Path) -> Result<String, PipelineError> {
    let mut archive = open_archive(archive_path)?;
    let first = first_entry_name(&mut archive)?;
    root_component(&first)
}

/// Extract the archive into a new temporary directory and check that it is
/// a recognized package.
///
/// Every entry is validated before anything is written: it must be a safe
/// relative path under the root named by the first entry. On any failure the
/// temporary directory is deleted.
pub fn extract(archive_path: &Path) -> Result<ExtractedPackage, PipelineError> {
    extract_in(archive_path, &std::env::temp_dir())
}

/// [`extract`] with the temporary directory created under `parent`.
pub fn extract_in(archive_path: &Path, parent: &Path) -> Result<ExtractedPackage, PipelineError> {
    let mut archive = open_archive(archive_path)?;
    let root_name = root_component(&first_entry_name(&mut archive)?)?;

    let mut entries = Vec::with_capacity(archive.len());
    for index in 0..archive.len() {
        let file = archive
            .by_index(index)
            .map_err(|e| PipelineError::invalid_archive(format!("unreadable entry: {}", e)))?;
        let relative = file.enclosed_name().ok_or_else(|| {
            PipelineError::invalid_archive(format!("unsafe entry path '{}'", file.name()))
        })?;
        if !starts_with_root(&relative, &root_name) {
            return Err(PipelineError::invalid_archive(format!(
                "entry '{}' is outside root directory '{}'",
                file.name(),
                root_name
            )));
        }
        entries.push((index, relative, file.is_dir()));
    }

    let temp_dir = tempfile::Builder::new()
        .prefix(TEMP_PREFIX)
        .tempdir_in(parent)
        .map_err(|e| {
            PipelineError::io(
                format!("failed to create temporary directory in {}", parent.display()),
                e,
            )
        })?;

    for (index, relative, is_dir) in entries {
        let dest = temp_dir.path().join(&relative);
        if is_dir {
            fs::create_dir_all(&dest)
                .map_err(|e| PipelineError::io(format!("creating {}", dest.display()), e))?;
            continue;
        }
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| PipelineError::io(format!("creating {}", parent.display()), e))?;
        }
        let mut file = archive
            .by_index(index)
            .map_err(|e| PipelineError::invalid_archive(format!("unreadable entry: {}", e)))?;
        let mut out = File::create(&dest)
            .map_err(|e| PipelineError::io(format!("creating {}", dest.display()), e))?;
        io::copy(&mut file, &mut out)
            .map_err(|e| PipelineError::io(format!("extracting {}", relative.display()), e))?;
    }

    let root = temp_dir.path().join(&root_name);
    log::info!("Extracted to {}", root.display());
    verify_package(&root)?;

    Ok(ExtractedPackage { temp_dir, root })
}

/// Check that a directory holds a packaged application.
pub fn verify_package(root: &Path) -> Result<(), PipelineError> {
    if root.join(MARKER_FILENAME).is_file() {
        Ok(())
    } else {
        Err(PipelineError::invalid_archive(format!(
            "not a recognized package ({} missing)",
            MARKER_FILENAME
        )))
    }
}

/// Zip the contents of `source_dir` and atomically replace `archive_path`.
///
/// The new archive is written to a temporary file next to the destination and
/// renamed over it, so the original is never left half-written.
pub fn repackage(source_dir: &Path, archive_path: &Path) -> Result<(), PipelineError> {
    let parent = match archive_path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut staged = NamedTempFile::new_in(parent)
        .map_err(|e| PipelineError::io(format!("creating temporary file in {}", parent.display()), e))?;

    write_archive(source_dir, staged.as_file_mut())
        .map_err(|e| PipelineError::io("writing archive", e))?;

    // The staged file is created private; the replacement keeps the original's mode
    if let Ok(metadata) = fs::metadata(archive_path) {
        fs::set_permissions(staged.path(), metadata.permissions()).map_err(|e| {
            PipelineError::io(format!("copying permissions of {}", archive_path.display()), e)
        })?;
    }

    staged
        .persist(archive_path)
        .map_err(|e| PipelineError::io(format!("replacing {}", archive_path.display()), e.error))?;
    log::info!("Replaced {}", archive_path.display());
    Ok(())
}

/// Write a zip of everything under `dir` to `writer`.
///
/// Entries are added in sorted order with directories as explicit entries.
pub fn write_archive<W: Write + Seek>(dir: &Path, writer: W) -> io::Result<W> {
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut zip = ZipWriter::new(writer);
    add_directory_contents(&mut zip, dir, "", options)?;
    zip.finish().map_err(io::Error::other)
}

/// Recursively add directory contents to the archive.
fn add_directory_contents<W: Write + Seek>(
    zip: &mut ZipWriter<W>,
    dir: &Path,
    archive_prefix: &str,
    options: SimpleFileOptions,
) -> io::Result<()> {
    let mut entries = fs::read_dir(dir)?.collect::<io::Result<Vec<_>>>()?;
    entries.sort_by_key(|entry| entry.file_name());

    for entry in entries {
        let path = entry.path();
        let file_name = entry.file_name();
        let archive_path = format!("{}{}", archive_prefix, file_name.to_string_lossy());

        if path.is_dir() {
            let dir_name = format!("{}/", archive_path);
            zip.add_directory(dir_name.as_str(), options)
                .map_err(io::Error::other)?;
            add_directory_contents(zip, &path, &dir_name, options)?;
        } else if path.is_file() {
            zip.start_file(archive_path.as_str(), options)
                .map_err(io::Error::other)?;
            let mut file = File::open(&path)?;
            io::copy(&mut file, zip)?;
        }
    }
    Ok(())
}

fn open_archive(archive_path: &Path) -> Result<ZipArchive<File>, PipelineError> {
    let file = File::open(archive_path)
        .map_err(|e| PipelineError::io(format!("opening {}", archive_path.display()), e))?;
    ZipArchive::new(file).map_err(|e| PipelineError::invalid_archive(e.to_string()))
}

fn first_entry_name(archive: &mut ZipArchive<File>) -> Result<String, PipelineError> {
    if archive.is_empty() {
        return Err(PipelineError::invalid_archive("archive has no entries"));
    }
    let first = archive
        .by_index(0)
        .map_err(|e| PipelineError::invalid_archive(format!("unreadable entry: {}", e)))?;
    Ok(first.name().to_string())
}

/// Leading path segment of an entry name.
fn root_component(entry_name: &str) -> Result<String, PipelineError> {
    let root = entry_name
        .split_once('/')
        .map_or(entry_name, |(root, _)| root);
    if root.is_empty() || root == "." || root == ".." {
        return Err(PipelineError::invalid_archive(format!(
            "first entry '{}' does not name a root directory",
            entry_name
        )));
    }
    Ok(root.to_string())
}

fn starts_with_root(relative: &Path, root_name: &str) -> bool {
    matches!(
        relative.components().next(),
        Some(Component::Normal(first)) if first == root_name
    )
}
