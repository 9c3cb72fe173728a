//! Converting the application's icon asset to a Windows .ico file.

use crate::constants::DEFAULT_ICON_FILENAME;
use crate::error::PipelineError;
use crate::manifest::PackageManifest;
use ico::{IconDir, IconDirEntry, IconImage, ResourceType};
use image::imageops::FilterType;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

/// Largest width/height an .ico entry can hold
const MAX_ICO_SIZE: u32 = 256;

/// Path of the icon image the package uses.
///
/// This is the manifest's `window.icon` when set, otherwise the default
/// icon filename. The default is ignored whenever an override exists.
pub fn resolve_icon_source(dir: &Path) -> Result<PathBuf, PipelineError> {
    let manifest = PackageManifest::load(dir)?;
    let name = manifest.icon_override().unwrap_or(DEFAULT_ICON_FILENAME);
    Ok(dir.join(name))
}

/// Where the converted icon for `source` is written: `<source>.ico`.
pub fn ico_path_for(source: &Path) -> PathBuf {
    let mut path = source.as_os_str().to_owned();
    path.push(".ico");
    PathBuf::from(path)
}

/// Convert the package's icon to .ico next to the original.
///
/// Returns the path of the new file. The source image is left in place.
pub fn extract_icon(dir: &Path) -> Result<PathBuf, PipelineError> {
    let source = resolve_icon_source(dir)?;
    if !source.is_file() {
        return Err(PipelineError::IconAssetMissing { path: source });
    }

    let ico_path = ico_path_for(&source);
    convert_to_ico(&source, &ico_path)?;
    log::debug!("Converted {} to {}", source.display(), ico_path.display());
    Ok(ico_path)
}

/// Write `source` as a single-resolution .ico at `dest`.
///
/// Images larger than 256 pixels on either side are scaled down to fit,
/// preserving aspect ratio.
pub fn convert_to_ico(source: &Path, dest: &Path) -> Result<(), PipelineError> {
    let conversion_error = |reason: String| PipelineError::IconConversionError {
        path: source.to_path_buf(),
        reason,
    };

    let img = image::open(source).map_err(|e| conversion_error(e.to_string()))?;
    let img = if img.width() > MAX_ICO_SIZE || img.height() > MAX_ICO_SIZE {
        img.resize(MAX_ICO_SIZE, MAX_ICO_SIZE, FilterType::Lanczos3)
    } else {
        img
    };
    if img.width() == 0 || img.height() == 0 {
        return Err(conversion_error("image has no pixels".to_string()));
    }

    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();
    let icon_image = IconImage::from_rgba_data(width, height, rgba.into_raw());
    let entry = IconDirEntry::encode(&icon_image).map_err(|e| conversion_error(e.to_string()))?;

    let mut icon_dir = IconDir::new(ResourceType::Icon);
    icon_dir.add_entry(entry);

    let file = File::create(dest)
        .map_err(|e| PipelineError::io(format!("creating {}", dest.display()), e))?;
    icon_dir
        .write(BufWriter::new(file))
        .map_err(|e| conversion_error(e.to_string()))?;
    Ok(())
}
