//! Fixtures shared by the integration tests: package archives and stand-ins
//! for the external tools.

#![allow(dead_code)]

use extras_core::config::Config;
use extras_core::patcher::IconBackend;
use image::{ImageFormat, Rgba, RgbaImage};
use std::fs;
use std::io::{Cursor, Read, Write};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tempfile::TempDir;
use zip::ZipArchive;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

pub const ROOT: &str = "My App";
pub const EXE_BYTES: &[u8] = b"MZ original executable";
pub const INSTALLER_BYTES: &[u8] = b"fake installer";

/// Shell scripts standing in for rcedit and iscc
pub struct Tools {
    _dir: TempDir,
    /// `rcedit <exe> --set-icon <ico>`: copies the icon over the executable
    pub rcedit: PathBuf,
    /// `iscc <script>`: writes the installer where the script says
    pub iscc: PathBuf,
    /// Exits 0 without producing anything
    pub silent_iscc: PathBuf,
    /// Prints to stderr and exits 1
    pub failing: PathBuf,
}

/// Scripts are written once, before any test can spawn a process, so no
/// child inherits a write handle to them.
pub fn tools() -> &'static Tools {
    static TOOLS: OnceLock<Tools> = OnceLock::new();
    TOOLS.get_or_init(|| {
        let dir = tempfile::tempdir().unwrap();
        let rcedit = write_script(
            dir.path(),
            "rcedit",
            "[ \"$2\" = \"--set-icon\" ] || exit 3\ncp \"$3\" \"$1\"\n",
        );
        let iscc = write_script(
            dir.path(),
            "iscc",
            concat!(
                "out=\"$(dirname \"$1\")/Generated Installer\"\n",
                "name=$(sed -n 's/^OutputBaseFilename=//p' \"$1\")\n",
                "mkdir -p \"$out\"\n",
                "printf 'fake installer' > \"$out/$name.exe\"\n",
            ),
        );
        let silent_iscc = write_script(dir.path(), "silent-iscc", "exit 0\n");
        let failing = write_script(dir.path(), "failing", "echo 'tool exploded' >&2\nexit 1\n");
        Tools {
            _dir: dir,
            rcedit,
            iscc,
            silent_iscc,
            failing,
        }
    })
}

fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{}", body)).unwrap();
    let mut perms = fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&path, perms).unwrap();
    path
}

pub fn config(rcedit: &Path, iscc: &Path) -> Config {
    Config {
        icon_backend: IconBackend::ResourceEditor(rcedit.to_path_buf()),
        installer_compiler: iscc.to_path_buf(),
        reveal_output: false,
        work_dir: None,
    }
}

/// Config using the working fake tools
pub fn working_config() -> Config {
    config(&tools().rcedit, &tools().iscc)
}

pub fn png_bytes(size: u32) -> Vec<u8> {
    let mut bytes = Vec::new();
    RgbaImage::from_pixel(size, size, Rgba([10, 120, 200, 255]))
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .unwrap();
    bytes
}

/// Files of a well-formed package, paths relative to the root folder
pub fn package_files(title_html: &str) -> Vec<(String, Vec<u8>)> {
    vec![
        ("app.exe".to_string(), EXE_BYTES.to_vec()),
        ("notification_helper.exe".to_string(), b"MZ helper".to_vec()),
        ("resources.pak".to_string(), b"pak".to_vec()),
        (
            "package.json".to_string(),
            br#"{"name":"my-app","window":{"icon":"assets/logo.png"}}"#.to_vec(),
        ),
        ("index.html".to_string(), title_html.as_bytes().to_vec()),
        ("assets/logo.png".to_string(), png_bytes(64)),
        ("locales/en-US.pak".to_string(), b"en".to_vec()),
    ]
}

pub fn write_archive(path: &Path, files: &[(String, Vec<u8>)]) {
    let mut zip = ZipWriter::new(fs::File::create(path).unwrap());
    for (name, data) in files {
        zip.start_file(format!("{}/{}", ROOT, name), SimpleFileOptions::default())
            .unwrap();
        zip.write_all(data).unwrap();
    }
    zip.finish().unwrap();
}

/// A directory holding `My App.zip` with a complete package
pub fn package_archive(title_html: &str) -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let archive = dir.path().join("My App.zip");
    write_archive(&archive, &package_files(title_html));
    (dir, archive)
}

/// Contents of `name` (relative to the root folder) inside the archive
pub fn read_entry(archive: &Path, name: &str) -> Option<Vec<u8>> {
    let mut zip = ZipArchive::new(fs::File::open(archive).unwrap()).unwrap();
    let mut file = zip.by_name(&format!("{}/{}", ROOT, name)).ok()?;
    let mut data = Vec::new();
    file.read_to_end(&mut data).unwrap();
    Some(data)
}

pub fn entry_names(archive: &Path) -> Vec<String> {
    let zip = ZipArchive::new(fs::File::open(archive).unwrap()).unwrap();
    zip.file_names().map(str::to_string).collect()
}
