/// File present in every package built by either supported runtime shell
pub const MARKER_FILENAME: &str = "resources.pak";
/// Executable shipped next to the app that must never be patched
pub const HELPER_EXECUTABLE: &str = "notification_helper.exe";
/// Suffix identifying the platform executable
pub const EXECUTABLE_SUFFIX: &str = ".exe";
/// Package metadata file
pub const MANIFEST_FILENAME: &str = "package.json";
/// Icon used when the manifest has no window icon override
pub const DEFAULT_ICON_FILENAME: &str = "icon.png";
/// HTML document the package title is read from
pub const ENTRY_DOCUMENT: &str = "index.html";
/// Filename of the generated installer script
pub const INSTALLER_SCRIPT_FILENAME: &str = "config.iss";
/// Directory (relative to the package root) the installer compiler writes to
pub const INSTALLER_OUTPUT_DIR: &str = "Generated Installer";
/// Version stamped into every generated installer
pub const INSTALLER_VERSION: &str = "1.0.0";
