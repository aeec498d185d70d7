//! Chromium executable detection.

use std::path::PathBuf;

/// Chromium-based executables that speak CDP, in preference order.
const CHROMIUM_EXECUTABLES: &[&str] = &[
    "google-chrome",
    "google-chrome-stable",
    "chrome",
    "chromium",
    "chromium-browser",
    "microsoft-edge",
    "msedge",
    "brave-browser",
];

#[cfg(target_os = "macos")]
const MACOS_APP_PATHS: &[&str] = &[
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    "/Applications/Chromium.app/Contents/MacOS/Chromium",
    "/Applications/Microsoft Edge.app/Contents/MacOS/Microsoft Edge",
];

#[cfg(target_os = "windows")]
const WINDOWS_PATHS: &[&str] = &[
    r"C:\Program Files\Google\Chrome\Application\chrome.exe",
    r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
    r"C:\Program Files (x86)\Microsoft\Edge\Application\msedge.exe",
];

/// Locate a browser executable.
///
/// An explicit `custom_path` wins when it exists; then platform install
/// locations; then known executable names on `PATH`.
pub fn detect_browser(custom_path: Option<&str>) -> Option<PathBuf> {
    if let Some(path) = custom_path.map(PathBuf::from)
        && path.exists()
    {
        return Some(path);
    }

    #[cfg(target_os = "macos")]
    if let Some(path) = first_existing(MACOS_APP_PATHS) {
        return Some(path);
    }

    #[cfg(target_os = "windows")]
    if let Some(path) = first_existing(WINDOWS_PATHS) {
        return Some(path);
    }

    CHROMIUM_EXECUTABLES
        .iter()
        .find_map(|name| which::which(name).ok())
}

#[cfg(any(target_os = "macos", target_os = "windows"))]
fn first_existing(paths: &[&str]) -> Option<PathBuf> {
    paths.iter().map(PathBuf::from).find(|p| p.exists())
}

/// Platform-specific hint printed when no browser is found.
pub fn install_instructions() -> String {
    let instructions = if cfg!(target_os = "macos") {
        "  brew install --cask google-chrome"
    } else if cfg!(target_os = "linux") {
        "  Debian/Ubuntu: sudo apt install chromium-browser\n  \
         Fedora:         sudo dnf install chromium\n  \
         Arch:           sudo pacman -S chromium"
    } else if cfg!(target_os = "windows") {
        "  winget install Google.Chrome"
    } else {
        "  Download from https://www.google.com/chrome/"
    };

    format!(
        "No Chromium-based browser found. Install one:\n\n\
         {instructions}\n\n\
         Or point at an existing binary with --chrome-path or the CHROME environment variable."
    )
}
