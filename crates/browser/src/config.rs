//! Browser launch configuration.

use serde::{Deserialize, Serialize};

/// Settings for the Chromium instance that hosts the meeting page.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// Path to Chrome/Chromium binary (auto-detected if not set).
    pub chrome_path: Option<String>,
    /// Whether to run without a visible window.
    pub headless: bool,
    pub viewport_width: u32,
    pub viewport_height: u32,
    /// CDP request timeout in milliseconds.
    pub request_timeout_ms: u64,
    /// User agent string (uses the browser default if not set).
    pub user_agent: Option<String>,
    /// Additional Chrome arguments.
    pub chrome_args: Vec<String>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            chrome_path: None,
            headless: true,
            viewport_width: 1280,
            viewport_height: 800,
            request_timeout_ms: 30_000,
            user_agent: None,
            chrome_args: Vec::new(),
        }
    }
}
