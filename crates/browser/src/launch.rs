//! Chromium process launch.

use std::time::Duration;

use {
    chromiumoxide::{
        Browser, BrowserConfig as CdpBrowserConfig, Page, handler::viewport::Viewport,
    },
    futures::StreamExt,
    tokio::task::JoinHandle,
    tracing::{debug, info},
};

use crate::{config::BrowserConfig, detect, error::BrowserError};

/// Flags that keep the meeting client from blocking on device prompts and
/// let it run in containers.
const MEETING_ARGS: &[&str] = &[
    "--use-fake-ui-for-media-stream",
    "--use-fake-device-for-media-stream",
    "--autoplay-policy=no-user-gesture-required",
    "--disable-gpu",
    "--disable-dev-shm-usage",
    "--no-sandbox",
    "--disable-setuid-sandbox",
];

/// A launched browser with its single page and CDP event pump.
pub struct LaunchedBrowser {
    pub browser: Browser,
    pub page: Page,
    pub handler: JoinHandle<()>,
}

/// Launch a local Chromium and open a blank page.
pub async fn launch(config: &BrowserConfig) -> Result<LaunchedBrowser, BrowserError> {
    let executable = detect::detect_browser(config.chrome_path.as_deref()).ok_or_else(|| {
        BrowserError::LaunchFailed(format!(
            "Chrome/Chromium not found. {}",
            detect::install_instructions()
        ))
    })?;

    let mut builder = CdpBrowserConfig::builder()
        .chrome_executable(&executable)
        .viewport(Viewport {
            width: config.viewport_width,
            height: config.viewport_height,
            device_scale_factor: None,
            emulating_mobile: false,
            is_landscape: true,
            has_touch: false,
        })
        .request_timeout(Duration::from_millis(config.request_timeout_ms));

    // chromiumoxide runs headless unless asked for a window.
    if !config.headless {
        builder = builder.with_head();
    }

    if let Some(ref ua) = config.user_agent {
        builder = builder.arg(format!("--user-agent={ua}"));
    }

    for arg in MEETING_ARGS {
        builder = builder.arg(*arg);
    }
    for arg in &config.chrome_args {
        builder = builder.arg(arg);
    }

    let cdp_config = builder.build().map_err(|e| {
        BrowserError::LaunchFailed(format!("failed to build browser config: {e}"))
    })?;

    let (browser, mut handler) = Browser::launch(cdp_config)
        .await
        .map_err(|e| BrowserError::LaunchFailed(e.to_string()))?;

    let handler = tokio::spawn(async move {
        while let Some(event) = handler.next().await {
            if let Err(e) = event {
                debug!(error = %e, "browser handler event error");
            }
        }
        debug!("browser event handler exited");
    });

    let page = browser
        .new_page("about:blank")
        .await
        .map_err(|e| BrowserError::LaunchFailed(format!("failed to open page: {e}")))?;

    info!(
        executable = %executable.display(),
        headless = config.headless,
        viewport_width = config.viewport_width,
        viewport_height = config.viewport_height,
        "browser launched"
    );

    Ok(LaunchedBrowser {
        browser,
        page,
        handler,
    })
}
