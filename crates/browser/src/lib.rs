//! Chromium automation backend for chatwatch, speaking CDP via chromiumoxide.
//!
//! [`ChromeDriver`] implements [`chatwatch_capture::AutomationDriver`] on a
//! single page:
//!
//! - **navigate**: load a URL and wait for the page
//! - **locate / count**: resolve CSS selectors, handing out numeric element refs
//! - **click**: scroll into view and dispatch a real mouse click
//! - **fill**: clear an input and type into it key by key
//! - **scan**: snapshot message nodes with their attributes and probe fields
//! - **subscribe**: stream mutation-observer notifications through a CDP binding
//!
//! # Example
//!
//! ```ignore
//! use chatwatch_browser::{BrowserConfig, ChromeDriver};
//!
//! let driver = ChromeDriver::launch(&BrowserConfig::default()).await?;
//! driver.navigate("https://zoom.us/wc/join/123456789").await?;
//! driver.shutdown().await;
//! ```

pub mod config;
pub mod detect;
mod dom;
pub mod driver;
pub mod error;
mod launch;

pub use {config::BrowserConfig, driver::ChromeDriver, error::BrowserError};
