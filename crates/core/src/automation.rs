//! Browser Automation Interface
//!
//! The orchestration core never drives a browser itself; it talks to a
//! [`BrowserAutomation`] implementation. [`crate::playwright::PlaywrightDriver`]
//! is the real one, [`crate::mock::MockBrowser`] the in-memory one.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::error::{Error, Result};

macro_rules! handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

handle!(
    /// Opaque id of a launched browser
    BrowserHandle
);
handle!(
    /// Opaque id of a browser context
    ContextHandle
);
handle!(
    /// Opaque id of a page
    PageHandle
);

/// Browser engine selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BrowserEngine {
    #[default]
    Chromium,
    Firefox,
    /// Chromium with the `msedge` channel
    Edge,
}

impl BrowserEngine {
    /// Map a configured name to an engine. Unrecognized names select Chromium.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "firefox" => BrowserEngine::Firefox,
            "edge" => BrowserEngine::Edge,
            _ => BrowserEngine::Chromium,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BrowserEngine::Chromium => "chromium",
            BrowserEngine::Firefox => "firefox",
            BrowserEngine::Edge => "edge",
        }
    }
}

impl fmt::Display for BrowserEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of waiting on a selector.
///
/// A timeout is a value, not an error: the caller decides whether it
/// means failure or an acceptable alternate state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Found,
    TimedOut,
}

impl WaitOutcome {
    pub fn is_found(&self) -> bool {
        matches!(self, WaitOutcome::Found)
    }

    /// Treat a timeout as a failure
    pub fn require(self, selector: &str, timeout: Duration) -> Result<()> {
        match self {
            WaitOutcome::Found => Ok(()),
            WaitOutcome::TimedOut => Err(Error::Timeout {
                selector: selector.to_string(),
                timeout_ms: timeout.as_millis() as u64,
            }),
        }
    }
}

/// Operations the orchestration core consumes from a browser driver
#[async_trait]
pub trait BrowserAutomation: Send + Sync {
    async fn launch(&self, engine: BrowserEngine, headless: bool) -> Result<BrowserHandle>;

    async fn new_context(&self, browser: &BrowserHandle) -> Result<ContextHandle>;

    async fn new_page(&self, context: &ContextHandle) -> Result<PageHandle>;

    async fn navigate(&self, page: &PageHandle, url: &str) -> Result<()>;

    async fn fill(&self, page: &PageHandle, selector: &str, text: &str) -> Result<()>;

    async fn click(&self, page: &PageHandle, selector: &str) -> Result<()>;

    async fn wait_for_selector(
        &self,
        page: &PageHandle,
        selector: &str,
        timeout: Duration,
    ) -> Result<WaitOutcome>;

    async fn content(&self, page: &PageHandle) -> Result<String>;

    async fn url(&self, page: &PageHandle) -> Result<String>;

    async fn locator_count(&self, page: &PageHandle, selector: &str) -> Result<usize>;

    async fn close_page(&self, page: &PageHandle) -> Result<()>;

    async fn close_context(&self, context: &ContextHandle) -> Result<()>;

    async fn close_browser(&self, browser: &BrowserHandle) -> Result<()>;
}

/// A scenario's page: its handle plus the driver that owns it.
///
/// Cheap to clone. Handlers reach it through
/// [`ScenarioContext::page`](crate::context::ScenarioContext::page).
#[derive(Clone)]
pub struct Page {
    handle: PageHandle,
    automation: Arc<dyn BrowserAutomation>,
}

impl fmt::Debug for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Page").field(&self.handle).finish()
    }
}

impl Page {
    pub fn new(handle: PageHandle, automation: Arc<dyn BrowserAutomation>) -> Self {
        Self { handle, automation }
    }

    pub fn handle(&self) -> &PageHandle {
        &self.handle
    }

    pub async fn navigate(&self, url: &str) -> Result<()> {
        debug!(page = %self.handle, url, "navigate");
        self.automation.navigate(&self.handle, url).await
    }

    pub async fn fill(&self, selector: &str, text: &str) -> Result<()> {
        debug!(page = %self.handle, selector, "fill");
        self.automation.fill(&self.handle, selector, text).await
    }

    pub async fn click(&self, selector: &str) -> Result<()> {
        debug!(page = %self.handle, selector, "click");
        self.automation.click(&self.handle, selector).await
    }

    pub async fn wait_for_selector(
        &self,
        selector: &str,
        timeout: Duration,
    ) -> Result<WaitOutcome> {
        debug!(page = %self.handle, selector, timeout_ms = timeout.as_millis() as u64, "wait");
        self.automation
            .wait_for_selector(&self.handle, selector, timeout)
            .await
    }

    pub async fn content(&self) -> Result<String> {
        self.automation.content(&self.handle).await
    }

    pub async fn url(&self) -> Result<String> {
        self.automation.url(&self.handle).await
    }

    pub async fn locator_count(&self, selector: &str) -> Result<usize> {
        self.automation.locator_count(&self.handle, selector).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("firefox", BrowserEngine::Firefox)]
    #[test_case("edge", BrowserEngine::Edge)]
    #[test_case("Edge ", BrowserEngine::Edge ; "edge mixed case padded")]
    #[test_case("chromium", BrowserEngine::Chromium)]
    #[test_case("webkit", BrowserEngine::Chromium ; "unknown falls back")]
    #[test_case("", BrowserEngine::Chromium ; "empty falls back")]
    fn test_engine_from_name(name: &str, expected: BrowserEngine) {
        assert_eq!(BrowserEngine::from_name(name), expected);
    }

    #[test]
    fn test_wait_outcome_require() {
        let timeout = Duration::from_millis(5000);
        assert!(WaitOutcome::Found.require("div#page-results", timeout).is_ok());
        match WaitOutcome::TimedOut.require("div#page-results", timeout) {
            Err(Error::Timeout { selector, timeout_ms }) => {
                assert_eq!(selector, "div#page-results");
                assert_eq!(timeout_ms, 5000);
            }
            other => panic!("expected timeout, got {:?}", other),
        }
    }
}
