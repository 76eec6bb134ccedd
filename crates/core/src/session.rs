//! Browser session ownership: one browser + context per run, one page per scenario

use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::automation::{
    BrowserAutomation, BrowserEngine, BrowserHandle, ContextHandle, Page, PageHandle,
};
use crate::error::{Error, Result};

/// Launch settings for a session
#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    pub engine: BrowserEngine,
}

impl SessionConfig {
    /// Build from a configured engine name; unknown names select Chromium
    pub fn from_browser_name(name: &str) -> Self {
        Self {
            engine: BrowserEngine::from_name(name),
        }
    }
}

/// The run's shared browser and automation context
#[derive(Debug, Clone)]
pub struct BrowserSession {
    pub engine: BrowserEngine,
    pub browser: BrowserHandle,
    pub context: ContextHandle,
    pub open_pages: BTreeSet<PageHandle>,
}

/// Owns the run's [`BrowserSession`] and hands out per-scenario pages.
///
/// One manager serves one sequential run. Concurrent workers each need
/// their own manager (and therefore their own browser context).
pub struct SessionManager {
    automation: Arc<dyn BrowserAutomation>,
    session: Option<BrowserSession>,
}

impl SessionManager {
    pub fn new(automation: Arc<dyn BrowserAutomation>) -> Self {
        Self {
            automation,
            session: None,
        }
    }

    pub fn session(&self) -> Option<&BrowserSession> {
        self.session.as_ref()
    }

    pub fn is_initialized(&self) -> bool {
        self.session.is_some()
    }

    /// Launch the browser (always headless) and open the shared context.
    ///
    /// Any failure is an [`Error::Browser`]; a browser that launched but
    /// whose context could not be created is closed again.
    pub async fn initialize(&mut self, config: &SessionConfig) -> Result<&BrowserSession> {
        if self.session.is_some() {
            return Err(Error::Browser("session already initialized".to_string()));
        }

        info!(engine = %config.engine, "Launching headless browser");
        let browser = self
            .automation
            .launch(config.engine, true)
            .await
            .map_err(into_browser_error)?;

        let context = match self.automation.new_context(&browser).await {
            Ok(context) => context,
            Err(e) => {
                if let Err(close_err) = self.automation.close_browser(&browser).await {
                    warn!("Closing browser after failed context creation: {}", close_err);
                }
                return Err(into_browser_error(e));
            }
        };

        debug!(%browser, %context, "Browser session ready");
        Ok(self.session.insert(BrowserSession {
            engine: config.engine,
            browser,
            context,
            open_pages: BTreeSet::new(),
        }))
    }

    /// Open a fresh page in the shared context
    pub async fn acquire_page(&mut self) -> Result<Page> {
        let session = self
            .session
            .as_mut()
            .ok_or_else(|| Error::Browser("session not initialized".to_string()))?;

        let handle = self
            .automation
            .new_page(&session.context)
            .await
            .map_err(into_browser_error)?;
        session.open_pages.insert(handle.clone());
        debug!(page = %handle, "Acquired page");

        Ok(Page::new(handle, Arc::clone(&self.automation)))
    }

    /// Close a page acquired from this manager.
    ///
    /// The page is forgotten even when closing it fails, so a second
    /// release of the same handle is a no-op.
    pub async fn release_page(&mut self, page: &PageHandle) -> Result<()> {
        let tracked = self
            .session
            .as_mut()
            .map(|s| s.open_pages.remove(page))
            .unwrap_or(false);
        if !tracked {
            debug!(%page, "Page not open, nothing to release");
            return Ok(());
        }

        debug!(%page, "Releasing page");
        self.automation
            .close_page(page)
            .await
            .map_err(into_browser_error)
    }

    /// Close leftover pages, then the context, then the browser.
    ///
    /// Safe to call repeatedly or without a prior [`initialize`](Self::initialize).
    /// Every close is attempted; the first error is returned.
    pub async fn teardown(&mut self) -> Result<()> {
        let Some(session) = self.session.take() else {
            debug!("No browser session to tear down");
            return Ok(());
        };

        let mut first_error: Option<Error> = None;

        for page in &session.open_pages {
            warn!(%page, "Page still open at teardown");
            if let Err(e) = self.automation.close_page(page).await {
                first_error.get_or_insert(into_browser_error(e));
            }
        }
        if let Err(e) = self.automation.close_context(&session.context).await {
            first_error.get_or_insert(into_browser_error(e));
        }
        if let Err(e) = self.automation.close_browser(&session.browser).await {
            first_error.get_or_insert(into_browser_error(e));
        }

        info!("Browser session closed");
        first_error.map_or(Ok(()), Err)
    }
}

fn into_browser_error(e: Error) -> Error {
    match e {
        Error::Browser(_) => e,
        other => Error::Browser(other.to_string()),
    }
}
