//! In-memory [`BrowserAutomation`] for tests
//!
//! `MockBrowser` records every call and simulates a tiny site: pages are
//! keyed by URL, each with its HTML content and the selectors present on
//! it. Clicking a selector registered with [`MockBrowser::link`] navigates.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

use crate::automation::{
    BrowserAutomation, BrowserEngine, BrowserHandle, ContextHandle, PageHandle, WaitOutcome,
};
use crate::error::{Error, Result};

/// A recorded automation call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    Launch { engine: BrowserEngine, headless: bool },
    NewContext(BrowserHandle),
    NewPage(ContextHandle),
    Navigate { page: PageHandle, url: String },
    Fill { page: PageHandle, selector: String, text: String },
    Click { page: PageHandle, selector: String },
    WaitForSelector { page: PageHandle, selector: String, timeout_ms: u64 },
    Content(PageHandle),
    Url(PageHandle),
    LocatorCount { page: PageHandle, selector: String },
    ClosePage(PageHandle),
    CloseContext(ContextHandle),
    CloseBrowser(BrowserHandle),
}

#[derive(Debug, Clone, Default)]
struct SitePage {
    content: String,
    selectors: HashMap<String, usize>,
}

#[derive(Debug, Default)]
struct Failures {
    launch: Option<String>,
    new_context: Option<String>,
    new_page: Option<String>,
    close_page: Option<String>,
    selectors: HashMap<String, String>,
}

#[derive(Debug, Default)]
struct MockState {
    calls: Vec<MockCall>,
    next_id: u64,
    browsers: BTreeSet<BrowserHandle>,
    contexts: BTreeSet<ContextHandle>,
    pages: HashMap<PageHandle, String>,
    fills: HashMap<(PageHandle, String), String>,
}

#[derive(Debug, Default)]
pub struct MockBrowser {
    site: Mutex<HashMap<String, SitePage>>,
    links: Mutex<HashMap<String, String>>,
    failures: Mutex<Failures>,
    state: Mutex<MockState>,
}

const BLANK: &str = "about:blank";

impl MockBrowser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `content` at `url`
    pub fn with_page(self, url: &str, content: &str) -> Self {
        self.site
            .lock()
            .entry(url.to_string())
            .or_default()
            .content = content.to_string();
        self
    }

    /// Make `selector` present `count` times on the page at `url`
    pub fn with_selector(self, url: &str, selector: &str, count: usize) -> Self {
        self.site
            .lock()
            .entry(url.to_string())
            .or_default()
            .selectors
            .insert(selector.to_string(), count);
        self
    }

    /// Clicking `selector` navigates to `target`
    pub fn link(self, selector: &str, target: &str) -> Self {
        self.links
            .lock()
            .insert(selector.to_string(), target.to_string());
        self
    }

    pub fn fail_launch(self, message: &str) -> Self {
        self.failures.lock().launch = Some(message.to_string());
        self
    }

    pub fn fail_new_context(self, message: &str) -> Self {
        self.failures.lock().new_context = Some(message.to_string());
        self
    }

    pub fn fail_new_page(self, message: &str) -> Self {
        self.failures.lock().new_page = Some(message.to_string());
        self
    }

    pub fn fail_close_page(self, message: &str) -> Self {
        self.failures.lock().close_page = Some(message.to_string());
        self
    }

    /// Fill/click on `selector` fails
    pub fn fail_selector(self, selector: &str, message: &str) -> Self {
        self.failures
            .lock()
            .selectors
            .insert(selector.to_string(), message.to_string());
        self
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.state.lock().calls.clone()
    }

    pub fn open_browsers(&self) -> usize {
        self.state.lock().browsers.len()
    }

    pub fn open_contexts(&self) -> usize {
        self.state.lock().contexts.len()
    }

    pub fn open_pages(&self) -> usize {
        self.state.lock().pages.len()
    }

    /// Pages ever created
    pub fn pages_created(&self) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|c| matches!(c, MockCall::NewPage(_)))
            .count()
    }

    pub fn close_page_count(&self, page: &PageHandle) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|c| matches!(c, MockCall::ClosePage(p) if p == page))
            .count()
    }

    /// Last text filled into `selector` on `page`
    pub fn filled(&self, page: &PageHandle, selector: &str) -> Option<String> {
        self.state
            .lock()
            .fills
            .get(&(page.clone(), selector.to_string()))
            .cloned()
    }

    fn record(&self, call: MockCall) {
        self.state.lock().calls.push(call);
    }

    fn next_id(&self, prefix: &str) -> String {
        let mut state = self.state.lock();
        state.next_id += 1;
        format!("{}-{}", prefix, state.next_id)
    }

    fn current_url(&self, page: &PageHandle) -> Result<String> {
        self.state
            .lock()
            .pages
            .get(page)
            .cloned()
            .ok_or_else(|| Error::Browser(format!("page {} is closed", page)))
    }

    fn selector_count(&self, page: &PageHandle, selector: &str) -> Result<usize> {
        let url = self.current_url(page)?;
        Ok(self
            .site
            .lock()
            .get(&url)
            .and_then(|p| p.selectors.get(selector).copied())
            .unwrap_or(0))
    }

    fn check_selector(&self, selector: &str) -> Result<()> {
        match self.failures.lock().selectors.get(selector) {
            Some(message) => Err(Error::Browser(message.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl BrowserAutomation for MockBrowser {
    async fn launch(&self, engine: BrowserEngine, headless: bool) -> Result<BrowserHandle> {
        self.record(MockCall::Launch { engine, headless });
        if let Some(message) = self.failures.lock().launch.clone() {
            return Err(Error::Browser(message));
        }
        let handle = BrowserHandle(self.next_id("browser"));
        self.state.lock().browsers.insert(handle.clone());
        Ok(handle)
    }

    async fn new_context(&self, browser: &BrowserHandle) -> Result<ContextHandle> {
        self.record(MockCall::NewContext(browser.clone()));
        if let Some(message) = self.failures.lock().new_context.clone() {
            return Err(Error::Browser(message));
        }
        let handle = ContextHandle(self.next_id("context"));
        self.state.lock().contexts.insert(handle.clone());
        Ok(handle)
    }

    async fn new_page(&self, context: &ContextHandle) -> Result<PageHandle> {
        self.record(MockCall::NewPage(context.clone()));
        if let Some(message) = self.failures.lock().new_page.clone() {
            return Err(Error::Browser(message));
        }
        let handle = PageHandle(self.next_id("page"));
        self.state
            .lock()
            .pages
            .insert(handle.clone(), BLANK.to_string());
        Ok(handle)
    }

    async fn navigate(&self, page: &PageHandle, url: &str) -> Result<()> {
        self.record(MockCall::Navigate {
            page: page.clone(),
            url: url.to_string(),
        });
        let mut state = self.state.lock();
        let current = state
            .pages
            .get_mut(page)
            .ok_or_else(|| Error::Browser(format!("page {} is closed", page)))?;
        *current = url.to_string();
        Ok(())
    }

    async fn fill(&self, page: &PageHandle, selector: &str, text: &str) -> Result<()> {
        self.record(MockCall::Fill {
            page: page.clone(),
            selector: selector.to_string(),
            text: text.to_string(),
        });
        self.check_selector(selector)?;
        self.current_url(page)?;
        self.state
            .lock()
            .fills
            .insert((page.clone(), selector.to_string()), text.to_string());
        Ok(())
    }

    async fn click(&self, page: &PageHandle, selector: &str) -> Result<()> {
        self.record(MockCall::Click {
            page: page.clone(),
            selector: selector.to_string(),
        });
        self.check_selector(selector)?;
        self.current_url(page)?;
        let target = self.links.lock().get(selector).cloned();
        if let Some(url) = target {
            if let Some(current) = self.state.lock().pages.get_mut(page) {
                *current = url;
            }
        }
        Ok(())
    }

    async fn wait_for_selector(
        &self,
        page: &PageHandle,
        selector: &str,
        timeout: Duration,
    ) -> Result<WaitOutcome> {
        self.record(MockCall::WaitForSelector {
            page: page.clone(),
            selector: selector.to_string(),
            timeout_ms: timeout.as_millis() as u64,
        });
        if self.selector_count(page, selector)? > 0 {
            Ok(WaitOutcome::Found)
        } else {
            Ok(WaitOutcome::TimedOut)
        }
    }

    async fn content(&self, page: &PageHandle) -> Result<String> {
        self.record(MockCall::Content(page.clone()));
        let url = self.current_url(page)?;
        Ok(self
            .site
            .lock()
            .get(&url)
            .map(|p| p.content.clone())
            .unwrap_or_default())
    }

    async fn url(&self, page: &PageHandle) -> Result<String> {
        self.record(MockCall::Url(page.clone()));
        self.current_url(page)
    }

    async fn locator_count(&self, page: &PageHandle, selector: &str) -> Result<usize> {
        self.record(MockCall::LocatorCount {
            page: page.clone(),
            selector: selector.to_string(),
        });
        self.selector_count(page, selector)
    }

    async fn close_page(&self, page: &PageHandle) -> Result<()> {
        self.record(MockCall::ClosePage(page.clone()));
        let removed = self.state.lock().pages.remove(page).is_some();
        if let Some(message) = self.failures.lock().close_page.clone() {
            return Err(Error::Browser(message));
        }
        if removed {
            Ok(())
        } else {
            Err(Error::Browser(format!("page {} already closed", page)))
        }
    }

    async fn close_context(&self, context: &ContextHandle) -> Result<()> {
        self.record(MockCall::CloseContext(context.clone()));
        let mut state = self.state.lock();
        state.contexts.remove(context);
        state.pages.clear();
        Ok(())
    }

    async fn close_browser(&self, browser: &BrowserHandle) -> Result<()> {
        self.record(MockCall::CloseBrowser(browser.clone()));
        self.state.lock().browsers.remove(browser);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_simulated_navigation() {
        let mock = MockBrowser::new()
            .with_page("https://site.test/", "<html>home</html>")
            .with_selector("https://site.test/results", "div#page-results", 1)
            .with_page("https://site.test/results", "<div id=\"page-results\">flu</div>")
            .link("button[aria-label='Search']", "https://site.test/results");

        let browser = mock.launch(BrowserEngine::Chromium, true).await.unwrap();
        let context = mock.new_context(&browser).await.unwrap();
        let page = mock.new_page(&context).await.unwrap();
        let timeout = Duration::from_millis(100);

        mock.navigate(&page, "https://site.test/").await.unwrap();
        assert_eq!(
            mock.wait_for_selector(&page, "div#page-results", timeout).await.unwrap(),
            WaitOutcome::TimedOut
        );

        mock.click(&page, "button[aria-label='Search']").await.unwrap();
        assert_eq!(mock.url(&page).await.unwrap(), "https://site.test/results");
        assert!(mock
            .wait_for_selector(&page, "div#page-results", timeout)
            .await
            .unwrap()
            .is_found());
        assert!(mock.content(&page).await.unwrap().contains("flu"));
    }

    #[tokio::test]
    async fn test_closed_page_rejects_calls() {
        let mock = MockBrowser::new();
        let browser = mock.launch(BrowserEngine::Chromium, true).await.unwrap();
        let context = mock.new_context(&browser).await.unwrap();
        let page = mock.new_page(&context).await.unwrap();

        mock.close_page(&page).await.unwrap();
        assert!(mock.navigate(&page, "https://site.test/").await.is_err());
        assert!(mock.close_page(&page).await.is_err());
    }

    #[tokio::test]
    async fn test_fill_recorded_and_selector_failure() {
        let mock = MockBrowser::new().fail_selector("#broken", "element is detached");
        let browser = mock.launch(BrowserEngine::Firefox, true).await.unwrap();
        let context = mock.new_context(&browser).await.unwrap();
        let page = mock.new_page(&context).await.unwrap();

        mock.fill(&page, "#q", "flu jab").await.unwrap();
        mock.fill(&page, "#q", "measles").await.unwrap();
        assert_eq!(mock.filled(&page, "#q").as_deref(), Some("measles"));

        let err = mock.click(&page, "#broken").await.unwrap_err();
        assert!(err.to_string().contains("element is detached"));
        assert_eq!(
            mock.calls()[0],
            MockCall::Launch {
                engine: BrowserEngine::Firefox,
                headless: true
            }
        );
    }
}
