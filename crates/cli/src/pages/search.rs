//! Northumbria NHS site search

use std::sync::Arc;
use std::time::Duration;

use stepwright_core::{Page, Result, RunConfig, ScenarioContext, WaitOutcome, CONFIG_KEY};

pub const HOME_URL: &str = "https://www.northumbria.nhs.uk/";
pub const SEARCH_INPUT: &str = r#"//*[@id="search-query-carousel-40618"]"#;
pub const SEARCH_BUTTON: &str = "button[aria-label='Search']";
pub const RESULTS_PAGE: &str = "div#page-results";
pub const RESULT_ITEMS: &str = "div#page-results > div";

/// How long a search may take to show the results page, unless configured
pub const RESULTS_TIMEOUT: Duration = Duration::from_secs(10);

/// Search box and results page of the trust website
#[derive(Clone)]
pub struct SearchPage {
    page: Page,
    home_url: String,
    results_timeout: Duration,
}

impl SearchPage {
    pub fn new(page: Page) -> Self {
        Self {
            page,
            home_url: HOME_URL.to_string(),
            results_timeout: RESULTS_TIMEOUT,
        }
    }

    /// Build from the scenario's page. With a run config present, its
    /// `base_url` and `default_timeout_ms` override the defaults.
    pub fn from_context(ctx: &ScenarioContext) -> Result<Self> {
        let mut search = Self::new(ctx.page()?.clone());
        if let Some(config) = ctx.try_get::<Arc<RunConfig>>(CONFIG_KEY) {
            if let Some(url) = &config.base_url {
                search.home_url = url.clone();
            }
            search.results_timeout = config.default_timeout();
        }
        Ok(search)
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    pub async fn navigate_to_home(&self) -> Result<()> {
        self.page.navigate(&self.home_url).await
    }

    pub async fn enter_search_term(&self, term: &str) -> Result<()> {
        self.page.fill(SEARCH_INPUT, term).await
    }

    /// Click search and require the results page to appear
    pub async fn click_search_button(&self) -> Result<()> {
        self.page.click(SEARCH_BUTTON).await?;
        self.wait_for_results(self.results_timeout)
            .await?
            .require(RESULTS_PAGE, self.results_timeout)
    }

    /// Click search without waiting for anything
    pub async fn click_search_button_without_navigation(&self) -> Result<()> {
        self.page.click(SEARCH_BUTTON).await
    }

    pub async fn wait_for_results(&self, timeout: Duration) -> Result<WaitOutcome> {
        self.page.wait_for_selector(RESULTS_PAGE, timeout).await
    }

    pub async fn on_results_page(&self) -> Result<bool> {
        Ok(self.page.locator_count(RESULTS_PAGE).await? > 0)
    }

    /// Number of entries in the results list
    pub async fn results_count(&self) -> Result<usize> {
        self.page.locator_count(RESULT_ITEMS).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stepwright_core::mock::MockBrowser;
    use stepwright_core::{SessionConfig, SessionManager, PAGE_KEY};

    #[tokio::test]
    async fn test_config_overrides_home_and_timeout() {
        let mock = Arc::new(MockBrowser::new());
        let mut sessions = SessionManager::new(mock.clone());
        sessions.initialize(&SessionConfig::default()).await.unwrap();

        let mut ctx = ScenarioContext::new("search:11");
        ctx.insert(PAGE_KEY, sessions.acquire_page().await.unwrap());
        ctx.insert(
            CONFIG_KEY,
            Arc::new(RunConfig {
                base_url: Some("https://staging.example.test/".to_string()),
                default_timeout_ms: 2500,
                ..RunConfig::default()
            }),
        );

        let search = SearchPage::from_context(&ctx).unwrap();
        search.navigate_to_home().await.unwrap();
        assert_eq!(search.page().url().await.unwrap(), "https://staging.example.test/");

        let err = search.click_search_button().await.unwrap_err();
        assert!(err.to_string().contains("Timeout after 2500 ms"));
    }

    #[tokio::test]
    async fn test_missing_page_is_context_error() {
        let ctx = ScenarioContext::new("search:11");
        assert!(matches!(
            SearchPage::from_context(&ctx),
            Err(stepwright_core::Error::ContextKey { .. })
        ));
    }
}
