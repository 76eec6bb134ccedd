//! Steps for the trust website search

use std::time::Duration;

use stepwright_core::{ensure, Error, Result, StepRegistry, WaitOutcome};

use crate::pages::search::RESULTS_PAGE;
use crate::pages::SearchPage;

/// Phrases the site uses when a search finds nothing
const NO_RESULTS_MARKERS: &[&str] = &[
    "no results",
    "0 results",
    "nothing found",
    "did not match",
    "sorry",
    "no matches",
    "couldn't find",
];

/// Signs of content shown after an empty search
const EMPTY_SEARCH_MARKERS: &[&str] = &[
    "You might also be interested",
    "suggested",
    "page-results",
];

/// The web application firewall's block page
const SECURITY_BLOCK_MARKERS: &[&str] = &[
    "Access denied",
    "blocked by our security service",
    "Error 15",
];

const RESULTS_LOAD_TIMEOUT: Duration = Duration::from_secs(15);
const RESPONSE_TIMEOUT: Duration = Duration::from_secs(5);
const SETTLE_DELAY: Duration = Duration::from_secs(1);

fn contains_any(content: &str, needles: &[&str]) -> bool {
    let content = content.to_lowercase();
    needles
        .iter()
        .any(|needle| content.contains(&needle.to_lowercase()))
}

pub fn register(registry: &mut StepRegistry) -> Result<()> {
    registry
        .given("I am on the Northumbria NHS website", |ctx, _| {
            Box::pin(async move { SearchPage::from_context(ctx)?.navigate_to_home().await })
        })?
        .when(r#"I enter "(.*)" in the search field"#, |ctx, args| {
            Box::pin(async move {
                SearchPage::from_context(ctx)?
                    .enter_search_term(&args[0])
                    .await
            })
        })?
        .when("I leave the search field empty", |ctx, _| {
            Box::pin(async move { SearchPage::from_context(ctx)?.enter_search_term("").await })
        })?
        .when("I click the search button", |ctx, _| {
            Box::pin(async move { SearchPage::from_context(ctx)?.click_search_button().await })
        })?
        .when("I click the search button without expecting navigation", |ctx, _| {
            Box::pin(async move {
                SearchPage::from_context(ctx)?
                    .click_search_button_without_navigation()
                    .await
            })
        })?
        .when("I click the search button and wait for response", |ctx, _| {
            Box::pin(async move {
                let search = SearchPage::from_context(ctx)?;
                search.click_search_button_without_navigation().await?;
                // Validation may keep us on the same page
                if search.wait_for_results(RESPONSE_TIMEOUT).await? == WaitOutcome::TimedOut {
                    tokio::time::sleep(SETTLE_DELAY).await;
                }
                Ok(())
            })
        })?
        .then(r#"I should see search results related to "(.*)""#, |ctx, args| {
            Box::pin(async move {
                let search = SearchPage::from_context(ctx)?;
                search
                    .wait_for_results(RESULTS_LOAD_TIMEOUT)
                    .await?
                    .require(RESULTS_PAGE, RESULTS_LOAD_TIMEOUT)?;
                let content = search.page().content().await?;
                ensure(
                    content.contains(&args[0]),
                    format!("search results should contain '{}'", args[0]),
                )
            })
        })?
        .then("I should see a no results message", |ctx, _| {
            Box::pin(async move {
                let search = SearchPage::from_context(ctx)?;
                search
                    .wait_for_results(RESULTS_LOAD_TIMEOUT)
                    .await?
                    .require(RESULTS_PAGE, RESULTS_LOAD_TIMEOUT)?;
                let content = search.page().content().await?;
                if contains_any(&content, NO_RESULTS_MARKERS) {
                    return Ok(());
                }
                let count = search.results_count().await?;
                ensure(
                    count == 0,
                    format!("no 'no results' message and {} result(s) listed", count),
                )
            })
        })?
        .then("I should see an appropriate message for empty search", |ctx, _| {
            Box::pin(async move {
                let search = SearchPage::from_context(ctx)?;
                tokio::time::sleep(SETTLE_DELAY).await;

                if search.on_results_page().await? {
                    let content = search.page().content().await?;
                    ensure(
                        contains_any(&content, EMPTY_SEARCH_MARKERS),
                        "empty search should show suggestions or the results page",
                    )
                } else {
                    let url = search.page().url().await?;
                    ensure(!url.is_empty(), "page did not respond to empty search")
                }
            })
        })?
        .then("the search should handle special characters gracefully", |ctx, _| {
            Box::pin(async move {
                let search = SearchPage::from_context(ctx)?;
                let content = search.page().content().await?;
                let url = search.page().url().await?;

                // A firewall block is an acceptable response to hostile input
                if contains_any(&content, SECURITY_BLOCK_MARKERS) {
                    return Ok(());
                }

                if search.on_results_page().await? {
                    ensure(
                        content.contains("page-results"),
                        "results page did not load correctly",
                    )?;
                } else {
                    ensure(!url.is_empty(), "page is no longer accessible")?;
                }

                let injected = search.page().locator_count("script:has-text('test')").await?;
                if injected > 0 {
                    return Err(Error::assertion(format!(
                        "special characters executed as code ({} injected script(s))",
                        injected
                    )));
                }
                Ok(())
            })
        })?;
    Ok(())
}
