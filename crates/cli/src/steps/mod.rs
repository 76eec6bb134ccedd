//! Step definitions and hooks bundled with the CLI

pub mod search;

use stepwright_core::{HookScheduler, Result, StepRegistry};
use tracing::{debug, info};

/// Registry holding every bundled step library
pub fn registry() -> Result<StepRegistry> {
    let mut registry = StepRegistry::new();
    search::register(&mut registry)?;
    Ok(registry)
}

/// Logging hooks around each scenario
pub fn hooks() -> HookScheduler {
    let mut hooks = HookScheduler::new();
    hooks
        .before_scenario(1, "announce scenario", |ctx| {
            Box::pin(async move {
                info!(scenario = %ctx.scope(), "Starting scenario");
                Ok(())
            })
        })
        .after_scenario(1, "log final url", |ctx| {
            Box::pin(async move {
                if let Ok(page) = ctx.page() {
                    let url = page.url().await?;
                    debug!(scenario = %ctx.scope(), %url, "Scenario finished");
                }
                Ok(())
            })
        });
    hooks
}
