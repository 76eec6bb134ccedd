//! Step executor: drives one scenario through its lifecycle
//!
//! ```text
//! Pending → Running ─┬─ BeforeScenario failed ───────────→ Error
//!                    ├─ step unresolved (NoMatch/Ambiguous) → Error
//!                    ├─ step handler failed ────────────→ Failed
//!                    └─ all steps passed ───────────────→ Passed
//! ```
//!
//! Whatever the path, AfterScenario hooks run and the page is released
//! before the report is returned.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

use crate::config::RunConfig;
use crate::context::{ScenarioContext, CONFIG_KEY, PAGE_KEY};
use crate::error::catch_panic;
use crate::feature::{Scenario, Step};
use crate::hooks::{HookFailure, HookPhase, HookScheduler};
use crate::registry::StepRegistry;
use crate::session::SessionManager;

/// Scenario lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioStatus {
    Pending,
    Running,
    Passed,
    Failed,
    Error,
}

impl fmt::Display for ScenarioStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScenarioStatus::Pending => "pending",
            ScenarioStatus::Running => "running",
            ScenarioStatus::Passed => "passed",
            ScenarioStatus::Failed => "failed",
            ScenarioStatus::Error => "error",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepResult {
    Passed,
    Failed,
    Skipped,
}

/// What happened to one step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepOutcome {
    pub step: Step,
    pub result: StepResult,
    pub error: Option<String>,
    pub duration_ms: u64,
}

impl StepOutcome {
    fn skipped(step: &Step) -> Self {
        Self {
            step: step.clone(),
            result: StepResult::Skipped,
            error: None,
            duration_ms: 0,
        }
    }
}

/// Final record of one scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioReport {
    pub id: String,
    pub name: String,
    pub status: ScenarioStatus,
    pub steps: Vec<StepOutcome>,
    pub hook_failures: Vec<HookFailure>,
    pub error: Option<String>,
    pub duration_ms: u64,
}

impl ScenarioReport {
    /// Report for a scenario that never ran
    pub fn pending(scenario: &Scenario) -> Self {
        Self {
            id: scenario.id.clone(),
            name: scenario.name.clone(),
            status: ScenarioStatus::Pending,
            steps: Vec::new(),
            hook_failures: Vec::new(),
            error: None,
            duration_ms: 0,
        }
    }

    /// First step that did not pass
    pub fn failing_step(&self) -> Option<&StepOutcome> {
        self.steps.iter().find(|s| s.result == StepResult::Failed)
    }

    pub fn results(&self) -> Vec<StepResult> {
        self.steps.iter().map(|s| s.result).collect()
    }

    /// Record a post-step problem; only a passing scenario changes status
    fn record_teardown_failure(&mut self, failure: HookFailure) {
        if self.status == ScenarioStatus::Passed {
            self.status = ScenarioStatus::Error;
        }
        self.error.get_or_insert_with(|| failure.to_string());
        self.hook_failures.push(failure);
    }
}

/// Runs single scenarios against a registry and hook set
pub struct StepExecutor<'r> {
    registry: &'r StepRegistry,
    hooks: &'r HookScheduler,
    config: Option<Arc<RunConfig>>,
}

impl<'r> StepExecutor<'r> {
    pub fn new(registry: &'r StepRegistry, hooks: &'r HookScheduler) -> Self {
        Self {
            registry,
            hooks,
            config: None,
        }
    }

    /// Seed every scenario context with the run configuration
    pub fn with_config(mut self, config: Arc<RunConfig>) -> Self {
        self.config = Some(config);
        self
    }

    /// Execute `scenario` with a page from `sessions`.
    ///
    /// Never returns an error: every failure ends up in the report.
    pub async fn execute(
        &self,
        scenario: &Scenario,
        sessions: &mut SessionManager,
    ) -> ScenarioReport {
        let start = Instant::now();
        let mut report = ScenarioReport::pending(scenario);
        report.status = ScenarioStatus::Running;
        info!(scenario = %scenario.id, "Scenario: {}", scenario.name);

        let mut ctx = ScenarioContext::new(scenario.id.clone());
        if let Some(config) = &self.config {
            ctx.insert(CONFIG_KEY, Arc::clone(config));
        }

        // BeforeScenario: the page comes first so hooks can use it
        let page = match sessions.acquire_page().await {
            Ok(page) => {
                let handle = page.handle().clone();
                ctx.insert(PAGE_KEY, page);
                Some(handle)
            }
            Err(e) => {
                warn!(scenario = %scenario.id, "Could not acquire page: {}", e);
                report.hook_failures.push(HookFailure {
                    phase: HookPhase::BeforeScenario,
                    name: "acquire page".to_string(),
                    order: i32::MIN,
                    error: e.to_string(),
                });
                None
            }
        };
        report
            .hook_failures
            .extend(self.hooks.run_phase(HookPhase::BeforeScenario, &mut ctx).await);

        if let Some(first) = report.hook_failures.first() {
            report.status = ScenarioStatus::Error;
            report.error = Some(first.to_string());
            report.steps = scenario.steps.iter().map(StepOutcome::skipped).collect();
        } else {
            self.run_steps(scenario, &mut ctx, &mut report).await;
        }

        for failure in self.hooks.run_phase(HookPhase::AfterScenario, &mut ctx).await {
            report.record_teardown_failure(failure);
        }

        if let Some(handle) = page {
            if let Err(e) = sessions.release_page(&handle).await {
                report.record_teardown_failure(HookFailure {
                    phase: HookPhase::AfterScenario,
                    name: "release page".to_string(),
                    order: i32::MAX,
                    error: e.to_string(),
                });
            }
        }
        drop(ctx);

        report.duration_ms = start.elapsed().as_millis() as u64;
        match report.status {
            ScenarioStatus::Passed => {
                info!("✓ {} ({} ms)", scenario.name, report.duration_ms);
            }
            _ => {
                error!(
                    "✗ {} [{}] - {}",
                    scenario.name,
                    report.status,
                    report.error.as_deref().unwrap_or("unknown error")
                );
            }
        }
        report
    }

    /// Fail-fast step loop: after the first failure every step is skipped
    async fn run_steps(
        &self,
        scenario: &Scenario,
        ctx: &mut ScenarioContext,
        report: &mut ScenarioReport,
    ) {
        let mut halted = false;
        report.status = ScenarioStatus::Passed;

        for step in &scenario.steps {
            if halted {
                report.steps.push(StepOutcome::skipped(step));
                continue;
            }

            let started = Instant::now();
            let result = match self.registry.resolve(step.keyword, &step.text) {
                Ok(resolved) => {
                    debug!(step = %step, args = ?resolved.args, "Running step");
                    catch_panic(resolved.invoke(ctx)).await
                }
                Err(e) => Err(e),
            };

            let mut outcome = StepOutcome {
                step: step.clone(),
                result: StepResult::Passed,
                error: None,
                duration_ms: started.elapsed().as_millis() as u64,
            };

            if let Err(e) = result {
                warn!(step = %step, line = step.line, "Step failed: {}", e);
                report.status = if e.is_resolution() {
                    ScenarioStatus::Error
                } else {
                    ScenarioStatus::Failed
                };
                report.error = Some(format!("{}: {}", step, e));
                outcome.result = StepResult::Failed;
                outcome.error = Some(e.to_string());
                halted = true;
            }

            report.steps.push(outcome);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::feature::Keyword;
    use crate::mock::MockBrowser;
    use crate::session::SessionConfig;
    use std::sync::Arc;

    async fn session(mock: &Arc<MockBrowser>) -> SessionManager {
        let mut manager = SessionManager::new(mock.clone());
        manager.initialize(&SessionConfig::default()).await.unwrap();
        manager
    }

    fn four_steps() -> Scenario {
        Scenario::new(
            "checkout:3",
            vec![
                Step::new(Keyword::Given, "a step that passes"),
                Step::new(Keyword::When, "a step that fails"),
                Step::new(Keyword::Then, "a step that passes"),
                Step::new(Keyword::Then, "a step that passes"),
            ],
        )
    }

    fn registry() -> StepRegistry {
        let mut registry = StepRegistry::new();
        for keyword in [Keyword::Given, Keyword::When, Keyword::Then] {
            registry
                .register(keyword, "a step that passes", |ctx, _| {
                    Box::pin(async move {
                        let runs = ctx.try_get::<u32>("runs").copied().unwrap_or(0);
                        ctx.insert("runs", runs + 1);
                        Ok(())
                    })
                })
                .unwrap()
                .register(keyword, "a step that fails", |_, _| {
                    Box::pin(async { Err(Error::assertion("expected results")) })
                })
                .unwrap();
        }
        registry
    }

    #[tokio::test]
    async fn test_fail_fast_marks_remaining_skipped() {
        let mock = Arc::new(MockBrowser::new());
        let mut sessions = session(&mock).await;
        let registry = registry();
        let hooks = HookScheduler::new();

        let report = StepExecutor::new(&registry, &hooks)
            .execute(&four_steps(), &mut sessions)
            .await;

        assert_eq!(report.status, ScenarioStatus::Failed);
        assert_eq!(
            report.results(),
            vec![
                StepResult::Passed,
                StepResult::Failed,
                StepResult::Skipped,
                StepResult::Skipped
            ]
        );
        let failing = report.failing_step().unwrap();
        assert_eq!(failing.step.text, "a step that fails");
        assert!(failing.error.as_deref().unwrap().contains("expected results"));
        assert_eq!(mock.open_pages(), 0);
    }

    #[tokio::test]
    async fn test_unresolved_step_is_error() {
        let mock = Arc::new(MockBrowser::new());
        let mut sessions = session(&mock).await;
        let registry = registry();
        let hooks = HookScheduler::new();

        let scenario = Scenario::new(
            "s:1",
            vec![
                Step::new(Keyword::Given, "a step that passes"),
                Step::new(Keyword::When, "nobody wrote this step"),
                Step::new(Keyword::Then, "a step that passes"),
            ],
        );
        let report = StepExecutor::new(&registry, &hooks)
            .execute(&scenario, &mut sessions)
            .await;

        assert_eq!(report.status, ScenarioStatus::Error);
        assert_eq!(
            report.results(),
            vec![StepResult::Passed, StepResult::Failed, StepResult::Skipped]
        );
        assert!(report.error.unwrap().contains("No step definition matches"));
    }

    #[tokio::test]
    async fn test_before_scenario_failure_skips_steps_but_cleans_up() {
        let mock = Arc::new(MockBrowser::new());
        let mut sessions = session(&mock).await;
        let registry = registry();
        let mut hooks = HookScheduler::new();
        hooks
            .before_scenario(0, "seed data", |_| {
                Box::pin(async {
                    Err(Error::Hook {
                        name: "seed data".into(),
                        reason: "fixture missing".into(),
                    })
                })
            })
            .after_scenario(0, "mark cleanup", |ctx| {
                Box::pin(async move {
                    ctx.page()?;
                    ctx.insert("cleaned", true);
                    Ok(())
                })
            });

        let report = StepExecutor::new(&registry, &hooks)
            .execute(&four_steps(), &mut sessions)
            .await;

        assert_eq!(report.status, ScenarioStatus::Error);
        assert!(report.steps.iter().all(|s| s.result == StepResult::Skipped));
        assert_eq!(report.hook_failures.len(), 1);
        assert_eq!(report.hook_failures[0].phase, HookPhase::BeforeScenario);
        assert_eq!(mock.pages_created(), 1);
        assert_eq!(mock.open_pages(), 0);
    }

    #[tokio::test]
    async fn test_after_scenario_failure_turns_pass_into_error() {
        let mock = Arc::new(MockBrowser::new());
        let mut sessions = session(&mock).await;
        let registry = registry();
        let mut hooks = HookScheduler::new();
        hooks.after_scenario(0, "flush logs", |_| {
            Box::pin(async { Err(Error::Browser("log sink gone".into())) })
        });

        let scenario = Scenario::new("s:1", vec![Step::new(Keyword::Given, "a step that passes")]);
        let report = StepExecutor::new(&registry, &hooks)
            .execute(&scenario, &mut sessions)
            .await;

        assert_eq!(report.status, ScenarioStatus::Error);
        assert_eq!(report.results(), vec![StepResult::Passed]);
        assert_eq!(report.hook_failures[0].name, "flush logs");
        assert_eq!(mock.open_pages(), 0);
    }

    #[tokio::test]
    async fn test_page_acquisition_failure_is_error() {
        let mock = Arc::new(MockBrowser::new().fail_new_page("too many pages"));
        let mut sessions = session(&mock).await;
        let registry = registry();
        let hooks = HookScheduler::new();

        let report = StepExecutor::new(&registry, &hooks)
            .execute(&four_steps(), &mut sessions)
            .await;

        assert_eq!(report.status, ScenarioStatus::Error);
        assert_eq!(report.hook_failures[0].name, "acquire page");
        assert!(report.steps.iter().all(|s| s.result == StepResult::Skipped));
    }

    #[tokio::test]
    async fn test_release_failure_recorded() {
        let mock = Arc::new(MockBrowser::new().fail_close_page("target crashed"));
        let mut sessions = session(&mock).await;
        let registry = registry();
        let hooks = HookScheduler::new();

        let scenario = Scenario::new("s:1", vec![Step::new(Keyword::Given, "a step that passes")]);
        let report = StepExecutor::new(&registry, &hooks)
            .execute(&scenario, &mut sessions)
            .await;

        assert_eq!(report.status, ScenarioStatus::Error);
        assert_eq!(report.hook_failures[0].name, "release page");
        assert!(sessions.session().unwrap().open_pages.is_empty());
    }

    #[tokio::test]
    async fn test_config_visible_to_steps() {
        let mock = Arc::new(MockBrowser::new());
        let mut sessions = session(&mock).await;
        let mut registry = StepRegistry::new();
        registry
            .given("the site is configured", |ctx, _| {
                Box::pin(async move {
                    let config = ctx.get::<Arc<RunConfig>>(CONFIG_KEY)?;
                    crate::error::ensure(config.base_url.is_some(), "no base url")
                })
            })
            .unwrap();
        let hooks = HookScheduler::new();
        let config = RunConfig {
            base_url: Some("https://example.test/".to_string()),
            ..RunConfig::default()
        };

        let scenario = Scenario::new(
            "s:1",
            vec![Step::new(Keyword::Given, "the site is configured")],
        );
        let report = StepExecutor::new(&registry, &hooks)
            .with_config(Arc::new(config))
            .execute(&scenario, &mut sessions)
            .await;

        assert_eq!(report.status, ScenarioStatus::Passed);
    }

    #[tokio::test]
    async fn test_panicking_handler_fails_step() {
        let mock = Arc::new(MockBrowser::new());
        let mut sessions = session(&mock).await;
        let mut registry = StepRegistry::new();
        registry
            .then("the count is (\\d+)", |_, args| {
                Box::pin(async move {
                    let count: u32 = args[0].parse().map_err(|_| Error::assertion("not a number"))?;
                    assert_eq!(count, 2, "count mismatch");
                    Ok(())
                })
            })
            .unwrap();
        let hooks = HookScheduler::new();

        let scenario = Scenario::new("s:1", vec![Step::new(Keyword::Then, "the count is 3")]);
        let report = StepExecutor::new(&registry, &hooks)
            .execute(&scenario, &mut sessions)
            .await;

        assert_eq!(report.status, ScenarioStatus::Failed);
        assert!(report.steps[0].error.as_deref().unwrap().contains("count mismatch"));
    }
}
