//! Run controller: drives a whole run and aggregates the report

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

use crate::automation::BrowserAutomation;
use crate::config::RunConfig;
use crate::context::ScenarioContext;
use crate::error::{Error, Result};
use crate::executor::{ScenarioReport, ScenarioStatus, StepExecutor};
use crate::feature::Scenario;
use crate::hooks::{HookFailure, HookPhase, HookScheduler};
use crate::registry::StepRegistry;
use crate::session::SessionManager;

/// Report file name inside the output directory
pub const REPORT_FILE: &str = "run-report.json";

/// Outcome of a whole run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunReport {
    pub scenarios: Vec<ScenarioReport>,
    pub passed: usize,
    pub failed: usize,
    pub errored: usize,
    pub pending: usize,
    pub duration_ms: u64,
    /// Set when BeforeRun or browser initialization aborted the run
    pub fatal_error: Option<String>,
    /// Every BeforeRun hook failure; the first one is also the fatal error
    #[serde(default)]
    pub before_run_failures: Vec<HookFailure>,
    /// AfterRun hook and teardown failures; never change scenario outcomes
    pub after_run_failures: Vec<HookFailure>,
}

impl RunReport {
    fn from_scenarios(scenarios: Vec<ScenarioReport>) -> Self {
        let count = |status| scenarios.iter().filter(|s| s.status == status).count();
        Self {
            passed: count(ScenarioStatus::Passed),
            failed: count(ScenarioStatus::Failed),
            errored: count(ScenarioStatus::Error),
            pending: count(ScenarioStatus::Pending),
            scenarios,
            ..Self::default()
        }
    }

    pub fn total(&self) -> usize {
        self.scenarios.len()
    }

    /// Scenarios that left `Pending`
    pub fn executed(&self) -> usize {
        self.total() - self.pending
    }

    /// No fatal error and no scenario failed, errored or left pending
    pub fn success(&self) -> bool {
        self.fatal_error.is_none() && self.failed == 0 && self.errored == 0 && self.pending == 0
    }

    pub fn get(&self, id: &str) -> Option<&ScenarioReport> {
        self.scenarios.iter().find(|s| s.id == id)
    }

    /// Write the report as pretty JSON to `dir/run-report.json`
    pub fn write_json(&self, dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(dir)?;

        let path = dir.join(REPORT_FILE);
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, json)?;

        info!("Report written to: {}", path.display());
        Ok(path)
    }
}

/// Drives scenarios through a single browser session.
///
/// The registry and hooks are fixed when the runner is built; a runner can
/// perform several runs, each with its own browser session.
pub struct Runner {
    config: Arc<RunConfig>,
    registry: StepRegistry,
    hooks: HookScheduler,
    sessions: SessionManager,
}

impl Runner {
    pub fn new(
        automation: Arc<dyn BrowserAutomation>,
        config: RunConfig,
        registry: StepRegistry,
        hooks: HookScheduler,
    ) -> Self {
        Self {
            config: Arc::new(config),
            registry,
            hooks,
            sessions: SessionManager::new(automation),
        }
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn registry(&self) -> &StepRegistry {
        &self.registry
    }

    pub fn hooks(&self) -> &HookScheduler {
        &self.hooks
    }

    /// Run scenarios carrying `tag`
    pub async fn run_tagged(&mut self, scenarios: &[Scenario], tag: &str) -> RunReport {
        let selected: Vec<Scenario> = scenarios
            .iter()
            .filter(|s| s.has_tag(tag))
            .cloned()
            .collect();
        self.run(&selected).await
    }

    /// Run the scenarios named `name`
    pub async fn run_named(&mut self, scenarios: &[Scenario], name: &str) -> Result<RunReport> {
        let selected: Vec<Scenario> = scenarios
            .iter()
            .filter(|s| s.name == name)
            .cloned()
            .collect();
        if selected.is_empty() {
            return Err(Error::Config(format!("Scenario not found: {}", name)));
        }
        Ok(self.run(&selected).await)
    }

    /// Execute a full run.
    ///
    /// BeforeRun hooks and browser initialization are fatal: on failure no
    /// scenario leaves `Pending`. AfterRun hooks and teardown always happen.
    pub async fn run(&mut self, scenarios: &[Scenario]) -> RunReport {
        let start = Instant::now();
        info!("Running {} scenario(s)...", scenarios.len());

        let mut run_ctx = ScenarioContext::new("run");
        let mut before_run_failures = Vec::new();
        let fatal_error = match self.prepare(&mut run_ctx, &mut before_run_failures).await {
            Ok(()) => None,
            Err(e) => {
                error!("Run aborted: {}", e);
                Some(e.to_string())
            }
        };

        let reports = if fatal_error.is_some() {
            scenarios.iter().map(ScenarioReport::pending).collect()
        } else {
            let executor = StepExecutor::new(&self.registry, &self.hooks)
                .with_config(Arc::clone(&self.config));
            let mut reports = Vec::with_capacity(scenarios.len());
            for scenario in scenarios {
                reports.push(executor.execute(scenario, &mut self.sessions).await);
            }
            reports
        };

        let mut after_run_failures = self.hooks.run_phase(HookPhase::AfterRun, &mut run_ctx).await;
        if let Err(e) = self.sessions.teardown().await {
            warn!("Browser teardown failed: {}", e);
            after_run_failures.push(HookFailure {
                phase: HookPhase::AfterRun,
                name: "browser teardown".to_string(),
                order: i32::MAX,
                error: e.to_string(),
            });
        }

        let mut report = RunReport::from_scenarios(reports);
        report.fatal_error = fatal_error;
        report.before_run_failures = before_run_failures;
        report.after_run_failures = after_run_failures;
        report.duration_ms = start.elapsed().as_millis() as u64;

        info!("");
        info!(
            "Results: {} passed, {} failed, {} errored, {} pending ({} ms)",
            report.passed, report.failed, report.errored, report.pending, report.duration_ms
        );
        report
    }

    /// BeforeRun hooks, then the browser session
    async fn prepare(
        &mut self,
        run_ctx: &mut ScenarioContext,
        failures: &mut Vec<HookFailure>,
    ) -> Result<()> {
        *failures = self.hooks.run_phase(HookPhase::BeforeRun, run_ctx).await;
        if let Some(first) = failures.first() {
            return Err(Error::Hook {
                name: first.name.clone(),
                reason: first.error.clone(),
            });
        }

        self.sessions.initialize(&self.config.session()).await?;
        Ok(())
    }
}
