//! Lifecycle hooks and their scheduling

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::context::ScenarioContext;
use crate::error::catch_panic;
use crate::registry::StepFuture;

/// Lifecycle phase a hook is bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookPhase {
    BeforeRun,
    BeforeScenario,
    AfterScenario,
    AfterRun,
}

impl fmt::Display for HookPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HookPhase::BeforeRun => "BeforeRun",
            HookPhase::BeforeScenario => "BeforeScenario",
            HookPhase::AfterScenario => "AfterScenario",
            HookPhase::AfterRun => "AfterRun",
        };
        f.write_str(name)
    }
}

/// A hook action. Scenario hooks get the scenario's context, run hooks a
/// run-scoped one.
pub type HookFn = dyn for<'a> Fn(&'a mut ScenarioContext) -> StepFuture<'a> + Send + Sync;

pub struct Hook {
    pub phase: HookPhase,
    pub order: i32,
    pub name: String,
    seq: usize,
    action: Arc<HookFn>,
}

impl fmt::Debug for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hook")
            .field("phase", &self.phase)
            .field("order", &self.order)
            .field("name", &self.name)
            .finish()
    }
}

/// A hook that returned an error or panicked
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookFailure {
    pub phase: HookPhase,
    pub name: String,
    pub order: i32,
    pub error: String,
}

impl fmt::Display for HookFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} hook '{}' failed: {}", self.phase, self.name, self.error)
    }
}

/// Ordered hook storage.
///
/// Within a phase hooks run in ascending `order`, ties in registration
/// order. A failing hook never stops the rest of its phase.
#[derive(Default)]
pub struct HookScheduler {
    hooks: Vec<Hook>,
}

impl fmt::Debug for HookScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookScheduler")
            .field("hooks", &self.hooks)
            .finish()
    }
}

impl HookScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, phase: HookPhase, order: i32, name: &str, action: F) -> &mut Self
    where
        F: for<'a> Fn(&'a mut ScenarioContext) -> StepFuture<'a> + Send + Sync + 'static,
    {
        let seq = self.hooks.len();
        self.hooks.push(Hook {
            phase,
            order,
            name: name.to_string(),
            seq,
            action: Arc::new(action),
        });
        self
    }

    pub fn before_run<F>(&mut self, order: i32, name: &str, action: F) -> &mut Self
    where
        F: for<'a> Fn(&'a mut ScenarioContext) -> StepFuture<'a> + Send + Sync + 'static,
    {
        self.register(HookPhase::BeforeRun, order, name, action)
    }

    pub fn before_scenario<F>(&mut self, order: i32, name: &str, action: F) -> &mut Self
    where
        F: for<'a> Fn(&'a mut ScenarioContext) -> StepFuture<'a> + Send + Sync + 'static,
    {
        self.register(HookPhase::BeforeScenario, order, name, action)
    }

    pub fn after_scenario<F>(&mut self, order: i32, name: &str, action: F) -> &mut Self
    where
        F: for<'a> Fn(&'a mut ScenarioContext) -> StepFuture<'a> + Send + Sync + 'static,
    {
        self.register(HookPhase::AfterScenario, order, name, action)
    }

    pub fn after_run<F>(&mut self, order: i32, name: &str, action: F) -> &mut Self
    where
        F: for<'a> Fn(&'a mut ScenarioContext) -> StepFuture<'a> + Send + Sync + 'static,
    {
        self.register(HookPhase::AfterRun, order, name, action)
    }

    /// Hooks of a phase in execution order
    pub fn hooks_for(&self, phase: HookPhase) -> Vec<&Hook> {
        let mut hooks: Vec<&Hook> = self.hooks.iter().filter(|h| h.phase == phase).collect();
        hooks.sort_by_key(|h| (h.order, h.seq));
        hooks
    }

    /// Run every hook of `phase`, returning the failures
    pub async fn run_phase(
        &self,
        phase: HookPhase,
        ctx: &mut ScenarioContext,
    ) -> Vec<HookFailure> {
        let mut failures = Vec::new();

        for hook in self.hooks_for(phase) {
            debug!(
                %phase,
                hook = %hook.name,
                order = hook.order,
                scope = ctx.scope(),
                "running hook"
            );
            if let Err(e) = catch_panic((hook.action)(ctx)).await {
                warn!(%phase, hook = %hook.name, scope = ctx.scope(), "hook failed: {}", e);
                failures.push(HookFailure {
                    phase,
                    name: hook.name.clone(),
                    order: hook.order,
                    error: e.to_string(),
                });
            }
        }

        failures
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }
}
