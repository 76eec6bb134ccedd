//! Stepwright BDD orchestration engine
//!
//! This crate runs Gherkin-style scenarios against a browser:
//! - Resolves step text to registered handlers (regex patterns, ambiguity is an error)
//! - Schedules lifecycle hooks per run and per scenario with failure isolation
//! - Owns one browser session per run and one page per scenario
//! - Executes scenarios fail-fast and aggregates a run report
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Runner                                                     │
//! │    ├── BeforeRun hooks            (fatal on failure)        │
//! │    ├── SessionManager::initialize (fatal on failure)        │
//! │    ├── for each Scenario:                                   │
//! │    │     StepExecutor::execute                              │
//! │    │       ├── acquire page + BeforeScenario hooks          │
//! │    │       ├── StepRegistry::resolve → handler(ctx, args)   │
//! │    │       └── AfterScenario hooks + release page           │
//! │    ├── AfterRun hooks             (isolated)                │
//! │    └── SessionManager::teardown                             │
//! ├─────────────────────────────────────────────────────────────┤
//! │  BrowserAutomation (trait)                                  │
//! │    ├── PlaywrightDriver  node bridge, JSON lines            │
//! │    └── MockBrowser       in-memory, scripted                │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod automation;
pub mod config;
pub mod context;
pub mod error;
pub mod executor;
pub mod feature;
pub mod hooks;
pub mod mock;
pub mod playwright;
pub mod registry;
pub mod runner;
pub mod session;

pub use automation::{BrowserAutomation, BrowserEngine, Page, WaitOutcome};
pub use config::RunConfig;
pub use context::{ScenarioContext, CONFIG_KEY, PAGE_KEY};
pub use error::{ensure, Error, Result};
pub use executor::{ScenarioReport, ScenarioStatus, StepExecutor, StepOutcome, StepResult};
pub use feature::{Feature, Keyword, Scenario, Step};
pub use hooks::{HookFailure, HookPhase, HookScheduler};
pub use mock::MockBrowser;
pub use playwright::PlaywrightDriver;
pub use registry::{StepFuture, StepRegistry};
pub use runner::{RunReport, Runner};
pub use session::{SessionConfig, SessionManager};
