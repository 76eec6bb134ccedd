//! Output formatting for CLI

use clap::ValueEnum;
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Cell, Color, ContentArrangement, Table};
use serde::Serialize;
use stepwright_core::registry::StepDefinition;
use stepwright_core::{Keyword, RunReport, Scenario, ScenarioReport, ScenarioStatus, StepResult};

/// Output format
#[derive(Debug, Clone, Copy, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable table format
    #[default]
    Table,
    /// JSON format
    Json,
    /// Plain text format
    Plain,
}

/// Trait for items that can be displayed in a table
pub trait TableDisplay {
    fn headers() -> Vec<&'static str>;
    fn row(&self) -> Vec<String>;
}

impl TableDisplay for Scenario {
    fn headers() -> Vec<&'static str> {
        vec!["ID", "Scenario", "Tags", "Steps"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.id.clone(),
            self.name.clone(),
            self.tags
                .iter()
                .map(|t| format!("@{}", t))
                .collect::<Vec<_>>()
                .join(" "),
            self.steps.len().to_string(),
        ]
    }
}

/// Serializable view of a registered step
#[derive(Debug, Serialize)]
pub struct StepDefinitionRow {
    pub keyword: Keyword,
    pub pattern: String,
}

impl From<&StepDefinition> for StepDefinitionRow {
    fn from(definition: &StepDefinition) -> Self {
        Self {
            keyword: definition.keyword(),
            pattern: definition.pattern().to_string(),
        }
    }
}

impl TableDisplay for StepDefinitionRow {
    fn headers() -> Vec<&'static str> {
        vec!["Keyword", "Pattern"]
    }

    fn row(&self) -> Vec<String> {
        vec![self.keyword.to_string(), self.pattern.clone()]
    }
}

/// Step tally shown in the report table, e.g. `3/4`
fn step_summary(scenario: &ScenarioReport) -> String {
    let passed = scenario
        .steps
        .iter()
        .filter(|s| s.result == StepResult::Passed)
        .count();
    format!("{}/{}", passed, scenario.steps.len())
}

fn status_color(status: ScenarioStatus) -> Color {
    match status {
        ScenarioStatus::Passed => Color::Green,
        ScenarioStatus::Failed => Color::Red,
        ScenarioStatus::Error => Color::Magenta,
        ScenarioStatus::Pending | ScenarioStatus::Running => Color::Yellow,
    }
}

/// Print a list of items
pub fn print_list<T: Serialize + TableDisplay>(items: &[T], format: OutputFormat) {
    if items.is_empty() {
        println!("No items found.");
        return;
    }

    match format {
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic);

            table.set_header(T::headers());
            for item in items {
                table.add_row(item.row());
            }

            println!("{table}");
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(items).unwrap_or_default());
        }
        OutputFormat::Plain => {
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    println!("---");
                }
                let row = item.row();
                for (header, value) in T::headers().iter().zip(row.iter()) {
                    println!("{}: {}", header, value);
                }
            }
        }
    }
}

/// Print a run report
pub fn print_report(report: &RunReport, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(report).unwrap_or_default());
            return;
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic);
            table.set_header(vec!["ID", "Scenario", "Status", "Steps", "Duration"]);
            for scenario in &report.scenarios {
                table.add_row(vec![
                    Cell::new(&scenario.id),
                    Cell::new(&scenario.name),
                    Cell::new(scenario.status).fg(status_color(scenario.status)),
                    Cell::new(step_summary(scenario)),
                    Cell::new(format!("{} ms", scenario.duration_ms)),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Plain => {
            for scenario in &report.scenarios {
                println!(
                    "{} {} [{}] {}",
                    scenario.id,
                    scenario.name,
                    scenario.status,
                    step_summary(scenario)
                );
            }
        }
    }

    for scenario in &report.scenarios {
        print_failure_detail(scenario);
    }
    for failure in report.before_run_failures.iter().skip(1) {
        print_warning(&failure.to_string());
    }
    for failure in &report.after_run_failures {
        print_warning(&failure.to_string());
    }

    println!();
    let summary = format!(
        "{} scenario(s): {} passed, {} failed, {} errored, {} pending ({} ms)",
        report.total(),
        report.passed,
        report.failed,
        report.errored,
        report.pending,
        report.duration_ms
    );
    if let Some(fatal) = &report.fatal_error {
        print_error(&format!("Run aborted: {}", fatal));
        println!("{}", summary.red());
    } else if report.success() {
        print_success(&summary.green().to_string());
    } else {
        println!("{}", summary.red());
    }
}

fn print_failure_detail(scenario: &ScenarioReport) {
    if !matches!(scenario.status, ScenarioStatus::Failed | ScenarioStatus::Error) {
        return;
    }

    println!();
    println!("{} {}", scenario.id.bold(), scenario.name);
    for failure in &scenario.hook_failures {
        println!("  {} {}", "hook".magenta(), failure);
    }
    if let Some(step) = scenario.failing_step() {
        println!(
            "  {} {} (line {})",
            "step".red(),
            step.step,
            step.step.line
        );
        if let Some(error) = &step.error {
            println!("       {}", error);
        }
    } else if let Some(error) = &scenario.error {
        println!("  {}", error);
    }
}

/// Print success message
pub fn print_success(message: &str) {
    println!("✅ {}", message);
}

/// Print error message
pub fn print_error(message: &str) {
    eprintln!("❌ {}", message);
}

/// Print warning message
pub fn print_warning(message: &str) {
    println!("⚠️  {}", message);
}

/// Print info message
pub fn print_info(message: &str) {
    println!("ℹ️  {}", message);
}

#[cfg(test)]
mod tests {
    use super::*;
    use stepwright_core::{Step, StepOutcome};

    #[test]
    fn test_scenario_row_shows_tags() {
        let mut scenario = Scenario::new("search:11", vec![Step::new(Keyword::Given, "a")]);
        scenario.name = "Search for flu jab".to_string();
        scenario.tags = vec!["search".to_string(), "smoke".to_string()];

        assert_eq!(
            scenario.row(),
            vec!["search:11", "Search for flu jab", "@search @smoke", "1"]
        );
    }

    #[test]
    fn test_step_summary_counts_passed() {
        let scenario = Scenario::new("s:1", Vec::new());
        let mut report = ScenarioReport::pending(&scenario);
        for (text, result) in [
            ("a", StepResult::Passed),
            ("b", StepResult::Failed),
            ("c", StepResult::Skipped),
        ] {
            report.steps.push(StepOutcome {
                step: Step::new(Keyword::When, text),
                result,
                error: None,
                duration_ms: 0,
            });
        }
        assert_eq!(step_summary(&report), "1/3");
    }
}
