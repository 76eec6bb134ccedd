//! Stepwright CLI
//!
//! Command-line runner for `.feature` files, bundling the site search
//! step library and its page object.

pub mod output;
pub mod pages;
pub mod steps;

use stepwright_core::{Feature, RunReport, Scenario};

/// Process exit status for a finished run: 0 all passed, 1 any scenario
/// failed or errored, 2 the run was aborted
pub fn exit_code(report: &RunReport) -> i32 {
    if report.fatal_error.is_some() {
        2
    } else if report.success() {
        0
    } else {
        1
    }
}

/// Narrow `scenarios` to those carrying `tag` and named `name`; either
/// filter is skipped when absent
pub fn select_scenarios(
    scenarios: &[Scenario],
    tag: Option<&str>,
    name: Option<&str>,
) -> Vec<Scenario> {
    let tagged: Vec<&Scenario> = match tag {
        Some(tag) => Feature::filter_by_tag(scenarios, tag),
        None => scenarios.iter().collect(),
    };
    tagged
        .into_iter()
        .filter(|s| name.map_or(true, |n| s.name == n))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use stepwright_core::{Keyword, Step};

    fn scenario(id: &str, name: &str, tags: &[&str]) -> Scenario {
        let mut scenario = Scenario::new(id, vec![Step::new(Keyword::Given, "x")]);
        scenario.name = name.to_string();
        scenario.tags = tags.iter().map(|t| t.to_string()).collect();
        scenario
    }

    #[test]
    fn test_select_applies_tag_and_name() {
        let scenarios = vec![
            scenario("search:5", "Search for a known term", &["smoke"]),
            scenario("search:11", "Empty search", &[]),
            scenario("search:17", "Search for a known term", &[]),
        ];

        let both = select_scenarios(&scenarios, Some("@smoke"), Some("Search for a known term"));
        assert_eq!(both.len(), 1);
        assert_eq!(both[0].id, "search:5");

        assert!(select_scenarios(&scenarios, Some("smoke"), Some("Empty search")).is_empty());
        assert_eq!(select_scenarios(&scenarios, None, Some("Search for a known term")).len(), 2);
        assert_eq!(select_scenarios(&scenarios, None, None).len(), 3);
    }

    #[test]
    fn test_exit_codes() {
        let mut report = RunReport::default();
        assert_eq!(exit_code(&report), 0);

        report.failed = 1;
        assert_eq!(exit_code(&report), 1);

        report.failed = 0;
        report.errored = 1;
        assert_eq!(exit_code(&report), 1);

        report.fatal_error = Some("Browser error: launch failed".to_string());
        assert_eq!(exit_code(&report), 2);
    }
}
