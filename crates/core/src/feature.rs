//! Feature files: the Gherkin subset stepwright understands
//!
//! ```text
//! @search
//! Feature: Site search
//!   Background:
//!     Given I am on the Northumbria NHS website
//!
//!   @smoke
//!   Scenario: Search for a known term
//!     When I enter "flu jab" in the search field
//!     And I click the search button
//!     Then I should see search results related to "flu"
//! ```
//!
//! `And`/`But` take the keyword of the step before them. Background steps
//! are prepended to every scenario of the feature.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{Error, Result};

/// Step keyword after `And`/`But` have been resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Keyword {
    Given,
    When,
    Then,
}

impl Keyword {
    pub fn as_str(&self) -> &'static str {
        match self {
            Keyword::Given => "Given",
            Keyword::When => "When",
            Keyword::Then => "Then",
        }
    }
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Keyword {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Given" => Ok(Keyword::Given),
            "When" => Ok(Keyword::When),
            "Then" => Ok(Keyword::Then),
            other => Err(Error::Config(format!("unknown step keyword: {}", other))),
        }
    }
}

/// One line of a scenario
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub keyword: Keyword,
    pub text: String,
    /// 1-based line in the source file
    pub line: usize,
}

impl Step {
    pub fn new(keyword: Keyword, text: impl Into<String>) -> Self {
        Self {
            keyword,
            text: text.into(),
            line: 0,
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.keyword, self.text)
    }
}

/// An ordered sequence of steps representing one test case
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    /// `<feature-file-stem>:<line>`
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub feature: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub steps: Vec<Step>,
}

impl Scenario {
    pub fn new(id: impl Into<String>, steps: Vec<Step>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            feature: String::new(),
            tags: Vec::new(),
            steps,
        }
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        let tag = tag.trim_start_matches('@');
        self.tags.iter().any(|t| t == tag)
    }
}

/// A parsed `.feature` file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feature {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub path: PathBuf,
    pub scenarios: Vec<Scenario>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Block {
    Preamble,
    FeatureHeader,
    Background,
    Scenario,
}

impl Feature {
    /// Parse feature source. `path` is used for scenario ids and error messages.
    pub fn parse(source: &str, path: &Path) -> Result<Self> {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "feature".to_string());
        let err = |line: usize, reason: String| Error::FeatureParse {
            path: path.to_path_buf(),
            line,
            reason,
        };

        let mut name: Option<String> = None;
        let mut description: Vec<String> = Vec::new();
        let mut feature_tags: Vec<String> = Vec::new();
        let mut pending_tags: Vec<String> = Vec::new();
        let mut background: Vec<Step> = Vec::new();
        let mut scenarios: Vec<Scenario> = Vec::new();
        let mut block = Block::Preamble;
        let mut previous: Option<Keyword> = None;

        let source = source.strip_prefix('\u{feff}').unwrap_or(source);

        for (index, raw) in source.lines().enumerate() {
            let line_no = index + 1;
            let line = raw.trim();

            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if line.starts_with('@') {
                pending_tags.extend(
                    line.split_whitespace()
                        .map(|t| t.trim_start_matches('@').to_string())
                        .filter(|t| !t.is_empty()),
                );
                continue;
            }

            if let Some(rest) = line.strip_prefix("Feature:") {
                if name.is_some() {
                    return Err(err(line_no, "only one Feature per file".to_string()));
                }
                name = Some(rest.trim().to_string());
                feature_tags = std::mem::take(&mut pending_tags);
                block = Block::FeatureHeader;
                continue;
            }

            if line.starts_with("Scenario Outline:")
                || line.starts_with("Scenario Template:")
                || line.starts_with("Examples:")
                || line.starts_with("Rule:")
            {
                return Err(err(line_no, format!("unsupported construct: {}", line)));
            }

            if name.is_none() {
                return Err(err(line_no, "expected 'Feature:' header".to_string()));
            }

            if line.starts_with("Background:") {
                if !scenarios.is_empty() || block == Block::Background {
                    return Err(err(
                        line_no,
                        "Background must come once, before the first Scenario".to_string(),
                    ));
                }
                block = Block::Background;
                previous = None;
                continue;
            }

            if let Some(rest) = line
                .strip_prefix("Scenario:")
                .or_else(|| line.strip_prefix("Example:"))
            {
                let mut tags = feature_tags.clone();
                for tag in pending_tags.drain(..) {
                    if !tags.contains(&tag) {
                        tags.push(tag);
                    }
                }
                scenarios.push(Scenario {
                    id: format!("{}:{}", stem, line_no),
                    name: rest.trim().to_string(),
                    feature: name.clone().unwrap_or_default(),
                    tags,
                    steps: Vec::new(),
                });
                block = Block::Scenario;
                previous = None;
                continue;
            }

            if let Some((word, text)) = split_step(line) {
                let keyword = match word {
                    "Given" => Keyword::Given,
                    "When" => Keyword::When,
                    "Then" => Keyword::Then,
                    _ => previous.ok_or_else(|| {
                        err(line_no, format!("'{}' has no preceding step", word))
                    })?,
                };
                let step = Step {
                    keyword,
                    text: text.to_string(),
                    line: line_no,
                };
                match block {
                    Block::Background => background.push(step),
                    Block::Scenario => {
                        if let Some(scenario) = scenarios.last_mut() {
                            scenario.steps.push(step);
                        }
                    }
                    _ => {
                        return Err(err(line_no, "step outside of a Scenario".to_string()));
                    }
                }
                previous = Some(keyword);
                continue;
            }

            // Free text is a description, allowed until the block's first step
            match block {
                Block::FeatureHeader => description.push(line.to_string()),
                Block::Scenario | Block::Background if previous.is_none() => {}
                _ => return Err(err(line_no, format!("unrecognized line: {}", line))),
            }
        }

        let name = name.ok_or_else(|| err(1, "missing 'Feature:' header".to_string()))?;

        if !background.is_empty() {
            for scenario in &mut scenarios {
                let mut steps = background.clone();
                steps.append(&mut scenario.steps);
                scenario.steps = steps;
            }
        }

        Ok(Feature {
            name,
            description: description.join("\n"),
            tags: feature_tags,
            path: path.to_path_buf(),
            scenarios,
        })
    }

    /// Parse a feature from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content, path)
    }

    /// Load all `.feature` files under a directory, sorted by path
    pub fn load_all(dir: &Path) -> Result<Vec<Self>> {
        if !dir.is_dir() {
            return Err(Error::Config(format!(
                "Features directory not found: {}",
                dir.display()
            )));
        }

        let mut paths: Vec<PathBuf> = Vec::new();
        for entry in walkdir::WalkDir::new(dir) {
            let entry = entry.map_err(std::io::Error::from)?;
            let is_feature = entry
                .path()
                .extension()
                .map(|ext| ext == "feature")
                .unwrap_or(false);
            if is_feature && entry.file_type().is_file() {
                paths.push(entry.into_path());
            }
        }
        paths.sort();

        paths.iter().map(|p| Self::from_file(p)).collect()
    }

    /// All scenarios of the given features, in file order
    pub fn scenarios(features: &[Self]) -> Vec<Scenario> {
        features
            .iter()
            .flat_map(|f| f.scenarios.iter().cloned())
            .collect()
    }

    /// Scenarios carrying a tag
    pub fn filter_by_tag<'a>(scenarios: &'a [Scenario], tag: &str) -> Vec<&'a Scenario> {
        scenarios.iter().filter(|s| s.has_tag(tag)).collect()
    }
}

fn split_step(line: &str) -> Option<(&str, &str)> {
    for word in ["Given", "When", "Then", "And", "But"] {
        if let Some(rest) = line.strip_prefix(word) {
            if rest.starts_with(char::is_whitespace) {
                return Some((word, rest.trim()));
            }
        }
    }
    None
}
