//! Replay scenarios
//!
//! A scenario is a TOML file with the item catalogue and a list of steps:
//!
//! ```toml
//! [[items]]
//! id = "inbox"
//! title = "Inbox"
//!
//! [[items]]
//! id = "drafts"
//! fail = true
//!
//! [[steps]]
//! order = ["inbox"]
//!
//! [[steps]]
//! wait_ms = 20
//!
//! [[steps]]
//! move = { from = 0, to = 1 }
//! ```

use crate::error::{ReplayError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// One entry of the remote catalogue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioItem {
    /// Item id
    pub id: String,

    /// Display payload; the id is used when absent
    #[serde(default)]
    pub title: Option<String>,

    /// Every single fetch of this item fails
    #[serde(default)]
    pub fail: bool,

    /// Artificial latency of a single fetch
    #[serde(default)]
    pub delay_ms: u64,
}

impl ScenarioItem {
    /// The payload handed to the reconciler
    pub fn title(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.id)
    }
}

/// A single scenario step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    /// Push a canonical order
    Order(Vec<String>),
    /// Remove one id locally
    Remove(String),
    /// Insert an item with a known payload
    Insert {
        index: usize,
        id: String,
        title: String,
    },
    /// Drag-and-drop move
    Move { from: usize, to: usize },
    /// Reload the canonical order in bulk (ignored when false)
    Reload(bool),
    /// Pause before sending the next step
    WaitMs(u64),
}

/// A parsed replay scenario
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    /// The remote side refuses every local reorder
    #[serde(default)]
    pub reject_reorders: bool,

    /// Remote catalogue
    #[serde(default)]
    pub items: Vec<ScenarioItem>,

    /// Steps, sent in order
    #[serde(default)]
    pub steps: Vec<Step>,
}

impl Scenario {
    /// Parse and validate a scenario from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        let scenario: Self =
            toml::from_str(content).map_err(|e| ReplayError::Scenario(e.to_string()))?;
        scenario.validate()?;
        Ok(scenario)
    }

    /// Load a scenario file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
            .map_err(|e| ReplayError::Scenario(format!("{}: {}", path.display(), e)))
    }

    /// Number of canonical order pushes
    pub fn order_count(&self) -> usize {
        self.steps
            .iter()
            .filter(|step| matches!(step, Step::Order(_)))
            .count()
    }

    fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for item in &self.items {
            if !seen.insert(item.id.as_str()) {
                return Err(ReplayError::Scenario(format!(
                    "item '{}' listed twice",
                    item.id
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SAMPLE: &str = r#"
        reject_reorders = true

        [[items]]
        id = "a"
        title = "Alpha"

        [[items]]
        id = "b"
        fail = true
        delay_ms = 5

        [[steps]]
        order = ["a", "b"]

        [[steps]]
        wait_ms = 10

        [[steps]]
        remove = "a"

        [[steps]]
        insert = { index = 0, id = "z", title = "Zed" }

        [[steps]]
        move = { from = 0, to = 1 }

        [[steps]]
        reload = true
    "#;

    #[test]
    fn test_parse_sample() {
        let scenario = Scenario::from_toml(SAMPLE).unwrap();

        assert!(scenario.reject_reorders);
        assert_eq!(scenario.items.len(), 2);
        assert_eq!(scenario.items[0].title(), "Alpha");
        assert_eq!(scenario.items[1].title(), "b");
        assert!(scenario.items[1].fail);
        assert_eq!(scenario.items[1].delay_ms, 5);

        assert_eq!(
            scenario.steps,
            vec![
                Step::Order(vec!["a".to_string(), "b".to_string()]),
                Step::WaitMs(10),
                Step::Remove("a".to_string()),
                Step::Insert {
                    index: 0,
                    id: "z".to_string(),
                    title: "Zed".to_string(),
                },
                Step::Move { from: 0, to: 1 },
                Step::Reload(true),
            ]
        );
        assert_eq!(scenario.order_count(), 1);
    }

    #[test]
    fn test_empty_scenario() {
        let scenario = Scenario::from_toml("").unwrap();
        assert_eq!(scenario, Scenario::default());
    }

    #[test]
    fn test_duplicate_item_rejected() {
        let result = Scenario::from_toml(
            r#"
            [[items]]
            id = "a"

            [[items]]
            id = "a"
            "#,
        );
        assert!(matches!(result, Err(ReplayError::Scenario(_))));
    }

    #[test]
    fn test_unknown_step_rejected() {
        let result = Scenario::from_toml("[[steps]]\nshuffle = true\n");
        assert!(matches!(result, Err(ReplayError::Scenario(_))));
    }
}
