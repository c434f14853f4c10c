//! Column requirements declared by metrics.

use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};

/// A required column and the units it is expected in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnRequirement {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub units: Option<String>,
}

/// Ordered set of unique column names a metric reads.
///
/// Fixed when the metric is built. The loader queries it before fetching
/// any data.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSet {
    columns: Vec<ColumnRequirement>,
}

impl ColumnSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a column. `option` names the configuration key that supplied it
    /// and is only used for error reporting. Duplicates are ignored.
    pub fn require(mut self, option: &str, name: &str) -> Result<Self> {
        self.push(option, name, None)?;
        Ok(self)
    }

    /// Add a column together with its expected units.
    pub fn require_with_units(mut self, option: &str, name: &str, units: &str) -> Result<Self> {
        self.push(option, name, Some(units))?;
        Ok(self)
    }

    fn push(&mut self, option: &str, name: &str, units: Option<&str>) -> Result<()> {
        if name.trim().is_empty() {
            return Err(ConfigError::EmptyColumn {
                option: option.to_string(),
            }
            .into());
        }
        if !self.contains(name) {
            self.columns.push(ColumnRequirement {
                name: name.to_string(),
                units: units.map(str::to_string),
            });
        }
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    /// Column names in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    pub fn requirements(&self) -> &[ColumnRequirement] {
        &self.columns
    }

    pub fn units_of(&self, name: &str) -> Option<&str> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .and_then(|c| c.units.as_deref())
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}
