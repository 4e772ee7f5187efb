//! Capacity rules: `<regex> <capacity>` per line, first match wins.

use crate::BalancerError;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, warn};

/// Region capacity of a server as decided by the rule table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capacity {
    Limited(u32),
    Unbounded,
}

impl Capacity {
    pub fn is_matched(&self) -> bool {
        matches!(self, Capacity::Limited(_))
    }

    pub fn limit(&self) -> Option<u32> {
        match self {
            Capacity::Limited(n) => Some(*n),
            Capacity::Unbounded => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CapacityRule {
    pattern: Regex,
    source: String,
    capacity: u32,
}

impl CapacityRule {
    pub fn new(pattern: &str, capacity: u32) -> Result<Self, BalancerError> {
        // The whole short name has to match, not a substring of it.
        let anchored = Regex::new(&format!("^(?:{})$", pattern))
            .map_err(|e| BalancerError::Config(format!("invalid pattern '{}': {}", pattern, e)))?;
        Ok(Self {
            pattern: anchored,
            source: pattern.to_string(),
            capacity,
        })
    }

    /// Parse a single `<regex> <capacity>` line
    pub fn parse_line(line: &str) -> Result<Self, BalancerError> {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() != 2 {
            return Err(BalancerError::Config(format!(
                "expected '<pattern> <capacity>', got '{}'",
                line
            )));
        }
        let capacity: u32 = fields[1].parse().map_err(|_| {
            BalancerError::Config(format!(
                "capacity '{}' is not a non-negative integer",
                fields[1]
            ))
        })?;
        Self::new(fields[0], capacity)
    }

    pub fn pattern(&self) -> &str {
        &self.source
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn matches(&self, short_name: &str) -> bool {
        self.pattern.is_match(short_name)
    }
}

/// Ordered list of capacity rules
#[derive(Debug, Clone, Default)]
pub struct RuleTable {
    rules: Vec<CapacityRule>,
}

impl RuleTable {
    pub fn new(rules: Vec<CapacityRule>) -> Self {
        Self { rules }
    }

    /// Parse rules text. Malformed lines are skipped with a warning.
    pub fn parse(text: &str) -> Self {
        let mut rules = Vec::new();
        for (lineno, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            match CapacityRule::parse_line(line) {
                Ok(rule) => rules.push(rule),
                Err(e) => warn!(line = lineno + 1, error = %e, "skipping capacity rule"),
            }
        }
        Self { rules }
    }

    /// Read and parse a rules file
    pub fn read(path: &Path) -> Result<Self, BalancerError> {
        let text = std::fs::read_to_string(path)?;
        Ok(Self::parse(&text))
    }

    /// Load rules from a file. A missing or unreadable file yields an empty
    /// table, which leaves every server unbounded.
    pub fn load(path: &Path) -> Self {
        match Self::read(path) {
            Ok(table) => {
                debug!(path = %path.display(), rules = table.len(), "loaded capacity rules");
                table
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cannot read capacity rules, treating cluster as unbounded");
                Self::default()
            }
        }
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn rules(&self) -> &[CapacityRule] {
        &self.rules
    }

    /// Capacity of the first rule matching the short name, in declared order
    pub fn capacity_for(&self, short_name: &str) -> Capacity {
        self.rules
            .iter()
            .find(|rule| rule.matches(short_name))
            .map(|rule| Capacity::Limited(rule.capacity))
            .unwrap_or(Capacity::Unbounded)
    }
}

/// A rules file that is re-parsed only when its modification time changes
#[derive(Debug)]
pub struct RulesFile {
    path: PathBuf,
    last_modified: Option<SystemTime>,
    loaded: bool,
    table: RuleTable,
}

impl RulesFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            last_modified: None,
            loaded: false,
            table: RuleTable::default(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn table(&self) -> &RuleTable {
        &self.table
    }

    /// Re-read the file if it changed since the last load. Returns true when
    /// the table was rebuilt.
    pub fn refresh(&mut self) -> bool {
        let modified = std::fs::metadata(&self.path)
            .and_then(|meta| meta.modified())
            .ok();
        if self.loaded && modified == self.last_modified {
            return false;
        }
        self.table = RuleTable::load(&self.path);
        self.last_modified = modified;
        self.loaded = true;
        true
    }
}
