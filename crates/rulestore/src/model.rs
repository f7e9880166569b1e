//! In-memory policy model the adapter loads into and saves from
//!
//! Rules are grouped by section (`p` permissions, `g` role relations), then
//! by rule type (`p`, `p2`, `g`, `g2`, ...). Each rule type keeps its tuples
//! in insertion order.

use std::collections::BTreeMap;
use std::fmt;

use rulestore_common::error::{PolicyError, Result};

/// Policy section a rule type belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Section {
    /// Permission rules (`p`, `p2`, ...)
    Policy,
    /// Role and group relations (`g`, `g2`, ...)
    Grouping,
}

impl Section {
    /// Every section, in save order
    pub const ALL: [Section; 2] = [Section::Policy, Section::Grouping];

    /// Section key as used by policy engines
    pub fn as_str(self) -> &'static str {
        match self {
            Section::Policy => "p",
            Section::Grouping => "g",
        }
    }

    /// Parse a section key
    pub fn parse(sec: &str) -> Result<Self> {
        match sec {
            "p" => Ok(Section::Policy),
            "g" => Ok(Section::Grouping),
            other => Err(PolicyError::UnknownSection(other.to_string()).into()),
        }
    }

    /// Section a rule type belongs to, from its first character
    pub fn of_rule_type(ptype: &str) -> Result<Self> {
        match ptype.chars().next() {
            Some('p') => Ok(Section::Policy),
            Some('g') => Ok(Section::Grouping),
            _ => Err(PolicyError::UnknownSection(ptype.to_string()).into()),
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rules keyed by section, then rule type
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicyModel {
    sections: BTreeMap<Section, BTreeMap<String, Vec<Vec<String>>>>,
}

impl PolicyModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a tuple under `sec`/`ptype`, creating the bucket when absent
    pub fn add_policy(&mut self, sec: Section, ptype: &str, rule: Vec<String>) {
        self.sections
            .entry(sec)
            .or_default()
            .entry(ptype.to_string())
            .or_default()
            .push(rule);
    }

    /// Tuples stored under `sec`/`ptype`; empty when the bucket is absent
    pub fn get_policy(&self, sec: Section, ptype: &str) -> &[Vec<String>] {
        self.sections
            .get(&sec)
            .and_then(|types| types.get(ptype))
            .map_or(&[][..], Vec::as_slice)
    }

    /// True when `sec`/`ptype` holds exactly `rule`
    pub fn has_policy(&self, sec: Section, ptype: &str, rule: &[String]) -> bool {
        self.get_policy(sec, ptype).iter().any(|r| r == rule)
    }

    /// Rule types present in a section, sorted
    pub fn rule_types(&self, sec: Section) -> impl Iterator<Item = &str> {
        self.sections
            .get(&sec)
            .into_iter()
            .flat_map(|types| types.keys().map(String::as_str))
    }

    /// Drop every tuple
    pub fn clear_policy(&mut self) {
        self.sections.clear();
    }

    /// Append one loaded rule, deriving its section from the rule type
    pub fn load_policy_line(&mut self, ptype: &str, rule: Vec<String>) -> Result<()> {
        let sec = Section::of_rule_type(ptype)?;
        self.add_policy(sec, ptype, rule);
        Ok(())
    }

    /// Total number of tuples across all sections
    pub fn len(&self) -> usize {
        self.sections
            .values()
            .flat_map(BTreeMap::values)
            .map(Vec::len)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
