//! Rule configuration
//!
//! Hosts usually keep module rules next to the rest of their settings. These
//! types deserialize the rule list from TOML or JSON:
//!
//! ```toml
//! [[rules]]
//! type = "Text"
//! include = ["**/*.txt", "/\\.md$/"]
//!
//! [[rules]]
//! type = "ESModule"
//! include = ["**/*.js"]
//! fallthrough = true
//! ```
//!
//! An `include` entry that starts and ends with `/` is a regex searched
//! anywhere in the resolved path. Every other entry is a glob. Write
//! `glob:/some/dir/` for a glob that would otherwise read as a regex.

use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::LinkError;
use crate::rules::{ModuleRule, ModuleRuleType, ModuleRules};

/// One configured rule, before patterns are compiled.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModuleRuleConfig {
    /// Content type name, e.g. "CommonJS"
    #[serde(rename = "type")]
    pub rule_type: String,

    /// Globs, regexes written as `/…/`, or `glob:`-prefixed globs
    #[serde(default)]
    pub include: Vec<String>,

    /// Keep later rules of the same type active
    #[serde(default)]
    pub fallthrough: bool,
}

impl ModuleRuleConfig {
    /// Compile into a [`ModuleRule`]. Unknown type names are rejected here.
    pub fn to_rule(&self) -> Result<ModuleRule, LinkError> {
        let rule_type = ModuleRuleType::from_str(&self.rule_type)?;
        Ok(ModuleRule::from_patterns(rule_type, &self.include)?.with_fallthrough(self.fallthrough))
    }
}

/// Rule list as it appears in a configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RulesConfig {
    /// Ordered rules; earlier rules win
    #[serde(default)]
    pub rules: Vec<ModuleRuleConfig>,

    /// Append the default ESModule/CommonJS rules
    #[serde(default = "default_true")]
    pub defaults: bool,
}

fn default_true() -> bool {
    true
}

impl RulesConfig {
    /// Load from a `.toml` or `.json` file.
    pub fn from_file(path: &Path) -> Result<Self, LinkError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| LinkError::Config(format!("{}: {}", path.display(), e)))?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(&content),
            Some("toml") => Self::from_toml_str(&content),
            _ => Err(LinkError::Config(format!(
                "Unsupported config file type: {}",
                path.display()
            ))),
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self, LinkError> {
        toml::from_str(content).map_err(|e| LinkError::Config(e.to_string()))
    }

    pub fn from_json_str(content: &str) -> Result<Self, LinkError> {
        serde_json::from_str(content).map_err(|e| LinkError::Config(e.to_string()))
    }

    /// Compile every rule and apply default-rule processing when enabled.
    pub fn build(&self) -> Result<ModuleRules, LinkError> {
        let rules = self
            .rules
            .iter()
            .map(ModuleRuleConfig::to_rule)
            .collect::<Result<Vec<_>, _>>()?;
        if self.defaults {
            ModuleRules::with_defaults(rules)
        } else {
            Ok(ModuleRules::new(rules))
        }
    }
}
