//! Module rules
//!
//! Classifies resolved paths into content types. Rules are evaluated in
//! order and the first rule with a matching pattern wins.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::error::LinkError;

/// Content type a rule assigns to matching paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModuleRuleType {
    ESModule,
    CommonJS,
    Text,
    Data,
    CompiledWasm,
}

impl ModuleRuleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModuleRuleType::ESModule => "ESModule",
            ModuleRuleType::CommonJS => "CommonJS",
            ModuleRuleType::Text => "Text",
            ModuleRuleType::Data => "Data",
            ModuleRuleType::CompiledWasm => "CompiledWasm",
        }
    }
}

impl fmt::Display for ModuleRuleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModuleRuleType {
    type Err = LinkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ESModule" => Ok(ModuleRuleType::ESModule),
            "CommonJS" => Ok(ModuleRuleType::CommonJS),
            "Text" => Ok(ModuleRuleType::Text),
            "Data" => Ok(ModuleRuleType::Data),
            "CompiledWasm" => Ok(ModuleRuleType::CompiledWasm),
            other => Err(LinkError::UnsupportedModuleType(other.to_string())),
        }
    }
}

/// Forces glob interpretation of a pattern that would otherwise be a regex.
pub const GLOB_PREFIX: &str = "glob:";

/// A single path pattern inside a rule's `include` list.
#[derive(Debug, Clone)]
pub enum RulePattern {
    /// Shell-style glob, e.g. `**/*.txt`
    Glob(glob::Pattern),
    /// Regular expression searched anywhere in the path
    Regex(regex::Regex),
}

impl RulePattern {
    /// Parse a configured pattern. `/…/` is a regex, anything else a glob.
    ///
    /// A pattern that starts and ends with `/` is always read as a regex.
    /// Prefix it with `glob:` to keep it a glob, e.g. `glob:/srv/app/`.
    pub fn parse(pattern: &str) -> Result<Self, LinkError> {
        if let Some(glob) = pattern.strip_prefix(GLOB_PREFIX) {
            return Self::glob(glob);
        }
        match pattern
            .strip_prefix('/')
            .and_then(|rest| rest.strip_suffix('/'))
        {
            Some(body) if !body.is_empty() => Self::regex(body),
            _ => Self::glob(pattern),
        }
    }

    pub fn regex(pattern: &str) -> Result<Self, LinkError> {
        regex::Regex::new(pattern)
            .map(RulePattern::Regex)
            .map_err(|e| LinkError::Config(format!("invalid regex /{}/: {}", pattern, e)))
    }

    pub fn glob(pattern: &str) -> Result<Self, LinkError> {
        glob::Pattern::new(pattern)
            .map(RulePattern::Glob)
            .map_err(|e| LinkError::Config(format!("invalid glob {:?}: {}", pattern, e)))
    }

    pub fn matches(&self, path: &Path) -> bool {
        match self {
            RulePattern::Glob(pattern) => pattern.matches_path(path),
            RulePattern::Regex(re) => re.is_match(&path.to_string_lossy()),
        }
    }
}

impl fmt::Display for RulePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RulePattern::Glob(pattern) => {
                let text = pattern.as_str();
                if text.len() > 2 && text.starts_with('/') && text.ends_with('/') {
                    write!(f, "{}{}", GLOB_PREFIX, text)
                } else {
                    write!(f, "{}", text)
                }
            }
            RulePattern::Regex(re) => write!(f, "/{}/", re.as_str()),
        }
    }
}

/// Maps a set of path patterns to a content type.
#[derive(Debug, Clone)]
pub struct ModuleRule {
    pub rule_type: ModuleRuleType,
    pub include: Vec<RulePattern>,
    /// Keep considering later rules of the same type
    pub fallthrough: bool,
}

impl ModuleRule {
    pub fn new(rule_type: ModuleRuleType, include: Vec<RulePattern>) -> Self {
        Self {
            rule_type,
            include,
            fallthrough: false,
        }
    }

    /// Build a rule from pattern strings (see [`RulePattern::parse`]).
    pub fn from_patterns<I, S>(rule_type: ModuleRuleType, patterns: I) -> Result<Self, LinkError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let include = patterns
            .into_iter()
            .map(|p| RulePattern::parse(p.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(rule_type, include))
    }

    pub fn with_fallthrough(mut self, fallthrough: bool) -> Self {
        self.fallthrough = fallthrough;
        self
    }

    pub fn matches(&self, path: &Path) -> bool {
        self.include.iter().any(|pattern| pattern.matches(path))
    }
}

/// Ordered, processed rule list.
#[derive(Debug, Clone, Default)]
pub struct ModuleRules {
    rules: Vec<ModuleRule>,
}

impl ModuleRules {
    /// Use exactly these rules, in this order.
    pub fn new(rules: Vec<ModuleRule>) -> Self {
        Self { rules }
    }

    /// Append the default rules after `rules`, then drop every rule whose type
    /// was already finalised by an earlier non-fallthrough rule.
    pub fn with_defaults(rules: Vec<ModuleRule>) -> Result<Self, LinkError> {
        let mut finalised: Vec<ModuleRuleType> = Vec::new();
        let mut processed = Vec::new();

        for rule in rules.into_iter().chain(default_rules()?) {
            if finalised.contains(&rule.rule_type) {
                log::warn!(
                    "Ignoring {} rule {:?}: an earlier {} rule has no fallthrough",
                    rule.rule_type,
                    rule.include.iter().map(|p| p.to_string()).collect::<Vec<_>>(),
                    rule.rule_type,
                );
                continue;
            }
            if !rule.fallthrough {
                finalised.push(rule.rule_type);
            }
            processed.push(rule);
        }

        Ok(Self { rules: processed })
    }

    /// First rule matching `path`.
    pub fn matching_rule(&self, path: &Path) -> Option<&ModuleRule> {
        self.rules.iter().find(|rule| rule.matches(path))
    }

    pub fn iter(&self) -> impl Iterator<Item = &ModuleRule> {
        self.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

fn default_rules() -> Result<Vec<ModuleRule>, LinkError> {
    Ok(vec![
        ModuleRule::from_patterns(ModuleRuleType::ESModule, ["**/*.mjs"])?,
        ModuleRule::from_patterns(ModuleRuleType::CommonJS, ["**/*.js", "**/*.cjs"])?,
    ])
}
