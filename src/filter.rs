//! Heuristic classifier separating real places from road and route names.
//!
//! Reverse geocoders happily answer "US 40" or "Purple Heart Trail" when a
//! track point sits on a highway. The filter is an ordered, versioned
//! [`RuleTable`]; rules are evaluated top to bottom and the first match
//! rejects:
//!
//! | Kind | Matches |
//! |------|---------|
//! | `numeric` | empty or whitespace-only, or digits with surrounding whitespace |
//! | `infrastructure_keyword` | the keyword as a whole word, case-insensitive |
//! | `route_code` | a regex, e.g. `^[A-Z]{1,3}[ -]?\d+` for "US 40", "FM 1573" |
//! | `denylist` | the trimmed name equals a listed name, case-insensitive |
//!
//! Anything surviving the rules is accepted if it has at least two
//! characters.
//!
//! This is a heuristic. Real places named like infrastructure ("Trail, BC")
//! are rejected, and non-places the rules do not anticipate get through.
//! Extend the table as data rather than adding special cases here.

use std::collections::HashSet;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, FilterError};

/// Route numbers: a short upper-case code, optional separator, digits.
pub const DEFAULT_ROUTE_PATTERN: &str = r"^[A-Z]{1,3}[ -]?\d+";

// ============================================================================
// Rule table
// ============================================================================

/// Kind of a rejection rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    Numeric,
    InfrastructureKeyword,
    RouteCode,
    Denylist,
}

/// One rejection rule.
///
/// `pattern` is the keyword, the regex, or the denied name depending on
/// `kind`; it is ignored for `numeric`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterRule {
    pub kind: RuleKind,
    #[serde(default)]
    pub pattern: String,
}

impl FilterRule {
    pub fn new(kind: RuleKind, pattern: impl Into<String>) -> Self {
        Self {
            kind,
            pattern: pattern.into(),
        }
    }
}

/// Versioned, ordered list of rejection rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleTable {
    pub version: u32,
    pub rules: Vec<FilterRule>,
}

impl RuleTable {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        ConfigError::read_json(path.as_ref())
    }
}

impl Default for RuleTable {
    /// Version 1: US road vocabulary and a handful of non-place names seen
    /// along the Southwest.
    fn default() -> Self {
        let mut rules = vec![FilterRule::new(RuleKind::Numeric, "")];
        rules.extend(
            INFRASTRUCTURE_KEYWORDS
                .iter()
                .map(|k| FilterRule::new(RuleKind::InfrastructureKeyword, *k)),
        );
        rules.push(FilterRule::new(RuleKind::RouteCode, DEFAULT_ROUTE_PATTERN));
        rules.extend(
            DENIED_NAMES
                .iter()
                .map(|n| FilterRule::new(RuleKind::Denylist, *n)),
        );
        Self { version: 1, rules }
    }
}

const INFRASTRUCTURE_KEYWORDS: &[&str] = &[
    "Highway",
    "Road",
    "Trail",
    "Expressway",
    "Frontage Road",
    "Division",
    "Interstate",
    "Turnpike",
    "Freeway",
];

/// Features and agencies a geocoder reports as the nearest "place".
const DENIED_NAMES: &[&str] = &[
    "Continental Divide",
    "Fort Defiance Agency",
    "Church Rock",
    "Chief Rancho",
    "Sand Barrens",
    "Sandia Haven",
    "Strawberry Spring",
    "Thompson Corner",
    "Rally Hill",
];

// ============================================================================
// Compiled filter
// ============================================================================

/// Outcome of classifying a name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Place,
    /// Rejected by the rule at `rule` (index into the table).
    Rejected { rule: usize, kind: RuleKind },
    /// Passed every rule but shorter than two characters.
    TooShort,
}

impl Verdict {
    pub fn is_place(&self) -> bool {
        matches!(self, Verdict::Place)
    }
}

#[derive(Debug, Clone)]
enum Matcher {
    Numeric,
    Regex(Regex),
    Exact(String),
}

impl Matcher {
    fn matches(&self, name: &str) -> bool {
        match self {
            Matcher::Numeric => {
                let trimmed = name.trim();
                trimmed.is_empty() || trimmed.chars().all(|c| c.is_ascii_digit())
            }
            Matcher::Regex(re) => re.is_match(name),
            Matcher::Exact(lowered) => name.trim().to_lowercase() == *lowered,
        }
    }
}

static DEFAULT_FILTER: LazyLock<PlaceFilter> = LazyLock::new(|| {
    PlaceFilter::new(RuleTable::default()).expect("built-in rule table compiles")
});

/// A compiled [`RuleTable`].
///
/// ```
/// use route_cities::PlaceFilter;
///
/// let filter = PlaceFilter::default();
/// assert!(filter.is_place("Santa Fe"));
/// assert!(!filter.is_place("US 40"));
/// ```
#[derive(Debug, Clone)]
pub struct PlaceFilter {
    version: u32,
    rules: Vec<(RuleKind, Matcher)>,
}

impl Default for PlaceFilter {
    fn default() -> Self {
        DEFAULT_FILTER.clone()
    }
}

impl PlaceFilter {
    pub fn new(table: RuleTable) -> Result<Self, FilterError> {
        let rules = table
            .rules
            .into_iter()
            .enumerate()
            .map(|(index, rule)| {
                let matcher = match rule.kind {
                    RuleKind::Numeric => Matcher::Numeric,
                    RuleKind::InfrastructureKeyword => {
                        let re = format!(r"(?i)\b{}\b", regex::escape(rule.pattern.trim()));
                        Matcher::Regex(
                            Regex::new(&re).map_err(|source| FilterError::Pattern { index, source })?,
                        )
                    }
                    RuleKind::RouteCode => Matcher::Regex(
                        Regex::new(&rule.pattern)
                            .map_err(|source| FilterError::Pattern { index, source })?,
                    ),
                    RuleKind::Denylist => Matcher::Exact(rule.pattern.trim().to_lowercase()),
                };
                Ok((rule.kind, matcher))
            })
            .collect::<Result<Vec<_>, FilterError>>()?;

        Ok(Self {
            version: table.version,
            rules,
        })
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn classify(&self, name: &str) -> Verdict {
        for (rule, (kind, matcher)) in self.rules.iter().enumerate() {
            if matcher.matches(name) {
                return Verdict::Rejected { rule, kind: *kind };
            }
        }
        if name.trim().chars().count() >= 2 {
            Verdict::Place
        } else {
            Verdict::TooShort
        }
    }

    pub fn is_place(&self, name: &str) -> bool {
        self.classify(name).is_place()
    }

    /// Keep accepted names, dropping repeats after the first occurrence.
    pub fn clean<I, S>(&self, names: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = HashSet::new();
        names
            .into_iter()
            .filter(|n| self.is_place(n.as_ref()))
            .filter_map(|n| {
                let n = n.as_ref();
                seen.insert(n.to_string()).then(|| n.to_string())
            })
            .collect()
    }
}
