//! Course groups and the group registry.
//!
//! A course group names a set of courses and carries degree-program
//! requirements over them: distribution minima, concentration areas,
//! capstone gates, soft-order precedences, per-year caps, honors
//! restrictions and level bands.
//!
//! The on-disk `.grp` format encodes several group *kinds* in one record
//! through name prefixes and signed count/credit expressions. The loader
//! classifies each record into a tagged [`GroupKind`] and parses the
//! overloaded expressions into [`CountRule`] / [`CreditRule`], so the rest
//! of the crate never re-interprets sentinels.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{PlanError, Result};

/// Parsed course-count requirement of a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CountRule {
    /// `N`: at least N courses from the group (0 means no requirement).
    AtLeast(u32),
    /// `=N`: exactly N of the remaining-to-take courses; already-passed
    /// members decrement N, floored at 0.
    Exactly(u32),
    /// `<=N`: at most N members may share the same term.
    PerTermMax(u32),
    /// `-N`: at most N members net of already-passed ones; no constraint
    /// once the decremented bound reaches 0.
    AtMostNetOfPassed(u32),
}

impl CountRule {
    fn parse(expr: &str) -> std::result::Result<Self, String> {
        let expr = expr.trim();
        if let Some(rest) = expr.strip_prefix("<=") {
            parse_u32(rest).map(CountRule::PerTermMax)
        } else if let Some(rest) = expr.strip_prefix('=') {
            parse_u32(rest).map(CountRule::Exactly)
        } else if let Some(rest) = expr.strip_prefix('-') {
            parse_u32(rest).map(CountRule::AtMostNetOfPassed)
        } else {
            parse_u32(expr).map(CountRule::AtLeast)
        }
    }
}

/// Parsed credit requirement of a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CreditRule {
    /// At least this many credits from the group (0 means no requirement).
    AtLeast(u32),
    /// Negative source value: minimum number of distinct disciplines.
    /// Declared by the format but not enforced by any emitted constraint.
    MinDisciplines(u32),
}

impl CreditRule {
    fn parse(expr: &str) -> std::result::Result<Self, String> {
        let expr = expr.trim();
        if let Some(rest) = expr.strip_prefix('-') {
            parse_u32(rest).map(CreditRule::MinDisciplines)
        } else {
            parse_u32(expr).map(CreditRule::AtLeast)
        }
    }
}

/// Group kind, derived from the group name and concentration flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GroupKind {
    /// Plain distribution requirement.
    Distribution,
    /// Member of a concentration area; enforced only for students who
    /// chose that concentration.
    Concentration,
    /// `capstone*`: single-member group gating the capstone course on
    /// accumulated credits and concentration courses.
    Capstone,
    /// `softorder*`: ordered pair with an optional maximum term distance.
    SoftOrder,
    /// `OU*`: per-academic-year cap on courses from the member list.
    OuAnnual,
    /// `HonorGroup`: members are off-limits to non-honors students.
    Honors,
    /// `L4`, `L5`, `L6` or `L5-*`: level band feeding prerequisite-count
    /// gates.
    LevelBand,
}

/// A named course group with its parsed requirements.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseGroup {
    /// Unique group name; prefixes select special kinds.
    pub name: String,
    /// Whether the group belongs to a concentration area.
    pub is_concentration_area: bool,
    /// Member course codes. Order matters only for soft-order groups.
    pub members: Vec<String>,
    /// Course-count requirement.
    pub count: CountRule,
    /// Credit requirement.
    pub credits: CreditRule,
}

impl CourseGroup {
    /// Creates a plain group with no requirements.
    pub fn new(name: impl Into<String>, members: Vec<String>) -> Self {
        Self {
            name: name.into(),
            is_concentration_area: false,
            members,
            count: CountRule::AtLeast(0),
            credits: CreditRule::AtLeast(0),
        }
    }

    /// Marks the group as part of a concentration area.
    pub fn concentration(mut self) -> Self {
        self.is_concentration_area = true;
        self
    }

    /// Sets the count rule.
    pub fn with_count(mut self, count: CountRule) -> Self {
        self.count = count;
        self
    }

    /// Sets the credit rule.
    pub fn with_credits(mut self, credits: CreditRule) -> Self {
        self.credits = credits;
        self
    }

    /// The kind this group's name and flags select.
    pub fn kind(&self) -> GroupKind {
        if self.name == "HonorGroup" {
            GroupKind::Honors
        } else if self.name.starts_with("capstone") {
            GroupKind::Capstone
        } else if self.name.starts_with("softorder") {
            GroupKind::SoftOrder
        } else if self.name.starts_with("OU") {
            GroupKind::OuAnnual
        } else if self.name == "L4"
            || self.name == "L5"
            || self.name == "L6"
            || self.name.starts_with("L5-")
        {
            GroupKind::LevelBand
        } else if self.is_concentration_area {
            GroupKind::Concentration
        } else {
            GroupKind::Distribution
        }
    }

    /// Minimum distinct disciplines, when the credit rule declares one.
    pub fn min_disciplines(&self) -> Option<u32> {
        match self.credits {
            CreditRule::MinDisciplines(n) if n > 0 => Some(n),
            _ => None,
        }
    }

    /// Parses a `.grp` file: line 1 is
    /// `name;is_concentration;countExpr;creditsExpr`, line 2 the
    /// semicolon-separated member codes; later lines are `#` comments.
    pub fn parse(text: &str, source: &str) -> Result<Self> {
        let mut lines = text.lines();
        let header = lines
            .next()
            .ok_or_else(|| PlanError::parse(source, "empty group file"))?;
        let fields: Vec<&str> = header.split(';').collect();
        if fields.len() < 4 {
            return Err(PlanError::parse(
                format!("{source}:1"),
                format!("expected 4 header fields, got {}", fields.len()),
            ));
        }
        let name = fields[0].trim();
        if name.is_empty() {
            return Err(PlanError::parse(format!("{source}:1"), "empty group name"));
        }
        let is_concentration = fields[1].trim().eq_ignore_ascii_case("true");
        let count = CountRule::parse(fields[2])
            .map_err(|msg| PlanError::parse(format!("{source}:1"), msg))?;
        let credits = CreditRule::parse(fields[3])
            .map_err(|msg| PlanError::parse(format!("{source}:1"), msg))?;
        let members_line = lines
            .next()
            .ok_or_else(|| PlanError::parse(source, "missing member line"))?;
        let members: Vec<String> = members_line
            .split(';')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string)
            .collect();
        if members.is_empty() {
            return Err(PlanError::parse(format!("{source}:2"), "no member codes"));
        }
        let mut group = CourseGroup::new(name, members)
            .with_count(count)
            .with_credits(credits);
        group.is_concentration_area = is_concentration;
        Ok(group)
    }
}

/// The registry of all course groups, keyed by name.
///
/// Iteration is in name order, which keeps model emission deterministic.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GroupRegistry {
    groups: BTreeMap<String, CourseGroup>,
}

impl GroupRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a group.
    pub fn add(&mut self, group: CourseGroup) {
        self.groups.insert(group.name.clone(), group);
    }

    /// Builder: adds a group and returns self.
    pub fn with_group(mut self, group: CourseGroup) -> Self {
        self.add(group);
        self
    }

    /// Group by name.
    pub fn get(&self, name: &str) -> Option<&CourseGroup> {
        self.groups.get(name)
    }

    /// All groups in name order.
    pub fn iter(&self) -> impl Iterator<Item = &CourseGroup> {
        self.groups.values()
    }

    /// Number of groups.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Parses a `.grp` file and adds it.
    pub fn add_from_str(&mut self, text: &str, source: &str) -> Result<()> {
        let group = CourseGroup::parse(text, source)?;
        self.add(group);
        Ok(())
    }

    /// Reads and adds a `.grp` file.
    pub fn add_from_path(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let text =
            std::fs::read_to_string(path).map_err(|e| PlanError::io(path.display().to_string(), e))?;
        self.add_from_str(&text, &path.display().to_string())
    }

    /// Names of the selectable concentration areas: concentration-flagged
    /// groups named `<area> Core`, with the suffix stripped.
    pub fn concentration_areas(&self) -> Vec<String> {
        self.groups
            .values()
            .filter(|g| g.is_concentration_area)
            .filter_map(|g| g.name.strip_suffix(" Core"))
            .map(str::to_string)
            .collect()
    }
}

/// The discipline of a course code: its alphabetic prefix, `/` stripped.
pub fn discipline_of(code: &str) -> String {
    code.chars()
        .filter(|&c| c != '/')
        .take_while(|c| c.is_ascii_alphabetic())
        .collect()
}

fn parse_u32(s: &str) -> std::result::Result<u32, String> {
    s.trim()
        .parse()
        .map_err(|_| format!("unrecognized count expression `{s}`"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_group() {
        let g = CourseGroup::parse(
            "LE-core-stat;false;1;0\nMA2010;MA3050\n# stats distribution\n",
            "le-core-stat.grp",
        )
        .unwrap();
        assert_eq!(g.name, "LE-core-stat");
        assert!(!g.is_concentration_area);
        assert_eq!(g.count, CountRule::AtLeast(1));
        assert_eq!(g.credits, CreditRule::AtLeast(0));
        assert_eq!(g.members, vec!["MA2010", "MA3050"]);
        assert_eq!(g.kind(), GroupKind::Distribution);
    }

    #[test]
    fn test_parse_overloaded_count_expressions() {
        let exact = CourseGroup::parse("picks;false;=2;0\nA;B;C\n", "g").unwrap();
        assert_eq!(exact.count, CountRule::Exactly(2));
        let per_term = CourseGroup::parse("labs;false;<=1;0\nA;B\n", "g").unwrap();
        assert_eq!(per_term.count, CountRule::PerTermMax(1));
        let capped = CourseGroup::parse("extras;false;-3;0\nA;B;C;D\n", "g").unwrap();
        assert_eq!(capped.count, CountRule::AtMostNetOfPassed(3));
        assert!(CourseGroup::parse("bad;false;<2;0\nA\n", "g").is_err());
    }

    #[test]
    fn test_parse_credit_expressions() {
        let credits = CourseGroup::parse("core;true;0;30\nA;B\n", "g").unwrap();
        assert_eq!(credits.credits, CreditRule::AtLeast(30));
        assert_eq!(credits.kind(), GroupKind::Concentration);
        let disciplines = CourseGroup::parse("breadth;false;0;-3\nA;B\n", "g").unwrap();
        assert_eq!(disciplines.credits, CreditRule::MinDisciplines(3));
        assert_eq!(disciplines.min_disciplines(), Some(3));
    }

    #[test]
    fn test_kind_classification_by_name() {
        let kind = |name: &str| CourseGroup::new(name, vec!["A".into()]).kind();
        assert_eq!(kind("capstoneCS"), GroupKind::Capstone);
        assert_eq!(kind("softorder-net"), GroupKind::SoftOrder);
        assert_eq!(kind("OU-free"), GroupKind::OuAnnual);
        assert_eq!(kind("HonorGroup"), GroupKind::Honors);
        assert_eq!(kind("L4"), GroupKind::LevelBand);
        assert_eq!(kind("L5"), GroupKind::LevelBand);
        assert_eq!(kind("L6"), GroupKind::LevelBand);
        assert_eq!(kind("L5-business"), GroupKind::LevelBand);
        assert_eq!(kind("anything else"), GroupKind::Distribution);
    }

    #[test]
    fn test_parse_rejects_malformed_files() {
        assert!(CourseGroup::parse("", "g").is_err());
        assert!(CourseGroup::parse("name;true;1\nA\n", "g").is_err());
        assert!(CourseGroup::parse("name;true;1;0\n\n", "g").is_err());
        assert!(CourseGroup::parse(";true;1;0\nA\n", "g").is_err());
    }

    #[test]
    fn test_concentration_areas() {
        let registry = GroupRegistry::new()
            .with_group(
                CourseGroup::new("Networks Core", vec!["A".into()])
                    .concentration()
                    .with_count(CountRule::AtLeast(3)),
            )
            .with_group(
                CourseGroup::new("Networks Electives", vec!["B".into()]).concentration(),
            )
            .with_group(CourseGroup::new("LE", vec!["C".into()]));
        assert_eq!(registry.concentration_areas(), vec!["Networks"]);
    }

    #[test]
    fn test_discipline_of() {
        assert_eq!(discipline_of("CS3160"), "CS");
        assert_eq!(discipline_of("MA/STAT2010"), "MASTAT");
        assert_eq!(discipline_of("ITC4979"), "ITC");
    }
}
