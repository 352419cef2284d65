//! Course records and the course catalog.
//!
//! The catalog is the in-memory course table: stable dense ids, unique
//! string codes, credits, CNF prerequisites, co-requisites, offering rules,
//! difficulty, optional display names and per-student estimated grades.
//! It is loaded once from `cls.csv` at startup and read-only afterwards.
//!
//! # Prerequisite structure
//!
//! Prerequisites are kept in conjunctive normal form: an outer conjunction
//! of inner disjunctions of course codes. `{{"CS208","CS210"},{"MA205"}}`
//! reads "(CS208 or CS210) and MA205". Co-requisites are a flat set: each
//! must be passed earlier or taken in the same term. Both containers are
//! ordered sets so serialization and model emission are deterministic.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::error::{PlanError, Result};
use crate::models::calendar::{AcademicCalendar, Season};

/// Dense 0-based course identifier, assigned in catalog insertion order.
pub type CourseId = usize;

/// A single course.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Course {
    /// Catalog id; index of the decision variables `x_i` and `x_{i,s}`.
    pub id: CourseId,
    /// Unique course code, e.g. `CS3160`.
    pub code: String,
    /// Course title, e.g. `Object Oriented Programming`.
    pub title: String,
    /// Equivalent course codes. Normally empty.
    pub synonyms: BTreeSet<String>,
    /// Credit value (positive).
    pub credits: u32,
    /// CNF prerequisites: every inner set must have at least one member
    /// passed in a strictly earlier slot.
    pub prereqs: BTreeSet<BTreeSet<String>>,
    /// Co-requisites: each must be passed earlier or taken the same term.
    pub coreqs: BTreeSet<String>,
    /// Symbolic offering expression (`alltimes`, `everyfall`, explicit
    /// tokens, ...); `-` means the course is offered nowhere.
    pub offering: String,
    /// Name shown in the final schedule for hidden distribution slots.
    pub display_name: Option<String>,
    /// Difficulty level in `0..=10`.
    pub difficulty: u32,
    /// Estimated grade in `[0, 4.0]`; `0.0` means no estimate and leaves
    /// the objective untouched.
    pub estimated_grade: f64,
}

impl Course {
    /// Creates a course with no requirements, offered nowhere.
    ///
    /// The id is assigned when the course is added to a [`Catalog`].
    pub fn new(code: impl Into<String>, title: impl Into<String>, credits: u32) -> Self {
        Self {
            id: 0,
            code: code.into(),
            title: title.into(),
            synonyms: BTreeSet::new(),
            credits,
            prereqs: BTreeSet::new(),
            coreqs: BTreeSet::new(),
            offering: "-".to_string(),
            display_name: None,
            difficulty: 0,
            estimated_grade: 0.0,
        }
    }

    /// Sets the offering expression.
    pub fn with_offering(mut self, offering: impl Into<String>) -> Self {
        self.offering = offering.into();
        self
    }

    /// Adds one CNF prerequisite clause (a disjunction of codes).
    pub fn with_prereq_clause<I, S>(mut self, codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.prereqs
            .insert(codes.into_iter().map(Into::into).collect());
        self
    }

    /// Adds a co-requisite code.
    pub fn with_coreq(mut self, code: impl Into<String>) -> Self {
        self.coreqs.insert(code.into());
        self
    }

    /// Sets the schedule display name.
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Sets the difficulty level.
    pub fn with_difficulty(mut self, level: u32) -> Self {
        self.difficulty = level;
        self
    }

    /// Whether `code` is a synonym of this course.
    pub fn is_synonym_for(&self, code: &str) -> bool {
        self.synonyms.contains(code)
    }

    /// `<code> <title>` label used in rendered schedules.
    pub fn label(&self) -> String {
        format!("{} {}", self.code, self.title)
    }

    fn to_csv_line(&self) -> String {
        let synonyms: Vec<&str> = self.synonyms.iter().map(String::as_str).collect();
        let clauses: Vec<String> = self
            .prereqs
            .iter()
            .map(|clause| {
                let parts: Vec<&str> = clause.iter().map(String::as_str).collect();
                parts.join("+")
            })
            .collect();
        let coreqs: Vec<&str> = self.coreqs.iter().map(String::as_str).collect();
        let difficulty = if self.difficulty > 0 {
            self.difficulty.to_string()
        } else {
            String::new()
        };
        format!(
            "{};{};{};{};{};{};{};{};{}",
            self.code,
            self.title,
            synonyms.join(" "),
            self.credits,
            clauses.join(","),
            coreqs.join(" "),
            self.offering,
            self.display_name.as_deref().unwrap_or(""),
            difficulty
        )
    }
}

/// The course table: courses indexed by dense id and unique code.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Catalog {
    courses: Vec<Course>,
    by_code: BTreeMap<String, CourseId>,
}

impl Catalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a course, assigning its id. Fails on duplicate codes.
    pub fn add(&mut self, mut course: Course) -> Result<CourseId> {
        if self.by_code.contains_key(&course.code) {
            return Err(PlanError::parse(
                "catalog",
                format!("duplicate course code `{}`", course.code),
            ));
        }
        let id = self.courses.len();
        course.id = id;
        self.by_code.insert(course.code.clone(), id);
        self.courses.push(course);
        Ok(id)
    }

    /// Number of courses.
    pub fn len(&self) -> usize {
        self.courses.len()
    }

    /// Whether the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.courses.is_empty()
    }

    /// Course by id.
    pub fn get(&self, id: CourseId) -> Option<&Course> {
        self.courses.get(id)
    }

    /// Course by code.
    pub fn by_code(&self, code: &str) -> Option<&Course> {
        self.by_code.get(code).map(|&id| &self.courses[id])
    }

    /// Id of the course with the given code.
    pub fn id_of(&self, code: &str) -> Option<CourseId> {
        self.by_code.get(code).copied()
    }

    /// Courses in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Course> {
        self.courses.iter()
    }

    /// Course codes in alphabetical order.
    pub fn codes(&self) -> impl Iterator<Item = &str> {
        self.by_code.keys().map(String::as_str)
    }

    /// Parses a catalog from `cls.csv` text.
    ///
    /// One course per non-comment line; semicolon-separated fields:
    /// `code;title;synonyms;credits;prereqsCNF;coreqs;offering;[display];[difficulty]`.
    /// Lines starting with `#` are comments. Prerequisite clauses are
    /// comma-separated; codes within a clause are `+`-separated.
    pub fn parse(text: &str, source: &str) -> Result<Self> {
        let mut catalog = Catalog::new();
        for (lineno, raw) in text.lines().enumerate() {
            let line = raw.trim_end();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let course = parse_course_line(line)
                .map_err(|msg| PlanError::parse(format!("{source}:{}", lineno + 1), msg))?;
            catalog.add(course)?;
        }
        info!("loaded {} courses from {source}", catalog.len());
        Ok(catalog)
    }

    /// Reads and parses a catalog file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text =
            std::fs::read_to_string(path).map_err(|e| PlanError::io(path.display().to_string(), e))?;
        Self::parse(&text, &path.display().to_string())
    }

    /// Serializes the catalog back to `cls.csv` text.
    ///
    /// Stable under re-parsing: the symbolic offering expression is kept
    /// verbatim and CNF clauses emit in lexicographic order.
    pub fn to_csv_string(&self, header: Option<&str>) -> String {
        let mut out = String::new();
        if let Some(header) = header {
            out.push('#');
            out.push_str(header);
            out.push('\n');
        }
        for course in &self.courses {
            out.push_str(&course.to_csv_line());
            out.push('\n');
        }
        out
    }

    /// Resolves a course's offering expression into the sorted list of
    /// allowed slots in `1..=smax`.
    ///
    /// Recomputed on every call: offerings depend on the current date and
    /// must refresh when the calendar changes.
    pub fn terms_offered(
        &self,
        course: &Course,
        calendar: &AcademicCalendar,
        smax: u32,
    ) -> Result<Vec<u32>> {
        let mut slots: BTreeSet<u32> = BTreeSet::new();
        let spec = course.offering.trim();
        if spec == "-" || spec.is_empty() {
            return Ok(Vec::new());
        }
        for token in spec.split_whitespace() {
            match token {
                "alltimes" => {
                    slots.clear();
                    slots.extend(1..=smax);
                }
                "everyfall" => slots.extend((1..=smax).filter(|&s| calendar.is_fall_term(s))),
                "everyspring" => {
                    slots.extend((1..=smax).filter(|&s| calendar.season_of(s) == Season::Spring))
                }
                "everysummerterm" => {
                    slots.extend((1..=smax).filter(|&s| calendar.is_summer_term(s)))
                }
                "next2terms" => slots.extend(1..=smax.min(2)),
                "next4terms" => slots.extend(1..=smax.min(4)),
                explicit => {
                    let s = calendar.term_no(explicit)?;
                    if (1..=smax).contains(&s) {
                        slots.insert(s);
                    }
                }
            }
        }
        Ok(slots.into_iter().collect())
    }

    /// Whether course `a` transitively requires course `b` through any
    /// prerequisite or co-requisite path.
    pub fn requires_course(&self, a: &str, b: &str) -> bool {
        let Some(start) = self.by_code(a) else {
            return false;
        };
        let mut stack: Vec<&str> = Vec::new();
        let mut seen: BTreeSet<&str> = BTreeSet::new();
        push_requirements(start, &mut stack, &mut seen);
        while let Some(code) = stack.pop() {
            if code == b {
                return true;
            }
            if let Some(course) = self.by_code(code) {
                push_requirements(course, &mut stack, &mut seen);
            }
        }
        false
    }

    /// Strict requirement query within a chosen set: whether every chosen
    /// way of satisfying `a`'s requirements goes through `b`.
    ///
    /// Unlike [`requires_course`](Self::requires_course), a prerequisite
    /// clause with an alternative chosen disjunct that avoids `b` does not
    /// count.
    pub fn plan_requires_course(
        &self,
        a: CourseId,
        b: CourseId,
        chosen: &BTreeSet<CourseId>,
    ) -> bool {
        let mut visiting = BTreeSet::new();
        self.plan_requires_inner(a, b, chosen, &mut visiting)
    }

    fn plan_requires_inner(
        &self,
        a: CourseId,
        b: CourseId,
        chosen: &BTreeSet<CourseId>,
        visiting: &mut BTreeSet<CourseId>,
    ) -> bool {
        if !visiting.insert(a) {
            return false;
        }
        let Some(course) = self.get(a) else {
            visiting.remove(&a);
            return false;
        };
        // A clause pins `b` when every chosen disjunct is `b` itself or in
        // turn requires `b`.
        for clause in &course.prereqs {
            let sat: Vec<CourseId> = clause
                .iter()
                .filter_map(|code| self.id_of(code))
                .filter(|id| chosen.contains(id))
                .collect();
            if !sat.is_empty()
                && sat
                    .iter()
                    .all(|&j| j == b || self.plan_requires_inner(j, b, chosen, visiting))
            {
                visiting.remove(&a);
                return true;
            }
        }
        for code in &course.coreqs {
            if let Some(j) = self.id_of(code) {
                if chosen.contains(&j)
                    && (j == b || self.plan_requires_inner(j, b, chosen, visiting))
                {
                    visiting.remove(&a);
                    return true;
                }
            }
        }
        visiting.remove(&a);
        false
    }

    /// Whether some desired course strictly requires `course` within the
    /// chosen set. Drives display-name selection in rendered schedules.
    pub fn is_required_for_desired<'a>(
        &self,
        course: CourseId,
        desired: impl IntoIterator<Item = &'a str>,
        chosen: &BTreeSet<CourseId>,
    ) -> bool {
        desired
            .into_iter()
            .filter_map(|code| self.id_of(code))
            .filter(|id| chosen.contains(id))
            .any(|d| d != course && self.plan_requires_course(d, course, chosen))
    }

    /// Applies `code,grade` estimate lines, keeping only grades at or above
    /// `threshold`.
    pub fn apply_estimated_grades(&mut self, text: &str, threshold: f64, source: &str) -> Result<()> {
        for (lineno, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let context = format!("{source}:{}", lineno + 1);
            let (code, grade_str) = line
                .split_once(',')
                .ok_or_else(|| PlanError::parse(&context, "expected `code,grade`"))?;
            let code = code.trim();
            let grade: f64 = grade_str.trim().parse().map_err(|_| {
                PlanError::parse(&context, format!("unparsable grade `{}`", grade_str.trim()))
            })?;
            let id = self
                .id_of(code)
                .ok_or_else(|| PlanError::parse(&context, format!("unknown course `{code}`")))?;
            if grade >= threshold {
                self.courses[id].estimated_grade = grade;
            }
        }
        Ok(())
    }
}

fn push_requirements<'a>(
    course: &'a Course,
    stack: &mut Vec<&'a str>,
    seen: &mut BTreeSet<&'a str>,
) {
    for clause in &course.prereqs {
        for code in clause {
            if seen.insert(code) {
                stack.push(code);
            }
        }
    }
    for code in &course.coreqs {
        if seen.insert(code) {
            stack.push(code);
        }
    }
}

fn parse_course_line(line: &str) -> std::result::Result<Course, String> {
    let fields: Vec<&str> = line.split(';').collect();
    if fields.len() < 7 {
        return Err(format!("expected at least 7 fields, got {}", fields.len()));
    }
    let code = fields[0].trim();
    if code.is_empty() {
        return Err("empty course code".to_string());
    }
    let credits: u32 = fields[3]
        .trim()
        .parse()
        .map_err(|_| format!("unparsable credits `{}`", fields[3].trim()))?;
    let mut course = Course::new(code, fields[1].trim(), credits);
    course.synonyms = fields[2].split_whitespace().map(str::to_string).collect();
    for clause_str in fields[4].split(',') {
        let clause: BTreeSet<String> = clause_str
            .split('+')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string)
            .collect();
        if !clause.is_empty() {
            course.prereqs.insert(clause);
        }
    }
    course.coreqs = fields[5].split_whitespace().map(str::to_string).collect();
    course.offering = fields[6].trim().to_string();
    if let Some(display) = fields.get(7) {
        let display = display.trim();
        if !display.is_empty() {
            course.display_name = Some(display.to_string());
        }
    }
    if let Some(diff) = fields.get(8) {
        let diff = diff.trim();
        if !diff.is_empty() {
            match diff.parse() {
                Ok(level) => course.difficulty = level,
                Err(_) => {
                    warn!("course {code}: unparsable difficulty `{diff}`, keeping 0");
                }
            }
        }
    }
    Ok(course)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
# code;title;synonyms;credits;prereqs;coreqs;terms;display;difficulty
CS1070;Introduction to Programming;;3;;;alltimes;;2
CS2080;Data Structures;;3;CS1070;;everyfall everyspring;;4
CS3160;Object Oriented Programming;CS3165;3;CS2080+MA2010,CS1070;;alltimes;;5
MA2010;Discrete Mathematics;;3;;CS1070;alltimes;;
LE1001;Humanities Elective;;3;;;alltimes;LE in Humanities;
";

    fn sample_catalog() -> Catalog {
        Catalog::parse(SAMPLE, "cls.csv").unwrap()
    }

    #[test]
    fn test_parse_assigns_dense_ids() {
        let catalog = sample_catalog();
        assert_eq!(catalog.len(), 5);
        for (i, course) in catalog.iter().enumerate() {
            assert_eq!(course.id, i);
        }
        assert_eq!(catalog.by_code("CS2080").unwrap().id, 1);
        assert_eq!(catalog.id_of("MA2010"), Some(3));
    }

    #[test]
    fn test_parse_fields() {
        let catalog = sample_catalog();
        let oop = catalog.by_code("CS3160").unwrap();
        assert_eq!(oop.credits, 3);
        assert_eq!(oop.difficulty, 5);
        assert!(oop.is_synonym_for("CS3165"));
        assert_eq!(oop.prereqs.len(), 2);
        let clause: BTreeSet<String> = ["CS2080", "MA2010"].iter().map(|s| s.to_string()).collect();
        assert!(oop.prereqs.contains(&clause));
        let le = catalog.by_code("LE1001").unwrap();
        assert_eq!(le.display_name.as_deref(), Some("LE in Humanities"));
        let ma = catalog.by_code("MA2010").unwrap();
        assert!(ma.coreqs.contains("CS1070"));
        assert_eq!(ma.difficulty, 0);
    }

    #[test]
    fn test_parse_rejects_duplicates_and_bad_rows() {
        let dup = "A1;First;;3;;;alltimes\nA1;Again;;3;;;alltimes\n";
        assert!(Catalog::parse(dup, "cls.csv").is_err());
        let bad = "A1;First;;three;;;alltimes\n";
        assert!(Catalog::parse(bad, "cls.csv").is_err());
        let short = "A1;First;3\n";
        assert!(Catalog::parse(short, "cls.csv").is_err());
    }

    #[test]
    fn test_csv_round_trip_is_stable() {
        let catalog = sample_catalog();
        let once = catalog.to_csv_string(Some("header"));
        let reparsed = Catalog::parse(&once, "round-trip").unwrap();
        assert_eq!(reparsed.to_csv_string(Some("header")), once);
    }

    #[test]
    fn test_terms_offered_symbolic() {
        // Current date in Fall 2023: SP(1) S1(2) S2(3) ST(4) FA(5) ...
        let cal = AcademicCalendar::new(15, 9, 2023);
        let catalog = sample_catalog();
        let intro = catalog.by_code("CS1070").unwrap();
        assert_eq!(
            catalog.terms_offered(intro, &cal, 6).unwrap(),
            vec![1, 2, 3, 4, 5, 6]
        );
        let ds = catalog.by_code("CS2080").unwrap();
        assert_eq!(catalog.terms_offered(ds, &cal, 10).unwrap(), vec![1, 5, 6, 10]);
    }

    #[test]
    fn test_terms_offered_explicit_and_none() {
        let cal = AcademicCalendar::new(15, 9, 2023);
        let mut catalog = Catalog::new();
        catalog
            .add(Course::new("X1", "Explicit", 3).with_offering("SP2024 ST2024 FA2020"))
            .unwrap();
        catalog.add(Course::new("X2", "Never", 3)).unwrap();
        let x1 = catalog.by_code("X1").unwrap();
        // FA2020 is in the past and resolves to slot 0, which is dropped.
        assert_eq!(catalog.terms_offered(x1, &cal, 6).unwrap(), vec![1, 4]);
        let x2 = catalog.by_code("X2").unwrap();
        assert!(catalog.terms_offered(x2, &cal, 6).unwrap().is_empty());
        catalog
            .add(Course::new("X3", "Soon", 3).with_offering("next2terms"))
            .unwrap();
        let x3 = catalog.by_code("X3").unwrap();
        assert_eq!(catalog.terms_offered(x3, &cal, 6).unwrap(), vec![1, 2]);
    }

    #[test]
    fn test_requires_course_closure() {
        let catalog = sample_catalog();
        assert!(catalog.requires_course("CS2080", "CS1070"));
        // Through the (CS2080 or MA2010) clause and beyond.
        assert!(catalog.requires_course("CS3160", "CS2080"));
        assert!(catalog.requires_course("CS3160", "CS1070"));
        // Co-requisites count as requirements.
        assert!(catalog.requires_course("MA2010", "CS1070"));
        assert!(!catalog.requires_course("CS1070", "CS3160"));
        assert!(!catalog.requires_course("LE1001", "CS1070"));
    }

    #[test]
    fn test_plan_requires_course_is_strict() {
        let catalog = sample_catalog();
        let oop = catalog.id_of("CS3160").unwrap();
        let ds = catalog.id_of("CS2080").unwrap();
        let ma = catalog.id_of("MA2010").unwrap();
        let intro = catalog.id_of("CS1070").unwrap();

        // Both disjuncts of (CS2080 or MA2010) chosen: neither is pinned.
        let both: BTreeSet<CourseId> = [oop, ds, ma, intro].into_iter().collect();
        assert!(!catalog.plan_requires_course(oop, ds, &both));
        // Only CS2080 chosen from the clause: it is pinned.
        let only_ds: BTreeSet<CourseId> = [oop, ds, intro].into_iter().collect();
        assert!(catalog.plan_requires_course(oop, ds, &only_ds));
        // CS1070 is pinned through its own singleton clause.
        assert!(catalog.plan_requires_course(oop, intro, &only_ds));
    }

    #[test]
    fn test_is_required_for_desired() {
        let catalog = sample_catalog();
        let ds = catalog.id_of("CS2080").unwrap();
        let intro = catalog.id_of("CS1070").unwrap();
        let chosen: BTreeSet<CourseId> = [ds, intro].into_iter().collect();
        assert!(catalog.is_required_for_desired(intro, ["CS2080"], &chosen));
        assert!(!catalog.is_required_for_desired(intro, ["LE1001"], &chosen));
    }

    #[test]
    fn test_estimated_grades_threshold() {
        let mut catalog = sample_catalog();
        catalog
            .apply_estimated_grades("CS1070,3.7\nCS2080,2.5\n", 3.0, "estimated_grades.txt")
            .unwrap();
        assert_eq!(catalog.by_code("CS1070").unwrap().estimated_grade, 3.7);
        // Below threshold: ignored.
        assert_eq!(catalog.by_code("CS2080").unwrap().estimated_grade, 0.0);
        assert!(catalog
            .apply_estimated_grades("NOPE,3.9\n", 3.0, "estimated_grades.txt")
            .is_err());
    }
}
