//! Per-student planning input.
//!
//! Gathered fresh for every solve: courses already passed, courses the
//! student wants (or refuses) with optional preferred terms, per-term course
//! count wishes, the honors flag, summer-session toggles, workload caps, the
//! chosen concentration and the objective weights.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{PlanError, Result};
use crate::models::calendar::AcademicCalendar;

/// Objective weight tuple `(DN, DL, Cr, Gr)`.
///
/// `time` weighs the latest-used-term proxy, `difficulty` the maximum
/// per-term difficulty load, `credits` each scheduled credit and `grade`
/// the thresholded estimated-grade term.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectiveWeights {
    /// Weight of the time-to-completion proxy `D`.
    pub time: i32,
    /// Weight of the per-term difficulty load `DL`.
    pub difficulty: i32,
    /// Weight applied to each course's credits.
    pub credits: i32,
    /// Weight applied to each course's estimated grade.
    pub grade: i32,
}

impl ObjectiveWeights {
    /// Creates a weight tuple.
    pub fn new(time: i32, difficulty: i32, credits: i32, grade: i32) -> Self {
        Self {
            time,
            difficulty,
            credits,
            grade,
        }
    }
}

/// A per-term course-count wish such as `2`, `<=3` or `>=4`.
///
/// Strict forms clamp to the closest non-strict form (`<N` to `<=N-1`,
/// `>N` to `>=N+1`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CountExpr {
    /// Exactly this many courses.
    Exactly(u32),
    /// At most this many courses.
    AtMost(u32),
    /// At least this many courses.
    AtLeast(u32),
}

impl CountExpr {
    /// Parses an expression; empty text means no constraint.
    pub fn parse(expr: &str) -> Result<Option<Self>> {
        let expr = expr.trim();
        if expr.is_empty() {
            return Ok(None);
        }
        let parse_n = |rest: &str| -> Result<u32> {
            rest.trim().parse().map_err(|_| {
                PlanError::parse("count expression", format!("unrecognized `{expr}`"))
            })
        };
        let parsed = if let Some(rest) = expr.strip_prefix("<=") {
            CountExpr::AtMost(parse_n(rest)?)
        } else if let Some(rest) = expr.strip_prefix(">=") {
            CountExpr::AtLeast(parse_n(rest)?)
        } else if let Some(rest) = expr.strip_prefix('<') {
            let n = parse_n(rest)?;
            if n == 0 {
                return Err(PlanError::parse(
                    "count expression",
                    "`<0` is unsatisfiable",
                ));
            }
            CountExpr::AtMost(n - 1)
        } else if let Some(rest) = expr.strip_prefix('>') {
            CountExpr::AtLeast(parse_n(rest)?.saturating_add(1))
        } else if let Some(rest) = expr.strip_prefix('=') {
            CountExpr::Exactly(parse_n(rest)?)
        } else {
            CountExpr::Exactly(parse_n(expr)?)
        };
        Ok(Some(parsed))
    }
}

/// Everything a single solve needs to know about the student.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudentInput {
    /// Codes of courses already passed.
    pub passed: BTreeSet<String>,
    /// Desired courses: code to raw allowed-term tokens. An empty token set
    /// means the course must NOT be taken.
    pub desired: BTreeMap<String, BTreeSet<String>>,
    /// Raw per-term count expressions, keyed by term number.
    pub per_term_counts: BTreeMap<u32, String>,
    /// Honors student flag.
    pub honors: bool,
    /// No courses during any Summer-1 session.
    pub s1_off: bool,
    /// No courses during any Summer-2 session.
    pub s2_off: bool,
    /// No courses during any Summer Term.
    pub st_off: bool,
    /// Student-imposed maximum courses per term.
    pub max_courses_per_term: u32,
    /// Maximum courses during the thesis term, thesis included (>= 1).
    pub max_courses_during_thesis: u32,
    /// Chosen concentration area name (non-empty).
    pub concentration: String,
    /// OU courses already taken in the current academic year.
    pub num_ou_this_year: u32,
    /// Objective weights.
    pub weights: ObjectiveWeights,
}

impl StudentInput {
    /// Creates an input for the given concentration with neutral defaults:
    /// nothing passed or desired, not honors, all sessions on, five courses
    /// per term, one course during the thesis term.
    pub fn new(concentration: impl Into<String>) -> Self {
        Self {
            passed: BTreeSet::new(),
            desired: BTreeMap::new(),
            per_term_counts: BTreeMap::new(),
            honors: false,
            s1_off: false,
            s2_off: false,
            st_off: false,
            max_courses_per_term: 5,
            max_courses_during_thesis: 1,
            concentration: concentration.into(),
            num_ou_this_year: 0,
            weights: ObjectiveWeights::default(),
        }
    }

    /// Marks a course as passed.
    pub fn add_passed(&mut self, code: impl Into<String>) {
        self.passed.insert(code.into());
    }

    /// Builder: marks courses as passed.
    pub fn with_passed<I, S>(mut self, codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.passed.extend(codes.into_iter().map(Into::into));
        self
    }

    /// Desires a course on any term.
    pub fn desire(&mut self, code: impl Into<String>) {
        let mut tokens = BTreeSet::new();
        tokens.insert("allterms".to_string());
        self.desired.insert(code.into(), tokens);
    }

    /// Desires a course on the given term tokens only.
    pub fn desire_on<I, S>(&mut self, code: impl Into<String>, tokens: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.desired
            .insert(code.into(), tokens.into_iter().map(Into::into).collect());
    }

    /// Marks a course as not-to-take.
    pub fn undesire(&mut self, code: impl Into<String>) {
        self.desired.insert(code.into(), BTreeSet::new());
    }

    /// Builder: desires courses on any term.
    pub fn with_desired<I, S>(mut self, codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for code in codes {
            self.desire(code);
        }
        self
    }

    /// Builder: sets the objective weights.
    pub fn with_weights(mut self, weights: ObjectiveWeights) -> Self {
        self.weights = weights;
        self
    }

    /// Builder: sets the per-term course cap.
    pub fn with_max_courses_per_term(mut self, n: u32) -> Self {
        self.max_courses_per_term = n;
        self
    }

    /// Builder: sets the thesis-term course cap (>= 1).
    pub fn with_max_courses_during_thesis(mut self, n: u32) -> Self {
        self.max_courses_during_thesis = n.max(1);
        self
    }

    /// Drops every desired course that is already passed.
    ///
    /// Data-entry errors of this kind are silently corrected before model
    /// construction.
    pub fn normalize(&mut self) {
        let passed = &self.passed;
        self.desired.retain(|code, _| !passed.contains(code));
    }

    /// Loads passed courses from `passedcourses.txt` text: semicolon
    /// separated codes, any number per line.
    pub fn load_passed(&mut self, text: &str) {
        for line in text.lines() {
            for code in line.split(';') {
                let code = code.trim();
                if !code.is_empty() && !code.starts_with('#') {
                    self.passed.insert(code.to_string());
                }
            }
        }
    }

    /// Loads desired courses from `desiredcourses.txt` text.
    ///
    /// Each line is `code`, `code;` (NOT-TO-TAKE) or
    /// `code;token [token ...]`.
    pub fn load_desired(&mut self, text: &str) {
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            match line.split_once(';') {
                None => self.desire(line),
                Some((code, rest)) => {
                    let tokens: BTreeSet<String> = rest
                        .split(&[';', ' '][..])
                        .map(str::trim)
                        .filter(|t| !t.is_empty())
                        .map(str::to_string)
                        .collect();
                    self.desired.insert(code.trim().to_string(), tokens);
                }
            }
        }
    }

    /// Reads `passedcourses.txt` from disk if it exists.
    pub fn load_passed_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(());
        }
        let text =
            std::fs::read_to_string(path).map_err(|e| PlanError::io(path.display().to_string(), e))?;
        self.load_passed(&text);
        Ok(())
    }

    /// Reads `desiredcourses.txt` from disk if it exists.
    pub fn load_desired_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(());
        }
        let text =
            std::fs::read_to_string(path).map_err(|e| PlanError::io(path.display().to_string(), e))?;
        self.load_desired(&text);
        Ok(())
    }

    /// Expands a desired course's tokens into concrete allowed slots.
    ///
    /// `allterms` expands to `1..=smax`; `allotherterms` to every slot
    /// except `cur_term`; explicit tokens go through the calendar, and
    /// tokens that resolve to the historical slot are dropped.
    pub fn allowed_terms(
        &self,
        code: &str,
        cur_term: u32,
        smax: u32,
        calendar: &AcademicCalendar,
    ) -> Result<BTreeSet<u32>> {
        let mut slots = BTreeSet::new();
        let Some(tokens) = self.desired.get(code) else {
            return Ok(slots);
        };
        for token in tokens {
            match token.as_str() {
                "allterms" => {
                    return Ok((1..=smax).collect());
                }
                "allotherterms" => {
                    slots.extend((1..=smax).filter(|&s| s != cur_term));
                }
                explicit => {
                    let s = calendar.term_no(explicit)?;
                    if s >= 1 {
                        slots.insert(s);
                    }
                }
            }
        }
        Ok(slots)
    }
}
