//! Program-wide planning parameters.
//!
//! Parsed once at startup from the line-oriented `params.props` file and
//! treated as read-only for every subsequent solve. Parsing is eager and
//! typed: a malformed value fails at load time, not in the middle of model
//! construction.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{PlanError, Result};

/// A program-code prefix whose courses get the last-resort objective bonus,
/// optionally excluding the members of one group.
///
/// Written in `params.props` as `CODE` or `CODE\EXCEPTION_GROUP` inside the
/// semicolon-separated `ProgramCodes2Maximize` list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramCodeRule {
    /// Course-code prefix, e.g. `CS`.
    pub code: String,
    /// Group whose members never receive the bonus.
    pub exception_group: Option<String>,
}

/// Program-wide scalars for the scheduling problem.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannerParams {
    /// Minimum total credits required for graduation (`Tc`).
    pub total_credits: u32,
    /// Maximum credits per non-summer term (`Cmax`).
    pub cmax: u32,
    /// `Cmax` for honors students (`CmaxHonor`).
    pub cmax_honor: u32,
    /// Maximum credits over one whole summer window (`SummerCmax`).
    pub summer_cmax: u32,
    /// `SummerCmax` for honors students (`SummerCmaxHonor`).
    pub summer_cmax_honor: u32,
    /// Planning horizon: number of future terms (`Smax`).
    pub smax: u32,
    /// Latest term by which all LE courses must be scheduled (`MaxLETerm`).
    pub max_le_term: u32,
    /// Maximum concurrently attended courses during summer sessions
    /// (`SummerConcNMax`); negative disables the constraint.
    pub summer_conc_max: i32,
    /// Code of the thesis course (`ThesisCourseCode`).
    pub thesis_code: String,
    /// Per-term course cap for freshmen (`FreshmanMaxNumCoursesPerTerm`).
    pub freshman_max_courses_per_term: Option<u32>,
    /// Courses needed to count as a sophomore (`MinNumCourses4Sophomore`).
    pub min_courses_for_sophomore: u32,
    /// Program-code prefixes to maximize as the last-resort objective
    /// (`ProgramCodes2Maximize`).
    pub programs_to_maximize: Vec<ProgramCodeRule>,
    /// Home program code prefix (`ProgramCode`).
    pub program_code: Option<String>,
    /// Header line for serialized catalogs (`CourseCSVFileHeader`).
    pub csv_header: Option<String>,
    /// Estimated grades below this never enter the objective
    /// (`MinGradeThres`, default 3.0).
    pub min_grade_threshold: f64,
    /// Whether catalog editing is enabled in front-ends (`AllowEdit`,
    /// default false). Carried for the file format; the core ignores it.
    pub allow_edit: bool,
}

impl PlannerParams {
    /// Per-term credit cap for the given student kind.
    pub fn cmax(&self, honors: bool) -> u32 {
        if honors {
            self.cmax_honor
        } else {
            self.cmax
        }
    }

    /// Whole-summer credit cap for the given student kind.
    pub fn summer_cmax(&self, honors: bool) -> u32 {
        if honors {
            self.summer_cmax_honor
        } else {
            self.summer_cmax
        }
    }

    /// Parses `key=value` properties text.
    ///
    /// Lines starting with `#` or `!` are comments. Unknown keys are kept
    /// out of the way (forward compatibility); missing required keys and
    /// malformed numbers are parse errors naming the key.
    pub fn parse(text: &str, source: &str) -> Result<Self> {
        let mut pairs: Vec<(&str, &str)> = Vec::new();
        for raw in text.lines() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
                continue;
            }
            let (key, value) = line.split_once('=').ok_or_else(|| {
                PlanError::parse(source, format!("expected `key=value`, got `{line}`"))
            })?;
            pairs.push((key.trim(), value.trim()));
        }
        let lookup = |key: &str| pairs.iter().rev().find(|(k, _)| *k == key).map(|(_, v)| *v);

        let required = |key: &str| {
            lookup(key)
                .ok_or_else(|| PlanError::parse(source, format!("missing required key `{key}`")))
        };
        let parse_num = |key: &str, value: &str| -> Result<i64> {
            value.parse().map_err(|_| {
                PlanError::parse(source, format!("key `{key}` has unparsable value `{value}`"))
            })
        };
        let required_u32 = |key: &str| -> Result<u32> {
            let value = required(key)?;
            let n = parse_num(key, value)?;
            u32::try_from(n).map_err(|_| {
                PlanError::parse(source, format!("key `{key}` must be non-negative, got {n}"))
            })
        };

        let thesis_code = required("ThesisCourseCode")?.to_string();
        let summer_conc_max = parse_num("SummerConcNMax", required("SummerConcNMax")?)? as i32;
        let freshman_max_courses_per_term = match lookup("FreshmanMaxNumCoursesPerTerm") {
            Some(v) => Some(parse_num("FreshmanMaxNumCoursesPerTerm", v)? as u32),
            None => None,
        };
        let min_courses_for_sophomore = match lookup("MinNumCourses4Sophomore") {
            Some(v) => parse_num("MinNumCourses4Sophomore", v)? as u32,
            None => 0,
        };
        let min_grade_threshold = match lookup("MinGradeThres") {
            Some(v) => v.parse().map_err(|_| {
                PlanError::parse(source, format!("key `MinGradeThres` has unparsable value `{v}`"))
            })?,
            None => 3.0,
        };
        let programs_to_maximize = match lookup("ProgramCodes2Maximize") {
            Some(v) => parse_program_codes(v),
            None => Vec::new(),
        };

        Ok(Self {
            total_credits: required_u32("Tc")?,
            cmax: required_u32("Cmax")?,
            cmax_honor: required_u32("CmaxHonor")?,
            summer_cmax: required_u32("SummerCmax")?,
            summer_cmax_honor: required_u32("SummerCmaxHonor")?,
            smax: required_u32("Smax")?,
            max_le_term: required_u32("MaxLETerm")?,
            summer_conc_max,
            thesis_code,
            freshman_max_courses_per_term,
            min_courses_for_sophomore,
            programs_to_maximize,
            program_code: lookup("ProgramCode").map(str::to_string),
            csv_header: lookup("CourseCSVFileHeader").map(str::to_string),
            min_grade_threshold,
            allow_edit: lookup("AllowEdit").is_some_and(|v| v.eq_ignore_ascii_case("true")),
        })
    }

    /// Reads and parses a `params.props` file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text =
            std::fs::read_to_string(path).map_err(|e| PlanError::io(path.display().to_string(), e))?;
        Self::parse(&text, &path.display().to_string())
    }
}

fn parse_program_codes(value: &str) -> Vec<ProgramCodeRule> {
    value
        .split(';')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| match item.split_once('\\') {
            Some((code, exception)) => ProgramCodeRule {
                code: code.trim().to_string(),
                exception_group: Some(exception.trim().to_string()),
            },
            None => ProgramCodeRule {
                code: item.to_string(),
                exception_group: None,
            },
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
# scheduling parameters
Tc=121
Cmax=16
CmaxHonor=19
SummerCmax=12
SummerCmaxHonor=15
Smax=15
MaxLETerm=10
SummerConcNMax=2
ThesisCourseCode=CS4979
FreshmanMaxNumCoursesPerTerm=4
MinNumCourses4Sophomore=10
ProgramCodes2Maximize=CS;MA\\LE-core-stat
ProgramCode=CS
MinGradeThres=3.3
";

    #[test]
    fn test_parse_full() {
        let p = PlannerParams::parse(SAMPLE, "params.props").unwrap();
        assert_eq!(p.total_credits, 121);
        assert_eq!(p.cmax(false), 16);
        assert_eq!(p.cmax(true), 19);
        assert_eq!(p.summer_cmax(false), 12);
        assert_eq!(p.summer_cmax(true), 15);
        assert_eq!(p.smax, 15);
        assert_eq!(p.max_le_term, 10);
        assert_eq!(p.summer_conc_max, 2);
        assert_eq!(p.thesis_code, "CS4979");
        assert_eq!(p.freshman_max_courses_per_term, Some(4));
        assert_eq!(p.min_courses_for_sophomore, 10);
        assert_eq!(p.min_grade_threshold, 3.3);
        assert!(!p.allow_edit);
        assert_eq!(
            p.programs_to_maximize,
            vec![
                ProgramCodeRule {
                    code: "CS".into(),
                    exception_group: None
                },
                ProgramCodeRule {
                    code: "MA".into(),
                    exception_group: Some("LE-core-stat".into())
                },
            ]
        );
    }

    #[test]
    fn test_defaults() {
        let minimal = "Tc=120\nCmax=16\nCmaxHonor=19\nSummerCmax=12\nSummerCmaxHonor=15\n\
                       Smax=12\nMaxLETerm=8\nSummerConcNMax=-1\nThesisCourseCode=CS4979\n";
        let p = PlannerParams::parse(minimal, "params.props").unwrap();
        assert_eq!(p.min_grade_threshold, 3.0);
        assert!(!p.allow_edit);
        assert_eq!(p.freshman_max_courses_per_term, None);
        assert_eq!(p.min_courses_for_sophomore, 0);
        assert!(p.programs_to_maximize.is_empty());
        assert_eq!(p.summer_conc_max, -1);
    }

    #[test]
    fn test_missing_required_key() {
        let err = PlannerParams::parse("Tc=120\n", "params.props").unwrap_err();
        assert!(err.to_string().contains("missing required key"));
    }

    #[test]
    fn test_unparsable_value() {
        let bad = SAMPLE.replace("Cmax=16", "Cmax=lots");
        assert!(PlannerParams::parse(&bad, "params.props").is_err());
    }
}
