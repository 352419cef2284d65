//! Input integrity checks.
//!
//! Validates the catalog, group registry and parameters together before any
//! model is built. A reference to a course or group that does not exist
//! would otherwise surface as a nonsense MILP; the core refuses to emit a
//! model instead. All detected problems are reported, not just the first.

use std::collections::BTreeSet;

use crate::models::{Catalog, GroupKind, GroupRegistry, PlannerParams};

/// Validation result.
pub type ValidationResult = Result<(), Vec<ValidationError>>;

/// A validation error.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    /// Error category.
    pub kind: ValidationErrorKind,
    /// Human-readable description.
    pub message: String,
}

/// Categories of validation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationErrorKind {
    /// A prerequisite, co-requisite or group references an unknown course.
    UnknownCourseReference,
    /// A capstone or soft-order group has the wrong member count.
    BadGroupArity,
    /// One of the `L4`/`L5`/`L6` level bands is missing.
    MissingLevelBand,
    /// The configured thesis course does not exist.
    UnknownThesisCourse,
    /// A program-code rule names an unknown exception group.
    UnknownExceptionGroup,
    /// A course attribute is out of range.
    InvalidCourseAttribute,
}

impl ValidationError {
    fn new(kind: ValidationErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Validates problem data integrity.
///
/// Checks:
/// 1. Every code referenced by a prerequisite or co-requisite exists.
/// 2. Every group member code exists.
/// 3. Capstone groups have exactly one member; soft-order groups exactly two.
/// 4. The `L4`, `L5` and `L6` level bands exist.
/// 5. The thesis course exists.
/// 6. Exception groups named by program-code rules exist.
/// 7. Credits are positive, difficulty is in `0..=10`, estimated grades in
///    `[0, 4]`.
pub fn validate(
    catalog: &Catalog,
    groups: &GroupRegistry,
    params: &PlannerParams,
) -> ValidationResult {
    let mut errors = Vec::new();

    for course in catalog.iter() {
        let mut referenced: BTreeSet<&str> = BTreeSet::new();
        for clause in &course.prereqs {
            referenced.extend(clause.iter().map(String::as_str));
        }
        referenced.extend(course.coreqs.iter().map(String::as_str));
        for code in referenced {
            if catalog.by_code(code).is_none() {
                errors.push(ValidationError::new(
                    ValidationErrorKind::UnknownCourseReference,
                    format!(
                        "course {} requires unknown course `{code}`",
                        course.code
                    ),
                ));
            }
        }
        if course.credits == 0 {
            errors.push(ValidationError::new(
                ValidationErrorKind::InvalidCourseAttribute,
                format!("course {} has zero credits", course.code),
            ));
        }
        if course.difficulty > 10 {
            errors.push(ValidationError::new(
                ValidationErrorKind::InvalidCourseAttribute,
                format!(
                    "course {} has difficulty {} (expected 0..=10)",
                    course.code, course.difficulty
                ),
            ));
        }
        if !(0.0..=4.0).contains(&course.estimated_grade) {
            errors.push(ValidationError::new(
                ValidationErrorKind::InvalidCourseAttribute,
                format!(
                    "course {} has estimated grade {} (expected 0..=4)",
                    course.code, course.estimated_grade
                ),
            ));
        }
    }

    for group in groups.iter() {
        for code in &group.members {
            if catalog.by_code(code).is_none() {
                errors.push(ValidationError::new(
                    ValidationErrorKind::UnknownCourseReference,
                    format!("group {} lists unknown course `{code}`", group.name),
                ));
            }
        }
        match group.kind() {
            GroupKind::Capstone if group.members.len() != 1 => {
                errors.push(ValidationError::new(
                    ValidationErrorKind::BadGroupArity,
                    format!(
                        "capstone group {} must have exactly 1 member, has {}",
                        group.name,
                        group.members.len()
                    ),
                ));
            }
            GroupKind::SoftOrder if group.members.len() != 2 => {
                errors.push(ValidationError::new(
                    ValidationErrorKind::BadGroupArity,
                    format!(
                        "soft-order group {} must have exactly 2 members, has {}",
                        group.name,
                        group.members.len()
                    ),
                ));
            }
            _ => {}
        }
    }

    for band in ["L4", "L5", "L6"] {
        if groups.get(band).is_none() {
            errors.push(ValidationError::new(
                ValidationErrorKind::MissingLevelBand,
                format!("level band group `{band}` is missing"),
            ));
        }
    }

    if catalog.by_code(&params.thesis_code).is_none() {
        errors.push(ValidationError::new(
            ValidationErrorKind::UnknownThesisCourse,
            format!("thesis course `{}` is not in the catalog", params.thesis_code),
        ));
    }

    for rule in &params.programs_to_maximize {
        if let Some(exception) = &rule.exception_group {
            if groups.get(exception).is_none() {
                errors.push(ValidationError::new(
                    ValidationErrorKind::UnknownExceptionGroup,
                    format!(
                        "program code {} names unknown exception group `{exception}`",
                        rule.code
                    ),
                ));
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
