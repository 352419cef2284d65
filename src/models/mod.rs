//! Planning domain models.
//!
//! The read-only problem data (calendar, catalog, groups, parameters), the
//! per-solve student input, and the solution type. Everything here is plain
//! data with small pure queries; model construction and solving live in
//! [`crate::solver`].

mod calendar;
mod course;
mod group;
mod params;
mod plan;
mod student;

pub use calendar::{AcademicCalendar, Season};
pub use course::{Catalog, Course, CourseId};
pub use group::{discipline_of, CountRule, CourseGroup, CreditRule, GroupKind, GroupRegistry};
pub use params::{PlannerParams, ProgramCodeRule};
pub use plan::SchedulePlan;
pub use student::{CountExpr, ObjectiveWeights, StudentInput};
