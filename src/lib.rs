//! Course-schedule optimization core for university degree planning.
//!
//! Given a course catalog (credits, CNF prerequisites, co-requisites,
//! offering rules, difficulty), a registry of typed course groups encoding
//! degree-program rules, a program-wide parameter set and one student's
//! input, this crate assembles a Mixed-Integer Linear Program whose optimal
//! solution assigns every selected course to a future term - or reports
//! that no feasible schedule exists.
//!
//! # Modules
//!
//! - **`models`**: domain types - [`AcademicCalendar`](models::AcademicCalendar),
//!   [`Catalog`](models::Catalog), [`GroupRegistry`](models::GroupRegistry),
//!   [`PlannerParams`](models::PlannerParams),
//!   [`StudentInput`](models::StudentInput), [`SchedulePlan`](models::SchedulePlan)
//! - **`validation`**: integrity checks (unknown codes, group arities,
//!   level bands) run before any model is emitted
//! - **`solver`**: the model builder, the LP-format model artifact, the
//!   HiGHS-backed driver and the [`Planner`](solver::Planner) facade
//!
//! # Flow
//!
//! Catalog, groups and parameters load once at startup and stay immutable;
//! each run gathers a fresh `StudentInput`, builds the model, solves, and
//! returns a `SchedulePlan`. A solve is strictly single-threaded and owns
//! its solver session exclusively.

pub mod error;
pub mod models;
pub mod solver;
pub mod validation;

pub use error::{PlanError, Result};
pub use models::{
    AcademicCalendar, Catalog, Course, CourseGroup, GroupRegistry, PlannerParams, SchedulePlan,
    StudentInput,
};
pub use solver::{ModelBuilder, Planner, SolverDriver};
