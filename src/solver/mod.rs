//! Model construction and solving.
//!
//! [`ModelBuilder`] turns the immutable problem data plus one student's
//! input into a typed MILP ([`LpModel`]); [`SolverDriver`] writes the model
//! artifact, solves through HiGHS and parses the optimal assignment back
//! into a [`SchedulePlan`](crate::models::SchedulePlan). [`Planner`] ties
//! the pieces together for the common load-once, solve-per-student flow.

mod builder;
mod driver;
mod lp;

pub use builder::ModelBuilder;
pub use driver::{SolveOptions, SolverDriver};
pub use lp::{LpConstraint, LpModel, LpVar, Sense, VarId, VarKind};

use std::path::Path;

use log::info;

use crate::error::{PlanError, Result};
use crate::models::{AcademicCalendar, Catalog, GroupRegistry, PlannerParams, SchedulePlan, StudentInput};
use crate::validation;

/// Load-once facade over the immutable problem data.
///
/// Construction validates integrity (unknown codes, group arities, level
/// bands, thesis course); afterwards any number of students can be planned
/// against the same data, one solve at a time.
#[derive(Debug, Clone)]
pub struct Planner {
    catalog: Catalog,
    groups: GroupRegistry,
    params: PlannerParams,
    calendar: AcademicCalendar,
}

impl Planner {
    /// Creates a planner, refusing structurally broken data.
    pub fn new(
        catalog: Catalog,
        groups: GroupRegistry,
        params: PlannerParams,
        calendar: AcademicCalendar,
    ) -> Result<Self> {
        validation::validate(&catalog, &groups, &params)
            .map_err(PlanError::CatalogIntegrity)?;
        Ok(Self {
            catalog,
            groups,
            params,
            calendar,
        })
    }

    /// Performs the startup reads from a program data directory:
    /// `params.props`, `cls.csv`, every `*.grp` file and, when present,
    /// `estimated_grades.txt`.
    pub fn load_dir(dir: impl AsRef<Path>, calendar: AcademicCalendar) -> Result<Self> {
        let dir = dir.as_ref();
        let params = PlannerParams::from_path(dir.join("params.props"))?;
        let mut catalog = Catalog::from_path(dir.join("cls.csv"))?;

        let mut groups = GroupRegistry::new();
        let mut group_files: Vec<_> = std::fs::read_dir(dir)
            .map_err(|e| PlanError::io(dir.display().to_string(), e))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.extension().is_some_and(|ext| ext == "grp"))
            .collect();
        group_files.sort();
        for path in group_files {
            groups.add_from_path(&path)?;
        }

        let grades_path = dir.join("estimated_grades.txt");
        if grades_path.exists() {
            let text = std::fs::read_to_string(&grades_path)
                .map_err(|e| PlanError::io(grades_path.display().to_string(), e))?;
            catalog.apply_estimated_grades(
                &text,
                params.min_grade_threshold,
                &grades_path.display().to_string(),
            )?;
        }

        info!(
            "loaded program data: {} courses, {} groups",
            catalog.len(),
            groups.len()
        );
        Self::new(catalog, groups, params, calendar)
    }

    /// The course catalog.
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// The group registry.
    pub fn groups(&self) -> &GroupRegistry {
        &self.groups
    }

    /// The planning parameters.
    pub fn params(&self) -> &PlannerParams {
        &self.params
    }

    /// The academic calendar.
    pub fn calendar(&self) -> &AcademicCalendar {
        &self.calendar
    }

    /// Plans one student with default artifact paths.
    pub fn plan(&self, input: &StudentInput) -> Result<SchedulePlan> {
        self.plan_with(input, &SolverDriver::new())
    }

    /// Plans one student using the given driver.
    ///
    /// Desired codes already passed are dropped before the model is built.
    pub fn plan_with(&self, input: &StudentInput, driver: &SolverDriver) -> Result<SchedulePlan> {
        let mut input = input.clone();
        input.normalize();
        let model = ModelBuilder::new(
            &self.catalog,
            &self.groups,
            &self.params,
            &self.calendar,
            &input,
        )
        .build()?;
        driver.solve(&model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Course, CourseGroup, ObjectiveWeights};

    const PARAMS: &str = "\
Tc=6
Cmax=12
CmaxHonor=15
SummerCmax=12
SummerCmaxHonor=15
Smax=4
MaxLETerm=4
SummerConcNMax=-1
ThesisCourseCode=TH4999
";

    const COURSES: &str = "\
# code;title;synonyms;credits;prereqs;coreqs;terms;display;difficulty
AA1000;Basics;;3;;;alltimes;;
BB2000;Advanced;;3;AA1000;;alltimes;;
TH4999;Senior Thesis;;3;;;alltimes;;
L9999;Band Filler;;3;;;alltimes;;
";

    fn write_program_dir(name: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("degree_plan_dir_{name}"));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("params.props"), PARAMS).unwrap();
        std::fs::write(dir.join("cls.csv"), COURSES).unwrap();
        for band in ["L4", "L5", "L6"] {
            std::fs::write(
                dir.join(format!("{band}.grp")),
                format!("{band};false;0;0\nL9999\n"),
            )
            .unwrap();
        }
        std::fs::write(dir.join("estimated_grades.txt"), "AA1000,3.6\n").unwrap();
        dir
    }

    fn sample_planner(name: &str) -> Planner {
        let calendar = AcademicCalendar::new(15, 9, 2023);
        Planner::load_dir(write_program_dir(name), calendar).unwrap()
    }

    #[test]
    fn test_load_dir_reads_everything() {
        let planner = sample_planner("load");
        assert_eq!(planner.catalog().len(), 4);
        assert_eq!(planner.groups().len(), 3);
        assert_eq!(planner.params().total_credits, 6);
        // The grade estimate cleared its threshold.
        assert_eq!(planner.catalog().by_code("AA1000").unwrap().estimated_grade, 3.6);
    }

    #[test]
    fn test_new_rejects_broken_registry() {
        let calendar = AcademicCalendar::new(15, 9, 2023);
        let mut catalog = Catalog::new();
        catalog
            .add(Course::new("AA1000", "Basics", 3).with_offering("alltimes"))
            .unwrap();
        let params = PlannerParams::parse(PARAMS, "params.props").unwrap();
        // No level bands, unknown thesis course.
        let err = Planner::new(catalog, GroupRegistry::new(), params, calendar).unwrap_err();
        assert!(matches!(err, PlanError::CatalogIntegrity(_)));
    }

    #[test]
    fn test_plan_end_to_end() {
        let planner = sample_planner("plan");
        let mut input =
            StudentInput::new("General").with_weights(ObjectiveWeights::new(1, 0, 1, 0));
        input.desire("BB2000");
        input.add_passed("AA1000");
        // Redundant desire of a passed course is dropped by normalization.
        input.desire("AA1000");

        let tmp = std::env::temp_dir();
        let driver = SolverDriver::new()
            .with_model_path(tmp.join("degree_plan_planner.lp"))
            .with_vars_path(tmp.join("degree_plan_planner.out"));
        let plan = planner.plan_with(&input, &driver).unwrap();
        let a = planner.catalog().id_of("AA1000").unwrap();
        let b = planner.catalog().id_of("BB2000").unwrap();
        assert_eq!(plan.term_of(a), Some(0));
        assert_eq!(plan.term_of(b), Some(1));
        assert_eq!(plan.credits_taken_so_far(planner.catalog()), 3);
        assert_eq!(plan.credits_to_take(planner.catalog()), 3);
    }

    #[test]
    fn test_concentration_areas_listing() {
        let planner = {
            let calendar = AcademicCalendar::new(15, 9, 2023);
            let mut catalog = Catalog::new();
            for code in ["AA1000", "TH4999"] {
                catalog
                    .add(Course::new(code, "Course", 3).with_offering("alltimes"))
                    .unwrap();
            }
            let groups = GroupRegistry::new()
                .with_group(CourseGroup::new("L4", vec!["AA1000".into()]))
                .with_group(CourseGroup::new("L5", vec!["AA1000".into()]))
                .with_group(CourseGroup::new("L6", vec!["AA1000".into()]))
                .with_group(
                    CourseGroup::new("Systems Core", vec!["AA1000".into()]).concentration(),
                );
            let params = PlannerParams::parse(PARAMS, "params.props").unwrap();
            Planner::new(catalog, groups, params, calendar).unwrap()
        };
        assert_eq!(planner.groups().concentration_areas(), vec!["Systems"]);
    }
}
