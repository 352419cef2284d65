//! Solving the assembled model and parsing the result.
//!
//! The driver owns the two on-disk artifacts of a solve: the model itself
//! in LP format (written before solving, and the first place to look when a
//! solve goes wrong) and the variable dump (`name=value`, one per line,
//! written after an optimal solve). The actual optimization runs in-process
//! through `good_lp` on the HiGHS backend.
//!
//! No retries, no partial-solution salvage: a non-optimal status surfaces
//! as [`PlanError::Infeasible`] and anything else verbatim as
//! [`PlanError::Solver`].

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::time::Instant;

use good_lp::{
    constraint, default_solver, variable, Expression, ProblemVariables, ResolutionError,
    Solution, SolverModel, Variable,
};
use log::info;

use crate::error::{PlanError, Result};
use crate::models::SchedulePlan;
use crate::solver::lp::{LpModel, Sense, VarKind};

/// Artifact locations for one solve.
#[derive(Debug, Clone)]
pub struct SolveOptions {
    /// Where the LP-format model artifact is written.
    pub model_path: PathBuf,
    /// Where the `name=value` variable artifact is written.
    pub vars_path: PathBuf,
}

impl Default for SolveOptions {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("schedule.lp"),
            vars_path: PathBuf::from("schedule_result_vars.out"),
        }
    }
}

/// Runs the MILP solver on an assembled model.
#[derive(Debug, Clone, Default)]
pub struct SolverDriver {
    options: SolveOptions,
}

impl SolverDriver {
    /// Creates a driver writing artifacts to the default paths.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the model artifact path.
    pub fn with_model_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.options.model_path = path.into();
        self
    }

    /// Sets the variable artifact path.
    pub fn with_vars_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.options.vars_path = path.into();
        self
    }

    /// Solves the model and parses the optimal assignment into a plan.
    ///
    /// Writes the model artifact first in any case; writes the variable
    /// artifact only on success.
    pub fn solve(&self, model: &LpModel) -> Result<SchedulePlan> {
        model.write_to_path(&self.options.model_path)?;
        let started = Instant::now();

        let mut problem_vars = ProblemVariables::new();
        let mut handles: Vec<Variable> = Vec::with_capacity(model.num_vars());
        for (_, var) in model.vars() {
            let definition = match var.kind {
                VarKind::Binary => variable().binary(),
                VarKind::Continuous => variable().min(0.0),
            };
            handles.push(problem_vars.add(definition.name(var.name.clone())));
        }

        let mut objective = Expression::from(0.0);
        for &(coefficient, var) in model.objective() {
            objective += coefficient * handles[var];
        }

        let mut problem = problem_vars.minimise(objective).using(default_solver);
        for row in model.constraints() {
            let mut lhs = Expression::from(0.0);
            for &(coefficient, var) in &row.terms {
                lhs += coefficient * handles[var];
            }
            let constraint = match row.sense {
                Sense::Le => constraint::leq(lhs, row.rhs),
                Sense::Ge => constraint::geq(lhs, row.rhs),
                Sense::Eq => constraint::eq(lhs, row.rhs),
            };
            problem = problem.with(constraint);
        }

        let solution = match problem.solve() {
            Ok(solution) => solution,
            Err(ResolutionError::Infeasible) | Err(ResolutionError::Unbounded) => {
                return Err(PlanError::Infeasible);
            }
            Err(other) => {
                return Err(PlanError::Solver {
                    message: other.to_string(),
                    model_path: self.options.model_path.display().to_string(),
                });
            }
        };
        info!(
            "schedule computed in {} ms ({} vars, {} constraints)",
            started.elapsed().as_millis(),
            model.num_vars(),
            model.num_constraints()
        );

        let mut dump = String::new();
        let mut plan = SchedulePlan::new();
        for (id, var) in model.vars() {
            let value = solution.value(handles[id]).round() as i64;
            let _ = writeln!(dump, "{}={value}", var.name);
            if value == 1 {
                if let Some((course, term)) = parse_slot_var(&var.name) {
                    plan.assign(course, term);
                }
            }
        }
        write_text(&self.options.vars_path, &dump)?;
        Ok(plan)
    }
}

/// Parses an `x_<course>_<term>` name; plain `x_<course>` and the
/// continuous variables fall through.
fn parse_slot_var(name: &str) -> Option<(usize, u32)> {
    let mut parts = name.split('_');
    if parts.next() != Some("x") {
        return None;
    }
    let course = parts.next()?.parse().ok()?;
    let term = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some((course, term))
}

fn write_text(path: &Path, text: &str) -> Result<()> {
    std::fs::write(path, text).map_err(|e| PlanError::io(path.display().to_string(), e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        AcademicCalendar, Catalog, Course, CourseGroup, CourseId, CountRule, CreditRule,
        GroupRegistry, ObjectiveWeights, PlannerParams, StudentInput,
    };
    use crate::solver::builder::ModelBuilder;

    fn test_params(total_credits: u32, smax: u32, thesis: &str) -> PlannerParams {
        PlannerParams {
            total_credits,
            cmax: 12,
            cmax_honor: 15,
            summer_cmax: 12,
            summer_cmax_honor: 15,
            smax,
            max_le_term: smax,
            summer_conc_max: -1,
            thesis_code: thesis.into(),
            freshman_max_courses_per_term: None,
            min_courses_for_sophomore: 0,
            programs_to_maximize: Vec::new(),
            program_code: None,
            csv_header: None,
            min_grade_threshold: 3.0,
            allow_edit: false,
        }
    }

    /// Every test catalog carries a thesis placeholder nothing selects.
    fn add_thesis(catalog: &mut Catalog) {
        catalog
            .add(Course::new("TH4999", "Senior Thesis", 3).with_offering("alltimes"))
            .unwrap();
    }

    fn driver(name: &str) -> SolverDriver {
        let dir = std::env::temp_dir();
        SolverDriver::new()
            .with_model_path(dir.join(format!("degree_plan_{name}.lp")))
            .with_vars_path(dir.join(format!("degree_plan_{name}.out")))
    }

    fn solve(
        name: &str,
        catalog: &Catalog,
        groups: &GroupRegistry,
        params: &PlannerParams,
        calendar: &AcademicCalendar,
        input: &StudentInput,
    ) -> Result<SchedulePlan> {
        let model = ModelBuilder::new(catalog, groups, params, calendar, input).build()?;
        driver(name).solve(&model)
    }

    /// Minimize time and credits: the plan takes only what it must, as
    /// early as it can.
    fn lean_weights() -> ObjectiveWeights {
        ObjectiveWeights::new(1, 0, 1, 0)
    }

    #[test]
    fn test_trivial_plan_orders_prerequisite_chain() {
        // Fall 2023: slot 1 is SP2024, slot 2 is S12024.
        let calendar = AcademicCalendar::new(15, 9, 2023);
        let mut catalog = Catalog::new();
        let a = catalog
            .add(Course::new("AA1000", "Basics", 3).with_offering("alltimes"))
            .unwrap();
        let b = catalog
            .add(
                Course::new("BB2000", "Advanced", 3)
                    .with_offering("alltimes")
                    .with_prereq_clause(["AA1000"]),
            )
            .unwrap();
        add_thesis(&mut catalog);
        let groups = GroupRegistry::new();
        let params = test_params(6, 4, "TH4999");
        let mut input = StudentInput::new("General").with_weights(lean_weights());
        input.desire("BB2000");

        let plan = solve("trivial", &catalog, &groups, &params, &calendar, &input).unwrap();
        assert_eq!(plan.term_of(a), Some(1));
        assert_eq!(plan.term_of(b), Some(2));
        assert_eq!(plan.len(), 2);
        assert_eq!(plan.credits_to_take(&catalog), 6);
    }

    #[test]
    fn test_corequisite_shares_the_term() {
        let calendar = AcademicCalendar::new(15, 9, 2023);
        let mut catalog = Catalog::new();
        let c = catalog
            .add(Course::new("CC1000", "Companion", 3).with_offering("alltimes"))
            .unwrap();
        let d = catalog
            .add(
                Course::new("DD1000", "Dependent", 3)
                    .with_offering("alltimes")
                    .with_coreq("CC1000"),
            )
            .unwrap();
        add_thesis(&mut catalog);
        let groups = GroupRegistry::new();
        let params = test_params(6, 2, "TH4999");
        let mut input = StudentInput::new("General").with_weights(lean_weights());
        input.desire("DD1000");

        let plan = solve("coreq", &catalog, &groups, &params, &calendar, &input).unwrap();
        assert_eq!(plan.term_of(c), Some(1));
        assert_eq!(plan.term_of(d), Some(1));
    }

    #[test]
    fn test_exact_count_group_with_passed_member() {
        let calendar = AcademicCalendar::new(15, 9, 2023);
        let mut catalog = Catalog::new();
        let mut ids = Vec::new();
        for code in ["XX1000", "YY1000", "ZZ1000"] {
            ids.push(
                catalog
                    .add(Course::new(code, "Pick", 3).with_offering("alltimes"))
                    .unwrap(),
            );
        }
        add_thesis(&mut catalog);
        let groups = GroupRegistry::new().with_group(
            CourseGroup::new(
                "picks",
                vec!["XX1000".into(), "YY1000".into(), "ZZ1000".into()],
            )
            .with_count(CountRule::Exactly(2)),
        );
        let params = test_params(6, 4, "TH4999");
        let input = StudentInput::new("General")
            .with_weights(lean_weights())
            .with_passed(["XX1000"]);

        let plan = solve("xor", &catalog, &groups, &params, &calendar, &input).unwrap();
        assert_eq!(plan.term_of(ids[0]), Some(0)); // passed X
        let future: Vec<CourseId> = [ids[1], ids[2]]
            .into_iter()
            .filter(|&id| plan.term_of(id).is_some_and(|t| t >= 1))
            .collect();
        assert_eq!(future.len(), 1, "exactly one of Y, Z is scheduled");
    }

    #[test]
    fn test_per_term_group_cap_spreads_courses() {
        // June 2023 (Summer Term): slots are FA2023, SP2024, S12024 - no
        // summer window inside the horizon until slot 3 alone.
        let calendar = AcademicCalendar::new(20, 6, 2023);
        let mut catalog = Catalog::new();
        let mut ids = Vec::new();
        for code in ["MM1000", "NN1000", "OO1000"] {
            ids.push(
                catalog
                    .add(Course::new(code, "Lab", 3).with_offering("alltimes"))
                    .unwrap(),
            );
        }
        add_thesis(&mut catalog);
        let groups = GroupRegistry::new().with_group(
            CourseGroup::new(
                "labs",
                vec!["MM1000".into(), "NN1000".into(), "OO1000".into()],
            )
            .with_count(CountRule::PerTermMax(1)),
        );
        let params = test_params(9, 3, "TH4999");
        let mut input = StudentInput::new("General").with_weights(lean_weights());
        for code in ["MM1000", "NN1000", "OO1000"] {
            input.desire(code);
        }

        let plan = solve("spread", &catalog, &groups, &params, &calendar, &input).unwrap();
        let mut terms: Vec<u32> = ids.iter().map(|&id| plan.term_of(id).unwrap()).collect();
        terms.sort_unstable();
        assert_eq!(terms, vec![1, 2, 3], "one lab per term");
    }

    #[test]
    fn test_soft_order_keeps_distance() {
        let calendar = AcademicCalendar::new(15, 9, 2023);
        let mut catalog = Catalog::new();
        let p = catalog
            .add(Course::new("PP1000", "First", 3).with_offering("alltimes"))
            .unwrap();
        let q = catalog
            .add(Course::new("QQ1000", "Second", 3).with_offering("alltimes"))
            .unwrap();
        add_thesis(&mut catalog);
        let groups = GroupRegistry::new().with_group(
            CourseGroup::new("softorder-pq", vec!["PP1000".into(), "QQ1000".into()])
                .with_count(CountRule::AtLeast(2)),
        );
        let params = test_params(6, 6, "TH4999");
        let mut input = StudentInput::new("General").with_weights(lean_weights());
        input.desire("PP1000");
        input.desire("QQ1000");

        let plan = solve("softorder", &catalog, &groups, &params, &calendar, &input).unwrap();
        let tp = plan.term_of(p).unwrap();
        let tq = plan.term_of(q).unwrap();
        assert!(tp < tq, "PP before QQ (got {tp} and {tq})");
        assert!(tq - tp <= 2, "within the distance bound (got {tp}, {tq})");
    }

    #[test]
    fn test_capstone_waits_for_credits() {
        let calendar = AcademicCalendar::new(15, 9, 2023);
        let mut catalog = Catalog::new();
        for i in 0..40 {
            catalog
                .add(Course::new(format!("CC{i:02}00"), "Filler", 3).with_offering("alltimes"))
                .unwrap();
        }
        let k = catalog
            .add(Course::new("KK4900", "Capstone", 3).with_offering("alltimes"))
            .unwrap();
        add_thesis(&mut catalog);
        let groups = GroupRegistry::new().with_group(
            CourseGroup::new("capstoneKK", vec!["KK4900".into()])
                .with_credits(CreditRule::AtLeast(90)),
        );
        let mut params = test_params(93, 8, "TH4999");
        params.cmax = 30;
        params.summer_cmax = 30;
        let mut input = StudentInput::new("General")
            .with_weights(lean_weights())
            .with_max_courses_per_term(10);
        input.desire("KK4900");

        let plan = solve("capstone", &catalog, &groups, &params, &calendar, &input).unwrap();
        let tk = plan.term_of(k).expect("capstone scheduled");
        let latest = plan.iter().map(|(_, t)| t).max().unwrap();
        assert_eq!(tk, latest, "capstone sits in the latest used slot");
        let before: usize = plan.iter().filter(|&(id, t)| id != k && t < tk).count();
        assert!(before >= 30, "at least 30 courses precede, got {before}");
        assert!(plan.total_credits(&catalog) >= 93);
    }

    #[test]
    fn test_infeasible_when_credits_unreachable() {
        let calendar = AcademicCalendar::new(15, 9, 2023);
        let mut catalog = Catalog::new();
        catalog
            .add(Course::new("AA1000", "Only", 3).with_offering("alltimes"))
            .unwrap();
        let groups = GroupRegistry::new();
        let params = test_params(6, 4, "AA1000");
        let input = StudentInput::new("General").with_weights(lean_weights());

        let err = solve("infeasible", &catalog, &groups, &params, &calendar, &input).unwrap_err();
        assert!(matches!(err, PlanError::Infeasible));
    }

    #[test]
    fn test_artifacts_are_written() {
        let calendar = AcademicCalendar::new(15, 9, 2023);
        let mut catalog = Catalog::new();
        let a = catalog
            .add(Course::new("AA1000", "Basics", 3).with_offering("alltimes"))
            .unwrap();
        add_thesis(&mut catalog);
        let groups = GroupRegistry::new();
        let params = test_params(3, 2, "TH4999");
        let mut input = StudentInput::new("General").with_weights(lean_weights());
        input.desire("AA1000");

        let d = driver("artifacts");
        let model = ModelBuilder::new(&catalog, &groups, &params, &calendar, &input)
            .build()
            .unwrap();
        let plan = d.solve(&model).unwrap();
        assert_eq!(plan.term_of(a), Some(1));

        let lp = std::fs::read_to_string(std::env::temp_dir().join("degree_plan_artifacts.lp"))
            .unwrap();
        assert!(lp.starts_with("Minimize"));
        assert!(lp.contains("Subject To"));
        let vars = std::fs::read_to_string(std::env::temp_dir().join("degree_plan_artifacts.out"))
            .unwrap();
        assert!(vars.contains("x_0_1=1"));
        assert!(vars.contains("x_0=1"));
    }
}
