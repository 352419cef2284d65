//! MILP model construction.
//!
//! Translates the catalog, group registry, parameters and one student's
//! input into the scheduling MILP. For each course `i` and slot
//! `s in 0..=Smax` there is a binary `x_{i}_{s}` ("course i taken in slot
//! s", slot 0 being history) and a binary `x_{i}` ("course i is in the plan
//! at all"), linked by `sum_s x_{i}_{s} = x_{i}`. Two continuous variables
//! close the objective: `D` bounds the latest used term and `DL` the
//! per-term difficulty load.
//!
//! Constraint families emit in a fixed order with one section banner each,
//! so two runs over the same inputs produce byte-identical model artifacts.
//!
//! # Summer lag
//!
//! A requirement feeding a Summer-Term slot must be finished three slots
//! earlier (S1 and S2 sit between the last regular term and ST on the slot
//! axis, and ST overlaps both); every other slot looks back one slot. The
//! `completion_lag` helper encodes this and every gate family uses it.

use std::collections::BTreeSet;

use log::debug;

use crate::error::{PlanError, Result};
use crate::models::{
    AcademicCalendar, Catalog, CountExpr, CountRule, CourseGroup, CourseId, CreditRule,
    GroupKind, GroupRegistry, PlannerParams, SchedulePlan, StudentInput,
};
use crate::solver::lp::{LpModel, Sense, VarId};

/// Last-resort objective bonus for courses from a designated program code.
const PROGRAM_CODE_BONUS: f64 = -0.001;

/// Builds the scheduling MILP for one student.
pub struct ModelBuilder<'a> {
    catalog: &'a Catalog,
    groups: &'a GroupRegistry,
    params: &'a PlannerParams,
    calendar: &'a AcademicCalendar,
    input: &'a StudentInput,
    previous: Option<&'a SchedulePlan>,
}

/// Decision-variable handles for one build.
struct Vars {
    /// `x_{i}` per course.
    x: Vec<VarId>,
    /// `x_{i}_{s}` per course and slot (slot 0 = history).
    xs: Vec<Vec<VarId>>,
    /// Latest-used-term proxy `D`.
    d: VarId,
    /// Per-term difficulty load `DL`.
    dl: VarId,
}

impl<'a> ModelBuilder<'a> {
    /// Creates a builder over immutable problem data and one student input.
    pub fn new(
        catalog: &'a Catalog,
        groups: &'a GroupRegistry,
        params: &'a PlannerParams,
        calendar: &'a AcademicCalendar,
        input: &'a StudentInput,
    ) -> Self {
        Self {
            catalog,
            groups,
            params,
            calendar,
            input,
            previous: None,
        }
    }

    /// Supplies the previous solution, used to resolve `allotherterms`
    /// desired-course tokens against the term a course currently sits in.
    pub fn with_previous_plan(mut self, plan: &'a SchedulePlan) -> Self {
        self.previous = Some(plan);
        self
    }

    /// Assembles the complete model.
    pub fn build(&self) -> Result<LpModel> {
        if self.input.concentration.is_empty() {
            return Err(PlanError::parse(
                "student input",
                "concentration area name cannot be empty",
            ));
        }
        let mut model = LpModel::new();
        let vars = self.declare_variables(&mut model);
        self.emit_objective(&mut model, &vars);

        self.emit_completion_bounds(&mut model, &vars);
        self.emit_difficulty_bounds(&mut model, &vars);
        self.emit_offering_availability(&mut model, &vars)?;
        self.emit_prerequisites(&mut model, &vars)?;
        self.emit_corequisites(&mut model, &vars)?;
        self.emit_level_gates(&mut model, &vars)?;
        self.emit_total_credits(&mut model, &vars);
        self.emit_le_deadline(&mut model, &vars)?;
        self.emit_term_credit_caps(&mut model, &vars);
        self.emit_freshman_cap(&mut model, &vars);
        self.emit_student_term_caps(&mut model, &vars);
        self.emit_per_term_expressions(&mut model, &vars)?;
        self.emit_thesis_load(&mut model, &vars)?;
        self.emit_summer_concurrency(&mut model, &vars);
        self.emit_linking(&mut model, &vars);
        self.emit_group_requirements(&mut model, &vars)?;
        self.emit_passed_fixings(&mut model, &vars)?;
        self.emit_desired_fixings(&mut model, &vars)?;
        self.emit_session_toggles(&mut model, &vars);
        self.emit_concentration(&mut model, &vars)?;
        self.emit_capstone_gates(&mut model, &vars)?;
        self.emit_soft_order(&mut model, &vars)?;
        self.emit_ou_annual_caps(&mut model, &vars)?;
        self.emit_honors_restriction(&mut model, &vars)?;

        debug!(
            "assembled model: {} variables, {} constraints",
            model.num_vars(),
            model.num_constraints()
        );
        Ok(model)
    }

    fn smax(&self) -> u32 {
        self.params.smax
    }

    /// Slots a requirement must look back from slot `s`: 3 for Summer-Term
    /// slots, 1 otherwise.
    fn completion_lag(&self, s: u32) -> u32 {
        if self.calendar.is_summer_term(s) {
            3
        } else {
            1
        }
    }

    fn id_of(&self, code: &str, context: &str) -> Result<CourseId> {
        self.catalog.id_of(code).ok_or_else(|| {
            PlanError::parse(context.to_string(), format!("unknown course `{code}`"))
        })
    }

    fn member_ids(&self, group: &CourseGroup) -> Result<Vec<CourseId>> {
        group
            .members
            .iter()
            .map(|code| self.id_of(code, &format!("group {}", group.name)))
            .collect()
    }

    /// The raw numeric payload of a count rule, whatever its flavor.
    fn count_value(rule: CountRule) -> u32 {
        match rule {
            CountRule::AtLeast(n)
            | CountRule::Exactly(n)
            | CountRule::PerTermMax(n)
            | CountRule::AtMostNetOfPassed(n) => n,
        }
    }

    fn credit_value(rule: CreditRule) -> u32 {
        match rule {
            CreditRule::AtLeast(n) => n,
            CreditRule::MinDisciplines(_) => 0,
        }
    }

    fn declare_variables(&self, model: &mut LpModel) -> Vars {
        let smax = self.smax();
        let mut x = Vec::with_capacity(self.catalog.len());
        let mut xs = Vec::with_capacity(self.catalog.len());
        for course in self.catalog.iter() {
            x.push(model.add_binary(format!("x_{}", course.id)));
            let mut slots = Vec::with_capacity(smax as usize + 1);
            for s in 0..=smax {
                slots.push(model.add_binary(format!("x_{}_{s}", course.id)));
            }
            xs.push(slots);
        }
        let d = model.add_continuous("D");
        let dl = model.add_continuous("DL");
        Vars { x, xs, d, dl }
    }

    /// Objective: `DN*D + DL*DL + sum_i c_i x_i` with
    /// `c_i = Cr*credits_i + program bonus + Gr*grade_i` (grade only above
    /// the configured threshold, bonus at most once per course).
    fn emit_objective(&self, model: &mut LpModel, vars: &Vars) {
        let weights = self.input.weights;
        model.objective_term(f64::from(weights.time), vars.d);
        model.objective_term(f64::from(weights.difficulty), vars.dl);
        for course in self.catalog.iter() {
            let mut coefficient = f64::from(weights.credits) * f64::from(course.credits);
            for rule in &self.params.programs_to_maximize {
                if !course.code.starts_with(&rule.code) {
                    continue;
                }
                let excepted = rule
                    .exception_group
                    .as_ref()
                    .and_then(|name| self.groups.get(name))
                    .is_some_and(|g| g.members.iter().any(|m| *m == course.code));
                if !excepted {
                    coefficient += PROGRAM_CODE_BONUS;
                    break;
                }
            }
            if course.estimated_grade >= self.params.min_grade_threshold {
                coefficient += f64::from(weights.grade) * course.estimated_grade;
            }
            model.objective_term(coefficient, vars.x[course.id]);
        }
    }

    /// `s * x_{i,s} - D <= 0` pins `D` to the latest used term.
    fn emit_completion_bounds(&self, model: &mut LpModel, vars: &Vars) {
        model.comment("latest-term bound");
        for i in 0..self.catalog.len() {
            for s in 1..=self.smax() {
                model.constrain(
                    vec![(f64::from(s), vars.xs[i][s as usize]), (-1.0, vars.d)],
                    Sense::Le,
                    0.0,
                );
            }
        }
    }

    /// Per-term difficulty load must stay under `DL`.
    fn emit_difficulty_bounds(&self, model: &mut LpModel, vars: &Vars) {
        model.comment("difficulty load bound");
        for s in 1..=self.smax() {
            let mut terms: Vec<(f64, VarId)> = self
                .catalog
                .iter()
                .map(|c| (f64::from(c.difficulty), vars.xs[c.id][s as usize]))
                .collect();
            terms.push((-1.0, vars.dl));
            model.constrain(terms, Sense::Le, 0.0);
        }
    }

    /// A course may only occupy slots it is offered in.
    fn emit_offering_availability(&self, model: &mut LpModel, vars: &Vars) -> Result<()> {
        model.comment("class availability");
        for course in self.catalog.iter() {
            let offered: BTreeSet<u32> = self
                .catalog
                .terms_offered(course, self.calendar, self.smax())?
                .into_iter()
                .collect();
            for s in 1..=self.smax() {
                let available = if offered.contains(&s) { 1.0 } else { 0.0 };
                model.constrain(
                    vec![(1.0, vars.xs[course.id][s as usize])],
                    Sense::Le,
                    available,
                );
            }
        }
        Ok(())
    }

    /// Each CNF clause needs one member finished sufficiently
    /// earlier.
    fn emit_prerequisites(&self, model: &mut LpModel, vars: &Vars) -> Result<()> {
        model.comment("prerequisites");
        for course in self.catalog.iter() {
            if course.prereqs.is_empty() {
                continue;
            }
            for s in 1..=self.smax() {
                let lag = self.completion_lag(s);
                if s < lag {
                    continue;
                }
                for clause in &course.prereqs {
                    let mut terms = vec![(1.0, vars.xs[course.id][s as usize])];
                    for code in clause {
                        let j = self.id_of(code, &format!("prerequisites of {}", course.code))?;
                        for t in 0..=s - lag {
                            terms.push((-1.0, vars.xs[j][t as usize]));
                        }
                    }
                    model.constrain(terms, Sense::Le, 0.0);
                }
            }
        }
        Ok(())
    }

    /// Co-requisites may also share the slot.
    fn emit_corequisites(&self, model: &mut LpModel, vars: &Vars) -> Result<()> {
        model.comment("corequisites");
        for course in self.catalog.iter() {
            if course.coreqs.is_empty() {
                continue;
            }
            for s in 1..=self.smax() {
                let lag = self.completion_lag(s);
                let mut terms = vec![(1.0, vars.xs[course.id][s as usize])];
                for code in &course.coreqs {
                    let j = self.id_of(code, &format!("corequisites of {}", course.code))?;
                    terms.push((-1.0, vars.xs[j][s as usize]));
                    if s >= lag {
                        for t in 0..=s - lag {
                            terms.push((-1.0, vars.xs[j][t as usize]));
                        }
                    }
                }
                model.constrain(terms, Sense::Le, 0.0);
            }
        }
        Ok(())
    }

    /// Level-band gates. Level-5 courses need four level-4 courses done;
    /// level-6 courses need all level-4 and four level-5.
    fn emit_level_gates(&self, model: &mut LpModel, vars: &Vars) -> Result<()> {
        let Some(l4) = self.groups.get("L4") else {
            return Ok(());
        };
        let l4_ids = self.member_ids(l4)?;

        let gate = |model: &mut LpModel,
                    gated: &[CourseId],
                    required: &[CourseId],
                    needed: f64| {
            for &i in gated {
                for s in 1..=self.smax() {
                    let lag = self.completion_lag(s);
                    let mut terms = vec![(needed, vars.xs[i][s as usize])];
                    if s >= lag {
                        for &j in required {
                            for t in 0..=s - lag {
                                terms.push((-1.0, vars.xs[j][t as usize]));
                            }
                        }
                    }
                    model.constrain(terms, Sense::Le, 0.0);
                }
            }
        };

        model.comment("level-5 gates");
        if let Some(l5) = self.groups.get("L5") {
            gate(model, &self.member_ids(l5)?, &l4_ids, 4.0);
        }
        model.comment("other level-5 gates");
        for group in self.groups.iter() {
            if group.name.starts_with("L5-") {
                gate(model, &self.member_ids(group)?, &l4_ids, 4.0);
            }
        }
        if let Some(l6) = self.groups.get("L6") {
            let l6_ids = self.member_ids(l6)?;
            model.comment("level-6 gates on level-4");
            gate(model, &l6_ids, &l4_ids, l4_ids.len() as f64);
            model.comment("level-6 gates on level-5");
            if let Some(l5) = self.groups.get("L5") {
                gate(model, &l6_ids, &self.member_ids(l5)?, 4.0);
            }
        }
        Ok(())
    }

    /// Graduation credit minimum.
    fn emit_total_credits(&self, model: &mut LpModel, vars: &Vars) {
        model.comment("total credits");
        let terms: Vec<(f64, VarId)> = self
            .catalog
            .iter()
            .map(|c| (f64::from(c.credits), vars.x[c.id]))
            .collect();
        model.constrain(terms, Sense::Ge, f64::from(self.params.total_credits));
    }

    /// LE courses are barred from slots past `MaxLETerm`.
    fn emit_le_deadline(&self, model: &mut LpModel, vars: &Vars) -> Result<()> {
        let Some(le) = self.groups.get("LE") else {
            return Ok(());
        };
        model.comment("LE latest-term limit");
        let ids = self.member_ids(le)?;
        for s in self.params.max_le_term + 1..=self.smax() {
            for &id in &ids {
                model.constrain(vec![(1.0, vars.xs[id][s as usize])], Sense::Eq, 0.0);
            }
        }
        Ok(())
    }

    /// Per-term credit caps; each summer window (S1, S2, ST) is
    /// capped as a whole and then skipped over.
    fn emit_term_credit_caps(&self, model: &mut LpModel, vars: &Vars) {
        model.comment("term credit caps");
        let cmax = self.params.cmax(self.input.honors);
        let summer_cmax = self.params.summer_cmax(self.input.honors);
        let smax = self.smax();
        let mut s = 1;
        while s <= smax {
            if self.calendar.happens_during_summer(s) && summer_cmax > 0 {
                let window_end = smax.min(s + 2);
                let mut terms = Vec::new();
                for s2 in s..=window_end {
                    for course in self.catalog.iter() {
                        terms.push((f64::from(course.credits), vars.xs[course.id][s2 as usize]));
                    }
                }
                model.constrain(terms, Sense::Le, f64::from(summer_cmax));
                s = window_end + 1;
            } else {
                if !self.calendar.happens_during_summer(s) {
                    let terms: Vec<(f64, VarId)> = self
                        .catalog
                        .iter()
                        .map(|c| (f64::from(c.credits), vars.xs[c.id][s as usize]))
                        .collect();
                    model.constrain(terms, Sense::Le, f64::from(cmax));
                }
                s += 1;
            }
        }
    }

    /// First-term course cap for freshmen, unless the student
    /// wrote an explicit expression for term 1.
    fn emit_freshman_cap(&self, model: &mut LpModel, vars: &Vars) {
        let Some(freshman_max) = self.params.freshman_max_courses_per_term else {
            return;
        };
        if self.input.passed.len() as u32 >= self.params.min_courses_for_sophomore {
            return;
        }
        let has_expr = self
            .input
            .per_term_counts
            .get(&1)
            .is_some_and(|e| !e.trim().is_empty());
        if has_expr {
            return;
        }
        model.comment("freshman first-term course cap");
        let terms: Vec<(f64, VarId)> = (0..self.catalog.len())
            .map(|i| (1.0, vars.xs[i][1]))
            .collect();
        model.constrain(terms, Sense::Le, f64::from(freshman_max));
    }

    /// The student's own per-term course cap, skipped on terms
    /// that carry an explicit expression.
    fn emit_student_term_caps(&self, model: &mut LpModel, vars: &Vars) {
        model.comment("per-term course caps");
        for s in 1..=self.smax() {
            let has_expr = self
                .input
                .per_term_counts
                .get(&s)
                .is_some_and(|e| !e.trim().is_empty());
            if has_expr {
                continue;
            }
            let terms: Vec<(f64, VarId)> = (0..self.catalog.len())
                .map(|i| (1.0, vars.xs[i][s as usize]))
                .collect();
            model.constrain(
                terms,
                Sense::Le,
                f64::from(self.input.max_courses_per_term),
            );
        }
    }

    /// Explicit per-term course-count expressions.
    fn emit_per_term_expressions(&self, model: &mut LpModel, vars: &Vars) -> Result<()> {
        for (&term, expr) in &self.input.per_term_counts {
            let Some(parsed) = CountExpr::parse(expr)? else {
                continue;
            };
            if term < 1 || term > self.smax() {
                return Err(PlanError::parse(
                    "per-term course counts",
                    format!("term {term} is outside 1..={}", self.smax()),
                ));
            }
            let terms: Vec<(f64, VarId)> = (0..self.catalog.len())
                .map(|i| (1.0, vars.xs[i][term as usize]))
                .collect();
            let (sense, bound) = match parsed {
                CountExpr::Exactly(n) => (Sense::Eq, n),
                CountExpr::AtMost(n) => (Sense::Le, n),
                CountExpr::AtLeast(n) => (Sense::Ge, n),
            };
            model.constrain(terms, sense, f64::from(bound));
        }
        Ok(())
    }

    /// During the thesis term at most
    /// `max_courses_during_thesis - 1` other courses run alongside.
    fn emit_thesis_load(&self, model: &mut LpModel, vars: &Vars) -> Result<()> {
        model.comment("thesis-term course cap");
        let theta = self.id_of(&self.params.thesis_code, "thesis course")?;
        let cmax = f64::from(self.params.cmax(self.input.honors));
        let companions = f64::from(self.input.max_courses_during_thesis.max(1) - 1);
        // With x_theta_s = 1 the big coefficient eats cmax - companions of
        // the budget; without it the row is the trivial course-count bound.
        let big = cmax - companions;
        for s in 1..=self.smax() {
            let terms: Vec<(f64, VarId)> = (0..self.catalog.len())
                .map(|i| {
                    let coefficient = if i == theta { big } else { 1.0 };
                    (coefficient, vars.xs[i][s as usize])
                })
                .collect();
            model.constrain(terms, Sense::Le, cmax);
        }
        Ok(())
    }

    /// Concurrent-course caps across overlapping summer
    /// sessions (S1 with ST, S2 with ST).
    fn emit_summer_concurrency(&self, model: &mut LpModel, vars: &Vars) {
        if self.params.summer_conc_max < 0 {
            return;
        }
        model.comment("summer concurrency caps");
        let nmax = f64::from(self.params.summer_conc_max);
        let smax = self.smax();
        let mut s = 1;
        while s <= smax {
            if self.calendar.happens_during_summer(s) && s + 2 <= smax {
                let st = s + 2;
                for first in [s, s + 1] {
                    let mut terms: Vec<(f64, VarId)> = (0..self.catalog.len())
                        .map(|i| (1.0, vars.xs[i][first as usize]))
                        .collect();
                    terms.extend((0..self.catalog.len()).map(|i| (1.0, vars.xs[i][st as usize])));
                    model.constrain(terms, Sense::Le, nmax);
                }
                s += 3;
            } else {
                s += 1;
            }
        }
    }

    /// `sum_s x_{i,s} = x_i`: a course is in the plan iff it has a slot.
    fn emit_linking(&self, model: &mut LpModel, vars: &Vars) {
        model.comment("slot-selection linking");
        for i in 0..self.catalog.len() {
            let mut terms: Vec<(f64, VarId)> = (0..=self.smax())
                .map(|s| (1.0, vars.xs[i][s as usize]))
                .collect();
            terms.push((-1.0, vars.x[i]));
            model.constrain(terms, Sense::Eq, 0.0);
        }
    }

    /// Generic group requirements. Concentration, capstone,
    /// soft-order and OU groups are handled by their own families below.
    fn emit_group_requirements(&self, model: &mut LpModel, vars: &Vars) -> Result<()> {
        for group in self.groups.iter() {
            if group.is_concentration_area {
                continue;
            }
            match group.kind() {
                GroupKind::Capstone | GroupKind::SoftOrder | GroupKind::OuAnnual => continue,
                _ => {}
            }
            model.comment(format!("group {}", group.name));
            match group.count {
                CountRule::AtLeast(n) if n > 0 => {
                    let terms: Vec<(f64, VarId)> = self
                        .member_ids(group)?
                        .into_iter()
                        .map(|id| (1.0, vars.x[id]))
                        .collect();
                    model.constrain(terms, Sense::Ge, f64::from(n));
                }
                CountRule::AtLeast(_) => {}
                CountRule::Exactly(n) => {
                    let (remaining, bound) = self.drop_passed_members(group, n)?;
                    if !remaining.is_empty() {
                        let terms: Vec<(f64, VarId)> =
                            remaining.into_iter().map(|id| (1.0, vars.x[id])).collect();
                        model.constrain(terms, Sense::Eq, f64::from(bound));
                    }
                }
                CountRule::PerTermMax(n) => {
                    self.emit_per_term_group_cap(model, vars, group, n)?;
                }
                CountRule::AtMostNetOfPassed(n) => {
                    let (remaining, bound) = self.drop_passed_members(group, n)?;
                    if bound > 0 && !remaining.is_empty() {
                        let terms: Vec<(f64, VarId)> =
                            remaining.into_iter().map(|id| (1.0, vars.x[id])).collect();
                        model.constrain(terms, Sense::Le, f64::from(bound));
                    }
                }
            }
            if let CreditRule::AtLeast(credits) = group.credits {
                if credits > 0 {
                    let mut terms = Vec::new();
                    for id in self.member_ids(group)? {
                        if let Some(course) = self.catalog.get(id) {
                            terms.push((f64::from(course.credits), vars.x[id]));
                        }
                    }
                    model.constrain(terms, Sense::Ge, f64::from(credits));
                }
            }
            // CreditRule::MinDisciplines is declared by the file format but
            // deliberately emits nothing.
        }
        Ok(())
    }

    /// Deduplicates a group's members, removes passed ones and decrements
    /// the bound accordingly, floored at zero.
    fn drop_passed_members(
        &self,
        group: &CourseGroup,
        bound: u32,
    ) -> Result<(Vec<CourseId>, u32)> {
        let unique: BTreeSet<&String> = group.members.iter().collect();
        let mut remaining = Vec::new();
        let mut bound = i64::from(bound);
        for code in unique {
            if self.input.passed.contains(code.as_str()) {
                bound -= 1;
            } else {
                remaining.push(self.id_of(code, &format!("group {}", group.name))?);
            }
        }
        Ok((remaining, bound.max(0) as u32))
    }

    /// Per-term group cap, collapsing each summer window into one row.
    fn emit_per_term_group_cap(
        &self,
        model: &mut LpModel,
        vars: &Vars,
        group: &CourseGroup,
        cap: u32,
    ) -> Result<()> {
        let unique: BTreeSet<CourseId> = self.member_ids(group)?.into_iter().collect();
        let smax = self.smax();
        let mut s = 1;
        while s <= smax {
            let mut terms = Vec::new();
            let next = if self.calendar.happens_during_summer(s) {
                let window_end = smax.min(s + 2);
                for s2 in s..=window_end {
                    for &id in &unique {
                        terms.push((1.0, vars.xs[id][s2 as usize]));
                    }
                }
                window_end + 1
            } else {
                for &id in &unique {
                    terms.push((1.0, vars.xs[id][s as usize]));
                }
                s + 1
            };
            model.constrain(terms, Sense::Le, f64::from(cap));
            s = next;
        }
        Ok(())
    }

    /// History is fixed. Passed courses sit in slot 0 and
    /// nothing else may.
    fn emit_passed_fixings(&self, model: &mut LpModel, vars: &Vars) -> Result<()> {
        model.comment("passed courses");
        let mut passed_ids = BTreeSet::new();
        for code in &self.input.passed {
            let id = self.id_of(code, "passed courses")?;
            passed_ids.insert(id);
            model.constrain(vec![(1.0, vars.xs[id][0])], Sense::Eq, 1.0);
        }
        model.comment("non-passed courses have no history");
        for i in 0..self.catalog.len() {
            if !passed_ids.contains(&i) {
                model.constrain(vec![(1.0, vars.xs[i][0])], Sense::Eq, 0.0);
            }
        }
        Ok(())
    }

    /// Desired courses are forced in (on their allowed slots)
    /// and undesired ones are forced out.
    fn emit_desired_fixings(&self, model: &mut LpModel, vars: &Vars) -> Result<()> {
        model.comment("desired courses");
        let smax = self.smax();
        for code in self.input.desired.keys() {
            let id = self.id_of(code, "desired courses")?;
            let current = self
                .previous
                .and_then(|plan| plan.term_of(id))
                .unwrap_or(0);
            let allowed = self
                .input
                .allowed_terms(code, current, smax, self.calendar)?;
            if allowed.len() as u32 == smax {
                model.constrain(vec![(1.0, vars.x[id])], Sense::Eq, 1.0);
            } else if allowed.is_empty() {
                model.constrain(vec![(1.0, vars.x[id])], Sense::Eq, 0.0);
            } else {
                model.constrain(vec![(1.0, vars.x[id])], Sense::Eq, 1.0);
                for s in 1..=smax {
                    if !allowed.contains(&s) {
                        model.constrain(vec![(1.0, vars.xs[id][s as usize])], Sense::Eq, 0.0);
                    }
                }
            }
        }
        Ok(())
    }

    /// Summer sessions the student switched off. A slot is S1
    /// when the Summer Term sits two slots later, S2 when one slot later.
    fn emit_session_toggles(&self, model: &mut LpModel, vars: &Vars) {
        model.comment("summer sessions off");
        let forbid_where = |model: &mut LpModel, is_off: bool, shift: u32| {
            if !is_off {
                return;
            }
            for s in 1..=self.smax() {
                if self.calendar.is_summer_term(s + shift) {
                    for i in 0..self.catalog.len() {
                        model.constrain(vec![(1.0, vars.xs[i][s as usize])], Sense::Eq, 0.0);
                    }
                }
            }
        };
        forbid_where(model, self.input.s1_off, 2);
        forbid_where(model, self.input.s2_off, 1);
        forbid_where(model, self.input.st_off, 0);
    }

    /// Requirements of every group of the chosen concentration.
    fn emit_concentration(&self, model: &mut LpModel, vars: &Vars) -> Result<()> {
        model.comment(format!("concentration {}", self.input.concentration));
        for group in self.groups.iter() {
            if !group.name.starts_with(&self.input.concentration) || !group.is_concentration_area
            {
                continue;
            }
            let n = Self::count_value(group.count);
            if n > 0 {
                let terms: Vec<(f64, VarId)> = self
                    .member_ids(group)?
                    .into_iter()
                    .map(|id| (1.0, vars.x[id]))
                    .collect();
                model.constrain(terms, Sense::Ge, f64::from(n));
            }
            let credits = Self::credit_value(group.credits);
            if credits > 0 {
                let mut terms = Vec::new();
                for id in self.member_ids(group)? {
                    if let Some(course) = self.catalog.get(id) {
                        terms.push((f64::from(course.credits), vars.x[id]));
                    }
                }
                model.constrain(terms, Sense::Ge, f64::from(credits));
            }
        }
        Ok(())
    }

    /// Capstone gates. Before the capstone slot the student
    /// needs the configured credits overall and the configured number of
    /// courses from their concentration.
    fn emit_capstone_gates(&self, model: &mut LpModel, vars: &Vars) -> Result<()> {
        model.comment("capstone gates");
        for group in self.groups.iter() {
            if group.kind() != GroupKind::Capstone {
                continue;
            }
            let Some(capstone_code) = group.members.first() else {
                continue;
            };
            let kappa = self.id_of(capstone_code, &format!("capstone {}", group.name))?;
            let needed_credits = Self::credit_value(group.credits);
            let smax = self.smax();
            for s in 1..=smax {
                let lag = self.completion_lag(s);
                if s < lag {
                    continue;
                }
                let mut terms = vec![(f64::from(needed_credits), vars.xs[kappa][s as usize])];
                for t in 0..=s - lag {
                    for course in self.catalog.iter() {
                        if course.id == kappa {
                            continue;
                        }
                        terms.push((-f64::from(course.credits), vars.xs[course.id][t as usize]));
                    }
                }
                model.constrain(terms, Sense::Le, 0.0);
            }
            // Minimum concentration courses before the capstone; the pool is
            // every group named after the chosen concentration.
            let needed_courses = Self::count_value(group.count);
            let mut pool: BTreeSet<String> = BTreeSet::new();
            for conc_group in self.groups.iter() {
                if conc_group.name.starts_with(&self.input.concentration) {
                    pool.extend(conc_group.members.iter().cloned());
                }
            }
            let pool_ids: Vec<CourseId> = pool
                .iter()
                .map(|code| self.id_of(code, &format!("concentration pool for {}", group.name)))
                .collect::<Result<_>>()?;
            for s in 1..=smax {
                let lag = self.completion_lag(s);
                if s < lag {
                    continue;
                }
                let mut terms = vec![(f64::from(needed_courses), vars.xs[kappa][s as usize])];
                for t in 0..=s - lag {
                    for &j in &pool_ids {
                        if j == kappa {
                            continue;
                        }
                        terms.push((-1.0, vars.xs[j][t as usize]));
                    }
                }
                model.constrain(terms, Sense::Le, 0.0);
            }
        }
        Ok(())
    }

    /// Soft-order precedences. If both members are scheduled the
    /// first precedes the second, within the configured distance when one
    /// is set.
    fn emit_soft_order(&self, model: &mut LpModel, vars: &Vars) -> Result<()> {
        model.comment("soft-order precedences");
        for group in self.groups.iter() {
            if group.kind() != GroupKind::SoftOrder || group.members.len() < 2 {
                continue;
            }
            let a = self.id_of(&group.members[0], &format!("soft-order {}", group.name))?;
            let b = self.id_of(&group.members[1], &format!("soft-order {}", group.name))?;
            let distance = Self::count_value(group.count);
            for s in 1..=self.smax() {
                let window = if distance == 0 { s } else { distance };
                let mut terms = vec![(1.0, vars.xs[b][s as usize])];
                for t in s.saturating_sub(window)..s {
                    terms.push((-1.0, vars.xs[a][t as usize]));
                }
                terms.push((1.0, vars.x[a]));
                model.constrain(terms, Sense::Le, 1.0);
            }
        }
        Ok(())
    }

    /// OU annual caps. Each academic year runs from a Fall slot
    /// through the following Summer Term; the first partial year is charged
    /// for OU courses already taken.
    fn emit_ou_annual_caps(&self, model: &mut LpModel, vars: &Vars) -> Result<()> {
        model.comment("OU per-academic-year caps");
        for group in self.groups.iter() {
            if group.kind() != GroupKind::OuAnnual {
                continue;
            }
            let ids = self.member_ids(group)?;
            let cap = i64::from(Self::count_value(group.count));
            let smax = self.smax();
            for s in 1..=smax {
                if self.calendar.is_fall_term(s) {
                    let up_to = smax.min(s + 4);
                    let mut terms = Vec::new();
                    for s2 in s..=up_to {
                        for &id in &ids {
                            terms.push((1.0, vars.xs[id][s2 as usize]));
                        }
                    }
                    model.constrain(terms, Sense::Le, cap as f64);
                } else if s == 1 {
                    // Partial first year: up to the slot before the next
                    // Fall, minus what this year already consumed.
                    let remaining = cap - i64::from(self.input.num_ou_this_year);
                    let year_end = smax.min(self.calendar.next_fall_term(1) - 1);
                    let mut terms = Vec::new();
                    for s2 in 1..=year_end {
                        for &id in &ids {
                            terms.push((1.0, vars.xs[id][s2 as usize]));
                        }
                    }
                    model.constrain(terms, Sense::Le, remaining as f64);
                }
            }
        }
        Ok(())
    }

    /// Honors-only courses are off-limits to everyone else.
    fn emit_honors_restriction(&self, model: &mut LpModel, vars: &Vars) -> Result<()> {
        if self.input.honors {
            return Ok(());
        }
        let Some(group) = self.groups.get("HonorGroup") else {
            return Ok(());
        };
        model.comment("honors-only courses");
        for code in &group.members {
            if self.input.passed.contains(code) {
                continue;
            }
            let id = self.id_of(code, "HonorGroup")?;
            model.constrain(vec![(1.0, vars.x[id])], Sense::Eq, 0.0);
        }
        Ok(())
    }
}
