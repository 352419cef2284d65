//! Schedule plan (solution) model.
//!
//! A plan maps course ids to term slots: slot `0` records history, slots
//! `>= 1` are the future terms the solver picked. A course absent from the
//! map is not part of the schedule. The plan is produced by the solver
//! driver and read-only afterwards.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::models::calendar::AcademicCalendar;
use crate::models::course::{Catalog, Course, CourseId};

/// A complete term assignment for one student.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchedulePlan {
    assignments: BTreeMap<CourseId, u32>,
}

impl SchedulePlan {
    /// Creates an empty plan.
    pub fn new() -> Self {
        Self::default()
    }

    /// Assigns a course to a term slot.
    pub fn assign(&mut self, course: CourseId, term: u32) {
        self.assignments.insert(course, term);
    }

    /// The slot a course is assigned to, if any.
    pub fn term_of(&self, course: CourseId) -> Option<u32> {
        self.assignments.get(&course).copied()
    }

    /// Whether the course appears in the plan (historical or future).
    pub fn is_scheduled(&self, course: CourseId) -> bool {
        self.assignments.contains_key(&course)
    }

    /// Number of assigned courses.
    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    /// Whether the plan is empty.
    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    /// All `(course, term)` assignments in course-id order.
    pub fn iter(&self) -> impl Iterator<Item = (CourseId, u32)> + '_ {
        self.assignments.iter().map(|(&id, &term)| (id, term))
    }

    /// Ids of every course in the plan.
    pub fn chosen_ids(&self) -> BTreeSet<CourseId> {
        self.assignments.keys().copied().collect()
    }

    /// Credits of courses in the historical slot.
    pub fn credits_taken_so_far(&self, catalog: &Catalog) -> u32 {
        self.credits_where(catalog, |term| term == 0)
    }

    /// Credits of courses scheduled in future slots.
    pub fn credits_to_take(&self, catalog: &Catalog) -> u32 {
        self.credits_where(catalog, |term| term >= 1)
    }

    /// Credits over the whole plan.
    pub fn total_credits(&self, catalog: &Catalog) -> u32 {
        self.credits_where(catalog, |_| true)
    }

    fn credits_where(&self, catalog: &Catalog, keep: impl Fn(u32) -> bool) -> u32 {
        self.iter()
            .filter(|&(_, term)| keep(term))
            .filter_map(|(id, _)| catalog.get(id))
            .map(|c| c.credits)
            .sum()
    }

    /// Courses assigned to slot `term`, ordered by code.
    pub fn courses_in_term<'a>(&self, catalog: &'a Catalog, term: u32) -> Vec<&'a Course> {
        let mut courses: Vec<&Course> = self
            .iter()
            .filter(|&(_, t)| t == term)
            .filter_map(|(id, _)| catalog.get(id))
            .collect();
        courses.sort_by(|a, b| a.code.cmp(&b.code));
        courses
    }

    /// The label a course should carry in a rendered schedule.
    ///
    /// Hidden distribution slots show their display name; a course the
    /// student asked for, or one their desired courses depend on, shows its
    /// full code and title.
    pub fn display_label(
        &self,
        catalog: &Catalog,
        course: &Course,
        desired: &BTreeSet<String>,
    ) -> String {
        let chosen = self.chosen_ids();
        match &course.display_name {
            Some(name)
                if name.len() > 1
                    && !desired.contains(&course.code)
                    && !catalog.is_required_for_desired(
                        course.id,
                        desired.iter().map(String::as_str),
                        &chosen,
                    ) =>
            {
                name.clone()
            }
            _ => course.label(),
        }
    }

    /// Renders the plan as the multi-line text shown to the student:
    /// credit totals followed by one section per future term.
    pub fn render_summary(
        &self,
        catalog: &Catalog,
        calendar: &AcademicCalendar,
        smax: u32,
        desired: &BTreeSet<String>,
    ) -> String {
        let mut out = String::new();
        out.push_str(&format!(
            "----- Credits Taken So Far\t: {}\n",
            self.credits_taken_so_far(catalog)
        ));
        out.push_str(&format!(
            "----- Credits To Take Yet\t: {}\n",
            self.credits_to_take(catalog)
        ));
        out.push_str(&format!(
            "----- TOTAL CREDITS OVERALL\t: {}\n",
            self.total_credits(catalog)
        ));
        for term in 1..=smax {
            let courses = self.courses_in_term(catalog, term);
            if courses.is_empty() {
                continue;
            }
            out.push_str(&format!("     --- {} ---\n", calendar.term_name(term)));
            for course in courses {
                out.push_str(&self.display_label(catalog, course, desired));
                out.push('\n');
            }
        }
        out
    }
}
