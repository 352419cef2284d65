//! Academic calendar and term-number arithmetic.
//!
//! Every constraint that talks about "term slots" goes through this module:
//! it is the single source of truth for mapping term tokens such as `FA2023`
//! to slot numbers relative to a fixed current date.
//!
//! # Term model
//!
//! Five seasons cycle in a fixed yearly order: Spring (`SP`), Summer-1
//! (`S1`), Summer-2 (`S2`), Summer-Term (`ST`), Fall (`FA`). Slot `0` is the
//! historical slot (everything already passed); slot `s >= 1` is the s-th
//! future term counted from the current date in cycle order.
//!
//! Note that S1, S2 and ST overlap on the wall clock (ST spans the whole
//! summer); "summer term" always means ST alone, while "happens during
//! summer" covers all three.

use serde::{Deserialize, Serialize};

use crate::error::{PlanError, Result};

/// One of the five seasons of the academic year, in cycle order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Season {
    /// Spring, starts Jan 6.
    Spring,
    /// First summer session, starts Jun 1.
    Summer1,
    /// Second summer session, starts Jul 1.
    Summer2,
    /// Summer term (spans the whole summer), starts Jun 1.
    SummerTerm,
    /// Fall, starts Sep 1.
    Fall,
}

impl Season {
    /// Position in the yearly cycle: SP=1, S1=2, S2=3, ST=4, FA=5.
    pub fn index(self) -> u32 {
        match self {
            Season::Spring => 1,
            Season::Summer1 => 2,
            Season::Summer2 => 3,
            Season::SummerTerm => 4,
            Season::Fall => 5,
        }
    }

    /// Two-letter season code used in term tokens.
    pub fn code(self) -> &'static str {
        match self {
            Season::Spring => "SP",
            Season::Summer1 => "S1",
            Season::Summer2 => "S2",
            Season::SummerTerm => "ST",
            Season::Fall => "FA",
        }
    }

    fn from_index(index: u32) -> Season {
        match index {
            1 => Season::Spring,
            2 => Season::Summer1,
            3 => Season::Summer2,
            4 => Season::SummerTerm,
            _ => Season::Fall,
        }
    }

    fn from_code(code: &str) -> Option<Season> {
        match code {
            "SP" => Some(Season::Spring),
            "S1" => Some(Season::Summer1),
            "S2" => Some(Season::Summer2),
            "ST" => Some(Season::SummerTerm),
            "FA" => Some(Season::Fall),
            _ => None,
        }
    }
}

/// Academic calendar anchored at a fixed current date.
///
/// Constructed once at startup and passed by reference to every component
/// that needs term arithmetic; nothing mutates it afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcademicCalendar {
    day: u32,
    month: u32,
    year: i32,
    /// Cycle index (1..=5) of the term the current date falls in.
    current: u32,
}

impl AcademicCalendar {
    /// Creates a calendar for the given current date.
    ///
    /// The current season is derived from `(day, month)`: Jan 1-5 still
    /// belongs to the previous Fall, Jan 6 through May is Spring, June
    /// through August is the Summer Term, September through December is
    /// Fall.
    pub fn new(day: u32, month: u32, year: i32) -> Self {
        let current = match month {
            1 if day < 6 => 5,
            1..=5 => 1,
            6..=8 => 4,
            _ => 5,
        };
        Self {
            day,
            month,
            year,
            current,
        }
    }

    /// The season the current date falls in.
    pub fn current_season(&self) -> Season {
        Season::from_index(self.current)
    }

    /// Current calendar year.
    pub fn current_year(&self) -> i32 {
        self.year
    }

    /// Current day-of-month and month as given at construction.
    pub fn current_date(&self) -> (u32, u32) {
        (self.day, self.month)
    }

    /// Parses a term token such as `FA2023` into a slot number.
    ///
    /// Returns `0` when the token names the current term or any earlier one
    /// (already passed); otherwise the offset in the five-season cycle from
    /// the current term.
    pub fn term_no(&self, token: &str) -> Result<u32> {
        let token = token.trim();
        let (season_code, year_str) = match (token.get(0..2), token.get(2..)) {
            (Some(season), Some(year)) if year.len() >= 4 => (season, year),
            _ => {
                return Err(PlanError::parse(
                    "term token",
                    format!("`{token}` is not a <season><year> token"),
                ));
            }
        };
        let season = Season::from_code(season_code).ok_or_else(|| {
            PlanError::parse(
                "term token",
                format!("`{token}` has unknown season `{season_code}`"),
            )
        })?;
        let year: i32 = year_str.parse().map_err(|_| {
            PlanError::parse(
                "term token",
                format!("`{token}` has unparsable year `{year_str}`"),
            )
        })?;
        let offset = i64::from(year - self.year) * 5 + i64::from(season.index())
            - i64::from(self.current);
        Ok(if offset <= 0 { 0 } else { offset as u32 })
    }

    /// Inverse of [`term_no`](Self::term_no) for future slots: the token
    /// naming slot `n`. For `n = 0` this names the current term itself.
    pub fn term_name(&self, n: u32) -> String {
        let steps = self.current - 1 + n;
        let season = Season::from_index(steps % 5 + 1);
        let year = self.year + (steps / 5) as i32;
        format!("{}{}", season.code(), year)
    }

    /// The season slot `n` falls in.
    pub fn season_of(&self, n: u32) -> Season {
        Season::from_index((self.current - 1 + n) % 5 + 1)
    }

    /// Whether slot `n` is a Summer Term (`ST`) slot.
    ///
    /// ST only; Summer-1 and Summer-2 are not summer *terms*.
    pub fn is_summer_term(&self, n: u32) -> bool {
        let sum = self.current + n;
        sum >= 4 && (sum - 4) % 5 == 0
    }

    /// Whether slot `n` occurs during the summer months (S1, S2 or ST).
    pub fn happens_during_summer(&self, n: u32) -> bool {
        self.is_summer_term(n) || self.is_summer_term(n + 1) || self.is_summer_term(n + 2)
    }

    /// Whether slot `n` is a Fall slot.
    pub fn is_fall_term(&self, n: u32) -> bool {
        (self.current + n) % 5 == 0
    }

    /// The first Fall slot at or after slot `n`.
    pub fn next_fall_term(&self, n: u32) -> u32 {
        let mut m = n;
        while !self.is_fall_term(m) {
            m += 1;
        }
        m
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_season_from_date() {
        // Early January still closes the previous fall.
        assert_eq!(
            AcademicCalendar::new(3, 1, 2024).current_season(),
            Season::Fall
        );
        assert_eq!(
            AcademicCalendar::new(6, 1, 2024).current_season(),
            Season::Spring
        );
        assert_eq!(
            AcademicCalendar::new(15, 3, 2024).current_season(),
            Season::Spring
        );
        assert_eq!(
            AcademicCalendar::new(10, 6, 2024).current_season(),
            Season::SummerTerm
        );
        assert_eq!(
            AcademicCalendar::new(1, 9, 2024).current_season(),
            Season::Fall
        );
    }

    #[test]
    fn test_term_no_from_fall() {
        let cal = AcademicCalendar::new(15, 9, 2023);
        assert_eq!(cal.term_no("FA2023").unwrap(), 0); // current term
        assert_eq!(cal.term_no("SP2023").unwrap(), 0); // passed
        assert_eq!(cal.term_no("SP2024").unwrap(), 1);
        assert_eq!(cal.term_no("S12024").unwrap(), 2);
        assert_eq!(cal.term_no("S22024").unwrap(), 3);
        assert_eq!(cal.term_no("ST2024").unwrap(), 4);
        assert_eq!(cal.term_no("FA2024").unwrap(), 5);
        assert_eq!(cal.term_no("SP2026").unwrap(), 11);
    }

    #[test]
    fn test_term_no_from_spring() {
        let cal = AcademicCalendar::new(10, 2, 2023);
        assert_eq!(cal.term_no("S12023").unwrap(), 1);
        assert_eq!(cal.term_no("S22023").unwrap(), 2);
        assert_eq!(cal.term_no("ST2023").unwrap(), 3);
        assert_eq!(cal.term_no("FA2023").unwrap(), 4);
        assert_eq!(cal.term_no("SP2024").unwrap(), 5);
        assert_eq!(cal.term_no("FA2022").unwrap(), 0);
    }

    #[test]
    fn test_term_no_rejects_garbage() {
        let cal = AcademicCalendar::new(15, 9, 2023);
        assert!(cal.term_no("FAll").is_err());
        assert!(cal.term_no("XX2023").is_err());
        assert!(cal.term_no("FA20x3").is_err());
        assert!(cal.term_no("FA").is_err());
    }

    #[test]
    fn test_term_name_round_trip() {
        for (day, month, year) in [(15, 9, 2023), (10, 2, 2023), (20, 6, 2023), (2, 1, 2024)] {
            let cal = AcademicCalendar::new(day, month, year);
            for n in 1..=25 {
                let name = cal.term_name(n);
                assert_eq!(
                    cal.term_no(&name).unwrap(),
                    n,
                    "round trip failed for {name} from {day}/{month}/{year}"
                );
            }
        }
    }

    #[test]
    fn test_summer_term_classification() {
        // From Fall, ST slots are 4, 9, 14, ...
        let cal = AcademicCalendar::new(15, 9, 2023);
        let st: Vec<u32> = (1..=15).filter(|&n| cal.is_summer_term(n)).collect();
        assert_eq!(st, vec![4, 9, 14]);
        for &n in &st {
            assert!(cal.term_name(n).starts_with("ST"));
        }
    }

    #[test]
    fn test_happens_during_summer() {
        // From Fall: SP(1) S1(2) S2(3) ST(4) FA(5) ...
        let cal = AcademicCalendar::new(15, 9, 2023);
        assert!(!cal.happens_during_summer(1));
        assert!(cal.happens_during_summer(2));
        assert!(cal.happens_during_summer(3));
        assert!(cal.happens_during_summer(4));
        assert!(!cal.happens_during_summer(5));
    }

    #[test]
    fn test_fall_terms() {
        let cal = AcademicCalendar::new(10, 2, 2023);
        let falls: Vec<u32> = (1..=12).filter(|&n| cal.is_fall_term(n)).collect();
        assert_eq!(falls, vec![4, 9]);
        assert_eq!(cal.next_fall_term(1), 4);
        assert_eq!(cal.next_fall_term(4), 4);
        assert_eq!(cal.next_fall_term(5), 9);
    }

    #[test]
    fn test_season_of_matches_name() {
        let cal = AcademicCalendar::new(20, 6, 2023);
        for n in 1..=10 {
            assert!(cal.term_name(n).starts_with(cal.season_of(n).code()));
        }
    }
}
