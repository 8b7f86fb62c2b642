// grade.rs
use std::{collections::BTreeMap, fmt};

/// Letter grade derived from a student's average mark.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grade {
    A,
    B,
    C,
    D,
}

impl Grade {
    /// Inclusive lower bounds, best grade first.
    pub fn from_average(avg: f64) -> Self {
        if avg >= 90.0 {
            Grade::A
        } else if avg >= 75.0 {
            Grade::B
        } else if avg >= 60.0 {
            Grade::C
        } else {
            Grade::D
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Grade::A => "A",
            Grade::B => "B",
            Grade::C => "C",
            Grade::D => "D",
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mean of all subject scores. `None` when there are no marks.
pub fn average(marks: &BTreeMap<String, i64>) -> Option<f64> {
    if marks.is_empty() {
        return None;
    }
    // Widened so extreme marks cannot overflow the sum.
    let total: i128 = marks.values().map(|&mark| i128::from(mark)).sum();
    Some(total as f64 / marks.len() as f64)
}
