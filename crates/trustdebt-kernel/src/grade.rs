//! Letter grades for Trust Debt totals.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Letter grade. Declaration order is best to worst, so `Ord` ranks badness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Grade {
    A,
    B,
    C,
    D,
}

/// Inclusive upper bound of a grade; `None` for the open-ended last band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeBand {
    pub grade: Grade,
    pub max_units: Option<u32>,
    pub label: &'static str,
}

pub const GRADE_BANDS: [GradeBand; 4] = [
    GradeBand {
        grade: Grade::A,
        max_units: Some(500),
        label: "Excellent alignment",
    },
    GradeBand {
        grade: Grade::B,
        max_units: Some(1500),
        label: "Good, minor attention",
    },
    GradeBand {
        grade: Grade::C,
        max_units: Some(3000),
        label: "Needs attention",
    },
    GradeBand {
        grade: Grade::D,
        max_units: None,
        label: "Requires systematic work",
    },
];

impl Grade {
    /// First band whose bound covers `units`. Non-finite totals grade D.
    pub fn assign(units: f64) -> Self {
        if !units.is_finite() {
            return Self::D;
        }
        GRADE_BANDS
            .iter()
            .find(|band| band.max_units.is_none_or(|max| units <= f64::from(max)))
            .map_or(Self::D, |band| band.grade)
    }

    /// The band this grade was assigned from.
    pub fn band(self) -> &'static GradeBand {
        match self {
            Self::A => &GRADE_BANDS[0],
            Self::B => &GRADE_BANDS[1],
            Self::C => &GRADE_BANDS[2],
            Self::D => &GRADE_BANDS[3],
        }
    }

    /// Human-readable label of the band.
    pub fn label(self) -> &'static str {
        self.band().label
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
            Self::C => "C",
            Self::D => "D",
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
