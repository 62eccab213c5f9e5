use serde::{Deserialize, Serialize};
use std::{
    fmt,
    ops::{AddAssign, Mul},
};

/// The way that the score of a report will be calculated.
#[derive(Serialize, Deserialize, Debug, Default, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Score will be binary: every unit passed or not.
    Absolute,
    /// Score will range from 0 to the total of the unit marks.
    #[default]
    Weighted,
}

/// The actual score. It mirrors the structure of `Mode`.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum Score {
    Absolute(bool),
    Weighted { current: u32, max: u32 },
}

impl Score {
    /// The neutral element of `+=` in the chosen mode.
    pub fn empty(grading_mode: Mode) -> Self {
        match grading_mode {
            Mode::Absolute => Self::Absolute(true),
            Mode::Weighted => Self::Weighted { current: 0, max: 0 },
        }
    }

    /// The score of one unit worth `weight`.
    pub fn of_unit(grading_mode: Mode, passed: bool, weight: u32) -> Self {
        match grading_mode {
            Mode::Absolute => Self::Absolute(passed),
            Mode::Weighted => Self::Weighted {
                current: if passed { 1 } else { 0 },
                max: 1,
            } * weight,
        }
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Score::Absolute(true) => write!(f, "pass"),
            Score::Absolute(false) => write!(f, "fail"),
            Score::Weighted { current, max } => write!(f, "{current}/{max}"),
        }
    }
}

impl AddAssign for Score {
    fn add_assign(&mut self, rhs: Self) {
        match (self, rhs) {
            (Score::Absolute(b1), Score::Absolute(b2)) => *b1 = *b1 && b2,
            (
                Score::Weighted {
                    current: c1,
                    max: m1,
                },
                Score::Weighted {
                    current: c2,
                    max: m2,
                },
            ) => {
                *c1 += c2;
                *m1 += m2;
            }
            _ => panic!("unexpected addition between different scoring modes"),
        };
    }
}

impl Mul<u32> for Score {
    type Output = Score;

    fn mul(self, rhs: u32) -> Self::Output {
        match self {
            Score::Weighted { current: c, max: m } => Score::Weighted {
                current: c * rhs,
                max: m * rhs,
            },
            Score::Absolute(b) => Score::Absolute(b),
        }
    }
}
