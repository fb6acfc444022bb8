use std::fmt;

/// The result of solving an LP problem
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "status", rename_all = "lowercase"))]
#[derive(Debug, Clone, PartialEq)]
pub enum Solution {
    /// An optimal point and its objective value `direction · point`
    Optimal { point: Vec<f64>, value: f64 },
    /// No point satisfies every constraint
    Infeasible,
    /// The objective improves without bound along `direction` (unit length)
    Unbounded { direction: Vec<f64> },
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolutionStatus {
    Optimal,
    Infeasible,
    Unbounded,
}

/// Information about a violated constraint
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct ConstraintViolation {
    /// Position of the half-space in the problem
    pub index: usize,
    /// Required bound (constraint RHS)
    pub required: f64,
    /// Actual left-hand side achieved
    pub actual: f64,
    /// How far the bound is exceeded
    pub violation_amount: f64,
}

impl Solution {
    pub fn status(&self) -> SolutionStatus {
        match self {
            Solution::Optimal { .. } => SolutionStatus::Optimal,
            Solution::Infeasible => SolutionStatus::Infeasible,
            Solution::Unbounded { .. } => SolutionStatus::Unbounded,
        }
    }

    pub fn is_optimal(&self) -> bool {
        matches!(self, Solution::Optimal { .. })
    }

    pub fn point(&self) -> Option<&[f64]> {
        match self {
            Solution::Optimal { point, .. } => Some(point),
            _ => None,
        }
    }

    pub fn value(&self) -> Option<f64> {
        match self {
            Solution::Optimal { value, .. } => Some(*value),
            _ => None,
        }
    }

    pub fn direction(&self) -> Option<&[f64]> {
        match self {
            Solution::Unbounded { direction } => Some(direction),
            _ => None,
        }
    }
}

impl fmt::Display for SolutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SolutionStatus::Optimal => "OPTIMAL",
            SolutionStatus::Infeasible => "INFEASIBLE",
            SolutionStatus::Unbounded => "UNBOUNDED",
        };
        f.write_str(label)
    }
}
