use thiserror::Error;

use crate::solution::ConstraintViolation;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProblemError {
    #[error("Invalid dimension for {what}: expected {expected}, found {found}")]
    InvalidDimension {
        what: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("Non-finite value in {0}")]
    NonFinite(&'static str),
    #[error("Dense matrix with {len} entries does not fit {rows} rows of dimension {dimension}")]
    DenseShape {
        len: usize,
        rows: usize,
        dimension: usize,
    },
}

/// A half-space `coefficients · x <= bound`
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    /// Coefficients for each variable
    pub coefficients: Vec<f64>,
    /// Right-hand side value
    pub bound: f64,
}

impl Constraint {
    pub fn new(coefficients: Vec<f64>, bound: f64) -> Self {
        Self {
            coefficients,
            bound,
        }
    }

    /// Left-hand side `coefficients · point`
    pub fn lhs(&self, point: &[f64]) -> f64 {
        self.coefficients
            .iter()
            .zip(point)
            .map(|(a, x)| a * x)
            .sum()
    }

    /// Whether `point` lies outside the half-space by more than the
    /// relative tolerance `tolerance * (1 + |bound|)`.
    pub fn is_violated_by(&self, point: &[f64], tolerance: f64) -> bool {
        exceeds(self.lhs(point), self.bound, tolerance)
    }
}

/// Relational operator accepted by [`Problem::add_constraint`]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintOp {
    /// Less than or equal (<=)
    Le,
    /// Greater than or equal (>=)
    Ge,
    /// Equal (=)
    Eq,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Sense {
    #[default]
    Maximize,
    Minimize,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Objective {
    /// Direction vector, one entry per variable
    pub direction: Vec<f64>,
    /// Whether to maximize or minimize `direction · x`
    pub sense: Sense,
}

/// A linear program over a fixed number of variables.
///
/// The dimension is set at construction and every constraint and objective
/// added later is checked against it, so a built `Problem` is always
/// consistent. Constraints are stored as `<=` half-spaces in submission order.
#[derive(Debug, Clone, PartialEq)]
pub struct Problem {
    dimension: usize,
    constraints: Vec<Constraint>,
    objective: Objective,
}

impl Problem {
    /// An unconstrained problem with a zero objective.
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            constraints: Vec::new(),
            objective: Objective {
                direction: vec![0.0; dimension],
                sense: Sense::Maximize,
            },
        }
    }

    /// Build a problem from dense arrays: `a` holds `b.len()` rows of
    /// `c.len()` coefficients in row-major order.
    pub fn from_dense(a: &[f64], b: &[f64], c: &[f64], sense: Sense) -> Result<Self, ProblemError> {
        let dimension = c.len();
        if a.len() != b.len() * dimension {
            return Err(ProblemError::DenseShape {
                len: a.len(),
                rows: b.len(),
                dimension,
            });
        }

        let mut problem = Self::new(dimension).with_objective(c.to_vec(), sense)?;
        for (i, &bound) in b.iter().enumerate() {
            let row = a[i * dimension..(i + 1) * dimension].to_vec();
            problem.push(Constraint::new(row, bound))?;
        }
        Ok(problem)
    }

    pub fn with_objective(mut self, direction: Vec<f64>, sense: Sense) -> Result<Self, ProblemError> {
        self.set_objective(direction, sense)?;
        Ok(self)
    }

    pub fn set_objective(&mut self, direction: Vec<f64>, sense: Sense) -> Result<(), ProblemError> {
        self.check_vector("objective", &direction)?;
        self.objective = Objective { direction, sense };
        Ok(())
    }

    /// Add a constraint with the given operator. `Ge` is stored negated and
    /// `Eq` as a pair of opposing half-spaces.
    pub fn add_constraint(
        &mut self,
        coefficients: Vec<f64>,
        op: ConstraintOp,
        rhs: f64,
    ) -> Result<(), ProblemError> {
        self.check_vector("constraint", &coefficients)?;
        if !rhs.is_finite() {
            return Err(ProblemError::NonFinite("constraint"));
        }

        match op {
            ConstraintOp::Le => self.constraints.push(Constraint::new(coefficients, rhs)),
            ConstraintOp::Ge => self.constraints.push(negated(&coefficients, rhs)),
            ConstraintOp::Eq => {
                self.constraints.push(negated(&coefficients, rhs));
                self.constraints.push(Constraint::new(coefficients, rhs));
            }
        }
        Ok(())
    }

    /// Add a `<=` half-space as is.
    pub fn push(&mut self, constraint: Constraint) -> Result<(), ProblemError> {
        self.check_vector("constraint", &constraint.coefficients)?;
        if !constraint.bound.is_finite() {
            return Err(ProblemError::NonFinite("constraint"));
        }
        self.constraints.push(constraint);
        Ok(())
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn num_constraints(&self) -> usize {
        self.constraints.len()
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn objective(&self) -> &Objective {
        &self.objective
    }

    /// `direction · point`, independent of the sense.
    pub fn objective_value(&self, point: &[f64]) -> f64 {
        self.objective
            .direction
            .iter()
            .zip(point)
            .map(|(c, x)| c * x)
            .sum()
    }

    /// Constraints violated by `point`, worst first.
    pub fn violations(&self, point: &[f64], tolerance: f64) -> Vec<ConstraintViolation> {
        let mut violations: Vec<ConstraintViolation> = self
            .constraints
            .iter()
            .enumerate()
            .filter(|(_, c)| c.is_violated_by(point, tolerance))
            .map(|(index, c)| {
                let actual = c.lhs(point);
                ConstraintViolation {
                    index,
                    required: c.bound,
                    actual,
                    violation_amount: actual - c.bound,
                }
            })
            .collect();

        violations.sort_by(|a, b| b.violation_amount.total_cmp(&a.violation_amount));
        violations
    }

    /// Indices of constraints tight at `point`.
    pub fn binding_constraints(&self, point: &[f64], tolerance: f64) -> Vec<usize> {
        self.constraints
            .iter()
            .enumerate()
            .filter(|(_, c)| (c.lhs(point) - c.bound).abs() <= tolerance * (1.0 + c.bound.abs()))
            .map(|(index, _)| index)
            .collect()
    }

    fn check_vector(&self, what: &'static str, values: &[f64]) -> Result<(), ProblemError> {
        if values.len() != self.dimension {
            return Err(ProblemError::InvalidDimension {
                what,
                expected: self.dimension,
                found: values.len(),
            });
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(ProblemError::NonFinite(what));
        }
        Ok(())
    }
}

fn negated(coefficients: &[f64], rhs: f64) -> Constraint {
    Constraint::new(coefficients.iter().map(|a| -a).collect(), -rhs)
}

pub(crate) fn exceeds(lhs: f64, bound: f64, tolerance: f64) -> bool {
    lhs - bound > tolerance * (1.0 + bound.abs())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ge_and_eq_are_stored_as_half_spaces() {
        let mut problem = Problem::new(2);
        problem.add_constraint(vec![1.0, 2.0], ConstraintOp::Ge, 3.0).unwrap();
        problem.add_constraint(vec![0.0, 1.0], ConstraintOp::Eq, 4.0).unwrap();

        assert_eq!(problem.num_constraints(), 3);
        assert_eq!(problem.constraints()[0], Constraint::new(vec![-1.0, -2.0], -3.0));
        assert_eq!(problem.constraints()[1], Constraint::new(vec![-0.0, -1.0], -4.0));
        assert_eq!(problem.constraints()[2], Constraint::new(vec![0.0, 1.0], 4.0));
    }

    #[test]
    fn test_dimension_mismatch_is_rejected() {
        let mut problem = Problem::new(2);
        let err = problem
            .add_constraint(vec![1.0], ConstraintOp::Le, 1.0)
            .unwrap_err();
        assert_eq!(
            err,
            ProblemError::InvalidDimension {
                what: "constraint",
                expected: 2,
                found: 1
            }
        );

        let err = problem.set_objective(vec![1.0, 2.0, 3.0], Sense::Minimize).unwrap_err();
        assert!(matches!(err, ProblemError::InvalidDimension { what: "objective", .. }));
        assert_eq!(problem.num_constraints(), 0);
    }

    #[test]
    fn test_non_finite_input_is_rejected() {
        let mut problem = Problem::new(1);
        assert_eq!(
            problem.push(Constraint::new(vec![f64::NAN], 1.0)),
            Err(ProblemError::NonFinite("constraint"))
        );
        assert_eq!(
            problem.add_constraint(vec![1.0], ConstraintOp::Le, f64::INFINITY),
            Err(ProblemError::NonFinite("constraint"))
        );
    }

    #[test]
    fn test_from_dense() {
        let a = [1.0, 0.0, 0.0, 1.0, -1.0, -1.0];
        let b = [4.0, 5.0, 0.0];
        let problem = Problem::from_dense(&a, &b, &[1.0, 1.0], Sense::Maximize).unwrap();

        assert_eq!(problem.dimension(), 2);
        assert_eq!(problem.num_constraints(), 3);
        assert_eq!(problem.constraints()[1], Constraint::new(vec![0.0, 1.0], 5.0));

        let err = Problem::from_dense(&a[..5], &b, &[1.0, 1.0], Sense::Maximize).unwrap_err();
        assert_eq!(
            err,
            ProblemError::DenseShape {
                len: 5,
                rows: 3,
                dimension: 2
            }
        );
    }

    #[test]
    fn test_relative_violation() {
        let c = Constraint::new(vec![1.0, 1.0], 100.0);
        // Allowed slack is 1e-6 * (1 + 100)
        assert!(!c.is_violated_by(&[50.0, 50.0001], 1e-6));
        assert!(c.is_violated_by(&[50.0, 50.001], 1e-6));

        let problem = Problem::new(2).with_objective(vec![1.0, 0.0], Sense::Minimize).unwrap();
        assert_eq!(problem.objective().sense, Sense::Minimize);
        assert!(matches!(
            Problem::new(2).with_objective(vec![1.0], Sense::Maximize),
            Err(ProblemError::InvalidDimension { expected: 2, found: 1, .. })
        ));
    }

    #[test]
    fn test_violations_sorted_worst_first() {
        let mut problem = Problem::new(2);
        problem.add_constraint(vec![1.0, 0.0], ConstraintOp::Le, 1.0).unwrap();
        problem.add_constraint(vec![0.0, 1.0], ConstraintOp::Le, 1.0).unwrap();
        problem.add_constraint(vec![1.0, 1.0], ConstraintOp::Le, 10.0).unwrap();

        let violations = problem.violations(&[2.0, 4.0], 1e-9);
        assert_eq!(violations.len(), 2);
        assert_eq!(violations[0].index, 1);
        assert_eq!(violations[0].violation_amount, 3.0);
        assert_eq!(violations[1].index, 0);

        assert_eq!(problem.binding_constraints(&[1.0, 0.5], 1e-9), vec![0]);
    }
}
