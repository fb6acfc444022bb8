use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use thiserror::Error;

use crate::numeric::{Extended, dot, inner, max_abs};
use crate::problem::{Problem, Sense, exceeds};
use crate::solution::Solution;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SolveError {
    #[error("Iteration limit exceeded: more than {limit} restrictions to a boundary hyperplane")]
    IterationLimit { limit: usize },
}

/// Seidel's randomized incremental solver for linear programs in a small,
/// fixed number of variables.
///
/// Constraints are visited in a random order drawn from the seed passed to
/// [`Solver::solve`]. Whenever the current optimum violates a constraint, the
/// optimum is recomputed on that constraint's boundary hyperplane as a
/// problem of one dimension less over the constraints visited before it.
/// Expected running time is linear in the number of constraints for a fixed
/// dimension.
#[derive(Debug, Clone)]
pub struct Solver {
    /// Tolerance for "on boundary" versus "violates" comparisons
    tolerance: f64,
    /// Maximum restrictions before giving up, unlimited when `None`
    max_iterations: Option<usize>,
}

impl Default for Solver {
    fn default() -> Self {
        Self {
            tolerance: 1e-9,
            max_iterations: None,
        }
    }
}

impl Solver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cap the number of violation-triggered restrictions, counted over all
    /// recursion levels.
    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = Some(max);
        self
    }

    /// Set the comparison tolerance. Rows are scaled to unit max-norm before
    /// solving, so a row `a·x <= b` counts as violated when
    /// `a·x - b > tolerance * (1 + |b|)` after scaling.
    pub fn with_tolerance(mut self, tol: f64) -> Self {
        debug_assert!(tol >= 0.0 && tol.is_finite(), "tolerance must be finite and non-negative");
        self.tolerance = tol;
        self
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// Solve the problem. The result depends only on the problem, the solver
    /// settings and `seed`.
    pub fn solve(&self, problem: &Problem, seed: u64) -> Result<Solution, SolveError> {
        let sign = match problem.objective().sense {
            Sense::Maximize => 1.0,
            Sense::Minimize => -1.0,
        };
        let direction: Vec<f64> = problem.objective().direction.iter().map(|c| sign * c).collect();
        let objective = normalized_direction(direction, self.tolerance);

        let mut rows = Vec::with_capacity(problem.num_constraints());
        for constraint in problem.constraints() {
            let scale = max_abs(&constraint.coefficients);
            if scale == 0.0 {
                if exceeds(0.0, constraint.bound, self.tolerance) {
                    tracing::debug!(bound = constraint.bound, "constant constraint cannot be satisfied");
                    return Ok(Solution::Infeasible);
                }
                continue;
            }
            rows.push(Row {
                coefficients: constraint.coefficients.iter().map(|a| a / scale).collect(),
                rhs: Extended::finite(constraint.bound / scale),
            });
        }

        let mut rng = StdRng::seed_from_u64(seed);
        rows.shuffle(&mut rng);

        let mut run = Run {
            tolerance: self.tolerance,
            max_iterations: self.max_iterations,
            iterations: 0,
        };
        let optimum = run.optimize(&rows, &objective)?;
        tracing::debug!(
            dimension = problem.dimension(),
            constraints = rows.len(),
            restrictions = run.iterations,
            seed,
            "solve finished"
        );

        Ok(match optimum {
            Some(point) => self.finish(problem, &rows, &objective, point),
            None => Solution::Infeasible,
        })
    }

    /// Turn the symbolic optimum into a solution. A nonzero `M` part along
    /// which the objective grows is an unbounded ray. Otherwise the point is
    /// moved back along that part to the nearest finite feasible point, which
    /// keeps the objective value.
    fn finish(&self, problem: &Problem, rows: &[Row], objective: &[f64], point: Vec<Extended>) -> Solution {
        let mut finite: Vec<f64> = point.iter().map(|x| x.finite).collect();
        let ray: Vec<f64> = point.iter().map(|x| x.infinite).collect();

        if max_abs(&ray) > self.tolerance {
            if inner(objective, &ray) > self.tolerance {
                let norm = inner(&ray, &ray).sqrt();
                return Solution::Unbounded {
                    direction: ray.iter().map(|r| r / norm).collect(),
                };
            }

            let step = rows.iter().fold(0.0_f64, |step, row| {
                let along = inner(&row.coefficients, &ray);
                if along >= -self.tolerance {
                    return step;
                }
                let excess = inner(&row.coefficients, &finite) - row.rhs.finite;
                step.max(excess / -along)
            });
            tracing::debug!(step, "optimum lies on an unbounded face of equal value");
            for (x, r) in finite.iter_mut().zip(&ray) {
                *x += step * r;
            }
        }

        let value = problem.objective_value(&finite);
        Solution::Optimal {
            point: finite,
            value,
        }
    }
}

/// A scaled half-space `coefficients · x <= rhs` in the current sub-dimension
#[derive(Debug, Clone)]
struct Row {
    coefficients: Vec<f64>,
    rhs: Extended,
}

/// Per-call scratch, so a `Solver` can be shared between threads.
struct Run {
    tolerance: f64,
    max_iterations: Option<usize>,
    iterations: usize,
}

impl Run {
    /// Optimum of `objective` over `rows` and the symbolic box, or `None`
    /// when infeasible. The dimension is `objective.len()`.
    fn optimize(&mut self, rows: &[Row], objective: &[f64]) -> Result<Option<Vec<Extended>>, SolveError> {
        let mut point = box_vertex(objective);

        for (i, row) in rows.iter().enumerate() {
            let lhs = dot(&row.coefficients, &point);
            if !lhs.exceeds(row.rhs, self.tolerance) {
                if lhs.nearly_equals(row.rhs, self.tolerance) {
                    tracing::trace!(dimension = objective.len(), index = i, "constraint tight within tolerance");
                }
                continue;
            }

            self.count_restriction()?;
            let Some(plane) = Hyperplane::through(row, self.tolerance) else {
                tracing::debug!(dimension = objective.len(), index = i, "violated constraint has no free direction");
                return Ok(None);
            };

            let (sub_rows, sub_objective) = plane.restrict(&rows[..i], objective, self.tolerance);
            match self.optimize(&sub_rows, &sub_objective)? {
                Some(sub_point) => point = plane.lift(&sub_point),
                None => return Ok(None),
            }
        }

        Ok(Some(point))
    }

    fn count_restriction(&mut self) -> Result<(), SolveError> {
        self.iterations += 1;
        match self.max_iterations {
            Some(limit) if self.iterations > limit => Err(SolveError::IterationLimit { limit }),
            _ => Ok(()),
        }
    }
}

/// Boundary `coefficients · x = rhs` of a violated row, solved for the
/// variable with the largest coefficient.
struct Hyperplane<'a> {
    coefficients: &'a [f64],
    rhs: Extended,
    pivot: usize,
}

impl<'a> Hyperplane<'a> {
    fn through(row: &'a Row, tolerance: f64) -> Option<Self> {
        let (pivot, largest) = row
            .coefficients
            .iter()
            .enumerate()
            .fold(None, |best: Option<(usize, f64)>, (j, a)| match best {
                Some((_, m)) if m >= a.abs() => best,
                _ => Some((j, a.abs())),
            })?;

        (largest > tolerance).then_some(Self {
            coefficients: &row.coefficients,
            rhs: row.rhs,
            pivot,
        })
    }

    /// Project the box bounds of the pivot variable and `prefix` onto the
    /// hyperplane, along with the objective.
    fn restrict(&self, prefix: &[Row], objective: &[f64], tolerance: f64) -> (Vec<Row>, Vec<f64>) {
        let dimension = self.coefficients.len();
        let mut rows = Vec::with_capacity(prefix.len() + 2);

        for sign in [1.0, -1.0] {
            let mut coefficients = vec![0.0; dimension];
            coefficients[self.pivot] = sign;
            let bound = Row {
                coefficients,
                rhs: Extended::infinite(1.0),
            };
            rows.push(self.eliminate(&bound, tolerance));
        }
        rows.extend(prefix.iter().map(|row| self.eliminate(row, tolerance)));

        let objective = normalized_direction(self.reduce(objective), tolerance);
        (rows, objective)
    }

    fn eliminate(&self, row: &Row, tolerance: f64) -> Row {
        let factor = row.coefficients[self.pivot] / self.coefficients[self.pivot];
        let coefficients = self.reduce(&row.coefficients);
        let rhs = row.rhs - self.rhs * factor;

        let scale = max_abs(&coefficients);
        if scale <= tolerance {
            tracing::trace!(dimension = coefficients.len(), "constraint parallel to boundary hyperplane");
            return Row {
                coefficients: vec![0.0; coefficients.len()],
                rhs,
            };
        }
        Row {
            coefficients: coefficients.iter().map(|a| a / scale).collect(),
            rhs: rhs * (1.0 / scale),
        }
    }

    /// Substitute the pivot variable out of a coefficient vector.
    fn reduce(&self, values: &[f64]) -> Vec<f64> {
        let factor = values[self.pivot] / self.coefficients[self.pivot];
        values
            .iter()
            .zip(self.coefficients)
            .enumerate()
            .filter(|&(j, _)| j != self.pivot)
            .map(|(_, (v, a))| v - factor * a)
            .collect()
    }

    /// Recover the full point from a point on the hyperplane.
    fn lift(&self, sub_point: &[Extended]) -> Vec<Extended> {
        let mut point = Vec::with_capacity(sub_point.len() + 1);
        point.extend_from_slice(&sub_point[..self.pivot]);
        point.push(Extended::ZERO);
        point.extend_from_slice(&sub_point[self.pivot..]);

        let rest = dot(self.coefficients, &point);
        point[self.pivot] = (self.rhs - rest) * (1.0 / self.coefficients[self.pivot]);
        point
    }
}

/// Optimum over the box alone. Components with a zero objective coefficient
/// sit at zero.
fn box_vertex(objective: &[f64]) -> Vec<Extended> {
    objective
        .iter()
        .map(|&c| {
            if c > 0.0 {
                Extended::infinite(1.0)
            } else if c < 0.0 {
                Extended::infinite(-1.0)
            } else {
                Extended::ZERO
            }
        })
        .collect()
}

/// Scale to unit max-norm and flush components below `tolerance` to zero.
fn normalized_direction(mut direction: Vec<f64>, tolerance: f64) -> Vec<f64> {
    let scale = max_abs(&direction);
    for c in direction.iter_mut() {
        *c = if scale <= tolerance || c.abs() <= tolerance * scale {
            0.0
        } else {
            *c / scale
        };
    }
    direction
}
