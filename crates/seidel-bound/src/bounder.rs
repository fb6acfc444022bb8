use seidel_lp::{ConstraintOp, Problem, ProblemError, Sense, Solution, SolutionStatus, SolveError, Solver};
use thiserror::Error;

use crate::functions::Activation;
use crate::sampling::{Cell, Grid};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BoundError {
    #[error("Invalid region on axis {axis}: [{lower}, {upper}] has negative width")]
    InvalidRegion { axis: usize, lower: f64, upper: f64 },
    #[error("{sample_size} samples leave axis {axis} with a single cell")]
    TooFewSamples { axis: usize, sample_size: usize },
    #[error("Bounds are only available for functions of one variable, got {0}")]
    UnsupportedDimension(usize),
    #[error("Function or gradient is not finite at {0:?}")]
    NonFiniteSample(Vec<f64>),
    #[error("Refinement stopped at {points} sample points without meeting the tolerance")]
    RefinementLimit { points: usize },
    #[error("Discrete bound LP was {0}")]
    UnexpectedLp(SolutionStatus),
    #[error("LP solve failed: {0}")]
    Solve(#[from] SolveError),
    #[error("Invalid LP: {0}")]
    Problem(#[from] ProblemError),
}

/// An affine function `slope · x + intercept`
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct AffineBound {
    pub slope: Vec<f64>,
    pub intercept: f64,
}

impl AffineBound {
    pub fn eval(&self, x: &[f64]) -> f64 {
        self.slope.iter().zip(x).map(|(w, x)| w * x).sum::<f64>() + self.intercept
    }

    fn negated(self) -> Self {
        Self {
            slope: self.slope.into_iter().map(|w| -w).collect(),
            intercept: -self.intercept,
        }
    }
}

/// Sound affine bounds `lower(x) <= f(x) <= upper(x)` over a region
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct LinearBounds {
    pub lower: AffineBound,
    pub upper: AffineBound,
}

type Target<'a> = Box<dyn Fn(&[f64]) -> f64 + 'a>;
type Gradient<'a> = Box<dyn Fn(&[f64]) -> Vec<f64> + 'a>;

/// Computes near-optimal linear bounds for a scalar function.
///
/// The function is sampled at cell centers of a regular grid. A discrete
/// upper bound through the samples is fit with an LP, and each cell's worst
/// excess over the fitted plane is bounded from the function's Lipschitz
/// constant `lipschitz` and the Lipschitz constant of its gradient
/// `smoothness`. Cells whose excess bound reaches `eps` are split and the
/// fit repeated. Once every cell is within `eps`, the plane is raised by the
/// largest excess bound, which makes it sound over the whole region. Lower
/// bounds are upper bounds of `-f`.
pub struct LinearBounder<'a> {
    target: Target<'a>,
    gradient: Option<Gradient<'a>>,
    lipschitz: f64,
    smoothness: f64,
    eps: f64,
    initial_points: usize,
    max_points: usize,
    solver: Solver,
    seed: u64,
}

/// Sample of the (possibly negated) function at a cell center
struct Sample {
    cell: Cell,
    value: f64,
    gradient: Vec<f64>,
}

impl<'a> LinearBounder<'a> {
    pub fn new(target: impl Fn(&[f64]) -> f64 + 'a, lipschitz: f64, smoothness: f64) -> Self {
        Self {
            target: Box::new(target),
            gradient: None,
            lipschitz,
            smoothness,
            eps: 1e-2,
            initial_points: 200,
            max_points: 200_000,
            solver: Solver::new(),
            seed: 0,
        }
    }

    /// Use the exact gradient instead of central differences.
    pub fn with_gradient(mut self, gradient: impl Fn(&[f64]) -> Vec<f64> + 'a) -> Self {
        self.gradient = Some(Box::new(gradient));
        self
    }

    pub fn with_eps(mut self, eps: f64) -> Self {
        self.eps = eps;
        self
    }

    pub fn with_initial_points(mut self, points: usize) -> Self {
        self.initial_points = points;
        self
    }

    pub fn with_max_points(mut self, points: usize) -> Self {
        self.max_points = points;
        self
    }

    pub fn with_solver(mut self, solver: Solver) -> Self {
        self.solver = solver;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Compute lower and upper bounds over `region`, given as one
    /// `(lower, upper)` interval per input.
    pub fn find_optimal_bounds(&self, region: &[(f64, f64)]) -> Result<LinearBounds, BoundError> {
        for (axis, &(lower, upper)) in region.iter().enumerate() {
            if !(upper - lower > -1e-5) {
                return Err(BoundError::InvalidRegion { axis, lower, upper });
            }
        }
        if self.initial_points <= 2 {
            return Err(BoundError::TooFewSamples {
                axis: 0,
                sample_size: self.initial_points,
            });
        }

        Ok(LinearBounds {
            lower: self.bound_one_side(region, false)?,
            upper: self.bound_one_side(region, true)?,
        })
    }

    fn bound_one_side(&self, region: &[(f64, f64)], upper: bool) -> Result<AffineBound, BoundError> {
        let slope_ratio = slope_ratio_bound(region.len())?;
        let grid = Grid::regular(region, self.initial_points)?;
        let sign = if upper { 1.0 } else { -1.0 };
        let center: Vec<f64> = region.iter().map(|(lo, hi)| (lo + hi) / 2.0).collect();

        let mut samples = grid
            .cells
            .iter()
            .map(|cell| self.sample(cell.clone(), sign))
            .collect::<Result<Vec<_>, _>>()?;

        let mut round = 0usize;
        loop {
            let mut bound = self.fit_discrete_upper(&center, &samples)?;
            let excess: Vec<f64> = samples
                .iter()
                .map(|s| self.excess_bound(s, &bound, slope_ratio))
                .collect();

            if excess.iter().all(|&e| e < self.eps) {
                bound.intercept += excess.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                tracing::debug!(upper, round, points = samples.len(), "linear bound converged");
                return Ok(if upper { bound } else { bound.negated() });
            }

            let mut refined = Vec::with_capacity(samples.len());
            for (sample, e) in samples.into_iter().zip(excess) {
                if e < self.eps {
                    refined.push(sample);
                    continue;
                }
                for child in grid.split(&sample.cell) {
                    refined.push(self.sample(child, sign)?);
                }
            }
            if refined.len() > self.max_points {
                return Err(BoundError::RefinementLimit {
                    points: refined.len(),
                });
            }
            tracing::trace!(upper, round, points = refined.len(), "refining sample cells");
            samples = refined;
            round += 1;
        }
    }

    /// Upper bound of `f(x) - bound(x)` over the sample's cell.
    fn excess_bound(&self, sample: &Sample, bound: &AffineBound, slope_ratio: f64) -> f64 {
        let radius = sample.cell.diameter / 2.0;
        let gap = bound.eval(&sample.cell.center) - sample.value;

        let by_value = (1.0 + slope_ratio) * self.lipschitz * radius - gap;
        let slope_error = bound
            .slope
            .iter()
            .zip(&sample.gradient)
            .map(|(w, g)| (w - g).powi(2))
            .sum::<f64>()
            .sqrt();
        let by_gradient = slope_error * radius + 0.5 * self.smoothness * radius * radius - gap;

        by_value.min(by_gradient)
    }

    /// Plane above every sample with the smallest mean gap. Solved in
    /// coordinates centered on the region, then shifted back.
    fn fit_discrete_upper(&self, center: &[f64], samples: &[Sample]) -> Result<AffineBound, BoundError> {
        let dimension = center.len();
        let n = samples.len() as f64;

        let mut problem = Problem::new(dimension + 1);
        let mut mean = vec![0.0; dimension + 1];
        mean[dimension] = 1.0;
        for sample in samples {
            let mut row: Vec<f64> = sample.cell.center.iter().zip(center).map(|(x, c)| x - c).collect();
            for (m, x) in mean.iter_mut().zip(&row) {
                *m += x / n;
            }
            row.push(1.0);
            problem.add_constraint(row, ConstraintOp::Ge, sample.value)?;
        }
        problem.set_objective(mean, Sense::Minimize)?;

        match self.solver.solve(&problem, self.seed)? {
            Solution::Optimal { point, .. } => {
                let slope = point[..dimension].to_vec();
                let shift: f64 = slope.iter().zip(center).map(|(w, c)| w * c).sum();
                Ok(AffineBound {
                    slope,
                    intercept: point[dimension] - shift,
                })
            }
            other => Err(BoundError::UnexpectedLp(other.status())),
        }
    }

    fn sample(&self, cell: Cell, sign: f64) -> Result<Sample, BoundError> {
        let value = (self.target)(&cell.center);
        let gradient = match &self.gradient {
            Some(gradient) => gradient(&cell.center),
            None => self.central_difference(&cell.center),
        };
        if !value.is_finite() || gradient.len() != cell.center.len() || gradient.iter().any(|g| !g.is_finite()) {
            return Err(BoundError::NonFiniteSample(cell.center));
        }

        Ok(Sample {
            value: sign * value,
            gradient: gradient.into_iter().map(|g| sign * g).collect(),
            cell,
        })
    }

    fn central_difference(&self, x: &[f64]) -> Vec<f64> {
        let mut probe = x.to_vec();
        (0..x.len())
            .map(|j| {
                let h = 1e-6 * x[j].abs().max(1.0);
                probe[j] = x[j] + h;
                let forward = (self.target)(&probe);
                probe[j] = x[j] - h;
                let backward = (self.target)(&probe);
                probe[j] = x[j];
                (forward - backward) / (2.0 * h)
            })
            .collect()
    }
}

impl LinearBounder<'static> {
    /// Bounder for a built-in activation with its exact derivative.
    pub fn for_activation(activation: Activation) -> Self {
        LinearBounder::new(
            move |x: &[f64]| activation.value(x[0]),
            activation.lipschitz(),
            activation.smoothness(),
        )
        .with_gradient(move |x: &[f64]| vec![activation.derivative(x[0])])
    }
}

/// Bound on `|slope| / lipschitz` for the fitted plane. In one dimension the
/// plane touches two samples, so its slope is a chord slope and cannot
/// exceed the Lipschitz constant.
fn slope_ratio_bound(dimension: usize) -> Result<f64, BoundError> {
    if dimension == 1 {
        Ok(1.0)
    } else {
        Err(BoundError::UnsupportedDimension(dimension))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn assert_sound(f: impl Fn(f64) -> f64, bounds: &LinearBounds, region: (f64, f64)) {
        for i in 0..=2000 {
            let x = region.0 + (region.1 - region.0) * i as f64 / 2000.0;
            let y = f(x);
            assert!(bounds.lower.eval(&[x]) <= y + 1e-9, "lower bound above f at {x}");
            assert!(bounds.upper.eval(&[x]) >= y - 1e-9, "upper bound below f at {x}");
        }
    }

    #[test]
    fn test_activation_bounds_are_sound() {
        for activation in Activation::ALL {
            for region in [(-3.0, 2.0), (0.5, 4.0), (-1.0, -0.2)] {
                let bounds = LinearBounder::for_activation(activation)
                    .find_optimal_bounds(&[region])
                    .unwrap();
                assert_sound(|x| activation.value(x), &bounds, region);
            }
        }
    }

    #[test]
    fn test_bounds_are_tight() {
        let region = (-3.0, 2.0);
        let bounds = LinearBounder::for_activation(Activation::Sigmoid)
            .find_optimal_bounds(&[region])
            .unwrap();

        let mid = bounds.upper.eval(&[-0.5]) - bounds.lower.eval(&[-0.5]);
        let span = Activation::Sigmoid.value(region.1) - Activation::Sigmoid.value(region.0);
        assert!(mid < span, "gap {mid} not tighter than the range {span}");
    }

    #[test]
    fn test_linear_function_is_recovered() {
        let bounder = LinearBounder::new(|x: &[f64]| 2.0 * x[0] - 1.0, 2.0, 0.0).with_eps(1e-3);
        let bounds = bounder.find_optimal_bounds(&[(-1.0, 1.0)]).unwrap();

        for bound in [&bounds.lower, &bounds.upper] {
            assert_abs_diff_eq!(bound.slope[0], 2.0, epsilon = 1e-6);
            assert_abs_diff_eq!(bound.intercept, -1.0, epsilon = 1e-3);
        }
        assert_sound(|x| 2.0 * x - 1.0, &bounds, (-1.0, 1.0));
    }

    #[test]
    fn test_finite_difference_gradient() {
        let bounds = LinearBounder::new(|x: &[f64]| x[0] * x[0], 4.0, 2.0)
            .find_optimal_bounds(&[(-2.0, 2.0)])
            .unwrap();
        assert_sound(|x| x * x, &bounds, (-2.0, 2.0));
    }

    #[test]
    fn test_bounds_do_not_depend_on_lp_seed() {
        let region = (-3.0, 2.0);
        let solver = Solver::new().with_tolerance(1e-10).with_max_iterations(100_000);
        let reference = LinearBounder::for_activation(Activation::Sigmoid)
            .with_solver(solver.clone())
            .find_optimal_bounds(&[region])
            .unwrap();

        for seed in [1, 7, 12345] {
            let bounds = LinearBounder::for_activation(Activation::Sigmoid)
                .with_solver(solver.clone())
                .with_seed(seed)
                .find_optimal_bounds(&[region])
                .unwrap();
            for (a, b) in [(&bounds.lower, &reference.lower), (&bounds.upper, &reference.upper)] {
                assert_abs_diff_eq!(a.slope[0], b.slope[0], epsilon = 1e-8);
                assert_abs_diff_eq!(a.intercept, b.intercept, epsilon = 1e-8);
            }
            assert_sound(|x| Activation::Sigmoid.value(x), &bounds, region);
        }
    }

    #[test]
    fn test_solver_settings_reach_the_lp() {
        let bounder = LinearBounder::for_activation(Activation::Tanh).with_solver(Solver::new().with_max_iterations(0));
        assert_eq!(
            bounder.find_optimal_bounds(&[(-1.0, 1.0)]),
            Err(BoundError::Solve(SolveError::IterationLimit { limit: 0 }))
        );
    }

    #[test]
    fn test_invalid_inputs() {
        let bounder = LinearBounder::for_activation(Activation::Tanh);
        assert!(matches!(
            bounder.find_optimal_bounds(&[(1.0, 0.0)]),
            Err(BoundError::InvalidRegion { axis: 0, .. })
        ));
        assert_eq!(
            bounder.find_optimal_bounds(&[(0.0, 1.0), (0.0, 1.0)]),
            Err(BoundError::UnsupportedDimension(2))
        );

        let bounder = LinearBounder::for_activation(Activation::Tanh).with_initial_points(2);
        assert!(matches!(
            bounder.find_optimal_bounds(&[(0.0, 1.0)]),
            Err(BoundError::TooFewSamples { .. })
        ));
    }

    #[test]
    fn test_non_finite_sample() {
        let bounder = LinearBounder::new(|x: &[f64]| x[0].ln(), 1.0, 1.0);
        assert!(matches!(
            bounder.find_optimal_bounds(&[(-1.0, 1.0)]),
            Err(BoundError::NonFiniteSample(_))
        ));
    }

    #[test]
    fn test_refinement_limit() {
        // Near-touching cells would need a radius around 1e-6 to meet eps
        let bounder = LinearBounder::new(|x: &[f64]| (20.0 * x[0]).sin(), 20.0, 400.0)
            .with_eps(1e-9)
            .with_max_points(1_000);
        assert!(matches!(
            bounder.find_optimal_bounds(&[(0.0, 3.0)]),
            Err(BoundError::RefinementLimit { .. })
        ));
    }
}
