mod numeric;
mod problem;
mod seidel;
mod solution;

pub use problem::{Constraint, ConstraintOp, Objective, Problem, ProblemError, Sense};
pub use seidel::{SolveError, Solver};
pub use solution::{ConstraintViolation, Solution, SolutionStatus};
