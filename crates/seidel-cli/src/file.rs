//! JSON problem files.
//!
//! ```json
//! {
//!   "dimension": 2,
//!   "objective": { "direction": [1, 1], "sense": "maximize" },
//!   "constraints": [
//!     { "name": "x_max", "coefficients": [1, 0], "op": "le", "rhs": 10 }
//!   ]
//! }
//! ```

use std::path::{Path, PathBuf};

use seidel_lp::{ConstraintOp, Problem, ProblemError, Sense};
use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FileError {
    #[error("Error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid problem file: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid problem: {0}")]
    Problem(#[from] ProblemError),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProblemFile {
    pub dimension: usize,
    #[serde(default)]
    pub objective: Option<ObjectiveSpec>,
    #[serde(default)]
    pub constraints: Vec<ConstraintSpec>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ObjectiveSpec {
    pub direction: Vec<f64>,
    #[serde(default)]
    pub sense: Sense,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConstraintSpec {
    #[serde(default)]
    pub name: Option<String>,
    pub coefficients: Vec<f64>,
    #[serde(default = "default_op")]
    pub op: ConstraintOp,
    pub rhs: f64,
}

fn default_op() -> ConstraintOp {
    ConstraintOp::Le
}

/// A problem plus the label of the file constraint behind each half-space
#[derive(Debug)]
pub struct LabeledProblem {
    pub problem: Problem,
    pub labels: Vec<String>,
}

impl ProblemFile {
    pub fn parse(source: &str) -> Result<Self, FileError> {
        Ok(serde_json::from_str(source)?)
    }

    pub fn load(path: &Path) -> Result<Self, FileError> {
        let source = std::fs::read_to_string(path).map_err(|source| FileError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&source)
    }

    pub fn build(&self) -> Result<LabeledProblem, ProblemError> {
        let mut problem = Problem::new(self.dimension);
        if let Some(objective) = &self.objective {
            problem.set_objective(objective.direction.clone(), objective.sense)?;
        }

        let mut labels = Vec::new();
        for (i, c) in self.constraints.iter().enumerate() {
            problem.add_constraint(c.coefficients.clone(), c.op, c.rhs)?;
            let label = c.name.clone().unwrap_or_else(|| format!("c{}", i));
            labels.resize(problem.num_constraints(), label);
        }

        Ok(LabeledProblem { problem, labels })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_build() {
        let source = r#"{
            "dimension": 2,
            "objective": { "direction": [1, 1], "sense": "maximize" },
            "constraints": [
                { "name": "x_max", "coefficients": [1, 0], "rhs": 10 },
                { "coefficients": [0, 1], "op": "ge", "rhs": 0 },
                { "name": "diag", "coefficients": [1, -1], "op": "eq", "rhs": 0 }
            ]
        }"#;
        let file = ProblemFile::parse(source).unwrap();
        let labeled = file.build().unwrap();

        assert_eq!(labeled.problem.dimension(), 2);
        assert_eq!(labeled.problem.num_constraints(), 4);
        assert_eq!(labeled.labels, vec!["x_max", "c1", "diag", "diag"]);
        assert_eq!(labeled.problem.objective().sense, Sense::Maximize);
    }

    #[test]
    fn test_default_objective_and_sense() {
        let file = ProblemFile::parse(r#"{ "dimension": 1, "objective": { "direction": [2] } }"#).unwrap();
        let labeled = file.build().unwrap();
        assert_eq!(labeled.problem.objective().sense, Sense::Maximize);
        assert_eq!(labeled.problem.num_constraints(), 0);
    }

    #[test]
    fn test_dimension_mismatch() {
        let file = ProblemFile::parse(
            r#"{ "dimension": 2, "constraints": [ { "coefficients": [1], "rhs": 1 } ] }"#,
        )
        .unwrap();
        assert!(matches!(
            file.build(),
            Err(ProblemError::InvalidDimension { expected: 2, found: 1, .. })
        ));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = ProblemFile::parse(r#"{ "dimension": 1, "bogus": true }"#).unwrap_err();
        assert!(matches!(err, FileError::Json(_)));
    }
}
