//! WASM bindings for seidel
//!
//! Entry points for notebook and browser callers that hold their data in
//! typed arrays. Errors surface as JS strings.

use wasm_bindgen::prelude::*;

use seidel_lp::{Problem, Sense, Solution, Solver};

use crate::bounder::LinearBounder;
use crate::functions::Activation;

fn to_js_error(e: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&e.to_string())
}

/// Solve `max/min c·x` subject to `A x <= b`, with `a` holding `A` in
/// row-major order. `max_iterations` caps the restrictions to a boundary
/// hyperplane.
#[wasm_bindgen]
pub fn solve_dense(
    a: &[f64],
    b: &[f64],
    c: &[f64],
    maximize: bool,
    seed: u64,
    max_iterations: Option<usize>,
) -> Result<JsValue, JsValue> {
    let result = dense_result(a, b, c, maximize, seed, max_iterations).map_err(|e| JsValue::from_str(&e))?;
    serde_wasm_bindgen::to_value(&result).map_err(to_js_error)
}

fn dense_result(
    a: &[f64],
    b: &[f64],
    c: &[f64],
    maximize: bool,
    seed: u64,
    max_iterations: Option<usize>,
) -> Result<SolveResult, String> {
    let sense = if maximize { Sense::Maximize } else { Sense::Minimize };
    let problem = Problem::from_dense(a, b, c, sense).map_err(|e| e.to_string())?;
    let mut solver = Solver::new();
    if let Some(max) = max_iterations {
        solver = solver.with_max_iterations(max);
    }
    let solution = solver.solve(&problem, seed).map_err(|e| e.to_string())?;

    Ok(SolveResult {
        status: solution.status().to_string(),
        point: solution.point().map(<[f64]>::to_vec).unwrap_or_default(),
        value: solution.value(),
        direction: solution.direction().map(<[f64]>::to_vec).unwrap_or_default(),
        binding_constraints: match &solution {
            Solution::Optimal { point, .. } => problem.binding_constraints(point, solver.tolerance()),
            _ => Vec::new(),
        },
    })
}

#[derive(Debug, serde::Serialize)]
struct SolveResult {
    status: String,
    point: Vec<f64>,
    value: Option<f64>,
    direction: Vec<f64>,
    binding_constraints: Vec<usize>,
}

/// Linear bounds of a JS function of one variable over `[lower, upper]`.
/// Without `derivative` the gradient is estimated by central differences.
#[wasm_bindgen]
pub fn bound_function(
    f: &js_sys::Function,
    derivative: Option<js_sys::Function>,
    lower: f64,
    upper: f64,
    lipschitz: f64,
    smoothness: f64,
    eps: Option<f64>,
) -> Result<JsValue, JsValue> {
    let mut bounder = LinearBounder::new(move |x: &[f64]| call_scalar(f, x[0]), lipschitz, smoothness);
    if let Some(derivative) = &derivative {
        bounder = bounder.with_gradient(move |x: &[f64]| vec![call_scalar(derivative, x[0])]);
    }
    if let Some(eps) = eps {
        bounder = bounder.with_eps(eps);
    }

    let bounds = bounder.find_optimal_bounds(&[(lower, upper)]).map_err(to_js_error)?;
    serde_wasm_bindgen::to_value(&bounds).map_err(to_js_error)
}

/// Linear bounds of a built-in activation (`sigmoid`, `tanh`, `softplus`).
#[wasm_bindgen]
pub fn bound_activation(name: &str, lower: f64, upper: f64) -> Result<JsValue, JsValue> {
    let activation: Activation = name.parse().map_err(to_js_error)?;
    let bounds = LinearBounder::for_activation(activation)
        .find_optimal_bounds(&[(lower, upper)])
        .map_err(to_js_error)?;
    serde_wasm_bindgen::to_value(&bounds).map_err(to_js_error)
}

/// A thrown exception or non-numeric return becomes NaN, which the bounder
/// reports as a non-finite sample.
fn call_scalar(f: &js_sys::Function, x: f64) -> f64 {
    f.call1(&JsValue::NULL, &JsValue::from_f64(x))
        .ok()
        .and_then(|v| v.as_f64())
        .unwrap_or(f64::NAN)
}
