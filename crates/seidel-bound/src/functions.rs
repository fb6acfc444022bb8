use std::fmt;
use std::str::FromStr;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown function: {0} (expected sigmoid, tanh or softplus)")]
pub struct UnknownFunction(pub String);

/// Scalar activation functions with known global derivative bounds
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    Sigmoid,
    Tanh,
    Softplus,
}

impl Activation {
    pub const ALL: [Activation; 3] = [Activation::Sigmoid, Activation::Tanh, Activation::Softplus];

    pub fn value(self, x: f64) -> f64 {
        match self {
            Activation::Sigmoid => sigmoid(x),
            Activation::Tanh => x.tanh(),
            // log(1 + e^x) without overflow for large x
            Activation::Softplus => x.max(0.0) + (-x.abs()).exp().ln_1p(),
        }
    }

    pub fn derivative(self, x: f64) -> f64 {
        match self {
            Activation::Sigmoid => {
                let s = sigmoid(x);
                s * (1.0 - s)
            }
            Activation::Tanh => 1.0 - x.tanh().powi(2),
            Activation::Softplus => sigmoid(x),
        }
    }

    /// Lipschitz constant of the function, `sup |f'|`
    pub fn lipschitz(self) -> f64 {
        match self {
            Activation::Sigmoid => 0.25,
            Activation::Tanh | Activation::Softplus => 1.0,
        }
    }

    /// Lipschitz constant of the derivative, `sup |f''|`
    pub fn smoothness(self) -> f64 {
        match self {
            Activation::Sigmoid => 1.0 / (6.0 * 3f64.sqrt()),
            Activation::Tanh => 4.0 / (3.0 * 3f64.sqrt()),
            Activation::Softplus => 0.25,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Activation::Sigmoid => "sigmoid",
            Activation::Tanh => "tanh",
            Activation::Softplus => "softplus",
        }
    }
}

fn sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

impl FromStr for Activation {
    type Err = UnknownFunction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Activation::ALL
            .into_iter()
            .find(|a| a.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownFunction(s.to_string()))
    }
}

impl fmt::Display for Activation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_parse() {
        assert_eq!("tanh".parse(), Ok(Activation::Tanh));
        assert_eq!("Sigmoid".parse(), Ok(Activation::Sigmoid));
        assert_eq!(
            "relu".parse::<Activation>(),
            Err(UnknownFunction("relu".to_string()))
        );
    }

    #[test]
    fn test_derivative_matches_finite_differences() {
        let h = 1e-6;
        for activation in Activation::ALL {
            for x in [-4.0, -0.5, 0.0, 1.3, 30.0] {
                let numeric = (activation.value(x + h) - activation.value(x - h)) / (2.0 * h);
                assert_relative_eq!(activation.derivative(x), numeric, epsilon = 1e-6);
            }
        }
    }

    #[test]
    fn test_constants_bound_sampled_derivatives() {
        let h = 1e-4;
        for activation in Activation::ALL {
            for i in -400..=400 {
                let x = i as f64 * 0.02;
                let second = (activation.derivative(x + h) - activation.derivative(x - h)) / (2.0 * h);
                assert!(activation.derivative(x).abs() <= activation.lipschitz() + 1e-12);
                assert!(second.abs() <= activation.smoothness() + 1e-6);
            }
        }
    }

    #[test]
    fn test_softplus_is_stable() {
        assert_relative_eq!(Activation::Softplus.value(800.0), 800.0);
        assert_eq!(Activation::Softplus.value(-800.0), 0.0);
    }
}
