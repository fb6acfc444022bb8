pub mod bounder;
pub mod functions;
pub mod sampling;

#[cfg(feature = "wasm")]
pub mod wasm;

pub use bounder::{AffineBound, BoundError, LinearBounder, LinearBounds};
pub use functions::{Activation, UnknownFunction};
pub use sampling::{Cell, Grid};
