//! Portable math kernels used throughout the DSP chain.
//!
//! The reference implementation hand-vectorizes these with SSSE3/AVX2
//! intrinsics behind a `SimdVector` abstraction. We keep the scalar
//! reference algorithms -- same constants, same approximation error bounds
//! -- and let the compiler auto-vectorize; a real SIMD backend is an
//! orthogonal optimization, not part of this crate's scope.

pub mod lagrange;
pub mod levinson;
pub mod running_sum;
pub mod trig;

pub use lagrange::LagrangeInterpolator;
pub use levinson::levinson_durbin;
pub use running_sum::RunningSum;
pub use trig::{approx_atan2, approx_cos, approx_normalized_atan2, approx_sin};
