//! Activation helpers used by the decoder.

/// Logistic sigmoid evaluated through `tanh`, which stays finite for any
/// finite input.
#[inline]
pub(crate) fn sigmoid(x: f32) -> f32 {
    0.5 * (1.0 + (0.5 * x).tanh())
}

/// Inverse of [`sigmoid`] for `p` in `[0, 1]`.
///
/// Returns `-inf` at 0 and `+inf` at 1.
#[inline]
pub(crate) fn logit(p: f32) -> f32 {
    2.0 * (2.0 * p - 1.0).atanh()
}
