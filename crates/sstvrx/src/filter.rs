//! # FIR linear filters
//!
//! The [`FilterCoeff`] implements the multiply-accumulate
//! operation of a Finite Impulse Response filter, and the
//! [`Window`] implements the sliding sample history which
//! feeds it.
//!
//! ```txt
//! // the sample L is the youngest sample, and O is the oldest
//! // [ O | N | M | L ]
//! ```
//!
//! New samples are pushed onto the right of the `Window`, and
//! the oldest sample ages off the left. The output for the
//! current instant is `coeff.filter(&window)`.
//!
//! The demodulator uses a real-valued low-pass filter over a
//! window of complex baseband samples. Any compatible arithmetic
//! types may be mixed, provided `In * Coeff → Out`.

use std::collections::VecDeque;

use nalgebra::base::Scalar;
use nalgebra::DVector;
use num_traits::{One, Zero};

/// FIR filter coefficients
#[derive(Debug, Clone, PartialEq, PartialOrd, Eq)]
pub struct FilterCoeff<T>(DVector<T>)
where
    T: Copy + Scalar + One + Zero;

impl<T> FilterCoeff<T>
where
    T: Copy + Scalar + One + Zero,
{
    /// Create an identity filter
    ///
    /// The identity filter is a "no-op" impulse response
    pub fn from_identity(len: usize) -> Self {
        let mut out = FilterCoeff(DVector::from_element(len, T::zero()));
        out.0[0] = T::one();
        out
    }

    /// Number of filter coefficients
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Group delay, in samples
    ///
    /// Valid for the linear-phase (symmetric) filters which
    /// this crate designs.
    pub fn delay(&self) -> usize {
        self.0.len().saturating_sub(1) / 2
    }

    /// Perform FIR filtering with the given sample history
    ///
    /// `history` must output the oldest sample first and the
    /// newest sample last. The newest sample is used for
    /// feedforward lag 0. `history` SHOULD contain at least
    /// `self.len()` samples; missing samples are treated as
    /// zeros.
    pub fn filter<W, In, Out>(&self, history: W) -> Out
    where
        W: IntoIterator<Item = In>,
        W::IntoIter: DoubleEndedIterator,
        In: Copy + Scalar + std::ops::Mul<T, Output = Out>,
        Out: Copy + Scalar + Zero + std::ops::AddAssign,
    {
        multiply_accumulate(history, self.as_ref())
    }

    /// Return filter coefficients as slice
    #[inline]
    pub fn as_slice(&self) -> &[T] {
        self.0.as_slice()
    }
}

impl FilterCoeff<f32> {
    /// Design a windowed-sinc low-pass filter
    ///
    /// Creates a linear-phase low-pass filter with `ntaps`
    /// coefficients and a -6 dB point at `cutoff`, which is
    /// given as a fraction of the sampling rate
    /// (`0.0 < cutoff < 0.5`). The ideal response is shaped
    /// with a Hamming window and normalized for unity gain
    /// at DC.
    ///
    /// Even tap counts are rounded up to the next odd number
    /// so that the group delay is an integer number of samples.
    pub fn lowpass(ntaps: usize, cutoff: f32) -> Self {
        let ntaps = usize::max(ntaps | 1, 1);
        if ntaps == 1 {
            return Self::from_identity(1);
        }

        let cutoff = f64::clamp(cutoff as f64, 1.0e-6, 0.5);
        let mid = (ntaps / 2) as f64;
        let span = (ntaps - 1) as f64;

        let mut taps: Vec<f64> = (0..ntaps)
            .map(|i| {
                let n = i as f64 - mid;
                let ideal = if n == 0.0 {
                    2.0 * cutoff
                } else {
                    f64::sin(2.0 * std::f64::consts::PI * cutoff * n) / (std::f64::consts::PI * n)
                };
                let hamming =
                    0.54 - 0.46 * f64::cos(2.0 * std::f64::consts::PI * i as f64 / span);
                ideal * hamming
            })
            .collect();

        let dc_gain: f64 = taps.iter().sum();
        for t in taps.iter_mut() {
            *t /= dc_gain;
        }

        FilterCoeff(DVector::from_iterator(
            ntaps,
            taps.into_iter().map(|t| t as f32),
        ))
    }
}

impl<T> AsRef<[T]> for FilterCoeff<T>
where
    T: Copy + Scalar + One + Zero,
{
    #[inline]
    fn as_ref(&self) -> &[T] {
        self.as_slice()
    }
}

/// Filter window
///
/// Implements a fixed-size lookback window for FIR filters.
#[derive(Clone, Debug)]
pub struct Window<T>(VecDeque<T>)
where
    T: Copy + Scalar + Zero;

impl<T> Window<T>
where
    T: Copy + Scalar + Zero,
{
    /// Create empty window, filling it with zeros
    ///
    /// Creates a new `Window` with the given `len`gth
    pub fn new(len: usize) -> Self {
        let mut q = VecDeque::with_capacity(len);
        q.resize(len, T::zero());
        Self(q)
    }

    /// Reset to zero initial conditions
    pub fn reset(&mut self) {
        for s in &mut self.0 {
            *s = T::zero()
        }
    }

    /// Append a scalar to the sample window
    ///
    /// Appends the `input` scalar to the right side of the Window.
    /// It becomes the last / most recent sample of Window.
    /// Returns the sample that was formerly the oldest
    /// sample in the Window.
    #[inline]
    pub fn push_scalar(&mut self, input: T) -> T {
        let out = self.0.pop_front().unwrap_or(T::zero());
        self.0.push_back(input);
        out
    }
}

impl<'a, T> IntoIterator for &'a Window<T>
where
    T: Copy + Scalar + Zero,
{
    type Item = T;

    type IntoIter = std::iter::Copied<std::collections::vec_deque::Iter<'a, T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter().copied()
    }
}

// Multiply-accumulate operation
//
// ```txt
// out = Σ history[N-1-i] * coeff[i]
// ```
//
// The most recent sample is the last one output by `history`
// and is multiplied with `coeff[0]`. If `history` is shorter
// than `coeff`, the sample history is assumed to be zero
// outside of its range.
fn multiply_accumulate<W, In, Coeff, Out>(history: W, coeff: &[Coeff]) -> Out
where
    W: IntoIterator<Item = In>,
    W::IntoIter: DoubleEndedIterator,
    In: Copy + Scalar + std::ops::Mul<Coeff, Output = Out>,
    Coeff: Copy + Scalar,
    Out: Copy + Scalar + Zero + std::ops::AddAssign,
{
    let mut out = Out::zero();
    for (hi, co) in history.into_iter().rev().zip(coeff.iter()) {
        out += hi * *co;
    }
    out
}
