//! FM demodulation
//!
//! SSTV is a frequency-modulated audio subcarrier: brightness,
//! sync, and the VIS header are all encoded as the
//! instantaneous frequency of a single tone between roughly
//! 1100 Hz and 2300 Hz. The demodulator estimates that
//! frequency at every instant.
//!
//! The real input is mixed down to complex baseband by a
//! local oscillator at the center of the band, low-pass
//! filtered to reject the image and out-of-band noise, and
//! then passed through a quadrature discriminator:
//!
//! ```txt
//! f[n] = fc + arg(y[n] · conj(y[n-1])) · fs / 2π
//! ```
//!
//! The discriminator is insensitive to amplitude, so no
//! AGC is required. The magnitude `|y[n]|` is reported
//! alongside each estimate so that later stages can tell
//! signal from silence.

use num_complex::Complex;

use crate::filter::{FilterCoeff, Window};

/// A demodulator
///
/// New samples are loaded into the demodulator with
/// [`push()`](#method.push). At any time, execute
/// [`demod()`](#method.demod) to demodulate the samples
/// in the history buffer.
pub trait Demod: Clone + std::fmt::Debug + Sized {
    /// Demodulator output type
    type Output;

    /// Push samples into the demodulator
    ///
    /// Appends a fresh slice of `input` samples to the
    /// demodulator's history.
    fn push<S>(&mut self, input: S)
    where
        S: AsRef<[f32]>;

    /// Demodulate with the current history
    ///
    /// Produces an estimate for the most recently pushed
    /// sample. Estimates may depend on the previous call
    /// to `demod()`.
    fn demod(&mut self) -> Self::Output;

    /// Reset to zero initial conditions
    fn reset(&mut self);
}

/// Instantaneous frequency estimate
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FreqEstimate {
    /// Instantaneous frequency (Hz)
    pub freq_hz: f32,

    /// Analytic signal magnitude
    ///
    /// A real sinusoid of amplitude `A` has a magnitude of
    /// `A / 2`.
    pub magnitude: f32,
}

/// Quadrature FM demodulator
///
/// The output of [`demod()`](#method.demod) is the
/// frequency of the input, in Hz, averaged over all samples
/// pushed since the previous call. Call `demod()` at most
/// once every few samples, or the phase step may alias: the
/// input must not move more than half a cycle, relative to
/// the center frequency, between calls.
#[derive(Clone, Debug)]
pub struct FmDemod {
    input_rate: f64,
    center_hz: f32,
    rad_per_sample: f64,
    phase: f64,
    window: Window<Complex<f32>>,
    lpf: FilterCoeff<f32>,
    last: Complex<f32>,
    pending: usize,
}

impl FmDemod {
    /// Create demodulator
    ///
    /// The input is sampled at `input_rate` Hz. It is mixed
    /// down from `center_hz` and low-pass filtered with the
    /// `lpf` taps.
    pub fn new(input_rate: u32, center_hz: f32, lpf: FilterCoeff<f32>) -> Self {
        let input_rate = input_rate as f64;
        Self {
            input_rate,
            center_hz,
            rad_per_sample: 2.0 * std::f64::consts::PI * center_hz as f64 / input_rate,
            phase: 0.0,
            window: Window::new(lpf.len()),
            lpf,
            last: Complex::new(0.0, 0.0),
            pending: 0,
        }
    }

    /// Delay imposed by the filter, in samples
    ///
    /// An estimate produced after pushing sample `n` describes
    /// the input at sample `n - delay()`.
    #[inline]
    pub fn delay(&self) -> usize {
        self.lpf.delay()
    }

    // Mix one real sample to baseband
    #[inline]
    fn mix(&mut self, sa: f32) -> Complex<f32> {
        let lo = Complex::new(self.phase.cos() as f32, -self.phase.sin() as f32);
        self.phase = (self.phase + self.rad_per_sample) % (2.0 * std::f64::consts::PI);
        lo * sa
    }
}

impl Demod for FmDemod {
    type Output = FreqEstimate;

    fn push<S>(&mut self, input: S)
    where
        S: AsRef<[f32]>,
    {
        for sa in input.as_ref() {
            let bb = self.mix(*sa);
            self.window.push_scalar(bb);
            self.pending += 1;
        }
    }

    fn demod(&mut self) -> FreqEstimate {
        let y: Complex<f32> = self.lpf.filter(&self.window);
        let lag = usize::max(self.pending, 1) as f64;
        let step = (y * self.last.conj()).arg() as f64;
        self.last = y;
        self.pending = 0;

        FreqEstimate {
            freq_hz: self.center_hz
                + (step * self.input_rate / (2.0 * std::f64::consts::PI * lag)) as f32,
            magnitude: y.norm(),
        }
    }

    fn reset(&mut self) {
        self.phase = 0.0;
        self.window.reset();
        self.last = Complex::new(0.0, 0.0);
        self.pending = 0;
    }
}
