//! Instantaneous frequency trace

use crate::demod::{Demod, FmDemod};

/// Direction of a threshold crossing
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Edge {
    /// From at-or-above the threshold to below it
    Falling,

    /// From below the threshold to at-or-above it
    Rising,
}

/// Demodulated recording
///
/// Holds the instantaneous frequency, in Hz, and the analytic
/// signal magnitude of an entire recording. Entry `i` describes
/// the input at time `i / rate()` seconds. The trace is
/// time-aligned with the input: the demodulator's filter delay
/// has already been removed.
///
/// Positions within the trace are expressed as fractional
/// sample indices (`f64`) so that long lines do not accumulate
/// rounding error.
#[derive(Clone, Debug, PartialEq)]
pub struct FrequencyTrace {
    rate: f64,
    freq: Vec<f32>,
    magnitude: Vec<f32>,
}

impl FrequencyTrace {
    /// Demodulate `samples`
    ///
    /// `samples` are taken at `input_rate` Hz. Every
    /// `decimation`-th estimate is kept, so the trace has
    /// `ceil(samples.len() / decimation)` entries.
    pub fn demodulate(
        samples: &[f32],
        input_rate: u32,
        decimation: u32,
        demod: &mut FmDemod,
    ) -> Self {
        let decimation = u32::max(decimation, 1) as usize;
        let delay = demod.delay();
        let len = (samples.len() + decimation - 1) / decimation;

        let mut freq = Vec::with_capacity(len);
        let mut magnitude = Vec::with_capacity(len);

        demod.reset();
        let padded = samples
            .iter()
            .copied()
            .chain(std::iter::repeat(0.0f32).take(delay));
        for (n, sa) in padded.enumerate() {
            demod.push(&[sa]);
            if n >= delay && (n - delay) % decimation == 0 {
                let est = demod.demod();
                freq.push(est.freq_hz);
                magnitude.push(est.magnitude);
            }
        }

        Self {
            rate: input_rate as f64 / decimation as f64,
            freq,
            magnitude,
        }
    }

    /// Trace sampling rate (Hz)
    #[inline]
    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// Number of entries
    #[inline]
    pub fn len(&self) -> usize {
        self.freq.len()
    }

    /// True if the trace is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.freq.is_empty()
    }

    /// Trace duration (s)
    pub fn duration_secs(&self) -> f64 {
        self.len() as f64 / self.rate
    }

    /// Convert a duration to trace samples
    #[inline]
    pub fn samples(&self, secs: f64) -> f64 {
        secs * self.rate
    }

    /// Convert a trace position to seconds
    #[inline]
    pub fn secs(&self, pos: f64) -> f64 {
        pos / self.rate
    }

    /// Instantaneous frequencies (Hz)
    #[inline]
    pub fn freq(&self) -> &[f32] {
        &self.freq
    }

    /// Analytic signal magnitudes
    #[inline]
    pub fn magnitude(&self) -> &[f32] {
        &self.magnitude
    }

    /// Mean frequency over `[start, end)`
    ///
    /// Positions are fractional sample indices. Intervals
    /// shorter than one sample use the sample nearest their
    /// midpoint. Returns `None` if the interval does not
    /// overlap the trace.
    pub fn mean_freq(&self, start: f64, end: f64) -> Option<f32> {
        mean_over(&self.freq, start, end)
    }

    /// Mean analytic signal magnitude over `[start, end)`
    pub fn mean_magnitude(&self, start: f64, end: f64) -> Option<f32> {
        mean_over(&self.magnitude, start, end)
    }

    /// Find the first threshold crossing after `from`
    ///
    /// Searches up to, but not including, `limit`. Returns
    /// the index of the first sample on the far side of the
    /// `threshold`.
    pub fn find_crossing(
        &self,
        from: usize,
        limit: usize,
        threshold: f32,
        edge: Edge,
    ) -> Option<usize> {
        let limit = usize::min(limit, self.len());
        let from = usize::max(from, 1);
        (from..limit).find(|&i| {
            let (prev, now) = (self.freq[i - 1], self.freq[i]);
            match edge {
                Edge::Falling => prev >= threshold && now < threshold,
                Edge::Rising => prev < threshold && now >= threshold,
            }
        })
    }

    /// Build a trace from its parts
    #[cfg(test)]
    pub(crate) fn from_parts(rate: f64, freq: Vec<f32>, magnitude: Vec<f32>) -> Self {
        assert_eq!(freq.len(), magnitude.len());
        Self {
            rate,
            freq,
            magnitude,
        }
    }

    /// Build a trace directly from frequency segments
    ///
    /// Each `(freq_hz, secs)` segment is rendered at a
    /// constant frequency with unit magnitude. Fractional
    /// durations accumulate without drift.
    #[cfg(test)]
    pub(crate) fn from_segments(rate: f64, segments: &[(f32, f64)]) -> Self {
        let mut freq = Vec::new();
        let mut elapsed = 0.0f64;
        for (hz, secs) in segments {
            elapsed += secs;
            let target = (elapsed * rate).round() as usize;
            freq.resize(usize::max(target, freq.len()), *hz);
        }
        let magnitude = vec![1.0f32; freq.len()];
        Self {
            rate,
            freq,
            magnitude,
        }
    }
}

// Mean of `data` over fractional index range [start, end)
fn mean_over(data: &[f32], start: f64, end: f64) -> Option<f32> {
    if !(start < data.len() as f64) || !(end > 0.0) || !(end >= start) {
        return None;
    }

    let i0 = f64::max(start.round(), 0.0) as usize;
    let i1 = usize::min(end.round() as usize, data.len());
    if i1 <= i0 {
        let mid = f64::max((start + end) / 2.0, 0.0) as usize;
        return data.get(mid).copied();
    }

    let sum: f64 = data[i0..i1].iter().map(|x| *x as f64).sum();
    Some((sum / (i1 - i0) as f64) as f32)
}
