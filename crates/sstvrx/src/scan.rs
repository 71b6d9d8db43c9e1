//! Scan-line decoding
//!
//! The [`ScanLines`] iterator converts the frequency trace of
//! an image, which begins at a known position, into a
//! sequence of [`ScanLine`]s. Each *sync period* of the mode
//! yields one image row, or two for PD modes.
//!
//! For every sync period, the decoder:
//!
//! 1. predicts where the sync pulse should be from the last
//!    located pulse and the measured line period;
//! 2. stops if the period runs off the end of the trace, or if
//!    the signal power has faded;
//! 3. searches near the prediction for the sync pulse, falling
//!    back to the prediction if no pulse is found; and
//! 4. samples each scan of the period into pixel values.
//!
//! Sender and receiver sample clocks rarely agree exactly. A
//! clock error of a few hundred ppm will slant the image by
//! many pixels over the length of a transmission. The line
//! period is therefore estimated by linear regression over
//! recently-located sync pulses and is used to scale all
//! intra-line timing.

use std::collections::VecDeque;
use std::iter::FusedIterator;

use arraydeque::ArrayDeque;

#[cfg(not(test))]
use log::{debug, info, trace};

#[cfg(test)]
use std::println as debug;
#[cfg(test)]
use std::println as info;
#[cfg(test)]
use std::println as trace;

use crate::image::ScanLine;
use crate::modes::{Component, ModeSpec};
use crate::trace::{Edge, FrequencyTrace};
use crate::waveform::{freq_to_value, SELECTOR_BY_HZ, SELECTOR_RY_HZ, SYNC_THRESHOLD_HZ};

/// Scan-line decoder tuning
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScanConfig {
    /// Search for each sync pulse this far on either side of
    /// its predicted position (s)
    pub sync_window_secs: f64,

    /// Fraction of a sync pulse which must lie below the
    /// sync threshold for the pulse to be accepted
    pub sync_min_fraction: f32,

    /// Maximum line period deviation from nominal, as a fraction
    pub drift_max: f64,

    /// Stop when the signal power falls below this fraction
    /// of the reference level
    pub squelch_ratio: f32,

    /// Stop after this many consecutive sync periods without
    /// a located sync pulse
    pub max_missed_syncs: u32,
}

/// Reason the scan-line decoder stopped
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StopReason {
    /// Every row of the image was decoded
    Complete,

    /// The trace ended before the image was complete
    Truncated,

    /// The signal faded or sync was lost
    SignalLost,
}

/// Lazy scan-line decoder
///
/// Produces image rows in order until the image is complete
/// or the signal ends. The iterator is finite and cannot be
/// restarted. Once it returns `None`, the
/// [`stop_reason()`](ScanLines::stop_reason) is available.
#[derive(Clone, Debug)]
pub struct ScanLines<'t> {
    trace: &'t FrequencyTrace,
    mode: &'static ModeSpec,
    config: ScanConfig,
    reference_level: f32,
    line: usize,
    drift: DriftTracker,
    missed: u32,
    queue: VecDeque<ScanLine>,
    stop: Option<StopReason>,
}

impl<'t> ScanLines<'t> {
    /// Decode `mode` from `trace`
    ///
    /// The sync pulse of the first line is expected at trace
    /// position `first_sync`. Decoding stops if the signal
    /// magnitude falls well below `reference_level`.
    pub fn new(
        trace: &'t FrequencyTrace,
        mode: &'static ModeSpec,
        first_sync: f64,
        reference_level: f32,
        config: ScanConfig,
    ) -> Self {
        let nominal = trace.samples(mode.line_secs);
        Self {
            trace,
            mode,
            config,
            reference_level,
            line: 0,
            drift: DriftTracker::new(nominal, config.drift_max, first_sync),
            missed: 0,
            queue: VecDeque::with_capacity(mode.rows_per_line),
            stop: None,
        }
    }

    /// Why decoding stopped
    ///
    /// `None` while rows remain to be decoded.
    pub fn stop_reason(&self) -> Option<StopReason> {
        if self.queue.is_empty() {
            self.stop
        } else {
            None
        }
    }

    /// Current line period estimate (s)
    pub fn line_secs(&self) -> f64 {
        self.trace.secs(self.drift.period())
    }

    // Decode one sync period into the queue, or stop
    fn decode_period(&mut self) {
        let mode = self.mode;
        let trace = self.trace;

        if self.line >= mode.line_count() {
            debug!("scan: image complete");
            self.stop = Some(StopReason::Complete);
            return;
        }

        let period = self.drift.period();
        let scale = period / self.drift.nominal();
        let offset = trace.samples(mode.sync_offset_secs) * scale;
        let predicted = self.drift.predict(self.line);

        // span of the period, given its sync position
        let span = |sync: f64| (f64::max(sync - offset, 0.0), sync - offset + period);

        let (start, end) = span(predicted);
        if end > trace.len() as f64 + Self::END_SLACK {
            info!("scan: recording ends at line {}", self.line);
            self.stop = Some(StopReason::Truncated);
            return;
        }

        let level = trace.mean_magnitude(start, end).unwrap_or(0.0);
        if level < self.config.squelch_ratio * self.reference_level {
            info!(
                "scan: signal lost at line {} (level {:.4}, reference {:.4})",
                self.line, level, self.reference_level
            );
            self.stop = Some(StopReason::SignalLost);
            return;
        }

        let located = locate_sync(
            trace.freq(),
            predicted,
            trace.samples(self.config.sync_window_secs),
            trace.samples(mode.sync_secs),
            self.config.sync_min_fraction,
        );
        let (sync, degraded) = match located {
            Some(pos) => {
                trace!(
                    "scan: line {}: sync at {:.4} s ({:+.2} samples)",
                    self.line,
                    trace.secs(pos),
                    pos - predicted
                );
                self.drift.update(self.line, pos);
                self.missed = 0;
                (pos, false)
            }
            None => {
                self.missed += 1;
                debug!(
                    "scan: line {}: no sync ({} consecutive)",
                    self.line, self.missed
                );
                if self.missed >= self.config.max_missed_syncs {
                    info!("scan: sync lost at line {}", self.line);
                    self.stop = Some(StopReason::SignalLost);
                    return;
                }
                (predicted, true)
            }
        };

        let (_, end) = span(sync);
        if end > trace.len() as f64 + Self::END_SLACK {
            info!("scan: recording ends at line {}", self.line);
            self.stop = Some(StopReason::Truncated);
            return;
        }
        let line_start = sync - offset;

        // sample every scan once; shared scans serve every row
        let values: Vec<Vec<u8>> = mode
            .scans
            .iter()
            .map(|scan| {
                let s0 = line_start + trace.samples(scan.start_secs) * scale;
                let px = trace.samples(scan.duration_secs) * scale / mode.width as f64;
                (0..mode.width)
                    .map(|x| {
                        let x = x as f64;
                        trace
                            .mean_freq(s0 + x * px, s0 + (x + 1.0) * px)
                            .map(|f| freq_to_value(f, mode.black_hz, mode.white_hz))
                            .unwrap_or(0)
                    })
                    .collect()
            })
            .collect();

        let first_row = self.line * mode.rows_per_line;
        let alt_plane = self.alt_chroma_plane(line_start, scale, first_row);

        for r in 0..mode.rows_per_line {
            let mut planes: [Option<Vec<u8>>; 3] = [None, None, None];
            for (scan, vals) in mode.scans.iter().zip(values.iter()) {
                if !scan.rows.includes(r) {
                    continue;
                }
                let plane = match scan.component {
                    Component::AltChroma => alt_plane,
                    c => c.plane().unwrap_or(0),
                };
                planes[plane] = Some(vals.clone());
            }
            self.queue
                .push_back(ScanLine::new(first_row + r, planes, degraded));
        }

        self.line += 1;
    }

    // A period may overrun the trace by this many samples
    const END_SLACK: f64 = 2.0;

    // Plane carried by this period's alternating chroma scan
    //
    // The selector tone is consulted first. If it is absent or
    // ambiguous, even rows carry R−Y and odd rows B−Y.
    fn alt_chroma_plane(&self, line_start: f64, scale: f64, row: usize) -> usize {
        let by_parity = if row % 2 == 0 { 1 } else { 2 };
        let sel = match self.mode.chroma_selector {
            Some(sel) => sel,
            None => return by_parity,
        };

        let s0 = line_start + self.trace.samples(sel.start_secs) * scale;
        let len = self.trace.samples(sel.duration_secs) * scale;
        let mean = match self.trace.mean_freq(s0 + 0.2 * len, s0 + 0.8 * len) {
            Some(mean) => mean,
            None => return by_parity,
        };

        let margin = (SELECTOR_BY_HZ - SELECTOR_RY_HZ) * 3.0 / 8.0;
        if f32::abs(mean - SELECTOR_RY_HZ) < margin {
            1
        } else if f32::abs(mean - SELECTOR_BY_HZ) < margin {
            2
        } else {
            trace!(
                "scan: row {}: ambiguous chroma selector at {:.1} Hz",
                row,
                mean
            );
            by_parity
        }
    }
}

impl<'t> Iterator for ScanLines<'t> {
    type Item = ScanLine;

    fn next(&mut self) -> Option<ScanLine> {
        loop {
            if let Some(line) = self.queue.pop_front() {
                return Some(line);
            }
            if self.stop.is_some() {
                return None;
            }
            self.decode_period();
        }
    }
}

impl<'t> FusedIterator for ScanLines<'t> {}

/// Search for the first sync pulse of `mode` in `trace`
///
/// Used when no calibration header is available. Scans
/// forward from `from` for a run of sync tone about one sync
/// pulse long and returns the position at which line 0's sync
/// pulse is expected. For modes with a start sync, the first
/// pulse found is taken to be the start sync.
pub fn find_first_sync(trace: &FrequencyTrace, mode: &ModeSpec, from: usize) -> Option<f64> {
    let sync_len = trace.samples(mode.sync_secs);
    let (min_run, max_run) = (0.7 * sync_len, 1.5 * sync_len);

    let freq = trace.freq();
    let mut pos = from;
    if freq.get(pos).map(|f| *f < SYNC_THRESHOLD_HZ).unwrap_or(false) {
        // already within a pulse of unknown length; skip it
        pos = trace.find_crossing(pos + 1, trace.len(), SYNC_THRESHOLD_HZ, Edge::Rising)?;
    }

    loop {
        let start = trace.find_crossing(pos, trace.len(), SYNC_THRESHOLD_HZ, Edge::Falling)?;
        let end = trace
            .find_crossing(start + 1, trace.len(), SYNC_THRESHOLD_HZ, Edge::Rising)
            .unwrap_or(trace.len());
        let run = (end - start) as f64;
        if run >= min_run && run <= max_run {
            let first = if mode.start_sync_secs > 0.0 {
                end as f64 + trace.samples(mode.sync_offset_secs)
            } else {
                end as f64 - sync_len
            };
            debug!(
                "scan: first sync pulse at {:.4} s",
                trace.secs(start as f64)
            );
            return Some(first);
        }
        pos = end;
    }
}

// Locate a sync pulse near `predicted`
//
// Slides a window one pulse long (`sync_len`) across
// `predicted ± window` and counts the samples below the sync
// threshold. The best window must hold at least `min_fraction`
// of a pulse. The pulse is then timed from its trailing edge,
// which is always followed by a porch at the black level.
fn locate_sync(
    freq: &[f32],
    predicted: f64,
    window: f64,
    sync_len: f64,
    min_fraction: f32,
) -> Option<f64> {
    let len = usize::max(sync_len.round() as usize, 1);
    if freq.len() < len {
        return None;
    }
    let lo = f64::max((predicted - window).floor(), 0.0) as usize;
    let hi = usize::min(
        f64::max((predicted + window).ceil(), 0.0) as usize,
        freq.len() - len,
    );
    if lo > hi {
        return None;
    }

    let is_sync = |i: usize| (freq[i] < SYNC_THRESHOLD_HZ) as usize;

    let mut count: usize = (lo..lo + len).map(is_sync).sum();
    let (mut best, mut first, mut last) = (count, lo, lo);
    for t in lo + 1..=hi {
        count = count + is_sync(t + len - 1) - is_sync(t - 1);
        if count > best {
            best = count;
            first = t;
            last = t;
        } else if count == best && last + 1 == t {
            last = t;
        }
    }

    if (best as f32) < min_fraction * len as f32 {
        return None;
    }

    // trailing edge
    let mid = (first + last) / 2;
    let from = usize::max(mid + len / 2, 1);
    let to = usize::min(last + len + len / 2 + 1, freq.len());
    let end = (from..to)
        .find(|&i| freq[i - 1] < SYNC_THRESHOLD_HZ && freq[i] >= SYNC_THRESHOLD_HZ)
        .unwrap_or(last + len);

    Some(end as f64 - sync_len)
}

// Line period estimator
//
// Fits a line through the positions of recently-located sync
// pulses. The slope is the line period, which is clamped to
// within `max_dev` of nominal.
#[derive(Clone, Debug)]
struct DriftTracker {
    nominal: f64,
    max_dev: f64,
    anchor: (usize, f64),
    period: f64,
    history: ArrayDeque<(usize, f64), 16, arraydeque::Wrapping>,
}

impl DriftTracker {
    fn new(nominal: f64, max_dev: f64, first_sync: f64) -> Self {
        Self {
            nominal,
            max_dev,
            anchor: (0, first_sync),
            period: nominal,
            history: ArrayDeque::default(),
        }
    }

    #[inline]
    fn nominal(&self) -> f64 {
        self.nominal
    }

    #[inline]
    fn period(&self) -> f64 {
        self.period
    }

    // Predicted sync position for `line`
    fn predict(&self, line: usize) -> f64 {
        let (anchor_line, anchor_pos) = self.anchor;
        anchor_pos + (line as f64 - anchor_line as f64) * self.period
    }

    // Record a located sync pulse
    fn update(&mut self, line: usize, pos: f64) {
        self.anchor = (line, pos);
        self.history.push_back((line, pos));
        if self.history.len() < 2 {
            return;
        }

        let n = self.history.len() as f64;
        let mean_x = self.history.iter().map(|h| h.0 as f64).sum::<f64>() / n;
        let mean_y = self.history.iter().map(|h| h.1).sum::<f64>() / n;
        let (mut sxy, mut sxx) = (0.0f64, 0.0f64);
        for (x, y) in self.history.iter() {
            let dx = *x as f64 - mean_x;
            sxy += dx * (y - mean_y);
            sxx += dx * dx;
        }
        if sxx > 0.0 {
            let lo = self.nominal * (1.0 - self.max_dev);
            let hi = self.nominal * (1.0 + self.max_dev);
            self.period = f64::clamp(sxy / sxx, lo, hi);
        }
    }
}
