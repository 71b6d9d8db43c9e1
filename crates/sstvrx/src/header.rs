//! Calibration header and VIS code
//!
//! Every SSTV transmission begins with a calibration header:
//!
//! ```txt
//! | leader  | brk | leader  | st | b0 b1 b2 b3 b4 b5 b6 | P | sp |
//! | 1900 Hz |1200 | 1900 Hz |1200| 1100 Hz = 1, 1300 = 0 |   |1200|
//! | 300 ms  |10ms | 300 ms  | 30 |       30 ms each     |30 | 30 |
//! ```
//!
//! The seven data bits are sent LSB first and are followed by
//! an even parity bit. Together they form the *Vertical
//! Interval Signaling* (VIS) code, which announces the mode.
//!
//! The [`HeaderDecoder`] walks the frequency trace with an
//! explicit state machine. Rejected candidates cost one unit
//! of a bounded re-synchronization budget.

use arrayvec::ArrayVec;

#[cfg(not(test))]
use log::{debug, info, warn};

#[cfg(test)]
use std::println as debug;
#[cfg(test)]
use std::println as info;
#[cfg(test)]
use std::println as warn;

use crate::modes::{self, ModeSpec};
use crate::output::DecodeError;
use crate::trace::{Edge, FrequencyTrace};
use crate::waveform::{
    CENTER_HZ, LEADER_EDGE_HZ, LEADER_HZ, SYNC_HZ, VIS_BITS, VIS_BIT_SECS, VIS_ONE_HZ,
    VIS_ZERO_HZ,
};

/// A received VIS code
///
/// ```
/// use sstvrx::VisCode;
///
/// let vis = VisCode::new(44, true, None);
/// assert_eq!(44, vis.code());
/// assert_eq!("Martin 1", vis.mode().unwrap().name);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct VisCode {
    code: u8,
    parity_ok: bool,
    corrected_bit: Option<u8>,
}

impl VisCode {
    /// New VIS code
    ///
    /// `code` is the seven-bit code. `parity_ok` records whether
    /// the received parity matched, and `corrected_bit` the
    /// bit flipped to restore parity, if any.
    pub fn new(code: u8, parity_ok: bool, corrected_bit: Option<u8>) -> Self {
        Self {
            code: code & 0x7f,
            parity_ok,
            corrected_bit,
        }
    }

    /// Seven-bit VIS code
    pub fn code(&self) -> u8 {
        self.code
    }

    /// True if the code was received with correct parity
    pub fn parity_ok(&self) -> bool {
        self.parity_ok
    }

    /// Bit which was flipped to restore parity
    ///
    /// Bits are numbered in transmission order. Data bits are
    /// `0..=6`, and `7` is the parity bit. `None` with a parity
    /// error means the error could not be corrected.
    pub fn corrected_bit(&self) -> Option<u8> {
        self.corrected_bit
    }

    /// Mode announced by this code, if supported
    ///
    /// A code whose parity error could not be corrected names
    /// no mode.
    pub fn mode(&self) -> Option<&'static ModeSpec> {
        if !self.parity_ok && self.corrected_bit.is_none() {
            return None;
        }
        modes::lookup(self.code)
    }

    // Assemble from soft bit decisions
    //
    // Even parity is checked over all eight bits. If it fails,
    // every single-bit flip which yields a supported code is a
    // candidate. A lone candidate is accepted. Otherwise the
    // least-confident bit is flipped (Wagner decoding), but only
    // if it is clearly weaker than every other bit and its flip
    // is a candidate. Anything else is left uncorrected.
    fn from_bits(bits: &[VisBit]) -> Self {
        let mut word = 0u8;
        for (i, bit) in bits.iter().enumerate() {
            word |= (bit.one as u8) << i;
        }

        if word.count_ones() % 2 == 0 {
            return Self::new(word & 0x7f, true, None);
        }

        let candidates: ArrayVec<usize, VIS_BITS> = (0..bits.len())
            .filter(|&i| modes::lookup((word ^ (1u8 << i)) & 0x7f).is_some())
            .collect();

        let mut by_confidence: ArrayVec<(usize, f32), VIS_BITS> = bits
            .iter()
            .map(|bit| bit.confidence)
            .enumerate()
            .collect();
        by_confidence.sort_by(|a, b| a.1.total_cmp(&b.1));

        let flip = match (candidates.as_slice(), by_confidence.as_slice()) {
            ([only], _) => Some(*only),
            (_, [weakest, runner_up, ..])
                if weakest.1 < Self::WAGNER_MARGIN * runner_up.1
                    && candidates.contains(&weakest.0) =>
            {
                Some(weakest.0)
            }
            _ => None,
        };

        match flip {
            Some(i) => Self::new((word ^ (1u8 << i)) & 0x7f, false, Some(i as u8)),
            None => Self::new(word & 0x7f, false, None),
        }
    }

    // The weakest bit must be this much less confident than the
    // next-weakest to be flipped on confidence alone
    const WAGNER_MARGIN: f32 = 0.5;
}

/// Result of a successful header decode
#[derive(Clone, Debug, PartialEq)]
pub struct HeaderLock {
    /// Mode to decode
    pub mode: &'static ModeSpec,

    /// VIS code as received
    pub vis: VisCode,

    /// Trace position at the end of the VIS stop bit
    pub image_start: f64,

    /// Mean analytic magnitude of the second leader
    pub level: f32,
}

/// Header state machine
///
/// Searches a [`FrequencyTrace`] for the calibration header
/// and decodes its VIS code.
#[derive(Clone, Debug)]
pub struct HeaderDecoder {
    tolerance_hz: f32,
    leader_min_secs: f64,
    resync_budget: u32,
    mode_override: Option<&'static ModeSpec>,
}

impl HeaderDecoder {
    /// New header decoder
    ///
    /// Leader tones must remain within `tolerance_hz` of
    /// 1900 Hz for at least `leader_min_secs`. At most
    /// `resync_budget` rejected header candidates are
    /// tolerated. If `mode_override` is set, it is used in
    /// place of the mode named by the VIS code.
    pub fn new(
        tolerance_hz: f32,
        leader_min_secs: f64,
        resync_budget: u32,
        mode_override: Option<&'static ModeSpec>,
    ) -> Self {
        Self {
            tolerance_hz,
            leader_min_secs,
            resync_budget,
            mode_override,
        }
    }

    /// Find and decode the header
    ///
    /// Returns the first header in the `trace` whose VIS code
    /// could be read. Fails with `NoSignalDetected` if there is
    /// none and `UnsupportedMode` if its code names no known
    /// mode.
    pub fn decode(&self, trace: &FrequencyTrace) -> Result<HeaderLock, DecodeError> {
        let mut budget = self.resync_budget;
        let mut state = State::SearchingLeader { from: 0 };

        loop {
            state = match state {
                State::SearchingLeader { from } => self.search_leader(trace, from),
                State::LeaderConfirmed { start, end } => self.confirm_leader(trace, start, end),
                State::AwaitingVisStart { start_bit, level } => {
                    self.await_vis_start(trace, start_bit, level)
                }
                State::ReadingVisBits { first_bit, level } => {
                    self.read_vis_bits(trace, first_bit, level)
                }
                State::Resync { from } => {
                    if budget == 0 {
                        info!("header: re-synchronization budget exhausted");
                        State::NoSignal
                    } else {
                        budget -= 1;
                        State::SearchingLeader { from }
                    }
                }
                State::ModeLocked {
                    vis,
                    vis_end,
                    level,
                } => return self.lock(vis, vis_end, level),
                State::NoSignal => return Err(DecodeError::NoSignalDetected),
            };
        }
    }

    // Find a run of leader tone at least leader_min_secs long
    fn search_leader(&self, trace: &FrequencyTrace, from: usize) -> State {
        let wind = window_len(trace);
        let min_len = trace.samples(self.leader_min_secs);

        let mut run_start: Option<usize> = None;
        let mut pos = from;
        while pos + wind <= trace.len() {
            let mean = trace
                .mean_freq(pos as f64, (pos + wind) as f64)
                .unwrap_or(CENTER_HZ);
            let good = f32::abs(mean - LEADER_HZ) <= self.tolerance_hz;

            match (good, run_start) {
                (true, None) => run_start = Some(pos),
                (false, Some(start)) => {
                    if (pos - start) as f64 >= min_len {
                        let end = settled_crossing(
                            trace,
                            pos.saturating_sub(wind),
                            pos + wind,
                            Edge::Falling,
                        )
                        .unwrap_or(pos);
                        debug!(
                            "header: leader candidate: {:.3} s to {:.3} s",
                            trace.secs(start as f64),
                            trace.secs(end as f64)
                        );
                        return State::LeaderConfirmed { start, end };
                    }
                    run_start = None;
                }
                _ => {}
            }
            pos += wind;
        }

        State::NoSignal
    }

    // Measure the break and the second leader
    fn confirm_leader(&self, trace: &FrequencyTrace, start: usize, end: usize) -> State {
        // break
        let limit = end + trace.samples(Self::BREAK_MAX_SECS * 2.0).ceil() as usize;
        let brk_end = match settled_crossing(trace, end + 1, limit, Edge::Rising) {
            Some(i) => i,
            None if limit >= trace.len() => return State::NoSignal,
            None => {
                debug!("header: rejected: no break after leader");
                return State::Resync { from: end };
            }
        };

        let brk_secs = trace.secs((brk_end - end) as f64);
        if !(Self::BREAK_MIN_SECS..=Self::BREAK_MAX_SECS).contains(&brk_secs) {
            debug!("header: rejected: break lasts {:.4} s", brk_secs);
            return State::Resync { from: end };
        }

        // second leader
        let limit = brk_end + trace.samples(Self::LEADER_MAX_SECS * 1.1).ceil() as usize;
        let lead_end = match settled_crossing(trace, brk_end + 1, limit, Edge::Falling) {
            Some(i) => i,
            None if limit >= trace.len() => return State::NoSignal,
            None => {
                debug!("header: rejected: second leader too long");
                return State::Resync { from: brk_end };
            }
        };

        let lead_len = (lead_end - brk_end) as f64;
        let lead_secs = trace.secs(lead_len);
        if !(self.leader_min_secs..=Self::LEADER_MAX_SECS).contains(&lead_secs) {
            debug!("header: rejected: second leader lasts {:.3} s", lead_secs);
            return State::Resync { from: brk_end };
        }

        let lead_start = brk_end as f64;
        let mean = trace
            .mean_freq(lead_start + 0.1 * lead_len, lead_start + 0.9 * lead_len)
            .unwrap_or(CENTER_HZ);
        if f32::abs(mean - LEADER_HZ) > self.tolerance_hz {
            debug!("header: rejected: second leader at {:.1} Hz", mean);
            return State::Resync { from: brk_end };
        }

        let level = trace
            .mean_magnitude(lead_start, lead_end as f64)
            .unwrap_or(0.0);

        info!(
            "header: leader at {:.3} s, break {:.1} ms, second leader {:.1} ms at {:.1} Hz",
            trace.secs(start as f64),
            brk_secs * 1000.0,
            lead_secs * 1000.0,
            mean
        );
        State::AwaitingVisStart {
            start_bit: lead_end as f64,
            level,
        }
    }

    // Check for the 1200 Hz start bit
    fn await_vis_start(&self, trace: &FrequencyTrace, start_bit: f64, level: f32) -> State {
        let bit_len = trace.samples(VIS_BIT_SECS);
        match central_mean(trace, start_bit, bit_len) {
            None => State::NoSignal,
            Some(mean) if nearest(mean, &[VIS_ONE_HZ, SYNC_HZ, VIS_ZERO_HZ, LEADER_HZ]) == 1 => {
                State::ReadingVisBits {
                    first_bit: start_bit + bit_len,
                    level,
                }
            }
            Some(mean) => {
                debug!("header: rejected: start bit at {:.1} Hz", mean);
                State::Resync {
                    from: start_bit as usize,
                }
            }
        }
    }

    // Read the seven data bits and the parity bit
    fn read_vis_bits(&self, trace: &FrequencyTrace, first_bit: f64, level: f32) -> State {
        let bit_len = trace.samples(VIS_BIT_SECS);

        let mut bits: ArrayVec<VisBit, VIS_BITS> = ArrayVec::new();
        for i in 0..VIS_BITS {
            let mean = match central_mean(trace, first_bit + i as f64 * bit_len, bit_len) {
                Some(mean) => mean,
                None => {
                    info!("header: recording ends within VIS code");
                    return State::NoSignal;
                }
            };
            bits.push(VisBit {
                one: nearest(mean, &[VIS_ONE_HZ, VIS_ZERO_HZ]) == 0,
                confidence: f32::abs(mean - SYNC_HZ),
            });
        }

        let vis = VisCode::from_bits(&bits);
        State::ModeLocked {
            vis,
            vis_end: first_bit + (VIS_BITS + 1) as f64 * bit_len,
            level,
        }
    }

    // Resolve the mode to decode
    fn lock(&self, vis: VisCode, vis_end: f64, level: f32) -> Result<HeaderLock, DecodeError> {
        match (vis.parity_ok(), vis.corrected_bit()) {
            (_, Some(bit)) => warn!(
                "header: VIS {} received with parity error; corrected bit {}",
                vis.code(),
                bit
            ),
            (false, None) => warn!(
                "header: VIS {} received with uncorrectable parity error",
                vis.code()
            ),
            (true, None) => info!("header: VIS {}", vis.code()),
        }

        let mode = match (self.mode_override, vis.mode()) {
            (Some(forced), received) => {
                if forced.vis_code != vis.code() {
                    warn!(
                        "header: VIS {} ({}) disagrees with requested mode {}; using {}",
                        vis.code(),
                        received.map(|m| m.name).unwrap_or("unknown"),
                        forced,
                        forced
                    );
                }
                forced
            }
            (None, Some(mode)) => mode,
            (None, None) => {
                warn!("header: VIS {} is not a supported mode", vis.code());
                return Err(DecodeError::UnsupportedMode { code: vis.code() });
            }
        };

        info!("header: locked {}", mode);
        Ok(HeaderLock {
            mode,
            vis,
            image_start: vis_end,
            level,
        })
    }

    const BREAK_MIN_SECS: f64 = 0.003;
    const BREAK_MAX_SECS: f64 = 0.020;
    const LEADER_MAX_SECS: f64 = 0.600;
}

// Header state
#[derive(Clone, Debug, PartialEq)]
enum State {
    // Look for the first leader tone, starting at the given index
    SearchingLeader { from: usize },

    // A leader tone was found; check the break and second leader
    LeaderConfirmed { start: usize, end: usize },

    // Second leader ended; check for the start bit
    AwaitingVisStart { start_bit: f64, level: f32 },

    // Read VIS bits, starting at the given position
    ReadingVisBits { first_bit: f64, level: f32 },

    // Candidate rejected; resume search at the given index
    Resync { from: usize },

    // Header received
    ModeLocked {
        vis: VisCode,
        vis_end: f64,
        level: f32,
    },

    // No header in trace
    NoSignal,
}

// Soft-decision VIS bit
#[derive(Clone, Copy, Debug, PartialEq)]
struct VisBit {
    one: bool,
    confidence: f32,
}

// Width of the leader search windows: 2 ms
fn window_len(trace: &FrequencyTrace) -> usize {
    usize::max(trace.samples(0.002).round() as usize, 1)
}

// Mean over the central 60% of an interval
fn central_mean(trace: &FrequencyTrace, start: f64, len: f64) -> Option<f32> {
    if start + len > trace.len() as f64 {
        return None;
    }
    trace.mean_freq(start + 0.2 * len, start + 0.8 * len)
}

// Index of the band center nearest to `freq`
//
// Exact ties go to the first listed band.
fn nearest(freq: f32, bands: &[f32]) -> usize {
    let mut best = 0;
    for (i, band) in bands.iter().enumerate() {
        if f32::abs(freq - band) < f32::abs(freq - bands[best]) {
            best = i;
        }
    }
    best
}

// Leader/break crossing which persists for at least 2 ms
fn settled_crossing(
    trace: &FrequencyTrace,
    from: usize,
    limit: usize,
    edge: Edge,
) -> Option<usize> {
    let hold = window_len(trace);
    let mut from = from;
    loop {
        let i = trace.find_crossing(from, limit, LEADER_EDGE_HZ, edge)?;
        let mean = trace.mean_freq(i as f64, (i + hold) as f64)?;
        let settled = match edge {
            Edge::Falling => mean < LEADER_EDGE_HZ,
            Edge::Rising => mean >= LEADER_EDGE_HZ,
        };
        if settled {
            return Some(i);
        }
        from = i + 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use assert_approx_eq::assert_approx_eq;

    use crate::waveform::{vis_tones, BREAK_HZ, BREAK_SECS, LEADER_SECS};

    const RATE: f64 = 8000.0;
    const HEADER_SECS: f64 = 2.0 * LEADER_SECS + BREAK_SECS + 10.0 * VIS_BIT_SECS;

    fn decoder() -> HeaderDecoder {
        HeaderDecoder::new(50.0, 0.15, 32, None)
    }

    // Header with the given leader / break timing and VIS tones
    fn header_segments(
        leader1: f64,
        brk: f64,
        leader2: f64,
        bits: &[f32; VIS_BITS],
    ) -> Vec<(f32, f64)> {
        let mut out = vec![
            (LEADER_HZ, leader1),
            (BREAK_HZ, brk),
            (LEADER_HZ, leader2),
            (SYNC_HZ, VIS_BIT_SECS),
        ];
        for b in bits {
            out.push((*b, VIS_BIT_SECS));
        }
        out.push((SYNC_HZ, VIS_BIT_SECS));
        out.push((1500.0, 0.5));
        out
    }

    fn header_trace(lead_in: f64, bits: &[f32; VIS_BITS]) -> FrequencyTrace {
        let mut segs = vec![(CENTER_HZ, lead_in)];
        segs.extend(header_segments(LEADER_SECS, BREAK_SECS, LEADER_SECS, bits));
        FrequencyTrace::from_segments(RATE, &segs)
    }

    #[test]
    fn test_nearest() {
        assert_eq!(0, nearest(1000.0, &[1100.0, 1300.0]));
        assert_eq!(1, nearest(1251.0, &[1100.0, 1300.0]));
        assert_eq!(0, nearest(1200.0, &[1100.0, 1300.0]));
        assert_eq!(3, nearest(2000.0, &[1100.0, 1200.0, 1300.0, 1900.0]));
    }

    #[test]
    fn test_every_mode() {
        for mode in modes::ALL_MODES {
            let trace = header_trace(0.25, &vis_tones(mode.vis_code));
            let lock = decoder().decode(&trace).expect("no lock");
            assert!(std::ptr::eq(*mode, lock.mode));
            assert!(lock.vis.parity_ok());
            assert_eq!(None, lock.vis.corrected_bit());
            assert_approx_eq!(0.25 + HEADER_SECS, trace.secs(lock.image_start), 0.001);
            assert_approx_eq!(1.0f32, lock.level);
        }
    }

    #[test]
    fn test_weak_data_bit_corrected() {
        // Martin 1 (44) has a "one" at bit 2; send it off-center
        // so that it reads as a weak "zero"
        let mut bits = vis_tones(44);
        assert_eq!(VIS_ONE_HZ, bits[2]);
        bits[2] = 1220.0;

        let lock = decoder().decode(&header_trace(0.1, &bits)).expect("no lock");
        assert_eq!(44, lock.vis.code());
        assert!(!lock.vis.parity_ok());
        assert_eq!(Some(2), lock.vis.corrected_bit());
        assert_eq!("Martin 1", lock.mode.name);
    }

    #[test]
    fn test_weak_parity_bit_corrected() {
        let mut bits = vis_tones(60);
        assert_eq!(VIS_ZERO_HZ, bits[7]);
        bits[7] = 1190.0;

        let lock = decoder().decode(&header_trace(0.1, &bits)).expect("no lock");
        assert_eq!(60, lock.vis.code());
        assert_eq!(Some(7), lock.vis.corrected_bit());
    }

    // Soft bits for an eight-bit word, with per-bit confidence
    fn soft(word: u8, confidence: [f32; VIS_BITS]) -> [VisBit; VIS_BITS] {
        let mut out = [VisBit {
            one: false,
            confidence: 0.0,
        }; VIS_BITS];
        for (i, bit) in out.iter_mut().enumerate() {
            bit.one = (word >> i) & 1 == 1;
            bit.confidence = confidence[i];
        }
        out
    }

    #[test]
    fn test_vis_correction() {
        const CLEAN: [f32; VIS_BITS] = [100.0; VIS_BITS];

        // Martin 1 (44) with parity: 0b1010_1100
        let sent = 0b1010_1100u8;
        assert!(VisCode::from_bits(&soft(sent, CLEAN)).parity_ok());

        // bit 0 error: 45 is the only supported neighbor
        let vis = VisCode::from_bits(&soft(sent ^ 0x01, CLEAN));
        assert_eq!(44, vis.code());
        assert_eq!(Some(0), vis.corrected_bit());
        assert_eq!("Martin 1", vis.mode().unwrap().name);

        // bit 5 error: 12 could be Robot 72, Robot 36, or Martin 1
        let vis = VisCode::from_bits(&soft(sent ^ 0x20, CLEAN));
        assert_eq!(12, vis.code());
        assert!(!vis.parity_ok());
        assert_eq!(None, vis.corrected_bit());
        assert!(vis.mode().is_none());

        // ... unless bit 5 is clearly the weakest
        let mut weak = CLEAN;
        weak[5] = 20.0;
        let vis = VisCode::from_bits(&soft(sent ^ 0x20, weak));
        assert_eq!(44, vis.code());
        assert_eq!(Some(5), vis.corrected_bit());

        // a weak bit whose flip is unsupported is not trusted
        let mut weak = CLEAN;
        weak[4] = 20.0;
        let vis = VisCode::from_bits(&soft(sent ^ 0x20, weak));
        assert_eq!(None, vis.corrected_bit());
        assert!(vis.mode().is_none());

        // a weakest bit that is not clearly weaker is not trusted
        let mut weak = CLEAN;
        weak[5] = 80.0;
        let vis = VisCode::from_bits(&soft(sent ^ 0x20, weak));
        assert_eq!(None, vis.corrected_bit());
    }

    #[test]
    fn test_ambiguous_parity_error() {
        // Martin 1 with bit 5 sent wrong reads as 12
        let mut bits = vis_tones(44);
        assert_eq!(VIS_ONE_HZ, bits[5]);
        bits[5] = VIS_ZERO_HZ;
        let res = decoder().decode(&header_trace(0.1, &bits));
        assert_eq!(Err(DecodeError::UnsupportedMode { code: 12 }), res);

        let forced = HeaderDecoder::new(50.0, 0.15, 32, Some(&modes::MARTIN_1));
        let lock = forced.decode(&header_trace(0.1, &bits)).expect("no lock");
        assert_eq!("Martin 1", lock.mode.name);
        assert!(!lock.vis.parity_ok());
        assert_eq!(None, lock.vis.corrected_bit());
    }

    #[test]
    fn test_unsupported_mode() {
        let res = decoder().decode(&header_trace(0.1, &vis_tones(45)));
        assert_eq!(Err(DecodeError::UnsupportedMode { code: 45 }), res);

        // unless the caller insists
        let forced = HeaderDecoder::new(50.0, 0.15, 32, Some(&modes::SCOTTIE_1));
        let lock = forced
            .decode(&header_trace(0.1, &vis_tones(45)))
            .expect("no lock");
        assert_eq!(45, lock.vis.code());
        assert_eq!("Scottie 1", lock.mode.name);
    }

    #[test]
    fn test_no_signal() {
        let empty = FrequencyTrace::from_segments(RATE, &[]);
        assert_eq!(Err(DecodeError::NoSignalDetected), decoder().decode(&empty));

        let silence = FrequencyTrace::from_segments(RATE, &[(CENTER_HZ, 3.0)]);
        assert_eq!(Err(DecodeError::NoSignalDetected), decoder().decode(&silence));

        // a leader with nothing after it
        let lonely = FrequencyTrace::from_segments(RATE, &[(LEADER_HZ, 2.0)]);
        assert_eq!(Err(DecodeError::NoSignalDetected), decoder().decode(&lonely));
    }

    #[test]
    fn test_truncated_in_vis() {
        // recording stops halfway through data bit 4
        let cut_secs = 2.0 * LEADER_SECS + BREAK_SECS + 5.5 * VIS_BIT_SECS;
        let mut kept = Vec::new();
        let mut elapsed = 0.0;
        for (hz, secs) in header_segments(LEADER_SECS, BREAK_SECS, LEADER_SECS, &vis_tones(8)) {
            let secs = f64::min(secs, cut_secs - elapsed);
            if secs <= 1.0e-9 {
                break;
            }
            kept.push((hz, secs));
            elapsed += secs;
        }

        let trace = FrequencyTrace::from_segments(RATE, &kept);
        assert_approx_eq!(cut_secs, trace.duration_secs(), 0.001);
        assert_eq!(Err(DecodeError::NoSignalDetected), decoder().decode(&trace));
    }

    #[test]
    fn test_resync_after_bad_break() {
        // a bogus header with a 50 ms break, then a good one
        let mut segs = header_segments(LEADER_SECS, 0.050, LEADER_SECS, &vis_tones(8));
        segs.extend(header_segments(LEADER_SECS, BREAK_SECS, LEADER_SECS, &vis_tones(12)));
        let trace = FrequencyTrace::from_segments(RATE, &segs);

        let lock = decoder().decode(&trace).expect("no lock");
        assert_eq!(12, lock.vis.code());

        // without any budget, the first rejection is final
        let strict = HeaderDecoder::new(50.0, 0.15, 0, None);
        assert_eq!(Err(DecodeError::NoSignalDetected), strict.decode(&trace));
    }

    #[test]
    fn test_short_leaders() {
        // leaders shorter than the minimum are rejected
        let segs = header_segments(0.1, BREAK_SECS, 0.1, &vis_tones(8));
        let trace = FrequencyTrace::from_segments(RATE, &segs);
        assert_eq!(Err(DecodeError::NoSignalDetected), decoder().decode(&trace));

        // off-frequency leaders are rejected
        let mut segs = header_segments(LEADER_SECS, BREAK_SECS, LEADER_SECS, &vis_tones(8));
        segs[0].0 = 1800.0;
        segs[2].0 = 1800.0;
        let trace = FrequencyTrace::from_segments(RATE, &segs);
        assert_eq!(Err(DecodeError::NoSignalDetected), decoder().decode(&trace));

        // slightly off-frequency leaders are fine
        let mut segs = header_segments(LEADER_SECS, BREAK_SECS, LEADER_SECS, &vis_tones(8));
        segs[0].0 = 1930.0;
        segs[2].0 = 1870.0;
        let trace = FrequencyTrace::from_segments(RATE, &segs);
        assert_eq!(8, decoder().decode(&trace).unwrap().vis.code());
    }
}
