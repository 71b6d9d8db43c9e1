//! Waveform parameters for SSTV

#[cfg(test)]
use crate::modes::{Component, ModeSpec};

/// Leader (calibration) tone frequency (Hz)
pub const LEADER_HZ: f32 = 1900.0;

/// Break tone between the two leaders (Hz)
pub const BREAK_HZ: f32 = 1200.0;

/// Sync pulse frequency (Hz)
///
/// Also used for the VIS start and stop bits.
pub const SYNC_HZ: f32 = 1200.0;

/// VIS data bit "one" (Hz)
pub const VIS_ONE_HZ: f32 = 1100.0;

/// VIS data bit "zero" (Hz)
pub const VIS_ZERO_HZ: f32 = 1300.0;

/// Frequency of a black pixel (Hz)
pub const BLACK_HZ: f32 = 1500.0;

/// Frequency of a white pixel (Hz)
pub const WHITE_HZ: f32 = 2300.0;

/// Center of the SSTV band (Hz)
///
/// The demodulator mixes to baseband from here. Silence
/// demodulates to this frequency.
pub const CENTER_HZ: f32 = 1700.0;

/// Decision threshold between the break and the leader (Hz)
pub const LEADER_EDGE_HZ: f32 = 1550.0;

/// Decision threshold between sync and black (Hz)
pub const SYNC_THRESHOLD_HZ: f32 = 1350.0;

/// Chroma selector tone announcing R−Y (Hz)
pub const SELECTOR_RY_HZ: f32 = BLACK_HZ;

/// Chroma selector tone announcing B−Y (Hz)
pub const SELECTOR_BY_HZ: f32 = WHITE_HZ;

/// Length of each leader tone (s)
pub const LEADER_SECS: f64 = 0.300;

/// Length of the break (s)
pub const BREAK_SECS: f64 = 0.010;

/// Length of each VIS bit, including start and stop (s)
pub const VIS_BIT_SECS: f64 = 0.030;

/// Number of VIS bits which follow the start bit
///
/// Seven data bits, LSB first, plus one even parity bit.
pub const VIS_BITS: usize = 8;

/// Map a frequency to a pixel value
///
/// Frequencies from `black_hz` to `white_hz` are mapped
/// linearly onto `0..=255`. Frequencies outside this range
/// saturate.
///
/// ```
/// use sstvrx::waveform::freq_to_value;
///
/// assert_eq!(0, freq_to_value(1400.0, 1500.0, 2300.0));
/// assert_eq!(128, freq_to_value(1901.0, 1500.0, 2300.0));
/// assert_eq!(255, freq_to_value(2400.0, 1500.0, 2300.0));
/// ```
pub fn freq_to_value(freq: f32, black_hz: f32, white_hz: f32) -> u8 {
    let scaled = (freq - black_hz) * 255.0f32 / (white_hz - black_hz);
    f32::clamp(scaled.round(), 0.0, 255.0) as u8
}

/// Continuous-phase SSTV tone generator
///
/// This type is designed for use in tests. Tone durations
/// accumulate in fractional time, so long transmissions do
/// not drift relative to the mode timing.
#[cfg(test)]
#[derive(Clone, Debug)]
pub(crate) struct ToneWriter {
    rate: f64,
    phase: f64,
    elapsed_secs: f64,
    amplitude: f32,
    out: Vec<f32>,
}

#[cfg(test)]
impl ToneWriter {
    pub fn new(rate: u32) -> Self {
        Self {
            rate: rate as f64,
            phase: 0.0,
            elapsed_secs: 0.0,
            amplitude: 0.5,
            out: Vec::new(),
        }
    }

    /// Emit `secs` of a tone at `freq`
    pub fn tone(&mut self, freq: f32, secs: f64) -> &mut Self {
        const TWOPI: f64 = 2.0 * std::f64::consts::PI;

        self.elapsed_secs += secs;
        let target = (self.elapsed_secs * self.rate).round() as usize;
        let rad_per_sa = TWOPI * freq as f64 / self.rate;
        while self.out.len() < target {
            self.phase = (self.phase + rad_per_sa) % TWOPI;
            self.out.push(self.amplitude * self.phase.cos() as f32);
        }
        self
    }

    /// Emit `secs` of silence
    pub fn silence(&mut self, secs: f64) -> &mut Self {
        self.elapsed_secs += secs;
        let target = (self.elapsed_secs * self.rate).round() as usize;
        self.out.resize(usize::max(target, self.out.len()), 0.0f32);
        self
    }

    /// Emit the calibration header for `vis_code`
    pub fn header(&mut self, vis_code: u8) -> &mut Self {
        self.header_tones(&vis_tones(vis_code))
    }

    /// Emit the calibration header with explicit VIS bit tones
    ///
    /// `bits` are the seven data bits, LSB first, followed
    /// by the parity bit.
    pub fn header_tones(&mut self, bits: &[f32; VIS_BITS]) -> &mut Self {
        self.tone(LEADER_HZ, LEADER_SECS)
            .tone(BREAK_HZ, BREAK_SECS)
            .tone(LEADER_HZ, LEADER_SECS)
            .tone(SYNC_HZ, VIS_BIT_SECS);
        for freq in bits {
            self.tone(*freq, VIS_BIT_SECS);
        }
        self.tone(SYNC_HZ, VIS_BIT_SECS)
    }

    /// Emit the first `lines` sync periods of an image
    ///
    /// `pixel(row, component, x)` supplies every pixel value.
    /// Alternating chroma is sent as R−Y on even rows and
    /// B−Y on odd rows, announced by the selector tone.
    /// Scans shared by several rows take their values from
    /// the first row of the period.
    pub fn image<F>(&mut self, mode: &ModeSpec, lines: usize, pixel: F) -> &mut Self
    where
        F: Fn(usize, Component, usize) -> u8,
    {
        let value_hz = |v: u8| {
            mode.black_hz + (mode.white_hz - mode.black_hz) * v as f32 / 255.0f32
        };

        if mode.start_sync_secs > 0.0 {
            self.tone(SYNC_HZ, mode.start_sync_secs);
        }

        for line in 0..usize::min(lines, mode.line_count()) {
            let line_start = self.elapsed_secs;
            let first_row = line * mode.rows_per_line;

            // (start, tone); scans are expanded below
            let mut events: Vec<(f64, Option<(f32, f64)>, Option<usize>)> = Vec::new();
            events.push((mode.sync_offset_secs, Some((SYNC_HZ, mode.sync_secs)), None));
            if let Some(sel) = mode.chroma_selector {
                let hz = if first_row % 2 == 0 {
                    SELECTOR_RY_HZ
                } else {
                    SELECTOR_BY_HZ
                };
                events.push((sel.start_secs, Some((hz, sel.duration_secs)), None));
            }
            for (i, scan) in mode.scans.iter().enumerate() {
                events.push((scan.start_secs, None, Some(i)));
            }
            events.sort_by(|a, b| a.0.total_cmp(&b.0));

            for (start, tone, scan) in events {
                let gap = line_start + start - self.elapsed_secs;
                if gap > 0.0 {
                    self.tone(BLACK_HZ, gap);
                }
                if let Some((hz, secs)) = tone {
                    self.tone(hz, secs);
                }
                if let Some(i) = scan {
                    let scan = &mode.scans[i];
                    let row = match scan.rows {
                        crate::modes::RowSelect::All => first_row,
                        crate::modes::RowSelect::Row(r) => first_row + r,
                    };
                    let component = match scan.component {
                        Component::AltChroma if row % 2 == 0 => Component::RMinusY,
                        Component::AltChroma => Component::BMinusY,
                        c => c,
                    };
                    let px_secs = scan.duration_secs / mode.width as f64;
                    for x in 0..mode.width {
                        self.tone(value_hz(pixel(row, component, x)), px_secs);
                    }
                }
            }

            let rest = line_start + mode.line_secs - self.elapsed_secs;
            if rest > 0.0 {
                self.tone(BLACK_HZ, rest);
            }
        }
        self
    }

    /// Samples emitted so far
    pub fn len(&self) -> usize {
        self.out.len()
    }

    /// Take the signal
    pub fn finish(&mut self) -> Vec<f32> {
        std::mem::take(&mut self.out)
    }
}

/// Tones for the seven data bits of `code` plus even parity
#[cfg(test)]
pub(crate) fn vis_tones(code: u8) -> [f32; VIS_BITS] {
    let mut out = [VIS_ZERO_HZ; VIS_BITS];
    let code = code & 0x7f;
    for (i, o) in out.iter_mut().take(7).enumerate() {
        if code & (1 << i) != 0 {
            *o = VIS_ONE_HZ;
        }
    }
    if code.count_ones() % 2 == 1 {
        out[7] = VIS_ONE_HZ;
    }
    out
}
