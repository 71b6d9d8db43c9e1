use crate::modes::ModeSpec;
use crate::receiver::SstvDecoder;

/// Builds an SSTV decoder
///
/// The builder comes with a sensible set of default options.
/// All you really need to provide is the input sampling
/// rate. The [`SstvDecoder`](struct.SstvDecoder.html) was
/// designed to work well at a sampling rate of 44100 Hz,
/// however, and you may wish to tweak some of these values.
///
/// The API specified by the builder is part of this crate's
/// API. The actual default values are *not*, however, and
/// are subject to revision in any minor release. If you
/// care very strongly about a setting, be sure to configure
/// it here.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SstvDecoderBuilder {
    input_rate: u32,
    mode_override: Option<&'static ModeSpec>,
    skip_secs: f64,
    decimation: u32,
    lowpass_cutoff_hz: f32,
    lowpass_secs: f32,
    tone_tolerance_hz: f32,
    leader_min_secs: f64,
    resync_budget: u32,
    sync_window_secs: f64,
    sync_min_fraction: f32,
    drift_max: f64,
    squelch_ratio: f32,
    max_missed_syncs: u32,
}

impl SstvDecoderBuilder {
    /// New decoder with "sensible" defaults
    ///
    /// The only mandatory parameter is the input sampling
    /// rate, in Hz. Rates within
    /// [`SUPPORTED_SAMPLE_RATES`](crate::SUPPORTED_SAMPLE_RATES)
    /// are accepted. Decoding at any other rate will fail.
    pub fn new(input_rate: u32) -> Self {
        Self {
            input_rate,
            mode_override: None,
            skip_secs: 0.0,
            decimation: 1,
            lowpass_cutoff_hz: 1000.0,
            lowpass_secs: 0.001,
            tone_tolerance_hz: 50.0,
            leader_min_secs: 0.15,
            resync_budget: 32,
            sync_window_secs: 0.010,
            sync_min_fraction: 0.6,
            drift_max: 0.01,
            squelch_ratio: 0.1,
            max_missed_syncs: 16,
        }
    }

    /// Build a decoder
    ///
    /// Once built, the decoder is immediately ready to
    /// process recordings.
    pub fn build(&self) -> SstvDecoder {
        SstvDecoder::from(self)
    }

    /// Force the mode
    ///
    /// Decode the image as `mode`, regardless of the VIS code
    /// which is received. If no calibration header is found
    /// at all, the decoder will search for the first sync
    /// pulse instead. Set `None` to follow the VIS code.
    pub fn with_mode(&mut self, mode: Option<&'static ModeSpec>) -> &mut Self {
        self.mode_override = mode;
        self
    }

    /// Skip the start of the recording (s)
    ///
    /// The first `secs` seconds of every recording are
    /// discarded before decoding.
    pub fn with_skip(&mut self, secs: f64) -> &mut Self {
        self.skip_secs = f64::max(secs, 0.0);
        self
    }

    /// Frequency trace decimation factor
    ///
    /// Keep only every `factor`-th instantaneous frequency
    /// estimate. Higher values decode faster but blur fine
    /// detail. The factor is further limited at build time so
    /// that the discriminator cannot alias.
    pub fn with_decimation(&mut self, factor: u32) -> &mut Self {
        self.decimation = u32::clamp(factor, 1, 16);
        self
    }

    /// Demodulator low-pass filter
    ///
    /// The mixed-down signal is low-pass filtered with a
    /// cutoff of `cutoff_hz`, relative to the 1700 Hz center
    /// of the SSTV band. The filter spans `secs` seconds.
    /// Longer filters reject more noise but smear adjacent
    /// pixels together.
    pub fn with_lowpass(&mut self, cutoff_hz: f32, secs: f32) -> &mut Self {
        self.lowpass_cutoff_hz = f32::clamp(cutoff_hz, 400.0, 2000.0);
        self.lowpass_secs = f32::clamp(secs, 0.0001, 0.01);
        self
    }

    /// Header tone tolerance (Hz)
    ///
    /// Leader tones must be within `hz` of 1900 Hz.
    pub fn with_tone_tolerance(&mut self, hz: f32) -> &mut Self {
        self.tone_tolerance_hz = f32::clamp(hz, 10.0, 200.0);
        self
    }

    /// Minimum leader tone duration (s)
    ///
    /// Each leader tone is nominally 300 ms long. Accept
    /// leaders which are at least `secs` long.
    pub fn with_leader_min(&mut self, secs: f64) -> &mut Self {
        self.leader_min_secs = f64::clamp(secs, 0.05, 0.3);
        self
    }

    /// Header re-synchronization budget
    ///
    /// Give up on finding the calibration header after
    /// rejecting `count` candidates.
    pub fn with_resync_budget(&mut self, count: u32) -> &mut Self {
        self.resync_budget = count;
        self
    }

    /// Sync pulse search window (s)
    ///
    /// Look for each sync pulse within `secs` of its predicted
    /// position.
    pub fn with_sync_window(&mut self, secs: f64) -> &mut Self {
        self.sync_window_secs = f64::clamp(secs, 0.001, 0.05);
        self
    }

    /// Minimum sync pulse fill (fraction)
    ///
    /// A sync pulse is accepted when at least `fraction` of
    /// its samples lie below the sync threshold.
    pub fn with_sync_min_fraction(&mut self, fraction: f32) -> &mut Self {
        self.sync_min_fraction = f32::clamp(fraction, 0.1, 1.0);
        self
    }

    /// Maximum line period drift (fraction)
    ///
    /// The measured line period may deviate from nominal by
    /// at most this fraction. `0.0` disables slant
    /// correction.
    pub fn with_drift_max(&mut self, fraction: f64) -> &mut Self {
        self.drift_max = f64::clamp(fraction, 0.0, 0.05);
        self
    }

    /// Power squelch ratio (fraction)
    ///
    /// Stop decoding when the signal magnitude falls below
    /// `ratio` times the magnitude of the calibration header.
    /// A value of `0.0` disables the squelch.
    pub fn with_squelch_ratio(&mut self, ratio: f32) -> &mut Self {
        self.squelch_ratio = f32::clamp(ratio, 0.0, 1.0);
        self
    }

    /// Maximum consecutive missing sync pulses
    ///
    /// Stop decoding after `count` sync periods in a row
    /// without a sync pulse.
    pub fn with_max_missed_syncs(&mut self, count: u32) -> &mut Self {
        self.max_missed_syncs = u32::max(count, 1);
        self
    }

    /// Input sampling rate (Hz)
    pub fn input_rate(&self) -> u32 {
        self.input_rate
    }

    /// Forced mode, if any
    pub fn mode(&self) -> Option<&'static ModeSpec> {
        self.mode_override
    }

    /// Skipped recording duration (s)
    pub fn skip(&self) -> f64 {
        self.skip_secs
    }

    /// Frequency trace decimation factor
    pub fn decimation(&self) -> u32 {
        self.decimation
    }

    /// Demodulator low-pass filter `(cutoff_hz, secs)`
    pub fn lowpass(&self) -> (f32, f32) {
        (self.lowpass_cutoff_hz, self.lowpass_secs)
    }

    /// Header tone tolerance (Hz)
    pub fn tone_tolerance(&self) -> f32 {
        self.tone_tolerance_hz
    }

    /// Minimum leader tone duration (s)
    pub fn leader_min(&self) -> f64 {
        self.leader_min_secs
    }

    /// Header re-synchronization budget
    pub fn resync_budget(&self) -> u32 {
        self.resync_budget
    }

    /// Sync pulse search window (s)
    pub fn sync_window(&self) -> f64 {
        self.sync_window_secs
    }

    /// Minimum sync pulse fill (fraction)
    pub fn sync_min_fraction(&self) -> f32 {
        self.sync_min_fraction
    }

    /// Maximum line period drift (fraction)
    pub fn drift_max(&self) -> f64 {
        self.drift_max
    }

    /// Power squelch ratio (fraction)
    pub fn squelch_ratio(&self) -> f32 {
        self.squelch_ratio
    }

    /// Maximum consecutive missing sync pulses
    pub fn max_missed_syncs(&self) -> u32 {
        self.max_missed_syncs
    }
}

impl Default for SstvDecoderBuilder {
    fn default() -> Self {
        Self::new(crate::PREFERRED_SAMPLE_RATE)
    }
}
