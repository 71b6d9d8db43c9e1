//! Full decoder chain

#[cfg(not(test))]
use log::{debug, info, warn};

#[cfg(test)]
use std::println as debug;
#[cfg(test)]
use std::println as info;
#[cfg(test)]
use std::println as warn;

use std::convert::From;
use std::ops::RangeInclusive;

use crate::builder::SstvDecoderBuilder;
use crate::demod::FmDemod;
use crate::filter::FilterCoeff;
use crate::header::{HeaderDecoder, VisCode};
use crate::image::ImageBuffer;
use crate::modes::ModeSpec;
use crate::output::{DecodeError, DecodeSummary, DecodeWarning, Decoded};
use crate::scan::{self, ScanConfig, ScanLines, StopReason};
use crate::trace::FrequencyTrace;
use crate::waveform::CENTER_HZ;

/// Input sampling rates accepted by the decoder (Hz)
pub const SUPPORTED_SAMPLE_RATES: RangeInclusive<u32> = 8000..=192000;

/// Sampling rate which the decoder is tuned for (Hz)
///
/// Recordings at other rates work, but callers which
/// resample anyway should resample to this one.
pub const PREFERRED_SAMPLE_RATE: u32 = 44100;

// Keep the discriminator's phase step well under π
const MIN_TRACE_RATE_PER_DECIMATION: u32 = 2400;

/// A complete SSTV decoder chain
///
/// The decoder takes a mono recording of `f32` audio samples
/// and performs the following operations:
///
/// 1. FM demodulation to an instantaneous frequency trace
/// 2. Calibration header detection and VIS code decoding
/// 3. Sync-tracked, slant-corrected scan-line decoding
/// 4. Color conversion and image assembly
///
/// To create the decoder, first create its Builder:
///
/// ```
/// use sstvrx::SstvDecoderBuilder;
///
/// let decoder = SstvDecoderBuilder::default().build();
/// assert_eq!(decoder.input_rate(), 44100);
/// ```
///
/// The decoder holds no state between recordings. It may be
/// shared between threads and reused freely: decoding the
/// same recording twice gives the same result.
#[derive(Clone, Debug)]
pub struct SstvDecoder {
    input_rate: u32,
    skip_secs: f64,
    decimation: u32,
    demod: FmDemod,
    header: HeaderDecoder,
    scan: ScanConfig,
    mode_override: Option<&'static ModeSpec>,
}

impl SstvDecoder {
    /// Decode one image from a recording
    ///
    /// The `samples` must be PCM mono audio at the
    /// [`input_rate()`](#method.input_rate) of this decoder.
    /// There is no need to scale them.
    ///
    /// The first image in the recording is decoded. If the
    /// recording ends, or the signal fades, before the image
    /// is complete, the partial image is returned with a
    /// warning in its [`DecodeSummary`].
    pub fn decode(&self, samples: &[f32]) -> Result<Decoded, DecodeError> {
        if !SUPPORTED_SAMPLE_RATES.contains(&self.input_rate) {
            return Err(DecodeError::UnsupportedSampleRate(self.input_rate));
        }

        let skip = usize::min(
            (self.skip_secs * self.input_rate as f64).round() as usize,
            samples.len(),
        );
        if skip > 0 {
            debug!("decoder: skipping {} samples", skip);
        }

        let trace = self.demodulate(&samples[skip..]);
        self.decode_trace(&trace)
    }

    /// Demodulate a recording
    ///
    /// Converts `samples` at the
    /// [`input_rate()`](#method.input_rate) into a trace of
    /// instantaneous frequency. No samples are skipped.
    pub fn demodulate(&self, samples: &[f32]) -> FrequencyTrace {
        let mut demod = self.demod.clone();
        FrequencyTrace::demodulate(samples, self.input_rate, self.decimation, &mut demod)
    }

    /// Decode one image from a frequency trace
    ///
    /// The `trace` may come from
    /// [`demodulate()`](#method.demodulate).
    pub fn decode_trace(&self, trace: &FrequencyTrace) -> Result<Decoded, DecodeError> {
        let (mode, vis, first_sync, reference) = match self.header.decode(trace) {
            Ok(lock) => (
                lock.mode,
                Some(lock.vis),
                lock.image_start + trace.samples(lock.mode.first_sync_secs()),
                lock.level,
            ),
            Err(DecodeError::NoSignalDetected) if self.mode_override.is_some() => {
                self.headerless(trace)?
            }
            Err(e) => {
                info!("decoder: {}", e);
                return Err(e);
            }
        };

        info!(
            "decoder: decoding {} from {:.3} s",
            mode,
            trace.secs(first_sync)
        );

        let mut image = ImageBuffer::new(mode);
        let mut lines = ScanLines::new(trace, mode, first_sync, reference, self.scan);
        for line in lines.by_ref() {
            image.insert(line);
        }
        debug!(
            "decoder: line period {:.6} s (nominal {:.6} s)",
            lines.line_secs(),
            mode.line_secs
        );

        let summary = summarize(
            mode,
            vis,
            image.rows_filled(),
            image.rows_degraded(),
            lines.stop_reason(),
        );
        info!("decoder: {}", summary);
        for warning in summary.warnings() {
            warn!("decoder: {}", warning);
        }

        Ok(Decoded {
            image: image.finalize(),
            summary,
        })
    }

    /// Input sampling rate (Hz)
    pub fn input_rate(&self) -> u32 {
        self.input_rate
    }

    /// Forced mode, if any
    pub fn mode(&self) -> Option<&'static ModeSpec> {
        self.mode_override
    }

    // Forced mode without a calibration header
    fn headerless(
        &self,
        trace: &FrequencyTrace,
    ) -> Result<(&'static ModeSpec, Option<VisCode>, f64, f32), DecodeError> {
        let mode = self.mode_override.ok_or(DecodeError::NoSignalDetected)?;
        let first_sync = scan::find_first_sync(trace, mode, 0).ok_or_else(|| {
            info!("decoder: no header and no sync pulses for {}", mode);
            DecodeError::NoSignalDetected
        })?;
        let reference = trace
            .mean_magnitude(0.0, trace.len() as f64)
            .unwrap_or(0.0f32);

        info!("decoder: no header; forcing {}", mode);
        Ok((mode, None, first_sync, reference))
    }
}

impl From<&SstvDecoderBuilder> for SstvDecoder {
    /// Create the SSTV decoder from its Builder
    fn from(cfg: &SstvDecoderBuilder) -> Self {
        let input_rate = cfg.input_rate();
        let (cutoff_hz, lowpass_secs) = cfg.lowpass();

        let ntaps = (lowpass_secs * input_rate as f32).round() as usize | 1;
        let lpf = FilterCoeff::lowpass(ntaps, cutoff_hz / input_rate as f32);
        let demod = FmDemod::new(input_rate, CENTER_HZ, lpf);

        let max_decimation = u32::max(input_rate / MIN_TRACE_RATE_PER_DECIMATION, 1);
        let decimation = u32::min(cfg.decimation(), max_decimation);
        if decimation != cfg.decimation() {
            warn!(
                "decoder: decimation limited to {} at {} Hz",
                decimation, input_rate
            );
        }

        let header = HeaderDecoder::new(
            cfg.tone_tolerance(),
            cfg.leader_min(),
            cfg.resync_budget(),
            cfg.mode(),
        );
        let scan = ScanConfig {
            sync_window_secs: cfg.sync_window(),
            sync_min_fraction: cfg.sync_min_fraction(),
            drift_max: cfg.drift_max(),
            squelch_ratio: cfg.squelch_ratio(),
            max_missed_syncs: cfg.max_missed_syncs(),
        };

        Self {
            input_rate,
            skip_secs: cfg.skip(),
            decimation,
            demod,
            header,
            scan,
            mode_override: cfg.mode(),
        }
    }
}

// Collect warnings for a finished decode
fn summarize(
    mode: &'static ModeSpec,
    vis: Option<VisCode>,
    rows_decoded: usize,
    rows_degraded: usize,
    stop: Option<StopReason>,
) -> DecodeSummary {
    let mut warnings = Vec::new();
    if let Some(bit) = vis.as_ref().and_then(VisCode::corrected_bit) {
        warnings.push(DecodeWarning::VisParity { corrected_bit: bit });
    }
    if rows_degraded > 0 {
        warnings.push(DecodeWarning::DegradedRows(rows_degraded));
    }

    let missing_rows = mode.height.saturating_sub(rows_decoded);
    if missing_rows > 0 {
        match stop {
            Some(StopReason::SignalLost) => {
                warnings.push(DecodeWarning::SignalLost { missing_rows })
            }
            _ => warnings.push(DecodeWarning::Truncated { missing_rows }),
        }
    }

    DecodeSummary::new(mode, vis, rows_decoded, rows_degraded, warnings)
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::image::Image;
    use crate::modes::{self, Component};
    use crate::waveform::{vis_tones, ToneWriter, VIS_ONE_HZ, VIS_ZERO_HZ};

    // RGB (200, 100, 30) in whichever components the mode sends
    fn solid(_row: usize, component: Component, _x: usize) -> u8 {
        match component {
            Component::Red => 200,
            Component::Green => 100,
            Component::Blue => 30,
            Component::Y => 122,
            Component::RMinusY => 184,
            Component::BMinusY => 76,
            Component::AltChroma => 128,
        }
    }

    // neutral grey at `level`
    fn grey(level: u8) -> impl Fn(usize, Component, usize) -> u8 {
        move |_row, component, _x| match component {
            Component::RMinusY | Component::BMinusY => 128,
            _ => level,
        }
    }

    fn assert_solid(img: &Image, rows: std::ops::Range<usize>) {
        for y in rows {
            for x in [8, img.width() / 2, img.width() - 8] {
                let px = img.pixel(x, y);
                for (got, want) in px.iter().zip([200u8, 100, 30]) {
                    assert!(
                        (*got as i32 - want as i32).abs() <= 10,
                        "pixel ({}, {}) is {:?}",
                        x,
                        y,
                        px
                    );
                }
            }
        }
    }

    fn decode(fs: u32, sig: &[f32]) -> Result<Decoded, DecodeError> {
        SstvDecoderBuilder::new(fs).build().decode(sig)
    }

    #[test]
    fn test_decoder_is_shareable() {
        fn check<T: Clone + Send + Sync>() {}
        check::<SstvDecoder>();
    }

    #[test]
    fn test_robot36_complete() {
        const FS: u32 = 11025;
        let sig = ToneWriter::new(FS)
            .header(8)
            .image(&modes::ROBOT_36, 240, solid)
            .silence(0.5)
            .finish();

        let out = decode(FS, &sig).expect("decode failed");
        println!("{}", out.summary);
        assert_eq!("Robot 36", out.summary.mode_name());
        assert_eq!(8, out.summary.vis().unwrap().code());
        assert!(out.summary.parity_ok());
        assert_eq!(240, out.summary.rows_decoded());
        assert_eq!(0, out.summary.rows_degraded());
        assert_eq!(0, out.summary.rows_missing());
        assert!(!out.summary.truncated());
        assert!(out.summary.warnings().is_empty());

        assert_eq!(320, out.image.width());
        assert_eq!(240, out.image.height());
        assert_solid(&out.image, 0..240);
    }

    #[test]
    fn test_robot36_short_recording() {
        // ten seconds which hold only the first two lines
        const FS: u32 = 44100;
        let mut writer = ToneWriter::new(FS);
        writer.header(8).image(&modes::ROBOT_36, 2, grey(128));
        let mut sig = writer.finish();
        sig.resize(10 * FS as usize, 0.0f32);

        let out = decode(FS, &sig).expect("decode failed");
        assert_eq!("Robot 36", out.summary.mode_name());
        assert_eq!(2, out.summary.rows_decoded());
        assert_eq!(0, out.summary.rows_degraded());
        assert_eq!(238, out.summary.rows_missing());
        assert!(out.summary.truncated());
        assert_eq!(
            "Robot 36 (VIS 8): 2/240 rows, 0 degraded, 238 missing",
            out.summary.to_string()
        );

        for y in 0..2 {
            for x in [8, 160, 312] {
                for v in out.image.pixel(x, y) {
                    assert!((v as i32 - 128).abs() <= 6, "pixel ({}, {}) is {}", x, y, v);
                }
            }
        }
        assert_eq!([0, 0, 0], out.image.pixel(160, 2));
        assert_eq!([0, 0, 0], out.image.pixel(160, 239));
    }

    #[test]
    fn test_rgb_modes() {
        const FS: u32 = 11025;
        for mode in [&modes::MARTIN_1, &modes::SCOTTIE_1] {
            let sig = ToneWriter::new(FS)
                .header(mode.vis_code)
                .image(mode, 8, solid)
                .silence(0.5)
                .finish();

            let out = decode(FS, &sig).expect("decode failed");
            println!("{}", out.summary);
            assert_eq!(mode.name, out.summary.mode_name());
            assert_eq!(8, out.summary.rows_decoded());
            assert_eq!(0, out.summary.rows_degraded());
            assert_eq!(
                &[DecodeWarning::SignalLost {
                    missing_rows: mode.height - 8
                }],
                out.summary.warnings()
            );
            assert_solid(&out.image, 0..8);
        }
    }

    #[test]
    fn test_pd_two_rows_per_line() {
        const FS: u32 = 11025;
        let sig = ToneWriter::new(FS)
            .header(modes::PD_120.vis_code)
            .image(&modes::PD_120, 4, solid)
            .silence(0.5)
            .finish();

        let out = decode(FS, &sig).expect("decode failed");
        assert_eq!("PD 120", out.summary.mode_name());
        assert_eq!(8, out.summary.rows_decoded());
        assert_eq!(0, out.summary.rows_degraded());
        assert!(out.summary.truncated());
        assert_solid(&out.image, 0..8);
    }

    #[test]
    fn test_idempotent() {
        const FS: u32 = 8000;
        let sig = ToneWriter::new(FS)
            .header(modes::MARTIN_2.vis_code)
            .image(&modes::MARTIN_2, 4, solid)
            .silence(0.2)
            .finish();

        let decoder = SstvDecoderBuilder::new(FS).build();
        let first = decoder.decode(&sig).expect("decode failed");
        let second = decoder.decode(&sig).expect("decode failed");
        assert_eq!(first, second);
        assert_eq!(4, first.summary.rows_decoded());
    }

    #[test]
    fn test_truncation_keeps_prefix() {
        const FS: u32 = 11025;
        let mut writer = ToneWriter::new(FS);
        writer.header(modes::MARTIN_1.vis_code);
        let image_start = writer.len();
        writer.image(&modes::MARTIN_1, 6, solid).silence(0.5);
        let sig = writer.finish();

        let full = decode(FS, &sig).expect("decode failed");
        assert_eq!(6, full.summary.rows_decoded());

        let cut = image_start + (3.5 * modes::MARTIN_1.line_secs * FS as f64) as usize;
        let part = decode(FS, &sig[0..cut]).expect("decode failed");
        assert_eq!(3, part.summary.rows_decoded());
        assert_eq!(
            &[DecodeWarning::Truncated { missing_rows: 253 }],
            part.summary.warnings()
        );

        let row_bytes = 3 * modes::MARTIN_1.width;
        assert_eq!(
            &full.image.as_bytes()[0..3 * row_bytes],
            &part.image.as_bytes()[0..3 * row_bytes]
        );
        assert!(part.image.as_bytes()[3 * row_bytes..].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_leader_corruption() {
        const FS: u32 = 11025;
        let clean = ToneWriter::new(FS)
            .header(8)
            .image(&modes::ROBOT_36, 4, grey(60))
            .silence(0.2)
            .finish();

        let mut noise_state = 0x2545f491u32;
        let mut last_ok = true;
        for (i, fraction) in [0.0f64, 0.2, 0.4, 0.6, 0.8, 1.0].iter().enumerate() {
            let mut sig = clean.clone();
            let corrupt = (fraction * 0.3 * FS as f64) as usize;
            for sa in &mut sig[0..corrupt] {
                noise_state ^= noise_state << 13;
                noise_state ^= noise_state >> 17;
                noise_state ^= noise_state << 5;
                *sa = noise_state as f32 / u32::MAX as f32 - 0.5;
            }

            let res = decode(FS, &sig);
            println!("{:.1}: {:?}", fraction, res.as_ref().map(|d| &d.summary));
            match res {
                Ok(out) => {
                    assert!(last_ok, "decode recovered at corruption {}", fraction);
                    assert_eq!("Robot 36", out.summary.mode_name());
                }
                Err(e) => {
                    assert_eq!(DecodeError::NoSignalDetected, e);
                    last_ok = false;
                }
            }

            // short leaders still lock; too-short leaders never do
            assert_eq!(i <= 2, last_ok, "corruption {}", fraction);
        }
    }

    #[test]
    fn test_vis_parity_warning() {
        const FS: u32 = 11025;

        // weaken data bit 2 of Martin 1 (44) so it reads as a zero
        let mut bits = vis_tones(44);
        assert_eq!(VIS_ONE_HZ, bits[2]);
        bits[2] = 1220.0;

        let sig = ToneWriter::new(FS)
            .header_tones(&bits)
            .image(&modes::MARTIN_1, 2, solid)
            .silence(0.2)
            .finish();

        let out = decode(FS, &sig).expect("decode failed");
        assert_eq!("Martin 1", out.summary.mode_name());
        assert_eq!(44, out.summary.vis().unwrap().code());
        assert!(!out.summary.parity_ok());
        assert_eq!(
            DecodeWarning::VisParity { corrected_bit: 2 },
            out.summary.warnings()[0]
        );
        assert_eq!(2, out.summary.rows_decoded());
    }

    #[test]
    fn test_vis_one_bit_away() {
        const FS: u32 = 8000;
        for mode in modes::ALL_MODES {
            for bit in 0..7 {
                let mut bits = vis_tones(mode.vis_code);
                bits[bit] = if bits[bit] == VIS_ONE_HZ {
                    VIS_ZERO_HZ
                } else {
                    VIS_ONE_HZ
                };
                let sig = ToneWriter::new(FS)
                    .header_tones(&bits)
                    .silence(0.3)
                    .finish();

                match decode(FS, &sig) {
                    Ok(out) => {
                        assert_eq!(mode.name, out.summary.mode_name(), "bit {}", bit);
                        assert!(!out.summary.parity_ok());
                        assert!(matches!(
                            out.summary.warnings()[0],
                            DecodeWarning::VisParity { .. }
                        ));
                    }
                    Err(e) => assert!(
                        matches!(e, DecodeError::UnsupportedMode { .. }),
                        "{}",
                        e
                    ),
                }
            }
        }
    }

    #[test]
    fn test_sender_clock_skew() {
        const FS: u32 = 11025;
        const EDGE: usize = 160;

        // first column at or past the black/white edge
        fn edge_column(img: &Image, y: usize) -> usize {
            (0..img.width())
                .find(|x| img.pixel(*x, y)[1] > 128)
                .unwrap_or(img.width())
        }

        for skew in [1.003f64, 0.997] {
            let tx_rate = (FS as f64 * skew).round() as u32;
            let sig = ToneWriter::new(tx_rate)
                .header(modes::MARTIN_1.vis_code)
                .image(&modes::MARTIN_1, 60, |_row, _c, x| {
                    if x < EDGE {
                        0
                    } else {
                        255
                    }
                })
                .silence(0.5)
                .finish();

            let out = decode(FS, &sig).expect("decode failed");
            assert_eq!("Martin 1", out.summary.mode_name());
            assert_eq!(60, out.summary.rows_decoded(), "skew {}", skew);
            assert_eq!(0, out.summary.rows_degraded(), "skew {}", skew);

            for y in [0, 30, 59] {
                let col = edge_column(&out.image, y);
                assert!(
                    (col as i64 - EDGE as i64).abs() <= 3,
                    "skew {}: row {} edge at {}",
                    skew,
                    y,
                    col
                );
            }
        }
    }

    #[test]
    fn test_unsupported_mode() {
        const FS: u32 = 11025;
        let sig = ToneWriter::new(FS)
            .header(45)
            .image(&modes::MARTIN_1, 2, solid)
            .finish();

        assert_eq!(
            Err(DecodeError::UnsupportedMode { code: 45 }),
            decode(FS, &sig)
        );

        let out = SstvDecoderBuilder::new(FS)
            .with_mode(Some(&modes::MARTIN_1))
            .build()
            .decode(&sig)
            .expect("decode failed");
        assert_eq!("Martin 1", out.summary.mode_name());
        assert_eq!(45, out.summary.vis().unwrap().code());
        assert_eq!(2, out.summary.rows_decoded());
    }

    #[test]
    fn test_headerless_forced_mode() {
        const FS: u32 = 11025;
        let sig = ToneWriter::new(FS)
            .silence(0.2)
            .image(&modes::MARTIN_1, 4, solid)
            .silence(0.5)
            .finish();

        assert_eq!(Err(DecodeError::NoSignalDetected), decode(FS, &sig));

        let out = SstvDecoderBuilder::new(FS)
            .with_mode(Some(&modes::MARTIN_1))
            .build()
            .decode(&sig)
            .expect("decode failed");
        assert!(out.summary.vis().is_none());
        assert_eq!(4, out.summary.rows_decoded());
        assert_solid(&out.image, 0..4);
    }

    #[test]
    fn test_decimation() {
        const FS: u32 = 22050;
        let sig = ToneWriter::new(FS)
            .header(modes::MARTIN_1.vis_code)
            .image(&modes::MARTIN_1, 4, solid)
            .silence(0.2)
            .finish();

        let out = SstvDecoderBuilder::new(FS)
            .with_decimation(4)
            .build()
            .decode(&sig)
            .expect("decode failed");
        assert_eq!(4, out.summary.rows_decoded());
        assert_solid(&out.image, 0..4);

        // excessive decimation is limited
        let decoder = SstvDecoderBuilder::new(8000).with_decimation(16).build();
        assert_eq!(3, decoder.decimation);
    }

    #[test]
    fn test_skip() {
        const FS: u32 = 11025;
        let sig = ToneWriter::new(FS)
            .header(8)
            .image(&modes::ROBOT_36, 2, solid)
            .finish();

        for secs in [0.5f64, 100.0] {
            let res = SstvDecoderBuilder::new(FS)
                .with_skip(secs)
                .build()
                .decode(&sig);
            assert_eq!(Err(DecodeError::NoSignalDetected), res);
        }
    }

    #[test]
    fn test_bad_input() {
        assert_eq!(Err(DecodeError::NoSignalDetected), decode(44100, &[]));
        assert_eq!(
            Err(DecodeError::NoSignalDetected),
            decode(8000, &[0.0f32; 16000])
        );
        assert_eq!(
            Err(DecodeError::UnsupportedSampleRate(4000)),
            decode(4000, &[0.0f32; 100])
        );
        assert_eq!(
            Err(DecodeError::UnsupportedSampleRate(384000)),
            decode(384000, &[])
        );
    }
}
