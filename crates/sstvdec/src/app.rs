//! Decode a recording and save the image

use anyhow::{anyhow, Context};
use log::{info, warn};

use sstvrx::{modes, DecodeError, Decoded, SstvDecoderBuilder};

use crate::audio::{self, Recording};
use crate::cli::{Args, CliError};

/// Exit code when no SSTV signal is found
pub const EXIT_NO_SIGNAL: i32 = 2;

/// Exit code when the SSTV mode is not supported
pub const EXIT_UNSUPPORTED_MODE: i32 = 3;

/// Output file used when the requested image format can't be written
pub const FALLBACK_OUTPUT: &str = "result.png";

/// Run the application
///
/// Decodes the `recording` with the decoder options in `args`,
/// saves the image to the `--output` file, and prints a
/// summary unless `--quiet`.
pub fn run(args: &Args, recording: Recording) -> Result<(), CliError> {
    let recording = if sstvrx::SUPPORTED_SAMPLE_RATES.contains(&recording.rate) {
        recording
    } else {
        warn!(
            "sampling rate {} Hz is not supported; resampling",
            recording.rate
        );
        audio::resample(&recording, sstvrx::PREFERRED_SAMPLE_RATE)?
    };

    info!(
        "decoding {:.1} s of audio at {} Hz",
        recording.duration_secs(),
        recording.rate
    );

    let decoder = SstvDecoderBuilder::new(recording.rate)
        .with_mode(args.mode)
        .with_skip(args.skip)
        .with_decimation(args.decimation)
        .with_lowpass(args.lowpass_hz, args.lowpass_len)
        .with_tone_tolerance(args.tone_tolerance)
        .with_leader_min(args.leader_min)
        .with_resync_budget(args.resync_budget)
        .with_sync_window(args.sync_window)
        .with_sync_min_fraction(args.sync_min_fraction)
        .with_drift_max(args.drift_max)
        .with_squelch_ratio(args.squelch)
        .with_max_missed_syncs(args.max_missed_syncs)
        .build();

    let Decoded { image, summary } = decoder.decode(&recording.samples).map_err(decode_error)?;

    let (width, height) = (image.width() as u32, image.height() as u32);
    let output = output_path(&args.output);
    save(width, height, image.into_raw(), output)?;
    info!("saved image to \"{}\"", output);

    if !args.quiet {
        println!("{}", summary);
        for warning in summary.warnings() {
            println!("warning: {}", warning);
        }
    }

    Ok(())
}

/// Print the supported modes
pub fn list_modes() {
    println!(
        "{:<5} {:<12} {:>4} {:>9} {:<6} {:>7}",
        "NAME", "MODE", "VIS", "SIZE", "COLOR", "TIME"
    );
    for mode in modes::ALL_MODES {
        println!(
            "{:<5} {:<12} {:>4} {:>9} {:<6} {:>6.1}s",
            mode.short_name,
            mode.name,
            mode.vis_code,
            format!("{}x{}", mode.width, mode.height),
            mode.color.as_code_str(),
            mode.image_secs()
        );
    }
}

/// Print the audio input formats
pub fn list_audio_formats() {
    for (name, desc) in audio::AUDIO_FORMATS {
        println!("{:<5} {}", name, desc);
    }
}

/// Print the image output formats
pub fn list_image_formats() {
    for format in image::ImageFormat::all().filter(|f| f.writing_enabled()) {
        println!(
            "{:<5} {}",
            format.extensions_str().first().copied().unwrap_or_default(),
            format.extensions_str().join(", ")
        );
    }
}

// Output path for the requested file
//
// Falls back to FALLBACK_OUTPUT if the extension names no
// image format that can be written.
fn output_path(requested: &str) -> &str {
    match image::ImageFormat::from_path(requested) {
        Ok(format) if format.writing_enabled() => requested,
        _ => {
            warn!(
                "cannot save \"{}\" in that format; saving to \"{}\" instead",
                requested, FALLBACK_OUTPUT
            );
            FALLBACK_OUTPUT
        }
    }
}

// Save as the format named by the file extension
fn save(width: u32, height: u32, rgb: Vec<u8>, path: &str) -> Result<(), anyhow::Error> {
    let buf = image::RgbImage::from_raw(width, height, rgb)
        .ok_or_else(|| anyhow!("decoded image has the wrong size"))?;
    buf.save(path)
        .with_context(|| format!("Unable to write --output \"{}\"", path))
}

fn decode_error(err: DecodeError) -> CliError {
    let code = match err {
        DecodeError::NoSignalDetected => EXIT_NO_SIGNAL,
        DecodeError::UnsupportedMode { .. } => EXIT_UNSUPPORTED_MODE,
        DecodeError::UnsupportedSampleRate(_) => 1,
    };
    CliError::new(anyhow::Error::new(err), code)
}
