use std::fmt::Display;

use clap::{error::ErrorKind, value_parser, CommandFactory, Parser};

use sstvrx::{modes, ModeSpec};

/// Standard input filename
const STDIN_FILE: &str = "-";

const USAGE_SHORT: &str = r#"
This program reads a recording of one SSTV transmission, decodes the image, and saves it to the --output file. A summary of the decode is printed.

See --help for more details.
"#;

const USAGE_LONG: &str = r#"
This program reads a recording of one SSTV transmission, decodes the image, and saves it to the --output file. The image format is chosen by the file extension: .png, .jpg, .bmp, .gif, or .tif. Unknown formats are saved to result.png instead. A summary of the decode is printed.

Input files may be WAV, FLAC, Ogg Vorbis, or MP3 (see --list-audio-formats). Multi-channel recordings are mixed down to mono. Recordings outside 8 kHz to 192 kHz are resampled.

    sstvdec -o image.png recording.wav

Standard input is read as raw PCM: signed 16-bit (i16), native-endian, one channel, at the given --rate. You can pipe audio in with sox

    sox input.mp3 -t raw -r 44.1k -e signed -b 16 -c 1 - \
        | sstvdec -r 44100 -o image.png -

The transmission mode is normally identified from the VIS code in the calibration header. If the header is damaged or missing, force the mode with --mode. Run with --list-modes for the supported modes.

Exit status is 0 if any part of an image was decoded, 2 if no SSTV signal was found, 3 if the mode is not supported, and 1 for any other error.
"#;

const ADVANCED: &str = "Advanced Decoder Options";

/// Top-level program arguments
#[derive(Parser, Clone, Debug)]
#[command(version)]
#[command(about, long_about = None)]
#[command(after_help = USAGE_SHORT, after_long_help = USAGE_LONG)]
#[command(max_term_width = 100)]
pub struct Args {
    /// Verbosity level (-vvv for more)
    #[arg(short, long, default_value_t = 0, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Print NOTHING, not even the decode summary
    #[arg(short, long)]
    pub quiet: bool,

    /// Input recording (or "-" for raw PCM on stdin)
    #[arg(default_value_t = STDIN_FILE.to_string())]
    pub input: String,

    /// Output image file
    ///
    /// The image format is chosen by the file extension. If that
    /// format can't be written, the image is saved to result.png.
    #[arg(short, long, default_value_t = String::from("result.png"))]
    pub output: String,

    /// Force the SSTV mode, like "M1" or "Robot 36"
    ///
    /// Decodes the image as this mode regardless of the VIS code.
    /// If no calibration header is found at all, decoding starts
    /// at the first sync pulse.
    #[arg(short, long, value_parser = parse_mode)]
    pub mode: Option<&'static ModeSpec>,

    /// Skip the start of the recording (s)
    #[arg(short, long, default_value_t = 0.0)]
    pub skip: f64,

    /// Read the input file as raw PCM
    ///
    /// The input must be one-channel (mono), signed 16-bit
    /// native-endian at --rate. Standard input is always raw.
    #[arg(long)]
    pub raw: bool,

    /// Sampling rate of raw input (Hz)
    #[arg(short, long, default_value_t = sstvrx::PREFERRED_SAMPLE_RATE)]
    #[arg(value_parser = value_parser!(u32).range(1..))]
    pub rate: u32,

    /// List supported SSTV modes and exit
    #[arg(long)]
    pub list_modes: bool,

    /// List supported audio input formats and exit
    #[arg(long)]
    pub list_audio_formats: bool,

    /// List supported image output formats and exit
    #[arg(long)]
    pub list_image_formats: bool,

    /// Frequency trace decimation factor
    #[arg(long, default_value_t = 1)]
    #[arg(value_parser = value_parser!(u32).range(1..=16))]
    #[arg(hide_short_help = true)]
    #[arg(help_heading = ADVANCED)]
    pub decimation: u32,

    /// Demodulator low-pass cutoff (Hz)
    #[arg(long, default_value_t = 1000.0)]
    #[arg(hide_short_help = true)]
    #[arg(help_heading = ADVANCED)]
    pub lowpass_hz: f32,

    /// Demodulator low-pass length (s)
    #[arg(long, default_value_t = 0.001)]
    #[arg(hide_short_help = true)]
    #[arg(help_heading = ADVANCED)]
    pub lowpass_len: f32,

    /// Leader tone tolerance (Hz)
    #[arg(long, default_value_t = 50.0)]
    #[arg(hide_short_help = true)]
    #[arg(help_heading = ADVANCED)]
    pub tone_tolerance: f32,

    /// Minimum leader tone duration (s)
    #[arg(long, default_value_t = 0.15)]
    #[arg(hide_short_help = true)]
    #[arg(help_heading = ADVANCED)]
    pub leader_min: f64,

    /// Rejected header candidates before giving up
    #[arg(long, default_value_t = 32)]
    #[arg(hide_short_help = true)]
    #[arg(help_heading = ADVANCED)]
    pub resync_budget: u32,

    /// Sync pulse search window (s)
    #[arg(long, default_value_t = 0.010)]
    #[arg(hide_short_help = true)]
    #[arg(help_heading = ADVANCED)]
    pub sync_window: f64,

    /// Minimum sync pulse fill (0.1 ≤ FRAC ≤ 1.0)
    #[arg(long, default_value_t = 0.6)]
    #[arg(hide_short_help = true)]
    #[arg(help_heading = ADVANCED)]
    pub sync_min_fraction: f32,

    /// Maximum line period drift (0.0 ≤ FRAC ≤ 0.05)
    #[arg(long, default_value_t = 0.01)]
    #[arg(hide_short_help = true)]
    #[arg(help_heading = ADVANCED)]
    pub drift_max: f64,

    /// Power req'd to keep decoding, vs. header (0.0 ≤ PWR ≤ 1.0)
    #[arg(long, default_value_t = 0.1)]
    #[arg(hide_short_help = true)]
    #[arg(help_heading = ADVANCED)]
    pub squelch: f32,

    /// Consecutive missing sync pulses before giving up
    #[arg(long, default_value_t = 16)]
    #[arg(value_parser = value_parser!(u32).range(1..))]
    #[arg(hide_short_help = true)]
    #[arg(help_heading = ADVANCED)]
    pub max_missed_syncs: u32,
}

impl Args {
    /// Return true if the user requests input from stdin
    pub fn input_is_stdin(&self) -> bool {
        self.input == STDIN_FILE
    }

    /// Return true if the input is raw PCM
    pub fn input_is_raw(&self) -> bool {
        self.raw || self.input_is_stdin()
    }
}

fn parse_mode(name: &str) -> Result<&'static ModeSpec, String> {
    modes::by_short_name(name).ok_or_else(|| {
        let known: Vec<&str> = modes::ALL_MODES.iter().map(|m| m.short_name).collect();
        format!("unknown mode \"{}\" (try one of {})", name, known.join(", "))
    })
}

/// A program-level error with exit code
#[derive(Debug)]
pub struct CliError {
    error: anyhow::Error,
    exit_code: i32,
}

impl CliError {
    /// Create new error with a custom exit code
    pub fn new(error: anyhow::Error, code: i32) -> CliError {
        CliError {
            error,
            exit_code: code,
        }
    }

    /// Process exit code
    pub fn exit_code(&self) -> i32 {
        self.exit_code
    }

    /// Print this error to the terminal
    ///
    /// Errors from clap are printed verbatim. Other types of errors
    /// are printed indirectly via clap's fancy formatter.
    pub fn print(&self) -> std::io::Result<()> {
        if let Some(e) = self.error.downcast_ref::<clap::Error>() {
            e.print()
        } else {
            Args::command()
                .error(ErrorKind::Format, self.to_string())
                .print()
        }
    }

    /// Print this error to the terminal and exit
    pub fn exit(&self) -> ! {
        drop(self.print());
        std::process::exit(self.exit_code);
    }
}

impl Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.error)
    }
}

impl std::error::Error for CliError {}

impl From<anyhow::Error> for CliError {
    fn from(err: anyhow::Error) -> CliError {
        CliError::new(err, 1)
    }
}

impl From<clap::Error> for CliError {
    fn from(err: clap::Error) -> CliError {
        let code = if err.use_stderr() { 1 } else { 0 };
        CliError::new(err.into(), code)
    }
}
