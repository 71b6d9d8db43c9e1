//! # sstvrx: SSTV Image Decoding
//!
//! This crate decodes
//! [slow-scan television](https://en.wikipedia.org/wiki/Slow-scan_television)
//! (SSTV) images from audio recordings. Amateur radio operators
//! send still images over voice channels as a frequency-modulated
//! audio tone. Given a recording of one transmission, this crate
//! identifies the mode, recovers the image, and reports how well
//! the decode went.
//!
//! ## Example
//!
//! You will need a mono recording of the transmission as `f32`
//! samples. To read a WAV file, try
//! [hound](https://crates.io/crates/hound). If you have a stereo
//! recording, mix to mono first. There is no need to scale the
//! samples.
//!
//! ```
//! use sstvrx::{DecodeError, SstvDecoderBuilder};
//!
//! # let recording: Vec<f32> = vec![0.0f32; 44100];
//! #
//! // create a decoder with your audio sampling rate
//! let decoder = SstvDecoderBuilder::new(44100)
//!     .with_skip(0.0)             // seconds to discard from the start
//!     .with_squelch_ratio(0.1)    // stop when the signal fades below 10%
//!     .build();
//!
//! match decoder.decode(&recording) {
//!     Ok(decoded) => {
//!         println!("{}", decoded.summary);
//!         for warning in decoded.summary.warnings() {
//!             println!("warning: {}", warning);
//!         }
//!         let _rgb: &[u8] = decoded.image.as_bytes();
//!     }
//!     Err(DecodeError::NoSignalDetected) => println!("nothing here"),
//!     Err(e) => println!("decode failed: {}", e),
//! }
//! ```
//!
//! The decoder is created via a
//! [builder](struct.SstvDecoderBuilder.html). Once built, it
//! holds no state between recordings and may be reused or
//! shared between threads.
//!
//! A decode which recovers any part of the image succeeds.
//! Problems such as a corrected VIS parity error, rows decoded
//! without a sync pulse, or a recording which ends early are
//! reported as [`DecodeWarning`]s in the
//! [`DecodeSummary`]. Rows which were never received are black.
//!
//! ## Background
//!
//! An SSTV transmission begins with a *calibration header*: two
//! 300 ms leader tones at 1900 Hz separated by a 10 ms break at
//! 1200 Hz, followed by a *VIS code*. The VIS code is seven data
//! bits and one even parity bit, each 30 ms long, sent LSB first
//! at 1100 Hz (one) or 1300 Hz (zero) between two 1200 Hz start
//! and stop bits. The code names the *mode* of the image which
//! follows.
//!
//! The image is sent line by line. Each line begins, or for some
//! modes ends, with a short 1200 Hz sync pulse. Pixel brightness
//! maps linearly onto frequency, from 1500 Hz for black to
//! 2300 Hz for white. Modes differ in resolution, color model,
//! and the order and duration of their color scans.
//!
//! Supported modes are listed in [`modes::ALL_MODES`]:
//!
//! * Robot 36 and Robot 72
//! * Martin 1 and Martin 2
//! * Scottie 1, Scottie 2, and Scottie DX
//! * PD 50, 90, 120, 160, 180, 240, and 290
//!
//! The decoder corrects for small differences between the
//! transmitter's and the recorder's sample clocks, which would
//! otherwise slant the image.

mod builder;
mod demod;
mod filter;
mod header;
mod image;
mod output;
mod receiver;
mod scan;
mod trace;

pub mod modes;
pub mod waveform;

pub use builder::SstvDecoderBuilder;
pub use header::VisCode;
pub use image::{Image, ScanLine};
pub use modes::{ColorModel, ModeSpec};
pub use output::{DecodeError, DecodeSummary, DecodeWarning, Decoded};
pub use receiver::{SstvDecoder, PREFERRED_SAMPLE_RATE, SUPPORTED_SAMPLE_RATES};
pub use trace::FrequencyTrace;
