//! Recording input

use std::io;
use std::path::Path;

use anyhow::{anyhow, Context};
use byteorder::{NativeEndian, ReadBytesExt};
use log::{debug, info, warn};
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{MediaSource, MediaSourceStream, MediaSourceStreamOptions};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// Audio formats which can be decoded
///
/// Each entry is a format name and its description.
pub const AUDIO_FORMATS: &[(&str, &str)] = &[
    ("WAV", "integer or floating-point PCM"),
    ("FLAC", "free lossless audio codec"),
    ("OGG", "Ogg Vorbis"),
    ("MKV", "Matroska / WebM with Vorbis, FLAC, or PCM audio"),
    ("MP3", "MPEG-1 layer III"),
    ("RAW", "mono s16 native-endian PCM (--raw or stdin)"),
];

// Frames per resampler chunk
const RESAMPLE_CHUNK_FRAMES: usize = 1024;

/// A mono recording
#[derive(Clone, Debug, PartialEq)]
pub struct Recording {
    /// Samples, in arbitrary units
    pub samples: Vec<f32>,

    /// Sampling rate (Hz)
    pub rate: u32,
}

impl Recording {
    /// Duration (s)
    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.rate as f64
    }
}

/// Read a WAV file
///
/// Integer and floating-point WAV files are accepted. Multiple
/// channels are mixed down to mono.
pub fn read_wav<R: io::Read>(reader: R) -> Result<Recording, anyhow::Error> {
    let mut wav = hound::WavReader::new(reader).context("Unable to read WAV header")?;
    let spec = wav.spec();
    debug!(
        "wav: {} channel(s), {} Hz, {} bits, {:?}",
        spec.channels, spec.sample_rate, spec.bits_per_sample, spec.sample_format
    );
    if spec.channels == 0 {
        return Err(anyhow!("WAV file has no channels"));
    }

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => wav
            .samples::<f32>()
            .collect::<Result<_, _>>()
            .context("Unable to read WAV samples")?,
        hound::SampleFormat::Int => wav
            .samples::<i32>()
            .map(|sa| sa.map(|v| v as f32))
            .collect::<Result<_, _>>()
            .context("Unable to read WAV samples")?,
    };

    Ok(Recording {
        samples: mixdown(&interleaved, spec.channels as usize),
        rate: spec.sample_rate,
    })
}

/// Read a recording file
///
/// Files ending in `.wav` are read with [`read_wav`]. Anything
/// else is identified by its contents and extension and read
/// with [`read_media`].
pub fn read_file<P: AsRef<Path>>(path: P) -> Result<Recording, anyhow::Error> {
    let path = path.as_ref();
    let file = std::fs::File::open(path)?;
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());

    match extension.as_deref() {
        Some("wav") | Some("wave") => read_wav(io::BufReader::new(file)),
        ext => read_media(Box::new(file), ext),
    }
}

/// Read a compressed or containerized recording
///
/// The format is probed from the `source` contents, with the
/// file `extension` as a hint. The first audio track is
/// decoded and mixed down to mono. Corrupt packets are skipped.
pub fn read_media(
    source: Box<dyn MediaSource>,
    extension: Option<&str>,
) -> Result<Recording, anyhow::Error> {
    let mut hint = Hint::new();
    if let Some(ext) = extension {
        hint.with_extension(ext);
    }

    let mss = MediaSourceStream::new(source, MediaSourceStreamOptions::default());
    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .context("Unrecognized audio format")?;

    let mut format = probed.format;
    let track = format
        .default_track()
        .ok_or_else(|| anyhow!("no audio track"))?;
    let track_id = track.id;
    let params = track.codec_params.clone();
    debug!(
        "media: codec {:?}, {:?} Hz, {:?} frames",
        params.codec, params.sample_rate, params.n_frames
    );

    let mut decoder = symphonia::default::get_codecs()
        .make(&params, &DecoderOptions::default())
        .context("Unsupported audio codec")?;

    let mut rate = params.sample_rate.unwrap_or(0);
    let mut channels = params.channels.map(|ch| ch.count()).unwrap_or(0);
    let mut interleaved = Vec::new();
    let mut sample_buf: Option<SampleBuffer<f32>> = None;
    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(e).context("Unable to read audio packet"),
        };
        if packet.track_id() != track_id {
            continue;
        }

        let audio_buf = match decoder.decode(&packet) {
            Ok(audio_buf) => audio_buf,
            Err(SymphoniaError::DecodeError(e)) => {
                warn!("skipping corrupt audio packet: {}", e);
                continue;
            }
            Err(SymphoniaError::ResetRequired) => {
                decoder.reset();
                continue;
            }
            Err(e) => return Err(e).context("Unable to decode audio"),
        };

        let spec = *audio_buf.spec();
        rate = spec.rate;
        channels = spec.channels.count();

        // SampleBuffer capacity counts samples, not frames
        let needed = audio_buf.capacity() * channels;
        let needs_realloc = sample_buf
            .as_ref()
            .map_or(true, |buf| buf.capacity() < needed);
        if needs_realloc {
            sample_buf = Some(SampleBuffer::<f32>::new(audio_buf.capacity() as u64, spec));
        }
        if let Some(buf) = sample_buf.as_mut() {
            buf.copy_interleaved_ref(audio_buf);
            interleaved.extend_from_slice(buf.samples());
        }
    }

    if rate == 0 || channels == 0 {
        return Err(anyhow!("audio track has no sampling rate or channels"));
    }

    Ok(Recording {
        samples: mixdown(&interleaved, channels),
        rate,
    })
}

/// Read raw PCM
///
/// The input is mono, signed 16-bit, native-endian, at `rate` Hz.
/// Reading stops at end of file. A trailing partial sample is
/// ignored.
pub fn read_raw<R: io::Read>(mut reader: R, rate: u32) -> Result<Recording, anyhow::Error> {
    let mut samples = Vec::new();
    loop {
        match reader.read_i16::<NativeEndian>() {
            Ok(sa) => samples.push(sa as f32),
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(e).context("Unable to read raw samples"),
        }
    }

    Ok(Recording { samples, rate })
}

/// Average interleaved channels into one
pub fn mixdown(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }

    interleaved
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

/// Resample to a new rate
///
/// Uses a band-limited sinc interpolator, which also removes
/// content above the new Nyquist frequency. The output is
/// aligned with the input and has the same duration.
pub fn resample(recording: &Recording, rate: u32) -> Result<Recording, anyhow::Error> {
    if recording.rate == rate || recording.samples.is_empty() {
        return Ok(Recording {
            samples: recording.samples.clone(),
            rate,
        });
    }

    info!("resampling from {} Hz to {} Hz", recording.rate, rate);

    let ratio = rate as f64 / recording.rate as f64;
    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        oversampling_factor: 128,
        interpolation: SincInterpolationType::Linear,
        window: WindowFunction::BlackmanHarris2,
    };
    let mut resampler = SincFixedIn::<f32>::new(ratio, 1.0, params, RESAMPLE_CHUNK_FRAMES, 1)
        .context("failed to create resampler")?;

    let delay = resampler.output_delay();
    let want = (recording.samples.len() as f64 * ratio).round() as usize;

    let mut out = Vec::with_capacity(want + delay + RESAMPLE_CHUNK_FRAMES);
    let mut chunks = recording.samples.chunks_exact(RESAMPLE_CHUNK_FRAMES);
    for chunk in &mut chunks {
        let wave = resampler.process(&[chunk], None).context("resample error")?;
        out.extend_from_slice(&wave[0]);
    }

    let rest = chunks.remainder();
    if !rest.is_empty() {
        let wave = resampler
            .process_partial(Some(&[rest]), None)
            .context("resample error")?;
        out.extend_from_slice(&wave[0]);
    }

    // flush the filter delay
    while out.len() < want + delay {
        let wave = resampler
            .process_partial(None::<&[&[f32]]>, None)
            .context("resample error")?;
        out.extend_from_slice(&wave[0]);
    }

    out.drain(..delay);
    out.truncate(want);
    Ok(Recording { samples: out, rate })
}

#[cfg(test)]
mod tests {
    use super::*;

    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_mixdown() {
        assert_eq!(vec![1.0f32, 2.0], mixdown(&[1.0, 2.0], 1));
        assert_eq!(vec![1.5f32, -1.0], mixdown(&[1.0, 2.0, 0.0, -2.0, 7.0], 2));
    }

    #[test]
    fn test_read_raw() {
        let mut bytes = Vec::new();
        for sa in [1i16, -2, 300] {
            bytes.extend_from_slice(&sa.to_ne_bytes());
        }
        bytes.push(0x7f);

        let rec = read_raw(bytes.as_slice(), 8000).expect("read failed");
        assert_eq!(vec![1.0f32, -2.0, 300.0], rec.samples);
        assert_eq!(8000, rec.rate);
    }

    #[test]
    fn test_read_wav() {
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 11025,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let mut cursor = io::Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).expect("writer");
            for sa in [100i16, 300, -50, -150] {
                writer.write_sample(sa).expect("write");
            }
            writer.finalize().expect("finalize");
        }
        cursor.set_position(0);

        let rec = read_wav(cursor).expect("read failed");
        assert_eq!(11025, rec.rate);
        assert_eq!(vec![200.0f32, -100.0], rec.samples);

        assert!(read_wav(io::Cursor::new(b"not a wav file".to_vec())).is_err());
    }

    // RMS over the middle half of a signal
    fn rms_middle(samples: &[f32]) -> f32 {
        let mid = &samples[samples.len() / 4..3 * samples.len() / 4];
        f32::sqrt(mid.iter().map(|x| x * x).sum::<f32>() / mid.len() as f32)
    }

    fn tone(freq: f32, rate: u32, secs: f32) -> Recording {
        let len = (secs * rate as f32) as usize;
        Recording {
            samples: (0..len)
                .map(|n| f32::sin(2.0 * std::f32::consts::PI * freq * n as f32 / rate as f32))
                .collect(),
            rate,
        }
    }

    #[test]
    fn test_resample() {
        let rec = tone(1500.0, 96000, 0.5);
        assert_eq!(rec.samples, resample(&rec, 96000).expect("resample").samples);

        // in-band tones keep their level, length, and timing
        let down = resample(&rec, 44100).expect("resample");
        assert_eq!(44100, down.rate);
        assert_eq!(22050, down.samples.len());
        assert_approx_eq!(std::f32::consts::FRAC_1_SQRT_2, rms_middle(&down.samples), 0.02);
        let expect = tone(1500.0, 44100, 0.5);
        let worst = down.samples[1000..21000]
            .iter()
            .zip(&expect.samples[1000..21000])
            .map(|(a, b)| f32::abs(a - b))
            .fold(0.0f32, f32::max);
        assert!(worst < 0.3, "misaligned by {}", worst);

        let up = resample(&tone(1500.0, 11025, 0.5), 44100).expect("resample");
        assert_eq!(22050, up.samples.len());
        assert_approx_eq!(std::f32::consts::FRAC_1_SQRT_2, rms_middle(&up.samples), 0.02);
    }

    #[test]
    fn test_resample_rejects_aliases() {
        // 30 kHz would fold to 14.1 kHz at 44.1 kHz
        let rec = tone(30000.0, 192000, 0.25);
        let down = resample(&rec, 44100).expect("resample");
        assert!(rms_middle(&down.samples) < 0.01);
    }

    #[test]
    fn test_read_media() {
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let mut cursor = io::Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).expect("writer");
            for sa in [16384i16, 0, -8192, -8192] {
                writer.write_sample(sa).expect("write");
            }
            writer.finalize().expect("finalize");
        }

        let rec = read_media(Box::new(io::Cursor::new(cursor.into_inner())), Some("wav"))
            .expect("read failed");
        assert_eq!(8000, rec.rate);
        assert_eq!(2, rec.samples.len());
        assert_approx_eq!(0.25f32, rec.samples[0], 1.0e-4);
        assert_approx_eq!(-0.25f32, rec.samples[1], 1.0e-4);

        let junk = io::Cursor::new(b"this is not audio".to_vec());
        assert!(read_media(Box::new(junk), None).is_err());
    }
}
