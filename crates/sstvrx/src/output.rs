//! Decoder results and diagnostics

use std::fmt;

use thiserror::Error;

use crate::header::VisCode;
use crate::image::Image;
use crate::modes::ModeSpec;

/// Fatal decoding error
///
/// A decode which produces any image rows at all is a
/// success. Problems with a successful decode are reported
/// as [`DecodeWarning`]s instead.
#[derive(Error, Clone, Debug, PartialEq, Eq, Hash)]
pub enum DecodeError {
    /// No calibration header was found in the recording
    #[error("no SSTV signal detected")]
    NoSignalDetected,

    /// The VIS code does not name a supported mode
    #[error("unsupported SSTV mode: VIS code {code}")]
    UnsupportedMode {
        /// The received VIS code
        code: u8,
    },

    /// The decoder cannot operate at this sampling rate
    #[error("unsupported sampling rate: {0} Hz")]
    UnsupportedSampleRate(u32),
}

/// Non-fatal decoding problem
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DecodeWarning {
    /// The VIS code failed its parity check
    ///
    /// The least-confident bit was flipped to restore parity.
    /// Bit `7` is the parity bit itself, in which case the
    /// data bits were used as received.
    VisParity {
        /// Index of the corrected bit, LSB first
        corrected_bit: u8,
    },

    /// Some rows were decoded without a located sync pulse
    DegradedRows(usize),

    /// The recording ended before the image was complete
    Truncated {
        /// Rows which were never received
        missing_rows: usize,
    },

    /// The signal faded before the image was complete
    SignalLost {
        /// Rows which were never received
        missing_rows: usize,
    },
}

impl fmt::Display for DecodeWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeWarning::VisParity { corrected_bit: 7 } => {
                write!(f, "VIS parity error (parity bit corrected)")
            }
            DecodeWarning::VisParity { corrected_bit } => {
                write!(f, "VIS parity error (bit {} corrected)", corrected_bit)
            }
            DecodeWarning::DegradedRows(n) => {
                write!(f, "{} row(s) decoded without sync", n)
            }
            DecodeWarning::Truncated { missing_rows } => {
                write!(f, "recording truncated: {} row(s) missing", missing_rows)
            }
            DecodeWarning::SignalLost { missing_rows } => {
                write!(f, "signal lost: {} row(s) missing", missing_rows)
            }
        }
    }
}

/// Summary of a completed decode
#[derive(Clone, Debug, PartialEq)]
pub struct DecodeSummary {
    mode: &'static ModeSpec,
    vis: Option<VisCode>,
    rows_decoded: usize,
    rows_degraded: usize,
    rows_missing: usize,
    warnings: Vec<DecodeWarning>,
}

impl DecodeSummary {
    pub(crate) fn new(
        mode: &'static ModeSpec,
        vis: Option<VisCode>,
        rows_decoded: usize,
        rows_degraded: usize,
        warnings: Vec<DecodeWarning>,
    ) -> Self {
        Self {
            mode,
            vis,
            rows_decoded,
            rows_degraded,
            rows_missing: mode.height.saturating_sub(rows_decoded),
            warnings,
        }
    }

    /// Decoded mode
    pub fn mode(&self) -> &'static ModeSpec {
        self.mode
    }

    /// Human-readable mode name, like "`Robot 36`"
    pub fn mode_name(&self) -> &'static str {
        self.mode.name
    }

    /// Received VIS code
    ///
    /// `None` if the mode was forced by the caller and no
    /// header was received.
    pub fn vis(&self) -> Option<&VisCode> {
        self.vis.as_ref()
    }

    /// True if the VIS code was received with good parity
    pub fn parity_ok(&self) -> bool {
        self.vis.as_ref().map(|v| v.parity_ok()).unwrap_or(false)
    }

    /// Number of rows written, including degraded rows
    pub fn rows_decoded(&self) -> usize {
        self.rows_decoded
    }

    /// Number of rows decoded without a located sync pulse
    pub fn rows_degraded(&self) -> usize {
        self.rows_degraded
    }

    /// Number of rows which were never received
    ///
    /// Missing rows are rendered black.
    pub fn rows_missing(&self) -> usize {
        self.rows_missing
    }

    /// True if the image ended early
    ///
    /// The recording either ran out or the signal faded.
    pub fn truncated(&self) -> bool {
        self.warnings.iter().any(|w| {
            matches!(
                w,
                DecodeWarning::Truncated { .. } | DecodeWarning::SignalLost { .. }
            )
        })
    }

    /// Non-fatal problems, in the order they occurred
    pub fn warnings(&self) -> &[DecodeWarning] {
        &self.warnings
    }
}

impl fmt::Display for DecodeSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.mode.name)?;
        if let Some(vis) = &self.vis {
            write!(f, " (VIS {})", vis.code())?;
        }
        write!(
            f,
            ": {}/{} rows, {} degraded, {} missing",
            self.rows_decoded, self.mode.height, self.rows_degraded, self.rows_missing
        )
    }
}

/// A decoded image and its diagnostics
#[derive(Clone, Debug, PartialEq)]
pub struct Decoded {
    /// Decoded image
    pub image: Image,

    /// Diagnostics
    pub summary: DecodeSummary,
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::modes;

    #[test]
    fn test_summary() {
        let summary = DecodeSummary::new(
            &modes::ROBOT_36,
            Some(VisCode::new(8, true, None)),
            2,
            0,
            vec![DecodeWarning::Truncated { missing_rows: 238 }],
        );
        assert_eq!(238, summary.rows_missing());
        assert!(summary.truncated());
        assert!(summary.parity_ok());
        assert_eq!(
            "Robot 36 (VIS 8): 2/240 rows, 0 degraded, 238 missing",
            format!("{}", summary)
        );

        let summary = DecodeSummary::new(&modes::MARTIN_1, None, 256, 3, vec![]);
        assert!(!summary.truncated());
        assert!(!summary.parity_ok());
        assert_eq!(
            "Martin 1: 256/256 rows, 3 degraded, 0 missing",
            format!("{}", summary)
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(
            "unsupported SSTV mode: VIS code 45",
            format!("{}", DecodeError::UnsupportedMode { code: 45 })
        );
        assert_eq!(
            "VIS parity error (bit 3 corrected)",
            format!("{}", DecodeWarning::VisParity { corrected_bit: 3 })
        );
        assert_eq!(
            "VIS parity error (parity bit corrected)",
            format!("{}", DecodeWarning::VisParity { corrected_bit: 7 })
        );
    }
}
