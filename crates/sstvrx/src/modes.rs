//! SSTV mode registry
//!
//! Every supported transmission mode is described by a static
//! [`ModeSpec`] row. The decoder contains no per-mode logic:
//! line timing, scan order, color model, and the chroma
//! selector tone are all data. A new mode is added by adding
//! one more row here and one more entry in the VIS map.
//!
//! All times are in seconds. Scan start times are relative to
//! the start of the line. The sync pulse is located at
//! [`ModeSpec::sync_offset_secs`] from the start of the line.
//! For Martin, Robot, and PD modes the line begins with the
//! sync pulse. Scottie modes put their sync in the middle of
//! the line and precede the first line with a one-time
//! "start sync."

use std::fmt;

use phf::phf_map;
use strum::EnumMessage;

use crate::waveform::{BLACK_HZ, WHITE_HZ};

/// Color model of a mode
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    strum_macros::EnumMessage,
    strum_macros::IntoStaticStr,
)]
pub enum ColorModel {
    /// Three scans of red, green, and blue
    #[strum(serialize = "RGB", detailed_message = "Red, green, blue")]
    Rgb,

    /// Luminance plus two color-difference components
    ///
    /// Color differences are R−Y (Cr) and B−Y (Cb).
    /// Components are full-range, with the color differences
    /// centered on 128.
    #[strum(serialize = "YCrCb", detailed_message = "Luminance and color difference")]
    YCrCb,
}

impl ColorModel {
    /// Human-readable description
    pub fn as_display_str(&self) -> &'static str {
        self.get_detailed_message().unwrap_or("")
    }

    /// Short name, like "`RGB`"
    pub fn as_code_str(&self) -> &'static str {
        self.into()
    }
}

impl fmt::Display for ColorModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            self.as_code_str().fmt(f)
        } else {
            self.as_display_str().fmt(f)
        }
    }
}

/// Color component carried by a scan segment
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, strum_macros::IntoStaticStr)]
pub enum Component {
    /// Luminance
    Y,

    /// Red color difference (Cr)
    RMinusY,

    /// Blue color difference (Cb)
    BMinusY,

    /// Either `RMinusY` or `BMinusY`
    ///
    /// The carried component is announced by the mode's
    /// chroma selector tone or, failing that, the row parity:
    /// even rows carry R−Y and odd rows carry B−Y.
    AltChroma,

    /// Red
    Red,

    /// Green
    Green,

    /// Blue
    Blue,
}

impl Component {
    /// Image plane which stores this component
    ///
    /// Planes are `[R, G, B]` for RGB modes and
    /// `[Y, Cr, Cb]` for YCrCb modes. `AltChroma` has no
    /// fixed plane and returns `None`.
    pub fn plane(&self) -> Option<usize> {
        match self {
            Component::Y | Component::Red => Some(0),
            Component::RMinusY | Component::Green => Some(1),
            Component::BMinusY | Component::Blue => Some(2),
            Component::AltChroma => None,
        }
    }

    /// Short name, for diagnostics
    pub fn as_str(&self) -> &'static str {
        self.into()
    }
}

/// Which rows of a sync period a scan belongs to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RowSelect {
    /// The scan is shared by every row in the sync period
    All,

    /// The scan belongs to the given row within the period
    Row(usize),
}

impl RowSelect {
    /// True if the scan contributes to row `n` of the period
    pub fn includes(&self, n: usize) -> bool {
        match self {
            RowSelect::All => true,
            RowSelect::Row(r) => *r == n,
        }
    }
}

/// One scanned color component within a line
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Scan {
    /// Start time, relative to the start of the line
    pub start_secs: f64,

    /// Duration of the scan. Pixels are evenly spaced.
    pub duration_secs: f64,

    /// Carried color component
    pub component: Component,

    /// Row(s) of the sync period this scan belongs to
    pub rows: RowSelect,
}

/// A fixed-frequency tone segment within a line
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Segment {
    /// Start time, relative to the start of the line
    pub start_secs: f64,

    /// Duration of the segment
    pub duration_secs: f64,
}

/// Static description of an SSTV mode
///
/// Obtain one with [`lookup()`], [`by_short_name()`], or
/// by iterating [`ALL_MODES`].
///
/// ```
/// use sstvrx::modes;
///
/// let mode = modes::lookup(8).expect("Robot 36 is known");
/// assert_eq!("Robot 36", mode.name);
/// assert_eq!(320, mode.width);
/// assert_eq!(240, mode.height);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct ModeSpec {
    /// Full human-readable name, like "`Martin 1`"
    pub name: &'static str,

    /// Short name, like "`M1`"
    pub short_name: &'static str,

    /// VIS code which announces this mode
    pub vis_code: u8,

    /// Image width, in pixels
    pub width: usize,

    /// Image height, in rows
    pub height: usize,

    /// Color model
    pub color: ColorModel,

    /// Period between successive sync pulses
    pub line_secs: f64,

    /// Length of the sync pulse
    pub sync_secs: f64,

    /// Position of the sync pulse within the line
    pub sync_offset_secs: f64,

    /// Length of a one-time sync pulse which precedes line 0
    ///
    /// Zero if the mode does not use one.
    pub start_sync_secs: f64,

    /// Number of image rows transmitted per sync period
    pub rows_per_line: usize,

    /// Scan segments of one sync period
    pub scans: &'static [Scan],

    /// Tone which announces the alternating chroma component
    pub chroma_selector: Option<Segment>,

    /// Frequency of value `0`
    pub black_hz: f32,

    /// Frequency of value `255`
    pub white_hz: f32,
}

impl ModeSpec {
    /// Number of sync periods in the image
    pub fn line_count(&self) -> usize {
        self.height / self.rows_per_line.max(1)
    }

    /// Image transmission time, excluding the header
    pub fn image_secs(&self) -> f64 {
        self.start_sync_secs + self.line_count() as f64 * self.line_secs
    }

    /// Offset of line 0's sync pulse from the end of the header
    ///
    /// For modes with a start sync, line 0 begins once the
    /// start sync ends.
    pub fn first_sync_secs(&self) -> f64 {
        self.start_sync_secs + self.sync_offset_secs
    }
}

impl fmt::Display for ModeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            self.short_name.fmt(f)
        } else {
            self.name.fmt(f)
        }
    }
}

/// Look up a mode by its VIS code
pub fn lookup(vis_code: u8) -> Option<&'static ModeSpec> {
    MODES_BY_VIS.get(&vis_code).copied()
}

/// Look up a mode by its short name
///
/// The comparison ignores ASCII case. Full names match too.
///
/// ```
/// use sstvrx::modes;
///
/// assert_eq!(44, modes::by_short_name("m1").unwrap().vis_code);
/// assert_eq!(44, modes::by_short_name("Martin 1").unwrap().vis_code);
/// assert!(modes::by_short_name("nope").is_none());
/// ```
pub fn by_short_name(name: &str) -> Option<&'static ModeSpec> {
    let name = name.trim();
    ALL_MODES
        .iter()
        .copied()
        .find(|m| m.short_name.eq_ignore_ascii_case(name) || m.name.eq_ignore_ascii_case(name))
}

/// Every supported mode, in listing order
pub static ALL_MODES: &[&ModeSpec] = &[
    &ROBOT_36, &ROBOT_72, &MARTIN_1, &MARTIN_2, &SCOTTIE_1, &SCOTTIE_2, &SCOTTIE_DX, &PD_50,
    &PD_90, &PD_120, &PD_160, &PD_180, &PD_240, &PD_290,
];

static MODES_BY_VIS: phf::Map<u8, &'static ModeSpec> = phf_map! {
    8u8 => &ROBOT_36,
    12u8 => &ROBOT_72,
    40u8 => &MARTIN_2,
    44u8 => &MARTIN_1,
    56u8 => &SCOTTIE_2,
    60u8 => &SCOTTIE_1,
    76u8 => &SCOTTIE_DX,
    93u8 => &PD_50,
    94u8 => &PD_290,
    95u8 => &PD_120,
    96u8 => &PD_180,
    97u8 => &PD_240,
    98u8 => &PD_160,
    99u8 => &PD_90,
};

// Robot: 9 ms sync, 3 ms porch, then luminance. Each chroma
// scan is preceded by a 4.5 ms separator and a 1.5 ms porch.
const ROBOT_SYNC: f64 = 0.009;
const ROBOT_Y_START: f64 = 0.012;

pub static ROBOT_36: ModeSpec = ModeSpec {
    name: "Robot 36",
    short_name: "R36",
    vis_code: 8,
    width: 320,
    height: 240,
    color: ColorModel::YCrCb,
    line_secs: 0.150,
    sync_secs: ROBOT_SYNC,
    sync_offset_secs: 0.0,
    start_sync_secs: 0.0,
    rows_per_line: 1,
    scans: &[
        Scan {
            start_secs: ROBOT_Y_START,
            duration_secs: 0.088,
            component: Component::Y,
            rows: RowSelect::All,
        },
        Scan {
            start_secs: 0.106,
            duration_secs: 0.044,
            component: Component::AltChroma,
            rows: RowSelect::All,
        },
    ],
    chroma_selector: Some(Segment {
        start_secs: 0.100,
        duration_secs: 0.0045,
    }),
    black_hz: BLACK_HZ,
    white_hz: WHITE_HZ,
};

pub static ROBOT_72: ModeSpec = ModeSpec {
    name: "Robot 72",
    short_name: "R72",
    vis_code: 12,
    width: 320,
    height: 240,
    color: ColorModel::YCrCb,
    line_secs: 0.300,
    sync_secs: ROBOT_SYNC,
    sync_offset_secs: 0.0,
    start_sync_secs: 0.0,
    rows_per_line: 1,
    scans: &[
        Scan {
            start_secs: ROBOT_Y_START,
            duration_secs: 0.138,
            component: Component::Y,
            rows: RowSelect::All,
        },
        Scan {
            start_secs: 0.156,
            duration_secs: 0.069,
            component: Component::RMinusY,
            rows: RowSelect::All,
        },
        Scan {
            start_secs: 0.231,
            duration_secs: 0.069,
            component: Component::BMinusY,
            rows: RowSelect::All,
        },
    ],
    chroma_selector: None,
    black_hz: BLACK_HZ,
    white_hz: WHITE_HZ,
};

// Martin: 4.862 ms sync and 0.572 ms porches. Scans are sent
// in green, blue, red order.
const MARTIN_SYNC: f64 = 0.004862;
const MARTIN_PORCH: f64 = 0.000572;

macro_rules! martin_scans {
    ($scan:expr) => {
        &[
            Scan {
                start_secs: MARTIN_SYNC + MARTIN_PORCH,
                duration_secs: $scan,
                component: Component::Green,
                rows: RowSelect::All,
            },
            Scan {
                start_secs: MARTIN_SYNC + 2.0 * MARTIN_PORCH + $scan,
                duration_secs: $scan,
                component: Component::Blue,
                rows: RowSelect::All,
            },
            Scan {
                start_secs: MARTIN_SYNC + 3.0 * MARTIN_PORCH + 2.0 * $scan,
                duration_secs: $scan,
                component: Component::Red,
                rows: RowSelect::All,
            },
        ]
    };
}

pub static MARTIN_1: ModeSpec = ModeSpec {
    name: "Martin 1",
    short_name: "M1",
    vis_code: 44,
    width: 320,
    height: 256,
    color: ColorModel::Rgb,
    line_secs: MARTIN_SYNC + 4.0 * MARTIN_PORCH + 3.0 * 0.146432,
    sync_secs: MARTIN_SYNC,
    sync_offset_secs: 0.0,
    start_sync_secs: 0.0,
    rows_per_line: 1,
    scans: martin_scans!(0.146432),
    chroma_selector: None,
    black_hz: BLACK_HZ,
    white_hz: WHITE_HZ,
};

pub static MARTIN_2: ModeSpec = ModeSpec {
    name: "Martin 2",
    short_name: "M2",
    vis_code: 40,
    width: 320,
    height: 256,
    color: ColorModel::Rgb,
    line_secs: MARTIN_SYNC + 4.0 * MARTIN_PORCH + 3.0 * 0.073216,
    sync_secs: MARTIN_SYNC,
    sync_offset_secs: 0.0,
    start_sync_secs: 0.0,
    rows_per_line: 1,
    scans: martin_scans!(0.073216),
    chroma_selector: None,
    black_hz: BLACK_HZ,
    white_hz: WHITE_HZ,
};

// Scottie: 1.5 ms separators, 9 ms sync between the blue and
// red scans. The first line is preceded by a lone sync pulse.
const SCOTTIE_SYNC: f64 = 0.009;
const SCOTTIE_SEP: f64 = 0.0015;

macro_rules! scottie_scans {
    ($scan:expr) => {
        &[
            Scan {
                start_secs: SCOTTIE_SEP,
                duration_secs: $scan,
                component: Component::Green,
                rows: RowSelect::All,
            },
            Scan {
                start_secs: 2.0 * SCOTTIE_SEP + $scan,
                duration_secs: $scan,
                component: Component::Blue,
                rows: RowSelect::All,
            },
            Scan {
                start_secs: 3.0 * SCOTTIE_SEP + 2.0 * $scan + SCOTTIE_SYNC,
                duration_secs: $scan,
                component: Component::Red,
                rows: RowSelect::All,
            },
        ]
    };
}

macro_rules! scottie_mode {
    ($name:expr, $short:expr, $vis:expr, $scan:expr) => {
        ModeSpec {
            name: $name,
            short_name: $short,
            vis_code: $vis,
            width: 320,
            height: 256,
            color: ColorModel::Rgb,
            line_secs: SCOTTIE_SYNC + 3.0 * SCOTTIE_SEP + 3.0 * $scan,
            sync_secs: SCOTTIE_SYNC,
            sync_offset_secs: 2.0 * SCOTTIE_SEP + 2.0 * $scan,
            start_sync_secs: SCOTTIE_SYNC,
            rows_per_line: 1,
            scans: scottie_scans!($scan),
            chroma_selector: None,
            black_hz: BLACK_HZ,
            white_hz: WHITE_HZ,
        }
    };
}

pub static SCOTTIE_1: ModeSpec = scottie_mode!("Scottie 1", "S1", 60, 0.138240);
pub static SCOTTIE_2: ModeSpec = scottie_mode!("Scottie 2", "S2", 56, 0.088064);
pub static SCOTTIE_DX: ModeSpec = scottie_mode!("Scottie DX", "SDX", 76, 0.345600);

// PD: 20 ms sync and 2.08 ms porch, then four equal scans.
// Each sync period carries two image rows which share one
// pair of color-difference scans.
const PD_SYNC: f64 = 0.020;
const PD_SCAN_START: f64 = PD_SYNC + 0.00208;

macro_rules! pd_mode {
    ($name:expr, $short:expr, $vis:expr, $width:expr, $height:expr, $scan:expr) => {
        ModeSpec {
            name: $name,
            short_name: $short,
            vis_code: $vis,
            width: $width,
            height: $height,
            color: ColorModel::YCrCb,
            line_secs: PD_SCAN_START + 4.0 * $scan,
            sync_secs: PD_SYNC,
            sync_offset_secs: 0.0,
            start_sync_secs: 0.0,
            rows_per_line: 2,
            scans: &[
                Scan {
                    start_secs: PD_SCAN_START,
                    duration_secs: $scan,
                    component: Component::Y,
                    rows: RowSelect::Row(0),
                },
                Scan {
                    start_secs: PD_SCAN_START + $scan,
                    duration_secs: $scan,
                    component: Component::RMinusY,
                    rows: RowSelect::All,
                },
                Scan {
                    start_secs: PD_SCAN_START + 2.0 * $scan,
                    duration_secs: $scan,
                    component: Component::BMinusY,
                    rows: RowSelect::All,
                },
                Scan {
                    start_secs: PD_SCAN_START + 3.0 * $scan,
                    duration_secs: $scan,
                    component: Component::Y,
                    rows: RowSelect::Row(1),
                },
            ],
            chroma_selector: None,
            black_hz: BLACK_HZ,
            white_hz: WHITE_HZ,
        }
    };
}

pub static PD_50: ModeSpec = pd_mode!("PD 50", "PD50", 93, 320, 256, 0.09152);
pub static PD_90: ModeSpec = pd_mode!("PD 90", "PD90", 99, 320, 256, 0.17024);
pub static PD_120: ModeSpec = pd_mode!("PD 120", "PD120", 95, 640, 496, 0.1216);
pub static PD_160: ModeSpec = pd_mode!("PD 160", "PD160", 98, 512, 400, 0.195584);
pub static PD_180: ModeSpec = pd_mode!("PD 180", "PD180", 96, 640, 496, 0.18304);
pub static PD_240: ModeSpec = pd_mode!("PD 240", "PD240", 97, 640, 496, 0.24448);
pub static PD_290: ModeSpec = pd_mode!("PD 290", "PD290", 94, 800, 616, 0.2288);

#[cfg(test)]
mod tests {
    use super::*;

    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_registry_consistent() {
        assert_eq!(ALL_MODES.len(), MODES_BY_VIS.len());
        for mode in ALL_MODES {
            let found = lookup(mode.vis_code).expect("mode missing from VIS map");
            assert!(std::ptr::eq(*mode, found), "{}", mode);
            assert!(std::ptr::eq(*mode, by_short_name(mode.short_name).unwrap()));

            // scans lie within the line, in order, and never
            // overlap the sync pulse
            let sync_end = mode.sync_offset_secs + mode.sync_secs;
            let mut last_end = 0.0f64;
            for scan in mode.scans {
                assert!(scan.start_secs >= last_end - 1.0e-9, "{}", mode);
                let end = scan.start_secs + scan.duration_secs;
                assert!(end <= mode.line_secs + 1.0e-9, "{}", mode);
                assert!(
                    end <= mode.sync_offset_secs + 1.0e-9 || scan.start_secs >= sync_end - 1.0e-9,
                    "{}",
                    mode
                );
                last_end = end;
            }

            // every row of the period has every plane
            for row in 0..mode.rows_per_line {
                let count = mode.scans.iter().filter(|s| s.rows.includes(row)).count();
                assert!(count >= 2, "{}", mode);
            }
            assert_eq!(0, mode.height % mode.rows_per_line);
        }
    }

    #[test]
    fn test_line_timing() {
        assert_approx_eq!(0.446446, MARTIN_1.line_secs, 1.0e-9);
        assert_approx_eq!(0.226798, MARTIN_2.line_secs, 1.0e-9);
        assert_approx_eq!(0.42822, SCOTTIE_1.line_secs, 1.0e-9);
        assert_approx_eq!(0.277692, SCOTTIE_2.line_secs, 1.0e-9);
        assert_approx_eq!(1.0503, SCOTTIE_DX.line_secs, 1.0e-9);
        assert_approx_eq!(0.27948, SCOTTIE_1.sync_offset_secs, 1.0e-9);
        assert_approx_eq!(0.28998, SCOTTIE_1.scans[2].start_secs, 1.0e-9);
        assert_approx_eq!(0.38816, PD_50.line_secs, 1.0e-9);
        assert_eq!(128, PD_50.line_count());
        assert_eq!(240, ROBOT_36.line_count());
        assert_approx_eq!(36.0, ROBOT_36.image_secs(), 1.0e-9);
    }

    #[test]
    fn test_unknown() {
        assert!(lookup(0).is_none());
        assert!(lookup(45).is_none());
        assert_eq!("Scottie DX", format!("{}", SCOTTIE_DX));
        assert_eq!("SDX", format!("{:#}", SCOTTIE_DX));
        assert_eq!("YCrCb", format!("{:#}", ColorModel::YCrCb));
        assert_eq!("Red, green, blue", format!("{}", ColorModel::Rgb));
    }
}
