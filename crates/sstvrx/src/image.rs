//! Image assembly

#[cfg(not(test))]
use log::{debug, trace};

#[cfg(test)]
use std::println as debug;
#[cfg(test)]
use std::println as trace;

use crate::modes::{ColorModel, ModeSpec};

/// One decoded image row
///
/// Each row carries up to three component planes of pixel
/// values. Planes are `[R, G, B]` for RGB modes and
/// `[Y, Cr, Cb]` for YCrCb modes. A plane may be absent: modes
/// with alternating chroma send only one of the two color
/// differences on each row.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ScanLine {
    row: usize,
    planes: [Option<Vec<u8>>; 3],
    degraded: bool,
}

impl ScanLine {
    /// New scan line for image `row`
    pub fn new(row: usize, planes: [Option<Vec<u8>>; 3], degraded: bool) -> Self {
        Self {
            row,
            planes,
            degraded,
        }
    }

    /// Image row
    pub fn row(&self) -> usize {
        self.row
    }

    /// Component plane, if received
    pub fn plane(&self, index: usize) -> Option<&[u8]> {
        self.planes.get(index)?.as_deref()
    }

    /// True if this row was decoded without a located sync pulse
    pub fn degraded(&self) -> bool {
        self.degraded
    }
}

/// Decoded RGB image
///
/// Pixels are stored row-major as packed 8-bit `R, G, B`
/// triples.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Image {
    width: usize,
    height: usize,
    data: Vec<u8>,
}

impl Image {
    /// Width, in pixels
    pub fn width(&self) -> usize {
        self.width
    }

    /// Height, in pixels
    pub fn height(&self) -> usize {
        self.height
    }

    /// Pixel at column `x` of row `y`
    ///
    /// # Panics
    ///
    /// If the position lies outside the image.
    pub fn pixel(&self, x: usize, y: usize) -> [u8; 3] {
        let i = 3 * (y * self.width + x);
        [self.data[i], self.data[i + 1], self.data[i + 2]]
    }

    /// Packed RGB pixel data
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Take the packed RGB pixel data
    pub fn into_raw(self) -> Vec<u8> {
        self.data
    }
}

/// Image under construction
///
/// Holds one slot per image row. Each row may be written at
/// most once; later writes to the same row are discarded.
#[derive(Clone, Debug)]
pub struct ImageBuffer {
    mode: &'static ModeSpec,
    rows: Vec<Option<ScanLine>>,
}

impl ImageBuffer {
    /// Empty image for `mode`
    pub fn new(mode: &'static ModeSpec) -> Self {
        Self {
            mode,
            rows: vec![None; mode.height],
        }
    }

    /// Store a scan line
    ///
    /// Returns `false`, and discards the line, if its row is
    /// out of range or has already been written.
    pub fn insert(&mut self, line: ScanLine) -> bool {
        match self.rows.get_mut(line.row) {
            Some(slot @ None) => {
                trace!("image: row {}{}", line.row, if line.degraded { " (degraded)" } else { "" });
                *slot = Some(line);
                true
            }
            Some(Some(_)) => {
                debug!("image: row {} already written", line.row);
                false
            }
            None => {
                debug!("image: row {} out of range", line.row);
                false
            }
        }
    }

    /// Number of rows written
    pub fn rows_filled(&self) -> usize {
        self.rows.iter().filter(|r| r.is_some()).count()
    }

    /// Number of degraded rows written
    pub fn rows_degraded(&self) -> usize {
        self.rows.iter().flatten().filter(|r| r.degraded).count()
    }

    /// Convert to RGB
    ///
    /// Rows which were never written are black. For YCrCb
    /// modes, a missing color difference plane is borrowed
    /// from the other row of the pair (rows `2k` and `2k+1`),
    /// or taken as neutral if neither row has it.
    pub fn finalize(self) -> Image {
        let (width, height) = (self.mode.width, self.mode.height);
        let mut data = vec![0u8; 3 * width * height];

        for (y, out) in data.chunks_exact_mut(3 * width).enumerate() {
            let line = match &self.rows[y] {
                Some(line) => line,
                None => continue,
            };

            match self.mode.color {
                ColorModel::Rgb => {
                    for (c, plane) in line.planes.iter().enumerate() {
                        if let Some(plane) = plane {
                            for (x, v) in plane.iter().take(width).enumerate() {
                                out[3 * x + c] = *v;
                            }
                        }
                    }
                }
                ColorModel::YCrCb => {
                    let luma = line.plane(0);
                    let cr = self.chroma(y, 1);
                    let cb = self.chroma(y, 2);
                    for x in 0..width {
                        let px = ycrcb_to_rgb(
                            sample(luma, x, 0),
                            sample(cr, x, 128),
                            sample(cb, x, 128),
                        );
                        out[3 * x..3 * x + 3].copy_from_slice(&px);
                    }
                }
            }
        }

        Image {
            width,
            height,
            data,
        }
    }

    // Color difference plane for row y, or its partner row
    fn chroma(&self, y: usize, plane: usize) -> Option<&[u8]> {
        let own = self.rows[y].as_ref().and_then(|l| l.plane(plane));
        own.or_else(|| {
            self.rows
                .get(y ^ 1)?
                .as_ref()
                .and_then(|l| l.plane(plane))
        })
    }
}

#[inline]
fn sample(plane: Option<&[u8]>, x: usize, default: u8) -> u8 {
    plane.and_then(|p| p.get(x)).copied().unwrap_or(default)
}

// Full-range ITU-R BT.601 YCrCb to RGB
fn ycrcb_to_rgb(y: u8, cr: u8, cb: u8) -> [u8; 3] {
    let y = y as f32;
    let cr = cr as f32 - 128.0f32;
    let cb = cb as f32 - 128.0f32;

    let r = y + 1.402f32 * cr;
    let g = y - 0.344136f32 * cb - 0.714136f32 * cr;
    let b = y + 1.772f32 * cb;

    [to_u8(r), to_u8(g), to_u8(b)]
}

#[inline]
fn to_u8(v: f32) -> u8 {
    f32::clamp(v.round(), 0.0, 255.0) as u8
}
