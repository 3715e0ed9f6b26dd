use fontdue::{Font, FontSettings};

use crate::{
    blur::blur_mask,
    error::{LoopcardError, LoopcardResult},
    surface::Surface,
};

/// Paths probed by [`Typeface::load_system_default`], in order.
const SYSTEM_FONT_CANDIDATES: [&str; 6] = [
    "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Bold.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial Bold.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
];

/// A loaded font face. Font files are an external concern: the renderer
/// only ever sees an already-parsed face.
pub struct Typeface {
    font: Font,
}

impl Typeface {
    pub fn from_bytes(bytes: &[u8]) -> LoopcardResult<Self> {
        let font = Font::from_bytes(bytes, FontSettings::default())
            .map_err(|e| LoopcardError::validation(format!("failed to parse font: {e}")))?;
        Ok(Self { font })
    }

    pub fn from_file(path: impl AsRef<std::path::Path>) -> LoopcardResult<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| {
            LoopcardError::validation(format!("failed to read font '{}': {e}", path.display()))
        })?;
        Self::from_bytes(&bytes)
    }

    /// Probe a short list of common system font locations.
    pub fn load_system_default() -> LoopcardResult<Self> {
        for candidate in SYSTEM_FONT_CANDIDATES {
            if std::path::Path::new(candidate).is_file() {
                return Self::from_file(candidate);
            }
        }
        Err(LoopcardError::validation(
            "no system font found; pass an explicit font file",
        ))
    }

    pub(crate) fn font(&self) -> &Font {
        &self.font
    }
}

/// A rasterized line of text as a single-channel coverage mask.
///
/// The glyphs sit inside a transparent border of `pad` pixels so the mask
/// can be blurred without clipping at the edges.
#[derive(Clone, Debug)]
pub struct TextMask {
    pub width: u32,
    pub height: u32,
    pub pad: u32,
    pub coverage: Vec<u8>,
}

impl TextMask {
    /// Measure and rasterize one line at `px` pixels.
    pub fn rasterize_line(face: &Typeface, text: &str, px: f32, pad: u32) -> TextMask {
        let font = face.font();

        let mut total_width: i32 = 0;
        let mut max_ascent: i32 = 0;
        let mut max_descent: i32 = 0;
        for ch in text.chars() {
            let metrics = font.metrics(ch, px);
            let ascent = metrics.height as i32 + metrics.ymin;
            let descent = -metrics.ymin;
            max_ascent = max_ascent.max(ascent);
            max_descent = max_descent.max(descent);
            total_width += metrics.advance_width.round() as i32;
        }

        let pad_i = pad as i32;
        let width = (total_width.max(1) + 2 * pad_i) as u32;
        let height = ((max_ascent + max_descent).max(1) + 2 * pad_i) as u32;
        let mut coverage = vec![0u8; (width as usize) * (height as usize)];

        let mut cursor_x: i32 = pad_i;
        for ch in text.chars() {
            let (metrics, bitmap) = font.rasterize(ch, px);
            let glyph_x = cursor_x + metrics.xmin;
            let glyph_y = pad_i + max_ascent - (metrics.height as i32 + metrics.ymin);

            for gy in 0..metrics.height {
                for gx in 0..metrics.width {
                    let v = bitmap[gy * metrics.width + gx];
                    if v == 0 {
                        continue;
                    }
                    let x = glyph_x + gx as i32;
                    let y = glyph_y + gy as i32;
                    if x >= 0 && x < width as i32 && y >= 0 && y < height as i32 {
                        let idx = (y as u32 * width + x as u32) as usize;
                        coverage[idx] = coverage[idx].max(v);
                    }
                }
            }
            cursor_x += metrics.advance_width.round() as i32;
        }

        TextMask {
            width,
            height,
            pad,
            coverage,
        }
    }

    /// A blurred copy of this mask; used for soft shadows and glow halos.
    pub fn blurred(&self, radius: u32) -> LoopcardResult<TextMask> {
        let sigma = (radius as f32 / 2.0).max(0.5);
        let coverage = blur_mask(&self.coverage, self.width, self.height, radius, sigma)?;
        Ok(TextMask {
            width: self.width,
            height: self.height,
            pad: self.pad,
            coverage,
        })
    }

    /// Blend the mask onto the surface with the given color, scaling
    /// coverage by `alpha`. `(x, y)` is the mask's top-left corner.
    pub fn blit(&self, surface: &mut Surface, x: i64, y: i64, rgb: [u8; 3], alpha: f32) {
        for my in 0..self.height {
            for mx in 0..self.width {
                let v = self.coverage[(my * self.width + mx) as usize];
                if v == 0 {
                    continue;
                }
                let a = (f32::from(v) / 255.0) * alpha;
                surface.blend_pixel(x + i64::from(mx), y + i64::from(my), rgb, a);
            }
        }
    }
}
