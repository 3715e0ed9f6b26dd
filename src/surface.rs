use crate::error::{LoopcardError, LoopcardResult};

pub const SURFACE_WIDTH: u32 = 960;
pub const SURFACE_HEIGHT: u32 = 540;

/// One opaque RGBA8 frame, ready for an encoder or a PNG writer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameRGBA {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

/// The drawable card surface: a fixed-size opaque RGBA8 pixel buffer.
///
/// The animation loop owns the surface and is the only writer; capture taps
/// it read-only through [`Surface::snapshot`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Surface {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl Surface {
    pub fn new(width: u32, height: u32) -> LoopcardResult<Self> {
        if width == 0 || height == 0 {
            return Err(LoopcardError::validation(
                "surface width/height must be non-zero",
            ));
        }
        Ok(Self {
            width,
            height,
            data: vec![0u8; (width as usize) * (height as usize) * 4],
        })
    }

    /// The standard 960x540 card surface.
    pub fn card() -> Self {
        Self {
            width: SURFACE_WIDTH,
            height: SURFACE_HEIGHT,
            data: vec![0u8; (SURFACE_WIDTH as usize) * (SURFACE_HEIGHT as usize) * 4],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    #[inline]
    fn index(&self, x: u32, y: u32) -> usize {
        ((y * self.width + x) as usize) * 4
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let i = self.index(x, y);
        [self.data[i], self.data[i + 1], self.data[i + 2], self.data[i + 3]]
    }

    /// Fill the whole surface with an opaque color.
    pub fn fill(&mut self, rgb: [u8; 3]) {
        for px in self.data.chunks_exact_mut(4) {
            px[0] = rgb[0];
            px[1] = rgb[1];
            px[2] = rgb[2];
            px[3] = 255;
        }
    }

    /// Write one opaque pixel, ignoring out-of-bounds coordinates.
    pub fn put_pixel(&mut self, x: i64, y: i64, rgb: [u8; 3]) {
        if x < 0 || y < 0 || x >= i64::from(self.width) || y >= i64::from(self.height) {
            return;
        }
        let i = self.index(x as u32, y as u32);
        self.data[i] = rgb[0];
        self.data[i + 1] = rgb[1];
        self.data[i + 2] = rgb[2];
        self.data[i + 3] = 255;
    }

    /// Source-over blend a straight-alpha color onto the opaque surface.
    /// Out-of-bounds coordinates are ignored.
    pub fn blend_pixel(&mut self, x: i64, y: i64, rgb: [u8; 3], alpha: f32) {
        if x < 0 || y < 0 || x >= i64::from(self.width) || y >= i64::from(self.height) {
            return;
        }
        let a = ((alpha.clamp(0.0, 1.0) * 255.0).round() as i32).clamp(0, 255) as u16;
        if a == 0 {
            return;
        }
        let inv = 255u16 - a;
        let i = self.index(x as u32, y as u32);
        for c in 0..3 {
            let src = mul_div255(u16::from(rgb[c]), a);
            let dst = mul_div255(u16::from(self.data[i + c]), inv);
            self.data[i + c] = src.saturating_add(dst);
        }
        self.data[i + 3] = 255;
    }

    /// Copy the current pixels into a standalone frame.
    ///
    /// This is the read-only tap the capture controller uses; it never hands
    /// out mutable access to the live buffer.
    pub fn snapshot(&self) -> FrameRGBA {
        FrameRGBA {
            width: self.width,
            height: self.height,
            data: self.data.clone(),
        }
    }
}

fn mul_div255(x: u16, y: u16) -> u8 {
    (((u32::from(x) * u32::from(y)) + 127) / 255) as u8
}
