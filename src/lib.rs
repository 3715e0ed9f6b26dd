#![forbid(unsafe_code)]

//! Loopcard renders a short looping promo card (title, subtitle, callout
//! button over an animated palette gradient) and captures it into a WebM
//! clip through a codec-negotiating encoder pipeline.

pub mod artifact;
pub mod blur;
pub mod capture;
pub mod clock;
pub mod ease;
pub mod encode;
pub mod encode_ffmpeg;
pub mod error;
pub mod frame_loop;
pub mod palette;
pub mod params;
pub mod render;
pub mod surface;
pub mod text;

pub use artifact::{ArtifactHandle, ArtifactStore, FileArtifactStore, MemoryArtifactStore};
pub use capture::{CaptureController, CaptureState, PROGRESS_INTERVAL, STOP_GRACE};
pub use clock::{Clock, MonotonicClock, StepClock};
pub use ease::{ease_in_out_cubic, lerp};
pub use encode::{
    CODEC_PREFERENCE, Codec, EncoderConfig, EncodingService, InMemoryEncoder, TARGET_BITRATE_BPS,
};
pub use encode_ffmpeg::{FfmpegEncoder, is_ffmpeg_on_path};
pub use error::{LoopcardError, LoopcardResult};
pub use frame_loop::FrameLoop;
pub use palette::{Palette, PaletteId};
pub use params::{ParameterSet, ShapeStyle};
pub use render::{CYCLE_SECONDS, render_background, render_frame};
pub use surface::{FrameRGBA, SURFACE_HEIGHT, SURFACE_WIDTH, Surface};
pub use text::Typeface;
