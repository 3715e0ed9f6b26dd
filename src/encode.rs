use crate::{error::LoopcardResult, surface::FrameRGBA};

/// Target bitrate for every capture session, in bits per second.
pub const TARGET_BITRATE_BPS: u64 = 6_000_000;

/// WebM codec variants, in negotiation order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Codec {
    Vp9,
    Vp8,
    /// Let the container pick its default video encoder.
    WebmDefault,
}

/// Preference order used by [`negotiate_codec`]: best quality first, the
/// container default as the last resort.
pub const CODEC_PREFERENCE: [Codec; 3] = [Codec::Vp9, Codec::Vp8, Codec::WebmDefault];

impl Codec {
    pub fn label(self) -> &'static str {
        match self {
            Self::Vp9 => "vp9",
            Self::Vp8 => "vp8",
            Self::WebmDefault => "webm",
        }
    }

    /// The ffmpeg encoder name, or `None` for the container default.
    pub fn ffmpeg_encoder(self) -> Option<&'static str> {
        match self {
            Self::Vp9 => Some("libvpx-vp9"),
            Self::Vp8 => Some("libvpx"),
            Self::WebmDefault => None,
        }
    }

    /// Download extension; all negotiated variants share the WebM container.
    pub fn container_ext(self) -> &'static str {
        "webm"
    }
}

impl std::fmt::Display for Codec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Everything an encoder needs to open a session.
#[derive(Clone, Debug)]
pub struct EncoderConfig {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub codec: Codec,
    pub bitrate_bps: u64,
}

/// The external encoding service boundary.
///
/// Frames go in; encoded container segments come back asynchronously via
/// [`EncodingService::poll_segments`]. Segments may keep arriving after a
/// stop request; [`EncodingService::finalize`] drains those stragglers.
pub trait EncodingService {
    /// Whether the service can encode the given codec variant.
    fn supports(&self, codec: Codec) -> bool;

    /// Open an encoding session. Failing here must leave the service
    /// reusable for a later start.
    fn start(&mut self, cfg: &EncoderConfig) -> LoopcardResult<()>;

    /// Feed one frame of the live stream.
    fn push_frame(&mut self, frame: &FrameRGBA) -> LoopcardResult<()>;

    /// Encoded segments produced since the last poll, in emission order.
    fn poll_segments(&mut self) -> Vec<Vec<u8>>;

    /// Ask the encoder to stop accepting frames and flush.
    fn request_stop(&mut self) -> LoopcardResult<()>;

    /// True when no session is active (never started, or already stopped).
    fn is_inactive(&self) -> bool;

    /// Wait for the session to wind down and return any late segments, in
    /// order. An `Err` here is the encoder-fault path.
    fn finalize(&mut self) -> LoopcardResult<Vec<Vec<u8>>>;
}

/// Pick the first codec in preference order the service supports.
pub fn negotiate_codec(service: &dyn EncodingService) -> Option<Codec> {
    CODEC_PREFERENCE
        .into_iter()
        .find(|&codec| service.supports(codec))
}

/// In-memory encoding service for tests and debugging: "encodes" each frame
/// into one segment holding its raw bytes length header.
#[derive(Debug, Default)]
pub struct InMemoryEncoder {
    active: bool,
    cfg: Option<EncoderConfig>,
    pending: Vec<Vec<u8>>,
    frames: u64,
}

impl InMemoryEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(&self) -> Option<&EncoderConfig> {
        self.cfg.as_ref()
    }

    pub fn frames_received(&self) -> u64 {
        self.frames
    }
}

impl EncodingService for InMemoryEncoder {
    fn supports(&self, _codec: Codec) -> bool {
        true
    }

    fn start(&mut self, cfg: &EncoderConfig) -> LoopcardResult<()> {
        self.active = true;
        self.cfg = Some(cfg.clone());
        self.pending.clear();
        self.frames = 0;
        Ok(())
    }

    fn push_frame(&mut self, frame: &FrameRGBA) -> LoopcardResult<()> {
        self.frames += 1;
        let mut segment = Vec::with_capacity(12);
        segment.extend_from_slice(&frame.width.to_le_bytes());
        segment.extend_from_slice(&frame.height.to_le_bytes());
        segment.extend_from_slice(&(frame.data.len() as u32).to_le_bytes());
        self.pending.push(segment);
        Ok(())
    }

    fn poll_segments(&mut self) -> Vec<Vec<u8>> {
        std::mem::take(&mut self.pending)
    }

    fn request_stop(&mut self) -> LoopcardResult<()> {
        self.active = false;
        Ok(())
    }

    fn is_inactive(&self) -> bool {
        !self.active
    }

    fn finalize(&mut self) -> LoopcardResult<Vec<Vec<u8>>> {
        self.active = false;
        Ok(std::mem::take(&mut self.pending))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negotiation_prefers_vp9() {
        let enc = InMemoryEncoder::new();
        assert_eq!(negotiate_codec(&enc), Some(Codec::Vp9));
    }

    #[test]
    fn preference_order_is_vp9_vp8_default() {
        assert_eq!(
            CODEC_PREFERENCE,
            [Codec::Vp9, Codec::Vp8, Codec::WebmDefault]
        );
        assert_eq!(Codec::Vp9.ffmpeg_encoder(), Some("libvpx-vp9"));
        assert_eq!(Codec::WebmDefault.ffmpeg_encoder(), None);
    }

    #[test]
    fn all_variants_share_the_webm_extension() {
        for codec in CODEC_PREFERENCE {
            assert_eq!(codec.container_ext(), "webm");
        }
    }

    #[test]
    fn in_memory_encoder_tracks_session_state() {
        let mut enc = InMemoryEncoder::new();
        assert!(enc.is_inactive());

        enc.start(&EncoderConfig {
            width: 4,
            height: 2,
            fps: 30,
            codec: Codec::Vp9,
            bitrate_bps: TARGET_BITRATE_BPS,
        })
        .unwrap();
        assert!(!enc.is_inactive());

        let frame = FrameRGBA {
            width: 4,
            height: 2,
            data: vec![0u8; 32],
        };
        enc.push_frame(&frame).unwrap();
        enc.push_frame(&frame).unwrap();
        assert_eq!(enc.poll_segments().len(), 2);
        assert!(enc.poll_segments().is_empty());

        enc.request_stop().unwrap();
        assert!(enc.is_inactive());
    }
}
