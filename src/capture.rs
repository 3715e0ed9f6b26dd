use std::time::Duration;

use crate::{
    artifact::{ArtifactHandle, ArtifactStore},
    encode::{Codec, EncoderConfig, EncodingService, TARGET_BITRATE_BPS, negotiate_codec},
    error::{LoopcardError, LoopcardResult},
    params::ParameterSet,
    surface::Surface,
};

/// Cadence of the progress sampler.
pub const PROGRESS_INTERVAL: Duration = Duration::from_millis(100);

/// Grace margin past the target duration before the deferred stop fires,
/// leaving room for the final frame to be captured.
pub const STOP_GRACE: Duration = Duration::from_millis(200);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CaptureState {
    Idle,
    Recording,
    Finalizing,
    Ready,
    Failed,
}

struct ActiveSession {
    started_at: Duration,
    target: Duration,
    stop_due: Duration,
    stop_requested: bool,
    next_progress_due: Duration,
    next_frame_due: Duration,
    frame_interval: Duration,
    /// Encoded segments in arrival order, including any that land after the
    /// stop request.
    segments: Vec<Vec<u8>>,
}

/// Shepherds live-rendered frames into an encoded artifact.
///
/// This is a guarded state machine, not a drawing component. A driver calls
/// [`CaptureController::pump`] from the same cooperative queue as the
/// render loop, and the controller decides what is due: frame taps at the
/// configured rate, progress samples every 100ms, and the one-shot
/// deferred stop.
/// The timer events are also public (`on_progress_tick`, `on_stop_due`) so
/// tests can fire them out of order deliberately.
pub struct CaptureController {
    encoder: Box<dyn EncodingService>,
    store: Box<dyn ArtifactStore>,
    state: CaptureState,
    progress_percent: f64,
    error: Option<String>,
    codec: Option<Codec>,
    artifact: Option<ArtifactHandle>,
    session: Option<ActiveSession>,
}

impl CaptureController {
    pub fn new(encoder: Box<dyn EncodingService>, store: Box<dyn ArtifactStore>) -> Self {
        Self {
            encoder,
            store,
            state: CaptureState::Idle,
            progress_percent: 0.0,
            error: None,
            codec: None,
            artifact: None,
            session: None,
        }
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn progress_percent(&self) -> f64 {
        self.progress_percent
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// The codec negotiated for the most recent session, if any.
    pub fn negotiated_codec(&self) -> Option<Codec> {
        self.codec
    }

    pub fn artifact(&self) -> Option<&ArtifactHandle> {
        self.artifact.as_ref()
    }

    /// Begin recording the live surface.
    ///
    /// A start while a session is already recording or finalizing is a
    /// no-op. All failure paths are synchronous, set the user-visible error
    /// and leave no partial session behind.
    pub fn start(
        &mut self,
        now: Duration,
        surface: Option<&Surface>,
        params: &ParameterSet,
    ) -> LoopcardResult<()> {
        if matches!(
            self.state,
            CaptureState::Recording | CaptureState::Finalizing
        ) {
            tracing::debug!("capture start ignored: session already in flight");
            return Ok(());
        }

        let Some(surface) = surface else {
            return Err(self.fail_start(LoopcardError::SurfaceUnavailable));
        };
        if let Err(e) = params.validate() {
            return Err(self.fail_start(LoopcardError::StreamUnavailable(e.to_string())));
        }

        let Some(codec) = negotiate_codec(self.encoder.as_ref()) else {
            return Err(self.fail_start(LoopcardError::EncoderConstructionFailed(
                "the encoding service supports none of the preferred codecs".to_string(),
            )));
        };

        let cfg = EncoderConfig {
            width: surface.width(),
            height: surface.height(),
            fps: params.fps,
            codec,
            bitrate_bps: TARGET_BITRATE_BPS,
        };
        if let Err(e) = self.encoder.start(&cfg) {
            return Err(self.fail_start(e));
        }

        // The previous result is superseded; its handle goes away exactly
        // once, before the new artifact can exist.
        if let Some(prev) = self.artifact.take() {
            if let Err(e) = self.store.revoke(&prev) {
                tracing::warn!("failed to revoke superseded artifact: {e}");
            }
        }

        let target = params.duration();
        self.session = Some(ActiveSession {
            started_at: now,
            target,
            stop_due: now + target + STOP_GRACE,
            stop_requested: false,
            next_progress_due: now + PROGRESS_INTERVAL,
            next_frame_due: now,
            frame_interval: Duration::from_secs(1) / params.fps,
            segments: Vec::new(),
        });
        self.progress_percent = 0.0;
        self.error = None;
        self.codec = Some(codec);
        self.state = CaptureState::Recording;
        tracing::info!(codec = %codec, target_secs = target.as_secs(), fps = params.fps, "capture started");
        Ok(())
    }

    /// Advance whatever is due at `now`: frame taps, segment collection,
    /// progress samples, the deferred stop, finalization.
    pub fn pump(&mut self, now: Duration, surface: &Surface) -> LoopcardResult<()> {
        match self.state {
            CaptureState::Recording => {
                self.capture_due_frames(now, surface)?;
                self.collect_segments();
                while self.take_progress_slot(now) {
                    self.on_progress_tick(now);
                }
                if self.stop_is_due(now) {
                    self.on_stop_due(now)?;
                    if self.state == CaptureState::Finalizing {
                        return self.finish_session();
                    }
                }
                Ok(())
            }
            CaptureState::Finalizing => self.finish_session(),
            _ => Ok(()),
        }
    }

    /// One progress sample: `elapsed / target` as a percentage, capped at
    /// 100. Harmless in any state other than Recording.
    pub fn on_progress_tick(&mut self, now: Duration) {
        if self.state != CaptureState::Recording {
            return;
        }
        let Some(session) = self.session.as_ref() else {
            return;
        };
        let elapsed = now.saturating_sub(session.started_at).as_secs_f64();
        let target = session.target.as_secs_f64();
        self.progress_percent = (elapsed / target * 100.0).min(100.0);
    }

    /// The one-shot deferred stop. Requests an encoder stop unless the
    /// encoder already went inactive on its own, then moves to Finalizing.
    pub fn on_stop_due(&mut self, _now: Duration) -> LoopcardResult<()> {
        if self.state != CaptureState::Recording {
            return Ok(());
        }
        let Some(session) = self.session.as_mut() else {
            return Ok(());
        };
        if session.stop_requested {
            return Ok(());
        }
        session.stop_requested = true;
        if !self.encoder.is_inactive() {
            self.encoder.request_stop()?;
        }
        self.state = CaptureState::Finalizing;
        tracing::info!("capture stop requested, finalizing");
        Ok(())
    }

    /// Cancel any pending work and release the held artifact. Safe to call
    /// more than once; the handle is revoked exactly once.
    pub fn teardown(&mut self) {
        if matches!(
            self.state,
            CaptureState::Recording | CaptureState::Finalizing
        ) {
            let _ = self.encoder.request_stop();
            let _ = self.encoder.finalize();
        }
        self.session = None;
        if let Some(handle) = self.artifact.take() {
            if let Err(e) = self.store.revoke(&handle) {
                tracing::warn!("failed to revoke artifact during teardown: {e}");
            }
        }
        self.state = CaptureState::Idle;
    }

    fn fail_start(&mut self, err: LoopcardError) -> LoopcardError {
        tracing::warn!("capture start failed: {err}");
        self.error = Some(err.to_string());
        self.state = CaptureState::Failed;
        self.session = None;
        err
    }

    /// Tap the surface for every frame slot that has come due.
    fn capture_due_frames(&mut self, now: Duration, surface: &Surface) -> LoopcardResult<()> {
        let Some(session) = self.session.as_mut() else {
            return Ok(());
        };
        while now >= session.next_frame_due {
            session.next_frame_due += session.frame_interval;
            self.encoder.push_frame(&surface.snapshot())?;
        }
        Ok(())
    }

    fn collect_segments(&mut self) {
        let polled = self.encoder.poll_segments();
        if let Some(session) = self.session.as_mut() {
            session.segments.extend(polled);
        }
    }

    /// Consume one progress-sampler slot if due, advancing the schedule.
    fn take_progress_slot(&mut self, now: Duration) -> bool {
        let Some(session) = self.session.as_mut() else {
            return false;
        };
        if now >= session.next_progress_due {
            session.next_progress_due += PROGRESS_INTERVAL;
            true
        } else {
            false
        }
    }

    fn stop_is_due(&self, now: Duration) -> bool {
        self.session
            .as_ref()
            .is_some_and(|s| !s.stop_requested && now >= s.stop_due)
    }

    fn finish_session(&mut self) -> LoopcardResult<()> {
        let late = match self.encoder.finalize() {
            Ok(late) => late,
            Err(e) => {
                tracing::warn!("encoder fault during finalize: {e}");
                self.error = Some(e.to_string());
                self.state = CaptureState::Failed;
                self.session = None;
                return Err(e);
            }
        };

        let Some(mut session) = self.session.take() else {
            return Ok(());
        };
        session.segments.extend(late);

        let total: usize = session.segments.iter().map(Vec::len).sum();
        let mut bytes = Vec::with_capacity(total);
        for segment in &session.segments {
            bytes.extend_from_slice(segment);
        }

        let codec = self.codec.unwrap_or(Codec::WebmDefault);
        let handle = match self.store.create(&bytes, codec.container_ext()) {
            Ok(handle) => handle,
            Err(e) => {
                self.error = Some(e.to_string());
                self.state = CaptureState::Failed;
                return Err(e);
            }
        };

        tracing::info!(
            segments = session.segments.len(),
            bytes = bytes.len(),
            codec = %codec,
            "capture ready"
        );
        self.artifact = Some(handle);
        self.progress_percent = 100.0;
        self.state = CaptureState::Ready;
        Ok(())
    }
}

impl Drop for CaptureController {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{artifact::MemoryArtifactStore, encode::InMemoryEncoder};

    fn controller() -> CaptureController {
        CaptureController::new(
            Box::new(InMemoryEncoder::new()),
            Box::new(MemoryArtifactStore::new()),
        )
    }

    #[test]
    fn initial_state_is_idle() {
        let c = controller();
        assert_eq!(c.state(), CaptureState::Idle);
        assert_eq!(c.progress_percent(), 0.0);
        assert!(c.artifact().is_none());
        assert!(c.error().is_none());
    }

    #[test]
    fn start_without_surface_fails_synchronously() {
        let mut c = controller();
        let err = c
            .start(Duration::ZERO, None, &ParameterSet::default())
            .unwrap_err();
        assert!(matches!(err, LoopcardError::SurfaceUnavailable));
        assert_eq!(c.state(), CaptureState::Failed);
        assert!(c.error().is_some());
    }

    #[test]
    fn start_negotiates_the_preferred_codec() {
        let mut c = controller();
        let surface = Surface::card();
        c.start(Duration::ZERO, Some(&surface), &ParameterSet::default())
            .unwrap();
        assert_eq!(c.state(), CaptureState::Recording);
        assert_eq!(c.negotiated_codec(), Some(Codec::Vp9));
    }

    #[test]
    fn progress_tick_is_capped_and_state_guarded() {
        let mut c = controller();
        let surface = Surface::card();
        c.start(Duration::ZERO, Some(&surface), &ParameterSet::default())
            .unwrap();

        c.on_progress_tick(Duration::from_secs(3));
        assert!((c.progress_percent() - 50.0).abs() < 1e-9);

        c.on_progress_tick(Duration::from_secs(60));
        assert_eq!(c.progress_percent(), 100.0);

        // Ticks after the stop fired must not disturb anything.
        c.on_stop_due(Duration::from_millis(6200)).unwrap();
        assert_eq!(c.state(), CaptureState::Finalizing);
        c.on_progress_tick(Duration::from_secs(99));
        assert_eq!(c.progress_percent(), 100.0);
    }

    #[test]
    fn stop_due_is_target_plus_grace() {
        let mut c = controller();
        let surface = Surface::card();
        let mut params = ParameterSet::default();
        params.set_duration_seconds(3);
        c.start(Duration::ZERO, Some(&surface), &params).unwrap();

        c.pump(Duration::from_millis(3199), &surface).unwrap();
        assert_eq!(c.state(), CaptureState::Recording);
        c.pump(Duration::from_millis(3200), &surface).unwrap();
        assert_eq!(c.state(), CaptureState::Ready);
    }

    #[test]
    fn teardown_is_safe_to_repeat() {
        let mut c = controller();
        let surface = Surface::card();
        c.start(Duration::ZERO, Some(&surface), &ParameterSet::default())
            .unwrap();
        c.teardown();
        assert_eq!(c.state(), CaptureState::Idle);
        c.teardown();
        assert_eq!(c.state(), CaptureState::Idle);
    }
}
