use std::{cell::RefCell, rc::Rc, time::Duration};

use loopcard::{
    ArtifactHandle, ArtifactStore, CaptureController, CaptureState, Codec, EncoderConfig,
    EncodingService, FrameRGBA, LoopcardError, LoopcardResult, MemoryArtifactStore, ParameterSet,
    Surface,
};

/// Encoder test double with scripted fault injection and late segments.
#[derive(Default)]
struct ScriptedEncoder {
    supported: Vec<Codec>,
    fail_start: bool,
    fail_finalize: bool,
    late_segments: Vec<Vec<u8>>,
    start_calls: Rc<RefCell<u32>>,
    active: bool,
    frames: u64,
    pending: Vec<Vec<u8>>,
}

impl ScriptedEncoder {
    fn vp9() -> Self {
        Self {
            supported: vec![Codec::Vp9],
            ..Self::default()
        }
    }
}

impl EncodingService for ScriptedEncoder {
    fn supports(&self, codec: Codec) -> bool {
        self.supported.contains(&codec)
    }

    fn start(&mut self, _cfg: &EncoderConfig) -> LoopcardResult<()> {
        *self.start_calls.borrow_mut() += 1;
        if self.fail_start {
            return Err(LoopcardError::encode("scripted start failure"));
        }
        self.active = true;
        self.frames = 0;
        self.pending.clear();
        Ok(())
    }

    fn push_frame(&mut self, _frame: &FrameRGBA) -> LoopcardResult<()> {
        self.frames += 1;
        self.pending.push(vec![0xAB]);
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
        if self.fail_finalize {
            return Err(LoopcardError::encode("scripted encoder fault"));
        }
        let mut late = std::mem::take(&mut self.pending);
        late.append(&mut self.late_segments);
        Ok(late)
    }
}

/// Store wrapper the test keeps a handle on after the controller takes
/// ownership of its box.
#[derive(Clone)]
struct SharedStore(Rc<RefCell<MemoryArtifactStore>>);

impl SharedStore {
    fn new() -> Self {
        Self(Rc::new(RefCell::new(MemoryArtifactStore::new())))
    }
}

impl ArtifactStore for SharedStore {
    fn create(&mut self, bytes: &[u8], ext: &str) -> LoopcardResult<ArtifactHandle> {
        self.0.borrow_mut().create(bytes, ext)
    }

    fn revoke(&mut self, handle: &ArtifactHandle) -> LoopcardResult<()> {
        self.0.borrow_mut().revoke(handle)
    }
}

fn ms(v: u64) -> Duration {
    Duration::from_millis(v)
}

/// Pump at `step` granularity from `start` until the session leaves the
/// Recording/Finalizing states, or `deadline` passes.
fn pump_until_settled(
    c: &mut CaptureController,
    surface: &Surface,
    start: Duration,
    step: Duration,
    deadline: Duration,
) -> Duration {
    let mut now = start;
    while matches!(
        c.state(),
        CaptureState::Recording | CaptureState::Finalizing
    ) {
        now += step;
        assert!(now <= deadline, "capture did not settle before the deadline");
        c.pump(now, surface).unwrap();
        assert!(c.progress_percent() <= 100.0);
    }
    now
}

#[test]
fn default_session_is_ready_with_one_nonempty_artifact() {
    let store = SharedStore::new();
    let mut c = CaptureController::new(Box::new(ScriptedEncoder::vp9()), Box::new(store.clone()));
    let surface = Surface::card();
    let params = ParameterSet::default(); // 6s at 30fps

    c.start(ms(0), Some(&surface), &params).unwrap();
    assert_eq!(c.state(), CaptureState::Recording);
    assert_eq!(c.negotiated_codec(), Some(Codec::Vp9));

    let settled_at = pump_until_settled(&mut c, &surface, ms(0), ms(100), ms(6200));
    assert_eq!(c.state(), CaptureState::Ready);
    assert_eq!(settled_at, ms(6200));
    assert_eq!(c.progress_percent(), 100.0);
    assert!(c.error().is_none());

    let handle = c.artifact().expect("ready session holds an artifact");
    let inner = store.0.borrow();
    assert_eq!(inner.created.len(), 1);
    let (id, bytes, ext) = &inner.created[0];
    assert_eq!(*id, handle.id());
    assert!(!bytes.is_empty());
    assert_eq!(ext, "webm");
}

#[test]
fn short_fast_session_stops_at_target_plus_grace() {
    let store = SharedStore::new();
    let mut c = CaptureController::new(Box::new(ScriptedEncoder::vp9()), Box::new(store.clone()));
    let surface = Surface::card();
    let mut params = ParameterSet::default();
    params.set_duration_seconds(3);
    params.set_fps(60);

    c.start(ms(0), Some(&surface), &params).unwrap();
    c.pump(ms(3199), &surface).unwrap();
    assert_eq!(c.state(), CaptureState::Recording);
    assert!(c.progress_percent() <= 100.0);

    c.pump(ms(3200), &surface).unwrap();
    assert_eq!(c.state(), CaptureState::Ready);
    assert_eq!(c.progress_percent(), 100.0);
    assert!(!store.0.borrow().created.is_empty());
}

#[test]
fn unsupported_codecs_fail_the_start_synchronously() {
    let store = SharedStore::new();
    let encoder = ScriptedEncoder::default(); // supports nothing
    let mut c = CaptureController::new(Box::new(encoder), Box::new(store.clone()));
    let surface = Surface::card();

    let err = c
        .start(ms(0), Some(&surface), &ParameterSet::default())
        .unwrap_err();
    assert!(matches!(err, LoopcardError::EncoderConstructionFailed(_)));
    assert_eq!(c.state(), CaptureState::Failed);
    assert!(c.error().is_some());
    assert!(c.artifact().is_none());
    assert!(store.0.borrow().created.is_empty());
}

#[test]
fn encoder_start_failure_leaves_no_partial_session() {
    let store = SharedStore::new();
    let encoder = ScriptedEncoder {
        fail_start: true,
        ..ScriptedEncoder::vp9()
    };
    let mut c = CaptureController::new(Box::new(encoder), Box::new(store.clone()));
    let surface = Surface::card();

    assert!(c.start(ms(0), Some(&surface), &ParameterSet::default()).is_err());
    assert_eq!(c.state(), CaptureState::Failed);

    // A pump afterwards must be inert.
    c.pump(ms(500), &surface).unwrap();
    assert_eq!(c.state(), CaptureState::Failed);
    assert!(store.0.borrow().created.is_empty());
}

#[test]
fn restart_revokes_the_previous_artifact_exactly_once() {
    let store = SharedStore::new();
    let mut c = CaptureController::new(Box::new(ScriptedEncoder::vp9()), Box::new(store.clone()));
    let surface = Surface::card();
    let mut params = ParameterSet::default();
    params.set_duration_seconds(3);

    c.start(ms(0), Some(&surface), &params).unwrap();
    pump_until_settled(&mut c, &surface, ms(0), ms(100), ms(3300));
    let first_id = c.artifact().map(ArtifactHandle::id).unwrap();
    assert!(c.progress_percent() == 100.0);

    c.start(ms(10_000), Some(&surface), &params).unwrap();
    assert_eq!(c.progress_percent(), 0.0);
    assert_eq!(store.0.borrow().revoked, vec![first_id]);

    pump_until_settled(&mut c, &surface, ms(10_000), ms(100), ms(13_300));
    assert_eq!(c.state(), CaptureState::Ready);
    let second_id = c.artifact().map(ArtifactHandle::id).unwrap();
    assert_ne!(second_id, first_id);

    let inner = store.0.borrow();
    assert_eq!(inner.created.len(), 2);
    assert_eq!(inner.revoked, vec![first_id]);
    assert_eq!(inner.live, vec![second_id]);
}

#[test]
fn start_while_recording_is_a_no_op() {
    let starts = Rc::new(RefCell::new(0));
    let encoder = ScriptedEncoder {
        start_calls: starts.clone(),
        ..ScriptedEncoder::vp9()
    };
    let store = SharedStore::new();
    let mut c = CaptureController::new(Box::new(encoder), Box::new(store));
    let surface = Surface::card();
    let params = ParameterSet::default();

    c.start(ms(0), Some(&surface), &params).unwrap();
    c.pump(ms(250), &surface).unwrap();
    let progress = c.progress_percent();
    assert!(progress > 0.0);

    c.start(ms(300), Some(&surface), &params).unwrap();
    assert_eq!(*starts.borrow(), 1);
    assert_eq!(c.state(), CaptureState::Recording);
    assert_eq!(c.progress_percent(), progress);
}

#[test]
fn stop_firing_before_a_progress_tick_is_harmless() {
    let store = SharedStore::new();
    let mut c = CaptureController::new(Box::new(ScriptedEncoder::vp9()), Box::new(store));
    let surface = Surface::card();
    c.start(ms(0), Some(&surface), &ParameterSet::default())
        .unwrap();

    // Timer events arriving out of order: the deferred stop first, then a
    // stale progress sample.
    c.on_stop_due(ms(6200)).unwrap();
    assert_eq!(c.state(), CaptureState::Finalizing);
    c.on_progress_tick(ms(6300));
    assert_eq!(c.progress_percent(), 0.0);

    c.pump(ms(6300), &surface).unwrap();
    assert_eq!(c.state(), CaptureState::Ready);
    assert_eq!(c.progress_percent(), 100.0);
}

#[test]
fn late_segments_are_appended_in_order() {
    let store = SharedStore::new();
    let encoder = ScriptedEncoder {
        late_segments: vec![vec![0xCD], vec![0xEF]],
        ..ScriptedEncoder::vp9()
    };
    let mut c = CaptureController::new(Box::new(encoder), Box::new(store.clone()));
    let surface = Surface::card();
    let mut params = ParameterSet::default();
    params.set_duration_seconds(3);

    c.start(ms(0), Some(&surface), &params).unwrap();
    pump_until_settled(&mut c, &surface, ms(0), ms(100), ms(3300));
    assert_eq!(c.state(), CaptureState::Ready);

    let id = c.artifact().map(ArtifactHandle::id).unwrap();
    let inner = store.0.borrow();
    let payload = inner.payload(id).unwrap();
    assert!(payload.len() > 2);
    assert_eq!(&payload[payload.len() - 2..], &[0xCD, 0xEF]);
    assert!(payload[..payload.len() - 2].iter().all(|&b| b == 0xAB));
}

#[test]
fn encoder_fault_during_finalize_fails_the_session() {
    let store = SharedStore::new();
    let encoder = ScriptedEncoder {
        fail_finalize: true,
        ..ScriptedEncoder::vp9()
    };
    let mut c = CaptureController::new(Box::new(encoder), Box::new(store.clone()));
    let surface = Surface::card();
    let mut params = ParameterSet::default();
    params.set_duration_seconds(3);

    c.start(ms(0), Some(&surface), &params).unwrap();
    assert!(c.pump(ms(3200), &surface).is_err());
    assert_eq!(c.state(), CaptureState::Failed);
    assert!(c.error().is_some());
    assert!(c.artifact().is_none());
    assert!(store.0.borrow().created.is_empty());
}
