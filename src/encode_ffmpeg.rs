use std::{
    collections::HashSet,
    io::{Read, Write as _},
    process::{Child, ChildStdin, Command, Stdio},
    sync::mpsc,
    thread::JoinHandle,
};

use crate::{
    encode::{Codec, EncoderConfig, EncodingService},
    error::{LoopcardError, LoopcardResult},
    surface::FrameRGBA,
};

/// Size of the stdout reads that become encoded segments.
const SEGMENT_READ_BYTES: usize = 64 * 1024;

pub fn is_ffmpeg_on_path() -> bool {
    Command::new("ffmpeg")
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Encoding service backed by the system `ffmpeg` binary.
///
/// Raw RGBA frames stream into stdin; the WebM stream comes back on stdout,
/// chopped into segments by a drain thread so delivery stays asynchronous
/// the way the capture state machine expects.
///
/// We intentionally shell out rather than link FFmpeg to avoid native dev
/// header/lib requirements.
pub struct FfmpegEncoder {
    available: HashSet<String>,
    session: Option<Session>,
}

struct Session {
    child: Child,
    stdin: Option<ChildStdin>,
    segments: mpsc::Receiver<Vec<u8>>,
    stdout_drain: Option<JoinHandle<std::io::Result<()>>>,
    stderr_drain: Option<JoinHandle<std::io::Result<Vec<u8>>>>,
    frame_len: usize,
}

impl FfmpegEncoder {
    /// Probe `ffmpeg` and the encoder list it was built with.
    pub fn detect() -> LoopcardResult<Self> {
        if !is_ffmpeg_on_path() {
            return Err(LoopcardError::EncoderConstructionFailed(
                "ffmpeg was not found on PATH".to_string(),
            ));
        }

        let output = Command::new("ffmpeg")
            .args(["-hide_banner", "-encoders"])
            .stdin(Stdio::null())
            .output()
            .map_err(|e| {
                LoopcardError::EncoderConstructionFailed(format!("failed to run ffmpeg: {e}"))
            })?;

        let listing = String::from_utf8_lossy(&output.stdout);
        let available = parse_encoder_listing(&listing);
        tracing::debug!(encoders = available.len(), "probed ffmpeg encoder list");

        Ok(Self {
            available,
            session: None,
        })
    }

    #[cfg(test)]
    fn with_encoders(names: &[&str]) -> Self {
        Self {
            available: names.iter().map(|s| s.to_string()).collect(),
            session: None,
        }
    }
}

/// Pull encoder names out of `ffmpeg -encoders` output. Lines look like
/// ` V....D libvpx-vp9           libvpx VP9 Encoder ...`.
fn parse_encoder_listing(listing: &str) -> HashSet<String> {
    listing
        .lines()
        .skip_while(|line| !line.contains("------"))
        .skip(1)
        .filter_map(|line| {
            let mut cols = line.split_whitespace();
            let flags = cols.next()?;
            if !flags.starts_with('V') {
                return None;
            }
            cols.next().map(str::to_string)
        })
        .collect()
}

impl EncodingService for FfmpegEncoder {
    fn supports(&self, codec: Codec) -> bool {
        match codec.ffmpeg_encoder() {
            Some(name) => self.available.contains(name),
            // The container default is whatever ffmpeg picks for WebM.
            None => true,
        }
    }

    fn start(&mut self, cfg: &EncoderConfig) -> LoopcardResult<()> {
        if self.session.is_some() {
            return Err(LoopcardError::encode(
                "an encoding session is already active",
            ));
        }
        if cfg.width == 0 || cfg.height == 0 || cfg.fps == 0 {
            return Err(LoopcardError::EncoderConstructionFailed(
                "encoder width/height/fps must be non-zero".to_string(),
            ));
        }
        if !cfg.width.is_multiple_of(2) || !cfg.height.is_multiple_of(2) {
            return Err(LoopcardError::EncoderConstructionFailed(
                "encoder width/height must be even (required for yuv420p output)".to_string(),
            ));
        }

        let mut cmd = Command::new("ffmpeg");
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        cmd.args([
            "-loglevel",
            "error",
            "-f",
            "rawvideo",
            "-pix_fmt",
            "rgba",
            "-s",
            &format!("{}x{}", cfg.width, cfg.height),
            "-r",
            &cfg.fps.to_string(),
            "-i",
            "pipe:0",
            "-an",
        ]);
        if let Some(encoder) = cfg.codec.ffmpeg_encoder() {
            cmd.args(["-c:v", encoder]);
            // libvpx defaults are offline-quality slow; keep the encoder
            // real-time capable like the live capture it stands in for.
            cmd.args(["-deadline", "realtime", "-cpu-used", "8"]);
        }
        cmd.args([
            "-b:v",
            &cfg.bitrate_bps.to_string(),
            "-pix_fmt",
            "yuv420p",
            "-f",
            "webm",
            "pipe:1",
        ]);

        let mut child = cmd.spawn().map_err(|e| {
            LoopcardError::EncoderConstructionFailed(format!("failed to spawn ffmpeg: {e}"))
        })?;

        let stdin = child.stdin.take().ok_or_else(|| {
            LoopcardError::EncoderConstructionFailed("failed to open ffmpeg stdin".to_string())
        })?;
        let mut stdout = child.stdout.take().ok_or_else(|| {
            LoopcardError::EncoderConstructionFailed("failed to open ffmpeg stdout".to_string())
        })?;
        let mut stderr = child.stderr.take().ok_or_else(|| {
            LoopcardError::EncoderConstructionFailed("failed to open ffmpeg stderr".to_string())
        })?;

        let (tx, rx) = mpsc::channel::<Vec<u8>>();
        let stdout_drain = std::thread::spawn(move || {
            let mut buf = vec![0u8; SEGMENT_READ_BYTES];
            loop {
                let n = stdout.read(&mut buf)?;
                if n == 0 {
                    return Ok(());
                }
                if tx.send(buf[..n].to_vec()).is_err() {
                    return Ok(());
                }
            }
        });
        let stderr_drain = std::thread::spawn(move || {
            let mut bytes = Vec::new();
            stderr.read_to_end(&mut bytes)?;
            Ok(bytes)
        });

        tracing::info!(
            codec = %cfg.codec,
            fps = cfg.fps,
            bitrate = cfg.bitrate_bps,
            "ffmpeg session started"
        );
        self.session = Some(Session {
            child,
            stdin: Some(stdin),
            segments: rx,
            stdout_drain: Some(stdout_drain),
            stderr_drain: Some(stderr_drain),
            frame_len: (cfg.width as usize) * (cfg.height as usize) * 4,
        });
        Ok(())
    }

    fn push_frame(&mut self, frame: &FrameRGBA) -> LoopcardResult<()> {
        let Some(session) = self.session.as_mut() else {
            return Err(LoopcardError::encode("no active encoding session"));
        };
        if frame.data.len() != session.frame_len {
            return Err(LoopcardError::encode(format!(
                "frame size mismatch: got {} bytes, expected {}",
                frame.data.len(),
                session.frame_len
            )));
        }
        let Some(stdin) = session.stdin.as_mut() else {
            return Err(LoopcardError::encode("encoder is already stopping"));
        };
        stdin
            .write_all(&frame.data)
            .map_err(|e| LoopcardError::encode(format!("failed to write frame to ffmpeg: {e}")))
    }

    fn poll_segments(&mut self) -> Vec<Vec<u8>> {
        let Some(session) = self.session.as_mut() else {
            return Vec::new();
        };
        let mut out = Vec::new();
        while let Ok(segment) = session.segments.try_recv() {
            out.push(segment);
        }
        out
    }

    fn request_stop(&mut self) -> LoopcardResult<()> {
        if let Some(session) = self.session.as_mut() {
            // Closing stdin is the stop signal; ffmpeg flushes and exits.
            drop(session.stdin.take());
        }
        Ok(())
    }

    fn is_inactive(&self) -> bool {
        match &self.session {
            None => true,
            Some(session) => session.stdin.is_none(),
        }
    }

    fn finalize(&mut self) -> LoopcardResult<Vec<Vec<u8>>> {
        let Some(mut session) = self.session.take() else {
            return Ok(Vec::new());
        };
        drop(session.stdin.take());

        let status = session
            .child
            .wait()
            .map_err(|e| LoopcardError::encode(format!("failed to wait for ffmpeg: {e}")))?;

        if let Some(handle) = session.stdout_drain.take() {
            match handle.join() {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    return Err(LoopcardError::encode(format!(
                        "failed to read ffmpeg output: {e}"
                    )));
                }
                Err(_) => return Err(LoopcardError::encode("ffmpeg output reader panicked")),
            }
        }

        let stderr_bytes = match session.stderr_drain.take() {
            Some(handle) => handle.join().ok().and_then(Result::ok).unwrap_or_default(),
            None => Vec::new(),
        };

        if !status.success() {
            let stderr = String::from_utf8_lossy(&stderr_bytes);
            return Err(LoopcardError::encode(format!(
                "ffmpeg exited with status {status}: {}",
                stderr.trim()
            )));
        }

        // Everything still buffered in the channel is a late segment.
        let mut late = Vec::new();
        while let Ok(segment) = session.segments.try_recv() {
            late.push(segment);
        }
        tracing::debug!(late_segments = late.len(), "ffmpeg session finalized");
        Ok(late)
    }
}

impl Drop for FfmpegEncoder {
    fn drop(&mut self) {
        if let Some(mut session) = self.session.take() {
            drop(session.stdin.take());
            let _ = session.child.kill();
            let _ = session.child.wait();
        }
    }
}
