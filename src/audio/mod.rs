//! Playback of synthesized replies.
//!
//! A [`PlaybackController`] owns at most one [`AudioHandle`] at a time and
//! drives the per-view state machine:
//!
//! ```text
//! idle --load--> loading --audio ready--> playing <--pause/resume--> paused
//! playing|paused --stop / natural end--> idle
//! any --failure--> error
//! ```
//!
//! Starting a new message always stops the active one first, and the handle
//! is released on every exit path including `Drop`.

#[cfg(feature = "native-audio")]
pub mod native;

use std::collections::HashMap;
use std::time::{Duration, Instant};

use bytes::Bytes;
use tracing::{debug, info, warn};

use crate::error::{MeetingError, Result};

/// A loaded clip on some output device.
pub trait AudioHandle {
    /// Start or resume sound.
    fn play(&mut self) -> Result<()>;
    /// Hold the current position.
    fn pause(&mut self) -> Result<()>;
    /// Halt sound and release the underlying resource. Idempotent.
    fn release(&mut self);
    /// Playback position.
    fn position(&self) -> Duration;
    /// Clip length, when known.
    fn duration(&self) -> Option<Duration>;
    /// True once the clip has played to its end.
    fn is_finished(&self) -> bool;
}

/// Creates [`AudioHandle`]s from encoded audio.
pub trait AudioEngine {
    /// Handle type.
    type Handle: AudioHandle;

    /// Decode and prepare `audio` for playback.
    fn load(&self, audio: Bytes) -> Result<Self::Handle>;
}

/// Playback state of a controller, or of a single message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    /// Nothing loaded, or stopped, or finished.
    Idle,
    /// Waiting for synthesized audio.
    Loading,
    /// Sounding.
    Playing,
    /// Loaded, position held.
    Paused,
    /// The last attempt failed; see [`PlaybackController::last_error`].
    Error,
}

impl PlaybackState {
    /// Lowercase name for logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Loading => "loading",
            Self::Playing => "playing",
            Self::Paused => "paused",
            Self::Error => "error",
        }
    }
}

/// Position within the active clip.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackProgress {
    /// Elapsed playback time.
    pub position: Duration,
    /// Clip length, when known.
    pub duration: Option<Duration>,
}

impl PlaybackProgress {
    /// Completed share in `0.0..=1.0`, when the duration is known.
    pub fn fraction(&self) -> Option<f32> {
        let total = self.duration?.as_secs_f32();
        if total <= 0.0 {
            return Some(1.0);
        }
        Some((self.position.as_secs_f32() / total).clamp(0.0, 1.0))
    }
}

struct Active<H> {
    message_id: String,
    state: PlaybackState,
    handle: Option<H>,
}

/// Exclusive playback for one conversation view.
pub struct PlaybackController<E: AudioEngine> {
    engine: E,
    active: Option<Active<E::Handle>>,
    errors: HashMap<String, String>,
}

impl<E: AudioEngine> std::fmt::Debug for PlaybackController<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackController")
            .field("active", &self.active_message())
            .field("state", &self.state())
            .field("errors", &self.errors.len())
            .finish()
    }
}

impl<E: AudioEngine> PlaybackController<E> {
    /// Controller over `engine`, initially idle.
    pub fn new(engine: E) -> Self {
        Self {
            engine,
            active: None,
            errors: HashMap::new(),
        }
    }

    /// State of the active message, or `Idle`.
    pub fn state(&self) -> PlaybackState {
        self.active.as_ref().map_or(PlaybackState::Idle, |a| a.state)
    }

    /// Message currently loading, playing or paused.
    pub fn active_message(&self) -> Option<&str> {
        self.active.as_ref().map(|a| a.message_id.as_str())
    }

    /// State as seen by one message.
    pub fn state_of(&self, message_id: &str) -> PlaybackState {
        match &self.active {
            Some(active) if active.message_id == message_id => active.state,
            _ if self.errors.contains_key(message_id) => PlaybackState::Error,
            _ => PlaybackState::Idle,
        }
    }

    /// The last failure recorded for a message.
    pub fn last_error(&self, message_id: &str) -> Option<&str> {
        self.errors.get(message_id).map(String::as_str)
    }

    /// Stop whatever is active and mark `message_id` as loading.
    pub fn begin_loading(&mut self, message_id: &str) {
        self.stop();
        self.errors.remove(message_id);
        debug!(message_id, "playback loading");
        self.active = Some(Active {
            message_id: message_id.to_owned(),
            state: PlaybackState::Loading,
            handle: None,
        });
    }

    /// Load `audio` for `message_id` and start playing it.
    ///
    /// Whatever is active is stopped and released first, including an
    /// earlier clip of the same message. Only a `begin_loading` slot for
    /// `message_id` that holds no handle yet is reused.
    ///
    /// # Errors
    ///
    /// Returns [`MeetingError::Playback`] when the engine cannot load or
    /// start the clip; the message is left in the `Error` state.
    pub fn play(&mut self, message_id: &str, audio: Bytes) -> Result<()> {
        let awaiting_audio = self.active.as_ref().is_some_and(|a| {
            a.message_id == message_id && a.state == PlaybackState::Loading && a.handle.is_none()
        });
        if !awaiting_audio {
            self.begin_loading(message_id);
        }
        let started = self.engine.load(audio).and_then(|mut handle| {
            handle.play()?;
            Ok(handle)
        });
        match started {
            Ok(handle) => {
                info!(message_id, "playback started");
                self.active = Some(Active {
                    message_id: message_id.to_owned(),
                    state: PlaybackState::Playing,
                    handle: Some(handle),
                });
                Ok(())
            }
            Err(err) => {
                let err = match err {
                    MeetingError::Playback(_) => err,
                    other => MeetingError::Playback(other.message()),
                };
                self.fail(message_id, &err);
                Err(err)
            }
        }
    }

    /// Record a failure for `message_id`, releasing its handle if active.
    pub fn fail(&mut self, message_id: &str, err: &MeetingError) {
        warn!(message_id, error = %err, "playback failed");
        if self.active_message() == Some(message_id) {
            self.release_active();
        }
        self.errors.insert(message_id.to_owned(), err.message());
    }

    /// Pause the playing message.
    ///
    /// # Errors
    ///
    /// Propagates an engine failure, which also moves the message to `Error`.
    pub fn pause(&mut self) -> Result<()> {
        self.transition(PlaybackState::Playing, PlaybackState::Paused, |h| h.pause())
    }

    /// Resume the paused message.
    ///
    /// # Errors
    ///
    /// Propagates an engine failure, which also moves the message to `Error`.
    pub fn resume(&mut self) -> Result<()> {
        self.transition(PlaybackState::Paused, PlaybackState::Playing, |h| h.play())
    }

    fn transition(
        &mut self,
        from: PlaybackState,
        to: PlaybackState,
        op: impl FnOnce(&mut E::Handle) -> Result<()>,
    ) -> Result<()> {
        let Some(active) = self.active.as_mut() else {
            return Ok(());
        };
        if active.state != from {
            return Ok(());
        }
        let outcome = match active.handle.as_mut() {
            Some(handle) => op(handle),
            None => Ok(()),
        };
        match outcome {
            Ok(()) => {
                active.state = to;
                debug!(message_id = %active.message_id, state = to.as_str(), "playback transition");
                Ok(())
            }
            Err(err) => {
                let message_id = active.message_id.clone();
                self.fail(&message_id, &err);
                Err(err)
            }
        }
    }

    /// Halt and release the active message, returning to `Idle`.
    pub fn stop(&mut self) {
        if let Some(id) = self.active_message() {
            debug!(message_id = id, "playback stopped");
        }
        self.release_active();
    }

    fn release_active(&mut self) {
        if let Some(mut active) = self.active.take()
            && let Some(handle) = active.handle.as_mut()
        {
            handle.release();
        }
    }

    /// Observe natural end of playback; returns the new state.
    pub fn tick(&mut self) -> PlaybackState {
        let finished = self.active.as_ref().is_some_and(|a| {
            a.state == PlaybackState::Playing && a.handle.as_ref().is_some_and(|h| h.is_finished())
        });
        if finished {
            if let Some(id) = self.active_message() {
                info!(message_id = id, "playback finished");
            }
            self.release_active();
        }
        self.state()
    }

    /// Position of the active clip.
    pub fn progress(&self) -> Option<PlaybackProgress> {
        let handle = self.active.as_ref()?.handle.as_ref()?;
        Some(PlaybackProgress {
            position: handle.position(),
            duration: handle.duration(),
        })
    }

    /// Poll [`PlaybackController::tick`] until the active clip ends or is
    /// stopped from elsewhere.
    pub async fn wait_until_idle(&mut self, poll: Duration) {
        while matches!(self.tick(), PlaybackState::Playing) {
            tokio::time::sleep(poll).await;
        }
    }
}

impl<E: AudioEngine> Drop for PlaybackController<E> {
    fn drop(&mut self) {
        self.release_active();
    }
}

/// Assumed bitrate of compressed clips when estimating their length.
const ESTIMATE_BITS_PER_SECOND: u64 = 48_000;

/// Engine that keeps time without producing sound.
///
/// Clip length is estimated from the byte count at 48 kbit/s, matching the
/// default synthesis output format.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentEngine;

/// Handle of a [`SilentEngine`] clip.
#[derive(Debug)]
pub struct SilentHandle {
    duration: Duration,
    played: Duration,
    since: Option<Instant>,
    released: bool,
}

impl SilentHandle {
    fn elapsed(&self) -> Duration {
        let running = self.since.map_or(Duration::ZERO, |s| s.elapsed());
        (self.played + running).min(self.duration)
    }
}

impl AudioEngine for SilentEngine {
    type Handle = SilentHandle;

    fn load(&self, audio: Bytes) -> Result<SilentHandle> {
        if audio.is_empty() {
            return Err(MeetingError::Playback("no audio to play".into()));
        }
        let millis = audio.len() as u64 * 8 * 1000 / ESTIMATE_BITS_PER_SECOND;
        Ok(SilentHandle {
            duration: Duration::from_millis(millis),
            played: Duration::ZERO,
            since: None,
            released: false,
        })
    }
}

impl AudioHandle for SilentHandle {
    fn play(&mut self) -> Result<()> {
        if self.released {
            return Err(MeetingError::Playback("clip already released".into()));
        }
        if self.since.is_none() {
            self.since = Some(Instant::now());
        }
        Ok(())
    }

    fn pause(&mut self) -> Result<()> {
        self.played = self.elapsed();
        self.since = None;
        Ok(())
    }

    fn release(&mut self) {
        self.since = None;
        self.played = Duration::ZERO;
        self.released = true;
    }

    fn position(&self) -> Duration {
        self.elapsed()
    }

    fn duration(&self) -> Option<Duration> {
        Some(self.duration)
    }

    fn is_finished(&self) -> bool {
        !self.released && self.elapsed() >= self.duration
    }
}
