use log::{ debug, error, info };
use parking_lot::Mutex;
use std::time::Duration;
use tokio::sync::oneshot;

use super::{ PcmClip, PlaybackError };

/// How long a clip is assumed to play when the backend cannot report its end.
pub const APPROXIMATE_PLAYBACK: Duration = Duration::from_secs(5);

/// Creates output contexts. Only one context is alive per player.
pub trait AudioBackend: Send + Sync {
    type Context: OutputContext;

    fn create_context(&self) -> Result<Self::Context, PlaybackError>;
}

pub trait OutputContext: Send {
    /// Wakes a suspended output. Backends without such a state keep the default.
    fn resume(&mut self) -> Result<(), PlaybackError> {
        Ok(())
    }

    /// Starts the clip right away; overlapping clips mix.
    fn start(&mut self, clip: PcmClip) -> Result<PlaybackHandle, PlaybackError>;
}

#[derive(Debug)]
enum Completion {
    Signal(oneshot::Receiver<()>),
    Approximate,
}

/// A clip that has started playing.
#[derive(Debug)]
pub struct PlaybackHandle {
    duration: Duration,
    completion: Completion,
}

impl PlaybackHandle {
    /// Handle whose end is reported by the backend through `done`.
    pub fn with_signal(duration: Duration, done: oneshot::Receiver<()>) -> Self {
        Self { duration, completion: Completion::Signal(done) }
    }

    /// For backends that cannot report the end of a clip: treated as finished
    /// after `APPROXIMATE_PLAYBACK`.
    pub fn approximate(duration: Duration) -> Self {
        Self { duration, completion: Completion::Approximate }
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn is_approximate(&self) -> bool {
        matches!(self.completion, Completion::Approximate)
    }

    pub async fn finished(self) {
        match self.completion {
            Completion::Signal(done) => {
                // A dropped sender means the stream is gone, which is an end too.
                let _ = done.await;
            }
            Completion::Approximate => tokio::time::sleep(APPROXIMATE_PLAYBACK).await,
        }
    }
}

/// Object-safe face of `AudioPlayer` for the composition root.
pub trait Speaker: Send + Sync {
    fn decode_and_play(&self, payload: &str) -> Result<PlaybackHandle, PlaybackError>;
}

/// Decodes speech payloads and plays them through one lazily created output
/// context, rebuilt after any failure.
pub struct AudioPlayer<B: AudioBackend> {
    backend: B,
    context: Mutex<Option<B::Context>>,
}

impl<B: AudioBackend> AudioPlayer<B> {
    pub fn new(backend: B) -> Self {
        Self { backend, context: Mutex::new(None) }
    }

    pub fn has_context(&self) -> bool {
        self.context.lock().is_some()
    }

    fn play_with(
        &self,
        slot: &mut Option<B::Context>,
        payload: &str
    ) -> Result<PlaybackHandle, PlaybackError> {
        let clip = PcmClip::from_base64(payload)?;
        if slot.is_none() {
            info!("Creating audio output context");
            *slot = Some(self.backend.create_context()?);
        }
        let Some(context) = slot.as_mut() else {
            return Err(PlaybackError::Device("output context unavailable".into()));
        };
        context.resume()?;
        debug!("Playing {} samples ({:?})", clip.samples().len(), clip.duration());
        context.start(clip)
    }
}

impl<B: AudioBackend> Speaker for AudioPlayer<B> {
    fn decode_and_play(&self, payload: &str) -> Result<PlaybackHandle, PlaybackError> {
        let mut slot = self.context.lock();
        let result = self.play_with(&mut slot, payload);
        if let Err(e) = &result {
            error!("Audio playback error: {}", e);
            *slot = None;
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use std::sync::atomic::{ AtomicBool, AtomicUsize, Ordering };
    use std::sync::Arc;

    #[derive(Default)]
    struct Counters {
        created: AtomicUsize,
        resumed: AtomicUsize,
        started: AtomicUsize,
        fail_next_start: AtomicBool,
    }

    struct FakeBackend(Arc<Counters>);

    struct FakeContext(Arc<Counters>);

    impl AudioBackend for FakeBackend {
        type Context = FakeContext;

        fn create_context(&self) -> Result<FakeContext, PlaybackError> {
            self.0.created.fetch_add(1, Ordering::SeqCst);
            Ok(FakeContext(Arc::clone(&self.0)))
        }
    }

    impl OutputContext for FakeContext {
        fn resume(&mut self) -> Result<(), PlaybackError> {
            self.0.resumed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn start(&mut self, clip: PcmClip) -> Result<PlaybackHandle, PlaybackError> {
            if self.0.fail_next_start.swap(false, Ordering::SeqCst) {
                return Err(PlaybackError::Stream("device went away".into()));
            }
            self.0.started.fetch_add(1, Ordering::SeqCst);
            let (tx, rx) = oneshot::channel();
            let _ = tx.send(());
            Ok(PlaybackHandle::with_signal(clip.duration(), rx))
        }
    }

    fn player() -> (AudioPlayer<FakeBackend>, Arc<Counters>) {
        let counters = Arc::new(Counters::default());
        (AudioPlayer::new(FakeBackend(Arc::clone(&counters))), counters)
    }

    fn payload() -> String {
        STANDARD.encode([0u8, 0, 0, 64])
    }

    #[test]
    fn context_is_created_lazily_and_reused() {
        let (player, counters) = player();
        assert!(!player.has_context());

        player.decode_and_play(&payload()).unwrap();
        player.decode_and_play(&payload()).unwrap();

        assert!(player.has_context());
        assert_eq!(counters.created.load(Ordering::SeqCst), 1);
        assert_eq!(counters.resumed.load(Ordering::SeqCst), 2);
        assert_eq!(counters.started.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn failure_discards_context() {
        let (player, counters) = player();
        player.decode_and_play(&payload()).unwrap();

        counters.fail_next_start.store(true, Ordering::SeqCst);
        assert!(player.decode_and_play(&payload()).is_err());
        assert!(!player.has_context());

        player.decode_and_play(&payload()).unwrap();
        assert_eq!(counters.created.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn decode_failure_also_resets() {
        let (player, counters) = player();
        player.decode_and_play(&payload()).unwrap();
        let err = player.decode_and_play("not base64!").unwrap_err();
        assert!(matches!(err, PlaybackError::Decode(_)));
        assert!(!player.has_context());
        assert_eq!(counters.started.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn signalled_handle_finishes() {
        let (player, _) = player();
        let handle = player.decode_and_play(&payload()).unwrap();
        assert!(!handle.is_approximate());
        handle.finished().await;
    }

    struct SilentBackend;

    struct SilentContext;

    impl AudioBackend for SilentBackend {
        type Context = SilentContext;

        fn create_context(&self) -> Result<SilentContext, PlaybackError> {
            Ok(SilentContext)
        }
    }

    impl OutputContext for SilentContext {
        fn start(&mut self, clip: PcmClip) -> Result<PlaybackHandle, PlaybackError> {
            Ok(PlaybackHandle::approximate(clip.duration()))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn backend_without_signal_finishes_after_five_seconds() {
        let player = AudioPlayer::new(SilentBackend);
        let handle = player.decode_and_play(&payload()).unwrap();
        assert!(handle.is_approximate());

        let started = tokio::time::Instant::now();
        handle.finished().await;
        assert!(started.elapsed() >= APPROXIMATE_PLAYBACK);
    }
}
