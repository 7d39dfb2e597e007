// src/notifier.rs
//
// Audible alert cues. The frame loop only pushes kinds onto a queue; a
// dedicated task drains it and plays tones on the blocking pool, one at
// a time. Nothing here can fail the caller.

use crate::types::{AlertKind, BackendKind};
use anyhow::Result;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tone {
    pub frequency_hz: u32,
    pub duration_ms: u64,
}

impl AlertKind {
    pub fn tone(&self) -> Tone {
        match self {
            AlertKind::LeftLaneDeparture => Tone {
                frequency_hz: 800,
                duration_ms: 200,
            },
            AlertKind::RightLaneDeparture => Tone {
                frequency_hz: 600,
                duration_ms: 200,
            },
            AlertKind::MotionDetected => Tone {
                frequency_hz: 1000,
                duration_ms: 100,
            },
        }
    }
}

/// Something that can turn a tone into sound (or pretend to).
pub trait SoundBackend: Send + Sync {
    fn name(&self) -> &'static str;

    /// Blocks for the length of the tone.
    fn play(&self, tone: Tone) -> Result<()>;
}

/// Logs a beep marker instead of producing sound.
pub struct ConsoleBackend;

impl SoundBackend for ConsoleBackend {
    fn name(&self) -> &'static str {
        "console"
    }

    fn play(&self, tone: Tone) -> Result<()> {
        info!(
            "🔊 BEEP! ({} Hz, {} ms)",
            tone.frequency_hz, tone.duration_ms
        );
        Ok(())
    }
}

pub struct SilentBackend;

impl SoundBackend for SilentBackend {
    fn name(&self) -> &'static str {
        "silent"
    }

    fn play(&self, _tone: Tone) -> Result<()> {
        Ok(())
    }
}

#[cfg(feature = "audio")]
pub use speaker::SpeakerBackend;

#[cfg(feature = "audio")]
mod speaker {
    use super::{SoundBackend, Tone};
    use anyhow::{anyhow, bail, Result};
    use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
    use std::time::Duration;
    use tracing::warn;

    const AMPLITUDE: f32 = 0.2;

    /// Sine tone on the default output device.
    pub struct SpeakerBackend;

    impl SpeakerBackend {
        pub fn is_available() -> bool {
            cpal::default_host().default_output_device().is_some()
        }
    }

    impl SoundBackend for SpeakerBackend {
        fn name(&self) -> &'static str {
            "speaker"
        }

        fn play(&self, tone: Tone) -> Result<()> {
            let device = cpal::default_host()
                .default_output_device()
                .ok_or_else(|| anyhow!("no audio output device"))?;
            let supported = device.default_output_config()?;
            if supported.sample_format() != cpal::SampleFormat::F32 {
                bail!("unsupported sample format {:?}", supported.sample_format());
            }

            let config: cpal::StreamConfig = supported.into();
            let sample_rate = config.sample_rate.0 as f32;
            let channels = config.channels as usize;
            let step = tone.frequency_hz as f32 / sample_rate;
            let mut phase = 0.0f32;

            let stream = device.build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    for frame in data.chunks_mut(channels) {
                        let value = (phase * std::f32::consts::TAU).sin() * AMPLITUDE;
                        phase = (phase + step) % 1.0;
                        for sample in frame.iter_mut() {
                            *sample = value;
                        }
                    }
                },
                |err| warn!("Audio stream error: {}", err),
                None,
            )?;

            stream.play()?;
            std::thread::sleep(Duration::from_millis(tone.duration_ms));
            Ok(())
        }
    }
}

/// Pick a backend. Asking for a speaker without one falls back to console.
pub fn select_backend(kind: BackendKind) -> Arc<dyn SoundBackend> {
    match kind {
        BackendKind::Silent => Arc::new(SilentBackend),
        BackendKind::Console => Arc::new(ConsoleBackend),
        BackendKind::Auto | BackendKind::Speaker => speaker_or_console(kind),
    }
}

#[cfg(feature = "audio")]
fn speaker_or_console(kind: BackendKind) -> Arc<dyn SoundBackend> {
    if SpeakerBackend::is_available() {
        return Arc::new(SpeakerBackend);
    }
    if kind == BackendKind::Speaker {
        warn!("No audio output device, using console alerts");
    }
    Arc::new(ConsoleBackend)
}

#[cfg(not(feature = "audio"))]
fn speaker_or_console(kind: BackendKind) -> Arc<dyn SoundBackend> {
    if kind == BackendKind::Speaker {
        warn!("Built without the `audio` feature, using console alerts");
    }
    Arc::new(ConsoleBackend)
}

/// Fire-and-forget handle held by the frame loop.
pub struct AlertNotifier {
    tx: mpsc::UnboundedSender<AlertKind>,
}

impl AlertNotifier {
    /// Start the drain task. Must be called inside a tokio runtime.
    ///
    /// The task ends once every `AlertNotifier` handle is dropped and the
    /// queue is empty.
    pub fn spawn(backend: Arc<dyn SoundBackend>) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<AlertKind>();
        info!("Alert sounds via {} backend", backend.name());

        let handle = tokio::spawn(async move {
            while let Some(kind) = rx.recv().await {
                let tone = kind.tone();
                let backend = backend.clone();
                match tokio::task::spawn_blocking(move || backend.play(tone)).await {
                    Ok(Ok(())) => debug!("Played {} cue", kind),
                    Ok(Err(e)) => warn!("Alert sound for {} failed: {}", kind, e),
                    Err(e) => warn!("Alert sound task for {} aborted: {}", kind, e),
                }
            }
            debug!("Notifier queue closed");
        });

        (Self { tx }, handle)
    }

    pub fn notify(&self, kind: AlertKind) {
        if self.tx.send(kind).is_err() {
            debug!("Notifier task gone, dropping {} cue", kind);
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{FailingBackend, RecordingBackend};
    use super::*;

    #[test]
    fn test_tone_table() {
        assert_eq!(AlertKind::LeftLaneDeparture.tone().frequency_hz, 800);
        assert_eq!(AlertKind::RightLaneDeparture.tone().frequency_hz, 600);
        assert_eq!(AlertKind::MotionDetected.tone().frequency_hz, 1000);
        assert_eq!(AlertKind::LeftLaneDeparture.tone().duration_ms, 200);
        assert_eq!(AlertKind::MotionDetected.tone().duration_ms, 100);
    }

    #[test]
    fn test_select_backend() {
        assert_eq!(select_backend(BackendKind::Silent).name(), "silent");
        assert_eq!(select_backend(BackendKind::Console).name(), "console");
    }

    #[tokio::test]
    async fn test_notifier_plays_in_order() {
        let backend = Arc::new(RecordingBackend::default());
        let (notifier, handle) = AlertNotifier::spawn(backend.clone());

        notifier.notify(AlertKind::LeftLaneDeparture);
        notifier.notify(AlertKind::MotionDetected);
        drop(notifier);
        handle.await.unwrap();

        let played = backend.played.lock().unwrap();
        assert_eq!(
            *played,
            vec![
                AlertKind::LeftLaneDeparture.tone(),
                AlertKind::MotionDetected.tone()
            ]
        );
    }

    #[tokio::test]
    async fn test_backend_failure_is_contained() {
        let (notifier, handle) = AlertNotifier::spawn(Arc::new(FailingBackend));
        notifier.notify(AlertKind::RightLaneDeparture);
        notifier.notify(AlertKind::RightLaneDeparture);
        drop(notifier);
        assert!(handle.await.is_ok());
    }

    #[tokio::test]
    async fn test_notify_after_task_exit_does_not_panic() {
        let (notifier, handle) = AlertNotifier::spawn(Arc::new(SilentBackend));
        handle.abort();
        let _ = handle.await;
        notifier.notify(AlertKind::MotionDetected);
    }
}
