use cpal::traits::{ DeviceTrait, HostTrait, StreamTrait };
use cpal::{ Device, StreamConfig };
use log::{ debug, error, info, warn };
use std::sync::mpsc;
use std::time::Duration;
use tokio::sync::oneshot;

use super::player::{ AudioBackend, OutputContext, PlaybackHandle };
use super::{ PcmClip, PlaybackError };

/// Extra time a stream is kept alive past the clip length before giving up
/// on the drain signal.
const DRAIN_GRACE: Duration = Duration::from_secs(2);

/// Default output device of the default cpal host.
pub struct CpalBackend;

impl AudioBackend for CpalBackend {
    type Context = CpalContext;

    fn create_context(&self) -> Result<CpalContext, PlaybackError> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| PlaybackError::Device("No output device available".into()))?;

        info!("Using output device: {}", device.name().unwrap_or_else(|_| "Unknown".to_string()));

        let config: StreamConfig = device
            .default_output_config()
            .map_err(|e| PlaybackError::Device(format!("Failed to get output config: {}", e)))?
            .into();

        Ok(CpalContext { device, config })
    }
}

pub struct CpalContext {
    device: Device,
    config: StreamConfig,
}

impl OutputContext for CpalContext {
    fn start(&mut self, clip: PcmClip) -> Result<PlaybackHandle, PlaybackError> {
        let duration = clip.duration();
        let device_rate = self.config.sample_rate.0;
        let samples = clip.resampled(device_rate).into_samples();
        let device = self.device.clone();
        let config = self.config.clone();

        let (started_tx, started_rx) = mpsc::channel::<Result<(), PlaybackError>>();
        let (done_tx, done_rx) = oneshot::channel();

        // cpal streams are not Send, so each clip's stream lives on its own
        // thread until the buffer drains.
        std::thread::spawn(move || {
            let channels = config.channels as usize;
            let (drained_tx, drained_rx) = mpsc::channel::<()>();
            let mut cursor = 0usize;
            let mut drained_tx = Some(drained_tx);

            let stream = device.build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    for frame in data.chunks_mut(channels) {
                        let sample = samples.get(cursor).copied().unwrap_or(0.0);
                        frame.fill(sample);
                        cursor += 1;
                    }
                    if cursor >= samples.len() {
                        if let Some(tx) = drained_tx.take() {
                            let _ = tx.send(());
                        }
                    }
                },
                |err| {
                    error!("Audio output stream error: {}", err);
                },
                None
            );

            let stream = match stream {
                Ok(stream) => stream,
                Err(e) => {
                    let _ = started_tx.send(
                        Err(PlaybackError::Stream(format!("Failed to build output stream: {}", e)))
                    );
                    return;
                }
            };
            if let Err(e) = stream.play() {
                let _ = started_tx.send(
                    Err(PlaybackError::Stream(format!("Failed to start output stream: {}", e)))
                );
                return;
            }
            let _ = started_tx.send(Ok(()));

            if drained_rx.recv_timeout(duration + DRAIN_GRACE).is_err() {
                warn!("Audio stream did not report completion; stopping after {:?}", duration);
            }
            drop(stream);
            debug!("Audio clip finished");
            let _ = done_tx.send(());
        });

        match started_rx.recv() {
            Ok(Ok(())) => Ok(PlaybackHandle::with_signal(duration, done_rx)),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(PlaybackError::Stream("playback thread exited early".into())),
        }
    }
}
