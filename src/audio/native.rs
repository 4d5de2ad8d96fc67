//! Speaker output via cpal, decoding synthesized clips with symphonia.

use std::io::Cursor;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use cpal::StreamConfig;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tracing::{error, info};

use super::{AudioEngine, AudioHandle};
use crate::config::PlaybackConfig;
use crate::error::{MeetingError, Result};

/// Plays clips on a cpal output device.
pub struct CpalEngine {
    device: cpal::Device,
    stream_config: StreamConfig,
}

impl std::fmt::Debug for CpalEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CpalEngine")
            .field("sample_rate", &self.stream_config.sample_rate)
            .finish()
    }
}

impl CpalEngine {
    /// Open the configured (or default) output device.
    ///
    /// # Errors
    ///
    /// Returns [`MeetingError::Playback`] if no matching device exists.
    pub fn new(config: &PlaybackConfig) -> Result<Self> {
        let host = cpal::default_host();

        let device = if let Some(ref name) = config.output_device {
            host.output_devices()
                .map_err(|e| MeetingError::Playback(format!("cannot enumerate devices: {e}")))?
                .find(|d| {
                    d.description()
                        .ok()
                        .is_some_and(|desc| desc.name() == name)
                })
                .ok_or_else(|| MeetingError::Playback(format!("output device '{name}' not found")))?
        } else {
            host.default_output_device()
                .ok_or_else(|| MeetingError::Playback("no default output device".into()))?
        };

        let device_name = device
            .description()
            .map(|d| d.name().to_owned())
            .unwrap_or_else(|_| "<unknown>".into());
        info!("using output device: {device_name}");

        Ok(Self {
            device,
            stream_config: StreamConfig {
                channels: 1,
                sample_rate: config.output_sample_rate,
                buffer_size: cpal::BufferSize::Default,
            },
        })
    }

    /// Names of the available output devices.
    ///
    /// # Errors
    ///
    /// Returns an error if devices cannot be enumerated.
    pub fn list_output_devices() -> Result<Vec<String>> {
        let host = cpal::default_host();
        let devices = host
            .output_devices()
            .map_err(|e| MeetingError::Playback(format!("cannot enumerate devices: {e}")))?;
        Ok(devices
            .filter_map(|d| d.description().ok().map(|desc| desc.name().to_owned()))
            .collect())
    }
}

impl AudioEngine for CpalEngine {
    type Handle = CpalHandle;

    fn load(&self, audio: Bytes) -> Result<CpalHandle> {
        let (samples, native_rate) = decode_to_mono_f32(audio)?;
        let rate = self.stream_config.sample_rate;
        let samples = resample_linear_mono(&samples, native_rate, rate);
        let buffer = Arc::new(Mutex::new(ClipBuffer {
            samples,
            position: 0,
            playing: false,
        }));

        let shared = Arc::clone(&buffer);
        let stream = self
            .device
            .build_output_stream(
                &self.stream_config,
                move |data: &mut [f32], _info: &cpal::OutputCallbackInfo| {
                    let Ok(mut buf) = shared.lock() else {
                        return;
                    };
                    for sample in data.iter_mut() {
                        *sample = if buf.playing && buf.position < buf.samples.len() {
                            let s = buf.samples[buf.position];
                            buf.position += 1;
                            s
                        } else {
                            0.0
                        };
                    }
                },
                move |err| {
                    error!("audio output stream error: {err}");
                },
                None,
            )
            .map_err(|e| MeetingError::Playback(format!("failed to build output stream: {e}")))?;

        Ok(CpalHandle {
            stream: Some(stream),
            buffer,
            sample_rate: rate,
        })
    }
}

struct ClipBuffer {
    samples: Vec<f32>,
    position: usize,
    playing: bool,
}

/// A decoded clip bound to an output stream.
pub struct CpalHandle {
    stream: Option<cpal::Stream>,
    buffer: Arc<Mutex<ClipBuffer>>,
    sample_rate: u32,
}

impl CpalHandle {
    fn with_buffer<T>(&self, f: impl FnOnce(&mut ClipBuffer) -> T) -> T {
        let mut buf = self.buffer.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut buf)
    }

    fn samples_to_duration(&self, samples: usize) -> Duration {
        Duration::from_secs_f64(samples as f64 / f64::from(self.sample_rate.max(1)))
    }
}

impl AudioHandle for CpalHandle {
    fn play(&mut self) -> Result<()> {
        let stream = self
            .stream
            .as_ref()
            .ok_or_else(|| MeetingError::Playback("clip already released".into()))?;
        self.with_buffer(|b| b.playing = true);
        stream
            .play()
            .map_err(|e| MeetingError::Playback(format!("failed to start output stream: {e}")))
    }

    fn pause(&mut self) -> Result<()> {
        self.with_buffer(|b| b.playing = false);
        if let Some(stream) = &self.stream {
            stream
                .pause()
                .map_err(|e| MeetingError::Playback(format!("failed to pause output stream: {e}")))?;
        }
        Ok(())
    }

    fn release(&mut self) {
        self.with_buffer(|b| {
            b.playing = false;
            b.position = 0;
        });
        // Dropping the stream closes the device.
        self.stream = None;
    }

    fn position(&self) -> Duration {
        let position = self.with_buffer(|b| b.position);
        self.samples_to_duration(position)
    }

    fn duration(&self) -> Option<Duration> {
        let len = self.with_buffer(|b| b.samples.len());
        Some(self.samples_to_duration(len))
    }

    fn is_finished(&self) -> bool {
        self.stream.is_some() && self.with_buffer(|b| b.position >= b.samples.len())
    }
}

fn decode_to_mono_f32(audio: Bytes) -> Result<(Vec<f32>, u32)> {
    use symphonia::core::audio::SampleBuffer;
    use symphonia::core::codecs::DecoderOptions;
    use symphonia::core::errors::Error as SymphError;
    use symphonia::core::formats::FormatOptions;
    use symphonia::core::io::MediaSourceStream;
    use symphonia::core::meta::MetadataOptions;
    use symphonia::core::probe::Hint;

    let mss = MediaSourceStream::new(Box::new(Cursor::new(audio.to_vec())), Default::default());
    let probed = symphonia::default::get_probe()
        .format(
            &Hint::new(),
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| MeetingError::Playback(format!("failed to probe audio: {e}")))?;

    let mut format = probed.format;
    let track = format
        .default_track()
        .ok_or_else(|| MeetingError::Playback("no default audio track".into()))?;
    let track_id = track.id;
    let codec_params = track.codec_params.clone();
    let rate = codec_params
        .sample_rate
        .ok_or_else(|| MeetingError::Playback("unknown sample rate".into()))?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(|e| MeetingError::Playback(format!("failed to create decoder: {e}")))?;

    let mut out: Vec<f32> = Vec::new();
    let mut sample_buf: Option<SampleBuffer<f32>> = None;

    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(SymphError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(MeetingError::Playback(format!("audio read error: {e}"))),
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(SymphError::DecodeError(_)) => continue,
            Err(e) => return Err(MeetingError::Playback(format!("audio decode error: {e}"))),
        };

        let spec = *decoded.spec();
        let channels = spec.channels.count();
        let frames = decoded.frames() as u64;
        let required = usize::try_from(frames)
            .unwrap_or(usize::MAX)
            .saturating_mul(channels);
        let reusable = sample_buf
            .as_ref()
            .is_some_and(|b| b.capacity() >= required);
        if !reusable {
            sample_buf = Some(SampleBuffer::<f32>::new(frames, spec));
        }
        let Some(buf) = sample_buf.as_mut() else {
            continue;
        };
        buf.clear();
        buf.copy_interleaved_ref(decoded);

        let data = buf.samples();
        if channels <= 1 {
            out.extend_from_slice(data);
        } else {
            out.extend(
                data.chunks_exact(channels)
                    .map(|frame| frame.iter().sum::<f32>() / channels as f32),
            );
        }
    }

    if out.is_empty() {
        return Err(MeetingError::Playback("decoded clip is empty".into()));
    }
    Ok((out, rate))
}

fn resample_linear_mono(input: &[f32], from_sr: u32, to_sr: u32) -> Vec<f32> {
    if input.is_empty() || from_sr == to_sr || from_sr == 0 {
        return input.to_vec();
    }
    let ratio = f64::from(to_sr) / f64::from(from_sr);
    let out_len = (input.len() as f64 * ratio).round() as usize;
    let last = input.len() - 1;
    (0..out_len)
        .map(|i| {
            let src = i as f64 / ratio;
            let i0 = (src.floor() as usize).min(last);
            let i1 = (i0 + 1).min(last);
            let t = (src - i0 as f64) as f32;
            input[i0] * (1.0 - t) + input[i1] * t
        })
        .collect()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn resample_preserves_length_ratio() {
        let input: Vec<f32> = (0..100).map(|i| i as f32 / 100.0).collect();
        let out = resample_linear_mono(&input, 16_000, 24_000);
        assert_eq!(out.len(), 150);
        assert!((out[0] - input[0]).abs() < f32::EPSILON);
        assert_eq!(resample_linear_mono(&input, 24_000, 24_000), input);
    }

    #[test]
    fn garbage_bytes_do_not_decode() {
        let err = decode_to_mono_f32(Bytes::from_static(b"not audio")).unwrap_err();
        assert!(matches!(err, MeetingError::Playback(_)));
    }
}
