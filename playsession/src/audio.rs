//! cpal-backed audio sink pulling from the core's [`AudioRingBuffer`].

use crate::error::{Error, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use playsession_core::audio_ring::AudioRingBuffer;
use std::sync::Arc;

/// The ring always carries interleaved, little-endian 16-bit PCM at this
/// rate/channel count (spec §4.4); the device's own native format is
/// negotiated separately and the callback converts on the way out.
const TARGET_SAMPLE_RATE: u32 = 48_000;
const TARGET_CHANNELS: u16 = 2;

/// Owns the output stream; dropping this stops playback.
pub struct AudioPlayer {
    stream: cpal::Stream,
    sample_rate: u32,
}

impl AudioPlayer {
    /// Opens the default output device and starts pulling bytes from `ring`
    /// as interleaved stereo 16-bit PCM, converting to whatever sample
    /// format the device actually wants.
    pub fn new(ring: Arc<AudioRingBuffer>) -> Result<Self> {
        let host = cpal::default_host();
        let device = host.default_output_device().ok_or_else(|| Error::AudioUnavailable("no default output device".into()))?;
        let (stream_config, sample_format) = choose_config(&device)?;
        let sample_rate = stream_config.sample_rate.0;

        let stream = build_stream(&device, &stream_config, sample_format, ring)?;
        stream.play().map_err(|err| Error::AudioUnavailable(err.to_string()))?;
        Ok(Self { stream, sample_rate })
    }

    pub const fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn pause(&self) -> Result<()> {
        self.stream.pause().map_err(|err| Error::AudioUnavailable(err.to_string()))
    }

    pub fn resume(&self) -> Result<()> {
        self.stream.play().map_err(|err| Error::AudioUnavailable(err.to_string()))
    }
}

/// Picks a stereo output configuration closest to [`TARGET_SAMPLE_RATE`],
/// falling back to whatever sample rate the device's stereo range supports.
fn choose_config(device: &cpal::Device) -> Result<(cpal::StreamConfig, cpal::SampleFormat)> {
    let desired_rate = cpal::SampleRate(TARGET_SAMPLE_RATE);
    let mut configs = device.supported_output_configs().map_err(|err| Error::AudioUnavailable(err.to_string()))?;
    let chosen = configs
        .find(|range| range.channels() == TARGET_CHANNELS && range.min_sample_rate() <= desired_rate && range.max_sample_rate() >= desired_rate)
        .map(|range| range.with_sample_rate(desired_rate))
        .or_else(|| {
            device.supported_output_configs().ok().and_then(|mut configs| {
                configs.find(|range| range.channels() == TARGET_CHANNELS).map(|range| {
                    let rate = desired_rate.clamp(range.min_sample_rate(), range.max_sample_rate());
                    range.with_sample_rate(rate)
                })
            })
        })
        .ok_or_else(|| Error::AudioUnavailable("no stereo output configuration available".into()))?;
    let sample_format = chosen.sample_format();
    Ok((chosen.into(), sample_format))
}

fn build_stream(device: &cpal::Device, config: &cpal::StreamConfig, sample_format: cpal::SampleFormat, ring: Arc<AudioRingBuffer>) -> Result<cpal::Stream> {
    use cpal::SampleFormat;
    match sample_format {
        SampleFormat::I8 => make_stream::<i8>(device, config, ring),
        SampleFormat::I16 => make_stream::<i16>(device, config, ring),
        SampleFormat::I32 => make_stream::<i32>(device, config, ring),
        SampleFormat::I64 => make_stream::<i64>(device, config, ring),
        SampleFormat::U8 => make_stream::<u8>(device, config, ring),
        SampleFormat::U16 => make_stream::<u16>(device, config, ring),
        SampleFormat::U32 => make_stream::<u32>(device, config, ring),
        SampleFormat::U64 => make_stream::<u64>(device, config, ring),
        SampleFormat::F32 => make_stream::<f32>(device, config, ring),
        SampleFormat::F64 => make_stream::<f64>(device, config, ring),
        other => Err(Error::AudioUnavailable(format!("unsupported sample format {other}"))),
    }
}

/// Generic over the device's native sample type; `T` only needs to know how
/// to convert from the `i16` the ring always carries.
fn make_stream<T>(device: &cpal::Device, config: &cpal::StreamConfig, ring: Arc<AudioRingBuffer>) -> Result<cpal::Stream>
where
    T: cpal::SizedSample + cpal::FromSample<i16>,
{
    let mut scratch = Vec::new();
    device
        .build_output_stream(
            config,
            move |data: &mut [T], _info: &cpal::OutputCallbackInfo| {
                let bytes_needed = data.len() * 2;
                if scratch.len() < bytes_needed {
                    scratch.resize(bytes_needed, 0);
                }
                let filled = ring.read(&mut scratch[..bytes_needed]);
                for (i, sample) in data.iter_mut().enumerate() {
                    let offset = i * 2;
                    let value = if offset + 1 < filled { i16::from_le_bytes([scratch[offset], scratch[offset + 1]]) } else { 0 };
                    *sample = T::from_sample(value);
                }
            },
            |err| tracing::error!("audio stream error: {err}"),
            None,
        )
        .map_err(|err| Error::AudioUnavailable(err.to_string()))
}

/// Encodes interleaved `i16` samples as little-endian bytes for the ring.
pub fn samples_to_bytes(samples: &[i16]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for sample in samples {
        bytes.extend_from_slice(&sample.to_le_bytes());
    }
    bytes
}
