//! # Audio Capture Module
//!
//! Real-time microphone capture using CPAL (Cross-Platform Audio Library).
//! Incoming audio is downmixed to mono, cut into fixed-size frames and
//! streamed to the session worker over a bounded channel.

use crate::config::CaptureConfig;
use anyhow::{Result, anyhow};
use cpal::SupportedStreamConfigRange;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::Sender;

/// Starts audio capture from the default input device.
///
/// # Arguments
/// * `config` - Target sample rate and frame size
/// * `sender` - Channel to the analysis thread; frames are dropped when it is full
///
/// # Returns
/// * `Ok((stream, sample_rate))` - Stream handle (capture stops when dropped) and the actual sample rate
/// * `Err(e)` - No input device or no 32-bit float input format
pub fn start_audio_capture(
    config: &CaptureConfig,
    sender: Sender<Vec<f32>>,
) -> Result<(cpal::Stream, u32)> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| anyhow!("No input device available"))?;

    log::info!("Using audio input device: {}", device.name()?);

    let configs = device.supported_input_configs()?.collect::<Vec<_>>();
    let supported_config = find_supported_config(configs, config.sample_rate)
        .ok_or_else(|| anyhow!("No suitable f32 input format found"))?;

    let rate = config.sample_rate.clamp(
        supported_config.min_sample_rate().0,
        supported_config.max_sample_rate().0,
    );
    let stream_config: cpal::StreamConfig =
        supported_config.with_sample_rate(cpal::SampleRate(rate)).into();
    let channels = stream_config.channels.max(1) as usize;

    log::info!("Selected sample rate: {} Hz, {} channel(s)", rate, channels);

    let frame_size = config.frame_size;
    let err_fn = |err| log::error!("An error occurred on the audio stream: {}", err);

    // This buffer accumulates mono samples across callbacks.
    let mut audio_buffer: Vec<f32> = Vec::with_capacity(frame_size * 2);

    let stream = device.build_input_stream(
        &stream_config,
        move |data: &[f32], _: &cpal::InputCallbackInfo| {
            if channels == 1 {
                audio_buffer.extend_from_slice(data);
            } else {
                audio_buffer.extend(
                    data.chunks(channels)
                        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32),
                );
            }

            while audio_buffer.len() >= frame_size {
                let frame_to_send = audio_buffer[..frame_size].to_vec();
                if sender.try_send(frame_to_send).is_err() {
                    log::trace!("Analysis channel full, dropping frame");
                }
                audio_buffer.drain(..frame_size);
            }
        },
        err_fn,
        None,
    )?;

    stream.play()?;

    Ok((stream, rate))
}

/// Picks the f32 input configuration closest to `target_rate`, preferring mono.
fn find_supported_config(
    configs: Vec<SupportedStreamConfigRange>,
    target_rate: u32,
) -> Option<SupportedStreamConfigRange> {
    configs
        .into_iter()
        .filter(|c| c.sample_format() == cpal::SampleFormat::F32)
        .min_by_key(|c| {
            let rate_distance = if (c.min_sample_rate().0..=c.max_sample_rate().0).contains(&target_rate) {
                0
            } else {
                let min_diff = (c.min_sample_rate().0 as i64 - target_rate as i64).abs();
                let max_diff = (c.max_sample_rate().0 as i64 - target_rate as i64).abs();
                min_diff.min(max_diff)
            };
            (c.channels() != 1, rate_distance)
        })
}
