//! Completion alarm
//!
//! Plays a short cue through the default output device using CPAL. Playback
//! runs on its own thread and every failure is logged and dropped, so a
//! missing sound card never affects the countdown.

use crate::conf::AlarmKind;
use crate::countdown::CompletionNotifier;
use anyhow::{Context, Result, anyhow, bail};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, FromSample, Sample, SampleFormat, SizedSample, StreamConfig};
use hound::WavReader;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Mono PCM audio normalized to [-1.0, 1.0]
#[derive(Debug, Clone, PartialEq)]
pub struct Clip {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl Clip {
    /// Decode a WAV file, mixing all channels down to mono
    pub fn from_wav<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut reader = WavReader::open(path)
            .with_context(|| format!("Failed to open sound file: {}", path.display()))?;
        let spec = reader.spec();

        let interleaved: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .samples::<f32>()
                .collect::<Result<_, _>>()
                .context("Failed to decode float samples")?,
            hound::SampleFormat::Int => {
                let scale = (1i64 << (spec.bits_per_sample.max(1) - 1)) as f32;
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|v| v as f32 / scale))
                    .collect::<Result<_, _>>()
                    .context("Failed to decode integer samples")?
            }
        };

        let channels = usize::from(spec.channels.max(1));
        let samples = interleaved
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect();

        Ok(Self {
            samples,
            sample_rate: spec.sample_rate,
        })
    }

    /// Three short 880 Hz beeps
    pub fn chime() -> Self {
        const SAMPLE_RATE: u32 = 44_100;
        const FREQUENCY: f32 = 880.0;
        const BEEP: Duration = Duration::from_millis(150);
        const GAP: Duration = Duration::from_millis(100);

        let beep_len = (SAMPLE_RATE as f32 * BEEP.as_secs_f32()) as usize;
        let gap_len = (SAMPLE_RATE as f32 * GAP.as_secs_f32()) as usize;

        let mut samples = Vec::with_capacity(3 * (beep_len + gap_len));
        for _ in 0..3 {
            for i in 0..beep_len {
                let t = i as f32 / SAMPLE_RATE as f32;
                // Linear decay to avoid clicks at the tail
                let envelope = 1.0 - i as f32 / beep_len as f32;
                samples.push(0.5 * envelope * (2.0 * std::f32::consts::PI * FREQUENCY * t).sin());
            }
            samples.extend(std::iter::repeat_n(0.0, gap_len));
        }

        Self {
            samples,
            sample_rate: SAMPLE_RATE,
        }
    }

    /// Nearest-sample conversion to another rate
    pub fn resample(&self, target_rate: u32) -> Self {
        if target_rate == self.sample_rate || self.sample_rate == 0 || self.samples.is_empty() {
            return Self {
                samples: self.samples.clone(),
                sample_rate: target_rate,
            };
        }

        let ratio = self.sample_rate as f64 / target_rate as f64;
        let len = (self.samples.len() as f64 / ratio).round() as usize;
        let last = self.samples.len() - 1;
        let samples = (0..len)
            .map(|i| self.samples[((i as f64 * ratio) as usize).min(last)])
            .collect();

        Self {
            samples,
            sample_rate: target_rate,
        }
    }

    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.samples.len() as f64 / self.sample_rate as f64)
    }
}

/// How the end of a countdown is announced
#[derive(Debug)]
pub enum Alarm {
    Sound {
        clip: Clip,
        playback: Mutex<Option<JoinHandle<()>>>,
    },
    Bell,
    Silent,
}

impl Alarm {
    /// Build the alarm, falling back to the built-in chime if the file is unusable
    pub fn from_settings(kind: AlarmKind, sound: Option<&Path>) -> Self {
        match kind {
            AlarmKind::Silent => Alarm::Silent,
            AlarmKind::Bell => Alarm::Bell,
            AlarmKind::Sound => {
                let clip = match sound {
                    Some(path) => Clip::from_wav(path).unwrap_or_else(|e| {
                        log::warn!("{:#}, using built-in chime", e);
                        Clip::chime()
                    }),
                    None => Clip::chime(),
                };
                Alarm::Sound {
                    clip,
                    playback: Mutex::new(None),
                }
            }
        }
    }
}

impl CompletionNotifier for Alarm {
    fn notify(&self) -> Result<()> {
        match self {
            Alarm::Sound { clip, playback } => {
                let clip = clip.clone();
                let handle = thread::Builder::new()
                    .name("alarm".to_string())
                    .spawn(move || {
                        if let Err(e) = play_blocking(&clip) {
                            log::warn!("Failed to play alarm: {:#}", e);
                        }
                    })
                    .context("Failed to spawn alarm thread")?;
                if let Ok(mut playback) = playback.lock() {
                    *playback = Some(handle);
                }
                Ok(())
            }
            Alarm::Bell => {
                let mut stdout = std::io::stdout();
                stdout.write_all(b"\x07")?;
                stdout.flush()?;
                Ok(())
            }
            Alarm::Silent => Ok(()),
        }
    }

    fn wait(&self) {
        let Alarm::Sound { playback, .. } = self else {
            return;
        };

        let handle = playback.lock().ok().and_then(|mut playback| playback.take());
        if let Some(handle) = handle
            && handle.join().is_err()
        {
            log::warn!("Alarm playback thread panicked");
        }
    }
}

/// Play a clip on the default output device and wait for it to finish
fn play_blocking(clip: &Clip) -> Result<()> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| anyhow!("No default output device found"))?;

    let supported = device.default_output_config()?;
    let sample_format = supported.sample_format();
    let config: StreamConfig = supported.into();
    let clip = clip.resample(config.sample_rate.0);
    let duration = clip.duration();

    let stream = match sample_format {
        SampleFormat::F32 => build_stream::<f32>(&device, &config, clip)?,
        SampleFormat::I16 => build_stream::<i16>(&device, &config, clip)?,
        SampleFormat::U16 => build_stream::<u16>(&device, &config, clip)?,
        other => bail!("Unsupported output sample format: {:?}", other),
    };

    stream.play()?;
    thread::sleep(duration + Duration::from_millis(100));

    Ok(())
}

fn build_stream<T>(device: &Device, config: &StreamConfig, clip: Clip) -> Result<cpal::Stream>
where
    T: SizedSample + FromSample<f32>,
{
    let channels = usize::from(config.channels.max(1));
    let mut position = 0;

    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            for frame in data.chunks_mut(channels) {
                let value = clip.samples.get(position).copied().unwrap_or(0.0);
                position += 1;
                for sample in frame.iter_mut() {
                    *sample = T::from_sample(value);
                }
            }
        },
        |err| log::warn!("Alarm output stream error: {}", err),
        None,
    )?;

    Ok(stream)
}
