use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

/// Short audible cues for hands-free mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cue {
    /// Mode became active: rising 500 -> 1000 Hz.
    Enter,
    /// Mode turned off: falling 1000 -> 500 Hz.
    Exit,
    /// Pinch click: a brief 1200 Hz tick.
    Click,
}

impl Cue {
    fn sweep(&self) -> (f32, f32) {
        match self {
            Cue::Enter => (500.0, 1000.0),
            Cue::Exit => (1000.0, 500.0),
            Cue::Click => (1200.0, 1200.0),
        }
    }

    fn duration(&self) -> Duration {
        match self {
            Cue::Click => Duration::from_millis(40),
            _ => Duration::from_millis(140),
        }
    }
}

/// Play a cue. Spawns a thread and returns immediately.
pub fn play_cue(cue: Cue) {
    std::thread::spawn(move || {
        if let Err(e) = play_blocking(cue) {
            log::warn!("Audio cue failed: {e}");
        }
    });
}

/// Mono samples for `cue`: a linear frequency sweep under a fading envelope.
fn cue_samples(cue: Cue, sample_rate: f32) -> Vec<f32> {
    let total = (sample_rate * cue.duration().as_secs_f32()) as usize;
    let (start, end) = cue.sweep();
    let mut phase = 0.0_f32;
    (0..total)
        .map(|i| {
            let progress = i as f32 / total as f32;
            let freq = start + (end - start) * progress;
            phase += std::f32::consts::TAU * freq / sample_rate;
            phase.sin() * (1.0 - progress) * 0.25
        })
        .collect()
}

fn play_blocking(cue: Cue) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or("No output device found")?;
    let config = device.default_output_config()?;
    let channels = config.channels() as usize;
    let samples = Arc::new(cue_samples(cue, config.sample_rate() as f32));

    let position = Arc::new(AtomicUsize::new(0));
    let stream_samples = samples.clone();
    let stream_position = position.clone();

    let stream = device.build_output_stream(
        &config.into(),
        move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
            let mut idx = stream_position.load(Ordering::Relaxed);
            for frame in data.chunks_mut(channels) {
                let value = stream_samples.get(idx).copied().unwrap_or(0.0);
                frame.fill(value);
                idx += 1;
            }
            stream_position.store(idx, Ordering::Relaxed);
        },
        |err| log::error!("Audio output error: {err}"),
        None,
    )?;

    stream.play()?;
    std::thread::sleep(cue.duration() + Duration::from_millis(60));
    drop(stream);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn click_is_shorter_than_mode_cues() {
        let click = cue_samples(Cue::Click, 48_000.0);
        let enter = cue_samples(Cue::Enter, 48_000.0);
        assert!((1900..=1920).contains(&click.len()));
        assert!(enter.len() > click.len());
    }

    #[test]
    fn samples_stay_quiet() {
        let samples = cue_samples(Cue::Exit, 44_100.0);
        assert!(samples.iter().all(|s| s.abs() <= 0.25));
    }
}
