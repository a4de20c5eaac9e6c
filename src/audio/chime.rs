use std::f32::consts::PI;
use std::time::Duration;

const BASE_FREQ: f32 = 528.0;
const LENGTH_SECS: f32 = 4.0;

/// One sine voice whose pitch and gain glide exponentially between two values
/// over its lifetime.
#[derive(Debug, Clone)]
struct Partial {
    start: f32,
    end: f32,
    freq_from: f32,
    freq_to: f32,
    gain_from: f32,
    gain_to: f32,
    phase: f32,
}

impl Partial {
    fn sample(&mut self, t: f32, sample_rate: f32) -> f32 {
        if t < self.start || t >= self.end {
            return 0.0;
        }
        let x = (t - self.start) / (self.end - self.start);
        let freq = self.freq_from * (self.freq_to / self.freq_from).powf(x);
        let gain = self.gain_from * (self.gain_to / self.gain_from).powf(x);

        let value = self.phase.sin() * gain;
        self.phase = (self.phase + 2.0 * PI * freq / sample_rate) % (2.0 * PI);
        value
    }
}

/// Completion chime: a 528 Hz bell with an octave and a fifth above it,
/// each decaying to silence within four seconds.
pub struct Chime {
    sample_rate: u32,
    num_sample: usize,
    partials: [Partial; 3],
}

impl Chime {
    pub fn new() -> Self {
        Self {
            sample_rate: 44100,
            num_sample: 0,
            partials: [
                Partial {
                    start: 0.0,
                    end: 4.0,
                    freq_from: BASE_FREQ,
                    freq_to: BASE_FREQ * 0.9,
                    gain_from: 0.12,
                    gain_to: 0.001,
                    phase: 0.0,
                },
                Partial {
                    start: 0.0,
                    end: 3.0,
                    freq_from: BASE_FREQ * 2.0,
                    freq_to: BASE_FREQ * 1.8,
                    gain_from: 0.06,
                    gain_to: 0.001,
                    phase: 0.0,
                },
                Partial {
                    start: 0.05,
                    end: 2.5,
                    freq_from: BASE_FREQ * 1.5,
                    freq_to: BASE_FREQ * 1.5,
                    gain_from: 0.04,
                    gain_to: 0.001,
                    phase: 0.0,
                },
            ],
        }
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs_f32(LENGTH_SECS)
    }

    fn total_samples(&self) -> usize {
        (LENGTH_SECS * self.sample_rate as f32) as usize
    }
}

impl Default for Chime {
    fn default() -> Self {
        Self::new()
    }
}

impl Iterator for Chime {
    type Item = f32;

    fn next(&mut self) -> Option<Self::Item> {
        if self.num_sample >= self.total_samples() {
            return None;
        }
        let sample_rate = self.sample_rate as f32;
        let t = self.num_sample as f32 / sample_rate;
        self.num_sample += 1;

        Some(
            self.partials
                .iter_mut()
                .map(|partial| partial.sample(t, sample_rate))
                .sum(),
        )
    }
}

#[cfg(feature = "audio")]
impl rodio::Source for Chime {
    fn current_frame_len(&self) -> Option<usize> {
        Some(self.total_samples().saturating_sub(self.num_sample))
    }

    fn channels(&self) -> u16 {
        1 // Mono
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn total_duration(&self) -> Option<Duration> {
        Some(self.duration())
    }
}
