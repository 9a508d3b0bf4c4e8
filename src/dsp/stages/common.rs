use std::f32::consts::{PI, TAU};

/// Convert decibels to linear amplitude.
#[inline]
pub fn db_to_lin(db: f32) -> f32 {
    10f32.powf(db / 20.0)
}

/// Map a normalised `0..=1` value onto a logarithmic frequency range.
#[inline]
pub fn map_to_log10(normalised: f32, min: f32, max: f32) -> f32 {
    min * (max / min).powf(normalised.clamp(0.0, 1.0))
}

/// Inverse of [`map_to_log10`].
#[inline]
pub fn map_from_log10(value: f32, min: f32, max: f32) -> f32 {
    ((value.clamp(min, max) / min).ln() / (max / min).ln()).clamp(0.0, 1.0)
}

/// Highest frequency a filter is driven at, keeping designs clear of Nyquist.
#[inline]
pub fn max_filter_freq(sample_rate: f32) -> f32 {
    (sample_rate * 0.49).min(20_000.0)
}

/// Sine oscillator for modulation, output in `-1..=1`.
#[derive(Clone, Debug, Default)]
pub struct Lfo {
    phase: f32,
    increment: f32,
    sample_rate: f32,
}

impl Lfo {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            phase: 0.0,
            increment: 0.0,
            sample_rate,
        }
    }

    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        let freq = self.increment * self.sample_rate;
        self.sample_rate = sample_rate;
        self.set_frequency(freq);
    }

    pub fn set_frequency(&mut self, freq_hz: f32) {
        self.increment = if self.sample_rate > 0.0 {
            freq_hz / self.sample_rate
        } else {
            0.0
        };
    }

    #[inline]
    pub fn next(&mut self) -> f32 {
        let output = (self.phase * TAU).sin();
        self.phase += self.increment;
        if self.phase >= 1.0 {
            self.phase -= self.phase.floor();
        }
        output
    }

    pub const fn reset(&mut self) {
        self.phase = 0.0;
    }
}

/// First-order all-pass in topology-preserving-transform form.
///
/// Reference: Zavalishin, "The Art of VA Filter Design", ch. 3.
#[derive(Clone, Debug, Default)]
pub struct TptAllpass {
    g: f32,
    state: f32,
}

impl TptAllpass {
    pub fn set_cutoff(&mut self, cutoff_hz: f32, sample_rate: f32) {
        let wd = (PI * cutoff_hz / sample_rate).tan();
        self.g = wd / (1.0 + wd);
    }

    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        let v = (input - self.state) * self.g;
        let lowpass = v + self.state;
        self.state = lowpass + v;
        2.0f32.mul_add(lowpass, -input)
    }

    pub const fn reset(&mut self) {
        self.state = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn db_conversion() {
        assert!((db_to_lin(0.0) - 1.0).abs() < 1e-6);
        assert!((db_to_lin(20.0) - 10.0).abs() < 1e-4);
        assert!((db_to_lin(-6.0) - 0.501).abs() < 1e-3);
    }

    #[test]
    fn log_mapping_round_trips_range_ends() {
        assert!((map_to_log10(0.0, 20.0, 20_000.0) - 20.0).abs() < 1e-3);
        assert!((map_to_log10(1.0, 20.0, 20_000.0) - 20_000.0).abs() < 1.0);
        assert!((map_to_log10(0.5, 20.0, 20_000.0) - 632.45).abs() < 0.5);
        let n = map_from_log10(1000.0, 20.0, 20_000.0);
        assert!((map_to_log10(n, 20.0, 20_000.0) - 1000.0).abs() < 0.1);
    }

    #[test]
    fn lfo_stays_in_range_and_wraps() {
        let mut lfo = Lfo::new(48_000.0);
        lfo.set_frequency(5.0);
        for _ in 0..48_000 {
            let value = lfo.next();
            assert!((-1.0..=1.0).contains(&value));
        }
        assert!(lfo.phase < 1.0);
    }

    #[test]
    fn allpass_preserves_energy_of_dc() {
        let mut ap = TptAllpass::default();
        ap.set_cutoff(1000.0, 48_000.0);
        let mut out = 0.0;
        for _ in 0..10_000 {
            out = ap.process(1.0);
        }
        assert!((out - 1.0).abs() < 1e-3, "allpass DC gain was {out}");
    }
}
