use crate::dsp::stages::Stage;
use crate::dsp::stages::common::{db_to_lin, max_filter_freq};
use std::f32::consts::{PI, TAU};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum GeneralFilterMode {
    #[default]
    Peak,
    Bandpass,
    Notch,
    Allpass,
}

impl GeneralFilterMode {
    pub const NAMES: [&'static str; 4] = ["Peak", "Bandpass", "Notch", "Allpass"];

    pub const fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(Self::Peak),
            1 => Some(Self::Bandpass),
            2 => Some(Self::Notch),
            3 => Some(Self::Allpass),
            _ => None,
        }
    }
}

impl std::fmt::Display for GeneralFilterMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", Self::NAMES[*self as usize])
    }
}

/// Inputs of one filter design. Compared by value to decide whether the
/// coefficients need recomputing.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct FilterDesign {
    pub mode: GeneralFilterMode,
    pub freq_hz: f32,
    pub quality: f32,
    pub gain_db: f32,
}

/// Normalised biquad coefficients (a0 == 1).
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct BiquadCoefficients {
    pub b0: f32,
    pub b1: f32,
    pub b2: f32,
    pub a1: f32,
    pub a2: f32,
}

impl Default for BiquadCoefficients {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl BiquadCoefficients {
    pub const IDENTITY: Self = Self {
        b0: 1.0,
        b1: 0.0,
        b2: 0.0,
        a1: 0.0,
        a2: 0.0,
    };

    fn normalised(b0: f32, b1: f32, b2: f32, a0: f32, a1: f32, a2: f32) -> Self {
        let inv = 1.0 / a0;
        Self {
            b0: b0 * inv,
            b1: b1 * inv,
            b2: b2 * inv,
            a1: a1 * inv,
            a2: a2 * inv,
        }
    }

    pub fn design(sample_rate: f32, design: &FilterDesign) -> Self {
        let freq = design.freq_hz.clamp(1.0, max_filter_freq(sample_rate));
        let q = design.quality.max(1.0e-3);

        match design.mode {
            GeneralFilterMode::Peak => {
                let a = db_to_lin(design.gain_db).max(1.0e-6).sqrt();
                let omega = TAU * freq / sample_rate;
                let alpha = omega.sin() / (2.0 * q);
                let c2 = -2.0 * omega.cos();
                Self::normalised(
                    alpha.mul_add(a, 1.0),
                    c2,
                    (-alpha).mul_add(a, 1.0),
                    1.0 + alpha / a,
                    c2,
                    1.0 - alpha / a,
                )
            }
            mode => {
                let n = 1.0 / (PI * freq / sample_rate).tan();
                let n2 = n * n;
                let inv_q = 1.0 / q;
                let c1 = 1.0 / (1.0 + inv_q * n + n2);
                let tail = c1 * (1.0 - inv_q * n + n2);
                let mid = c1 * 2.0 * (1.0 - n2);
                match mode {
                    GeneralFilterMode::Bandpass => Self {
                        b0: c1 * n * inv_q,
                        b1: 0.0,
                        b2: -c1 * n * inv_q,
                        a1: mid,
                        a2: tail,
                    },
                    GeneralFilterMode::Notch => Self {
                        b0: c1 * (1.0 + n2),
                        b1: mid,
                        b2: c1 * (1.0 + n2),
                        a1: mid,
                        a2: tail,
                    },
                    _ => Self {
                        b0: tail,
                        b1: mid,
                        b2: 1.0,
                        a1: mid,
                        a2: tail,
                    },
                }
            }
        }
    }
}

/// Biquad in transposed direct form II with a single-entry design cache.
pub struct GeneralFilterStage {
    coefficients: BiquadCoefficients,
    applied: Option<FilterDesign>,
    s1: f32,
    s2: f32,
    sample_rate: f32,
}

impl GeneralFilterStage {
    pub const fn new(sample_rate: f32) -> Self {
        Self {
            coefficients: BiquadCoefficients::IDENTITY,
            applied: None,
            s1: 0.0,
            s2: 0.0,
            sample_rate,
        }
    }

    /// Returns true when the coefficients were recomputed. History is cleared
    /// together with a recompute and left alone otherwise.
    pub fn update(&mut self, design: FilterDesign) -> bool {
        if self.applied == Some(design) {
            return false;
        }
        self.coefficients = BiquadCoefficients::design(self.sample_rate, &design);
        self.applied = Some(design);
        self.reset();
        true
    }

    pub const fn coefficients(&self) -> &BiquadCoefficients {
        &self.coefficients
    }

    pub const fn applied_design(&self) -> Option<FilterDesign> {
        self.applied
    }

    pub const fn history(&self) -> [f32; 2] {
        [self.s1, self.s2]
    }
}

impl Stage for GeneralFilterStage {
    fn prepare(&mut self, sample_rate: f32, _max_block_size: usize) {
        self.sample_rate = sample_rate;
        // next update() must redesign for the new rate
        self.applied = None;
        self.reset();
    }

    #[inline]
    fn process(&mut self, input: f32) -> f32 {
        let c = &self.coefficients;
        let out = c.b0.mul_add(input, self.s1);
        self.s1 = c.b1.mul_add(input, (-c.a1).mul_add(out, self.s2));
        self.s2 = c.b2.mul_add(input, -c.a2 * out);
        out
    }

    fn reset(&mut self) {
        self.s1 = 0.0;
        self.s2 = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RATE: f32 = 48_000.0;

    fn design(mode: GeneralFilterMode) -> FilterDesign {
        FilterDesign {
            mode,
            freq_hz: 1000.0,
            quality: 0.707,
            gain_db: 6.0,
        }
    }

    fn magnitude_at(c: &BiquadCoefficients, freq: f32) -> f32 {
        let w = TAU * freq / SAMPLE_RATE;
        let (c1, s1) = (w.cos(), -w.sin());
        let (c2, s2) = ((2.0 * w).cos(), -(2.0 * w).sin());
        let num_re = c.b0 + c.b1 * c1 + c.b2 * c2;
        let num_im = c.b1 * s1 + c.b2 * s2;
        let den_re = 1.0 + c.a1 * c1 + c.a2 * c2;
        let den_im = c.a1 * s1 + c.a2 * s2;
        (num_re.hypot(num_im)) / (den_re.hypot(den_im))
    }

    #[test]
    fn peak_boosts_by_gain_at_centre() {
        let c = BiquadCoefficients::design(SAMPLE_RATE, &design(GeneralFilterMode::Peak));
        let mag = magnitude_at(&c, 1000.0);
        assert!((mag - db_to_lin(6.0)).abs() < 0.01, "got {mag}");
        assert!((magnitude_at(&c, 20.0) - 1.0).abs() < 0.01);
    }

    #[test]
    fn zero_gain_peak_is_flat() {
        let mut d = design(GeneralFilterMode::Peak);
        d.gain_db = 0.0;
        let c = BiquadCoefficients::design(SAMPLE_RATE, &d);
        for freq in [50.0, 1000.0, 10_000.0] {
            assert!((magnitude_at(&c, freq) - 1.0).abs() < 1e-3);
        }
    }

    #[test]
    fn bandpass_and_notch_shapes() {
        let bp = BiquadCoefficients::design(SAMPLE_RATE, &design(GeneralFilterMode::Bandpass));
        assert!((magnitude_at(&bp, 1000.0) - 1.0).abs() < 0.01);
        assert!(magnitude_at(&bp, 50.0) < 0.1);

        let notch = BiquadCoefficients::design(SAMPLE_RATE, &design(GeneralFilterMode::Notch));
        assert!(magnitude_at(&notch, 1000.0) < 1e-3);
        assert!((magnitude_at(&notch, 50.0) - 1.0).abs() < 0.01);
    }

    #[test]
    fn allpass_is_flat() {
        let c = BiquadCoefficients::design(SAMPLE_RATE, &design(GeneralFilterMode::Allpass));
        for freq in [50.0, 1000.0, 15_000.0] {
            assert!((magnitude_at(&c, freq) - 1.0).abs() < 1e-3, "at {freq}");
        }
    }

    #[test]
    fn unchanged_design_keeps_coefficients_and_history() {
        let mut stage = GeneralFilterStage::new(SAMPLE_RATE);
        assert!(stage.update(design(GeneralFilterMode::Peak)));
        for i in 0..64 {
            stage.process((i as f32 * 0.1).sin());
        }
        let coefficients = *stage.coefficients();
        let history = stage.history();
        assert_ne!(history, [0.0, 0.0]);

        assert!(!stage.update(design(GeneralFilterMode::Peak)));
        assert_eq!(*stage.coefficients(), coefficients);
        assert_eq!(stage.history(), history, "cached update must not reset state");
    }

    #[test]
    fn changed_design_recomputes_and_clears_history() {
        let mut stage = GeneralFilterStage::new(SAMPLE_RATE);
        stage.update(design(GeneralFilterMode::Peak));
        for _ in 0..16 {
            stage.process(0.5);
        }
        let before = *stage.coefficients();

        let mut next = design(GeneralFilterMode::Peak);
        next.gain_db = -6.0;
        assert!(stage.update(next));
        assert_ne!(*stage.coefficients(), before);
        assert_eq!(stage.history(), [0.0, 0.0]);
        assert_eq!(stage.applied_design(), Some(next));
    }

    #[test]
    fn prepare_invalidates_cache() {
        let mut stage = GeneralFilterStage::new(SAMPLE_RATE);
        stage.update(design(GeneralFilterMode::Notch));
        stage.prepare(96_000.0, 512);
        assert_eq!(stage.applied_design(), None);
        assert!(stage.update(design(GeneralFilterMode::Notch)));
    }
}
