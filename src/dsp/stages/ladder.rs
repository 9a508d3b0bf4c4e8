use crate::dsp::stages::Stage;
use crate::dsp::stages::common::max_filter_freq;
use std::f32::consts::TAU;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum LadderMode {
    #[default]
    Lpf12,
    Hpf12,
    Bpf12,
    Lpf24,
    Hpf24,
    Bpf24,
}

impl LadderMode {
    pub const NAMES: [&'static str; 6] = ["LPF12", "HPF12", "BPF12", "LPF24", "HPF24", "BPF24"];

    pub const fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(Self::Lpf12),
            1 => Some(Self::Hpf12),
            2 => Some(Self::Bpf12),
            3 => Some(Self::Lpf24),
            4 => Some(Self::Hpf24),
            5 => Some(Self::Bpf24),
            _ => None,
        }
    }

    // Weights applied to the input node and the four pole outputs.
    const fn taps(self) -> [f32; 5] {
        match self {
            Self::Lpf12 => [0.0, 0.0, 1.0, 0.0, 0.0],
            Self::Hpf12 => [1.0, -2.0, 1.0, 0.0, 0.0],
            Self::Bpf12 => [0.0, 0.0, -1.0, 1.0, 0.0],
            Self::Lpf24 => [0.0, 0.0, 0.0, 0.0, 1.0],
            Self::Hpf24 => [1.0, -4.0, 6.0, -4.0, 1.0],
            Self::Bpf24 => [0.0, 0.0, 1.0, -2.0, 1.0],
        }
    }
}

impl std::fmt::Display for LadderMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", Self::NAMES[*self as usize])
    }
}

const MIN_CUTOFF_HZ: f32 = 20.0;
const FEEDBACK_COMPENSATION: f32 = 0.5;

#[inline]
fn drive_gain(drive: f32) -> f32 {
    drive.powf(-2.642).mul_add(0.6103, 0.3903)
}

/// Four-pole transistor ladder with tanh input saturation.
///
/// `drive` pushes the input into the saturator while a matching gain keeps
/// the output level roughly constant, which is what the overdrive stage
/// leans on.
pub struct LadderFilter {
    state: [f32; 5],
    mode: LadderMode,
    taps: [f32; 5],
    cutoff_hz: f32,
    resonance: f32,
    drive: f32,
    pole_coeff: f32,
    scaled_resonance: f32,
    gain: f32,
    drive2: f32,
    gain2: f32,
    sample_rate: f32,
}

impl LadderFilter {
    pub fn new(sample_rate: f32) -> Self {
        let mut filter = Self {
            state: [0.0; 5],
            mode: LadderMode::Lpf12,
            taps: LadderMode::Lpf12.taps(),
            cutoff_hz: 20_000.0,
            resonance: 0.0,
            drive: 1.0,
            pole_coeff: 0.0,
            scaled_resonance: 0.0,
            gain: 1.0,
            drive2: 1.0,
            gain2: 1.0,
            sample_rate,
        };
        filter.set_cutoff(filter.cutoff_hz);
        filter.set_resonance(filter.resonance);
        filter.set_drive(filter.drive);
        filter
    }

    pub const fn mode(&self) -> LadderMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: LadderMode) {
        if mode != self.mode {
            self.mode = mode;
            self.taps = mode.taps();
        }
    }

    pub fn set_cutoff(&mut self, cutoff_hz: f32) {
        self.cutoff_hz = cutoff_hz;
        let cutoff = cutoff_hz.clamp(MIN_CUTOFF_HZ, max_filter_freq(self.sample_rate));
        self.pole_coeff = (-TAU * cutoff / self.sample_rate).exp();
    }

    pub fn set_resonance(&mut self, resonance: f32) {
        self.resonance = resonance.clamp(0.0, 1.0);
        self.scaled_resonance = 0.9f32.mul_add(self.resonance, 0.1);
    }

    pub fn set_drive(&mut self, drive: f32) {
        self.drive = drive.max(1.0);
        self.gain = drive_gain(self.drive);
        self.drive2 = self.drive.mul_add(0.04, 0.96);
        self.gain2 = drive_gain(self.drive2);
    }
}

impl Stage for LadderFilter {
    fn prepare(&mut self, sample_rate: f32, _max_block_size: usize) {
        self.sample_rate = sample_rate;
        self.set_cutoff(self.cutoff_hz);
        self.reset();
    }

    fn process(&mut self, input: f32) -> f32 {
        let a1 = self.pole_coeff;
        let g = 1.0 - a1;
        let b0 = g * 0.769_230_8;
        let b1 = g * 0.230_769_2;
        let s = &mut self.state;

        let dx = self.gain * (self.drive * input).tanh();
        let fb = self
            .gain2
            .mul_add((self.drive2 * s[4]).tanh(), -dx * FEEDBACK_COMPENSATION);
        let a = (self.scaled_resonance * -4.0).mul_add(fb, dx);
        let b = b1.mul_add(s[0], a1.mul_add(s[1], b0 * a));
        let c = b1.mul_add(s[1], a1.mul_add(s[2], b0 * b));
        let d = b1.mul_add(s[2], a1.mul_add(s[3], b0 * c));
        let e = b1.mul_add(s[3], a1.mul_add(s[4], b0 * d));
        *s = [a, b, c, d, e];

        let t = &self.taps;
        t[0] * a + t[1] * b + t[2] * c + t[3] * d + t[4] * e
    }

    fn reset(&mut self) {
        self.state = [0.0; 5];
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    const SAMPLE_RATE: f32 = 48_000.0;

    fn rms_of_tone(filter: &mut LadderFilter, freq: f32) -> f32 {
        let n = 9600;
        let mut acc = 0.0;
        for i in 0..n {
            let x = (2.0 * PI * freq * i as f32 / SAMPLE_RATE).sin() * 0.1;
            let y = filter.process(x);
            if i >= n / 2 {
                acc += y * y;
            }
        }
        (acc / (n / 2) as f32).sqrt()
    }

    #[test]
    fn lowpass_attenuates_above_cutoff() {
        let mut low = LadderFilter::new(SAMPLE_RATE);
        low.set_mode(LadderMode::Lpf24);
        low.set_cutoff(300.0);
        let pass = rms_of_tone(&mut low, 60.0);
        low.reset();
        let stop = rms_of_tone(&mut low, 6000.0);
        assert!(stop < pass * 0.05, "pass {pass}, stop {stop}");
    }

    #[test]
    fn highpass_removes_dc() {
        let mut hp = LadderFilter::new(SAMPLE_RATE);
        hp.set_mode(LadderMode::Hpf12);
        hp.set_cutoff(500.0);
        let mut out = 0.0;
        for _ in 0..20_000 {
            out = hp.process(0.2);
        }
        assert!(out.abs() < 1e-3, "DC leaked through: {out}");
    }

    #[test]
    fn drive_saturates_but_stays_bounded() {
        let mut ladder = LadderFilter::new(SAMPLE_RATE);
        ladder.set_drive(100.0);
        ladder.set_resonance(1.0);
        for i in 0..48_000 {
            let out = ladder.process((i as f32 * 0.03).sin());
            assert!(out.is_finite() && out.abs() < 4.0);
        }
    }

    #[test]
    fn modes_from_index() {
        assert_eq!(LadderMode::from_index(3), Some(LadderMode::Lpf24));
        assert_eq!(LadderMode::from_index(6), None);
        assert_eq!(LadderMode::Bpf24.to_string(), "BPF24");
    }
}
