use crate::dsp::stages::Stage;
use crate::dsp::stages::ladder::{LadderFilter, LadderMode};

const OPEN_CUTOFF_HZ: f32 = 20_000.0;

/// Saturation from a wide-open ladder: only the input drive is exposed.
pub struct OverdriveStage {
    ladder: LadderFilter,
}

impl OverdriveStage {
    pub fn new(sample_rate: f32) -> Self {
        let mut ladder = LadderFilter::new(sample_rate);
        ladder.set_mode(LadderMode::Lpf12);
        ladder.set_cutoff(OPEN_CUTOFF_HZ);
        ladder.set_resonance(0.0);
        Self { ladder }
    }

    pub fn set_saturation(&mut self, saturation: f32) {
        self.ladder.set_drive(saturation);
    }
}

impl Stage for OverdriveStage {
    fn prepare(&mut self, sample_rate: f32, max_block_size: usize) {
        self.ladder.prepare(sample_rate, max_block_size);
    }

    fn process(&mut self, input: f32) -> f32 {
        self.ladder.process(input)
    }

    fn reset(&mut self) {
        self.ladder.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn more_saturation_flattens_peaks() {
        let peak = |saturation: f32| {
            let mut od = OverdriveStage::new(48_000.0);
            od.set_saturation(saturation);
            let mut crest = 0.0f32;
            let mut rms = 0.0f32;
            for i in 0..4800 {
                let y = od.process((i as f32 * 0.02).sin() * 0.8);
                crest = crest.max(y.abs());
                rms += y * y;
            }
            crest / (rms / 4800.0).sqrt()
        };
        assert!(peak(60.0) < peak(1.0), "crest factor should drop with drive");
    }
}
