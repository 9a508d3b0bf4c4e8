use crate::dsp::stages::Stage;
use crate::dsp::stages::common::{Lfo, TptAllpass, map_from_log10, map_to_log10, max_filter_freq};

const NUM_ALLPASSES: usize = 6;
const MIN_FREQ_HZ: f32 = 20.0;
// Cutoffs are re-derived from the LFO every this many samples.
const SWEEP_INTERVAL: usize = 32;
// Unity feedback around an all-pass loop never decays.
const MAX_FEEDBACK: f32 = 0.99;

/// Six cascaded first-order all-pass sections swept by a sine LFO. Mixing the
/// swept signal with the dry input produces the moving notches.
pub struct PhaserStage {
    allpasses: [TptAllpass; NUM_ALLPASSES],
    lfo: Lfo,
    rate_hz: f32,
    centre_hz: f32,
    normalised_centre: f32,
    depth: f32,
    feedback: f32,
    mix: f32,
    last_output: f32,
    sweep_countdown: usize,
    sample_rate: f32,
}

impl PhaserStage {
    pub fn new(sample_rate: f32) -> Self {
        let mut stage = Self {
            allpasses: Default::default(),
            lfo: Lfo::new(sample_rate),
            rate_hz: 0.2,
            centre_hz: 1000.0,
            normalised_centre: 0.0,
            depth: 0.05,
            feedback: 0.0,
            mix: 0.05,
            last_output: 0.0,
            sweep_countdown: 0,
            sample_rate,
        };
        stage.set_rate(stage.rate_hz);
        stage.set_centre_frequency(stage.centre_hz);
        stage
    }

    pub fn set_rate(&mut self, rate_hz: f32) {
        self.rate_hz = rate_hz.max(0.0);
        self.lfo.set_frequency(self.rate_hz);
    }

    pub fn set_centre_frequency(&mut self, centre_hz: f32) {
        self.centre_hz = centre_hz;
        self.normalised_centre =
            map_from_log10(centre_hz, MIN_FREQ_HZ, max_filter_freq(self.sample_rate));
    }

    pub fn set_depth(&mut self, depth: f32) {
        self.depth = depth.clamp(0.0, 1.0);
    }

    pub fn set_feedback(&mut self, feedback: f32) {
        self.feedback = feedback.clamp(-MAX_FEEDBACK, MAX_FEEDBACK);
    }

    pub fn set_mix(&mut self, mix: f32) {
        self.mix = mix.clamp(0.0, 1.0);
    }

    fn sweep(&mut self, lfo: f32) {
        let normalised = (self.depth * 0.5).mul_add(lfo, self.normalised_centre);
        let cutoff = map_to_log10(normalised, MIN_FREQ_HZ, max_filter_freq(self.sample_rate));
        for allpass in &mut self.allpasses {
            allpass.set_cutoff(cutoff, self.sample_rate);
        }
    }
}

impl Stage for PhaserStage {
    fn prepare(&mut self, sample_rate: f32, _max_block_size: usize) {
        self.sample_rate = sample_rate;
        self.lfo.set_sample_rate(sample_rate);
        self.set_rate(self.rate_hz);
        self.set_centre_frequency(self.centre_hz);
        self.reset();
    }

    fn process(&mut self, input: f32) -> f32 {
        let lfo = self.lfo.next();
        if self.sweep_countdown == 0 {
            self.sweep(lfo);
            self.sweep_countdown = SWEEP_INTERVAL;
        }
        self.sweep_countdown -= 1;

        let mut wet = self.feedback.mul_add(self.last_output, input);
        for allpass in &mut self.allpasses {
            wet = allpass.process(wet);
        }
        self.last_output = wet;

        (1.0 - self.mix).mul_add(input, self.mix * wet)
    }

    fn reset(&mut self) {
        for allpass in &mut self.allpasses {
            allpass.reset();
        }
        self.lfo.reset();
        self.last_output = 0.0;
        self.sweep_countdown = 0;
    }
}
