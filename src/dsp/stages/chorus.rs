use crate::dsp::stages::Stage;
use crate::dsp::stages::common::Lfo;

const MAX_CENTRE_DELAY_MS: f32 = 100.0;
const MAX_DEPTH_MS: f32 = 1.0;
const MAX_DELAY_MS: f32 = 2.0 * (MAX_DEPTH_MS + MAX_CENTRE_DELAY_MS);
const MAX_FEEDBACK: f32 = 0.99;

/// Modulated delay line chorus.
///
/// The delay swings around the centre delay by up to half of `depth`, read
/// with linear interpolation so the moving tap stays click-free.
pub struct ChorusStage {
    buffer: Vec<f32>,
    write_pos: usize,
    lfo: Lfo,
    rate_hz: f32,
    depth: f32,
    centre_delay_ms: f32,
    feedback: f32,
    mix: f32,
    sample_rate: f32,
}

impl ChorusStage {
    pub fn new(sample_rate: f32) -> Self {
        let mut stage = Self {
            buffer: Vec::new(),
            write_pos: 0,
            lfo: Lfo::new(sample_rate),
            rate_hz: 0.2,
            depth: 0.05,
            centre_delay_ms: 7.0,
            feedback: 0.0,
            mix: 0.05,
            sample_rate,
        };
        stage.allocate();
        stage.set_rate(stage.rate_hz);
        stage
    }

    fn allocate(&mut self) {
        let max_samples = (MAX_DELAY_MS * 0.001 * self.sample_rate).ceil() as usize + 2;
        self.buffer = vec![0.0; max_samples];
        self.write_pos = 0;
    }

    pub fn set_rate(&mut self, rate_hz: f32) {
        self.rate_hz = rate_hz.max(0.0);
        self.lfo.set_frequency(self.rate_hz);
    }

    pub fn set_depth(&mut self, depth: f32) {
        self.depth = depth.clamp(0.0, 1.0);
    }

    pub fn set_centre_delay(&mut self, delay_ms: f32) {
        self.centre_delay_ms = delay_ms.clamp(1.0, MAX_CENTRE_DELAY_MS);
    }

    pub fn set_feedback(&mut self, feedback: f32) {
        self.feedback = feedback.clamp(-MAX_FEEDBACK, MAX_FEEDBACK);
    }

    pub fn set_mix(&mut self, mix: f32) {
        self.mix = mix.clamp(0.0, 1.0);
    }

    #[inline]
    fn read(&self, delay_samples: f32) -> f32 {
        let buf_len = self.buffer.len();
        let read_pos = self.write_pos as f32 - delay_samples + buf_len as f32;
        let read_idx = read_pos as usize % buf_len;
        let frac = read_pos.fract();
        let next_idx = (read_idx + 1) % buf_len;

        (1.0 - frac).mul_add(self.buffer[read_idx], frac * self.buffer[next_idx])
    }
}

impl Stage for ChorusStage {
    fn prepare(&mut self, sample_rate: f32, _max_block_size: usize) {
        self.sample_rate = sample_rate;
        self.allocate();
        self.lfo.set_sample_rate(sample_rate);
        self.set_rate(self.rate_hz);
        self.reset();
    }

    fn process(&mut self, input: f32) -> f32 {
        let buf_len = self.buffer.len();
        let lfo = self.lfo.next();

        let delay_ms = self.centre_delay_ms * (self.depth * 0.5).mul_add(lfo, 1.0);
        let delay_samples = (delay_ms * 0.001 * self.sample_rate).clamp(1.0, (buf_len - 2) as f32);
        let delayed = self.read(delay_samples);

        self.buffer[self.write_pos] = self.feedback.mul_add(delayed, input);
        self.write_pos = (self.write_pos + 1) % buf_len;

        (1.0 - self.mix).mul_add(input, self.mix * delayed)
    }

    fn reset(&mut self) {
        self.buffer.fill(0.0);
        self.write_pos = 0;
        self.lfo.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RATE: f32 = 48_000.0;

    #[test]
    fn dry_mix_passes_input() {
        let mut chorus = ChorusStage::new(SAMPLE_RATE);
        chorus.set_mix(0.0);
        for i in 0..1000 {
            let input = (i as f32 * 0.01).sin();
            assert!((chorus.process(input) - input).abs() < 1e-6);
        }
    }

    #[test]
    fn wet_impulse_arrives_after_centre_delay() {
        let mut chorus = ChorusStage::new(SAMPLE_RATE);
        chorus.set_mix(1.0);
        chorus.set_depth(0.0);
        chorus.set_centre_delay(10.0);

        let delay_samples = (10.0 * 0.001 * SAMPLE_RATE).round() as usize;
        let mut output = Vec::new();
        output.push(chorus.process(1.0));
        for _ in 0..delay_samples + 4 {
            output.push(chorus.process(0.0));
        }

        let peak = output
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(peak, delay_samples);
    }

    #[test]
    fn feedback_is_bounded() {
        let mut chorus = ChorusStage::new(SAMPLE_RATE);
        chorus.set_feedback(-1.0);
        chorus.set_mix(1.0);
        chorus.set_depth(1.0);
        chorus.set_rate(100.0);
        chorus.set_centre_delay(1.0);

        let mut block: Vec<f32> = (0..48_000).map(|i| (i as f32 * 0.05).sin()).collect();
        chorus.process_block(&mut block);
        assert!(block.iter().all(|s| s.is_finite() && s.abs() < 200.0));
    }

    #[test]
    fn reset_empties_the_delay_line() {
        let mut chorus = ChorusStage::new(SAMPLE_RATE);
        chorus.set_mix(1.0);
        for _ in 0..2000 {
            chorus.process(1.0);
        }
        chorus.reset();
        for _ in 0..100 {
            assert_eq!(chorus.process(0.0), 0.0);
        }
    }
}
