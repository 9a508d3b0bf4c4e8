pub mod chorus;
pub mod common;
pub mod general_filter;
pub mod ladder;
pub mod overdrive;
pub mod phaser;

// The core trait that all processing stages must implement
pub trait Stage: Send + 'static {
    // Size internal buffers for the sample rate and clear all state.
    // The only place a stage may allocate.
    fn prepare(&mut self, sample_rate: f32, max_block_size: usize);

    // Process a single sample through this stage
    fn process(&mut self, input: f32) -> f32;

    // Process a block of samples in place
    fn process_block(&mut self, block: &mut [f32]) {
        for sample in block.iter_mut() {
            *sample = self.process(*sample);
        }
    }

    // Clear history (filter memory, delay lines, LFO phase) without touching settings
    fn reset(&mut self);
}
