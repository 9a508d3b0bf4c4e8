use crate::dsp::registry::StageRegistry;
use crate::order::DspOrder;

/// Runs a channel's stages in the order given.
#[derive(Default)]
pub struct ChannelPipeline {
    registry: StageRegistry,
}

impl ChannelPipeline {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            registry: StageRegistry::new(sample_rate),
        }
    }

    pub fn process(&mut self, block: &mut [f32], order: &DspOrder) {
        for stage in order.iter() {
            self.registry.process_stage(stage, block);
        }
    }

    pub const fn registry(&self) -> &StageRegistry {
        &self.registry
    }

    pub const fn registry_mut(&mut self) -> &mut StageRegistry {
        &mut self.registry
    }
}
