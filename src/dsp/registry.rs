use crate::dsp::stages::Stage;
use crate::dsp::stages::chorus::ChorusStage;
use crate::dsp::stages::general_filter::{FilterDesign, GeneralFilterMode, GeneralFilterStage};
use crate::dsp::stages::ladder::{LadderFilter, LadderMode};
use crate::dsp::stages::overdrive::OverdriveStage;
use crate::dsp::stages::phaser::PhaserStage;
use crate::order::{STAGE_COUNT, StageId};
use crate::params::smoother::SmootherBank;
use crate::params::{ParamId, ParamStore};

const DEFAULT_SAMPLE_RATE: f32 = 48_000.0;

/// The five stages of one channel plus their bypass flags.
pub struct StageRegistry {
    phaser: PhaserStage,
    chorus: ChorusStage,
    overdrive: OverdriveStage,
    ladder: LadderFilter,
    general_filter: GeneralFilterStage,
    bypass: [bool; STAGE_COUNT],
}

impl Default for StageRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_SAMPLE_RATE)
    }
}

impl StageRegistry {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            phaser: PhaserStage::new(sample_rate),
            chorus: ChorusStage::new(sample_rate),
            overdrive: OverdriveStage::new(sample_rate),
            ladder: LadderFilter::new(sample_rate),
            general_filter: GeneralFilterStage::new(sample_rate),
            bypass: [false; STAGE_COUNT],
        }
    }

    pub fn prepare(&mut self, sample_rate: f32, max_block_size: usize) {
        self.phaser.prepare(sample_rate, max_block_size);
        self.chorus.prepare(sample_rate, max_block_size);
        self.overdrive.prepare(sample_rate, max_block_size);
        self.ladder.prepare(sample_rate, max_block_size);
        self.general_filter.prepare(sample_rate, max_block_size);
    }

    /// Pushes smoothed values into every stage and reads bypass and mode
    /// flags straight from the store. Called once per sub-block.
    pub fn update_from_parameters(&mut self, smoothers: &SmootherBank, params: &ParamStore) {
        let v = |id| smoothers.current(id);

        self.phaser.set_rate(v(ParamId::PhaserRateHz));
        self.phaser.set_centre_frequency(v(ParamId::PhaserCenterFreqHz));
        self.phaser.set_depth(v(ParamId::PhaserDepthPercent));
        self.phaser.set_feedback(v(ParamId::PhaserFeedbackPercent));
        self.phaser.set_mix(v(ParamId::PhaserMixPercent));

        self.chorus.set_rate(v(ParamId::ChorusRateHz));
        self.chorus.set_depth(v(ParamId::ChorusDepthPercent));
        self.chorus.set_centre_delay(v(ParamId::ChorusCenterDelayMs));
        self.chorus.set_feedback(v(ParamId::ChorusFeedbackPercent));
        self.chorus.set_mix(v(ParamId::ChorusMixPercent));

        self.overdrive.set_saturation(v(ParamId::OverdriveSaturation));

        let ladder_mode = LadderMode::from_index(params.get_choice(ParamId::LadderFilterMode));
        debug_assert!(ladder_mode.is_some(), "ladder mode index out of range");
        self.ladder.set_mode(ladder_mode.unwrap_or_default());
        self.ladder.set_cutoff(v(ParamId::LadderFilterCutoffHz));
        self.ladder.set_resonance(v(ParamId::LadderFilterResonance));
        self.ladder.set_drive(v(ParamId::LadderFilterDrive));

        let filter_mode =
            GeneralFilterMode::from_index(params.get_choice(ParamId::GeneralFilterMode));
        debug_assert!(filter_mode.is_some(), "general filter mode index out of range");
        self.general_filter.update(FilterDesign {
            mode: filter_mode.unwrap_or_default(),
            freq_hz: v(ParamId::GeneralFilterFreqHz),
            quality: v(ParamId::GeneralFilterQuality),
            gain_db: v(ParamId::GeneralFilterGain),
        });

        for stage in StageId::ALL {
            self.bypass[stage.index()] = params.get_bool(ParamId::bypass_for(stage));
        }
    }

    #[inline]
    pub const fn is_bypassed(&self, stage: StageId) -> bool {
        self.bypass[stage.index()]
    }

    pub const fn set_bypassed(&mut self, stage: StageId, bypassed: bool) {
        self.bypass[stage.index()] = bypassed;
    }

    /// Runs one stage over `block` in place. A bypassed stage leaves the
    /// block and its own state untouched.
    #[inline]
    pub fn process_stage(&mut self, stage: StageId, block: &mut [f32]) {
        if self.is_bypassed(stage) {
            return;
        }
        match stage {
            StageId::Phase => self.phaser.process_block(block),
            StageId::Chorus => self.chorus.process_block(block),
            StageId::OverDrive => self.overdrive.process_block(block),
            StageId::LadderFilter => self.ladder.process_block(block),
            StageId::GeneralFilter => self.general_filter.process_block(block),
        }
    }

    pub const fn ladder(&self) -> &LadderFilter {
        &self.ladder
    }

    pub const fn general_filter(&self) -> &GeneralFilterStage {
        &self.general_filter
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn primed(params: &ParamStore) -> SmootherBank {
        let mut bank = SmootherBank::new();
        bank.reset(48_000.0, 0.005);
        bank.prime_all(params);
        bank
    }

    #[test]
    fn bypass_flags_follow_the_store() {
        let params = ParamStore::new();
        params.set_bool(ParamId::ChorusBypass, true);
        let mut registry = StageRegistry::new(48_000.0);
        registry.update_from_parameters(&primed(&params), &params);

        assert!(registry.is_bypassed(StageId::Chorus));
        assert!(!registry.is_bypassed(StageId::Phase));
    }

    #[test]
    fn bypassed_stage_is_identity() {
        let params = ParamStore::new();
        params.set_bool(ParamId::OverdriveBypass, true);
        params.set(ParamId::OverdriveSaturation, 80.0);
        let mut registry = StageRegistry::new(48_000.0);
        registry.update_from_parameters(&primed(&params), &params);

        let input: Vec<f32> = (0..64).map(|i| (i as f32 * 0.2).sin()).collect();
        let mut block = input.clone();
        registry.process_stage(StageId::OverDrive, &mut block);
        assert_eq!(block, input);
    }

    #[test]
    fn modes_are_applied() {
        let params = ParamStore::new();
        params.set(ParamId::LadderFilterMode, 4.0);
        params.set(ParamId::GeneralFilterMode, 2.0);
        let mut registry = StageRegistry::new(48_000.0);
        registry.update_from_parameters(&primed(&params), &params);

        assert_eq!(registry.ladder().mode(), LadderMode::Hpf24);
        let design = registry.general_filter().applied_design();
        assert_eq!(design.map(|d| d.mode), Some(GeneralFilterMode::Notch));
    }

    #[test]
    fn repeated_updates_keep_filter_history() {
        let params = ParamStore::new();
        params.set(ParamId::GeneralFilterGain, 9.0);
        let bank = primed(&params);
        let mut registry = StageRegistry::new(48_000.0);
        registry.update_from_parameters(&bank, &params);

        let mut block: Vec<f32> = (0..64).map(|i| (i as f32 * 0.3).sin()).collect();
        registry.process_stage(StageId::GeneralFilter, &mut block);
        let coefficients = *registry.general_filter().coefficients();
        let history = registry.general_filter().history();

        registry.update_from_parameters(&bank, &params);
        assert_eq!(*registry.general_filter().coefficients(), coefficients);
        assert_eq!(registry.general_filter().history(), history);
    }
}
