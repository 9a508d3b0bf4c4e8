//! Parameter store shared by the control thread and the render thread.
//!
//! Every value lives in an `AtomicU32` holding `f32` bits, so host automation
//! can write while the render thread reads without any further locking.

use anyhow::{Result, anyhow};
use std::sync::atomic::{AtomicU32, Ordering};

use crate::dsp::stages::general_filter::GeneralFilterMode;
use crate::dsp::stages::ladder::LadderMode;
use crate::order::StageId;

pub mod smoother;

pub const PARAM_COUNT: usize = 24;

/// The continuous parameters come first so a smoother index is the id itself.
pub const SMOOTHED_COUNT: usize = 17;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ParamId {
    PhaserRateHz,
    PhaserCenterFreqHz,
    PhaserDepthPercent,
    PhaserFeedbackPercent,
    PhaserMixPercent,
    ChorusRateHz,
    ChorusDepthPercent,
    ChorusCenterDelayMs,
    ChorusFeedbackPercent,
    ChorusMixPercent,
    OverdriveSaturation,
    LadderFilterCutoffHz,
    LadderFilterResonance,
    LadderFilterDrive,
    GeneralFilterFreqHz,
    GeneralFilterQuality,
    GeneralFilterGain,
    LadderFilterMode,
    GeneralFilterMode,
    PhaserBypass,
    ChorusBypass,
    OverdriveBypass,
    LadderFilterBypass,
    GeneralFilterBypass,
}

impl ParamId {
    pub const fn index(self) -> usize {
        self as usize
    }

    pub fn def(self) -> &'static ParamDef {
        &LAYOUT[self.index()]
    }

    pub fn name(self) -> &'static str {
        self.def().name
    }

    /// Index into the smoother bank, for continuous parameters only.
    pub const fn smoother_index(self) -> Option<usize> {
        if self.index() < SMOOTHED_COUNT {
            Some(self.index())
        } else {
            None
        }
    }

    pub const fn bypass_for(stage: StageId) -> Self {
        match stage {
            StageId::Phase => Self::PhaserBypass,
            StageId::Chorus => Self::ChorusBypass,
            StageId::OverDrive => Self::OverdriveBypass,
            StageId::LadderFilter => Self::LadderFilterBypass,
            StageId::GeneralFilter => Self::GeneralFilterBypass,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum ParamKind {
    Float {
        min: f32,
        max: f32,
        default: f32,
        step: f32,
        unit: &'static str,
    },
    Choice {
        choices: &'static [&'static str],
    },
    Bool {
        default: bool,
    },
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ParamDef {
    pub id: ParamId,
    pub name: &'static str,
    pub kind: ParamKind,
}

impl ParamDef {
    const fn float(
        id: ParamId,
        name: &'static str,
        (min, max): (f32, f32),
        default: f32,
        step: f32,
        unit: &'static str,
    ) -> Self {
        Self {
            id,
            name,
            kind: ParamKind::Float {
                min,
                max,
                default,
                step,
                unit,
            },
        }
    }

    const fn choice(id: ParamId, name: &'static str, choices: &'static [&'static str]) -> Self {
        Self {
            id,
            name,
            kind: ParamKind::Choice { choices },
        }
    }

    const fn toggle(id: ParamId, name: &'static str) -> Self {
        Self {
            id,
            name,
            kind: ParamKind::Bool { default: false },
        }
    }

    pub fn default_value(&self) -> f32 {
        match self.kind {
            ParamKind::Float { default, .. } => default,
            ParamKind::Choice { .. } => 0.0,
            ParamKind::Bool { default } => f32::from(u8::from(default)),
        }
    }

    /// Maps any incoming value onto a legal stored value.
    /// Floats are snapped to the step and clamped, choices become a valid
    /// index, and bools become 0 or 1. NaN maps to the default.
    pub fn sanitize(&self, value: f32) -> f32 {
        if value.is_nan() {
            return self.default_value();
        }
        match self.kind {
            ParamKind::Float { min, max, step, .. } => {
                let snapped = if step > 0.0 {
                    ((value - min) / step).round().mul_add(step, min)
                } else {
                    value
                };
                snapped.clamp(min, max)
            }
            ParamKind::Choice { choices } => value.round().clamp(0.0, (choices.len() - 1) as f32),
            ParamKind::Bool { .. } => {
                if value >= 0.5 {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }
}

const PERCENT_UNIT: &str = "%";

static LAYOUT: [ParamDef; PARAM_COUNT] = [
    ParamDef::float(ParamId::PhaserRateHz, "Phaser Rate Hz", (0.01, 2.0), 0.2, 0.01, "Hz"),
    ParamDef::float(ParamId::PhaserCenterFreqHz, "Phaser Center FreqHz", (20.0, 20_000.0), 1000.0, 1.0, "Hz"),
    ParamDef::float(ParamId::PhaserDepthPercent, "Phaser Depth %", (0.01, 1.0), 0.05, 0.01, PERCENT_UNIT),
    ParamDef::float(ParamId::PhaserFeedbackPercent, "Phaser Feedback %", (-1.0, 1.0), 0.0, 0.01, PERCENT_UNIT),
    ParamDef::float(ParamId::PhaserMixPercent, "Phaser Mix %", (0.01, 1.0), 0.05, 0.01, PERCENT_UNIT),
    ParamDef::float(ParamId::ChorusRateHz, "Chorus Rate Hz", (0.01, 100.0), 0.2, 0.01, "Hz"),
    ParamDef::float(ParamId::ChorusDepthPercent, "Chorus Depth %", (0.01, 1.0), 0.05, 0.01, PERCENT_UNIT),
    ParamDef::float(ParamId::ChorusCenterDelayMs, "Chorus Center Delay Ms", (1.0, 100.0), 7.0, 0.1, "ms"),
    ParamDef::float(ParamId::ChorusFeedbackPercent, "Chorus Feedback %", (-1.0, 1.0), 0.0, 0.01, PERCENT_UNIT),
    ParamDef::float(ParamId::ChorusMixPercent, "Chorus Mix %", (0.01, 1.0), 0.05, 0.01, PERCENT_UNIT),
    ParamDef::float(ParamId::OverdriveSaturation, "OverDrive Saturation", (1.0, 100.0), 1.0, 0.1, ""),
    ParamDef::float(ParamId::LadderFilterCutoffHz, "Ladder Filter Cutoff Hz", (20.0, 20_000.0), 20_000.0, 0.1, "Hz"),
    ParamDef::float(ParamId::LadderFilterResonance, "Ladder Filter Resonance", (0.0, 1.0), 0.0, 0.01, ""),
    ParamDef::float(ParamId::LadderFilterDrive, "Ladder Filter Drive", (1.0, 100.0), 1.0, 0.1, ""),
    ParamDef::float(ParamId::GeneralFilterFreqHz, "General Filter Freq hz", (20.0, 20_000.0), 750.0, 1.0, "Hz"),
    ParamDef::float(ParamId::GeneralFilterQuality, "General Filter Quality", (0.1, 10.0), 1.0, 0.05, ""),
    ParamDef::float(ParamId::GeneralFilterGain, "General Filter Gain", (-24.0, 24.0), 0.0, 0.5, "dB"),
    ParamDef::choice(ParamId::LadderFilterMode, "Ladder Filter Mode", &LadderMode::NAMES),
    ParamDef::choice(ParamId::GeneralFilterMode, "General Filter Mode", &GeneralFilterMode::NAMES),
    ParamDef::toggle(ParamId::PhaserBypass, "Phaser Bypass"),
    ParamDef::toggle(ParamId::ChorusBypass, "Chorus Bypass"),
    ParamDef::toggle(ParamId::OverdriveBypass, "OverDrive Bypass"),
    ParamDef::toggle(ParamId::LadderFilterBypass, "Ladder Filter Bypass"),
    ParamDef::toggle(ParamId::GeneralFilterBypass, "General Filter Bypass"),
];

/// Every parameter in the positional order editor panels are built from.
pub fn params_for_stage(stage: StageId) -> &'static [ParamId] {
    use ParamId::*;
    match stage {
        StageId::Phase => &[
            PhaserRateHz,
            PhaserCenterFreqHz,
            PhaserDepthPercent,
            PhaserFeedbackPercent,
            PhaserMixPercent,
            PhaserBypass,
        ],
        StageId::Chorus => &[
            ChorusRateHz,
            ChorusDepthPercent,
            ChorusCenterDelayMs,
            ChorusFeedbackPercent,
            ChorusMixPercent,
            ChorusBypass,
        ],
        StageId::OverDrive => &[OverdriveSaturation, OverdriveBypass],
        StageId::LadderFilter => &[
            LadderFilterMode,
            LadderFilterCutoffHz,
            LadderFilterResonance,
            LadderFilterDrive,
            LadderFilterBypass,
        ],
        StageId::GeneralFilter => &[
            GeneralFilterMode,
            GeneralFilterFreqHz,
            GeneralFilterQuality,
            GeneralFilterGain,
            GeneralFilterBypass,
        ],
    }
}

pub struct ParamStore {
    values: [AtomicU32; PARAM_COUNT],
}

impl Default for ParamStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ParamStore {
    pub fn new() -> Self {
        Self {
            values: std::array::from_fn(|i| {
                let def = &LAYOUT[i];
                AtomicU32::new(def.sanitize(def.default_value()).to_bits())
            }),
        }
    }

    pub fn layout() -> &'static [ParamDef] {
        &LAYOUT
    }

    pub fn find(name: &str) -> Option<ParamId> {
        LAYOUT.iter().find(|def| def.name == name).map(|def| def.id)
    }

    #[inline]
    pub fn get(&self, id: ParamId) -> f32 {
        f32::from_bits(self.values[id.index()].load(Ordering::Relaxed))
    }

    #[inline]
    pub fn get_choice(&self, id: ParamId) -> usize {
        debug_assert!(matches!(id.def().kind, ParamKind::Choice { .. }));
        self.get(id) as usize
    }

    #[inline]
    pub fn get_bool(&self, id: ParamId) -> bool {
        debug_assert!(matches!(id.def().kind, ParamKind::Bool { .. }));
        self.get(id) >= 0.5
    }

    /// Stores `value` after clamping it into the parameter's range.
    /// Returns the value actually stored.
    pub fn set(&self, id: ParamId, value: f32) -> f32 {
        let value = id.def().sanitize(value);
        self.values[id.index()].store(value.to_bits(), Ordering::Relaxed);
        value
    }

    pub fn set_bool(&self, id: ParamId, value: bool) {
        self.set(id, f32::from(u8::from(value)));
    }

    pub fn get_by_name(&self, name: &str) -> Result<f32> {
        Self::find(name)
            .map(|id| self.get(id))
            .ok_or_else(|| anyhow!("unknown parameter '{name}'"))
    }

    pub fn set_by_name(&self, name: &str, value: f32) -> Result<f32> {
        let id = Self::find(name).ok_or_else(|| anyhow!("unknown parameter '{name}'"))?;
        Ok(self.set(id, value))
    }

    pub fn reset_to_defaults(&self) {
        for def in &LAYOUT {
            self.set(def.id, def.default_value());
        }
    }

    /// Current values keyed by display name, for persistence.
    pub fn snapshot(&self) -> impl Iterator<Item = (&'static str, f32)> + '_ {
        LAYOUT.iter().map(|def| (def.name, self.get(def.id)))
    }
}
