use anyhow::{Context, Result, bail};
use clap::ValueEnum;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU32, Ordering};

pub mod fifo;

/// Number of reorderable processing stages.
pub const STAGE_COUNT: usize = 5;

/// Size of an encoded order: one little-endian `u32` ordinal per stage.
pub const ORDER_BYTES: usize = STAGE_COUNT * 4;

const PACK_BITS: u32 = 3;
const PACK_MASK: u32 = (1 << PACK_BITS) - 1;

#[derive(ValueEnum, Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum StageId {
    Phase = 0,
    Chorus = 1,
    OverDrive = 2,
    LadderFilter = 3,
    GeneralFilter = 4,
}

impl StageId {
    /// Every stage, in declaration (ordinal) order.
    pub const ALL: [Self; STAGE_COUNT] = [
        Self::Phase,
        Self::Chorus,
        Self::OverDrive,
        Self::LadderFilter,
        Self::GeneralFilter,
    ];

    pub const fn ordinal(self) -> u32 {
        self as u32
    }

    pub const fn index(self) -> usize {
        self as usize
    }

    pub const fn from_ordinal(ordinal: u32) -> Option<Self> {
        match ordinal {
            0 => Some(Self::Phase),
            1 => Some(Self::Chorus),
            2 => Some(Self::OverDrive),
            3 => Some(Self::LadderFilter),
            4 => Some(Self::GeneralFilter),
            _ => None,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Phase => "Phase",
            Self::Chorus => "Chorus",
            Self::OverDrive => "OverDrive",
            Self::LadderFilter => "Ladder Filter",
            Self::GeneralFilter => "General Filter",
        }
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A permutation of every [`StageId`]: the sequence in which stages are chained.
///
/// The only way to build one is through a constructor that checks the
/// permutation, so every value in circulation holds each stage exactly once.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct DspOrder([StageId; STAGE_COUNT]);

impl Default for DspOrder {
    fn default() -> Self {
        Self(StageId::ALL)
    }
}

impl DspOrder {
    pub fn new(stages: [StageId; STAGE_COUNT]) -> Option<Self> {
        let mut seen = 0u32;
        for stage in stages {
            let bit = 1 << stage.ordinal();
            if seen & bit != 0 {
                return None;
            }
            seen |= bit;
        }
        Some(Self(stages))
    }

    /// Builds an order from raw ordinals, rejecting wrong lengths, unknown
    /// ordinals and duplicates.
    pub fn from_ordinals(ordinals: &[u32]) -> Option<Self> {
        if ordinals.len() != STAGE_COUNT {
            return None;
        }
        let mut stages = StageId::ALL;
        for (slot, &ordinal) in stages.iter_mut().zip(ordinals) {
            *slot = StageId::from_ordinal(ordinal)?;
        }
        Self::new(stages)
    }

    /// Decodes the persisted layout produced by [`DspOrder::to_bytes`].
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != ORDER_BYTES {
            return None;
        }
        let mut ordinals = [0u32; STAGE_COUNT];
        for (ordinal, chunk) in ordinals.iter_mut().zip(bytes.chunks_exact(4)) {
            *ordinal = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        }
        Self::from_ordinals(&ordinals)
    }

    /// Like [`DspOrder::from_bytes`], but a malformed blob yields the default order.
    pub fn from_bytes_or_default(bytes: &[u8]) -> Self {
        Self::from_bytes(bytes).unwrap_or_default()
    }

    pub fn to_bytes(&self) -> [u8; ORDER_BYTES] {
        let mut bytes = [0u8; ORDER_BYTES];
        for (chunk, stage) in bytes.chunks_exact_mut(4).zip(self.0) {
            chunk.copy_from_slice(&stage.ordinal().to_le_bytes());
        }
        bytes
    }

    pub fn ordinals(&self) -> [u32; STAGE_COUNT] {
        self.0.map(StageId::ordinal)
    }

    pub const fn stages(&self) -> &[StageId; STAGE_COUNT] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = StageId> + '_ {
        self.0.iter().copied()
    }

    pub fn position(&self, stage: StageId) -> usize {
        self.0.iter().position(|&s| s == stage).unwrap_or(0)
    }

    /// Moves `stage` to `index`, shifting the stages in between. This is the
    /// permutation a drag-and-drop of one tab produces.
    pub fn with_stage_moved(&self, stage: StageId, index: usize) -> Self {
        let index = index.min(STAGE_COUNT - 1);
        let from = self.position(stage);
        let mut stages = self.0;
        if from < index {
            stages[from..=index].rotate_left(1);
        } else {
            stages[index..=from].rotate_right(1);
        }
        Self(stages)
    }

    pub(crate) fn pack(self) -> u32 {
        self.0
            .iter()
            .enumerate()
            .fold(0, |acc, (i, s)| acc | (s.ordinal() << (i as u32 * PACK_BITS)))
    }

    pub(crate) fn unpack(packed: u32) -> Option<Self> {
        if packed >> (STAGE_COUNT as u32 * PACK_BITS) != 0 {
            return None;
        }
        let mut ordinals = [0u32; STAGE_COUNT];
        for (i, ordinal) in ordinals.iter_mut().enumerate() {
            *ordinal = (packed >> (i as u32 * PACK_BITS)) & PACK_MASK;
        }
        Self::from_ordinals(&ordinals)
    }
}

impl fmt::Display for DspOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, stage) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, " -> ")?;
            }
            write!(f, "{stage}")?;
        }
        Ok(())
    }
}

impl FromStr for DspOrder {
    type Err = anyhow::Error;

    /// Parses a comma separated list such as `general-filter,phase,chorus,over-drive,ladder-filter`.
    fn from_str(s: &str) -> Result<Self> {
        let names: Vec<&str> = s.split(',').map(str::trim).collect();
        if names.len() != STAGE_COUNT {
            bail!("expected {STAGE_COUNT} stages, got {}", names.len());
        }
        let mut stages = StageId::ALL;
        for (slot, name) in stages.iter_mut().zip(&names) {
            *slot = StageId::from_str(name, true)
                .map_err(anyhow::Error::msg)
                .with_context(|| format!("unknown stage '{name}'"))?;
        }
        Self::new(stages).with_context(|| format!("'{s}' lists a stage more than once"))
    }
}

/// Lock-free cell the render thread publishes its active order through.
pub struct SharedOrder(AtomicU32);

impl SharedOrder {
    pub fn new(order: DspOrder) -> Self {
        Self(AtomicU32::new(order.pack()))
    }

    pub fn store(&self, order: DspOrder) {
        self.0.store(order.pack(), Ordering::Release);
    }

    pub fn load(&self) -> DspOrder {
        DspOrder::unpack(self.0.load(Ordering::Acquire)).unwrap_or_default()
    }
}
