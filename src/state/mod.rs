use anyhow::{Context, Result, bail};
use log::warn;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::order::DspOrder;
use crate::params::ParamStore;

pub const STATE_VERSION: u32 = 1;

/// Serialised session: every parameter by display name plus the processing
/// order as one little-endian `u32` ordinal per stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginState {
    pub version: u32,
    #[serde(default)]
    pub params: BTreeMap<String, f32>,
    /// Anything that is not a byte array reads as empty, which `order()`
    /// then replaces with the default order.
    #[serde(default, deserialize_with = "lenient_bytes")]
    pub dsp_order: Vec<u8>,
}

fn lenient_bytes<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_default())
}

impl PluginState {
    pub fn capture(params: &ParamStore, order: DspOrder) -> Self {
        Self {
            version: STATE_VERSION,
            params: params
                .snapshot()
                .map(|(name, value)| (name.to_string(), value))
                .collect(),
            dsp_order: order.to_bytes().to_vec(),
        }
    }

    pub fn to_json(&self) -> Result<Vec<u8>> {
        serde_json::to_vec_pretty(self).context("Failed to serialize state")
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        let state: Self = serde_json::from_slice(bytes).context("Failed to parse state")?;
        if state.version > STATE_VERSION {
            bail!("state version {} is newer than {STATE_VERSION}", state.version);
        }
        Ok(state)
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let bytes = fs::read(path)
            .with_context(|| format!("Failed to read state file {}", path.display()))?;
        Self::from_json(&bytes)
    }

    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        fs::write(path, self.to_json()?)
            .with_context(|| format!("Failed to write state file {}", path.display()))
    }

    /// The stored order, or the default order when the blob is missing or
    /// not a permutation.
    pub fn order(&self) -> DspOrder {
        DspOrder::from_bytes(&self.dsp_order).unwrap_or_else(|| {
            warn!(
                "Stored processing order ({} bytes) is invalid, using default",
                self.dsp_order.len()
            );
            DspOrder::default()
        })
    }

    /// Writes every known parameter into `params`, clamped to its range.
    /// Returns how many entries were skipped as unknown.
    pub fn apply_params(&self, params: &ParamStore) -> usize {
        let mut skipped = 0;
        for (name, &value) in &self.params {
            match ParamStore::find(name) {
                Some(id) => {
                    params.set(id, value);
                }
                None => {
                    warn!("Ignoring unknown parameter '{name}' in state");
                    skipped += 1;
                }
            }
        }
        skipped
    }
}
