//! Flat-record persistence for the learned tables.
//!
//! One record per state (six Q-values, shortest wait first) and one record per
//! (context, arm) pair. Records are written in index order, so saving the same
//! tables twice produces byte-identical files, and loading reproduces the
//! tables exactly. Loaded tables come back frozen.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::policy::style::{BetaParams, StylePolicy};
use crate::policy::timing::{QLearningParams, TimingPolicy};
use crate::policy::types::{StyleArm, StyleContext, TimingAction, TimingState};
use crate::policy::{PolicyError, PolicySet};

pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingRecord {
    pub state: String,
    /// Q-values for waits of 1, 3, 5, 7, 10, 14 days.
    pub q: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StyleRecord {
    pub context: String,
    pub arm: StyleArm,
    pub alpha: u64,
    pub beta: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyFile {
    pub format_version: u32,
    pub q_learning: QLearningParams,
    pub timing: Vec<TimingRecord>,
    pub style: Vec<StyleRecord>,
}

impl PolicyFile {
    pub fn from_policies(policies: &PolicySet) -> Self {
        let timing = TimingState::all()
            .map(|s| TimingRecord {
                state: s.to_string(),
                q: policies.timing.q_values(s).to_vec(),
            })
            .collect();

        let style = StyleContext::all()
            .flat_map(|c| {
                StyleArm::ALL.into_iter().map(move |arm| (c, arm))
            })
            .map(|(c, arm)| {
                let p = policies.style.posterior(c, arm);
                StyleRecord {
                    context: c.to_string(),
                    arm,
                    alpha: p.alpha,
                    beta: p.beta,
                }
            })
            .collect();

        Self {
            format_version: FORMAT_VERSION,
            q_learning: policies.timing.params(),
            timing,
            style,
        }
    }

    /// Rebuilds frozen tables. Every bucket must appear exactly once.
    pub fn into_policies(self) -> Result<PolicySet, PolicyError> {
        if self.format_version != FORMAT_VERSION {
            return Err(PolicyError::InvalidParams(format!(
                "unsupported policy format version {}",
                self.format_version
            )));
        }

        let mut q: Vec<Option<[f64; TimingAction::COUNT]>> = vec![None; TimingState::COUNT];
        for record in self.timing {
            let state: TimingState = record
                .state
                .parse()
                .map_err(|_| PolicyError::UnknownKey(record.state.clone()))?;
            let values: [f64; TimingAction::COUNT] = record.q.as_slice().try_into().map_err(|_| {
                PolicyError::InvalidParams(format!(
                    "state {} has {} Q-values, expected {}",
                    record.state,
                    record.q.len(),
                    TimingAction::COUNT
                ))
            })?;
            if q[state.index()].replace(values).is_some() {
                return Err(PolicyError::InvalidParams(format!(
                    "duplicate timing record for {state}"
                )));
            }
        }
        let mut table = Vec::with_capacity(TimingState::COUNT * TimingAction::COUNT);
        for (i, row) in q.into_iter().enumerate() {
            let row = row.ok_or_else(|| {
                PolicyError::InvalidParams(format!(
                    "missing timing record for {}",
                    TimingState::from_index(i)
                ))
            })?;
            table.extend_from_slice(&row);
        }

        let mut cells: Vec<Option<BetaParams>> = vec![None; StyleContext::COUNT * StyleArm::COUNT];
        for record in self.style {
            let context: StyleContext = record
                .context
                .parse()
                .map_err(|_| PolicyError::UnknownKey(record.context.clone()))?;
            let slot = context.index() * StyleArm::COUNT + record.arm.index();
            let params = BetaParams {
                alpha: record.alpha,
                beta: record.beta,
            };
            if cells[slot].replace(params).is_some() {
                return Err(PolicyError::InvalidParams(format!(
                    "duplicate style record for {context}/{}",
                    record.arm.as_str()
                )));
            }
        }
        let cells = cells
            .into_iter()
            .enumerate()
            .map(|(i, c)| {
                c.ok_or_else(|| {
                    PolicyError::InvalidParams(format!(
                        "missing style record for {}/{}",
                        StyleContext::from_index(i / StyleArm::COUNT),
                        StyleArm::ALL[i % StyleArm::COUNT].as_str()
                    ))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(PolicySet {
            timing: TimingPolicy::from_table(table, self.q_learning)?,
            style: StylePolicy::from_table(cells)?,
        })
    }
}

pub fn save(policies: &PolicySet, path: &Path) -> Result<(), PolicyError> {
    let file = PolicyFile::from_policies(policies);
    let json = serde_json::to_string_pretty(&file)?;
    std::fs::write(path, json)?;
    info!("Policy tables written to {}", path.display());
    Ok(())
}

pub fn load(path: &Path) -> Result<PolicySet, PolicyError> {
    let raw = std::fs::read_to_string(path)?;
    let file: PolicyFile = serde_json::from_str(&raw)?;
    let policies = file.into_policies()?;
    info!("Policy tables loaded from {} (frozen)", path.display());
    Ok(policies)
}
