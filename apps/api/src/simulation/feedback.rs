//! Real application outcomes, replayed through the same learning path as
//! simulated episodes. Stored as JSON lines, one record per follow-up.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::policy::types::{
    CompanyCulture, CompanyType, ContactTitle, StyleArm, StyleContext, TimingAction, TimingState,
};
use crate::policy::{Episode, Outcome, PolicyError, PolicySet};

#[derive(Debug, Error)]
pub enum FeedbackError {
    #[error("failed to read feedback file: {0}")]
    Io(#[from] std::io::Error),

    #[error("feedback line {line} is not a valid record: {source}")]
    Parse {
        line: usize,
        source: serde_json::Error,
    },

    #[error("feedback line {line}: wait of {days} days is not one of 1, 3, 5, 7, 10, 14")]
    InvalidWait { line: usize, days: u32 },

    #[error(transparent)]
    Policy(#[from] PolicyError),
}

fn default_title() -> ContactTitle {
    ContactTitle::Recruiter
}

fn default_culture() -> CompanyCulture {
    CompanyCulture::Mixed
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackRecord {
    pub company_type: CompanyType,
    pub days_since_application: u32,
    pub has_connection: bool,
    #[serde(default = "default_title")]
    pub contact_title: ContactTitle,
    #[serde(default = "default_culture")]
    pub company_culture: CompanyCulture,
    /// Wait the applicant actually used before following up.
    pub wait_days: u32,
    pub style: StyleArm,
    pub responded: bool,
    #[serde(default)]
    pub interviewed: bool,
    /// Defaults to `wait_days` when the record does not say otherwise.
    #[serde(default)]
    pub days_waited: Option<u32>,
}

impl FeedbackRecord {
    /// `None` when the recorded wait is not one of the table's actions.
    pub fn to_episode(&self) -> Option<Episode> {
        let action = TimingAction::from_days(self.wait_days)?;
        let state = TimingState::new(self.days_since_application, self.company_type, self.has_connection);
        Some(Episode {
            state,
            context: StyleContext {
                contact_title: self.contact_title,
                culture: self.company_culture,
                has_connection: self.has_connection,
            },
            action,
            arm: self.style,
            next_state: state.advanced_by(self.days_since_application, action),
            outcome: Outcome {
                responded: self.responded,
                interviewed: self.responded && self.interviewed,
                days_waited: self.days_waited.unwrap_or(self.wait_days),
            },
        })
    }
}

/// Parses JSON-lines feedback. Blank lines and `#` comments are skipped.
pub fn parse_records(raw: &str) -> Result<Vec<(usize, FeedbackRecord)>, FeedbackError> {
    raw.lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
        .map(|(line_no, line)| {
            serde_json::from_str(line)
                .map(|record| (line_no, record))
                .map_err(|source| FeedbackError::Parse {
                    line: line_no,
                    source,
                })
        })
        .collect()
}

/// Feeds every record to `policies`. Fails on the first bad record so a
/// half-applied file is never mistaken for a complete one.
pub fn replay(policies: &mut PolicySet, records: &[(usize, FeedbackRecord)]) -> Result<usize, FeedbackError> {
    for (line, record) in records {
        let episode = record.to_episode().ok_or(FeedbackError::InvalidWait {
            line: *line,
            days: record.wait_days,
        })?;
        policies.learn(episode)?;
    }
    Ok(records.len())
}

pub fn replay_file(policies: &mut PolicySet, path: &Path) -> Result<usize, FeedbackError> {
    if !path.exists() {
        warn!("Feedback file {} not found; skipping replay", path.display());
        return Ok(0);
    }
    let raw = std::fs::read_to_string(path)?;
    let records = parse_records(&raw)?;
    let applied = replay(policies, &records)?;
    info!("Replayed {} feedback records from {}", applied, path.display());
    Ok(applied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::timing::QLearningParams;
    use std::io::Write;

    const FEEDBACK: &str = r#"
# outcomes exported from the tracker
{"company_type":"startup","days_since_application":4,"has_connection":true,"wait_days":3,"style":"connection_focused","responded":true,"interviewed":true}
{"company_type":"enterprise","days_since_application":12,"has_connection":false,"contact_title":"director","company_culture":"formal","wait_days":7,"style":"formal","responded":false,"days_waited":9}
"#;

    #[test]
    fn test_parse_skips_comments_and_blank_lines() {
        let records = parse_records(FEEDBACK).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].0, 3);
        assert_eq!(records[1].1.contact_title, ContactTitle::Director);
        assert_eq!(records[0].1.company_culture, CompanyCulture::Mixed);
    }

    #[test]
    fn test_record_becomes_episode_with_shaped_outcome() {
        let records = parse_records(FEEDBACK).unwrap();
        let ep = records[1].1.to_episode().unwrap();
        assert_eq!(ep.action, TimingAction::Wait7);
        assert_eq!(ep.outcome.days_waited, 9);
        assert_eq!(ep.outcome.reward(), -18.0);
        assert_eq!(ep.state.to_string(), "11+|enterprise|cold");
    }

    #[test]
    fn test_unknown_wait_is_rejected() {
        let line = r#"{"company_type":"midsize","days_since_application":1,"has_connection":false,"wait_days":4,"style":"casual","responded":true}"#;
        let records = parse_records(line).unwrap();
        let mut policies = PolicySet::new(QLearningParams::default());
        assert!(matches!(
            replay(&mut policies, &records),
            Err(FeedbackError::InvalidWait { line: 1, days: 4 })
        ));
    }

    #[test]
    fn test_malformed_line_reports_line_number() {
        let err = parse_records("{\"company_type\":\"startup\"}\n").unwrap_err();
        assert!(matches!(err, FeedbackError::Parse { line: 1, .. }));
    }

    #[test]
    fn test_replay_file_updates_policies() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(FEEDBACK.as_bytes()).unwrap();
        let mut policies = PolicySet::new(QLearningParams::default());

        let applied = replay_file(&mut policies, file.path()).unwrap();
        assert_eq!(applied, 2);
        let ctx = StyleContext {
            contact_title: ContactTitle::Recruiter,
            culture: CompanyCulture::Mixed,
            has_connection: true,
        };
        assert_eq!(policies.style.posterior(ctx, StyleArm::ConnectionFocused).alpha, 2);
    }

    #[test]
    fn test_replay_into_frozen_policies_fails() {
        let records = parse_records(FEEDBACK).unwrap();
        let mut policies = PolicySet::new(QLearningParams::default());
        policies.freeze();
        assert!(matches!(
            replay(&mut policies, &records),
            Err(FeedbackError::Policy(PolicyError::Frozen(_)))
        ));
    }

    #[test]
    fn test_missing_file_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let mut policies = PolicySet::new(QLearningParams::default());
        assert_eq!(replay_file(&mut policies, &dir.path().join("none.jsonl")).unwrap(), 0);
    }
}
