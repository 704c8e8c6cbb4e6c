//! Stage results. A stage either completes with its value or reports why it
//! could not; degradations are values that flow into the final
//! recommendation, never errors that abort the request.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Retrieval,
    Generation,
    Contacts,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    /// No retriever is configured.
    RetrievalUnavailable,
    RetrievalEmpty,
    RetrievalLowSimilarity,
    RetrievalFailed,
    /// Rate limits or timeouts outlasted every retry.
    GenerationExhausted,
    /// The service refused the request or returned unusable output.
    GenerationFatal,
    ContactsNotFound,
}

impl NoticeKind {
    pub fn stage(&self) -> Stage {
        match self {
            Self::RetrievalUnavailable
            | Self::RetrievalEmpty
            | Self::RetrievalLowSimilarity
            | Self::RetrievalFailed => Stage::Retrieval,
            Self::GenerationExhausted | Self::GenerationFatal => Stage::Generation,
            Self::ContactsNotFound => Stage::Contacts,
        }
    }

    /// Whether this notice means a chain produced no narrative.
    pub fn drops_narrative(&self) -> bool {
        self.stage() == Stage::Generation
    }
}

/// One recorded degradation, surfaced on the recommendation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notice {
    pub stage: Stage,
    pub kind: NoticeKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chain: Option<&'static str>,
    pub detail: String,
}

impl Notice {
    pub fn new(kind: NoticeKind, chain: Option<&'static str>, detail: impl Into<String>) -> Self {
        Self {
            stage: kind.stage(),
            kind,
            chain,
            detail: detail.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum StageOutcome<T> {
    Complete(T),
    Degraded(Notice),
}

impl<T> StageOutcome<T> {
    /// Splits into the value, recording the notice on degradation.
    pub fn record(self, notices: &mut Vec<Notice>) -> Option<T> {
        match self {
            Self::Complete(v) => Some(v),
            Self::Degraded(notice) => {
                notices.push(notice);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_collects_notices() {
        let mut notices = Vec::new();
        let ok: StageOutcome<u8> = StageOutcome::Complete(3);
        assert_eq!(ok.record(&mut notices), Some(3));
        let bad: StageOutcome<u8> = StageOutcome::Degraded(Notice::new(
            NoticeKind::GenerationExhausted,
            Some("timing_advisor"),
            "rate limited 3 times",
        ));
        assert_eq!(bad.record(&mut notices), None);
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].stage, Stage::Generation);
        assert!(notices[0].kind.drops_narrative());
    }

    #[test]
    fn test_retrieval_notices_keep_narrative() {
        assert!(!NoticeKind::RetrievalLowSimilarity.drops_narrative());
        assert_eq!(NoticeKind::ContactsNotFound.stage(), Stage::Contacts);
    }
}
