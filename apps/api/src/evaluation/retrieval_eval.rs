//! Retrieval quality against labelled queries.
//!
//! Each query names the guidance categories a good answer should draw on.
//! Per query, precision is the share of distinct retrieved categories that
//! were expected and recall is the share of expected categories that were
//! retrieved. The report averages both and derives F1 from the averages.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::evaluation::EvaluationError;
use crate::retrieval::Retriever;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Easy => "easy",
            Self::Medium => "medium",
            Self::Hard => "hard",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelledQuery {
    pub query: String,
    pub expected_categories: Vec<String>,
    #[serde(default = "default_difficulty")]
    pub difficulty: Difficulty,
}

fn default_difficulty() -> Difficulty {
    Difficulty::Medium
}

/// Fifteen questions applicants actually ask, labelled with the knowledge
/// base categories that answer them.
pub fn default_queries() -> Vec<LabelledQuery> {
    use Difficulty::*;
    [
        ("When should I follow up with startups vs enterprise companies?", &["timing"][..], Easy),
        ("How do I write a good follow-up email?", &["message", "follow"][..], Easy),
        ("What if the hiring manager doesn't respond after 2 weeks?", &["follow"][..], Medium),
        ("Should I mention my connection in the first email?", &["message", "contact"][..], Medium),
        ("How to research company culture before applying?", &["company"][..], Easy),
        ("What's the best way to find hiring manager contact info?", &["contact"][..], Easy),
        ("How long should my follow-up email be?", &["follow"][..], Easy),
        ("What are common data analyst interview questions?", &["interview"][..], Easy),
        ("What did the learned policy discover about startup timing?", &["rl"][..], Medium),
        ("Should I use formal or casual tone for a tech startup?", &["message"][..], Medium),
        ("How many times should I follow up before giving up?", &["follow"][..], Medium),
        ("What's the optimal Q-value for enterprise follow-ups?", &["rl"][..], Hard),
        ("How to prepare for SQL technical interviews?", &["interview"][..], Easy),
        ("What message style works best with recruiters?", &["message", "rl"][..], Medium),
        ("How does Thompson Sampling choose message styles?", &["rl"][..], Hard),
    ]
    .into_iter()
    .map(|(query, categories, difficulty)| LabelledQuery {
        query: query.to_string(),
        expected_categories: categories.iter().map(|c| c.to_string()).collect(),
        difficulty,
    })
    .collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryScore {
    pub query: String,
    pub difficulty: Difficulty,
    pub expected_categories: Vec<String>,
    /// Category of every retrieved chunk, most similar first.
    pub retrieved_categories: Vec<String>,
    pub precision: f64,
    pub recall: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DifficultySummary {
    pub difficulty: Difficulty,
    pub queries: usize,
    pub mean_precision: f64,
    pub mean_recall: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RetrievalReport {
    pub top_k: usize,
    pub queries: Vec<QueryScore>,
    pub mean_precision: f64,
    pub mean_recall: f64,
    /// Harmonic mean of the two averages.
    pub f1: f64,
    pub by_difficulty: Vec<DifficultySummary>,
}

fn normalize(category: &str) -> String {
    category.trim().to_lowercase()
}

/// (precision, recall) of one retrieval. Categories compare case-insensitively.
pub fn score_categories(expected: &[String], retrieved: &[String]) -> (f64, f64) {
    let expected: BTreeSet<String> = expected.iter().map(|c| normalize(c)).collect();
    let retrieved: BTreeSet<String> = retrieved.iter().map(|c| normalize(c)).collect();
    let matches = expected.intersection(&retrieved).count() as f64;
    let precision = if retrieved.is_empty() {
        0.0
    } else {
        matches / retrieved.len() as f64
    };
    let recall = if expected.is_empty() {
        0.0
    } else {
        matches / expected.len() as f64
    };
    (precision, recall)
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 {
        0.0
    } else {
        sum / n as f64
    }
}

/// Runs every query through `retriever` with `top_k` and scores the
/// categories it brings back. An empty query list means the built-in set.
pub async fn evaluate_retrieval(
    retriever: &dyn Retriever,
    queries: &[LabelledQuery],
    top_k: usize,
) -> Result<RetrievalReport, EvaluationError> {
    if top_k == 0 {
        return Err(EvaluationError::InvalidSample("top_k must be at least 1".to_string()));
    }
    let defaults;
    let queries = if queries.is_empty() {
        defaults = default_queries();
        &defaults[..]
    } else {
        queries
    };
    if let Some(bad) = queries.iter().find(|q| q.expected_categories.is_empty()) {
        return Err(EvaluationError::InvalidSample(format!(
            "query '{}' has no expected categories",
            bad.query
        )));
    }

    info!("Evaluating retrieval on {} labelled queries (top_k {})", queries.len(), top_k);

    let mut scores = Vec::with_capacity(queries.len());
    for labelled in queries {
        let chunks = retriever
            .retrieve(&labelled.query, top_k)
            .await
            .map_err(|e| EvaluationError::Retrieval(format!("query '{}': {}", labelled.query, e)))?;
        let retrieved_categories: Vec<String> = chunks.into_iter().map(|c| c.category).collect();
        let (precision, recall) = score_categories(&labelled.expected_categories, &retrieved_categories);
        debug!(
            "'{}': precision {:.2}, recall {:.2}",
            labelled.query, precision, recall
        );
        scores.push(QueryScore {
            query: labelled.query.clone(),
            difficulty: labelled.difficulty,
            expected_categories: labelled.expected_categories.clone(),
            retrieved_categories,
            precision,
            recall,
        });
    }

    let mean_precision = mean(scores.iter().map(|s| s.precision));
    let mean_recall = mean(scores.iter().map(|s| s.recall));
    let f1 = if mean_precision + mean_recall > 0.0 {
        2.0 * mean_precision * mean_recall / (mean_precision + mean_recall)
    } else {
        0.0
    };

    let difficulties: BTreeSet<Difficulty> = scores.iter().map(|s| s.difficulty).collect();
    let by_difficulty = difficulties
        .into_iter()
        .map(|difficulty| {
            let group: Vec<&QueryScore> = scores.iter().filter(|s| s.difficulty == difficulty).collect();
            DifficultySummary {
                difficulty,
                queries: group.len(),
                mean_precision: mean(group.iter().map(|s| s.precision)),
                mean_recall: mean(group.iter().map(|s| s.recall)),
            }
        })
        .collect::<Vec<_>>();

    info!(
        "Retrieval: precision {:.1}%, recall {:.1}%, F1 {:.1}%",
        mean_precision * 100.0,
        mean_recall * 100.0,
        f1 * 100.0
    );
    for d in &by_difficulty {
        debug!(
            "{:<6} {} queries, precision {:.2}, recall {:.2}",
            d.difficulty.as_str(),
            d.queries,
            d.mean_precision,
            d.mean_recall
        );
    }

    Ok(RetrievalReport {
        top_k,
        queries: scores,
        mean_precision,
        mean_recall,
        f1,
        by_difficulty,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::*;

    fn chunk(id: &str, category: &str) -> crate::retrieval::RetrievedChunk {
        let mut c = sample_chunk(id, 0.8);
        c.category = category.to_string();
        c
    }

    fn labelled(query: &str, categories: &[&str], difficulty: Difficulty) -> LabelledQuery {
        LabelledQuery {
            query: query.to_string(),
            expected_categories: categories.iter().map(|c| c.to_string()).collect(),
            difficulty,
        }
    }

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_score_categories_uses_distinct_sets() {
        let (p, r) = score_categories(&strings(&["timing"]), &strings(&["timing", "Timing", "message"]));
        assert!((p - 0.5).abs() < 1e-12);
        assert!((r - 1.0).abs() < 1e-12);

        let (p, r) = score_categories(&strings(&["follow", "message"]), &[]);
        assert_eq!((p, r), (0.0, 0.0));
    }

    #[tokio::test]
    async fn test_report_averages_then_derives_f1() {
        let retriever = StaticRetriever::new(vec![chunk("a", "timing"), chunk("b", "message")]);
        let queries = vec![
            labelled("When should I follow up?", &["timing"], Difficulty::Easy),
            labelled("How do I write the email?", &["message", "follow"], Difficulty::Medium),
        ];
        let report = evaluate_retrieval(&retriever, &queries, 3).await.unwrap();

        assert_eq!(report.queries.len(), 2);
        assert_eq!(report.queries[0].retrieved_categories, strings(&["timing", "message"]));
        assert!((report.mean_precision - 0.5).abs() < 1e-12);
        assert!((report.mean_recall - 0.75).abs() < 1e-12);
        assert!((report.f1 - 0.6).abs() < 1e-12);

        assert_eq!(report.by_difficulty.len(), 2);
        assert_eq!(report.by_difficulty[0].difficulty, Difficulty::Easy);
        assert!((report.by_difficulty[0].mean_recall - 1.0).abs() < 1e-12);
        assert!((report.by_difficulty[1].mean_recall - 0.5).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_top_k_limits_retrieved_chunks() {
        let retriever = StaticRetriever::new(vec![chunk("a", "timing"), chunk("b", "message")]);
        let queries = vec![labelled("When?", &["timing"], Difficulty::Easy)];
        let report = evaluate_retrieval(&retriever, &queries, 1).await.unwrap();
        assert_eq!(report.queries[0].retrieved_categories, strings(&["timing"]));
        assert_eq!(report.f1, 1.0);
    }

    #[tokio::test]
    async fn test_empty_query_list_uses_built_in_set() {
        let retriever = StaticRetriever::new(vec![chunk("a", "rl")]);
        let report = evaluate_retrieval(&retriever, &[], 3).await.unwrap();
        assert_eq!(report.queries.len(), 15);
        let hard = report
            .by_difficulty
            .iter()
            .find(|d| d.difficulty == Difficulty::Hard)
            .unwrap();
        assert_eq!(hard.queries, 2);
        assert_eq!(hard.mean_recall, 1.0);
    }

    #[tokio::test]
    async fn test_retriever_failure_is_reported() {
        let queries = vec![labelled("When?", &["timing"], Difficulty::Easy)];
        let result = evaluate_retrieval(&FailingRetriever, &queries, 3).await;
        assert!(matches!(result, Err(EvaluationError::Retrieval(m)) if m.contains("When?")));
    }

    #[tokio::test]
    async fn test_invalid_inputs_are_rejected() {
        let retriever = StaticRetriever::new(vec![chunk("a", "timing")]);
        let unlabelled = vec![labelled("When?", &[], Difficulty::Easy)];
        assert!(matches!(
            evaluate_retrieval(&retriever, &unlabelled, 3).await,
            Err(EvaluationError::InvalidSample(_))
        ));
        assert!(matches!(
            evaluate_retrieval(&retriever, &[], 0).await,
            Err(EvaluationError::InvalidSample(_))
        ));
    }

    #[test]
    fn test_difficulty_defaults_to_medium_when_omitted() {
        let q: LabelledQuery =
            serde_json::from_str(r#"{"query": "How long?", "expected_categories": ["follow"]}"#).unwrap();
        assert_eq!(q.difficulty, Difficulty::Medium);
    }
}
