//! Contact discovery: who at the company is worth following up with.
//!
//! Providers are tried in priority order. A provider that errors or finds
//! nobody hands over to the next one; the first non-empty answer wins.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum ContactError {
    #[error("contact provider {0} is unavailable")]
    Unavailable(String),

    #[error("could not parse contact data: {0}")]
    Parse(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub name: String,
    pub role: String,
    /// Higher is more relevant; providers use [0, 1].
    pub relevance: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

#[async_trait]
pub trait ContactProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn find_contacts(&self, company: &str) -> Result<Vec<Contact>, ContactError>;
}

// ────────────────────────────────────────────────────────────────────────────
// Chain
// ────────────────────────────────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct ContactChain {
    providers: Vec<Arc<dyn ContactProvider>>,
}

impl ContactChain {
    pub fn new(providers: Vec<Arc<dyn ContactProvider>>) -> Self {
        Self { providers }
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Contacts from the first provider that returns any, most relevant first.
    /// An exhausted chain yields an empty list.
    pub async fn find_contacts(&self, company: &str) -> Vec<Contact> {
        for provider in &self.providers {
            match provider.find_contacts(company).await {
                Ok(contacts) if !contacts.is_empty() => {
                    debug!(
                        "Provider {} found {} contacts at {}",
                        provider.name(),
                        contacts.len(),
                        company
                    );
                    let mut contacts: Vec<Contact> = contacts
                        .into_iter()
                        .map(|mut c| {
                            c.source.get_or_insert_with(|| provider.name().to_string());
                            c
                        })
                        .collect();
                    contacts.sort_by(|a, b| b.relevance.total_cmp(&a.relevance));
                    return contacts;
                }
                Ok(_) => debug!("Provider {} found nobody at {}", provider.name(), company),
                Err(e) => warn!("Provider {} failed for {}: {}", provider.name(), company, e),
            }
        }
        Vec::new()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Directory provider
// ────────────────────────────────────────────────────────────────────────────

/// Static company → contacts directory loaded from a JSON object.
/// Company names match case-insensitively.
pub struct DirectoryProvider {
    entries: HashMap<String, Vec<Contact>>,
}

impl DirectoryProvider {
    pub fn new(entries: HashMap<String, Vec<Contact>>) -> Self {
        Self {
            entries: entries
                .into_iter()
                .map(|(company, contacts)| (normalize(&company), contacts))
                .collect(),
        }
    }

    pub fn load(path: &Path) -> Result<Self, ContactError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ContactError::Unavailable(format!("directory {}: {e}", path.display())))?;
        let entries: HashMap<String, Vec<Contact>> =
            serde_json::from_str(&raw).map_err(|e| ContactError::Parse(e.to_string()))?;
        info!("Loaded contact directory for {} companies", entries.len());
        Ok(Self::new(entries))
    }
}

fn normalize(company: &str) -> String {
    company.trim().to_lowercase()
}

#[async_trait]
impl ContactProvider for DirectoryProvider {
    fn name(&self) -> &str {
        "directory"
    }

    async fn find_contacts(&self, company: &str) -> Result<Vec<Contact>, ContactError> {
        Ok(self.entries.get(&normalize(company)).cloned().unwrap_or_default())
    }
}
