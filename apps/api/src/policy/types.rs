//! Discretised lookup keys for the learned tables.
//!
//! Every state and context is a small closed product of enums, so a bucket
//! outside the table cannot be constructed from typed values. Index decoding
//! from raw integers asserts its range: an out-of-range index is a caller bug.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ────────────────────────────────────────────────────────────────────────────
// Timing state
// ────────────────────────────────────────────────────────────────────────────

/// Days elapsed since the application was submitted, bucketed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DaysBucket {
    #[serde(rename = "0-2")]
    Fresh,
    #[serde(rename = "3-5")]
    Early,
    #[serde(rename = "6-10")]
    Waiting,
    #[serde(rename = "11+")]
    Stale,
}

impl DaysBucket {
    pub const ALL: [DaysBucket; 4] = [Self::Fresh, Self::Early, Self::Waiting, Self::Stale];

    pub fn from_days(days: u32) -> Self {
        match days {
            0..=2 => Self::Fresh,
            3..=5 => Self::Early,
            6..=10 => Self::Waiting,
            _ => Self::Stale,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fresh => "0-2",
            Self::Early => "3-5",
            Self::Waiting => "6-10",
            Self::Stale => "11+",
        }
    }

    fn index(&self) -> usize {
        *self as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompanyType {
    Startup,
    Midsize,
    Enterprise,
}

impl CompanyType {
    pub const ALL: [CompanyType; 3] = [Self::Startup, Self::Midsize, Self::Enterprise];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Startup => "startup",
            Self::Midsize => "midsize",
            Self::Enterprise => "enterprise",
        }
    }
}

impl FromStr for CompanyType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "startup" => Ok(Self::Startup),
            "midsize" | "mid-size" => Ok(Self::Midsize),
            "enterprise" => Ok(Self::Enterprise),
            other => Err(format!(
                "unknown company_type '{other}' (expected startup, midsize or enterprise)"
            )),
        }
    }
}

/// Situational state the timing table is keyed by. 4 × 3 × 2 = 24 buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimingState {
    pub days: DaysBucket,
    pub company: CompanyType,
    pub has_connection: bool,
}

impl TimingState {
    pub const COUNT: usize = 24;

    pub fn new(days_since_application: u32, company: CompanyType, has_connection: bool) -> Self {
        Self {
            days: DaysBucket::from_days(days_since_application),
            company,
            has_connection,
        }
    }

    pub fn index(&self) -> usize {
        self.days.index() * 6 + (self.company as usize) * 2 + usize::from(self.has_connection)
    }

    pub fn from_index(index: usize) -> Self {
        assert!(
            index < Self::COUNT,
            "timing state index {index} outside the {} defined buckets",
            Self::COUNT
        );
        Self {
            days: DaysBucket::ALL[index / 6],
            company: CompanyType::ALL[(index % 6) / 2],
            has_connection: index % 2 == 1,
        }
    }

    pub fn all() -> impl Iterator<Item = TimingState> {
        (0..Self::COUNT).map(Self::from_index)
    }

    /// State observed after waiting `waited` on top of `elapsed_days` since applying.
    pub fn advanced_by(&self, elapsed_days: u32, waited: TimingAction) -> Self {
        Self::new(elapsed_days + waited.days(), self.company, self.has_connection)
    }
}

impl fmt::Display for TimingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}|{}|{}",
            self.days.as_str(),
            self.company.as_str(),
            connection_str(self.has_connection)
        )
    }
}

impl FromStr for TimingState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('|').collect();
        let [days, company, connection] = parts.as_slice() else {
            return Err(format!("malformed timing state key '{s}'"));
        };
        let days = DaysBucket::ALL
            .into_iter()
            .find(|b| b.as_str() == *days)
            .ok_or_else(|| format!("unknown days bucket '{days}'"))?;
        Ok(Self {
            days,
            company: company.parse()?,
            has_connection: parse_connection(connection)?,
        })
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Timing action
// ────────────────────────────────────────────────────────────────────────────

/// Wait duration before the follow-up, ordered shortest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TimingAction {
    Wait1,
    Wait3,
    Wait5,
    Wait7,
    Wait10,
    Wait14,
}

impl TimingAction {
    pub const COUNT: usize = 6;
    pub const ALL: [TimingAction; 6] = [
        Self::Wait1,
        Self::Wait3,
        Self::Wait5,
        Self::Wait7,
        Self::Wait10,
        Self::Wait14,
    ];

    pub fn days(&self) -> u32 {
        match self {
            Self::Wait1 => 1,
            Self::Wait3 => 3,
            Self::Wait5 => 5,
            Self::Wait7 => 7,
            Self::Wait10 => 10,
            Self::Wait14 => 14,
        }
    }

    pub fn index(&self) -> usize {
        *self as usize
    }

    pub fn from_index(index: usize) -> Self {
        assert!(index < Self::COUNT, "timing action index {index} out of range");
        Self::ALL[index]
    }

    pub fn from_days(days: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.days() == days)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Style context
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContactTitle {
    Recruiter,
    Manager,
    Director,
    Executive,
}

impl ContactTitle {
    pub const ALL: [ContactTitle; 4] = [
        Self::Recruiter,
        Self::Manager,
        Self::Director,
        Self::Executive,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Recruiter => "recruiter",
            Self::Manager => "manager",
            Self::Director => "director",
            Self::Executive => "executive",
        }
    }
}

impl FromStr for ContactTitle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "recruiter" => Ok(Self::Recruiter),
            "manager" | "hiring manager" => Ok(Self::Manager),
            "director" => Ok(Self::Director),
            "executive" => Ok(Self::Executive),
            other => Err(format!(
                "unknown contact_title '{other}' (expected recruiter, manager, director or executive)"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompanyCulture {
    Casual,
    Formal,
    Mixed,
}

impl CompanyCulture {
    pub const ALL: [CompanyCulture; 3] = [Self::Casual, Self::Formal, Self::Mixed];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Casual => "casual",
            Self::Formal => "formal",
            Self::Mixed => "mixed",
        }
    }
}

impl FromStr for CompanyCulture {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "casual" => Ok(Self::Casual),
            "formal" => Ok(Self::Formal),
            "mixed" => Ok(Self::Mixed),
            other => Err(format!(
                "unknown company_culture '{other}' (expected casual, formal or mixed)"
            )),
        }
    }
}

/// Context the style bandit is keyed by. 4 × 3 × 2 = 24 contexts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StyleContext {
    pub contact_title: ContactTitle,
    pub culture: CompanyCulture,
    pub has_connection: bool,
}

impl StyleContext {
    pub const COUNT: usize = 24;

    pub fn index(&self) -> usize {
        (self.contact_title as usize) * 6 + (self.culture as usize) * 2 + usize::from(self.has_connection)
    }

    pub fn from_index(index: usize) -> Self {
        assert!(
            index < Self::COUNT,
            "style context index {index} outside the {} defined contexts",
            Self::COUNT
        );
        Self {
            contact_title: ContactTitle::ALL[index / 6],
            culture: CompanyCulture::ALL[(index % 6) / 2],
            has_connection: index % 2 == 1,
        }
    }

    pub fn all() -> impl Iterator<Item = StyleContext> {
        (0..Self::COUNT).map(Self::from_index)
    }
}

impl fmt::Display for StyleContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}|{}|{}",
            self.contact_title.as_str(),
            self.culture.as_str(),
            connection_str(self.has_connection)
        )
    }
}

impl FromStr for StyleContext {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('|').collect();
        let [title, culture, connection] = parts.as_slice() else {
            return Err(format!("malformed style context key '{s}'"));
        };
        Ok(Self {
            contact_title: title.parse()?,
            culture: culture.parse()?,
            has_connection: parse_connection(connection)?,
        })
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Style arm
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StyleArm {
    Formal,
    Casual,
    ConnectionFocused,
}

impl StyleArm {
    pub const COUNT: usize = 3;
    pub const ALL: [StyleArm; 3] = [Self::Formal, Self::Casual, Self::ConnectionFocused];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Formal => "formal",
            Self::Casual => "casual",
            Self::ConnectionFocused => "connection_focused",
        }
    }

    pub fn index(&self) -> usize {
        *self as usize
    }
}

impl FromStr for StyleArm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|a| a.as_str() == s.trim())
            .ok_or_else(|| format!("unknown style '{s}'"))
    }
}

fn connection_str(has_connection: bool) -> &'static str {
    if has_connection {
        "connection"
    } else {
        "cold"
    }
}

fn parse_connection(s: &str) -> Result<bool, String> {
    match s {
        "connection" => Ok(true),
        "cold" => Ok(false),
        other => Err(format!("unknown connection flag '{other}'")),
    }
}
