//! Ticket and agent message shapes exchanged between the router, the
//! specialist agents and the orchestrator.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Priority assigned by the classifier.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Critical,
    High,
    Medium,
    Low,
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ticket category; decides which specialist agent handles the ticket.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Technical,
    Account,
    Training,
}

impl Category {
    pub const ALL: [Category; 3] = [Self::Technical, Self::Account, Self::Training];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Technical => "technical",
            Self::Account => "account",
            Self::Training => "training",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_status() -> String {
    "open".to_string()
}

/// RFC 3339 timestamps, or ISO 8601 without an offset read as UTC.
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    if let Ok(parsed) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(parsed.with_timezone(&Utc));
    }
    raw.parse::<NaiveDateTime>()
        .map(|naive| naive.and_utc())
        .map_err(|e| serde::de::Error::custom(format!("invalid timestamp '{raw}': {e}")))
}

/// A support ticket as submitted by a client.
///
/// Only the router writes `category`, `priority` and `assigned_agent`;
/// everything else is fixed once the client creates the ticket.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Ticket {
    pub ticket_id: String,
    pub user_email: String,
    pub department: String,
    pub subject: String,
    pub description: String,
    #[serde(default)]
    pub category: Option<Category>,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub assigned_agent: Option<String>,
    #[serde(default = "default_status")]
    pub status: String,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub messages: Vec<serde_json::Value>,
}

impl Ticket {
    /// Build a fresh, unrouted ticket stamped with the current time.
    pub fn new(
        ticket_id: impl Into<String>,
        user_email: impl Into<String>,
        department: impl Into<String>,
        subject: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            ticket_id: ticket_id.into(),
            user_email: user_email.into(),
            department: department.into(),
            subject: subject.into(),
            description: description.into(),
            category: None,
            priority: None,
            assigned_agent: None,
            status: default_status(),
            created_at: Utc::now(),
            messages: Vec::new(),
        }
    }

    /// Subject and description joined by a single space.
    pub fn text(&self) -> String {
        format!("{} {}", self.subject, self.description)
    }

    /// Lowercased [`Ticket::text`], the form every keyword rule scans.
    pub fn normalized_text(&self) -> String {
        self.text().to_lowercase()
    }

    /// Serialize the ticket for a queue payload.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// What an [`AgentMessage`] records.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Classification,
    Response,
    Escalation,
}

/// A decision recorded by one component. Never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentMessage {
    pub agent_name: String,
    pub message_type: MessageKind,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub confidence_score: Option<f64>,
}

impl AgentMessage {
    pub fn new(agent_name: &str, kind: MessageKind, content: String, confidence: f64) -> Self {
        Self {
            agent_name: agent_name.to_string(),
            message_type: kind,
            content,
            timestamp: Utc::now(),
            confidence_score: Some(confidence),
        }
    }
}
