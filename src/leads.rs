//! Contact-form leads: validation plus a create/list store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

const MAX_NAME_CHARS: usize = 200;
const MAX_EMAIL_CHARS: usize = 320;
const MAX_FIELD_CHARS: usize = 2_000;

/// Body of `POST /api/leads`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewLead {
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Page or campaign the lead came from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_interest: Option<String>,
}

impl NewLead {
    /// Checks the lead, returning the first problem found.
    pub fn validate(&self) -> Result<(), String> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err("name is required".to_string());
        }
        if name.chars().count() > MAX_NAME_CHARS {
            return Err(format!("name must be at most {MAX_NAME_CHARS} characters"));
        }
        if self.email.chars().count() > MAX_EMAIL_CHARS || !is_plausible_email(self.email.trim()) {
            return Err("email must be a valid email address".to_string());
        }

        let optional = [
            ("company", &self.company),
            ("phone", &self.phone),
            ("message", &self.message),
            ("source", &self.source),
            ("toolInterest", &self.tool_interest),
        ];
        for (field, value) in optional {
            if value.as_ref().is_some_and(|v| v.chars().count() > MAX_FIELD_CHARS) {
                return Err(format!("{field} must be at most {MAX_FIELD_CHARS} characters"));
            }
        }
        Ok(())
    }
}

/// `local@domain.tld` with no whitespace; deliverability is not checked.
fn is_plausible_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    let labels: Vec<&str> = domain.split('.').collect();
    labels.len() >= 2 && labels.iter().all(|label| !label.is_empty())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lead {
    pub id: Uuid,
    #[serde(flatten)]
    pub details: NewLead,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait LeadStore: Send + Sync {
    async fn create_lead(&self, lead: NewLead) -> anyhow::Result<Lead>;

    async fn get_leads(&self) -> anyhow::Result<Vec<Lead>>;
}

/// Process-local store; leads are lost on restart.
#[derive(Debug, Default)]
pub struct MemoryLeadStore {
    leads: RwLock<Vec<Lead>>,
}

impl MemoryLeadStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LeadStore for MemoryLeadStore {
    async fn create_lead(&self, lead: NewLead) -> anyhow::Result<Lead> {
        let lead = Lead {
            id: Uuid::new_v4(),
            details: NewLead {
                name: lead.name.trim().to_string(),
                email: lead.email.trim().to_string(),
                ..lead
            },
            created_at: Utc::now(),
        };
        self.leads.write().await.push(lead.clone());
        Ok(lead)
    }

    async fn get_leads(&self) -> anyhow::Result<Vec<Lead>> {
        Ok(self.leads.read().await.clone())
    }
}
