//! Account management agent: license capacity checks, removals and
//! permission reviews against the department table.

use async_trait::async_trait;
use regex::Regex;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};

use super::traits::{AgentError, HandleResponse, SupportAgent};
use crate::config::{AccountsConfig, DepartmentCapacity};
use crate::queue::{MessageQueue, Payload};
use crate::tickets::{
    AgentMessage, MessageKind, Ticket, ACCOUNT_AGENT, MANAGER_APPROVAL_QUEUE,
};

const CONFIDENCE: f64 = 0.95;
const ESCALATED_CONFIDENCE: f64 = 0.8;
const APPROVAL_REASON: &str = "Manager approval required for additional licenses";

fn number_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[0-9]+").expect("static regex"))
}

/// First run of ASCII digits in the text, or 1 when there is none. Oversized
/// literals saturate instead of wrapping.
pub fn requested_user_count(text: &str) -> u64 {
    number_pattern()
        .find(text)
        .map_or(1, |m| m.as_str().parse().unwrap_or(u64::MAX))
}

/// What the ticket asks the account desk to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountRequest {
    AddUsers,
    RemoveUsers,
    ReviewPermissions,
    Unclear,
}

impl AccountRequest {
    /// First matching rule wins: add, remove, permission review.
    pub fn detect(text: &str) -> Self {
        if text.contains("add") || text.contains("new user") {
            Self::AddUsers
        } else if text.contains("remove") || text.contains("disable") {
            Self::RemoveUsers
        } else if text.contains("permission") || text.contains("access") {
            Self::ReviewPermissions
        } else {
            Self::Unclear
        }
    }
}

/// Result of a license capacity check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CapacityCheck {
    Granted {
        available: u64,
        license_type: String,
    },
    Denied {
        reason: String,
        requires_approval: bool,
    },
}

/// Compare a request against the department's free seats. The table is
/// only read; a grant does not consume capacity.
pub fn check_user_capacity(
    departments: &BTreeMap<String, DepartmentCapacity>,
    department: &str,
    requested: u64,
) -> CapacityCheck {
    let Some(info) = departments.get(department) else {
        return CapacityCheck::Denied {
            reason: "Department not found".to_string(),
            requires_approval: false,
        };
    };

    let available = info.available();
    if requested <= available {
        CapacityCheck::Granted {
            available,
            license_type: info.licenses.clone(),
        }
    } else {
        CapacityCheck::Denied {
            reason: format!(
                "Insufficient licenses. Requested: {requested}, Available: {available}"
            ),
            requires_approval: true,
        }
    }
}

/// Reply text plus whether it needs a manager.
struct Reply {
    content: String,
    needs_approval: bool,
}

impl Reply {
    fn plain(content: String) -> Self {
        Self {
            content,
            needs_approval: false,
        }
    }
}

pub struct AccountAgent {
    accounts: AccountsConfig,
    queue: Arc<dyn MessageQueue>,
}

impl AccountAgent {
    pub fn new(accounts: AccountsConfig, queue: Arc<dyn MessageQueue>) -> Self {
        Self { accounts, queue }
    }

    fn add_users(&self, department: &str, requested: u64) -> Reply {
        match check_user_capacity(&self.accounts.departments, department, requested) {
            CapacityCheck::Granted { license_type, .. } => Reply::plain(format!(
                "✅ **Access Request Approved**\n\n\
                 I can provision {requested} new {license_type} license(s) for {department}.\n\n\
                 **Next Steps:**\n\
                 1. Please provide the new user email addresses\n\
                 2. Specify required dashboard access\n\
                 3. Accounts will be created within 2 business hours"
            )),
            CapacityCheck::Denied {
                reason,
                requires_approval: true,
            } => Reply {
                content: format!(
                    "⚠️ **Manager Approval Required**\n\n{reason}\n\n\
                     I've escalated this request to your department manager for additional license approval."
                ),
                needs_approval: true,
            },
            CapacityCheck::Denied { reason, .. } => {
                Reply::plain(format!("❌ **Request Error**\n\n{reason}"))
            }
        }
    }

    fn remove_users(department: &str) -> Reply {
        Reply::plain(format!(
            "✅ **User Removal Request**\n\n\
             I can process the user removal for {department}.\n\n\
             **Please confirm:**\n\
             1. User email address to remove\n\
             2. Data retention requirements\n\
             3. Effective date for access termination"
        ))
    }

    /// Unlike the capacity check, an unknown department is an error here.
    fn review_permissions(&self, department: &str) -> Result<Reply, AgentError> {
        let info = self
            .accounts
            .departments
            .get(department)
            .ok_or_else(|| AgentError::UnknownDepartment(department.to_string()))?;
        Ok(Reply::plain(format!(
            "🔑 **Permission Review**\n\n\
             I'll review the current access permissions for {department}.\n\n\
             **Current Setup:**\n\
             - License Type: {}\n\
             - Active Users: {}\n\n\
             Please specify what permission changes are needed.",
            info.licenses, info.current_users
        )))
    }

    fn reply(&self, ticket: &Ticket) -> Result<(AccountRequest, Reply), AgentError> {
        let text = ticket.normalized_text();
        let department = ticket.department.as_str();
        let request = AccountRequest::detect(&text);

        let reply = match request {
            AccountRequest::AddUsers => self.add_users(department, requested_user_count(&text)),
            AccountRequest::RemoveUsers => Self::remove_users(department),
            AccountRequest::ReviewPermissions => self.review_permissions(department)?,
            AccountRequest::Unclear => Reply::plain(
                "I need more details about this account request. Please specify if you need to add users, remove access, or modify permissions."
                    .to_string(),
            ),
        };
        Ok((request, reply))
    }

    async fn request_approval(&self, ticket: &Ticket) -> anyhow::Result<String> {
        let mut record = Payload::new();
        record.insert("ticket".to_string(), ticket.to_json());
        record.insert("action".to_string(), json!("escalate"));
        record.insert("escalated_by".to_string(), json!(ACCOUNT_AGENT));
        record.insert("reason".to_string(), json!(APPROVAL_REASON));
        record.insert(
            "timestamp".to_string(),
            json!(chrono::Utc::now().to_rfc3339()),
        );
        self.queue.push(MANAGER_APPROVAL_QUEUE, record).await
    }
}

#[async_trait]
impl SupportAgent for AccountAgent {
    async fn handle(&self, ticket: &Ticket) -> Result<HandleResponse, AgentError> {
        let (request, reply) = self.reply(ticket)?;

        if reply.needs_approval {
            let message_id = self.request_approval(ticket).await?;
            tracing::info!(
                ticket_id = %ticket.ticket_id,
                department = %ticket.department,
                %message_id,
                "License request sent for manager approval"
            );
        }

        tracing::info!(
            ticket_id = %ticket.ticket_id,
            request = ?request,
            escalated = reply.needs_approval,
            "Account ticket handled"
        );

        let confidence = if reply.needs_approval {
            ESCALATED_CONFIDENCE
        } else {
            CONFIDENCE
        };
        let response = AgentMessage::new(
            ACCOUNT_AGENT,
            MessageKind::Response,
            reply.content,
            confidence,
        );
        Ok(HandleResponse::handled(response, reply.needs_approval))
    }

    fn name(&self) -> &str {
        ACCOUNT_AGENT
    }
}
