//! Ticket data model and request validation.

pub mod model;

pub use model::{AgentMessage, Category, MessageKind, Priority, Ticket};

use thiserror::Error;

/// Name the router records on its classification messages.
pub const ROUTER_AGENT: &str = "router_agent";
/// Handler for technical and training tickets.
pub const TECHNICAL_AGENT: &str = "technical_agent";
/// Handler for account and licensing tickets.
pub const ACCOUNT_AGENT: &str = "account_agent";

/// Audit channel for escalations raised by the technical agent.
pub const ESCALATION_QUEUE: &str = "escalation_queue";
/// Audit channel for license requests that need a manager.
pub const MANAGER_APPROVAL_QUEUE: &str = "manager_approval_queue";

/// Queue a routed ticket is recorded on: `<agent>_queue`.
pub fn agent_queue(agent: &str) -> String {
    format!("{agent}_queue")
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TicketError {
    #[error("invalid ticket field `{field}`: {reason}")]
    Validation { field: &'static str, reason: String },
}

fn require_non_blank(field: &'static str, value: &str) -> Result<(), TicketError> {
    if value.trim().is_empty() {
        return Err(TicketError::Validation {
            field,
            reason: "must not be empty".to_string(),
        });
    }
    Ok(())
}

fn validate_email(email: &str) -> Result<(), TicketError> {
    let mut parts = email.trim().split('@');
    let valid = match (parts.next(), parts.next(), parts.next()) {
        (Some(local), Some(domain), None) => !local.is_empty() && !domain.is_empty(),
        _ => false,
    };
    if valid {
        Ok(())
    } else {
        Err(TicketError::Validation {
            field: "user_email",
            reason: format!("'{email}' is not an email address"),
        })
    }
}

/// Reject tickets with missing identifiers or a malformed submitter address.
pub fn validate(ticket: &Ticket) -> Result<(), TicketError> {
    require_non_blank("ticket_id", &ticket.ticket_id)?;
    validate_email(&ticket.user_email)?;
    require_non_blank("department", &ticket.department)?;
    require_non_blank("subject", &ticket.subject)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ticket() -> Ticket {
        Ticket::new("T-1", "ana@bank.example", "Trading", "Dashboard", "slow")
    }

    #[test]
    fn valid_ticket_passes() {
        assert!(validate(&ticket()).is_ok());
    }

    #[test]
    fn blank_ticket_id_is_rejected() {
        let mut t = ticket();
        t.ticket_id = "  ".to_string();
        let err = validate(&t).unwrap_err();
        assert!(matches!(
            err,
            TicketError::Validation {
                field: "ticket_id",
                ..
            }
        ));
    }

    #[test]
    fn malformed_email_is_rejected() {
        for email in ["", "no-at-sign", "@bank.example", "ana@", "a@b@c"] {
            let mut t = ticket();
            t.user_email = email.to_string();
            assert!(validate(&t).is_err(), "{email} should be rejected");
        }
    }

    #[test]
    fn empty_description_is_allowed() {
        let mut t = ticket();
        t.description.clear();
        assert!(validate(&t).is_ok());
    }

    #[test]
    fn agent_queue_appends_suffix() {
        assert_eq!(agent_queue(TECHNICAL_AGENT), "technical_agent_queue");
    }
}
