use serde::{Deserialize, Serialize};

use crate::error::{DripError, Result};

/// An outbound email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Email {
    pub to: String,
    pub from: String,
    pub subject: String,
    pub body: String,
}

impl Email {
    /// Domain part of the sender address.
    pub fn sender_domain(&self) -> Result<&str> {
        let mut parts = self.from.split('@');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(_), Some(domain), None) if !domain.is_empty() => Ok(domain),
            _ => Err(DripError::Mail(
                "invalid 'From' email address format".to_string(),
            )),
        }
    }
}

/// A stored email template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailTemplate {
    pub id: i64,
    pub subject: String,
    pub body: String,
}
