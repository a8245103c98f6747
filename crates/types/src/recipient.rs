//! Recipient specification and resolution result types.
//!
//! A `RecipientConfig` describes *who* a message goes to without naming
//! concrete addresses; the engine's recipient resolver turns it into a
//! `ResolvedRecipients` list against the owner's contact store.

use serde::{Deserialize, Serialize};

/// Tagged recipient specification attached to message-sending steps.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum RecipientConfig {
    /// Explicit addresses supplied directly on the step.
    Manual {
        #[serde(default)]
        emails: Vec<String>,
    },
    /// A specific set of the owner's contact records.
    Contacts {
        #[serde(default)]
        contact_ids: Vec<String>,
    },
    /// All members of a named contact group. An empty or missing group
    /// resolves to an empty recipient list, not an error.
    Group { group: String },
    /// All of the owner's contacts matching a filter.
    Filter { filter: ContactFilter },
}

/// Equality and tag filters applied to an owner's contact list.
///
/// `department` and `active` are equality filters evaluated at the data
/// layer; `tags` is matched client-side as "any filter tag appears among the
/// contact's tags", since tags are stored as an unordered list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ContactFilter {
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub active: Option<bool>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// One addressable contact as stored by the contact collaborator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContactInfo {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

/// Concrete, deduplicated resolution output consumed by step handlers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ResolvedRecipients {
    /// Deliverable addresses in first-seen order, deduplicated by address.
    pub emails: Vec<String>,
    /// Structured contact info aligned with `emails`; synthesized entries are
    /// used for manual addresses with no backing contact record.
    pub contacts: Vec<ContactInfo>,
}

impl ResolvedRecipients {
    /// Returns true when resolution produced no deliverable address.
    pub fn is_empty(&self) -> bool {
        self.emails.is_empty()
    }
}
