//! Collaborator store seams.
//!
//! The engine never talks to a database; it queries contacts, groups, and
//! integration credentials through these narrow async traits. Hosts plug in
//! their persistence layer, tests plug in the in-memory implementations
//! below.

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;

use courier_types::{ContactFilter, ContactInfo};

/// Read access to an owner's contacts and named groups.
#[async_trait]
pub trait ContactStore: Send + Sync {
    /// Contact records owned by `owner_id` restricted to the given id set.
    async fn contacts_by_ids(&self, owner_id: &str, contact_ids: &[String]) -> Result<Vec<ContactInfo>>;

    /// Contacts matching the equality portion of `filter` (department,
    /// active flag). Tag intersection is applied by the resolver, since tags
    /// are stored as an unordered list and are not indexed.
    async fn contacts_matching(&self, owner_id: &str, filter: &ContactFilter) -> Result<Vec<ContactInfo>>;

    /// All contacts owned by `owner_id`.
    async fn all_contacts(&self, owner_id: &str) -> Result<Vec<ContactInfo>>;

    /// Member ids of a named group; an unknown group yields an empty list.
    async fn group_member_ids(&self, owner_id: &str, group_name: &str) -> Result<Vec<String>>;
}

/// Stored chat integration record for one owner.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChatIntegration {
    pub id: String,
    /// OAuth access token for the channel-post API, when the integration
    /// completed the OAuth flow.
    pub access_token: Option<String>,
    /// Channel configured as the integration's default destination.
    pub default_channel: Option<String>,
    /// Webhook fallback stored on the integration record.
    pub webhook_url: Option<String>,
}

/// Read access to stored provider integrations.
#[async_trait]
pub trait IntegrationStore: Send + Sync {
    /// The owner's chat integration with the given id, if any.
    async fn chat_integration(&self, owner_id: &str, integration_id: &str) -> Result<Option<ChatIntegration>>;
}

/// In-memory [`ContactStore`] used by tests and demos.
#[derive(Debug, Clone, Default)]
pub struct MemoryContactStore {
    contacts: HashMap<String, Vec<ContactInfo>>,
    groups: HashMap<String, HashMap<String, Vec<String>>>,
}

impl MemoryContactStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_contact(mut self, owner_id: &str, contact: ContactInfo) -> Self {
        self.contacts.entry(owner_id.to_string()).or_default().push(contact);
        self
    }

    pub fn with_group(mut self, owner_id: &str, group_name: &str, member_ids: Vec<String>) -> Self {
        self.groups
            .entry(owner_id.to_string())
            .or_default()
            .insert(group_name.to_string(), member_ids);
        self
    }
}

#[async_trait]
impl ContactStore for MemoryContactStore {
    async fn contacts_by_ids(&self, owner_id: &str, contact_ids: &[String]) -> Result<Vec<ContactInfo>> {
        let owned = self.contacts.get(owner_id).cloned().unwrap_or_default();
        Ok(owned
            .into_iter()
            .filter(|contact| contact_ids.contains(&contact.id))
            .collect())
    }

    async fn contacts_matching(&self, owner_id: &str, filter: &ContactFilter) -> Result<Vec<ContactInfo>> {
        let owned = self.contacts.get(owner_id).cloned().unwrap_or_default();
        Ok(owned
            .into_iter()
            .filter(|contact| {
                let department_matches = filter
                    .department
                    .as_ref()
                    .is_none_or(|department| contact.department.as_deref() == Some(department.as_str()));
                let active_matches = filter.active.is_none_or(|active| contact.active == active);
                department_matches && active_matches
            })
            .collect())
    }

    async fn all_contacts(&self, owner_id: &str) -> Result<Vec<ContactInfo>> {
        Ok(self.contacts.get(owner_id).cloned().unwrap_or_default())
    }

    async fn group_member_ids(&self, owner_id: &str, group_name: &str) -> Result<Vec<String>> {
        Ok(self
            .groups
            .get(owner_id)
            .and_then(|groups| groups.get(group_name))
            .cloned()
            .unwrap_or_default())
    }
}

/// In-memory [`IntegrationStore`] used by tests and demos.
#[derive(Debug, Clone, Default)]
pub struct MemoryIntegrationStore {
    integrations: HashMap<String, Vec<ChatIntegration>>,
}

impl MemoryIntegrationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_integration(mut self, owner_id: &str, integration: ChatIntegration) -> Self {
        self.integrations.entry(owner_id.to_string()).or_default().push(integration);
        self
    }
}

#[async_trait]
impl IntegrationStore for MemoryIntegrationStore {
    async fn chat_integration(&self, owner_id: &str, integration_id: &str) -> Result<Option<ChatIntegration>> {
        Ok(self
            .integrations
            .get(owner_id)
            .and_then(|records| records.iter().find(|record| record.id == integration_id))
            .cloned())
    }
}
