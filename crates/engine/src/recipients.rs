//! Recipient resolution.
//!
//! Turns a structured [`RecipientConfig`] or a free-text recipient string
//! into concrete email addresses plus contact info, so step handlers never
//! embed contact-store knowledge. Free-text resolution applies a fixed
//! precedence cascade in which later stages are strictly more permissive,
//! and a total miss produces an error enumerating the owner's names,
//! departments, and tags so an upstream caller (human or LLM) can
//! self-correct.

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::{Result, bail};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use courier_types::{ContactFilter, ContactInfo, RecipientConfig, ResolvedRecipients};

use crate::store::ContactStore;

/// Syntactic email check; intentionally permissive.
static EMAIL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex"));

/// Resolves recipient specifications against a contact store.
#[derive(Clone)]
pub struct RecipientResolver {
    contacts: Arc<dyn ContactStore>,
}

impl RecipientResolver {
    pub fn new(contacts: Arc<dyn ContactStore>) -> Self {
        Self { contacts }
    }

    /// Resolves a structured recipient specification.
    ///
    /// An empty or unknown group yields an empty result rather than an
    /// error; handlers decide whether an empty recipient list is fatal.
    pub async fn resolve(&self, owner_id: &str, config: &RecipientConfig) -> Result<ResolvedRecipients> {
        let contacts = match config {
            RecipientConfig::Manual { emails } => emails.iter().map(|email| manual_contact(email)).collect(),
            RecipientConfig::Contacts { contact_ids } => self.contacts.contacts_by_ids(owner_id, contact_ids).await?,
            RecipientConfig::Group { group } => {
                let member_ids = self.contacts.group_member_ids(owner_id, group).await?;
                if member_ids.is_empty() {
                    debug!(%group, "group resolved to no members");
                    Vec::new()
                } else {
                    self.contacts.contacts_by_ids(owner_id, &member_ids).await?
                }
            }
            RecipientConfig::Filter { filter } => {
                let matched = self.contacts.contacts_matching(owner_id, filter).await?;
                apply_tag_filter(matched, filter)
            }
        };

        Ok(dedupe(contacts))
    }

    /// Resolves a free-text recipient string.
    ///
    /// Precedence, first non-empty match wins:
    /// 1. the text is itself a valid email address;
    /// 2. comma-separated input, each segment resolved and unioned;
    /// 3. exact name match; 4. exact department match; 5. exact tag match;
    /// 6. substring name match; 7. failure enumerating what is available.
    pub async fn resolve_from_text(&self, owner_id: &str, text: &str) -> Result<ResolvedRecipients> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            bail!("recipient text is empty");
        }

        if trimmed.contains(',') {
            let mut union = Vec::new();
            for segment in trimmed.split(',') {
                let segment = segment.trim();
                if segment.is_empty() {
                    continue;
                }
                union.extend(self.resolve_text_segment(owner_id, segment).await?.contacts);
            }
            return Ok(dedupe(union));
        }

        self.resolve_text_segment(owner_id, trimmed).await
    }

    async fn resolve_text_segment(&self, owner_id: &str, segment: &str) -> Result<ResolvedRecipients> {
        if EMAIL_RE.is_match(segment) {
            return Ok(dedupe(vec![manual_contact(segment)]));
        }

        let all_contacts = self.contacts.all_contacts(owner_id).await?;

        let exact_name: Vec<ContactInfo> = all_contacts
            .iter()
            .filter(|contact| contact.name.eq_ignore_ascii_case(segment))
            .cloned()
            .collect();
        if !exact_name.is_empty() {
            return Ok(dedupe(exact_name));
        }

        let by_department: Vec<ContactInfo> = all_contacts
            .iter()
            .filter(|contact| {
                contact
                    .department
                    .as_deref()
                    .is_some_and(|department| department.eq_ignore_ascii_case(segment))
            })
            .cloned()
            .collect();
        if !by_department.is_empty() {
            return Ok(dedupe(by_department));
        }

        let by_tag: Vec<ContactInfo> = all_contacts
            .iter()
            .filter(|contact| contact.tags.iter().any(|tag| tag.eq_ignore_ascii_case(segment)))
            .cloned()
            .collect();
        if !by_tag.is_empty() {
            return Ok(dedupe(by_tag));
        }

        let needle = segment.to_lowercase();
        let fuzzy_name: Vec<ContactInfo> = all_contacts
            .iter()
            .filter(|contact| contact.name.to_lowercase().contains(&needle))
            .cloned()
            .collect();
        if !fuzzy_name.is_empty() {
            return Ok(dedupe(fuzzy_name));
        }

        bail!(
            "no recipient matched '{}'; available names: [{}], departments: [{}], tags: [{}]",
            segment,
            enumerate(all_contacts.iter().map(|contact| contact.name.clone())),
            enumerate(all_contacts.iter().filter_map(|contact| contact.department.clone())),
            enumerate(all_contacts.iter().flat_map(|contact| contact.tags.clone())),
        );
    }
}

/// Tag portion of a filter, applied client-side: any filter tag appearing
/// among a contact's tags is a match.
fn apply_tag_filter(contacts: Vec<ContactInfo>, filter: &ContactFilter) -> Vec<ContactInfo> {
    if filter.tags.is_empty() {
        return contacts;
    }
    contacts
        .into_iter()
        .filter(|contact| {
            contact
                .tags
                .iter()
                .any(|tag| filter.tags.iter().any(|wanted| wanted.eq_ignore_ascii_case(tag)))
        })
        .collect()
}

/// Synthesizes a contact record for an explicit address, deriving a display
/// name from the local part (`jane.doe@…` becomes `Jane Doe`).
fn manual_contact(email: &str) -> ContactInfo {
    let local_part = email.split('@').next().unwrap_or(email);
    let name = local_part
        .split(['.', '_', '-'])
        .filter(|word| !word.is_empty())
        .map(capitalize)
        .collect::<Vec<_>>()
        .join(" ");

    ContactInfo {
        id: email.to_string(),
        name,
        email: email.to_string(),
        department: None,
        tags: Vec::new(),
        active: true,
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// Deduplicates by address (case-insensitive), preserving first-seen order.
fn dedupe(contacts: Vec<ContactInfo>) -> ResolvedRecipients {
    let mut seen = HashSet::new();
    let mut resolved = ResolvedRecipients::default();
    for contact in contacts {
        if seen.insert(contact.email.to_lowercase()) {
            resolved.emails.push(contact.email.clone());
            resolved.contacts.push(contact);
        }
    }
    resolved
}

fn enumerate(values: impl Iterator<Item = String>) -> String {
    let mut unique: Vec<String> = values.collect::<HashSet<_>>().into_iter().collect();
    unique.sort();
    unique.join(", ")
}
