//! Push domain models and DTOs.

use serde::{Deserialize, Serialize};

/// Backend-assigned push identifier.
pub type PushId = i64;

/// A single revision (commit) included in a push.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Revision {
    pub revision: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub comments: String,
}

/// A code submission evaluated by CI.
///
/// Pushes are only ever created from backend payloads and are immutable once
/// loaded; the platform tree hanging off a push lives in the store's index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Push {
    pub id: PushId,
    pub revision: String,
    #[serde(default)]
    pub author: String,
    /// Seconds since the Unix epoch.
    pub push_timestamp: i64,
    /// Revisions in push order (tip first).
    #[serde(default)]
    pub revisions: Vec<Revision>,
    #[serde(default)]
    pub revision_count: Option<u32>,
}

impl Push {
    /// Summary of the tip revision for revision pickers.
    pub fn revision_tip(&self) -> RevisionTip {
        let title = self
            .revisions
            .first()
            .and_then(|r| r.comments.lines().next())
            .unwrap_or_default()
            .to_string();

        RevisionTip {
            revision: self.revision.clone(),
            author: self.author.clone(),
            title,
        }
    }
}

/// Tip revision of a loaded push.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RevisionTip {
    pub revision: String,
    pub author: String,
    pub title: String,
}

/// Server-declared bounds of the push range a listing was computed for.
///
/// Only the metadata of the first page is kept; it bounds which pushes may be
/// prepended by later polls.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushRangeMeta {
    #[serde(
        rename = "push_timestamp__gte",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub timestamp_gte: Option<i64>,
    #[serde(
        rename = "push_timestamp__lte",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub timestamp_lte: Option<i64>,
    #[serde(
        rename = "push_timestamp__lt",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub timestamp_lt: Option<i64>,
}

impl PushRangeMeta {
    /// Whether `push_timestamp` falls inside every bound that is present.
    pub fn contains(&self, push_timestamp: i64) -> bool {
        if let Some(gte) = self.timestamp_gte
            && push_timestamp < gte
        {
            return false;
        }
        if let Some(lte) = self.timestamp_lte
            && push_timestamp > lte
        {
            return false;
        }
        if let Some(lt) = self.timestamp_lt
            && push_timestamp >= lt
        {
            return false;
        }
        true
    }
}

/// Push listing response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PushListResponse {
    pub results: Vec<Push>,
    #[serde(default)]
    pub meta: PushRangeMeta,
}
