use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Commerce entity kinds mirrored into the content system.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Product,
    Variant,
    Collection,
}

impl EntityKind {
    /// Display name used in outcome messages ("Product update synced successfully").
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Product => "Product",
            EntityKind::Variant => "ProductVariant",
            EntityKind::Collection => "Collection",
        }
    }

    /// Storyblok component (content-type) name for this kind.
    pub fn component_name(&self) -> &'static str {
        match self {
            EntityKind::Product => "product",
            EntityKind::Variant => "product_variant",
            EntityKind::Collection => "collection",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum OperationType {
    Create,
    Update,
    Delete,
}

impl OperationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationType::Create => "create",
            OperationType::Update => "update",
            OperationType::Delete => "delete",
        }
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A unit of sync work. Carries only the entity identifier, never a data
/// snapshot: the processor re-fetches authoritative state at processing time,
/// so duplicate or out-of-order jobs converge on the current database state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncJob {
    pub entity_type: EntityKind,
    pub entity_id: i64,
    pub operation: OperationType,
    pub timestamp: DateTime<Utc>,
    pub retry_count: u32,
}

impl SyncJob {
    pub fn new(entity_type: EntityKind, entity_id: i64, operation: OperationType) -> Self {
        Self {
            entity_type,
            entity_id,
            operation,
            timestamp: Utc::now(),
            retry_count: 0,
        }
    }
}

/// Change notification kinds delivered by the commerce platform's event bus.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Updated,
    Deleted,
}

impl ChangeKind {
    pub fn operation(&self) -> OperationType {
        match self {
            ChangeKind::Created => OperationType::Create,
            ChangeKind::Updated => OperationType::Update,
            ChangeKind::Deleted => OperationType::Delete,
        }
    }
}

/// Affected entity id(s) of a change notification. A variant event can carry
/// several affected variants at once; the dispatcher fans it out.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum ChangedEntity {
    Product(i64),
    Variants(Vec<i64>),
    Collection(i64),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub entity: ChangedEntity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    Success,
    /// Entity has no default-language translation; nothing to sync. Not a failure.
    Skipped,
    /// Entity no longer exists in the commerce database; terminal, no retry.
    NotFound,
    /// Content API or catalog read failure; retryable by the bulk orchestrator.
    Failed,
}

/// Terminal result of one processing attempt. The processor never returns
/// `Err` across its contract; every failure is represented here.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncOutcome {
    #[serde(skip)]
    pub status: SyncStatus,
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl SyncOutcome {
    pub fn success(kind: EntityKind, operation: OperationType) -> Self {
        Self {
            status: SyncStatus::Success,
            success: true,
            message: format!("{} {} synced successfully", kind, operation),
            timestamp: Some(Utc::now()),
        }
    }

    pub fn skipped(message: impl Into<String>) -> Self {
        Self {
            status: SyncStatus::Skipped,
            success: true,
            message: message.into(),
            timestamp: None,
        }
    }

    pub fn not_found(kind: EntityKind, entity_id: i64) -> Self {
        Self {
            status: SyncStatus::NotFound,
            success: false,
            message: format!("{} with ID {} not found", kind, entity_id),
            timestamp: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: SyncStatus::Failed,
            success: false,
            message: message.into(),
            timestamp: None,
        }
    }

    /// Only transient failures are worth another attempt; a missing entity is
    /// presumed deleted and self-heals on the next sweep.
    pub fn is_retryable(&self) -> bool {
        self.status == SyncStatus::Failed
    }
}

/// Envelope for a single-entity sync at the trigger boundary: the outcome
/// paired with the id the caller asked about.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResponse {
    pub success: bool,
    pub message: String,
    pub entity_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl SyncResponse {
    pub fn new(entity_id: i64, outcome: SyncOutcome) -> Self {
        Self {
            success: outcome.success,
            message: outcome.message,
            entity_id,
            timestamp: outcome.timestamp,
        }
    }
}

/// One permanently failed entity within a bulk run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkFailure {
    pub entity_id: i64,
    pub error: String,
    pub attempts: u32,
}

/// Result of a full-catalog reconciliation sweep.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkOutcome {
    pub success: bool,
    pub total: usize,
    pub success_count: usize,
    pub error_count: usize,
    pub errors: Vec<BulkFailure>,
}

/// Per-language name/slug/description record attached to a commerce entity.
/// Products and collections carry `slug`/`description`; variants do not.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Translation {
    pub language_code: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

fn pick_language<'a>(
    translations: &'a [Translation],
    language_code: &str,
) -> Option<&'a Translation> {
    translations
        .iter()
        .find(|t| t.language_code == language_code)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: i64,
    #[serde(default)]
    pub translations: Vec<Translation>,
    #[serde(default)]
    pub variant_ids: Vec<i64>,
}

impl Product {
    pub fn translation(&self, language_code: &str) -> Option<&Translation> {
        pick_language(&self.translations, language_code)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Variant {
    pub id: i64,
    pub product_id: i64,
    #[serde(default)]
    pub translations: Vec<Translation>,
}

impl Variant {
    pub fn translation(&self, language_code: &str) -> Option<&Translation> {
        pick_language(&self.translations, language_code)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Collection {
    pub id: i64,
    #[serde(default)]
    pub translations: Vec<Translation>,
}

impl Collection {
    pub fn translation(&self, language_code: &str) -> Option<&Translation> {
        pick_language(&self.translations, language_code)
    }
}
