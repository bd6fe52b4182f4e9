//! Per-job sync pipeline. One attempt per call: re-fetch authoritative state,
//! resolve relationships, transform, then upsert or delete the external
//! entry. Retry policy belongs to the caller (the bulk orchestrator); this
//! module never returns `Err` across its contract.

use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::catalog::CatalogSource;
use crate::model::{EntityKind, OperationType, SyncJob, SyncOutcome, SyncStatus};
use crate::resolver::{variant_slug, RelationshipResolver};
use crate::storyblok::ContentService;
use crate::transform::{canonical_slug, transform, EntityRef, ExternalPayload, RelationRefs};

pub struct SyncProcessor {
    catalog: Arc<dyn CatalogSource>,
    content: Arc<dyn ContentService>,
}

impl SyncProcessor {
    pub fn new(catalog: Arc<dyn CatalogSource>, content: Arc<dyn ContentService>) -> Self {
        Self { catalog, content }
    }

    #[instrument(skip_all, fields(kind = %job.entity_type, id = job.entity_id, op = %job.operation))]
    pub async fn process(&self, job: &SyncJob) -> SyncOutcome {
        let outcome = match job.entity_type {
            EntityKind::Product => self.process_product(job).await,
            EntityKind::Variant => self.process_variant(job).await,
            EntityKind::Collection => self.process_collection(job).await,
        };
        match outcome.status {
            SyncStatus::Success => info!(message = %outcome.message, "job processed"),
            SyncStatus::Skipped => warn!(message = %outcome.message, "job skipped"),
            _ => warn!(message = %outcome.message, "job failed"),
        }
        outcome
    }

    async fn process_product(&self, job: &SyncJob) -> SyncOutcome {
        let product = match self.catalog.product(job.entity_id).await {
            Ok(Some(product)) => product,
            Ok(None) => return SyncOutcome::not_found(EntityKind::Product, job.entity_id),
            Err(err) => return load_failure(EntityKind::Product, job.entity_id, err),
        };
        let language = match self.catalog.default_language().await {
            Ok(language) => language,
            Err(err) => return SyncOutcome::failed(format!("failed to read default language: {err:#}")),
        };
        let Some(translation) = product.translation(&language) else {
            return skip_no_translation(EntityKind::Product, product.id, &language);
        };

        let slug = canonical_slug(translation);
        let resolver = RelationshipResolver::new(self.content.as_ref());
        let variant_refs = match resolver.variants_of(&product, &slug).await {
            Ok(refs) => refs,
            Err(err) => return SyncOutcome::failed(err.to_string()),
        };

        match transform(
            EntityRef::Product(&product),
            &language,
            RelationRefs::Variants(variant_refs),
        ) {
            Some(payload) => self.apply(job, payload).await,
            None => skip_no_translation(EntityKind::Product, product.id, &language),
        }
    }

    async fn process_variant(&self, job: &SyncJob) -> SyncOutcome {
        let variant = match self.catalog.variant(job.entity_id).await {
            Ok(Some(variant)) => variant,
            Ok(None) => return SyncOutcome::not_found(EntityKind::Variant, job.entity_id),
            Err(err) => return load_failure(EntityKind::Variant, job.entity_id, err),
        };
        // The parent supplies the slug prefix; a variant cannot be addressed
        // externally without it.
        let product = match self.catalog.product(variant.product_id).await {
            Ok(Some(product)) => product,
            Ok(None) => return SyncOutcome::not_found(EntityKind::Product, variant.product_id),
            Err(err) => return load_failure(EntityKind::Product, variant.product_id, err),
        };
        let language = match self.catalog.default_language().await {
            Ok(language) => language,
            Err(err) => return SyncOutcome::failed(format!("failed to read default language: {err:#}")),
        };
        let Some(parent_translation) = product.translation(&language) else {
            return SyncOutcome::skipped(format!(
                "ProductVariant {} skipped: parent Product {} has no translation for language '{}'",
                variant.id, product.id, language
            ));
        };

        let parent_slug = canonical_slug(parent_translation);
        let slug = variant_slug(&parent_slug, variant.id);
        let resolver = RelationshipResolver::new(self.content.as_ref());
        let parent_ref = match resolver.parent_of(&parent_slug).await {
            Ok(parent_ref) => parent_ref,
            Err(err) => return SyncOutcome::failed(err.to_string()),
        };

        match transform(
            EntityRef::Variant {
                variant: &variant,
                slug: &slug,
            },
            &language,
            RelationRefs::ParentProduct(parent_ref),
        ) {
            Some(payload) => self.apply(job, payload).await,
            None => skip_no_translation(EntityKind::Variant, variant.id, &language),
        }
    }

    async fn process_collection(&self, job: &SyncJob) -> SyncOutcome {
        let collection = match self.catalog.collection(job.entity_id).await {
            Ok(Some(collection)) => collection,
            Ok(None) => return SyncOutcome::not_found(EntityKind::Collection, job.entity_id),
            Err(err) => return load_failure(EntityKind::Collection, job.entity_id, err),
        };
        let language = match self.catalog.default_language().await {
            Ok(language) => language,
            Err(err) => return SyncOutcome::failed(format!("failed to read default language: {err:#}")),
        };

        match transform(
            EntityRef::Collection(&collection),
            &language,
            RelationRefs::None,
        ) {
            Some(payload) => self.apply(job, payload).await,
            None => skip_no_translation(EntityKind::Collection, collection.id, &language),
        }
    }

    /// Locate any existing entry by canonical slug, then create, update in
    /// place, or delete. Deleting an absent entry is a no-op success.
    async fn apply(&self, job: &SyncJob, payload: ExternalPayload) -> SyncOutcome {
        let existing = match self.content.find_by_slug(&payload.slug).await {
            Ok(existing) => existing,
            Err(err) => return SyncOutcome::failed(err.to_string()),
        };

        let result = match (job.operation, existing) {
            (OperationType::Delete, Some(entry)) => {
                self.content.delete_story(entry.id).await
            }
            (OperationType::Delete, None) => Ok(()),
            (_, Some(entry)) => self
                .content
                .update_story(entry.id, &payload)
                .await
                .map(|_| ()),
            (_, None) => self.content.create_story(&payload).await.map(|_| ()),
        };

        match result {
            Ok(()) => SyncOutcome::success(job.entity_type, job.operation),
            Err(err) => SyncOutcome::failed(format!(
                "{} {} failed: {}",
                job.entity_type, job.operation, err
            )),
        }
    }
}

fn skip_no_translation(kind: EntityKind, id: i64, language: &str) -> SyncOutcome {
    SyncOutcome::skipped(format!(
        "{} {} skipped: no translation for language '{}'",
        kind, id, language
    ))
}

fn load_failure(kind: EntityKind, id: i64, err: anyhow::Error) -> SyncOutcome {
    SyncOutcome::failed(format!("failed to load {} {}: {err:#}", kind, id))
}
