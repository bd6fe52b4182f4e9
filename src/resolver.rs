//! Relationship resolution across systems. Storyblok has no foreign keys, so
//! parent/child links are derived fresh on every sync: compute the expected
//! slug of the counterpart, look it up, and take its UUID. A counterpart that
//! is not there yet resolves to nothing, never to an error; the link appears
//! once the other side is synced and this one is synced again.

use crate::model::Product;
use crate::storyblok::{ContentError, ContentService};

const VARIANT_SLUG_SUFFIX: &str = "-variant-";

/// Deterministic slug of a variant entry: parent slug + fixed suffix + id.
pub fn variant_slug(parent_slug: &str, variant_id: i64) -> String {
    format!("{}{}{}", parent_slug, VARIANT_SLUG_SUFFIX, variant_id)
}

pub struct RelationshipResolver<'a> {
    content: &'a dyn ContentService,
}

impl<'a> RelationshipResolver<'a> {
    pub fn new(content: &'a dyn ContentService) -> Self {
        Self { content }
    }

    /// External UUIDs of a product's variant entries, in `variant_ids` order.
    /// Variants not yet present externally are omitted.
    pub async fn variants_of(
        &self,
        product: &Product,
        parent_slug: &str,
    ) -> Result<Vec<String>, ContentError> {
        if product.variant_ids.is_empty() {
            return Ok(Vec::new());
        }
        let slugs: Vec<String> = product
            .variant_ids
            .iter()
            .map(|id| variant_slug(parent_slug, *id))
            .collect();
        let found = self.content.find_by_slugs(&slugs).await?;
        Ok(slugs
            .iter()
            .filter_map(|slug| found.iter().find(|s| &s.slug == slug))
            .map(|s| s.uuid.clone())
            .collect())
    }

    /// External UUID of the parent product entry, if it has been synced.
    pub async fn parent_of(&self, parent_slug: &str) -> Result<Option<String>, ContentError> {
        let found = self.content.find_by_slug(parent_slug).await?;
        Ok(found.map(|s| s.uuid))
    }
}
