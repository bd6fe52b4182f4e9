//! Commerce-platform boundary. The host platform owns entity storage and the
//! default language; the sync engine only ever reads through this trait.
//! `FileCatalog` backs the CLI with a JSON snapshot so sweeps can run without
//! a live platform.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

use crate::model::{Collection, EntityKind, Product, Variant};

#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// The platform's configured default language code; its translation is
    /// canonical for naming and slugging.
    async fn default_language(&self) -> Result<String>;

    async fn product(&self, id: i64) -> Result<Option<Product>>;

    async fn variant(&self, id: i64) -> Result<Option<Variant>>;

    async fn collection(&self, id: i64) -> Result<Option<Collection>>;

    /// All entity ids of a kind, ascending. Drives the reconciliation sweep.
    async fn entity_ids(&self, kind: EntityKind) -> Result<Vec<i64>>;
}

/// In-memory catalog, also the backing store of `FileCatalog`. BTreeMaps keep
/// `entity_ids` ordered by id.
#[derive(Debug, Default, Clone)]
pub struct MemoryCatalog {
    default_language: String,
    products: BTreeMap<i64, Product>,
    variants: BTreeMap<i64, Variant>,
    collections: BTreeMap<i64, Collection>,
}

impl MemoryCatalog {
    pub fn new(default_language: impl Into<String>) -> Self {
        Self {
            default_language: default_language.into(),
            ..Default::default()
        }
    }

    pub fn insert_product(&mut self, product: Product) {
        self.products.insert(product.id, product);
    }

    pub fn insert_variant(&mut self, variant: Variant) {
        self.variants.insert(variant.id, variant);
    }

    pub fn insert_collection(&mut self, collection: Collection) {
        self.collections.insert(collection.id, collection);
    }
}

#[async_trait]
impl CatalogSource for MemoryCatalog {
    async fn default_language(&self) -> Result<String> {
        Ok(self.default_language.clone())
    }

    async fn product(&self, id: i64) -> Result<Option<Product>> {
        Ok(self.products.get(&id).cloned())
    }

    async fn variant(&self, id: i64) -> Result<Option<Variant>> {
        Ok(self.variants.get(&id).cloned())
    }

    async fn collection(&self, id: i64) -> Result<Option<Collection>> {
        Ok(self.collections.get(&id).cloned())
    }

    async fn entity_ids(&self, kind: EntityKind) -> Result<Vec<i64>> {
        let ids = match kind {
            EntityKind::Product => self.products.keys().copied().collect(),
            EntityKind::Variant => self.variants.keys().copied().collect(),
            EntityKind::Collection => self.collections.keys().copied().collect(),
        };
        Ok(ids)
    }
}

/// JSON snapshot schema of a catalog export.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CatalogFile {
    default_language_code: String,
    #[serde(default)]
    products: Vec<Product>,
    #[serde(default)]
    variants: Vec<Variant>,
    #[serde(default)]
    collections: Vec<Collection>,
}

/// Load a catalog snapshot from a JSON file into a `MemoryCatalog`.
pub fn load_snapshot(path: &Path) -> Result<MemoryCatalog> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read catalog snapshot {}", path.display()))?;
    let file: CatalogFile = serde_json::from_str(&content)
        .with_context(|| format!("invalid catalog snapshot {}", path.display()))?;

    let mut catalog = MemoryCatalog::new(file.default_language_code);
    for product in file.products {
        catalog.insert_product(product);
    }
    for variant in file.variants {
        catalog.insert_variant(variant);
    }
    for collection in file.collections {
        catalog.insert_collection(collection);
    }
    Ok(catalog)
}
