//! Pure commerce-entity → external-payload transformation. No I/O here:
//! relationship references are resolved by the caller and passed in.

use crate::model::{Collection, Product, Translation, Variant};

/// Relationship field of an external payload, one shape per entity kind.
/// Collections carry no relationship field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelationRefs {
    /// Product → external UUIDs of its variant entries.
    Variants(Vec<String>),
    /// Variant → external UUID of its parent product entry, if synced yet.
    ParentProduct(Option<String>),
    None,
}

/// What gets written to the content system for one entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalPayload {
    pub component: &'static str,
    pub name: String,
    pub slug: String,
    /// Stringified commerce id, the join key across systems.
    pub vendure_id: String,
    pub description: Option<String>,
    pub relation: RelationRefs,
}

/// View over the three entity kinds. The variant case carries its synthesized
/// slug (variants store no slug of their own; see `resolver::variant_slug`).
#[derive(Debug, Clone, Copy)]
pub enum EntityRef<'a> {
    Product(&'a Product),
    Variant { variant: &'a Variant, slug: &'a str },
    Collection(&'a Collection),
}

/// Build the external payload for an entity, or `None` when the entity has no
/// translation in the default language. A skip is not an error: such an
/// entity cannot be meaningfully named externally.
pub fn transform(
    entity: EntityRef<'_>,
    default_language: &str,
    relation: RelationRefs,
) -> Option<ExternalPayload> {
    match entity {
        EntityRef::Product(product) => {
            let t = product.translation(default_language)?;
            Some(ExternalPayload {
                component: "product",
                name: t.name.clone(),
                slug: canonical_slug(t),
                vendure_id: product.id.to_string(),
                description: t.description.clone(),
                relation,
            })
        }
        EntityRef::Variant { variant, slug } => {
            let t = variant.translation(default_language)?;
            Some(ExternalPayload {
                component: "product_variant",
                name: t.name.clone(),
                slug: slug.to_string(),
                vendure_id: variant.id.to_string(),
                description: None,
                relation,
            })
        }
        EntityRef::Collection(collection) => {
            let t = collection.translation(default_language)?;
            Some(ExternalPayload {
                component: "collection",
                name: t.name.clone(),
                slug: canonical_slug(t),
                vendure_id: collection.id.to_string(),
                description: t.description.clone(),
                relation: RelationRefs::None,
            })
        }
    }
}

/// The stored slug of the default-language translation; falls back to a
/// slugified name when the record carries none.
pub fn canonical_slug(t: &Translation) -> String {
    match t.slug.as_deref().filter(|s| !s.is_empty()) {
        Some(slug) => slug.to_string(),
        None => slugify(&t.name),
    }
}

/// Lowercase, alphanumerics kept, everything else collapsed into single dashes.
pub fn slugify(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut dash_pending = false;
    for c in name.chars() {
        if c.is_alphanumeric() {
            if dash_pending && !out.is_empty() {
                out.push('-');
            }
            dash_pending = false;
            for lower in c.to_lowercase() {
                out.push(lower);
            }
        } else {
            dash_pending = true;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Translation;

    fn translation(lang: &str, name: &str, slug: Option<&str>) -> Translation {
        Translation {
            language_code: lang.into(),
            name: name.into(),
            slug: slug.map(str::to_string),
            description: None,
        }
    }

    fn laptop() -> Product {
        Product {
            id: 1,
            translations: vec![translation("en", "Laptop Computer", Some("laptop-computer"))],
            variant_ids: vec![5, 6],
        }
    }

    #[test]
    fn product_payload_carries_vendure_id_and_variants() {
        let product = laptop();
        let payload = transform(
            EntityRef::Product(&product),
            "en",
            RelationRefs::Variants(vec!["uuid-5".into()]),
        )
        .unwrap();
        assert_eq!(payload.component, "product");
        assert_eq!(payload.vendure_id, "1");
        assert_eq!(payload.name, "Laptop Computer");
        assert_eq!(payload.slug, "laptop-computer");
        assert_eq!(
            payload.relation,
            RelationRefs::Variants(vec!["uuid-5".into()])
        );
    }

    #[test]
    fn transform_is_deterministic() {
        let product = laptop();
        let a = transform(EntityRef::Product(&product), "en", RelationRefs::None);
        let b = transform(EntityRef::Product(&product), "en", RelationRefs::None);
        assert_eq!(a, b);
    }

    #[test]
    fn missing_default_language_is_a_skip() {
        let product = Product {
            id: 2,
            translations: vec![translation("de", "Tastatur", Some("tastatur"))],
            variant_ids: vec![],
        };
        assert!(transform(EntityRef::Product(&product), "en", RelationRefs::None).is_none());
    }

    #[test]
    fn variant_uses_synthesized_slug() {
        let variant = Variant {
            id: 5,
            product_id: 1,
            translations: vec![translation("en", "Laptop 16GB", None)],
        };
        let payload = transform(
            EntityRef::Variant {
                variant: &variant,
                slug: "laptop-computer-variant-5",
            },
            "en",
            RelationRefs::ParentProduct(None),
        )
        .unwrap();
        assert_eq!(payload.component, "product_variant");
        assert_eq!(payload.slug, "laptop-computer-variant-5");
        assert_eq!(payload.vendure_id, "5");
        assert_eq!(payload.relation, RelationRefs::ParentProduct(None));
    }

    #[test]
    fn collection_carries_no_relation() {
        let collection = Collection {
            id: 9,
            translations: vec![translation("en", "Summer Sale", Some("summer-sale"))],
        };
        let payload = transform(
            EntityRef::Collection(&collection),
            "en",
            RelationRefs::None,
        )
        .unwrap();
        assert_eq!(payload.component, "collection");
        assert_eq!(payload.relation, RelationRefs::None);
    }

    #[test]
    fn slug_falls_back_to_slugified_name() {
        let collection = Collection {
            id: 9,
            translations: vec![translation("en", "Summer  Sale 2024!", None)],
        };
        let payload = transform(
            EntityRef::Collection(&collection),
            "en",
            RelationRefs::None,
        )
        .unwrap();
        assert_eq!(payload.slug, "summer-sale-2024");
    }

    #[test]
    fn slugify_basic() {
        assert_eq!(slugify("Laptop Computer"), "laptop-computer");
        assert_eq!(slugify("  A/B  Test  "), "a-b-test");
    }
}
