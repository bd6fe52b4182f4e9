//! Content synchronization engine: mirrors commerce catalog entities
//! (products, variants, collections) into a Storyblok space. Change events
//! and full-catalog sweeps feed the same per-job pipeline, which re-fetches
//! authoritative state, derives relationship links by slug lookup, and issues
//! rate-limited upsert/delete calls until the external representation
//! converges on the commerce database.

pub mod catalog;
pub mod config;
pub mod dispatcher;
pub mod model;
pub mod processor;
pub mod reconcile;
pub mod resolver;
pub mod storyblok;
pub mod transform;
