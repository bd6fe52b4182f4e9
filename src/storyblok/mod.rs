use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode, Url};
use serde_json::{json, Map, Value};
use std::fmt;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{Mutex, OnceCell};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::config;
use crate::model::EntityKind;
use crate::storyblok::model::{
    Component, ComponentsResponse, StoriesResponse, StoryRef, StoryResponse,
};
use crate::transform::{ExternalPayload, RelationRefs};

pub mod model;

const STORYBLOK_API_BASE: &str = "https://mapi.storyblok.com/v1/";

/// Failures at the content-API boundary.
#[derive(Debug, Error)]
pub enum ContentError {
    #[error("storyblok error {status}: {body}")]
    Api { status: StatusCode, body: String },
    #[error("failed to reach Storyblok: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("invalid Storyblok response JSON: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("invalid Storyblok resource path: {0}")]
    InvalidResource(String),
    #[error("schema readiness gate not ready after {waited_ms}ms")]
    InitializationTimeout { waited_ms: u64 },
}

/// Narrow contract every other component depends on; the Storyblok client is
/// the only implementation that performs network I/O.
#[async_trait]
pub trait ContentService: Send + Sync {
    async fn find_by_slug(&self, slug: &str) -> Result<Option<StoryRef>, ContentError>;

    /// Batched slug lookup (`by_slugs` comma-joined). Missing slugs are simply
    /// absent from the result.
    async fn find_by_slugs(&self, slugs: &[String]) -> Result<Vec<StoryRef>, ContentError>;

    async fn search_by_name(&self, name: &str) -> Result<Vec<StoryRef>, ContentError>;

    async fn create_story(&self, payload: &ExternalPayload) -> Result<StoryRef, ContentError>;

    async fn update_story(
        &self,
        story_id: u64,
        payload: &ExternalPayload,
    ) -> Result<StoryRef, ContentError>;

    async fn delete_story(&self, story_id: u64) -> Result<(), ContentError>;
}

/// Spaces outbound calls so consecutive starts are never closer than
/// `1s / rate_per_second`. The lock is held across the sleep, which is
/// what serializes concurrent callers into evenly paced slots.
pub struct RateLimiter {
    min_interval: Duration,
    last_call: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(rate_per_second: u32) -> Self {
        let rate = rate_per_second.max(1);
        Self {
            min_interval: Duration::from_secs_f64(1.0 / f64::from(rate)),
            last_call: Mutex::new(None),
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    pub async fn acquire(&self) {
        let mut last = self.last_call.lock().await;
        if let Some(prev) = *last {
            let next = prev + self.min_interval;
            if next > Instant::now() {
                tokio::time::sleep_until(next).await;
            }
        }
        *last = Some(Instant::now());
    }
}

/// One-shot readiness barrier. The first caller runs the init future and
/// every concurrent caller awaits that same completion. A failed or
/// timed-out init leaves the cell empty, so the next caller retries.
pub struct ReadinessGate {
    cell: OnceCell<()>,
    timeout: Duration,
}

impl ReadinessGate {
    pub fn new(timeout: Duration) -> Self {
        Self {
            cell: OnceCell::new(),
            timeout,
        }
    }

    pub async fn ensure<F, Fut>(&self, init: F) -> Result<(), ContentError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(), ContentError>>,
    {
        let pending = self.cell.get_or_try_init(init);
        match tokio::time::timeout(self.timeout, pending).await {
            Ok(res) => res.map(|_| ()),
            Err(_) => {
                let waited_ms = self.timeout.as_millis() as u64;
                error!(waited_ms, "readiness gate timed out");
                Err(ContentError::InitializationTimeout { waited_ms })
            }
        }
    }
}

pub struct StoryblokClient {
    http: Client,
    base_url: Url,
    token: String,
    space_id: String,
    limiter: RateLimiter,
    gate: ReadinessGate,
}

impl fmt::Debug for StoryblokClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoryblokClient")
            .field("base_url", &self.base_url)
            .field("space_id", &self.space_id)
            .finish_non_exhaustive()
    }
}

impl StoryblokClient {
    pub fn from_config(cfg: &config::Storyblok) -> anyhow::Result<Self> {
        let base_url = Url::parse(&cfg.base_url)
            .map_err(|e| anyhow::anyhow!("invalid storyblok.base_url: {}", e))?;
        Ok(Self::with_base_url(
            cfg.token.clone(),
            cfg.space_id.clone(),
            base_url,
            cfg.rate_per_second,
            Duration::from_secs(cfg.init_timeout_seconds),
        ))
    }

    pub fn new(token: String, space_id: String, rate_per_second: u32) -> Self {
        let base_url = Url::parse(STORYBLOK_API_BASE).expect("valid default Storyblok URL");
        Self::with_base_url(
            token,
            space_id,
            base_url,
            rate_per_second,
            Duration::from_secs(30),
        )
    }

    pub fn with_base_url(
        token: String,
        space_id: String,
        base_url: Url,
        rate_per_second: u32,
        init_timeout: Duration,
    ) -> Self {
        let http = Client::builder()
            .user_agent("vendure-storyblok-sync/0.1")
            .no_proxy()
            .build()
            .expect("reqwest client");
        Self {
            http,
            base_url,
            token,
            space_id,
            limiter: RateLimiter::new(rate_per_second),
            gate: ReadinessGate::new(init_timeout),
        }
    }

    /// Absolute URL for a space-scoped resource ("stories", "stories/42", ...).
    fn endpoint(&self, resource: &str) -> Result<Url, ContentError> {
        self.base_url
            .join(&format!("spaces/{}/{}", self.space_id, resource))
            .map_err(|e| ContentError::InvalidResource(format!("{}: {}", resource, e)))
    }

    /// The single network chokepoint: rate-limits, sends, classifies.
    /// A 2xx response with an empty body (DELETE) yields `Value::Null`.
    async fn send(
        &self,
        method: Method,
        url: Url,
        body: Option<&Value>,
    ) -> Result<Value, ContentError> {
        self.limiter.acquire().await;

        debug!(%method, path = url.path(), "storyblok request");
        let mut req = self
            .http
            .request(method, url)
            .header("Authorization", &self.token)
            .header("Content-Type", "application/json");
        if let Some(body) = body {
            req = req.json(body);
        }

        let res = req.send().await?;
        let status = res.status();
        let text = res.text().await.unwrap_or_default();

        if status == StatusCode::TOO_MANY_REQUESTS {
            warn!(body = %text, "rate limited by Storyblok");
            return Err(ContentError::Api { status, body: text });
        }
        if !status.is_success() {
            warn!(%status, body = %text, "Storyblok API error");
            return Err(ContentError::Api { status, body: text });
        }
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&text)?)
    }

    /// Issue a space-scoped request after the readiness gate has been passed.
    pub async fn request(
        &self,
        method: Method,
        resource: &str,
        body: Option<&Value>,
    ) -> Result<Value, ContentError> {
        self.ensure_ready().await?;
        let url = self.endpoint(resource)?;
        self.send(method, url, body).await
    }

    /// Pass the shared readiness gate: one initialization future confirms
    /// the component schemas exist, all other callers await its completion.
    async fn ensure_ready(&self) -> Result<(), ContentError> {
        self.gate.ensure(|| self.ensure_components()).await
    }

    /// Ensure one component schema per entity kind exists, creating missing
    /// ones. Runs outside the readiness gate by construction.
    async fn ensure_components(&self) -> Result<(), ContentError> {
        let mut url = self.endpoint("components")?;
        url.query_pairs_mut().append_pair("search", "");
        let existing = self.send(Method::GET, url, None).await?;
        let existing: ComponentsResponse = serde_json::from_value(existing)?;

        for kind in missing_component_kinds(&existing.components) {
            let body = build_component_request(kind);
            let url = self.endpoint("components")?;
            self.send(Method::POST, url, Some(&body)).await?;
            info!(
                component = kind.component_name(),
                "created Storyblok component schema"
            );
        }
        Ok(())
    }

    async fn stories_query(&self, key: &str, value: &str) -> Result<Vec<StoryRef>, ContentError> {
        self.ensure_ready().await?;
        let mut url = self.endpoint("stories")?;
        url.query_pairs_mut().append_pair(key, value);
        let res = self.send(Method::GET, url, None).await?;
        let res: StoriesResponse = serde_json::from_value(res)?;
        Ok(res.stories.into_iter().map(StoryRef::from).collect())
    }
}

#[async_trait]
impl ContentService for StoryblokClient {
    async fn find_by_slug(&self, slug: &str) -> Result<Option<StoryRef>, ContentError> {
        let found = self.stories_query("by_slugs", slug).await?;
        Ok(found.into_iter().find(|s| s.slug == slug))
    }

    async fn find_by_slugs(&self, slugs: &[String]) -> Result<Vec<StoryRef>, ContentError> {
        if slugs.is_empty() {
            return Ok(Vec::new());
        }
        self.stories_query("by_slugs", &slugs.join(",")).await
    }

    async fn search_by_name(&self, name: &str) -> Result<Vec<StoryRef>, ContentError> {
        self.stories_query("search_term", name).await
    }

    async fn create_story(&self, payload: &ExternalPayload) -> Result<StoryRef, ContentError> {
        let body = build_story_request(payload);
        let res = self.request(Method::POST, "stories", Some(&body)).await?;
        let res: StoryResponse = serde_json::from_value(res)?;
        info!(slug = %payload.slug, story_id = res.story.id, "created Storyblok story");
        Ok(res.story.into())
    }

    async fn update_story(
        &self,
        story_id: u64,
        payload: &ExternalPayload,
    ) -> Result<StoryRef, ContentError> {
        let body = build_story_request(payload);
        let resource = format!("stories/{}", story_id);
        let res = self.request(Method::PUT, &resource, Some(&body)).await?;
        let res: StoryResponse = serde_json::from_value(res)?;
        Ok(res.story.into())
    }

    async fn delete_story(&self, story_id: u64) -> Result<(), ContentError> {
        let resource = format!("stories/{}", story_id);
        self.request(Method::DELETE, &resource, None).await?;
        Ok(())
    }
}

/// Build the create/update body for a story. `vendureId` is the join key
/// across systems; the relationship field depends on the entity kind.
pub fn build_story_request(payload: &ExternalPayload) -> Value {
    let mut content = Map::new();
    content.insert("component".into(), json!(payload.component));
    content.insert("vendureId".into(), json!(payload.vendure_id));
    if let Some(description) = payload.description.as_deref().filter(|d| !d.is_empty()) {
        content.insert("description".into(), json!(description));
    }
    match &payload.relation {
        RelationRefs::Variants(uuids) => {
            content.insert("variants".into(), json!(uuids));
        }
        RelationRefs::ParentProduct(parent) => {
            let refs: Vec<&String> = parent.iter().collect();
            content.insert("parentProduct".into(), json!(refs));
        }
        RelationRefs::None => {}
    }

    json!({
        "story": {
            "name": payload.name,
            "slug": payload.slug,
            "content": Value::Object(content),
        },
        "publish": 1,
    })
}

/// Entity kinds whose component schema the space does not have yet.
fn missing_component_kinds(existing: &[Component]) -> Vec<EntityKind> {
    [
        EntityKind::Product,
        EntityKind::Variant,
        EntityKind::Collection,
    ]
    .into_iter()
    .filter(|kind| !existing.iter().any(|c| c.name == kind.component_name()))
    .collect()
}

/// Component (content-type) definition for an entity kind.
pub fn build_component_request(kind: EntityKind) -> Value {
    let mut schema = Map::new();
    schema.insert(
        "vendureId".into(),
        json!({ "type": "text", "required": true }),
    );
    match kind {
        EntityKind::Product => {
            schema.insert(
                "variants".into(),
                json!({ "type": "options", "source": "internal_stories" }),
            );
        }
        EntityKind::Variant => {
            schema.insert(
                "parentProduct".into(),
                json!({ "type": "options", "source": "internal_stories" }),
            );
        }
        EntityKind::Collection => {}
    }

    json!({
        "component": {
            "name": kind.component_name(),
            "display_name": kind.as_str(),
            "schema": Value::Object(schema),
            "is_root": false,
            "is_nestable": true,
        }
    })
}
