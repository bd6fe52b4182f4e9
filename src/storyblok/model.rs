use serde::Deserialize;
use serde_json::Value;

/// A story as returned by the management API. Content is kept opaque; the
/// sync engine only ever rebuilds it from commerce state.
#[derive(Deserialize, Debug, Clone)]
pub struct Story {
    pub id: u64,
    pub uuid: String,
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub content: Value,
}

#[derive(Deserialize, Debug)]
pub struct StoriesResponse {
    pub stories: Vec<Story>,
}

#[derive(Deserialize, Debug)]
pub struct StoryResponse {
    pub story: Story,
}

#[derive(Deserialize, Debug)]
pub struct Component {
    pub name: String,
}

#[derive(Deserialize, Debug)]
pub struct ComponentsResponse {
    #[serde(default)]
    pub components: Vec<Component>,
}

/// Lightweight handle to an external entry. Relationship links always store
/// the `uuid`; `id` addresses the entry for update/delete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoryRef {
    pub id: u64,
    pub uuid: String,
    pub slug: String,
}

impl From<Story> for StoryRef {
    fn from(story: Story) -> Self {
        Self {
            id: story.id,
            uuid: story.uuid,
            slug: story.slug,
        }
    }
}
