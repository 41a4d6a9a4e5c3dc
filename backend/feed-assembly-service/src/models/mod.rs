use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Older documents store a single string where newer ones store an array
fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        Some(OneOrMany::One(value)) if !value.is_empty() => vec![value],
        Some(OneOrMany::Many(values)) => values,
        _ => Vec::new(),
    })
}

/// Raw post as stored in the `posts` collection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostDocument {
    #[serde(rename = "_id")]
    pub id: String,
    /// Owning viewer; join key into `users`
    #[serde(rename = "_openid")]
    pub openid: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    /// Legacy single compressed image
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub image_urls: Vec<String>,
    /// Legacy single original image
    #[serde(default)]
    pub original_image_url: Option<String>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub original_image_urls: Vec<String>,
    pub create_time: DateTime<Utc>,
    /// Like counter maintained by the vote handler
    #[serde(default)]
    pub votes: i64,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub is_poem: bool,
    #[serde(default)]
    pub is_original: bool,
    #[serde(default)]
    pub poem_bg_image: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDocument {
    #[serde(rename = "_openid")]
    pub openid: String,
    #[serde(default)]
    pub nick_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentDocument {
    #[serde(rename = "_id")]
    pub id: String,
    pub post_id: String,
    /// Set on replies; replies never nest deeper than one level
    #[serde(default)]
    pub parent_comment_id: Option<String>,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub likes: i64,
    pub create_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum InteractionKind {
    Vote,
    View,
}

/// One row of the append-only `votes_log` / `view_log` collections
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractionEvent {
    pub kind: InteractionKind,
    #[serde(rename = "_openid")]
    pub openid: String,
    pub post_id: String,
    pub create_time: DateTime<Utc>,
}

/// Which retrieval strategy produced a feed item
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum RecommendationType {
    Personalized, // 基於興趣
    Hot,          // 熱門
    Latest,       // 最新補位
}

impl RecommendationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecommendationType::Personalized => "personalized",
            RecommendationType::Hot => "hot",
            RecommendationType::Latest => "latest",
        }
    }

    /// Disclosure text shown next to the item
    pub fn reason(&self) -> &'static str {
        match self {
            RecommendationType::Personalized => "based on your interests",
            RecommendationType::Hot => "trending",
            RecommendationType::Latest => "new",
        }
    }
}

/// Display-ready post (matches the mobile client's post card)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PostView {
    pub id: String,
    pub author_id: String,
    pub author_name: String,
    pub author_avatar: String,
    pub title: String,
    pub content: String,
    pub create_time: DateTime<Utc>,
    pub image_urls: Vec<String>,
    pub original_image_urls: Vec<String>,
    pub like_count: i64,
    pub comment_count: u64,
    pub viewer_has_liked: bool,
    pub tags: Vec<String>,
    pub is_poem: bool,
    pub is_original: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poem_background_image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommendation_type: Option<RecommendationType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommendation_reason: Option<String>,
}

impl PostView {
    pub fn with_provenance(mut self, source: RecommendationType) -> Self {
        self.recommendation_type = Some(source);
        self.recommendation_reason = Some(source.reason().to_string());
        self
    }
}

/// Feed assembly request body
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedRequest {
    #[serde(default = "default_personalized_count")]
    pub personalized_count: u32,
    #[serde(default = "default_hot_count")]
    pub hot_count: u32,
    /// Accepted for client compatibility; paging is driven by `exclude_post_ids`
    #[serde(default)]
    pub skip: u32,
    #[serde(default)]
    pub exclude_post_ids: Vec<String>,
}

fn default_personalized_count() -> u32 {
    3
}

fn default_hot_count() -> u32 {
    2
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedResponse {
    pub success: bool,
    pub posts: Vec<PostView>,
    pub total: usize,
    pub personalized_count: usize,
    pub hot_count: usize,
    pub latest_count: usize,
    /// Set when the request budget ran out before every stage finished
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub degraded: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostListResponse {
    pub success: bool,
    pub posts: Vec<PostView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub success: bool,
    pub posts: Vec<PostView>,
    pub total: usize,
}
