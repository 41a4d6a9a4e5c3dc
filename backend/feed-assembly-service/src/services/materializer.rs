//! Post View Materializer
//!
//! Joins raw posts with their authors, derived comment counts and the viewer's
//! vote state, then swaps every file reference for a temp URL. One batch of
//! posts costs one author join, one comment count, one vote lookup and one
//! resolver pass, regardless of batch size. Callers assembling several batches
//! for one request share a [`ResolvedMedia`] so no reference is sent twice.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::db::DocumentStore;
use crate::models::{PostDocument, PostView, UserDocument};
use crate::services::media::{MediaResolver, ResolvedMedia};

/// Display name used when the author record is missing
pub const ANONYMOUS_AUTHOR: &str = "匿名用户";

/// Authoritative image lists for one post
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedImages {
    pub image_urls: Vec<String>,
    pub original_image_urls: Vec<String>,
}

/// Reconcile legacy single-image fields with the multi-image lists.
///
/// A non-empty list always wins; otherwise a present legacy field is promoted
/// into a one-element list.
pub fn normalize_images(post: &PostDocument) -> NormalizedImages {
    fn reconcile(list: &[String], single: Option<&String>) -> Vec<String> {
        let list: Vec<String> = list.iter().filter(|u| !u.is_empty()).cloned().collect();
        if !list.is_empty() {
            return list;
        }
        single
            .filter(|u| !u.is_empty())
            .map(|u| vec![u.clone()])
            .unwrap_or_default()
    }

    NormalizedImages {
        image_urls: reconcile(&post.image_urls, post.image_url.as_ref()),
        original_image_urls: reconcile(&post.original_image_urls, post.original_image_url.as_ref()),
    }
}

pub struct PostViewMaterializer {
    store: Arc<dyn DocumentStore>,
    media: Arc<MediaResolver>,
}

impl PostViewMaterializer {
    pub fn new(store: Arc<dyn DocumentStore>, media: Arc<MediaResolver>) -> Self {
        Self { store, media }
    }

    /// Materialize a page of posts, preserving input order.
    ///
    /// `viewer_id` is `None` for anonymous list/search calls; `viewerHasLiked`
    /// is then always false.
    pub async fn materialize(
        &self,
        viewer_id: Option<&str>,
        posts: Vec<PostDocument>,
    ) -> Vec<PostView> {
        let mut media = ResolvedMedia::default();
        self.materialize_with_media(viewer_id, posts, &mut media).await
    }

    /// Same as [`materialize`](Self::materialize), reusing URLs already in
    /// `media` and adding the ones resolved for this batch.
    pub async fn materialize_with_media(
        &self,
        viewer_id: Option<&str>,
        posts: Vec<PostDocument>,
        media: &mut ResolvedMedia,
    ) -> Vec<PostView> {
        if posts.is_empty() {
            return Vec::new();
        }

        let images: Vec<NormalizedImages> = posts.iter().map(normalize_images).collect();
        let post_ids: Vec<String> = posts.iter().map(|p| p.id.clone()).collect();
        let author_ids: Vec<String> = posts
            .iter()
            .map(|p| p.openid.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let (authors, comment_counts, voted) = tokio::join!(
            self.load_authors(&author_ids),
            self.load_comment_counts(&post_ids),
            self.load_viewer_votes(viewer_id, &post_ids),
        );

        let mut references: Vec<&str> = Vec::new();
        for (post, imgs) in posts.iter().zip(&images) {
            references.extend(imgs.image_urls.iter().map(String::as_str));
            references.extend(imgs.original_image_urls.iter().map(String::as_str));
            references.extend(post.poem_bg_image.as_deref());
        }
        references.extend(authors.values().filter_map(|u| u.avatar_url.as_deref()));

        self.media.resolve_into(references, media).await;

        let views: Vec<PostView> = posts
            .into_iter()
            .zip(images)
            .map(|(post, imgs)| {
                let author = authors.get(&post.openid);
                let comment_count = comment_counts.get(&post.id).copied().unwrap_or(0);
                let viewer_has_liked = voted.contains(&post.id);
                build_view(post, imgs, author, comment_count, viewer_has_liked, &*media)
            })
            .collect();

        debug!(
            posts = views.len(),
            authors = authors.len(),
            media_resolved = media.len(),
            "Materialized post views"
        );

        views
    }

    async fn load_authors(&self, author_ids: &[String]) -> HashMap<String, UserDocument> {
        match self.store.find_users(author_ids).await {
            Ok(users) => users.into_iter().map(|u| (u.openid.clone(), u)).collect(),
            Err(e) => {
                warn!("Failed to join authors (continuing as anonymous): {}", e);
                HashMap::new()
            }
        }
    }

    async fn load_comment_counts(&self, post_ids: &[String]) -> HashMap<String, u64> {
        match self.store.count_comments(post_ids).await {
            Ok(counts) => counts,
            Err(e) => {
                warn!("Failed to count comments (continuing with zeros): {}", e);
                HashMap::new()
            }
        }
    }

    async fn load_viewer_votes(&self, viewer_id: Option<&str>, post_ids: &[String]) -> HashSet<String> {
        let Some(viewer_id) = viewer_id else {
            return HashSet::new();
        };

        match self.store.find_voted_posts(viewer_id, post_ids).await {
            Ok(voted) => voted,
            Err(e) => {
                warn!("Failed to load viewer votes (continuing as not liked): {}", e);
                HashSet::new()
            }
        }
    }
}

fn build_view(
    post: PostDocument,
    images: NormalizedImages,
    author: Option<&UserDocument>,
    comment_count: u64,
    viewer_has_liked: bool,
    media: &ResolvedMedia,
) -> PostView {
    let author_name = author
        .and_then(|u| u.nick_name.clone())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| ANONYMOUS_AUTHOR.to_string());
    let author_avatar = author
        .and_then(|u| u.avatar_url.as_deref())
        .map(|avatar| media.url_for(avatar))
        .unwrap_or_default();

    PostView {
        id: post.id,
        author_id: post.openid,
        author_name,
        author_avatar,
        title: post.title.unwrap_or_default(),
        content: post.content.unwrap_or_default(),
        create_time: post.create_time,
        image_urls: images.image_urls.iter().map(|u| media.url_for(u)).collect(),
        original_image_urls: images
            .original_image_urls
            .iter()
            .map(|u| media.url_for(u))
            .collect(),
        like_count: post.votes,
        comment_count,
        viewer_has_liked,
        tags: post.tags,
        is_poem: post.is_poem,
        is_original: post.is_original,
        poem_background_image: post.poem_bg_image.as_deref().map(|u| media.url_for(u)),
        recommendation_type: None,
        recommendation_reason: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{InMemoryDocumentStore, MockDocumentStore};
    use crate::error::{MediaError, StoreError};
    use crate::models::{CommentDocument, InteractionEvent, InteractionKind};
    use crate::services::media::{MockTempUrlProvider, TempUrlEntry, DEFAULT_SCHEME_PREFIX};
    use chrono::Utc;
    use std::sync::atomic::Ordering;

    fn post(id: &str, author: &str) -> PostDocument {
        PostDocument {
            id: id.to_string(),
            openid: author.to_string(),
            title: Some(format!("title {id}")),
            content: Some("body".to_string()),
            image_url: None,
            image_urls: vec![format!("cloud://env/{id}.jpg")],
            original_image_url: None,
            original_image_urls: vec![format!("cloud://env/{id}_orig.jpg")],
            create_time: Utc::now(),
            votes: 1,
            tags: vec!["poem".to_string()],
            is_poem: false,
            is_original: true,
            poem_bg_image: None,
        }
    }

    fn resolving_provider(expected_calls: usize) -> MockTempUrlProvider {
        let mut provider = MockTempUrlProvider::new();
        provider
            .expect_get_temp_urls()
            .times(expected_calls)
            .returning(|ids| {
                Ok(ids
                    .iter()
                    .map(|id| TempUrlEntry {
                        file_id: id.clone(),
                        status: 0,
                        temp_file_url: id.replace("cloud://", "https://tmp/"),
                        err_msg: None,
                    })
                    .collect())
            });
        provider
    }

    fn resolver(provider: MockTempUrlProvider) -> Arc<MediaResolver> {
        Arc::new(MediaResolver::new(Arc::new(provider), DEFAULT_SCHEME_PREFIX, 4))
    }

    #[test]
    fn test_legacy_single_image_promoted() {
        let mut legacy = post("p1", "u1");
        legacy.image_urls = vec![];
        legacy.original_image_urls = vec![];
        legacy.image_url = Some("cloud://env/legacy.jpg".to_string());

        let images = normalize_images(&legacy);
        assert_eq!(images.image_urls, vec!["cloud://env/legacy.jpg"]);
        assert!(images.original_image_urls.is_empty());
    }

    #[test]
    fn test_list_wins_over_legacy_field() {
        let mut both = post("p1", "u1");
        both.image_url = Some("cloud://env/old.jpg".to_string());

        let images = normalize_images(&both);
        assert_eq!(images.image_urls, vec!["cloud://env/p1.jpg"]);
    }

    #[tokio::test]
    async fn test_batch_uses_one_query_per_join() {
        let store = Arc::new(InMemoryDocumentStore::new());
        store.insert_user(UserDocument {
            openid: "u1".to_string(),
            nick_name: Some("Li Bai".to_string()),
            avatar_url: Some("cloud://env/avatar_u1.jpg".to_string()),
        });
        store.insert_comment(CommentDocument {
            id: "c1".to_string(),
            post_id: "p2".to_string(),
            parent_comment_id: None,
            content: "beautiful".to_string(),
            likes: 0,
            create_time: Utc::now(),
        });
        store.insert_interaction(InteractionEvent {
            kind: InteractionKind::Vote,
            openid: "viewer".to_string(),
            post_id: "p3".to_string(),
            create_time: Utc::now(),
        });

        let materializer = PostViewMaterializer::new(store.clone(), resolver(resolving_provider(1)));
        let posts: Vec<PostDocument> = (1..=5).map(|i| post(&format!("p{i}"), "u1")).collect();
        let views = materializer.materialize(Some("viewer"), posts).await;

        assert_eq!(views.len(), 5);
        assert_eq!(store.calls().find_users.load(Ordering::Relaxed), 1);
        assert_eq!(store.calls().count_comments.load(Ordering::Relaxed), 1);
        assert_eq!(store.calls().find_voted_posts.load(Ordering::Relaxed), 1);

        let p2 = views.iter().find(|v| v.id == "p2").unwrap();
        assert_eq!(p2.comment_count, 1);
        let p3 = views.iter().find(|v| v.id == "p3").unwrap();
        assert!(p3.viewer_has_liked);
        assert_eq!(p3.author_name, "Li Bai");
        assert_eq!(p3.author_avatar, "https://tmp/env/avatar_u1.jpg");
        assert_eq!(p3.image_urls, vec!["https://tmp/env/p3.jpg"]);
        assert_eq!(p3.original_image_urls, vec!["https://tmp/env/p3_orig.jpg"]);
    }

    #[tokio::test]
    async fn test_missing_pieces_degrade_to_defaults() {
        let mut store = MockDocumentStore::new();
        store
            .expect_find_users()
            .returning(|_| Err(StoreError::Unavailable("users down".into())));
        store
            .expect_count_comments()
            .returning(|_| Err(StoreError::Timeout("count".into())));
        store
            .expect_find_voted_posts()
            .returning(|_, _| Err(StoreError::Unavailable("votes down".into())));

        let mut provider = MockTempUrlProvider::new();
        provider
            .expect_get_temp_urls()
            .returning(|_| Err(MediaError::Unavailable("media down".into())));

        let materializer = PostViewMaterializer::new(Arc::new(store), resolver(provider));
        let views = materializer
            .materialize(Some("viewer"), vec![post("p1", "ghost")])
            .await;

        assert_eq!(views.len(), 1);
        let view = &views[0];
        assert_eq!(view.author_name, ANONYMOUS_AUTHOR);
        assert_eq!(view.author_avatar, "");
        assert_eq!(view.comment_count, 0);
        assert!(!view.viewer_has_liked);
        assert_eq!(view.image_urls, vec!["cloud://env/p1.jpg"]);
    }

    #[tokio::test]
    async fn test_shared_media_skips_known_references() {
        let store = Arc::new(InMemoryDocumentStore::new());
        store.insert_user(UserDocument {
            openid: "u1".to_string(),
            nick_name: Some("Du Fu".to_string()),
            avatar_url: Some("cloud://env/avatar_u1.jpg".to_string()),
        });

        let mut provider = MockTempUrlProvider::new();
        provider
            .expect_get_temp_urls()
            .withf(|ids: &[String]| ids.contains(&"cloud://env/avatar_u1.jpg".to_string()))
            .times(1)
            .returning(|ids| {
                Ok(ids
                    .iter()
                    .map(|id| TempUrlEntry {
                        file_id: id.clone(),
                        status: 0,
                        temp_file_url: id.replace("cloud://", "https://tmp/"),
                        err_msg: None,
                    })
                    .collect())
            });
        provider
            .expect_get_temp_urls()
            .withf(|ids: &[String]| ids == ["cloud://env/p2.jpg", "cloud://env/p2_orig.jpg"])
            .times(1)
            .returning(|ids| {
                Ok(ids
                    .iter()
                    .map(|id| TempUrlEntry {
                        file_id: id.clone(),
                        status: 0,
                        temp_file_url: id.replace("cloud://", "https://tmp/"),
                        err_msg: None,
                    })
                    .collect())
            });

        let materializer = PostViewMaterializer::new(store, resolver(provider));
        let mut media = ResolvedMedia::default();
        materializer
            .materialize_with_media(Some("viewer"), vec![post("p1", "u1")], &mut media)
            .await;
        let second = materializer
            .materialize_with_media(Some("viewer"), vec![post("p2", "u1")], &mut media)
            .await;

        assert_eq!(second[0].author_avatar, "https://tmp/env/avatar_u1.jpg");
        assert_eq!(second[0].image_urls, vec!["https://tmp/env/p2.jpg"]);
    }

    #[tokio::test]
    async fn test_anonymous_viewer_skips_vote_lookup() {
        let store = Arc::new(InMemoryDocumentStore::new());
        let materializer = PostViewMaterializer::new(store.clone(), resolver(resolving_provider(1)));

        let views = materializer.materialize(None, vec![post("p1", "u1")]).await;

        assert!(!views[0].viewer_has_liked);
        assert_eq!(store.calls().find_voted_posts.load(Ordering::Relaxed), 0);
    }
}
