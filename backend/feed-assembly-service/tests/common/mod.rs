//! Shared fixtures for feed-assembly integration tests
#![allow(dead_code)]

use actix_web::web;
use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use feed_assembly::db::{DocumentStore, InMemoryDocumentStore};
use feed_assembly::error::MediaError;
use feed_assembly::handlers::AppState;
use feed_assembly::models::{
    CommentDocument, InteractionEvent, InteractionKind, PostDocument, UserDocument,
};
use feed_assembly::services::media::{TempUrlEntry, TempUrlProvider, DEFAULT_SCHEME_PREFIX};
use feed_assembly::services::{BlenderConfig, FeedBlender, MediaResolver, PostViewMaterializer};

pub const VIEWER: &str = "o_viewer";

pub fn at(minute: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap() + Duration::minutes(minute)
}

pub fn post(id: &str, author: &str, minute: i64) -> PostDocument {
    PostDocument {
        id: id.to_string(),
        openid: author.to_string(),
        title: Some(format!("Title {id}")),
        content: Some(format!("Content of {id}")),
        image_url: None,
        image_urls: vec![],
        original_image_url: None,
        original_image_urls: vec![],
        create_time: at(minute),
        votes: 0,
        tags: vec![],
        is_poem: false,
        is_original: true,
        poem_bg_image: None,
    }
}

pub fn comment(id: &str, post_id: &str) -> CommentDocument {
    CommentDocument {
        id: id.to_string(),
        post_id: post_id.to_string(),
        parent_comment_id: None,
        content: "well written".to_string(),
        likes: 0,
        create_time: at(500),
    }
}

pub fn user(openid: &str, name: &str) -> UserDocument {
    UserDocument {
        openid: openid.to_string(),
        nick_name: Some(name.to_string()),
        avatar_url: Some(format!("cloud://env/avatars/{openid}.jpg")),
    }
}

pub fn vote(viewer: &str, post_id: &str, minute: i64) -> InteractionEvent {
    InteractionEvent {
        kind: InteractionKind::Vote,
        openid: viewer.to_string(),
        post_id: post_id.to_string(),
        create_time: at(minute),
    }
}

/// Twenty original posts across four authors, two reposts, one favored
/// author (`alice`) through a vote by [`VIEWER`].
pub fn seeded_store() -> Arc<InMemoryDocumentStore> {
    let store = Arc::new(InMemoryDocumentStore::new());
    for (openid, name) in [("alice", "Alice"), ("bob", "Bob"), ("carol", "Carol")] {
        store.insert_user(user(openid, name));
    }

    let authors = ["alice", "bob", "carol", "dave"];
    for i in 0..20 {
        let mut p = post(&format!("p{i:02}"), authors[i as usize % 4], i);
        p.votes = (i % 7) as i64;
        p.image_urls = vec![format!("cloud://env/posts/p{i:02}.jpg")];
        if i % 5 == 0 {
            p.tags = vec!["haiku".to_string()];
        }
        store.insert_post(p);
    }
    for i in 0..3 {
        store.insert_comment(comment(&format!("c{i}"), "p03"));
    }

    let mut repost = post("r1", "alice", 100);
    repost.is_original = false;
    repost.votes = 99;
    store.insert_post(repost);
    let mut repost = post("r2", "bob", 101);
    repost.is_original = false;
    store.insert_post(repost);

    store.insert_interaction(vote(VIEWER, "p00", 200));
    store
}

/// Temp URL provider that records every batch and can fail chosen batches
#[derive(Default)]
pub struct RecordingProvider {
    pub calls: AtomicUsize,
    pub batches: Mutex<Vec<Vec<String>>>,
    /// Any batch containing this reference fails
    pub fail_when_contains: Option<String>,
}

impl RecordingProvider {
    pub fn failing_on(reference: &str) -> Self {
        Self {
            fail_when_contains: Some(reference.to_string()),
            ..Default::default()
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requested(&self) -> Vec<String> {
        self.batches
            .lock()
            .unwrap()
            .iter()
            .flatten()
            .cloned()
            .collect()
    }
}

pub fn temp_url(reference: &str) -> String {
    reference.replace("cloud://", "https://tmp.example/")
}

#[async_trait]
impl TempUrlProvider for RecordingProvider {
    async fn get_temp_urls(&self, file_ids: &[String]) -> Result<Vec<TempUrlEntry>, MediaError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.batches.lock().unwrap().push(file_ids.to_vec());

        if let Some(bad) = &self.fail_when_contains {
            if file_ids.contains(bad) {
                return Err(MediaError::Unavailable("quota exceeded".to_string()));
            }
        }

        Ok(file_ids
            .iter()
            .map(|id| TempUrlEntry {
                file_id: id.clone(),
                status: 0,
                temp_file_url: temp_url(id),
                err_msg: None,
            })
            .collect())
    }
}

pub fn materializer(
    store: Arc<dyn DocumentStore>,
    provider: Arc<RecordingProvider>,
) -> Arc<PostViewMaterializer> {
    let media = MediaResolver::new(provider, DEFAULT_SCHEME_PREFIX, 4);
    Arc::new(PostViewMaterializer::new(store, Arc::new(media)))
}

pub fn blender(store: Arc<dyn DocumentStore>, provider: Arc<RecordingProvider>) -> FeedBlender {
    FeedBlender::from_store(
        store.clone(),
        materializer(store, provider),
        BlenderConfig::default(),
    )
}

pub fn app_state(store: Arc<InMemoryDocumentStore>) -> web::Data<AppState> {
    let store: Arc<dyn DocumentStore> = store;
    let materializer = materializer(store.clone(), Arc::new(RecordingProvider::default()));
    let blender = Arc::new(FeedBlender::from_store(
        store.clone(),
        materializer.clone(),
        BlenderConfig::default(),
    ));

    web::Data::new(AppState {
        store,
        materializer,
        blender,
    })
}
