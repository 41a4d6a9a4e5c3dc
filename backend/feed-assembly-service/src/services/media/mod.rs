//! Media Reference Resolver
//!
//! Maps content-addressed file references (`cloud://...`) to short-lived
//! download URLs. References are deduplicated, split into chunks of at most
//! [`MAX_REFERENCES_PER_CALL`], and resolved with bounded concurrency. A failed
//! chunk leaves its references unresolved; callers then show the original
//! reference string.
//!
//! A [`ResolvedMedia`] can be carried across several resolver passes of the
//! same request. Each pass only sends references the map has not seen yet.

mod http_provider;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::MediaError;
use crate::metrics;

pub use http_provider::HttpTempUrlProvider;

/// The URL service rejects larger batches
pub const MAX_REFERENCES_PER_CALL: usize = 50;

pub const DEFAULT_SCHEME_PREFIX: &str = "cloud://";

/// Per-reference result returned by the URL service. `status == 0` means success.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TempUrlEntry {
    #[serde(rename = "fileID")]
    pub file_id: String,
    pub status: i32,
    #[serde(default, rename = "tempFileURL")]
    pub temp_file_url: String,
    #[serde(default)]
    pub err_msg: Option<String>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TempUrlProvider: Send + Sync {
    /// Resolve one batch of at most [`MAX_REFERENCES_PER_CALL`] references
    async fn get_temp_urls(&self, file_ids: &[String]) -> Result<Vec<TempUrlEntry>, MediaError>;
}

/// Reference → URL map for one request. Never cached across requests.
#[derive(Debug, Clone, Default)]
pub struct ResolvedMedia {
    urls: HashMap<String, String>,
    /// Every reference already sent, resolved or not
    attempted: HashSet<String>,
}

impl ResolvedMedia {
    /// Resolved URL, or the reference itself when it could not be resolved
    pub fn url_for(&self, reference: &str) -> String {
        self.urls
            .get(reference)
            .cloned()
            .unwrap_or_else(|| reference.to_string())
    }

    pub fn is_resolved(&self, reference: &str) -> bool {
        self.urls.contains_key(reference)
    }

    pub fn was_attempted(&self, reference: &str) -> bool {
        self.attempted.contains(reference)
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }
}

pub struct MediaResolver {
    provider: Arc<dyn TempUrlProvider>,
    scheme_prefix: String,
    max_concurrent_chunks: usize,
}

impl MediaResolver {
    pub fn new(
        provider: Arc<dyn TempUrlProvider>,
        scheme_prefix: impl Into<String>,
        max_concurrent_chunks: usize,
    ) -> Self {
        Self {
            provider,
            scheme_prefix: scheme_prefix.into(),
            max_concurrent_chunks: max_concurrent_chunks.max(1),
        }
    }

    /// Plain URLs and empty strings are passed through untouched
    pub fn is_content_addressed(&self, reference: &str) -> bool {
        !self.scheme_prefix.is_empty() && reference.starts_with(&self.scheme_prefix)
    }

    pub async fn resolve<I, S>(&self, references: I) -> ResolvedMedia
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut media = ResolvedMedia::default();
        self.resolve_into(references, &mut media).await;
        media
    }

    /// Resolve the references `media` has not attempted yet and merge them in.
    /// A reference whose chunk failed is not retried within the same map.
    pub async fn resolve_into<I, S>(&self, references: I, media: &mut ResolvedMedia)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let unique: BTreeSet<String> = references
            .into_iter()
            .map(|r| r.as_ref().to_string())
            .filter(|r| self.is_content_addressed(r) && !media.was_attempted(r))
            .collect();

        if unique.is_empty() {
            return;
        }

        let requested = unique.len();
        let chunks: Vec<Vec<String>> = unique
            .into_iter()
            .collect::<Vec<_>>()
            .chunks(MAX_REFERENCES_PER_CALL)
            .map(<[String]>::to_vec)
            .collect();
        let chunk_count = chunks.len();

        let results: Vec<(usize, Vec<String>, Result<Vec<TempUrlEntry>, MediaError>)> =
            stream::iter(chunks.into_iter().enumerate())
                .map(|(idx, chunk)| async move {
                    let result = self.provider.get_temp_urls(&chunk).await;
                    (idx, chunk, result)
                })
                .buffer_unordered(self.max_concurrent_chunks)
                .collect()
                .await;

        let before = media.len();
        for (idx, chunk, result) in results {
            match result {
                Ok(entries) => {
                    for entry in entries {
                        if entry.status == 0 && !entry.temp_file_url.is_empty() {
                            media.urls.insert(entry.file_id, entry.temp_file_url);
                        } else {
                            debug!(
                                file_id = %entry.file_id,
                                status = entry.status,
                                err_msg = ?entry.err_msg,
                                "File reference not resolved"
                            );
                        }
                    }
                }
                Err(e) => {
                    metrics::record_media_chunk_failure();
                    warn!(
                        chunk = idx,
                        chunk_size = chunk.len(),
                        error = %e,
                        "Temp URL chunk failed, passing references through unresolved"
                    );
                }
            }
            media.attempted.extend(chunk);
        }

        debug!(
            requested,
            chunks = chunk_count,
            resolved = media.len() - before,
            "Media references resolved"
        );
    }
}
