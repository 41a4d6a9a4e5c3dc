/// Preset timeouts for the collaborators of the feed engine
use crate::timeout::TimeoutConfig;
use std::time::Duration;

/// Document store queries
///
/// - Timeout: 2s (filter/sort/count queries should be fast)
pub fn document_store_config() -> TimeoutConfig {
    TimeoutConfig {
        duration: Duration::from_secs(2),
    }
}

/// Media temp-URL service (one chunk of at most 50 references)
///
/// - Timeout: 5s
pub fn media_service_config() -> TimeoutConfig {
    TimeoutConfig {
        duration: Duration::from_secs(5),
    }
}

/// Whole feed assembly request
///
/// - Timeout: 3s, after which the partial feed is returned
pub fn feed_request_config() -> TimeoutConfig {
    TimeoutConfig {
        duration: Duration::from_secs(3),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feed_budget_exceeds_store_timeout() {
        assert!(feed_request_config().duration > document_store_config().duration);
    }

    #[test]
    fn test_media_timeout() {
        assert_eq!(media_service_config().duration, Duration::from_secs(5));
    }
}
