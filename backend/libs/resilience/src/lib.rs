/// Resilience helpers for request-scoped async work
///
/// This library provides:
/// - **Timeout**: Enforces a time limit on a single external call
/// - **Request budget**: One wall-clock deadline shared by every stage of a request
/// - **Preset Configurations**: Timeouts for the document store, the media URL service
///   and whole feed requests
///
/// # Example: Stages sharing one budget
///
/// ```rust,no_run
/// use resilience::RequestBudget;
/// use std::time::Duration;
///
/// #[tokio::main]
/// async fn main() {
///     let budget = RequestBudget::start(Duration::from_secs(3));
///
///     let first = budget.run(async { 1 }).await;
///     let second = budget.run(async { 2 }).await;
///     assert!(first.is_ok() && second.is_ok());
/// }
/// ```

pub mod presets;
pub mod timeout;

pub use presets::{document_store_config, feed_request_config, media_service_config};
pub use timeout::{with_timeout, RequestBudget, TimeoutConfig, TimeoutError};
