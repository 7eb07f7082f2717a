//! Note submission to the remote ingestion endpoint

use reqwest::{Client, StatusCode};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;

use crate::config::IngestConfig;
use crate::store::NoteStore;

pub const SUCCESS_MESSAGE: &str = "Message sent successfully!";
pub const FAILURE_MESSAGE: &str = "Failed to send. Please try again.";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Error, Debug)]
pub enum SubmitError {
    #[error("Nothing to send")]
    Empty,
    #[error("A submission is already in progress")]
    InFlight,
    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Ingest endpoint returned {0}")]
    Status(StatusCode),
}

#[derive(Debug, Serialize)]
struct IngestPayload<'a> {
    user_id: &'a str,
    data_source: &'a str,
    content: &'a str,
}

pub struct IngestClient {
    client: Client,
    config: IngestConfig,
}

impl IngestClient {
    pub fn new(config: IngestConfig) -> Result<Self, SubmitError> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self { client, config })
    }

    pub fn endpoint(&self) -> &str {
        &self.config.endpoint
    }

    /// POST one note. Content is trimmed; blank notes never leave the machine.
    pub async fn submit(&self, content: &str) -> Result<(), SubmitError> {
        let content = content.trim();
        if content.is_empty() {
            return Err(SubmitError::Empty);
        }

        let payload = IngestPayload {
            user_id: &self.config.user_id,
            data_source: &self.config.data_source,
            content,
        };

        log::debug!("[ingest] POST {} ({} chars)", self.config.endpoint, content.len());
        let response = self
            .client
            .post(&self.config.endpoint)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SubmitError::Status(status));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusKind {
    Success,
    Error,
}

/// Status line shown under the note field
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct SubmitStatus {
    pub kind: Option<StatusKind>,
    pub message: String,
}

impl SubmitStatus {
    pub fn success() -> Self {
        Self {
            kind: Some(StatusKind::Success),
            message: SUCCESS_MESSAGE.to_string(),
        }
    }

    pub fn error() -> Self {
        Self {
            kind: Some(StatusKind::Error),
            message: FAILURE_MESSAGE.to_string(),
        }
    }

    pub fn is_cleared(&self) -> bool {
        self.kind.is_none()
    }
}

/// Publishes submission status and clears it after a delay.
/// A newer status restarts the delay.
#[derive(Clone)]
pub struct StatusBoard {
    tx: Arc<watch::Sender<SubmitStatus>>,
    generation: Arc<AtomicU64>,
    clear_after: Duration,
}

impl StatusBoard {
    pub fn new(clear_after: Duration) -> Self {
        let (tx, _) = watch::channel(SubmitStatus::default());
        Self {
            tx: Arc::new(tx),
            generation: Arc::new(AtomicU64::new(0)),
            clear_after,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<SubmitStatus> {
        self.tx.subscribe()
    }

    pub fn current(&self) -> SubmitStatus {
        self.tx.borrow().clone()
    }

    /// Must be called from within a tokio runtime
    pub fn publish(&self, status: SubmitStatus) {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.tx.send_replace(status);

        let tx = Arc::clone(&self.tx);
        let current = Arc::clone(&self.generation);
        let delay = self.clear_after;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if current.load(Ordering::SeqCst) == generation {
                tx.send_replace(SubmitStatus::default());
            }
        });
    }
}

/// Submits the draft note, one request at a time
pub struct NoteSubmitter {
    client: IngestClient,
    status: StatusBoard,
    in_flight: AtomicBool,
}

/// Resets the in-flight flag however the submission ends
struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl NoteSubmitter {
    pub fn new(client: IngestClient, status: StatusBoard) -> Self {
        Self {
            client,
            status,
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn status(&self) -> &StatusBoard {
        &self.status
    }

    pub fn is_submitting(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Send `content`. On success the stored draft is cleared unless it was
    /// edited while the request was out; on failure it is kept.
    pub async fn submit(&self, content: &str, store: &Mutex<NoteStore>) -> Result<(), SubmitError> {
        if content.trim().is_empty() {
            return Err(SubmitError::Empty);
        }
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            log::debug!("[ingest] Submission refused, one already in flight");
            return Err(SubmitError::InFlight);
        }
        let _guard = InFlightGuard(&self.in_flight);

        match self.client.submit(content).await {
            Ok(()) => {
                log::info!("[ingest] Note sent to {}", self.client.endpoint());
                match store.lock() {
                    Ok(mut store) if store.note() == content => {
                        if let Err(e) = store.clear_note() {
                            log::warn!("[ingest] Sent, but failed to clear stored note: {}", e);
                        }
                    }
                    Ok(_) => log::debug!("[ingest] Draft edited during submission, keeping it"),
                    Err(e) => log::warn!("[ingest] Store lock poisoned: {}", e),
                }
                self.status.publish(SubmitStatus::success());
                Ok(())
            }
            Err(e) => {
                log::warn!("[ingest] Failed to send note: {}", e);
                self.status.publish(SubmitStatus::error());
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer) -> IngestConfig {
        IngestConfig {
            endpoint: format!("{}/v1/ingest", server.uri()),
            ..IngestConfig::default()
        }
    }

    fn submitter(server: &MockServer) -> NoteSubmitter {
        NoteSubmitter::new(
            IngestClient::new(config_for(server)).unwrap(),
            StatusBoard::new(Duration::from_millis(3000)),
        )
    }

    fn store_with(note: &str) -> Mutex<NoteStore> {
        let mut store = NoteStore::in_memory();
        store.save_note(note).unwrap();
        Mutex::new(store)
    }

    #[tokio::test]
    async fn test_submit_posts_trimmed_note_and_clears_it() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/ingest"))
            .and(body_json(json!({
                "user_id": "user-123",
                "data_source": "user_typed",
                "content": "remember the milk"
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let submitter = submitter(&server);
        let store = store_with("  remember the milk \n");

        submitter.submit("  remember the milk \n", &store).await.unwrap();

        assert_eq!(store.lock().unwrap().note(), "");
        assert_eq!(submitter.status().current(), SubmitStatus::success());
        assert!(!submitter.is_submitting());
    }

    #[tokio::test]
    async fn test_server_error_keeps_note() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let submitter = submitter(&server);
        let store = store_with("draft");

        let err = submitter.submit("draft", &store).await.unwrap_err();
        assert!(matches!(err, SubmitError::Status(s) if s == StatusCode::SERVICE_UNAVAILABLE));
        assert_eq!(store.lock().unwrap().note(), "draft");
        assert_eq!(submitter.status().current(), SubmitStatus::error());
    }

    #[tokio::test]
    async fn test_blank_note_is_refused_locally() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let submitter = submitter(&server);
        let store = Mutex::new(NoteStore::in_memory());

        assert!(matches!(
            submitter.submit("   \n\t", &store).await,
            Err(SubmitError::Empty)
        ));
        assert!(submitter.status().current().is_cleared());
    }

    #[tokio::test]
    async fn test_concurrent_submission_is_refused() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(200)))
            .expect(1)
            .mount(&server)
            .await;

        let submitter = submitter(&server);
        let store = store_with("once");

        let (first, second) = tokio::join!(submitter.submit("once", &store), async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            submitter.submit("once", &store).await
        });

        assert!(first.is_ok());
        assert!(matches!(second, Err(SubmitError::InFlight)));
    }

    #[tokio::test]
    async fn test_draft_edited_during_submission_is_kept() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(200)))
            .expect(1)
            .mount(&server)
            .await;

        let submitter = submitter(&server);
        let store = store_with("call mom");

        let (sent, ()) = tokio::join!(submitter.submit("call mom", &store), async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            store.lock().unwrap().save_note("call mom and dad").unwrap();
        });

        assert!(sent.is_ok());
        assert_eq!(store.lock().unwrap().note(), "call mom and dad");
        assert_eq!(submitter.status().current(), SubmitStatus::success());
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_http_error() {
        let config = IngestConfig {
            endpoint: "http://127.0.0.1:9/v1/ingest".to_string(),
            ..IngestConfig::default()
        };
        let client = IngestClient::new(config).unwrap();
        assert!(matches!(client.submit("hello").await, Err(SubmitError::Http(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_clears_after_delay() {
        let board = StatusBoard::new(Duration::from_millis(3000));
        let rx = board.subscribe();

        board.publish(SubmitStatus::success());
        assert_eq!(*rx.borrow(), SubmitStatus::success());

        tokio::time::sleep(Duration::from_millis(2999)).await;
        assert_eq!(board.current(), SubmitStatus::success());

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert!(board.current().is_cleared());
    }

    #[tokio::test(start_paused = true)]
    async fn test_newer_status_restarts_clear_timer() {
        let board = StatusBoard::new(Duration::from_millis(3000));

        board.publish(SubmitStatus::error());
        tokio::time::sleep(Duration::from_millis(2000)).await;
        board.publish(SubmitStatus::success());

        // The first timer fires at 3000 but must not clear the newer status
        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(board.current(), SubmitStatus::success());

        tokio::time::sleep(Duration::from_millis(1600)).await;
        assert!(board.current().is_cleared());
    }
}
