//! Job submission flow: local validation, submission, notification and the
//! delayed redirect to the overview.
//!
//! Order numbers are always assigned by the backend.

use std::sync::Arc;
use std::time::Duration;

use aas_core::api::{BatchJobItem, BatchJobRequest, DirectJobRequest};
use aas_core::{validate_laser_text, BatchDraft, ComposerSite};
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::client::ApiClient;
use crate::error::ClientError;

/// Delay between a successful submission and the redirect.
pub const REDIRECT_DELAY: Duration = Duration::from_secs(2);

pub const INVALID_TEXT_MESSAGE: &str = "Please enter valid engraving text";
pub const INVALID_BATCH_MESSAGE: &str = "Please fix all validation errors before submitting";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Success,
    Error,
}

/// Transient message shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub kind: NotificationKind,
    pub message: String,
}

impl Notification {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            kind: NotificationKind::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: NotificationKind::Error,
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.kind == NotificationKind::Success
    }
}

/// Dashboard views.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Overview,
    Jobs,
    Billing,
    Composer,
    Scenarios,
    Config,
    History,
}

/// Receives redirects.
pub trait Navigator: Send + Sync + 'static {
    fn navigate(&self, page: Page);
}

/// Result of one submission attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitOutcome {
    pub notification: Notification,
    /// Page to open once `delay` elapsed. Set on success only.
    pub redirect: Option<Redirect>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Redirect {
    pub page: Page,
    pub delay: Duration,
}

impl SubmitOutcome {
    fn failed(message: impl Into<String>) -> Self {
        Self {
            notification: Notification::error(message),
            redirect: None,
        }
    }

    fn started(message: String, delay: Duration) -> Self {
        Self {
            notification: Notification::success(message),
            redirect: Some(Redirect {
                page: Page::Overview,
                delay,
            }),
        }
    }

    /// Spawn the redirect, if any. The navigator is called once after the
    /// delay.
    pub fn schedule_redirect<N: Navigator>(&self, navigator: Arc<N>) -> Option<JoinHandle<()>> {
        let redirect = self.redirect?;
        Some(tokio::spawn(async move {
            tokio::time::sleep(redirect.delay).await;
            navigator.navigate(redirect.page);
        }))
    }
}

/// Message for a request that failed before or at the backend.
fn failure_message(e: &ClientError, fallback: &str) -> String {
    match e.backend_message() {
        Some(message) => message.to_string(),
        None => fallback.to_string(),
    }
}

/// `success:false` replies show the backend message verbatim.
fn rejected_message(message: &str, fallback: &str) -> String {
    if message.is_empty() {
        fallback.to_string()
    } else {
        message.to_string()
    }
}

/// Submits composer requests and turns replies into notifications.
#[derive(Debug, Clone)]
pub struct Composer {
    client: ApiClient,
    redirect_delay: Duration,
}

impl Composer {
    pub fn new(client: ApiClient) -> Self {
        Self {
            client,
            redirect_delay: REDIRECT_DELAY,
        }
    }

    pub fn with_redirect_delay(mut self, delay: Duration) -> Self {
        self.redirect_delay = delay;
        self
    }

    /// Submit one job. Invalid text is rejected locally.
    pub async fn submit_direct(&self, laser_text: &str, site: ComposerSite) -> SubmitOutcome {
        if !validate_laser_text(laser_text).valid {
            return SubmitOutcome::failed(INVALID_TEXT_MESSAGE);
        }

        let request = DirectJobRequest {
            laser_text: laser_text.to_string(),
            site,
        };
        match self.client.submit_direct(&request).await {
            Ok(response) if response.success => {
                let order_no = if response.order_no.is_empty() {
                    "Unknown"
                } else {
                    response.order_no.as_str()
                };
                info!(order_no, run_id = %response.run_id, "Direct job started");
                SubmitOutcome::started(
                    format!("Direct job {order_no} started! Redirecting to track progress..."),
                    self.redirect_delay,
                )
            }
            Ok(response) => {
                SubmitOutcome::failed(rejected_message(&response.message, "Job execution failed"))
            }
            Err(e) => {
                error!(error = %e, "Direct job error");
                SubmitOutcome::failed(failure_message(&e, "Failed to execute job"))
            }
        }
    }

    /// Submit the non-empty entries of `draft` as one batch.
    pub async fn submit_batch(&self, draft: &BatchDraft) -> SubmitOutcome {
        if !draft.can_submit() {
            return SubmitOutcome::failed(INVALID_BATCH_MESSAGE);
        }

        let request = BatchJobRequest {
            jobs: draft
                .jobs()
                .into_iter()
                .map(|laser_text| BatchJobItem { laser_text })
                .collect(),
            site: draft.site,
        };
        let count = request.jobs.len();
        match self.client.submit_batch(&request).await {
            Ok(response) if response.success => {
                info!(run_id = %response.run_id, jobs = count, "Batch started");
                SubmitOutcome::started(
                    format!("Batch of {count} jobs started! Redirecting to track progress..."),
                    self.redirect_delay,
                )
            }
            Ok(response) => {
                SubmitOutcome::failed(rejected_message(&response.message, "Batch execution failed"))
            }
            Err(e) => {
                error!(error = %e, "Batch job error");
                SubmitOutcome::failed(failure_message(&e, "Failed to execute batch"))
            }
        }
    }

    /// Run predefined scenario `number` (1 or 2) through the composer.
    pub async fn run_scenario(&self, number: u8) -> SubmitOutcome {
        let label = match number {
            1 => "Batch Processing",
            _ => "Individual Processing",
        };
        match self.client.composer_scenario(number).await {
            Ok(response) if response.success => SubmitOutcome::started(
                format!("Scenario {number} ({label}) started! Redirecting to track progress..."),
                self.redirect_delay,
            ),
            Ok(response) => SubmitOutcome::failed(rejected_message(
                &response.message,
                &format!("Scenario {number} execution failed"),
            )),
            Err(e) => {
                error!(error = %e, scenario = number, "Scenario error");
                SubmitOutcome::failed(failure_message(&e, &format!("Failed to execute Scenario {number}")))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<Page>>);

    impl Navigator for Recorder {
        fn navigate(&self, page: Page) {
            self.0.lock().unwrap().push(page);
        }
    }

    fn offline_composer() -> Composer {
        // Port 9 (discard) is never served in tests; invalid input must not
        // reach the network anyway.
        Composer::new(ApiClient::new("http://127.0.0.1:9").unwrap())
    }

    #[tokio::test]
    async fn test_invalid_text_rejected_locally() {
        let composer = offline_composer();

        let outcome = composer.submit_direct("", ComposerSite::JobPos1).await;
        assert_eq!(outcome.notification, Notification::error(INVALID_TEXT_MESSAGE));
        assert!(outcome.redirect.is_none());

        let long = "x".repeat(51);
        let outcome = composer.submit_direct(&long, ComposerSite::JobPos2).await;
        assert_eq!(outcome.notification.message, INVALID_TEXT_MESSAGE);
    }

    #[tokio::test]
    async fn test_blocked_batch_rejected_locally() {
        let composer = offline_composer();
        let draft = BatchDraft::new(ComposerSite::JobPos1);

        let outcome = composer.submit_batch(&draft).await;
        assert_eq!(outcome.notification, Notification::error(INVALID_BATCH_MESSAGE));
    }

    #[test]
    fn test_failure_messages() {
        let api = ClientError::Api {
            status: 400,
            message: "No jobs in queue for site JOB_POS1".into(),
        };
        assert_eq!(failure_message(&api, "fallback"), "No jobs in queue for site JOB_POS1");

        let decode = ClientError::Decode("eof".into());
        assert_eq!(failure_message(&decode, "Failed to execute job"), "Failed to execute job");

        assert_eq!(rejected_message("", "Job execution failed"), "Job execution failed");
        assert_eq!(rejected_message("Queue full", "Job execution failed"), "Queue full");
    }

    #[tokio::test(start_paused = true)]
    async fn test_redirect_fires_after_delay() {
        let outcome = SubmitOutcome::started("ok".into(), REDIRECT_DELAY);
        let recorder = Arc::new(Recorder::default());
        let handle = outcome.schedule_redirect(Arc::clone(&recorder)).unwrap();

        tokio::time::sleep(Duration::from_millis(1900)).await;
        assert!(recorder.0.lock().unwrap().is_empty());

        handle.await.unwrap();
        assert_eq!(*recorder.0.lock().unwrap(), vec![Page::Overview]);
    }

    #[test]
    fn test_failed_outcome_has_no_redirect() {
        let outcome = SubmitOutcome::failed("nope");
        let recorder = Arc::new(Recorder::default());
        assert!(outcome.schedule_redirect(recorder).is_none());
    }
}
