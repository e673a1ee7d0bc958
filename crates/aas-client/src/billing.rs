//! Billing reset flow.

use tracing::{error, info};

use crate::client::ApiClient;

pub const RESET_PROMPT: &str =
    "Are you sure you want to reset all billing data? This cannot be undone.";
pub const RESET_SUCCESS_MESSAGE: &str = "Billing data has been reset successfully";
pub const RESET_FAILURE_MESSAGE: &str = "Failed to reset billing data";

/// Asks the user to confirm a destructive action.
pub trait Confirm {
    fn confirm(&self, prompt: &str) -> bool;
}

/// Accepts every prompt (`--yes`).
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysConfirm;

impl Confirm for AlwaysConfirm {
    fn confirm(&self, _prompt: &str) -> bool {
        true
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResetOutcome {
    /// The user declined; nothing was sent.
    Cancelled,
    Reset(String),
    Failed(String),
}

/// Reset the user-job billing after confirmation. `refresh` runs only after
/// a successful reset.
pub async fn reset_billing<C, F>(client: &ApiClient, confirm: &C, refresh: F) -> ResetOutcome
where
    C: Confirm + ?Sized,
    F: FnOnce(),
{
    if !confirm.confirm(RESET_PROMPT) {
        return ResetOutcome::Cancelled;
    }

    match client.reset_user_billing().await {
        Ok(response) if response.success => {
            info!("User billing reset");
            refresh();
            ResetOutcome::Reset(RESET_SUCCESS_MESSAGE.to_string())
        }
        Ok(response) => {
            error!(message = %response.message, "Billing reset rejected");
            ResetOutcome::Failed(RESET_FAILURE_MESSAGE.to_string())
        }
        Err(e) => {
            error!(error = %e, "Billing reset failed");
            ResetOutcome::Failed(RESET_FAILURE_MESSAGE.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct Decline;

    impl Confirm for Decline {
        fn confirm(&self, prompt: &str) -> bool {
            assert_eq!(prompt, RESET_PROMPT);
            false
        }
    }

    #[tokio::test]
    async fn test_declined_reset_sends_nothing() {
        let client = ApiClient::new("http://127.0.0.1:9").unwrap();
        let refreshed = Cell::new(false);

        let outcome = reset_billing(&client, &Decline, || refreshed.set(true)).await;
        assert_eq!(outcome, ResetOutcome::Cancelled);
        assert!(!refreshed.get());
    }

    #[tokio::test]
    async fn test_unreachable_backend_reports_failure() {
        let client = ApiClient::new("http://127.0.0.1:9").unwrap();
        let refreshed = Cell::new(false);

        let outcome = reset_billing(&client, &AlwaysConfirm, || refreshed.set(true)).await;
        assert_eq!(outcome, ResetOutcome::Failed(RESET_FAILURE_MESSAGE.to_string()));
        assert!(!refreshed.get());
    }
}
