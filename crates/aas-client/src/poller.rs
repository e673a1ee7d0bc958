//! Fixed-interval pollers.
//!
//! Each poller is an independent task owning its last value. At most one
//! request is in flight; ticks that fire while it runs are skipped, so a
//! backend slower than the interval is polled back to back. There is no
//! backoff and no retry beyond the next tick.

use std::future::Future;
use std::time::Duration;

use aas_core::api::{
    CombinedBillingResponse, CycleStatusResponse, DevicesResponse, IndividualJobsResponse,
    QueueResponse,
};
use aas_core::{DeviceKind, StatusModel};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{trace, warn};

use crate::client::ApiClient;
use crate::error::ClientResult;

pub const CYCLE_STATUS_INTERVAL: Duration = Duration::from_secs(1);
pub const DEVICE_STATUS_INTERVAL: Duration = Duration::from_secs(1);
pub const DEVICES_INTERVAL: Duration = Duration::from_secs(2);
pub const COMBINED_BILLING_INTERVAL: Duration = Duration::from_secs(2);
pub const QUEUE_INTERVAL: Duration = Duration::from_secs(2);
pub const INDIVIDUAL_JOBS_INTERVAL: Duration = Duration::from_secs(3);

/// Last result of a poller.
#[derive(Debug, Clone, PartialEq)]
pub struct PollState<T> {
    /// Last successfully fetched value. Kept when a later poll fails.
    pub data: Option<T>,
    /// Error of the last poll, cleared by the next success.
    pub error: Option<String>,
    /// True until the first poll finished.
    pub is_loading: bool,
}

impl<T> Default for PollState<T> {
    fn default() -> Self {
        Self {
            data: None,
            error: None,
            is_loading: true,
        }
    }
}

impl<T> PollState<T> {
    fn apply(&mut self, result: ClientResult<T>) {
        self.is_loading = false;
        match result {
            Ok(value) => {
                self.data = Some(value);
                self.error = None;
            }
            Err(e) => {
                self.error = Some(e.to_string());
            }
        }
    }
}

/// Handle of a running poller. Dropping it stops the task.
#[derive(Debug)]
pub struct Poller<T> {
    name: &'static str,
    rx: watch::Receiver<PollState<T>>,
    handle: JoinHandle<()>,
}

impl<T> Poller<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Start polling `fetch` every `period`. The first poll runs immediately.
    pub fn spawn<F, Fut>(name: &'static str, period: Duration, mut fetch: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ClientResult<T>> + Send + 'static,
    {
        let (tx, rx) = watch::channel(PollState::default());
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                ticker.tick().await;
                let started = tokio::time::Instant::now();
                let result = fetch().await;
                if started.elapsed() > period {
                    trace!(poller = name, elapsed = ?started.elapsed(), "Poll slower than interval");
                }
                if let Err(e) = &result {
                    warn!(poller = name, error = %e, "Poll failed");
                }
                tx.send_modify(|state| state.apply(result));
                if tx.is_closed() {
                    break;
                }
            }
        });
        Self { name, rx, handle }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Snapshot of the current state.
    pub fn latest(&self) -> PollState<T> {
        self.rx.borrow().clone()
    }

    /// Receiver notified after every finished poll.
    pub fn subscribe(&self) -> watch::Receiver<PollState<T>> {
        self.rx.clone()
    }

    pub fn stop(&self) {
        self.handle.abort();
    }
}

impl<T> Drop for Poller<T> {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

// ============================================================================
// Dashboard pollers
// ============================================================================

pub fn cycle_status(client: &ApiClient) -> Poller<CycleStatusResponse> {
    let client = client.clone();
    Poller::spawn("cycle_status", CYCLE_STATUS_INTERVAL, move || {
        let client = client.clone();
        async move { client.cycle_status().await }
    })
}

pub fn device_status(client: &ApiClient, device: DeviceKind) -> Poller<StatusModel> {
    let client = client.clone();
    Poller::spawn("device_status", DEVICE_STATUS_INTERVAL, move || {
        let client = client.clone();
        async move { client.device_status(device).await }
    })
}

pub fn devices(client: &ApiClient) -> Poller<DevicesResponse> {
    let client = client.clone();
    Poller::spawn("devices", DEVICES_INTERVAL, move || {
        let client = client.clone();
        async move { client.devices().await }
    })
}

pub fn combined_billing(client: &ApiClient) -> Poller<CombinedBillingResponse> {
    let client = client.clone();
    Poller::spawn("combined_billing", COMBINED_BILLING_INTERVAL, move || {
        let client = client.clone();
        async move { client.combined_billing().await }
    })
}

pub fn queue(client: &ApiClient) -> Poller<QueueResponse> {
    let client = client.clone();
    Poller::spawn("queue", QUEUE_INTERVAL, move || {
        let client = client.clone();
        async move { client.queue().await }
    })
}

pub fn individual_jobs(client: &ApiClient) -> Poller<IndividualJobsResponse> {
    let client = client.clone();
    Poller::spawn("individual_jobs", INDIVIDUAL_JOBS_INTERVAL, move || {
        let client = client.clone();
        async move { client.individual_jobs(None).await }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ClientError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_polls_at_fixed_interval() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let poller = Poller::spawn("count", Duration::from_secs(1), move || {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            async move { Ok::<usize, ClientError>(n) }
        });

        let mut rx = poller.subscribe();
        rx.wait_for(|s| !s.is_loading).await.unwrap();
        assert_eq!(poller.latest().data, Some(1));

        tokio::time::sleep(Duration::from_millis(3500)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(poller.latest().data, Some(4));
        assert!(poller.latest().error.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_keeps_last_value() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let poller = Poller::spawn("flaky", Duration::from_secs(1), move || {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Ok(7u32)
                } else {
                    Err(ClientError::Api {
                        status: 500,
                        message: "boom".into(),
                    })
                }
            }
        });

        tokio::time::sleep(Duration::from_millis(1500)).await;
        let state = poller.latest();
        assert_eq!(state.data, Some(7));
        assert_eq!(state.error.as_deref(), Some("boom"));
        assert!(!state.is_loading);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_backend_still_delivers() {
        let calls = Arc::new(AtomicUsize::new(0));
        let in_flight = Arc::new(AtomicUsize::new(0));
        let max_in_flight = Arc::new(AtomicUsize::new(0));
        let (counter, active, peak) = (
            Arc::clone(&calls),
            Arc::clone(&in_flight),
            Arc::clone(&max_in_flight),
        );
        let poller = Poller::spawn("slow", Duration::from_secs(1), move || {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            let active = Arc::clone(&active);
            let peak = Arc::clone(&peak);
            async move {
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(1200)).await;
                active.fetch_sub(1, Ordering::SeqCst);
                Ok::<usize, ClientError>(n)
            }
        });

        let mut rx = poller.subscribe();
        rx.wait_for(|s| !s.is_loading).await.unwrap();
        assert_eq!(poller.latest().data, Some(1));

        tokio::time::sleep(Duration::from_secs(10)).await;
        let state = poller.latest();
        assert!(state.error.is_none());
        assert!(state.data.unwrap_or(0) >= 7);
        assert_eq!(max_in_flight.load(Ordering::SeqCst), 1);
        let total = calls.load(Ordering::SeqCst);
        assert!((8..=10).contains(&total), "calls = {total}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_stops_polling() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let poller = Poller::spawn("dropped", Duration::from_secs(1), move || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Ok::<(), ClientError>(()) }
        });
        tokio::time::sleep(Duration::from_millis(1500)).await;
        drop(poller);

        let before = calls.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(calls.load(Ordering::SeqCst), before);
    }
}
