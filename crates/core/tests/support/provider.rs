use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use slotflow_core::workflows::ports::NotificationProvider;
use slotflow_domain::{Result as DomainResult, ScheduledDelivery, SlotflowError};

/// Notification provider that records every call.
///
/// `fail_schedule` makes every schedule call fail; `fail_cancel` does the
/// same for cancellations.
#[derive(Default)]
pub struct RecordingProvider {
    scheduled: Mutex<Vec<ScheduledDelivery>>,
    cancelled: Mutex<Vec<String>>,
    counter: AtomicUsize,
    fail_schedule: AtomicBool,
    fail_cancel: AtomicBool,
}

impl RecordingProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_schedule(&self, fail: bool) {
        self.fail_schedule.store(fail, Ordering::SeqCst);
    }

    pub fn fail_cancel(&self, fail: bool) {
        self.fail_cancel.store(fail, Ordering::SeqCst);
    }

    pub fn scheduled(&self) -> Vec<ScheduledDelivery> {
        self.scheduled.lock().unwrap().clone()
    }

    pub fn cancelled(&self) -> Vec<String> {
        self.cancelled.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.scheduled.lock().unwrap().len() + self.cancelled.lock().unwrap().len()
    }
}

#[async_trait]
impl NotificationProvider for RecordingProvider {
    async fn schedule(&self, delivery: &ScheduledDelivery) -> DomainResult<String> {
        self.scheduled.lock().unwrap().push(delivery.clone());
        if self.fail_schedule.load(Ordering::SeqCst) {
            return Err(SlotflowError::Provider("provider unavailable".into()));
        }
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        Ok(format!("msg-{n}"))
    }

    async fn cancel(&self, provider_reference: &str) -> DomainResult<()> {
        self.cancelled.lock().unwrap().push(provider_reference.to_string());
        if self.fail_cancel.load(Ordering::SeqCst) {
            return Err(SlotflowError::Provider("cancel rejected".into()));
        }
        Ok(())
    }
}
