//! Mock mail transport for testing

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::errors::EmailError;
use crate::transport::{MailTransport, OutgoingMail};

/// Mock mail transport for testing
#[derive(Debug, Clone, Default)]
pub struct MockMailTransport {
    /// Counter for tracking calls
    pub send_count: Arc<AtomicUsize>,

    /// Every mail accepted so far, in call order
    sent: Arc<Mutex<Vec<OutgoingMail>>>,

    /// 1-based call numbers that fail
    failing_calls: HashSet<usize>,
    should_fail_send: bool,
}

impl MockMailTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_send_failure(mut self) -> Self {
        self.should_fail_send = true;
        self
    }

    /// Fail the n-th call to `send` (1-based)
    pub fn with_failure_on_call(mut self, call: usize) -> Self {
        self.failing_calls.insert(call);
        self
    }

    pub fn send_call_count(&self) -> usize {
        self.send_count.load(Ordering::SeqCst)
    }

    pub fn sent_mails(&self) -> Vec<OutgoingMail> {
        self.sent.lock().map(|sent| sent.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl MailTransport for MockMailTransport {
    async fn send(&self, mail: &OutgoingMail) -> Result<(), EmailError> {
        let call = self.send_count.fetch_add(1, Ordering::SeqCst) + 1;

        if self.should_fail_send || self.failing_calls.contains(&call) {
            return Err(EmailError::Transport(format!(
                "Mock send failure on call {}",
                call
            )));
        }

        if let Ok(mut sent) = self.sent.lock() {
            sent.push(mail.clone());
        }
        Ok(())
    }
}
