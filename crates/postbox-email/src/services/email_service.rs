//! Email service: enqueue requests and deliver pending ones

use async_trait::async_trait;
use postbox_core::{Cipher, Fingerprint};
use postbox_entities::emails;
use sea_orm::DatabaseConnection;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::dispatcher::PendingEmailProcessor;
use crate::errors::EmailError;
use crate::render::render;
use crate::repositories::{
    AttachmentRepository, DeliveryOutcome, EmailStats, NewQueuedEmail, QueueRepository,
    QueuedEmail, SweepLeaseRepository, TemplateRepository, EMAIL_SWEEP_LEASE,
};
use crate::services::AttachmentService;
use crate::transport::{MailAttachment, MailTransport, OutgoingMail};

const MAX_PARAMETER_NAME_LENGTH: usize = 50;

/// A sweep lease not renewed for this long is considered abandoned
const SWEEP_LEASE_TTL_MINUTES: i64 = 5;

/// Request to queue an email
#[derive(Debug, Clone, Default)]
pub struct EnqueueEmailRequest {
    pub receiver: String,
    pub cc_receivers: Vec<String>,
    pub template_name: String,
    /// Fingerprints returned by [`AttachmentService::add_file`]
    pub attachment_fingerprints: Vec<String>,
    pub parameters: BTreeMap<String, String>,
}

/// Result of [`EmailService::enqueue`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnqueueOutcome {
    Queued(Uuid),
    /// Some fingerprints did not resolve; nothing was stored
    MissingAttachments { requested: usize, found: usize },
}

/// Counts for one pass over the pending queue
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub attempted: usize,
    pub delivered: usize,
    pub failed: usize,
    /// Another process held the sweep lease; nothing was touched
    pub skipped: bool,
}

/// Service for queueing and delivering emails
#[derive(Clone)]
pub struct EmailService {
    queue: QueueRepository,
    templates: TemplateRepository,
    attachments: AttachmentService,
    leases: SweepLeaseRepository,
    transport: Arc<dyn MailTransport>,
}

impl EmailService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        cipher: Arc<dyn Cipher>,
        fingerprint: Arc<dyn Fingerprint>,
        transport: Arc<dyn MailTransport>,
    ) -> Self {
        let attachments = AttachmentService::new(
            AttachmentRepository::new(db.clone(), cipher.clone()),
            fingerprint,
        );
        Self {
            queue: QueueRepository::new(db.clone(), cipher),
            templates: TemplateRepository::new(db.clone()),
            leases: SweepLeaseRepository::new(db),
            attachments,
            transport,
        }
    }

    pub fn templates(&self) -> &TemplateRepository {
        &self.templates
    }

    pub fn attachments(&self) -> &AttachmentService {
        &self.attachments
    }

    /// Queue an email for the next sweep
    ///
    /// The flow is:
    /// 1. Validate receiver, template name and parameter names
    /// 2. Resolve attachment fingerprints; if any is unknown, store nothing
    /// 3. Persist the email, its parameters and attachment links atomically
    pub async fn enqueue(&self, request: EnqueueEmailRequest) -> Result<EnqueueOutcome, EmailError> {
        if request.receiver.trim().is_empty() {
            return Err(EmailError::Validation("Receiver is required".to_string()));
        }
        if request.template_name.trim().is_empty() {
            return Err(EmailError::Validation(
                "Template name is required".to_string(),
            ));
        }
        for name in request.parameters.keys() {
            if name.is_empty() || name.chars().count() > MAX_PARAMETER_NAME_LENGTH {
                return Err(EmailError::Validation(format!(
                    "Parameter name '{}' must be 1 to {} characters",
                    name, MAX_PARAMETER_NAME_LENGTH
                )));
            }
        }

        let mut seen = HashSet::new();
        let fingerprints: Vec<String> = request
            .attachment_fingerprints
            .iter()
            .map(|h| h.trim().to_string())
            .filter(|h| !h.is_empty() && seen.insert(h.clone()))
            .collect();

        let mut attachment_ids = Vec::with_capacity(fingerprints.len());
        if !fingerprints.is_empty() {
            let resolved = self.attachments.resolve_ids(&fingerprints).await?;
            if resolved.len() < fingerprints.len() {
                error!(
                    "Not all attachments could be found: requested {}, found {}",
                    fingerprints.len(),
                    resolved.len()
                );
                return Ok(EnqueueOutcome::MissingAttachments {
                    requested: fingerprints.len(),
                    found: resolved.len(),
                });
            }
            attachment_ids.extend(fingerprints.iter().filter_map(|h| resolved.get(h).copied()));
        }

        let template_name = request.template_name.trim().to_string();
        let id = self
            .queue
            .add(NewQueuedEmail {
                receiver: request.receiver,
                cc_receivers: request.cc_receivers,
                template_name: template_name.clone(),
                attachment_ids,
                parameters: request.parameters,
            })
            .await?;

        info!("Queued email {} using template '{}'", id, template_name);
        Ok(EnqueueOutcome::Queued(id))
    }

    /// Deliver every pending email, oldest first
    ///
    /// Only one sweep runs at a time per database: the sweep lease is claimed
    /// first, and if another process holds it the report comes back `skipped`.
    /// A failure to prepare or send one email is recorded on that email and
    /// the sweep moves on. Failing to record an outcome aborts the sweep.
    pub async fn process_pending(&self) -> Result<SweepReport, EmailError> {
        let holder = Uuid::new_v4();
        let ttl = chrono::Duration::minutes(SWEEP_LEASE_TTL_MINUTES);
        if !self.leases.try_acquire(EMAIL_SWEEP_LEASE, holder, ttl).await? {
            info!("Another sweep is in progress, skipping");
            return Ok(SweepReport {
                skipped: true,
                ..Default::default()
            });
        }

        let result = self.sweep(holder).await;

        if let Err(e) = self.leases.release(EMAIL_SWEEP_LEASE, holder).await {
            warn!("Failed to release sweep lease: {}", e);
        }
        result
    }

    async fn sweep(&self, holder: Uuid) -> Result<SweepReport, EmailError> {
        let ids = self.queue.pending_ids().await?;
        let mut report = SweepReport::default();

        if ids.is_empty() {
            debug!("No pending emails");
            return Ok(report);
        }
        info!("Processing {} pending email(s)", ids.len());

        for id in ids {
            let model = match self.queue.get(id).await {
                Ok(model) => model,
                Err(EmailError::EmailNotFound(_)) => {
                    warn!("Email {} disappeared before delivery", id);
                    continue;
                }
                Err(e) => return Err(e),
            };
            report.attempted += 1;

            let mut subject = String::new();
            let outcome = match self.deliver(&model, &mut subject).await {
                Ok(()) => {
                    debug!("Delivered email {}", id);
                    report.delivered += 1;
                    DeliveryOutcome::Delivered
                }
                Err(e) => {
                    let message = format!(
                        "Mail with id \"{}\" could not be sent for email: \"{}\" with subject: \"{}\"\n{}",
                        id, model.receiver, subject, e
                    );
                    error!("{}", message);
                    report.failed += 1;
                    DeliveryOutcome::Failed(message)
                }
            };

            self.queue.mark_processed(id, outcome).await?;

            if !self.leases.renew(EMAIL_SWEEP_LEASE, holder).await? {
                warn!("Sweep lease was taken over, stopping after email {}", id);
                break;
            }
        }

        info!(
            "Sweep finished: {} attempted, {} delivered, {} failed",
            report.attempted, report.delivered, report.failed
        );
        Ok(report)
    }

    /// Render and send one email; `subject` is filled in as soon as it is known
    async fn deliver(&self, model: &emails::Model, subject: &mut String) -> Result<(), EmailError> {
        let template = self.templates.get(model.template_id).await?;
        let parameters = self.queue.parameters(model.id).await?;

        *subject = render(&template.subject, &parameters);
        let html_body = render(&template.content, &parameters);

        let view = self.queue.decrypt(model.clone())?;
        let attachments = self
            .queue
            .attachments(model.id)
            .await?
            .into_iter()
            .map(|a| MailAttachment {
                file_name: a.file_name,
                content: a.content,
            })
            .collect();

        let mail = OutgoingMail {
            receiver: view.receiver,
            cc_receivers: view.cc_receivers,
            subject: subject.clone(),
            html_body,
            attachments,
        };

        self.transport.send(&mail).await
    }

    /// Pending emails, oldest first, decrypted
    pub async fn list_unsent(&self) -> Result<Vec<QueuedEmail>, EmailError> {
        self.queue.list_pending().await
    }

    pub async fn get(&self, id: Uuid) -> Result<QueuedEmail, EmailError> {
        let model = self.queue.get(id).await?;
        self.queue.decrypt(model)
    }

    pub async fn stats(&self) -> Result<EmailStats, EmailError> {
        self.queue.stats().await
    }
}

#[async_trait]
impl PendingEmailProcessor for EmailService {
    async fn process_pending(&self) -> Result<SweepReport, EmailError> {
        EmailService::process_pending(self).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::{DeliveryState, TemplateInput};
    use crate::transport::MockMailTransport;
    use postbox_core::{AesCbcCipher, XxHash64Fingerprint};
    use postbox_database::test_utils::TestDatabase;

    const KEY: &str = "MDEyMzQ1Njc4OWFiY2RlZjAxMjM0NTY3ODlhYmNkZWY=";
    const IV: &str = "YWJjZGVmMDEyMzQ1Njc4OQ==";

    // Helper to setup test environment with real database
    async fn setup_test_env(transport: MockMailTransport) -> (TestDatabase, EmailService) {
        let db = TestDatabase::with_migrations().await.unwrap();
        let cipher: Arc<dyn Cipher> = Arc::new(AesCbcCipher::new(Some(KEY), Some(IV)).unwrap());
        let service = EmailService::new(
            db.db.clone(),
            cipher,
            Arc::new(XxHash64Fingerprint::default()),
            Arc::new(transport),
        );

        service
            .templates()
            .add(TemplateInput {
                name: "Welcome".to_string(),
                subject: "Hi ${name}".to_string(),
                content: "Welcome ${name}!".to_string(),
            })
            .await
            .unwrap();

        (db, service)
    }

    fn welcome(receiver: &str, name: &str) -> EnqueueEmailRequest {
        EnqueueEmailRequest {
            receiver: receiver.to_string(),
            template_name: "Welcome".to_string(),
            parameters: BTreeMap::from([("name".to_string(), name.to_string())]),
            ..Default::default()
        }
    }

    fn queued_id(outcome: EnqueueOutcome) -> Uuid {
        match outcome {
            EnqueueOutcome::Queued(id) => id,
            other => panic!("expected queued email, got {:?}", other),
        }
    }

    // ============================================
    // Enqueue
    // ============================================

    #[tokio::test]
    async fn test_enqueue_requires_receiver_and_template() {
        let (db, service) = setup_test_env(MockMailTransport::new()).await;

        let result = service.enqueue(welcome("  ", "Ada")).await;
        assert!(matches!(result, Err(EmailError::Validation(_))));

        let mut request = welcome("ada@example.com", "Ada");
        request.template_name = String::new();
        assert!(matches!(
            service.enqueue(request).await,
            Err(EmailError::Validation(_))
        ));

        assert_eq!(db.count_rows("emails").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_enqueue_unknown_template() {
        let (db, service) = setup_test_env(MockMailTransport::new()).await;

        let mut request = welcome("ada@example.com", "Ada");
        request.template_name = "Missing".to_string();

        let result = service.enqueue(request).await;
        assert!(matches!(result, Err(EmailError::TemplateNotFound(_))));
        assert_eq!(db.count_rows("emails").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_enqueue_with_missing_attachment_persists_nothing() {
        let (db, service) = setup_test_env(MockMailTransport::new()).await;

        let h1 = service.attachments().add_file("a.txt", b"alpha").await.unwrap();
        let mut request = welcome("ada@example.com", "Ada");
        request.attachment_fingerprints = vec![h1, "h2".to_string()];

        let outcome = service.enqueue(request).await.unwrap();
        assert_eq!(
            outcome,
            EnqueueOutcome::MissingAttachments {
                requested: 2,
                found: 1
            }
        );
        assert_eq!(db.count_rows("emails").await.unwrap(), 0);
        assert_eq!(db.count_rows("email_attachments").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_enqueue_deduplicates_fingerprints() {
        let (db, service) = setup_test_env(MockMailTransport::new()).await;

        let h1 = service.attachments().add_file("a.txt", b"alpha").await.unwrap();
        let mut request = welcome("ada@example.com", "Ada");
        request.attachment_fingerprints = vec![h1.clone(), h1];

        queued_id(service.enqueue(request).await.unwrap());
        assert_eq!(db.count_rows("email_attachments").await.unwrap(), 1);
    }

    // ============================================
    // Delivery
    // ============================================

    #[tokio::test]
    async fn test_enqueue_then_dispatch_renders_template() {
        let transport = MockMailTransport::new();
        let (_db, service) = setup_test_env(transport.clone()).await;

        let id = queued_id(service.enqueue(welcome("ada@example.com", "Ada")).await.unwrap());

        let report = service.process_pending().await.unwrap();
        assert_eq!(
            report,
            SweepReport {
                attempted: 1,
                delivered: 1,
                failed: 0,
                ..Default::default()
            }
        );

        let sent = transport.sent_mails();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].receiver, "ada@example.com");
        assert_eq!(sent[0].subject, "Hi Ada");
        assert_eq!(sent[0].html_body, "Welcome Ada!");

        let email = service.get(id).await.unwrap();
        assert_eq!(email.state, DeliveryState::Delivered);
        assert!(email.sent_on.is_some());
        assert!(email.delivery_message.is_none());
    }

    #[tokio::test]
    async fn test_dispatch_includes_cc_and_attachments() {
        let transport = MockMailTransport::new();
        let (_db, service) = setup_test_env(transport.clone()).await;

        let hash = service
            .attachments()
            .add_file("report.pdf", b"%PDF-1.4")
            .await
            .unwrap();
        let mut request = welcome("ada@example.com", "Ada");
        request.cc_receivers = vec!["grace@example.com".to_string()];
        request.attachment_fingerprints = vec![hash];
        queued_id(service.enqueue(request).await.unwrap());

        service.process_pending().await.unwrap();

        let sent = transport.sent_mails();
        assert_eq!(sent[0].cc_receivers, vec!["grace@example.com".to_string()]);
        assert_eq!(sent[0].attachments.len(), 1);
        assert_eq!(sent[0].attachments[0].file_name, "report.pdf");
        assert_eq!(sent[0].attachments[0].content, b"%PDF-1.4".to_vec());
    }

    #[tokio::test]
    async fn test_empty_parameter_renders_as_empty_string() {
        let transport = MockMailTransport::new();
        let (_db, service) = setup_test_env(transport.clone()).await;

        queued_id(service.enqueue(welcome("ada@example.com", "")).await.unwrap());
        service.process_pending().await.unwrap();

        assert_eq!(transport.sent_mails()[0].subject, "Hi ");
    }

    #[tokio::test]
    async fn test_one_failure_does_not_stop_the_sweep() {
        let transport = MockMailTransport::new().with_failure_on_call(2);
        let (_db, service) = setup_test_env(transport.clone()).await;

        let mut ids = Vec::new();
        for name in ["Ada", "Grace", "Alan"] {
            let receiver = format!("{}@example.com", name.to_lowercase());
            ids.push(queued_id(service.enqueue(welcome(&receiver, name)).await.unwrap()));
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }

        let report = service.process_pending().await.unwrap();
        assert_eq!(
            report,
            SweepReport {
                attempted: 3,
                delivered: 2,
                failed: 1,
                ..Default::default()
            }
        );
        assert_eq!(transport.send_call_count(), 3);

        let first = service.get(ids[0]).await.unwrap();
        let second = service.get(ids[1]).await.unwrap();
        let third = service.get(ids[2]).await.unwrap();
        assert_eq!(first.state, DeliveryState::Delivered);
        assert_eq!(second.state, DeliveryState::Failed);
        assert_eq!(third.state, DeliveryState::Delivered);

        let message = second.delivery_message.unwrap();
        assert!(message.starts_with(&format!("Mail with id \"{}\"", ids[1])));
        assert!(message.contains("with subject: \"Hi Grace\""));
        assert!(message.contains("Mock send failure"));

        // Nothing is left pending, failures are not retried
        assert!(service.list_unsent().await.unwrap().is_empty());
        let report = service.process_pending().await.unwrap();
        assert_eq!(report.attempted, 0);
    }

    #[tokio::test]
    async fn test_dispatch_order_is_fifo() {
        let transport = MockMailTransport::new();
        let (_db, service) = setup_test_env(transport.clone()).await;

        for name in ["first", "second", "third"] {
            queued_id(
                service
                    .enqueue(welcome(&format!("{}@example.com", name), name))
                    .await
                    .unwrap(),
            );
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }

        service.process_pending().await.unwrap();

        let subjects: Vec<_> = transport
            .sent_mails()
            .into_iter()
            .map(|m| m.subject)
            .collect();
        assert_eq!(subjects, vec!["Hi first", "Hi second", "Hi third"]);
    }

    #[tokio::test]
    async fn test_list_unsent_and_stats() {
        let transport = MockMailTransport::new().with_failure_on_call(1);
        let (_db, service) = setup_test_env(transport).await;

        queued_id(service.enqueue(welcome("ada@example.com", "Ada")).await.unwrap());
        let unsent = service.list_unsent().await.unwrap();
        assert_eq!(unsent.len(), 1);
        assert_eq!(unsent[0].receiver, "ada@example.com");
        assert_eq!(unsent[0].state, DeliveryState::Pending);

        service.process_pending().await.unwrap();
        queued_id(service.enqueue(welcome("grace@example.com", "Grace")).await.unwrap());

        let stats = service.stats().await.unwrap();
        assert_eq!(
            stats,
            EmailStats {
                total: 2,
                pending: 1,
                delivered: 0,
                failed: 1
            }
        );
    }

    // ============================================
    // Cross-process single flight
    // ============================================

    #[tokio::test]
    async fn test_sweep_is_skipped_while_another_process_holds_the_lease() {
        let transport = MockMailTransport::new();
        let (db, service) = setup_test_env(transport.clone()).await;
        let id = queued_id(service.enqueue(welcome("ada@example.com", "Ada")).await.unwrap());

        // A second process sharing the database is mid-sweep
        let other = SweepLeaseRepository::new(db.db.clone());
        let other_holder = Uuid::new_v4();
        assert!(other
            .try_acquire(EMAIL_SWEEP_LEASE, other_holder, chrono::Duration::minutes(5))
            .await
            .unwrap());

        let report = service.process_pending().await.unwrap();
        assert!(report.skipped);
        assert_eq!(report.attempted, 0);
        assert_eq!(transport.send_call_count(), 0);
        assert_eq!(service.get(id).await.unwrap().state, DeliveryState::Pending);

        other.release(EMAIL_SWEEP_LEASE, other_holder).await.unwrap();

        let report = service.process_pending().await.unwrap();
        assert!(!report.skipped);
        assert_eq!(report.delivered, 1);
        assert_eq!(transport.send_call_count(), 1);
    }

    #[tokio::test]
    async fn test_sweep_releases_the_lease() {
        let transport = MockMailTransport::new().with_failure_on_call(1);
        let (db, service) = setup_test_env(transport).await;
        queued_id(service.enqueue(welcome("ada@example.com", "Ada")).await.unwrap());

        service.process_pending().await.unwrap();
        assert_eq!(db.count_rows("sweep_leases").await.unwrap(), 0);

        let report = service.process_pending().await.unwrap();
        assert!(!report.skipped);
        assert_eq!(db.count_rows("sweep_leases").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_get_unknown_email() {
        let (_db, service) = setup_test_env(MockMailTransport::new()).await;
        let id = Uuid::new_v4();
        assert!(matches!(
            service.get(id).await,
            Err(EmailError::EmailNotFound(missing)) if missing == id
        ));
    }
}
