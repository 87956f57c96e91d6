//! Transactional email queue for Postbox
//!
//! Callers enqueue a template name, a receiver and parameters; a background
//! dispatcher renders and delivers pending emails and records the outcome.
//!
//! Features:
//! - Encrypted storage of receivers, CC lists, parameters and attachments
//! - Content-addressed attachment store with de-duplication
//! - `${name}` placeholder templates
//! - Single-flight periodic delivery over SMTP, across processes sharing a database

pub mod dispatcher;
pub mod errors;
pub mod render;
pub mod repositories;
pub mod services;
pub mod transport;

// Re-export main types
pub use dispatcher::{DispatcherStats, EmailDispatcher, PendingEmailProcessor};
pub use errors::EmailError;
pub use repositories::{
    AttachmentRepository, DeliveryState, EmailStats, QueueRepository, QueuedEmail,
    SweepLeaseRepository, TemplateInput, TemplateRepository, EMAIL_SWEEP_LEASE,
};
pub use services::{
    AttachmentService, EmailService, EnqueueEmailRequest, EnqueueOutcome, SweepReport,
};
pub use transport::{MailTransport, OutgoingMail, SmtpMailTransport, SmtpSettings, TlsMode};
