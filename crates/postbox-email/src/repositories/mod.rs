//! Persistence for templates, queued emails and attachments

mod attachment_repository;
mod queue_repository;
mod sweep_lease_repository;
mod template_repository;

pub(crate) use attachment_repository::validate_file_name;
pub use attachment_repository::{Attachment, AttachmentInfo, AttachmentRepository};
pub use queue_repository::{
    DeliveryOutcome, DeliveryState, EmailStats, NewQueuedEmail, QueueRepository, QueuedEmail,
};
pub use sweep_lease_repository::{SweepLeaseRepository, EMAIL_SWEEP_LEASE};
pub use template_repository::{TemplateInput, TemplateRepository};
