//! Email services

mod attachment_service;
mod email_service;

pub use attachment_service::AttachmentService;
pub use email_service::{EmailService, EnqueueEmailRequest, EnqueueOutcome, SweepReport};
