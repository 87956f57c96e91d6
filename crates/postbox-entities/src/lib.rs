pub mod attachments;
pub mod email_attachments;
pub mod email_parameters;
pub mod email_templates;
pub mod emails;
pub mod sweep_leases;

pub mod prelude;
