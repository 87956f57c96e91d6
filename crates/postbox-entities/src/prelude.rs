pub use super::attachments::Entity as Attachments;
pub use super::email_attachments::Entity as EmailAttachments;
pub use super::email_parameters::Entity as EmailParameters;
pub use super::email_templates::Entity as EmailTemplates;
pub use super::emails::Entity as Emails;
pub use super::sweep_leases::Entity as SweepLeases;
