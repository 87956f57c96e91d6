//! Outbound mail delivery

mod smtp;
mod traits;

pub mod mock;

pub use mock::MockMailTransport;
pub use smtp::{SmtpMailTransport, SmtpSettings, TlsMode};
pub use traits::*;
