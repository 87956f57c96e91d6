//! Shared type aliases

use chrono::{DateTime as ChronoDateTime, Utc};

/// Database DateTime type used across all Postbox crates
///
/// # Example
/// ```rust
/// use postbox_core::DBDateTime;
///
/// let created_on: DBDateTime = chrono::Utc::now();
/// assert!(created_on.timestamp() > 0);
/// ```
pub type DBDateTime = ChronoDateTime<Utc>;
