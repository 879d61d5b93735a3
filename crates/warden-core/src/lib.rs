//! Shared identifiers, timestamps, and value coercion used across the
//! Warden monitor execution platform.

pub mod ids;
pub mod json;
pub mod time;

pub use ids::{AlertId, IssueId, MonitorId, NotificationId};
