//! Relational store and transactional session for the monitor execution
//! platform: Monitor, CodeModule, Issue, Alert, Notification, Variable,
//! and MonitorExecution repositories, plus a `Session` abstraction for
//! commit-gated deferred events.

pub mod alert;
pub mod code_module;
pub mod error;
pub mod execution;
pub mod issue;
pub mod monitor;
pub mod notification;
pub mod pool;
pub mod session;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod variable;

pub use alert::{Alert, AlertRepository, AlertStatus, AlertStore};
pub use code_module::{CodeModule, CodeModuleRepository, CodeModuleStore};
pub use error::{DbError, Result};
pub use execution::{ExecutionStatus, MonitorExecution, MonitorExecutionRepository, MonitorExecutionStore};
pub use issue::{Issue, IssueRepository, IssueStatus, IssueStore};
pub use monitor::{Monitor, MonitorRepository, MonitorStore};
pub use notification::{Notification, NotificationRepository, NotificationStatus, NotificationStore};
pub use pool::{create_pool, run_migrations};
pub use session::Session;
pub use variable::{Variable, VariableRepository, VariableStore};
