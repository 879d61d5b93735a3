//! Monitor module capability set: the options a monitor declares, the
//! priority rule engine, and the validation contract a module must
//! pass before it can be registered.

pub mod module;
pub mod options;
pub mod priority;
pub mod validate;

pub use module::{IsSolvedFn, ModuleBuilder, MonitorModule, ReactionFn, RoutineContext, SearchFn, UpdateFn};
pub use options::{
	AlertOptions, EventName, IssueOptions, MonitorOptions, NotificationOptions, PriorityLevels,
	ReactionCallbackName, ReactionOptions, Rule, ValueOperation,
};
pub use priority::{calculate_priority, AlertPriority, IssueSnapshot};
pub use validate::{validate, ModuleValidationError};
