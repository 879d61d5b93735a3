//! `MonitorModule`: the capability-set record a monitor registers under
//! its name. Search/update are asynchronous callables, `is_solved` is a
//! synchronous predicate, everything else is declarative options data.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::Map;
use serde_json::Value;

use crate::options::{AlertOptions, IssueOptions, MonitorOptions, NotificationOptions, ReactionOptions};

/// Read-only context handed to `search`/`update` callables: which
/// monitor is running, its stored variables, and, for `update`, the
/// data of every currently active issue to refresh.
///
/// `monitor_id` lets a callable read and write back its own `Variable`
/// rows (via a `VariableRepository` it captures itself, the same way
/// built-in monitors capture a `MonitorRepository`) to bookmark state
/// between runs, mirroring how the reference implementation's
/// `variables` helper scopes reads/writes to the running monitor.
#[derive(Debug, Clone, Default)]
pub struct RoutineContext {
	pub monitor_id: warden_core::MonitorId,
	pub variables: HashMap<String, String>,
	pub issues_data: Vec<Map<String, Value>>,
}

pub type SearchResult = anyhow::Result<Vec<Map<String, Value>>>;
pub type UpdateResult = anyhow::Result<Vec<Map<String, Value>>>;

pub type SearchFn = Arc<dyn Fn(RoutineContext) -> BoxFuture<'static, SearchResult> + Send + Sync>;
pub type UpdateFn = Arc<dyn Fn(RoutineContext) -> BoxFuture<'static, UpdateResult> + Send + Sync>;
pub type IsSolvedFn = Arc<dyn Fn(&Map<String, Value>) -> bool + Send + Sync>;
pub type ReactionFn = Arc<dyn Fn(Value) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

/// A registered monitor's full capability set, as handed to the loader
/// by a module factory.
#[derive(Clone)]
pub struct MonitorModule {
	pub options: MonitorOptions,
	pub issue_options: IssueOptions,
	pub alert_options: AlertOptions,
	pub reaction_options: ReactionOptions,
	pub notification_options: NotificationOptions,
	pub search: SearchFn,
	pub update: Option<UpdateFn>,
	pub is_solved: Option<IsSolvedFn>,
	/// Callback name (as referenced by `reaction_options`) to the
	/// function it resolves to on this monitor.
	pub reaction_callbacks: HashMap<String, ReactionFn>,
}

/// Builds a `MonitorModule` one field at a time; only the fields with
/// no sensible default are required by `new`.
pub struct ModuleBuilder {
	options: MonitorOptions,
	issue_options: IssueOptions,
	alert_options: AlertOptions,
	reaction_options: ReactionOptions,
	notification_options: NotificationOptions,
	search: SearchFn,
	update: Option<UpdateFn>,
	is_solved: Option<IsSolvedFn>,
	reaction_callbacks: HashMap<String, ReactionFn>,
}

impl ModuleBuilder {
	pub fn new(
		options: MonitorOptions,
		issue_options: IssueOptions,
		alert_options: AlertOptions,
		search: SearchFn,
	) -> Self {
		Self {
			options,
			issue_options,
			alert_options,
			reaction_options: ReactionOptions::default(),
			notification_options: NotificationOptions::default(),
			search,
			update: None,
			is_solved: None,
			reaction_callbacks: HashMap::new(),
		}
	}

	pub fn with_update(mut self, update: UpdateFn) -> Self {
		self.update = Some(update);
		self
	}

	pub fn with_is_solved(mut self, is_solved: IsSolvedFn) -> Self {
		self.is_solved = Some(is_solved);
		self
	}

	pub fn with_reaction_options(mut self, reaction_options: ReactionOptions) -> Self {
		self.reaction_options = reaction_options;
		self
	}

	pub fn with_notification_options(mut self, notification_options: NotificationOptions) -> Self {
		self.notification_options = notification_options;
		self
	}

	pub fn with_reaction_callback(mut self, name: impl Into<String>, callback: ReactionFn) -> Self {
		self.reaction_callbacks.insert(name.into(), callback);
		self
	}

	pub fn build(self) -> MonitorModule {
		MonitorModule {
			options: self.options,
			issue_options: self.issue_options,
			alert_options: self.alert_options,
			reaction_options: self.reaction_options,
			notification_options: self.notification_options,
			search: self.search,
			update: self.update,
			is_solved: self.is_solved,
			reaction_callbacks: self.reaction_callbacks,
		}
	}
}
