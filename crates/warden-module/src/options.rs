//! The option records a monitor module declares: scheduling, issue
//! identity, alert rules, reactions, and notification handles.

use std::collections::HashMap;

/// Primary scheduling/throughput configuration for a monitor.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorOptions {
	pub search_cron: Option<String>,
	pub update_cron: Option<String>,
	pub max_issues_creation: u32,
	pub execution_timeout_secs: u64,
}

/// How issues produced by this monitor are identified and resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct IssueOptions {
	pub model_id_key: String,
	pub solvable: bool,
	pub unique: bool,
}

impl Default for IssueOptions {
	fn default() -> Self {
		Self {
			model_id_key: String::new(),
			solvable: true,
			unique: false,
		}
	}
}

/// Per-severity thresholds. `None` means that level can never trigger.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PriorityLevels {
	pub informational: Option<i64>,
	pub low: Option<i64>,
	pub moderate: Option<i64>,
	pub high: Option<i64>,
	pub critical: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueOperation {
	GreaterThan,
	LesserThan,
}

/// The three priority rule shapes a monitor can configure for its
/// alerts. See `warden_module::priority::calculate_priority`.
#[derive(Debug, Clone, PartialEq)]
pub enum Rule {
	Age { priority_levels: PriorityLevels },
	Count { priority_levels: PriorityLevels },
	Value {
		value_key: String,
		operation: ValueOperation,
		priority_levels: PriorityLevels,
	},
}

#[derive(Debug, Clone, PartialEq)]
pub struct AlertOptions {
	pub rule: Rule,
	pub dismiss_acknowledge_on_new_issues: bool,
}

/// Every event name a reaction can subscribe to. Exhaustive per the
/// platform's reaction contract; unknown names are rejected at
/// validation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventName {
	AlertAcknowledgeDismissed,
	AlertAcknowledged,
	AlertCreated,
	AlertIssuesLinked,
	AlertLocked,
	AlertPriorityDecreased,
	AlertPriorityIncreased,
	AlertSolved,
	AlertUnlocked,
	AlertUpdated,
	IssueLinked,
	IssueCreated,
	IssueDropped,
	IssueSolved,
	IssueUpdatedNotSolved,
	IssueUpdatedSolved,
	MonitorEnabledChanged,
	NotificationClosed,
	NotificationCreated,
}

impl EventName {
	pub fn as_str(&self) -> &'static str {
		match self {
			EventName::AlertAcknowledgeDismissed => "alert_acknowledge_dismissed",
			EventName::AlertAcknowledged => "alert_acknowledged",
			EventName::AlertCreated => "alert_created",
			EventName::AlertIssuesLinked => "alert_issues_linked",
			EventName::AlertLocked => "alert_locked",
			EventName::AlertPriorityDecreased => "alert_priority_decreased",
			EventName::AlertPriorityIncreased => "alert_priority_increased",
			EventName::AlertSolved => "alert_solved",
			EventName::AlertUnlocked => "alert_unlocked",
			EventName::AlertUpdated => "alert_updated",
			EventName::IssueLinked => "issue_linked",
			EventName::IssueCreated => "issue_created",
			EventName::IssueDropped => "issue_dropped",
			EventName::IssueSolved => "issue_solved",
			EventName::IssueUpdatedNotSolved => "issue_updated_not_solved",
			EventName::IssueUpdatedSolved => "issue_updated_solved",
			EventName::MonitorEnabledChanged => "monitor_enabled_changed",
			EventName::NotificationClosed => "notification_closed",
			EventName::NotificationCreated => "notification_created",
		}
	}

	pub const ALL: [EventName; 19] = [
		EventName::AlertAcknowledgeDismissed,
		EventName::AlertAcknowledged,
		EventName::AlertCreated,
		EventName::AlertIssuesLinked,
		EventName::AlertLocked,
		EventName::AlertPriorityDecreased,
		EventName::AlertPriorityIncreased,
		EventName::AlertSolved,
		EventName::AlertUnlocked,
		EventName::AlertUpdated,
		EventName::IssueLinked,
		EventName::IssueCreated,
		EventName::IssueDropped,
		EventName::IssueSolved,
		EventName::IssueUpdatedNotSolved,
		EventName::IssueUpdatedSolved,
		EventName::MonitorEnabledChanged,
		EventName::NotificationClosed,
		EventName::NotificationCreated,
	];

	pub fn parse(name: &str) -> Option<EventName> {
		Self::ALL.into_iter().find(|event| event.as_str() == name)
	}
}

pub type ReactionCallbackName = String;

/// `event name -> list of reaction callback handles`. Callback handles
/// are names resolved against a module's own registered callbacks, kept
/// as plain strings here since the platform core never invokes them
/// directly, only routes events.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReactionOptions {
	pub reactions: HashMap<EventName, Vec<ReactionCallbackName>>,
}

impl ReactionOptions {
	pub fn callbacks_for(&self, event: EventName) -> &[ReactionCallbackName] {
		self.reactions.get(&event).map(Vec::as_slice).unwrap_or(&[])
	}
}

/// Handles of notifier plugins this monitor's alerts should be
/// delivered through (e.g. `"slack"`, `"pagerduty"`).
pub type NotificationOptions = Vec<String>;
