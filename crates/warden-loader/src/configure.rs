//! Applies registration-time defaults to a freshly materialized module:
//! merges notification handles into the reaction lists that deliver
//! them, so a module author doesn't have to wire both by hand.

use warden_module::{EventName, MonitorModule};

const NOTIFY_CALLBACK: &str = "notify";

/// For every configured notification handle, make sure `alert_created`
/// and `alert_solved` have a `notify` reaction registered. Idempotent:
/// running it twice does not duplicate callback names.
pub fn configure_monitor(mut module: MonitorModule) -> MonitorModule {
	if module.notification_options.is_empty() {
		return module;
	}

	for event in [EventName::AlertCreated, EventName::AlertSolved] {
		let callbacks = module.reaction_options.reactions.entry(event).or_default();
		if !callbacks.iter().any(|c| c == NOTIFY_CALLBACK) {
			callbacks.push(NOTIFY_CALLBACK.to_string());
		}
	}

	module
}

#[cfg(test)]
mod tests {
	use super::*;
	use futures::future::FutureExt;
	use std::sync::Arc;
	use warden_module::{AlertOptions, IssueOptions, ModuleBuilder, MonitorOptions, PriorityLevels, Rule};

	fn module_with_notifications(notifications: Vec<String>) -> MonitorModule {
		ModuleBuilder::new(
			MonitorOptions {
				search_cron: Some("* * * * *".to_string()),
				update_cron: None,
				max_issues_creation: 1,
				execution_timeout_secs: 30,
			},
			IssueOptions {
				model_id_key: "id".to_string(),
				solvable: false,
				unique: false,
			},
			AlertOptions {
				rule: Rule::Count {
					priority_levels: PriorityLevels::default(),
				},
				dismiss_acknowledge_on_new_issues: true,
			},
			Arc::new(|_| async { Ok(vec![]) }.boxed()),
		)
		.with_notification_options(notifications)
		.build()
	}

	#[test]
	fn adds_notify_callback_when_notifications_configured() {
		let module = configure_monitor(module_with_notifications(vec!["slack".to_string()]));
		assert_eq!(
			module.reaction_options.callbacks_for(EventName::AlertCreated),
			&["notify".to_string()]
		);
		assert_eq!(
			module.reaction_options.callbacks_for(EventName::AlertSolved),
			&["notify".to_string()]
		);
	}

	#[test]
	fn leaves_reactions_untouched_without_notifications() {
		let module = configure_monitor(module_with_notifications(vec![]));
		assert!(module.reaction_options.callbacks_for(EventName::AlertCreated).is_empty());
	}

	#[test]
	fn does_not_duplicate_existing_notify_callback() {
		let mut module = module_with_notifications(vec!["slack".to_string()]);
		module
			.reaction_options
			.reactions
			.entry(EventName::AlertCreated)
			.or_default()
			.push("notify".to_string());

		let module = configure_monitor(module);
		assert_eq!(module.reaction_options.callbacks_for(EventName::AlertCreated).len(), 1);
	}
}
