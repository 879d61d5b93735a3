//! Module factories: the pluggable interface that turns a monitor's
//! stored `code`/`additional_files` into a live `MonitorModule`.
//!
//! Monitors compiled into this binary register a zero-argument factory
//! keyed by name; `code` and `additional_files` are kept only as an
//! audit trail of what was registered and when.

use std::collections::HashMap;
use std::sync::Arc;

use warden_module::MonitorModule;

pub trait ModuleFactory: Send + Sync {
	fn create(&self) -> MonitorModule;
}

impl<F> ModuleFactory for F
where
	F: Fn() -> MonitorModule + Send + Sync,
{
	fn create(&self) -> MonitorModule {
		(self)()
	}
}

/// `monitor name -> factory`, populated at startup by whichever crate
/// owns the compiled-in monitor implementations.
#[derive(Clone, Default)]
pub struct ModuleFactoryTable {
	factories: HashMap<String, Arc<dyn ModuleFactory>>,
}

impl ModuleFactoryTable {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn register(&mut self, name: impl Into<String>, factory: Arc<dyn ModuleFactory>) {
		self.factories.insert(name.into(), factory);
	}

	pub fn get(&self, name: &str) -> Option<Arc<dyn ModuleFactory>> {
		self.factories.get(name).cloned()
	}

	pub fn names(&self) -> impl Iterator<Item = &str> {
		self.factories.keys().map(String::as_str)
	}
}
