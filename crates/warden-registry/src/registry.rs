//! In-memory `monitor_id -> {name, module}` map shared between the
//! loader (sole writer) and the controller/executor (readers).

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::timeout;

use warden_core::MonitorId;
use warden_module::MonitorModule;

use crate::error::{RegistryError, Result};

struct Entry {
	name: String,
	module: MonitorModule,
}

struct Inner {
	entries: HashMap<MonitorId, Entry>,
	ready: bool,
	pending: bool,
}

/// Process-wide registry of loaded monitor modules. The loader is the
/// only writer; the controller and executor only read.
pub struct Registry {
	inner: Mutex<Inner>,
	changed: Notify,
}

impl Default for Registry {
	fn default() -> Self {
		Self::new()
	}
}

impl Registry {
	pub fn new() -> Self {
		Self {
			inner: Mutex::new(Inner {
				entries: HashMap::new(),
				ready: false,
				pending: false,
			}),
			changed: Notify::new(),
		}
	}

	/// Publishes or replaces a monitor's module. Does not affect
	/// `ready`/`pending`; callers clear/set those once a whole load pass
	/// completes.
	pub fn add(&self, id: MonitorId, name: impl Into<String>, module: MonitorModule) {
		let mut inner = self.inner.lock().unwrap();
		inner.entries.insert(
			id,
			Entry {
				name: name.into(),
				module,
			},
		);
		drop(inner);
		self.changed.notify_waiters();
	}

	pub fn remove(&self, id: MonitorId) {
		let mut inner = self.inner.lock().unwrap();
		inner.entries.remove(&id);
	}

	pub fn get_module(&self, id: MonitorId) -> Option<MonitorModule> {
		self.inner.lock().unwrap().entries.get(&id).map(|e| e.module.clone())
	}

	pub fn get_name(&self, id: MonitorId) -> Option<String> {
		self.inner.lock().unwrap().entries.get(&id).map(|e| e.name.clone())
	}

	pub fn is_registered(&self, id: MonitorId) -> bool {
		self.inner.lock().unwrap().entries.contains_key(&id)
	}

	pub fn registered_ids(&self) -> Vec<MonitorId> {
		self.inner.lock().unwrap().entries.keys().copied().collect()
	}

	/// Called by the loader when a reload begins.
	pub fn clear_ready(&self) {
		let mut inner = self.inner.lock().unwrap();
		inner.ready = false;
		drop(inner);
		self.changed.notify_waiters();
	}

	/// Called by the loader when a reload completes successfully.
	pub fn set_ready(&self) {
		let mut inner = self.inner.lock().unwrap();
		inner.ready = true;
		drop(inner);
		self.changed.notify_waiters();
	}

	pub fn is_ready(&self) -> bool {
		self.inner.lock().unwrap().ready
	}

	/// Requested externally (e.g. from the register endpoint) to ask the
	/// loader to reload sooner than its next scheduled tick.
	pub fn request_reload(&self) {
		let mut inner = self.inner.lock().unwrap();
		inner.pending = true;
		drop(inner);
		self.changed.notify_waiters();
	}

	pub fn clear_pending(&self) {
		let mut inner = self.inner.lock().unwrap();
		inner.pending = false;
	}

	pub fn is_pending(&self) -> bool {
		self.inner.lock().unwrap().pending
	}

	/// Resolves the next time `add`/`set_ready`/`clear_ready`/
	/// `request_reload` is called. Used by the loader to wake early
	/// instead of sleeping through its whole poll interval.
	pub async fn changed(&self) {
		self.changed.notified().await;
	}

	/// Blocks until `is_ready()` is true or `wait_timeout` elapses.
	pub async fn wait_ready(&self, wait_timeout: Duration) -> Result<()> {
		timeout(wait_timeout, async {
			loop {
				if self.is_ready() {
					return;
				}
				self.changed.notified().await;
			}
		})
		.await
		.map_err(|_| RegistryError::MonitorsLoadError)
	}

	/// Blocks until `id` is registered or `wait_timeout` elapses.
	pub async fn wait_monitor_loaded(&self, id: MonitorId, wait_timeout: Duration) -> Result<()> {
		timeout(wait_timeout, async {
			loop {
				if self.is_registered(id) {
					return;
				}
				self.changed.notified().await;
			}
		})
		.await
		.map_err(|_| RegistryError::MonitorNotLoaded(id.0))
	}
}
