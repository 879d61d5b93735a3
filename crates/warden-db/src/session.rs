//! Transactional session with deferred, commit-gated callbacks.
//!
//! Entity lifecycle methods stage events as callbacks on a `Session`
//! rather than emitting them directly. The callbacks only run once the
//! underlying transaction actually commits, so a rolled-back session
//! produces zero events.

use futures::future::BoxFuture;
use sqlx::{Sqlite, SqlitePool, Transaction};

use crate::error::Result;

pub type Callback = Box<dyn FnOnce() -> BoxFuture<'static, Result<()>> + Send>;

pub struct Session {
	tx: Transaction<'static, Sqlite>,
	callbacks: Vec<Callback>,
}

impl Session {
	#[tracing::instrument(skip(pool))]
	pub async fn begin(pool: &SqlitePool) -> Result<Self> {
		let tx = pool.begin().await?;
		Ok(Self {
			tx,
			callbacks: Vec::new(),
		})
	}

	/// The live connection for this session; pass to repository methods
	/// that accept a `&mut SqliteConnection`.
	pub fn connection(&mut self) -> &mut sqlx::SqliteConnection {
		&mut self.tx
	}

	/// Register a callback to fire iff this session commits.
	pub fn add(&mut self, callback: Callback) {
		self.callbacks.push(callback);
	}

	/// Commit the underlying transaction, then run every registered
	/// callback in registration order. A callback failure is reported but
	/// does not undo the already-committed transaction.
	#[tracing::instrument(skip(self))]
	pub async fn execute_callbacks(mut self) -> Result<()> {
		self.tx.commit().await?;
		for callback in self.callbacks.drain(..) {
			callback().await?;
		}
		Ok(())
	}

	/// Roll back the transaction and discard every registered callback
	/// without running it.
	#[tracing::instrument(skip(self))]
	pub async fn cancel_callbacks(mut self) -> Result<()> {
		self.callbacks.clear();
		self.tx.rollback().await?;
		Ok(())
	}
}
