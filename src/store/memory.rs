//! Thread-safe in-memory [`TokenStore`] implementation for local development and tests.

// self
use crate::{
	_prelude::*,
	auth::Session,
	store::{StoreFuture, TokenStore},
};

type SessionSlot = Arc<RwLock<Option<Session>>>;

/// Storage backend that keeps the session in-process.
///
/// Clones share the same slot, so a clone handed to a terminator observes the writes made
/// through the original.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore(SessionSlot);
impl MemoryStore {
	/// Creates a store seeded with `session`.
	pub fn with_session(session: Session) -> Self {
		Self(Arc::new(RwLock::new(Some(session))))
	}

	/// Returns the stored session without going through the async contract.
	pub fn snapshot(&self) -> Option<Session> {
		self.0.read().clone()
	}
}
impl TokenStore for MemoryStore {
	fn get(&self) -> StoreFuture<'_, Option<Session>> {
		let slot = self.0.clone();

		Box::pin(async move { Ok(slot.read().clone()) })
	}

	fn set(&self, session: Session) -> StoreFuture<'_, ()> {
		let slot = self.0.clone();

		Box::pin(async move {
			*slot.write() = Some(session);

			Ok(())
		})
	}

	fn clear(&self) -> StoreFuture<'_, ()> {
		let slot = self.0.clone();

		Box::pin(async move {
			slot.write().take();

			Ok(())
		})
	}
}
