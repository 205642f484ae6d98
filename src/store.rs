//! Storage contract and built-in backends for the current [`Session`].

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

// self
use crate::{_prelude::*, auth::Session};

/// Boxed future returned by [`TokenStore`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Persistence contract for the single current session.
///
/// Stores never validate token contents. Absence is a valid answer from
/// [`get`](TokenStore::get), not an error.
pub trait TokenStore
where
	Self: Send + Sync,
{
	/// Returns the current session, if one is stored.
	fn get(&self) -> StoreFuture<'_, Option<Session>>;

	/// Replaces the current session.
	fn set(&self, session: Session) -> StoreFuture<'_, ()>;

	/// Removes every stored token.
	fn clear(&self) -> StoreFuture<'_, ()>;
}

/// Error type produced by [`TokenStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

/// Lifetime and scope applied to one persisted token.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPolicy {
	/// How long the persisted value remains readable after it was written.
	pub max_age: Duration,
	/// Path scope recorded alongside the value.
	pub path: String,
}
impl TokenPolicy {
	const DEFAULT_MAX_AGE: Duration = Duration::days(30);

	/// Creates a policy with the provided max-age and the root path scope.
	pub fn new(max_age: Duration) -> Self {
		Self { max_age, path: "/".into() }
	}

	/// Overrides the path scope.
	pub fn with_path(mut self, path: impl Into<String>) -> Self {
		self.path = path.into();

		self
	}

	/// Returns the expiry instant for a value written at `written_at`.
	pub fn expires_at(&self, written_at: OffsetDateTime) -> OffsetDateTime {
		written_at.saturating_add(self.max_age)
	}
}
impl Default for TokenPolicy {
	fn default() -> Self {
		Self::new(Self::DEFAULT_MAX_AGE)
	}
}
