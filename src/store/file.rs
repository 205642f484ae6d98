//! File-backed [`TokenStore`] that persists each token with its own max-age and path scope.

// std
use std::{
	fs::{self, File},
	io::Write,
	path::{Path, PathBuf},
};
// self
use crate::{
	_prelude::*,
	auth::{Session, TokenSecret},
	store::{StoreError, StoreFuture, TokenPolicy, TokenStore},
};

/// One persisted token value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedToken {
	/// Opaque token value.
	pub value: TokenSecret,
	/// Instant after which the value is no longer returned.
	pub expires_at: OffsetDateTime,
	/// Path scope recorded from the [`TokenPolicy`].
	pub path: String,
}
impl PersistedToken {
	fn new(value: TokenSecret, policy: &TokenPolicy, written_at: OffsetDateTime) -> Self {
		Self { value, expires_at: policy.expires_at(written_at), path: policy.path.clone() }
	}

	fn is_live_at(&self, instant: OffsetDateTime) -> bool {
		instant < self.expires_at
	}
}

/// On-disk document layout: two independent entries.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedSession {
	/// Access token entry.
	pub access: Option<PersistedToken>,
	/// Refresh token entry.
	pub refresh: Option<PersistedToken>,
}
impl PersistedSession {
	fn session_at(&self, instant: OffsetDateTime) -> Option<Session> {
		let access = self.access.as_ref().filter(|token| token.is_live_at(instant))?;
		let refresh = self.refresh.as_ref().filter(|token| token.is_live_at(instant))?;

		Some(Session { access_token: access.value.clone(), refresh_token: refresh.value.clone() })
	}
}

/// Persists the session to a JSON file after each mutation.
#[derive(Clone, Debug)]
pub struct FileStore {
	path: PathBuf,
	access_policy: TokenPolicy,
	refresh_policy: TokenPolicy,
	inner: Arc<RwLock<PersistedSession>>,
}
impl FileStore {
	/// Opens (or creates) a store at the provided path, eagerly loading existing data.
	pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
		let path = path.into();

		Self::ensure_parent_exists(&path)?;

		let snapshot = Self::load_snapshot(&path)?;

		Ok(Self {
			path,
			access_policy: TokenPolicy::default(),
			refresh_policy: TokenPolicy::default(),
			inner: Arc::new(RwLock::new(snapshot)),
		})
	}

	/// Overrides the policy applied to access tokens written from now on.
	pub fn with_access_policy(mut self, policy: TokenPolicy) -> Self {
		self.access_policy = policy;

		self
	}

	/// Overrides the policy applied to refresh tokens written from now on.
	pub fn with_refresh_policy(mut self, policy: TokenPolicy) -> Self {
		self.refresh_policy = policy;

		self
	}

	/// Returns the session as it would be read at `instant`.
	pub fn session_at(&self, instant: OffsetDateTime) -> Option<Session> {
		self.inner.read().session_at(instant)
	}

	/// Returns a copy of the persisted document, including lapsed entries.
	pub fn persisted(&self) -> PersistedSession {
		self.inner.read().clone()
	}

	fn load_snapshot(path: &Path) -> Result<PersistedSession, StoreError> {
		if !path.exists() {
			return Ok(PersistedSession::default());
		}

		let bytes = fs::read(path).map_err(|e| StoreError::Backend {
			message: format!("Failed to read {}: {e}", path.display()),
		})?;

		if bytes.is_empty() {
			return Ok(PersistedSession::default());
		}

		serde_json::from_slice(&bytes).map_err(|e| StoreError::Serialization {
			message: format!("Failed to parse {}: {e}", path.display()),
		})
	}

	fn ensure_parent_exists(path: &Path) -> Result<(), StoreError> {
		if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
			fs::create_dir_all(parent).map_err(|e| StoreError::Backend {
				message: format!("Failed to create store directory {}: {e}", parent.display()),
			})?;
		}

		Ok(())
	}

	fn persist_locked(&self, contents: &PersistedSession) -> Result<(), StoreError> {
		Self::ensure_parent_exists(&self.path)?;

		let serialized =
			serde_json::to_vec_pretty(contents).map_err(|e| StoreError::Serialization {
				message: format!("Failed to serialize session snapshot: {e}"),
			})?;
		let mut tmp_path = self.path.clone();

		tmp_path.set_extension("tmp");

		{
			let mut file = File::create(&tmp_path).map_err(|e| StoreError::Backend {
				message: format!("Failed to create {}: {e}", tmp_path.display()),
			})?;

			file.write_all(&serialized).map_err(|e| StoreError::Backend {
				message: format!("Failed to write {}: {e}", tmp_path.display()),
			})?;
			file.sync_all().map_err(|e| StoreError::Backend {
				message: format!("Failed to sync {}: {e}", tmp_path.display()),
			})?;
		}

		fs::rename(&tmp_path, &self.path).map_err(|e| StoreError::Backend {
			message: format!("Failed to replace {}: {e}", self.path.display()),
		})
	}
}
impl TokenStore for FileStore {
	fn get(&self) -> StoreFuture<'_, Option<Session>> {
		Box::pin(async move { Ok(self.session_at(OffsetDateTime::now_utc())) })
	}

	fn set(&self, session: Session) -> StoreFuture<'_, ()> {
		Box::pin(async move {
			let now = OffsetDateTime::now_utc();
			let mut guard = self.inner.write();

			guard.access = Some(PersistedToken::new(session.access_token, &self.access_policy, now));
			guard.refresh =
				Some(PersistedToken::new(session.refresh_token, &self.refresh_policy, now));

			self.persist_locked(&guard)
		})
	}

	fn clear(&self) -> StoreFuture<'_, ()> {
		Box::pin(async move {
			let mut guard = self.inner.write();

			*guard = PersistedSession::default();

			self.persist_locked(&guard)
		})
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::{env, process};
	// crates.io
	use tokio::runtime::Runtime;
	// self
	use super::*;

	fn temp_path(label: &str) -> PathBuf {
		let unique = format!(
			"bearer_session_file_store_{label}_{}_{}.json",
			process::id(),
			OffsetDateTime::now_utc().unix_timestamp_nanos(),
		);

		env::temp_dir().join(unique)
	}

	#[test]
	fn save_and_reload_round_trip() {
		let path = temp_path("reload");
		let store = FileStore::open(&path).expect("Failed to open file store.");
		let rt = Runtime::new().expect("Failed to build Tokio runtime for file store test.");

		rt.block_on(store.set(Session::new("access-1", "refresh-1")))
			.expect("Failed to save session to file store.");
		drop(store);

		let reopened = FileStore::open(&path).expect("Failed to reopen file store.");
		let fetched = rt
			.block_on(reopened.get())
			.expect("Failed to read session from file store.")
			.expect("File store lost the session after reopen.");

		assert_eq!(fetched.access_token.expose(), "access-1");
		assert_eq!(fetched.refresh_token.expose(), "refresh-1");

		fs::remove_file(&path).unwrap_or_else(|e| {
			panic!("Failed to remove temporary file store {}: {e}", path.display())
		});
	}

	#[test]
	fn tokens_lapse_independently() {
		let path = temp_path("lapse");
		let store = FileStore::open(&path)
			.expect("Failed to open file store.")
			.with_access_policy(TokenPolicy::new(Duration::minutes(15)).with_path("/api"))
			.with_refresh_policy(TokenPolicy::new(Duration::days(30)));
		let rt = Runtime::new().expect("Failed to build Tokio runtime for file store test.");

		rt.block_on(store.set(Session::new("access-short", "refresh-long")))
			.expect("Failed to save session to file store.");

		let persisted = store.persisted();
		let access = persisted.access.as_ref().expect("Access entry should be persisted.");
		let refresh = persisted.refresh.as_ref().expect("Refresh entry should be persisted.");

		assert_eq!(access.path, "/api");
		assert_eq!(refresh.path, "/");
		assert!(access.expires_at < refresh.expires_at);

		let now = OffsetDateTime::now_utc();

		assert!(store.session_at(now).is_some());
		assert!(store.session_at(now + Duration::hours(1)).is_none());

		fs::remove_file(&path).unwrap_or_else(|e| {
			panic!("Failed to remove temporary file store {}: {e}", path.display())
		});
	}

	#[test]
	fn clear_persists_an_empty_document() {
		let path = temp_path("clear");
		let store = FileStore::open(&path).expect("Failed to open file store.");
		let rt = Runtime::new().expect("Failed to build Tokio runtime for file store test.");

		rt.block_on(store.set(Session::new("access", "refresh")))
			.expect("Failed to save session to file store.");
		rt.block_on(store.clear()).expect("Failed to clear file store.");

		let reopened = FileStore::open(&path).expect("Failed to reopen file store.");

		assert_eq!(reopened.persisted(), PersistedSession::default());
		assert!(rt.block_on(reopened.get()).expect("Read should succeed.").is_none());

		fs::remove_file(&path).unwrap_or_else(|e| {
			panic!("Failed to remove temporary file store {}: {e}", path.display())
		});
	}
}
