//! The session-aware client callers send requests through.

// crates.io
use http::StatusCode;
// self
#[cfg(feature = "reqwest")] use crate::{http::ReqwestTransport, terminate::ClearingTerminator};
use crate::{
	_prelude::*,
	auth::Session,
	config::SessionConfig,
	error::ConfigError,
	http::{ApiRequest, ApiResponse, Transport},
	refresh::RefreshCoordinator,
	store::TokenStore,
	terminate::{SessionTerminator, TerminationCause},
};

/// HTTP client that attaches the stored bearer token and recovers from access-token expiry.
///
/// Clones share the transport, the store, and the refresh coordinator, so concurrent requests
/// issued through any clone join the same refresh episode.
pub struct SessionClient<T>
where
	T: ?Sized + Transport,
{
	transport: Arc<T>,
	store: Arc<dyn TokenStore>,
	terminator: Arc<dyn SessionTerminator>,
	config: Arc<SessionConfig>,
	coordinator: Arc<RefreshCoordinator<T>>,
}
impl<T> SessionClient<T>
where
	T: ?Sized + Transport,
{
	/// Creates a client with [`SessionConfig::default`].
	pub fn new(
		transport: Arc<T>,
		store: Arc<dyn TokenStore>,
		terminator: Arc<dyn SessionTerminator>,
	) -> Self {
		Self::with_config(transport, store, terminator, SessionConfig::default())
	}

	/// Creates a client with an explicit configuration.
	pub fn with_config(
		transport: Arc<T>,
		store: Arc<dyn TokenStore>,
		terminator: Arc<dyn SessionTerminator>,
		config: SessionConfig,
	) -> Self {
		let config = Arc::new(config);
		let coordinator = Arc::new(RefreshCoordinator::new(
			transport.clone(),
			store.clone(),
			terminator.clone(),
			config.clone(),
		));

		Self { transport, store, terminator, config, coordinator }
	}

	/// Sends `request` with the current access token attached.
	///
	/// Without a stored session the request goes out as built. Expired-credential 401s are
	/// resolved transparently; the caller sees the replayed response instead.
	pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
		let request = match self.store.get().await? {
			Some(session) => request
				.authorize(&self.config.authorization_header, &session.access_token)
				.map_err(ConfigError::from)?,
			None => request,
		};
		let response = self.transport.send(request.clone()).await?;

		// A 401 from the refresh endpoint must never start another episode.
		if response.status() != StatusCode::UNAUTHORIZED
			|| self.config.is_refresh_path(&request.path)
		{
			return Ok(response);
		}

		self.coordinator.handle(request, response).await
	}

	/// Sends a `GET` to `path`.
	pub async fn get(&self, path: impl Into<String>) -> Result<ApiResponse> {
		self.send(ApiRequest::get(path)).await
	}

	/// Sends a `POST` with a JSON body to `path`.
	pub async fn post<B>(&self, path: impl Into<String>, body: &B) -> Result<ApiResponse>
	where
		B: ?Sized + Serialize,
	{
		let request = ApiRequest::post(path).json(body).map_err(ConfigError::from)?;

		self.send(request).await
	}

	/// Stores a freshly issued session (e.g. after a password sign-in).
	pub async fn sign_in(&self, session: Session) -> Result<()> {
		self.store.set(session).await?;

		Ok(())
	}

	/// Drops the session through the terminator.
	pub async fn sign_out(&self) {
		self.terminator.terminate(&TerminationCause::SignedOut).await;
	}

	/// Current session, if any.
	pub async fn session(&self) -> Result<Option<Session>> {
		Ok(self.store.get().await?)
	}

	/// Refresh coordinator shared by every clone of this client.
	pub fn coordinator(&self) -> &RefreshCoordinator<T> {
		&self.coordinator
	}

	/// Configuration in effect.
	pub fn config(&self) -> &SessionConfig {
		&self.config
	}

	/// Underlying transport.
	pub fn transport(&self) -> &Arc<T> {
		&self.transport
	}
}
#[cfg(feature = "reqwest")]
impl SessionClient<ReqwestTransport> {
	/// Creates a reqwest-backed client for `base_url` whose terminator clears `store`.
	pub fn reqwest(base_url: Url, store: Arc<dyn TokenStore>) -> Self {
		let terminator = Arc::new(ClearingTerminator::new(store.clone()));

		Self::new(Arc::new(ReqwestTransport::new(base_url)), store, terminator)
	}
}
impl<T> Clone for SessionClient<T>
where
	T: ?Sized + Transport,
{
	fn clone(&self) -> Self {
		Self {
			transport: self.transport.clone(),
			store: self.store.clone(),
			terminator: self.terminator.clone(),
			config: self.config.clone(),
			coordinator: self.coordinator.clone(),
		}
	}
}
impl<T> Debug for SessionClient<T>
where
	T: ?Sized + Transport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("SessionClient").field("coordinator", &self.coordinator).finish()
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::sync::atomic::{AtomicUsize, Ordering};
	// crates.io
	use http::header::AUTHORIZATION;
	// self
	use super::*;
	use crate::{http::TransportFuture, store::MemoryStore, terminate::TerminateFuture};

	// Answers every request with the same response and records the credential it carried.
	struct EchoTransport {
		status: StatusCode,
		body: serde_json::Value,
		seen: Mutex<Vec<(String, Option<String>)>>,
	}
	impl EchoTransport {
		fn new(status: StatusCode, body: serde_json::Value) -> Arc<Self> {
			Arc::new(Self { status, body, seen: Mutex::new(Vec::new()) })
		}
	}
	impl Transport for EchoTransport {
		fn send(&self, request: ApiRequest) -> TransportFuture<'_> {
			let auth = request
				.credential(&AUTHORIZATION)
				.and_then(|v| v.to_str().ok())
				.map(ToOwned::to_owned);

			self.seen.lock().push((request.path, auth));

			let response = ApiResponse::json_body(self.status, &self.body);

			Box::pin(async move { Ok(response) })
		}
	}

	#[derive(Default)]
	struct Causes(Mutex<Vec<TerminationCause>>, AtomicUsize);
	impl SessionTerminator for Causes {
		fn terminate<'a>(&'a self, cause: &'a TerminationCause) -> TerminateFuture<'a> {
			self.0.lock().push(cause.clone());
			self.1.fetch_add(1, Ordering::SeqCst);

			Box::pin(async {})
		}
	}

	fn client(
		transport: Arc<EchoTransport>,
		store: MemoryStore,
	) -> (SessionClient<EchoTransport>, Arc<Causes>) {
		let terminator = Arc::new(Causes::default());

		(SessionClient::new(transport, Arc::new(store), terminator.clone()), terminator)
	}

	#[tokio::test]
	async fn attaches_the_stored_access_token() {
		let transport = EchoTransport::new(StatusCode::OK, serde_json::json!({}));
		let (client, _) =
			client(transport.clone(), MemoryStore::with_session(Session::new("A1", "R1")));

		client.get("/me").await.expect("Request should succeed.");

		assert_eq!(transport.seen.lock()[0], ("/me".to_owned(), Some("Bearer A1".to_owned())));
	}

	#[tokio::test]
	async fn sends_unauthenticated_without_a_session() {
		let transport = EchoTransport::new(StatusCode::OK, serde_json::json!({}));
		let (client, _) = client(transport.clone(), MemoryStore::default());

		client
			.post("/sign-in", &serde_json::json!({ "email": "a@b.c" }))
			.await
			.expect("Request should succeed.");

		assert_eq!(transport.seen.lock()[0], ("/sign-in".to_owned(), None));
	}

	#[tokio::test]
	async fn refresh_endpoint_401_is_returned_as_is() {
		let transport = EchoTransport::new(
			StatusCode::UNAUTHORIZED,
			serde_json::json!({ "code": "token.expired" }),
		);
		let (client, terminator) =
			client(transport.clone(), MemoryStore::with_session(Session::new("A1", "R1")));
		let response = client
			.send(ApiRequest::post("/refresh"))
			.await
			.expect("Refresh endpoint responses should pass through.");

		assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
		assert_eq!(transport.seen.lock().len(), 1);
		assert_eq!(client.coordinator().metrics().exchanges(), 0);
		assert_eq!(terminator.1.load(Ordering::SeqCst), 0);
	}

	#[tokio::test]
	async fn sign_in_and_sign_out_drive_the_store_and_terminator() {
		let transport = EchoTransport::new(StatusCode::OK, serde_json::json!({}));
		let (client, terminator) = client(transport, MemoryStore::default());

		client.sign_in(Session::new("A1", "R1")).await.expect("Sign-in should persist.");

		assert_eq!(
			client.session().await.expect("Store should be readable."),
			Some(Session::new("A1", "R1"))
		);

		client.sign_out().await;

		assert_eq!(*terminator.0.lock(), [TerminationCause::SignedOut]);
	}
}
