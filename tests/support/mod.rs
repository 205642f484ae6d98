//! Test doubles shared by the integration suites.

#![allow(dead_code)]

// std
use std::sync::{
	Arc,
	atomic::{AtomicUsize, Ordering},
};
// crates.io
use parking_lot::Mutex;
use serde_json::{Value, json};
// self
use bearer_session::{
	auth::Session,
	error::TransportError,
	http::{ApiRequest, ApiResponse, StatusCode, Transport, TransportFuture},
	terminate::{SessionTerminator, TerminateFuture, TerminationCause},
};

/// One request observed by [`ScriptedApi`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Sent {
	pub path: String,
	pub auth: Option<String>,
	pub body: Option<Value>,
}

#[derive(Debug)]
struct ServerState {
	issued: usize,
	valid_access: Option<String>,
	valid_refresh: String,
	refresh_override: Option<ApiResponse>,
}

/// In-process API server with a rotating token pair.
///
/// - `/refresh` accepts the newest refresh token and rotates to `A{n}`/`R{n}` as soon as the
///   request arrives, but answers only after a few scheduler turns so concurrent callers pile
///   up behind it.
/// - `/down` fails at the transport level.
/// - `/revoked` always answers with a non-expiry 401.
/// - `/boom` always answers 500.
/// - Every other path answers 200 for the current access token and an expiry 401 otherwise.
#[derive(Debug)]
pub struct ScriptedApi {
	state: Mutex<ServerState>,
	sent: Mutex<Vec<Sent>>,
}
impl ScriptedApi {
	/// Server that accepts `A1`/`R1`.
	pub fn new() -> Arc<Self> {
		Arc::new(Self {
			state: Mutex::new(ServerState {
				issued: 1,
				valid_access: Some("A1".into()),
				valid_refresh: "R1".into(),
				refresh_override: None,
			}),
			sent: Mutex::new(Vec::new()),
		})
	}

	/// Server whose `A1` has already expired.
	pub fn expired() -> Arc<Self> {
		let api = Self::new();

		api.expire_access();

		api
	}

	/// Expires the current access token server-side.
	pub fn expire_access(&self) {
		self.state.lock().valid_access = None;
	}

	/// Makes `/refresh` answer with `response` instead of rotating.
	pub fn fail_refresh(&self, response: ApiResponse) {
		self.state.lock().refresh_override = Some(response);
	}

	/// Restores normal rotation after [`fail_refresh`](Self::fail_refresh).
	pub fn heal_refresh(&self) {
		self.state.lock().refresh_override = None;
	}

	/// Every request received so far.
	pub fn sent(&self) -> Vec<Sent> {
		self.sent.lock().clone()
	}

	/// Paths received so far, in arrival order.
	pub fn paths(&self) -> Vec<String> {
		self.sent.lock().iter().map(|s| s.path.clone()).collect()
	}

	/// Number of requests received for `path`.
	pub fn hits(&self, path: &str) -> usize {
		self.sent.lock().iter().filter(|s| s.path == path).count()
	}

	fn refresh(&self, body: Option<&Value>) -> ApiResponse {
		let mut state = self.state.lock();

		if let Some(response) = state.refresh_override.clone() {
			return response;
		}

		let presented = body.and_then(|b| b.get("refreshToken")).and_then(Value::as_str);

		if presented != Some(state.valid_refresh.as_str()) {
			return unauthorized("token.invalid");
		}

		state.issued += 1;

		let access = format!("A{}", state.issued);
		let refresh = format!("R{}", state.issued);

		state.valid_access = Some(access.clone());
		state.valid_refresh = refresh.clone();

		ApiResponse::json_body(StatusCode::OK, &json!({ "token": access, "refreshToken": refresh }))
	}

	fn resource(&self, path: &str, auth: Option<&str>) -> ApiResponse {
		let state = self.state.lock();
		let valid = state.valid_access.as_ref().map(|a| format!("Bearer {a}"));

		match (auth, valid) {
			(Some(auth), Some(valid)) if auth == valid =>
				ApiResponse::json_body(StatusCode::OK, &json!({ "path": path, "auth": auth })),
			_ => unauthorized("token.expired"),
		}
	}
}
impl Transport for ScriptedApi {
	fn send(&self, request: ApiRequest) -> TransportFuture<'_> {
		let auth = request
			.headers
			.get("authorization")
			.and_then(|v| v.to_str().ok())
			.map(ToOwned::to_owned);

		self.sent.lock().push(Sent {
			path: request.path.clone(),
			auth: auth.clone(),
			body: request.body.clone(),
		});

		let refreshed =
			(request.path == "/refresh").then(|| self.refresh(request.body.as_ref()));

		Box::pin(async move {
			if let Some(response) = refreshed {
				for _ in 0..3 {
					tokio::task::yield_now().await;
				}

				return Ok(response);
			}

			match request.path.as_str() {
				"/down" => Err(TransportError::network(std::io::Error::other("connection reset"))),
				"/revoked" => Ok(unauthorized("token.revoked")),
				"/boom" => Ok(ApiResponse::json_body(
					StatusCode::INTERNAL_SERVER_ERROR,
					&json!({ "message": "boom" }),
				)),
				path => Ok(self.resource(path, auth.as_deref())),
			}
		})
	}
}

/// Terminator that records every cause it was invoked with.
#[derive(Debug, Default)]
pub struct RecordingTerminator {
	causes: Mutex<Vec<TerminationCause>>,
	calls: AtomicUsize,
}
impl RecordingTerminator {
	pub fn calls(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}

	pub fn causes(&self) -> Vec<TerminationCause> {
		self.causes.lock().clone()
	}
}
impl SessionTerminator for RecordingTerminator {
	fn terminate<'a>(&'a self, cause: &'a TerminationCause) -> TerminateFuture<'a> {
		Box::pin(async move {
			self.calls.fetch_add(1, Ordering::SeqCst);
			self.causes.lock().push(cause.clone());
		})
	}
}

pub fn unauthorized(code: &str) -> ApiResponse {
	ApiResponse::json_body(StatusCode::UNAUTHORIZED, &json!({ "code": code }))
}

pub fn seeded() -> Session {
	Session::new("A1", "R1")
}
