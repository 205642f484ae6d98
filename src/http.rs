//! Transport boundary: request/response descriptors and the [`Transport`] contract.
//!
//! The session layer treats the HTTP stack as an opaque `send(request) -> response` function.
//! [`ApiRequest`] carries a path relative to the transport's base URL so the same request can
//! be replayed verbatim once a fresh credential is attached, and [`ApiResponse`] exposes the
//! status classification the refresh protocol keys on.

pub use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};

// crates.io
use http::header::{CONTENT_TYPE, InvalidHeaderValue};
use serde::de::DeserializeOwned;
use serde_json::Value;
// self
use crate::{_prelude::*, auth::TokenSecret, config::SessionConfig, error::TransportError};

/// Boxed future returned by [`Transport::send`].
pub type TransportFuture<'a> =
	Pin<Box<dyn Future<Output = Result<ApiResponse, TransportError>> + 'a + Send>>;

/// Abstraction over HTTP stacks capable of executing session requests.
///
/// Implementations must not follow the refresh protocol themselves; every status code,
/// including 401, is returned as an [`ApiResponse`]. Only failures that produced no response
/// at all (DNS, TCP, TLS) surface as [`TransportError`].
pub trait Transport
where
	Self: 'static + Send + Sync,
{
	/// Sends `request` and resolves with whatever the server answered.
	fn send(&self, request: ApiRequest) -> TransportFuture<'_>;
}

/// Replayable request descriptor.
#[derive(Clone, Debug)]
pub struct ApiRequest {
	/// HTTP method.
	pub method: Method,
	/// Path (plus optional query) relative to the transport's base URL.
	pub path: String,
	/// Headers sent with the request; the credential header is managed by the client.
	pub headers: HeaderMap,
	/// Optional JSON body.
	pub body: Option<Value>,
}
impl ApiRequest {
	/// Creates a request with no headers and no body.
	pub fn new(method: Method, path: impl Into<String>) -> Self {
		Self { method, path: path.into(), headers: HeaderMap::new(), body: None }
	}

	/// Shorthand for a `GET` request.
	pub fn get(path: impl Into<String>) -> Self {
		Self::new(Method::GET, path)
	}

	/// Shorthand for a `POST` request.
	pub fn post(path: impl Into<String>) -> Self {
		Self::new(Method::POST, path)
	}

	/// Shorthand for a `PUT` request.
	pub fn put(path: impl Into<String>) -> Self {
		Self::new(Method::PUT, path)
	}

	/// Shorthand for a `PATCH` request.
	pub fn patch(path: impl Into<String>) -> Self {
		Self::new(Method::PATCH, path)
	}

	/// Shorthand for a `DELETE` request.
	pub fn delete(path: impl Into<String>) -> Self {
		Self::new(Method::DELETE, path)
	}

	/// Serializes `body` as the JSON payload.
	pub fn json<T>(mut self, body: &T) -> Result<Self, serde_json::Error>
	where
		T: ?Sized + Serialize,
	{
		self.body = Some(serde_json::to_value(body)?);

		Ok(self)
	}

	/// Uses an already-built JSON value as the payload.
	pub fn with_body(mut self, body: Value) -> Self {
		self.body = Some(body);

		self
	}

	/// Adds or replaces a header.
	pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
		self.headers.insert(name, value);

		self
	}

	/// Returns the credential currently attached under `header`, if any.
	pub fn credential(&self, header: &HeaderName) -> Option<&HeaderValue> {
		self.headers.get(header)
	}

	/// Attaches `token` as the bearer credential, replacing any previous value.
	pub(crate) fn authorize(
		mut self,
		header: &HeaderName,
		token: &TokenSecret,
	) -> Result<Self, InvalidHeaderValue> {
		let mut value = HeaderValue::from_str(&token.bearer())?;

		value.set_sensitive(true);
		self.headers.insert(header.clone(), value);

		Ok(self)
	}

	/// Encodes the JSON payload, if any.
	pub fn encoded_body(&self) -> Result<Option<Vec<u8>>, serde_json::Error> {
		self.body.as_ref().map(serde_json::to_vec).transpose()
	}
}

/// Why the server rejected a credential.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AuthFailure {
	/// The access token expired; recoverable through a refresh exchange.
	Expired,
	/// Any other 401 cause (revoked, malformed, unknown).
	Invalid {
		/// Cause code reported in the body, if one could be read.
		code: Option<String>,
	},
}

/// Status classification of an [`ApiResponse`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResponseClass {
	/// 2xx.
	Success,
	/// 401 with its cause.
	AuthFailure(AuthFailure),
	/// Everything else.
	OtherError,
}

/// Buffered response returned by a [`Transport`].
#[derive(Clone, Debug)]
pub struct ApiResponse {
	status: StatusCode,
	headers: HeaderMap,
	body: Vec<u8>,
}
impl ApiResponse {
	/// Creates a response from its parts.
	pub fn new(status: StatusCode, headers: HeaderMap, body: impl Into<Vec<u8>>) -> Self {
		Self { status, headers, body: body.into() }
	}

	/// Creates a JSON response with the matching content type.
	pub fn json_body(status: StatusCode, body: &Value) -> Self {
		let mut headers = HeaderMap::new();

		headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

		Self::new(status, headers, body.to_string())
	}

	/// HTTP status code.
	pub fn status(&self) -> StatusCode {
		self.status
	}

	/// Response headers.
	pub fn headers(&self) -> &HeaderMap {
		&self.headers
	}

	/// Raw response body.
	pub fn body(&self) -> &[u8] {
		&self.body
	}

	/// Decodes the body as JSON, reporting the path of the first mismatch.
	pub fn json<T>(&self) -> Result<T, serde_path_to_error::Error<serde_json::Error>>
	where
		T: DeserializeOwned,
	{
		let mut deserializer = serde_json::Deserializer::from_slice(&self.body);

		serde_path_to_error::deserialize(&mut deserializer)
	}

	/// Reads the cause code stored under `field` in a JSON body.
	pub fn error_code(&self, field: &str) -> Option<String> {
		let body: Value = serde_json::from_slice(&self.body).ok()?;

		body.get(field)?.as_str().map(ToOwned::to_owned)
	}

	/// Classifies the response using the expiry code and body field from `config`.
	pub fn classify(&self, config: &SessionConfig) -> ResponseClass {
		if self.status.is_success() {
			return ResponseClass::Success;
		}
		if self.status != StatusCode::UNAUTHORIZED {
			return ResponseClass::OtherError;
		}

		match self.error_code(&config.error_code_field) {
			Some(code) if code == config.expiry_code =>
				ResponseClass::AuthFailure(AuthFailure::Expired),
			code => ResponseClass::AuthFailure(AuthFailure::Invalid { code }),
		}
	}
}

/// Reqwest-backed [`Transport`] that resolves request paths against a base URL.
///
/// Redirects are followed according to the wrapped client's policy; the session layer only
/// inspects the final response.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug)]
pub struct ReqwestTransport {
	client: ReqwestClient,
	base_url: Url,
}
#[cfg(feature = "reqwest")]
impl ReqwestTransport {
	/// Base URL used by [`ReqwestTransport::default`].
	pub const DEFAULT_BASE_URL: &str = "http://localhost:3333/";

	/// Creates a transport with a default reqwest client.
	pub fn new(base_url: Url) -> Self {
		Self::with_client(ReqwestClient::default(), base_url)
	}

	/// Wraps an existing reqwest client.
	pub fn with_client(client: ReqwestClient, mut base_url: Url) -> Self {
		if !base_url.path().ends_with('/') {
			let path = format!("{}/", base_url.path());

			base_url.set_path(&path);
		}

		Self { client, base_url }
	}

	/// Base URL every request path is resolved against.
	pub fn base_url(&self) -> &Url {
		&self.base_url
	}

	fn resolve(&self, path: &str) -> Result<Url, TransportError> {
		self.base_url.join(path.trim_start_matches('/')).map_err(|source| {
			TransportError::InvalidUrl { path: path.to_owned(), source }
		})
	}
}
#[cfg(feature = "reqwest")]
impl Default for ReqwestTransport {
	fn default() -> Self {
		let base_url = Url::parse(Self::DEFAULT_BASE_URL)
			.unwrap_or_else(|_| unreachable!("default base URL is a valid literal"));

		Self::new(base_url)
	}
}
#[cfg(feature = "reqwest")]
impl Transport for ReqwestTransport {
	fn send(&self, request: ApiRequest) -> TransportFuture<'_> {
		Box::pin(async move {
			let url = self.resolve(&request.path)?;
			let body = request.encoded_body().map_err(TransportError::network)?;
			let mut builder = self.client.request(request.method, url).headers(request.headers);

			if let Some(body) = body {
				builder = builder.header(CONTENT_TYPE, "application/json").body(body);
			}

			let response = builder.send().await?;
			let status = response.status();
			let headers = response.headers().to_owned();
			let body = response.bytes().await?;

			Ok(ApiResponse::new(status, headers, body.to_vec()))
		})
	}
}
