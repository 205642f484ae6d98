//! Session-level error types shared by the client, the refresh coordinator, and stores.

// self
use crate::_prelude::*;

/// Session-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Storage-layer failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Transport failure (DNS, TCP, TLS); never intercepted by the refresh protocol.
	#[error(transparent)]
	Transport(#[from] TransportError),

	/// Server rejected the credential for a reason other than expiry.
	#[error("Credential was rejected: {}.", .code.as_deref().unwrap_or("no cause code"))]
	InvalidCredential {
		/// Cause code reported by the server, if any.
		code: Option<String>,
	},
	/// The refresh exchange failed; every caller queued on the episode receives the same value.
	#[error("Session refresh failed.")]
	RefreshExchange(#[source] Arc<RefreshError>),
	/// The caller replaying this request was dropped before the replay resolved.
	#[error("Refresh episode was abandoned before the request could be replayed.")]
	EpisodeAbandoned,
}
impl Error {
	/// Returns `true` when the host should treat the user as logged out.
	pub fn is_terminal_auth_failure(&self) -> bool {
		matches!(self, Self::InvalidCredential { .. } | Self::RefreshExchange(_))
	}
}
impl From<RefreshError> for Error {
	fn from(e: RefreshError) -> Self {
		Self::RefreshExchange(Arc::new(e))
	}
}

/// Configuration and request-construction failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// Request body could not be serialized.
	#[error("Request body could not be serialized.")]
	RequestBody(#[from] serde_json::Error),
	/// Access token contains bytes that cannot travel in an HTTP header.
	#[error("Access token cannot be encoded as a header value.")]
	CredentialHeader(#[from] http::header::InvalidHeaderValue),
}

/// Failure of a refresh exchange.
#[derive(Debug, ThisError)]
pub enum RefreshError {
	/// No stored session carries a refresh token to exchange.
	#[error("No stored session is available to refresh.")]
	MissingSession,
	/// Refresh endpoint rejected the exchange.
	#[error("Refresh endpoint rejected the exchange with status {status}.")]
	Rejected {
		/// HTTP status code returned by the refresh endpoint.
		status: u16,
		/// Cause code reported in the response body, if any.
		code: Option<String>,
	},
	/// Refresh endpoint could not be reached.
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Refresh endpoint responded with a body that does not describe a session.
	#[error("Refresh endpoint returned malformed JSON.")]
	MalformedResponse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// Rotated session could not be persisted.
	#[error("Rotated session could not be persisted.")]
	Storage(#[from] crate::store::StoreError),
}

/// Transport-level failures (network, URL resolution).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while sending the request.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Request path could not be resolved against the base URL.
	#[error("Request path `{path}` cannot be resolved against the base URL.")]
	InvalidUrl {
		/// Path carried by the request.
		path: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}
