//! Validated session configuration shared by the client and the refresh coordinator.

// crates.io
use http::HeaderName;
// self
use crate::_prelude::*;

/// Errors raised while constructing or validating a [`SessionConfig`].
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum SessionConfigError {
	/// The refresh path must be absolute.
	#[error("Refresh path must start with `/`: {path}.")]
	RelativeRefreshPath {
		/// Path that failed validation.
		path: String,
	},
	/// Cause codes are compared verbatim, so blank or padded values never match.
	#[error("Expiry code must be non-empty and free of whitespace.")]
	InvalidExpiryCode,
	/// The body field carrying the cause code must be named.
	#[error("Error code field must be non-empty.")]
	EmptyErrorCodeField,
	/// The credential header must be a valid HTTP header name.
	#[error("Authorization header `{header}` is not a valid header name.")]
	InvalidAuthorizationHeader {
		/// Header name that failed validation.
		header: String,
	},
}

/// Immutable configuration consumed by [`SessionClient`](crate::SessionClient).
#[derive(Clone, Debug)]
pub struct SessionConfig {
	/// Path of the refresh exchange endpoint; responses from it are never intercepted.
	pub refresh_path: String,
	/// Cause code that marks a 401 as an expired access token.
	pub expiry_code: String,
	/// JSON body field carrying the cause code of an error response.
	pub error_code_field: String,
	/// Header that carries the bearer credential.
	pub authorization_header: HeaderName,
}
impl SessionConfig {
	/// Default refresh endpoint path.
	pub const DEFAULT_REFRESH_PATH: &str = "/refresh";
	/// Default cause code for an expired access token.
	pub const DEFAULT_EXPIRY_CODE: &str = "token.expired";
	/// Default body field carrying the cause code.
	pub const DEFAULT_ERROR_CODE_FIELD: &str = "code";

	/// Creates a builder seeded with the defaults.
	pub fn builder() -> SessionConfigBuilder {
		SessionConfigBuilder::default()
	}

	/// Returns `true` when `path` targets the refresh endpoint.
	pub fn is_refresh_path(&self, path: &str) -> bool {
		let path = path.split(['?', '#']).next().unwrap_or(path);

		path.trim_end_matches('/') == self.refresh_path.trim_end_matches('/')
	}
}
impl Default for SessionConfig {
	fn default() -> Self {
		Self {
			refresh_path: Self::DEFAULT_REFRESH_PATH.into(),
			expiry_code: Self::DEFAULT_EXPIRY_CODE.into(),
			error_code_field: Self::DEFAULT_ERROR_CODE_FIELD.into(),
			authorization_header: http::header::AUTHORIZATION,
		}
	}
}

/// Builder for [`SessionConfig`] values.
#[derive(Debug)]
pub struct SessionConfigBuilder {
	/// Path of the refresh exchange endpoint.
	pub refresh_path: String,
	/// Cause code that marks a 401 as expired.
	pub expiry_code: String,
	/// JSON body field carrying the cause code.
	pub error_code_field: String,
	/// Header name that carries the bearer credential.
	pub authorization_header: String,
}
impl SessionConfigBuilder {
	/// Sets the refresh endpoint path.
	pub fn refresh_path(mut self, path: impl Into<String>) -> Self {
		self.refresh_path = path.into();

		self
	}

	/// Sets the cause code that marks an expired access token.
	pub fn expiry_code(mut self, code: impl Into<String>) -> Self {
		self.expiry_code = code.into();

		self
	}

	/// Sets the JSON body field carrying the cause code.
	pub fn error_code_field(mut self, field: impl Into<String>) -> Self {
		self.error_code_field = field.into();

		self
	}

	/// Sets the header that carries the bearer credential.
	pub fn authorization_header(mut self, header: impl Into<String>) -> Self {
		self.authorization_header = header.into();

		self
	}

	/// Consumes the builder and validates the resulting configuration.
	pub fn build(self) -> Result<SessionConfig, SessionConfigError> {
		if !self.refresh_path.starts_with('/') {
			return Err(SessionConfigError::RelativeRefreshPath { path: self.refresh_path });
		}
		if self.expiry_code.is_empty() || self.expiry_code.chars().any(char::is_whitespace) {
			return Err(SessionConfigError::InvalidExpiryCode);
		}
		if self.error_code_field.is_empty() {
			return Err(SessionConfigError::EmptyErrorCodeField);
		}

		let authorization_header =
			HeaderName::from_bytes(self.authorization_header.as_bytes()).map_err(|_| {
				SessionConfigError::InvalidAuthorizationHeader { header: self.authorization_header }
			})?;

		Ok(SessionConfig {
			refresh_path: self.refresh_path,
			expiry_code: self.expiry_code,
			error_code_field: self.error_code_field,
			authorization_header,
		})
	}
}
impl Default for SessionConfigBuilder {
	fn default() -> Self {
		Self {
			refresh_path: SessionConfig::DEFAULT_REFRESH_PATH.into(),
			expiry_code: SessionConfig::DEFAULT_EXPIRY_CODE.into(),
			error_code_field: SessionConfig::DEFAULT_ERROR_CODE_FIELD.into(),
			authorization_header: http::header::AUTHORIZATION.as_str().into(),
		}
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn defaults_match_the_session_api() {
		let config = SessionConfig::builder().build().expect("Default config should be valid.");

		assert_eq!(config.refresh_path, "/refresh");
		assert_eq!(config.expiry_code, "token.expired");
		assert_eq!(config.error_code_field, "code");
		assert_eq!(config.authorization_header, http::header::AUTHORIZATION);
	}

	#[test]
	fn builder_rejects_invalid_values() {
		assert_eq!(
			SessionConfig::builder().refresh_path("refresh").build().unwrap_err(),
			SessionConfigError::RelativeRefreshPath { path: "refresh".into() }
		);
		assert_eq!(
			SessionConfig::builder().expiry_code("token expired").build().unwrap_err(),
			SessionConfigError::InvalidExpiryCode
		);
		assert_eq!(
			SessionConfig::builder().error_code_field("").build().unwrap_err(),
			SessionConfigError::EmptyErrorCodeField
		);
		assert!(matches!(
			SessionConfig::builder().authorization_header("bad header").build(),
			Err(SessionConfigError::InvalidAuthorizationHeader { .. })
		));
	}

	#[test]
	fn refresh_path_matching_ignores_query_and_trailing_slash() {
		let config = SessionConfig::builder()
			.refresh_path("/auth/refresh")
			.authorization_header("X-Session-Token")
			.build()
			.expect("Custom config should be valid.");

		assert!(config.is_refresh_path("/auth/refresh"));
		assert!(config.is_refresh_path("/auth/refresh/"));
		assert!(config.is_refresh_path("/auth/refresh?rotate=1"));
		assert!(!config.is_refresh_path("/auth/refresh-all"));
		assert_eq!(config.authorization_header.as_str(), "x-session-token");
	}
}
