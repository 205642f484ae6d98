//! The current access/refresh token pair.

// self
use crate::{_prelude::*, auth::TokenSecret};

/// Access + refresh token pair owned by a [`TokenStore`](crate::store::TokenStore).
///
/// Both values are opaque; the session is replaced as a whole when a refresh exchange rotates
/// the pair and dropped as a whole when the session is terminated.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
	/// Short-lived credential attached to every request.
	pub access_token: TokenSecret,
	/// Longer-lived credential used solely to obtain a new access token.
	pub refresh_token: TokenSecret,
}
impl Session {
	/// Creates a session from the provided token pair.
	pub fn new(
		access_token: impl Into<TokenSecret>,
		refresh_token: impl Into<TokenSecret>,
	) -> Self {
		Self { access_token: access_token.into(), refresh_token: refresh_token.into() }
	}
}
impl Debug for Session {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Session")
			.field("access_token", &"<redacted>")
			.field("refresh_token", &"<redacted>")
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn debug_output_hides_both_tokens() {
		let session = Session::new("access-1", "refresh-1");
		let rendered = format!("{session:?}");

		assert!(!rendered.contains("access-1"));
		assert!(!rendered.contains("refresh-1"));
	}

	#[test]
	fn serde_uses_camel_case_fields() {
		let session = Session::new("a", "r");
		let payload = serde_json::to_value(&session).expect("Session should serialize.");

		assert_eq!(payload, serde_json::json!({ "accessToken": "a", "refreshToken": "r" }));
	}
}
