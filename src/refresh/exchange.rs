//! The refresh exchange: trade the stored refresh token for a rotated session.
//!
//! Request: `POST {refresh_path}` with `{"refreshToken": "<refresh>"}`.
//! Response: `{"token": "<access>", "refreshToken": "<refresh>"}` on any 2xx status.

// self
use crate::{
	_prelude::*,
	auth::{Session, TokenSecret},
	config::SessionConfig,
	error::RefreshError,
	http::{ApiRequest, Transport},
	store::TokenStore,
};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshResponseBody {
	token: String,
	refresh_token: String,
}

/// Performs one exchange using the refresh token currently in `store`.
///
/// Persisting the rotated session is left to the caller.
pub(crate) async fn exchange<T>(
	transport: &T,
	store: &dyn TokenStore,
	config: &SessionConfig,
) -> Result<Session, RefreshError>
where
	T: ?Sized + Transport,
{
	let current = store.get().await?.ok_or(RefreshError::MissingSession)?;
	let request = ApiRequest::post(config.refresh_path.as_str())
		.with_body(serde_json::json!({ "refreshToken": current.refresh_token.expose() }));
	let response = transport.send(request).await?;

	if !response.status().is_success() {
		return Err(RefreshError::Rejected {
			status: response.status().as_u16(),
			code: response.error_code(&config.error_code_field),
		});
	}

	let rotated: RefreshResponseBody =
		response.json().map_err(|source| RefreshError::MalformedResponse { source })?;

	Ok(Session {
		access_token: TokenSecret::new(rotated.token),
		refresh_token: TokenSecret::new(rotated.refresh_token),
	})
}
