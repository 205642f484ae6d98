//! Runs a session client against an in-process mock API whose access token has expired.
//!
//! 1. Seed a [`FileStore`] with an expired access token and a valid refresh token.
//! 2. Fire several requests at once through one [`SessionClient`].
//! 3. Observe one `POST /refresh`, every request replayed, and the rotated pair on disk.

// std
use std::sync::Arc;
// crates.io
use color_eyre::Result;
use futures::future;
use httpmock::prelude::*;
use serde_json::json;
use url::Url;
// self
use bearer_session::{
	SessionClient,
	auth::Session,
	config::SessionConfig,
	http::ReqwestTransport,
	store::{FileStore, TokenStore},
	terminate::{ClearingTerminator, HostContext},
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let refresh = server
		.mock_async(|when, then| {
			when.method(POST).path("/refresh").json_body(json!({ "refreshToken": "R1" }));
			then.status(200).json_body(json!({ "token": "A2", "refreshToken": "R2" }));
		})
		.await;

	server
		.mock_async(|when, then| {
			when.method(GET).header("authorization", "Bearer A1");
			then.status(401).json_body(json!({ "code": "token.expired" }));
		})
		.await;
	server
		.mock_async(|when, then| {
			when.method(GET).header("authorization", "Bearer A2");
			then.status(200).json_body(json!({ "ok": true }));
		})
		.await;

	let path = std::env::temp_dir().join("bearer-session-demo.json");
	let store: Arc<dyn TokenStore> = Arc::new(FileStore::open(&path)?);

	store.set(Session::new("A1", "R1")).await?;

	let terminator = ClearingTerminator::new(store.clone()).with_context(HostContext::Interactive);

	terminator.on_sign_out(|cause| println!("signed out: {cause:?}"));

	let client = SessionClient::with_config(
		Arc::new(ReqwestTransport::new(Url::parse(&server.base_url())?)),
		store.clone(),
		Arc::new(terminator),
		SessionConfig::builder().refresh_path("/refresh").build()?,
	);
	let paths = ["/me", "/posts", "/notifications"];
	let responses = future::join_all(paths.iter().map(|path| client.get(*path))).await;

	for (path, response) in paths.iter().zip(responses) {
		println!("{path} -> {}", response?.status());
	}

	refresh.assert_calls_async(1).await;

	println!("exchanges: {}", client.coordinator().metrics().exchanges());
	println!("stored after refresh: {}", std::fs::read_to_string(&path)?);

	client.sign_out().await;

	Ok(())
}
