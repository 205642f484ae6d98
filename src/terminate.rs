//! Session termination after irrecoverable authentication failures.
//!
//! The coordinator calls a [`SessionTerminator`] at most once per failure episode: once per
//! non-expiry 401, once per failed refresh exchange regardless of how many requests were
//! queued on it, and never while an exchange it started might still succeed.

// self
use crate::{_prelude::*, obs, store::TokenStore};

/// Boxed future returned by [`SessionTerminator::terminate`].
pub type TerminateFuture<'a> = Pin<Box<dyn Future<Output = ()> + 'a + Send>>;

/// Callback fired when an interactive host should drop the user back to sign-in.
pub type SignOutListener = Arc<dyn Fn(&TerminationCause) + Send + Sync>;

/// Contract for dropping the session and telling the host the user is logged out.
pub trait SessionTerminator
where
	Self: Send + Sync,
{
	/// Clears session state and signals the host. Must not fail; backends log their own errors.
	fn terminate<'a>(&'a self, cause: &'a TerminationCause) -> TerminateFuture<'a>;
}

/// Why the session was terminated.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TerminationCause {
	/// A request was rejected for a reason other than expiry.
	InvalidCredential {
		/// Cause code reported by the server, if any.
		code: Option<String>,
	},
	/// The refresh exchange failed.
	RefreshFailed,
	/// The host asked to sign out.
	SignedOut,
}

/// Where the session client runs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum HostContext {
	/// A user-facing process that can navigate back to sign-in itself.
	#[default]
	Interactive,
	/// A server-side renderer; the failed request's error is the only signal.
	Server,
}

/// Default terminator: clears the token store and, in interactive hosts, notifies listeners.
pub struct ClearingTerminator {
	store: Arc<dyn TokenStore>,
	context: HostContext,
	listeners: RwLock<Vec<SignOutListener>>,
}
impl ClearingTerminator {
	/// Creates an interactive terminator over `store`.
	pub fn new(store: Arc<dyn TokenStore>) -> Self {
		Self { store, context: HostContext::default(), listeners: RwLock::new(Vec::new()) }
	}

	/// Overrides the host context.
	pub fn with_context(mut self, context: HostContext) -> Self {
		self.context = context;

		self
	}

	/// Registers a sign-out listener (typically a redirect to the sign-in screen).
	pub fn on_sign_out(&self, listener: impl Fn(&TerminationCause) + Send + Sync + 'static) {
		self.listeners.write().push(Arc::new(listener));
	}

	/// Host context this terminator was configured for.
	pub fn context(&self) -> HostContext {
		self.context
	}
}
impl SessionTerminator for ClearingTerminator {
	fn terminate<'a>(&'a self, cause: &'a TerminationCause) -> TerminateFuture<'a> {
		Box::pin(async move {
			if let Err(e) = self.store.clear().await {
				obs::warn_event(obs::Stage::Terminate, "failed to clear the token store", &e);
			}
			if self.context == HostContext::Server {
				return;
			}

			let listeners = self.listeners.read().clone();

			for listener in listeners {
				listener(cause);
			}
		})
	}
}
impl Debug for ClearingTerminator {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ClearingTerminator")
			.field("context", &self.context)
			.field("listeners", &self.listeners.read().len())
			.finish()
	}
}
