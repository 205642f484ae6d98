//! Refresh coordination: one exchange per expiry episode, every concurrent caller replayed.
//!
//! The coordinator is a two-state machine. In [`RefreshPhase::Idle`] the first expired 401 it
//! sees opens an episode: it flips the phase to [`RefreshPhase::Refreshing`] and parks a shared
//! exchange future in the coordinator state. Every expired 401 that arrives while the phase is
//! `Refreshing` is appended to the [`ReplayQueue`] and awaits the same exchange, so the episode
//! keeps progressing as long as any participant (or a later arrival) is polling it. The first
//! participant to observe the exchange outcome settles the episode: it replays the queue on
//! success or terminates the session and fails the queue on failure.
//!
//! Phase checks and enqueues happen under one synchronous lock that is never held across an
//! `.await`.

pub mod metrics;
pub mod queue;

mod exchange;

pub use metrics::RefreshMetrics;
pub use queue::{PendingRequest, ReplayQueue};

// crates.io
use futures::{
	FutureExt, TryFutureExt,
	future::{self, BoxFuture, Shared},
};
// self
use crate::{
	_prelude::*,
	auth::{Session, TokenSecret},
	config::SessionConfig,
	error::{ConfigError, RefreshError},
	http::{ApiRequest, ApiResponse, AuthFailure, HeaderValue, ResponseClass, Transport},
	obs::{self, Outcome, Stage, StageSpan},
	refresh::queue::PendingOutcome,
	store::TokenStore,
	terminate::{SessionTerminator, TerminationCause},
};

type SharedExchange = Shared<BoxFuture<'static, Result<Session, Arc<RefreshError>>>>;

/// Current state of the refresh state machine.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RefreshPhase {
	/// No exchange in flight; the next expired 401 starts an episode.
	#[default]
	Idle,
	/// An exchange is in flight; expired 401s are queued behind it.
	Refreshing,
}

#[derive(Default)]
struct EpisodeState {
	phase: RefreshPhase,
	queue: ReplayQueue,
	next_ticket: u64,
	// Bumped every time an episode settles.
	generation: u64,
	// Present from episode start until a participant claims the settlement.
	exchange: Option<SharedExchange>,
}
impl EpisodeState {
	fn join(&mut self, request: ApiRequest) -> Participation {
		let (pending, outcome) = PendingRequest::new(self.next_ticket, request);

		self.next_ticket += 1;
		self.queue.enqueue(pending);

		Participation {
			outcome,
			exchange: self.exchange.clone().map(|exchange| (self.generation, exchange)),
		}
	}

	fn settle(&mut self) -> Vec<PendingRequest> {
		self.phase = RefreshPhase::Idle;
		self.generation += 1;

		self.queue.drain_all()
	}
}

struct Participation {
	outcome: PendingOutcome,
	exchange: Option<(u64, SharedExchange)>,
}

enum Decision {
	Lead(Participation),
	Wait(Participation),
	Replay(ApiRequest, TokenSecret),
}

// Fails every queued caller with the exchange error once dropped, even if the settling
// participant is cancelled while the terminator runs.
struct Rejection<'a> {
	state: &'a Mutex<EpisodeState>,
	error: Arc<RefreshError>,
}
impl Drop for Rejection<'_> {
	fn drop(&mut self) {
		let pending = self.state.lock().settle();

		for entry in pending {
			entry.resolve(Err(Error::RefreshExchange(self.error.clone())));
		}
	}
}

/// Intercepts 401 responses and drives the refresh protocol.
pub struct RefreshCoordinator<T>
where
	T: ?Sized + Transport,
{
	transport: Arc<T>,
	store: Arc<dyn TokenStore>,
	terminator: Arc<dyn SessionTerminator>,
	config: Arc<SessionConfig>,
	metrics: Arc<RefreshMetrics>,
	state: Mutex<EpisodeState>,
}
impl<T> RefreshCoordinator<T>
where
	T: ?Sized + Transport,
{
	/// Creates an idle coordinator.
	pub fn new(
		transport: Arc<T>,
		store: Arc<dyn TokenStore>,
		terminator: Arc<dyn SessionTerminator>,
		config: Arc<SessionConfig>,
	) -> Self {
		Self {
			transport,
			store,
			terminator,
			config,
			metrics: Default::default(),
			state: Default::default(),
		}
	}

	/// Current phase.
	pub fn phase(&self) -> RefreshPhase {
		self.state.lock().phase
	}

	/// Number of requests suspended on the in-flight episode.
	pub fn pending(&self) -> usize {
		self.state.lock().queue.len()
	}

	/// Counters for exchanges, replays, and rejections.
	pub fn metrics(&self) -> &Arc<RefreshMetrics> {
		&self.metrics
	}

	/// Handles the response to `request`, which must be the request exactly as it was sent.
	///
	/// - Anything but a 401 is returned untouched.
	/// - A 401 carrying the expiry code joins (or starts) a refresh episode and resolves with
	///   the replayed response, or with [`Error::RefreshExchange`] when the exchange fails.
	/// - Any other 401 terminates the session and fails with [`Error::InvalidCredential`].
	pub async fn handle(&self, request: ApiRequest, response: ApiResponse) -> Result<ApiResponse> {
		match response.classify(&self.config) {
			ResponseClass::AuthFailure(AuthFailure::Expired) => self.recover(request).await,
			ResponseClass::AuthFailure(AuthFailure::Invalid { code }) => self.reject(code).await,
			ResponseClass::Success | ResponseClass::OtherError => Ok(response),
		}
	}

	async fn recover(&self, request: ApiRequest) -> Result<ApiResponse> {
		let used = request.credential(&self.config.authorization_header).cloned();
		let decision = loop {
			let generation = {
				let mut state = self.state.lock();

				if state.phase == RefreshPhase::Refreshing {
					break Decision::Wait(state.join(request));
				}

				state.generation
			};
			let stored = self.store.get().await?.map(|session| session.access_token);
			let mut state = self.state.lock();

			if state.phase == RefreshPhase::Refreshing {
				break Decision::Wait(state.join(request));
			}
			// An episode settled while the store was read; look again.
			if state.generation != generation {
				continue;
			}

			break match stored {
				Some(access) if !presents(used.as_ref(), &access) => Decision::Replay(request, access),
				_ => self.open_episode(&mut state, request),
			};
		};

		match decision {
			Decision::Lead(participation) => {
				self.metrics.record_queued();

				self.participate(participation).await
			},
			Decision::Wait(participation) => {
				self.metrics.record_queued();
				obs::debug_event(Stage::Exchange, "request queued behind refresh", self.pending());

				self.participate(participation).await
			},
			Decision::Replay(request, access) => {
				self.metrics.record_stale_replay();
				obs::debug_event(Stage::Replay, "replaying request sent with a superseded token", 1);

				self.replay(request, &access).await
			},
		}
	}

	fn open_episode(&self, state: &mut EpisodeState, request: ApiRequest) -> Decision {
		self.metrics.record_exchange();
		obs::record_outcome(Stage::Exchange, Outcome::Attempt);

		state.phase = RefreshPhase::Refreshing;
		state.exchange = Some(self.start_exchange());

		Decision::Lead(state.join(request))
	}

	// Owns clones of every collaborator so the exchange outlives whichever caller started it.
	fn start_exchange(&self) -> SharedExchange {
		let transport = self.transport.clone();
		let store = self.store.clone();
		let config = self.config.clone();
		let work = async move {
			let session = exchange::exchange(&*transport, &*store, &config).await?;

			store.set(session.clone()).await?;

			Ok::<_, RefreshError>(session)
		};

		StageSpan::new(Stage::Exchange).instrument(work.map_err(Arc::new)).boxed().shared()
	}

	async fn participate(&self, participation: Participation) -> Result<ApiResponse> {
		if let Some((generation, exchange)) = participation.exchange {
			let rotated = exchange.await;

			self.settle(generation, rotated).await;
		}

		participation.outcome.await.unwrap_or(Err(Error::EpisodeAbandoned))
	}

	async fn settle(&self, generation: u64, rotated: Result<Session, Arc<RefreshError>>) {
		let claimed = {
			let mut state = self.state.lock();

			state.generation == generation && state.exchange.take().is_some()
		};

		if !claimed {
			return;
		}

		match rotated {
			Ok(session) => {
				self.metrics.record_success();
				obs::record_outcome(Stage::Exchange, Outcome::Success);

				let pending = self.state.lock().settle();

				self.replay_all(pending, &session.access_token).await;
			},
			Err(error) => {
				self.metrics.record_failure();
				obs::record_outcome(Stage::Exchange, Outcome::Failure);
				obs::warn_event(Stage::Exchange, "refresh exchange failed", &error);

				// Still `Refreshing`: late arrivals queue up and share this failure.
				let rejection = Rejection { state: &self.state, error };

				self.terminate(&TerminationCause::RefreshFailed).await;
				drop(rejection);
			},
		}
	}

	async fn replay_all(&self, pending: Vec<PendingRequest>, access: &TokenSecret) {
		let pending: Vec<_> = pending.into_iter().filter(|entry| !entry.is_abandoned()).collect();

		obs::debug_event(Stage::Replay, "replaying queued requests", pending.len());
		self.metrics.record_replayed(pending.len());

		// `join_all` polls in order, so transport sends start in enqueue order.
		let replays = pending.into_iter().map(|entry| {
			let (request, responder) = entry.into_request();

			async move { responder.send(self.replay(request, access).await) }
		});

		StageSpan::new(Stage::Replay).instrument(future::join_all(replays)).await;
	}

	// Replays go straight to the transport; a second 401 is the caller's answer.
	async fn replay(&self, request: ApiRequest, access: &TokenSecret) -> Result<ApiResponse> {
		obs::record_outcome(Stage::Replay, Outcome::Attempt);

		let request = request
			.authorize(&self.config.authorization_header, access)
			.map_err(ConfigError::from)?;
		let outcome = self.transport.send(request).await.map_err(Error::from);

		obs::record_outcome(
			Stage::Replay,
			if outcome.is_ok() { Outcome::Success } else { Outcome::Failure },
		);

		outcome
	}

	async fn reject(&self, code: Option<String>) -> Result<ApiResponse> {
		self.metrics.record_rejection();
		obs::record_outcome(Stage::Reject, Outcome::Failure);

		// An in-flight exchange may still rescue the session; its outcome decides termination.
		if self.phase() == RefreshPhase::Idle {
			self.terminate(&TerminationCause::InvalidCredential { code: code.clone() }).await;
		}

		Err(Error::InvalidCredential { code })
	}

	async fn terminate(&self, cause: &TerminationCause) {
		obs::record_outcome(Stage::Terminate, Outcome::Attempt);
		StageSpan::new(Stage::Terminate).instrument(self.terminator.terminate(cause)).await;
	}
}
impl<T> Debug for RefreshCoordinator<T>
where
	T: ?Sized + Transport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		let state = self.state.lock();

		f.debug_struct("RefreshCoordinator")
			.field("phase", &state.phase)
			.field("pending", &state.queue.len())
			.field("generation", &state.generation)
			.field("config", &self.config)
			.finish()
	}
}

fn presents(used: Option<&HeaderValue>, access: &TokenSecret) -> bool {
	used.is_some_and(|value| value.as_bytes() == access.bearer().as_bytes())
}
