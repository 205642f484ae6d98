//! FIFO holding requests suspended on an in-flight refresh exchange.

// crates.io
use futures::channel::oneshot;
// self
use crate::{
	_prelude::*,
	http::{ApiRequest, ApiResponse},
};

/// Receiving half handed back to the caller that enqueued a [`PendingRequest`].
pub(crate) type PendingOutcome = oneshot::Receiver<Result<ApiResponse>>;

/// A request that observed an expired credential while a refresh was (or became) in flight.
///
/// Resolved exactly once: consuming [`resolve`](PendingRequest::resolve) sends the outcome to
/// the suspended caller. Dropping an unresolved entry wakes the caller with a cancellation.
#[derive(Debug)]
pub struct PendingRequest {
	ticket: u64,
	request: ApiRequest,
	responder: oneshot::Sender<Result<ApiResponse>>,
}
impl PendingRequest {
	pub(crate) fn new(ticket: u64, request: ApiRequest) -> (Self, PendingOutcome) {
		let (responder, outcome) = oneshot::channel();

		(Self { ticket, request, responder }, outcome)
	}

	/// Enqueue-order ticket, unique per coordinator.
	pub fn ticket(&self) -> u64 {
		self.ticket
	}

	/// The request as it was first sent, still carrying the expired credential.
	pub fn request(&self) -> &ApiRequest {
		&self.request
	}

	/// Returns `true` once the suspended caller has stopped waiting.
	pub fn is_abandoned(&self) -> bool {
		self.responder.is_canceled()
	}

	pub(crate) fn into_request(self) -> (ApiRequest, Responder) {
		(self.request, Responder(self.responder))
	}

	/// Resolves the suspended caller with `outcome`.
	pub fn resolve(self, outcome: Result<ApiResponse>) {
		Responder(self.responder).send(outcome);
	}
}

/// Sending half split off a [`PendingRequest`] while its request is being replayed.
#[derive(Debug)]
pub(crate) struct Responder(oneshot::Sender<Result<ApiResponse>>);
impl Responder {
	pub(crate) fn send(self, outcome: Result<ApiResponse>) {
		// The caller may have stopped waiting; nobody is left to notify.
		let _ = self.0.send(outcome);
	}
}

/// Unbounded FIFO of [`PendingRequest`]s.
///
/// The queue has no interior locking. The coordinator owns it inside the same lock as the
/// refresh phase, so "check phase + enqueue" and "drain + return to idle" are each one
/// critical section and no enqueue can land between reading and clearing the entries.
#[derive(Debug, Default)]
pub struct ReplayQueue(VecDeque<PendingRequest>);
impl ReplayQueue {
	/// Appends an entry; never rejects for depth.
	pub fn enqueue(&mut self, pending: PendingRequest) {
		self.0.push_back(pending);
	}

	/// Removes and returns every entry in enqueue order.
	pub fn drain_all(&mut self) -> Vec<PendingRequest> {
		self.0.drain(..).collect()
	}

	/// Number of suspended requests.
	pub fn len(&self) -> usize {
		self.0.len()
	}

	/// Returns `true` when no request is suspended.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}
}
