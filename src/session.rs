//! One partial-page request at a time.
//!
//! Every dispatch supersedes the previous one *synchronously*, before its own request is issued.
//! Whatever the older request eventually resolves to is reported as [`Outcome::Superseded`],
//! so last-writer-wins follows dispatch order rather than response arrival order.

use crate::{expiry, query::redact};
use core::{cell::Cell, fmt::Debug, future::Future};
use futures_util::future::LocalBoxFuture;
use std::rc::Rc;
use tracing::{debug, trace, trace_span};

/// A response as seen after redirects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
	pub status: u16,
	/// The response's *effective* URL.
	pub final_url: String,
	/// Empty unless the status was successful.
	pub body: String,
}

impl FetchedPage {
	#[must_use]
	pub fn is_success(&self) -> bool {
		(200..300).contains(&self.status)
	}
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
	/// The request was cancelled because a newer one started.
	#[error("request aborted")]
	Aborted,
	#[error("network failure: {0}")]
	Network(String),
}

/// Issues partial GET requests.
///
/// Implementations must do any synchronous bookkeeping (like aborting an older request) in [`Transport::get`] itself,
/// before returning the future.
pub trait Transport: Debug {
	fn get(&self, url: &str) -> LocalBoxFuture<'static, Result<FetchedPage, TransportError>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
	Fragment { html: String, final_url: String },
	LoginRedirect(String),
	HttpError(u16),
	NetworkError(String),
	Superseded,
}

/// Identifies one dispatch. Only the most recently started token is current.
#[derive(Debug, Clone)]
pub struct SessionToken {
	generation: u64,
	current: Rc<Cell<u64>>,
}

impl SessionToken {
	#[must_use]
	pub fn generation(&self) -> u64 {
		self.generation
	}

	#[must_use]
	pub fn is_current(&self) -> bool {
		self.current.get() == self.generation
	}
}

#[derive(Debug)]
pub struct SessionManager {
	current: Rc<Cell<u64>>,
	transport: Rc<dyn Transport>,
	login_path: String,
}

impl SessionManager {
	#[must_use]
	pub fn new(transport: Rc<dyn Transport>, login_path: impl Into<String>) -> Self {
		Self {
			current: Rc::default(),
			transport,
			login_path: login_path.into(),
		}
	}

	/// Invalidates every earlier token and returns the new current one.
	pub fn supersede_and_start(&self) -> SessionToken {
		let generation = self.current.get().wrapping_add(1);
		self.current.set(generation);
		SessionToken {
			generation,
			current: Rc::clone(&self.current),
		}
	}

	/// Starts a session for `url` right away and returns its eventual [`Outcome`].
	///
	/// The previous session is superseded when this method is *called*, not when the returned future is first polled.
	pub fn dispatch(&self, url: &str) -> impl Future<Output = Outcome> + 'static {
		let token = self.supersede_and_start();
		let span = trace_span!("dispatch", generation = token.generation(), url = %redact(url));
		let request = {
			let _enter = span.enter();
			trace!("Starting partial request.");
			self.transport.get(url)
		};
		let login_path = self.login_path.clone();
		async move {
			let result = request.await;
			let _enter = span.enter();
			if !token.is_current() {
				trace!("Discarding superseded response.");
				return Outcome::Superseded;
			}
			classify(result, &login_path)
		}
	}
}

fn classify(result: Result<FetchedPage, TransportError>, login_path: &str) -> Outcome {
	match result {
		Err(TransportError::Aborted) => {
			// Only a newer dispatch aborts, so this is unreachable for a current token unless the page did it.
			debug!("Current request was aborted externally.");
			Outcome::NetworkError(TransportError::Aborted.to_string())
		}
		Err(TransportError::Network(message)) => Outcome::NetworkError(message),
		Ok(page) if expiry::is_login_location(&page.final_url, login_path) => Outcome::LoginRedirect(page.final_url),
		Ok(page) if !page.is_success() => Outcome::HttpError(page.status),
		Ok(FetchedPage { body, final_url, .. }) => Outcome::Fragment { html: body, final_url },
	}
}
