//! The update pipeline: build URL → dispatch → guard against login redirects → swap → rebind → sync history.

use crate::{
	binder::EventBinder,
	config::{Config, ERROR_EVENT},
	expiry,
	fetch::BrowserTransport,
	history::{self, BrowserNavigation, Navigation},
	query::{redact, FormSnapshot, PageRequest},
	session::{Outcome, SessionManager, Transport},
	swap::FragmentSwapper,
};
use core::{cell::Cell, future::Future};
use std::{
	cell::RefCell,
	rc::{Rc, Weak},
};
use tracing::{debug, error, info, instrument, trace, warn};
use wasm_bindgen::{closure::Closure, prelude::wasm_bindgen, JsCast, JsValue};

thread_local! {
	static INSTALLED: RefCell<Option<LiveSearch>> = RefCell::new(None);
}

/// Installs a [`LiveSearch`] with the default [`Config`] on the current document, once it has been parsed.
///
/// The controller lives as long as the page.
///
/// # Errors
///
/// Iff there is no document or the deferred installation can't be scheduled.
#[wasm_bindgen(js_name = installLiveSearch)]
pub fn install_live_search() -> Result<(), JsValue> {
	let document = web_sys::window().and_then(|window| window.document()).ok_or_else(|| JsValue::from_str("live-search-dom: No document."))?;
	if document.ready_state() == "loading" {
		let deferred = document.clone();
		let callback = Closure::once_into_js(move || install_now(&deferred));
		let options = web_sys::AddEventListenerOptions::new();
		options.set_once(true);
		document.add_event_listener_with_callback_and_add_event_listener_options("DOMContentLoaded", callback.unchecked_ref(), &options)?;
	} else {
		install_now(&document);
	}
	Ok(())
}

fn install_now(document: &web_sys::Document) {
	let installed = LiveSearch::install(document, Config::default());
	if installed.is_some() {
		info!("Live search ready.");
	}
	INSTALLED.with(|slot| *slot.borrow_mut() = installed);
}

/// Where the current update cycle stands.
///
/// Superseded cycles never touch this; the cycle that superseded them owns it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
	Idle,
	Dispatching,
	Applying,
	Redirecting,
	Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UpdateError {
	#[error("network error: {0}")]
	Network(String),
	#[error("HTTP error: status {0}")]
	Http(u16),
	#[error("DOM error: {0}")]
	Dom(String),
	/// A successful response that contained none of the configured fragments.
	#[error("response contained no list fragments")]
	NoFragments,
	#[error("no live search form in the document")]
	MissingForm,
}

impl UpdateError {
	fn dom(error: &JsValue) -> Self {
		Self::Dom(error.as_string().unwrap_or_else(|| format!("{:?}", error)))
	}
}

/// How an update cycle ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleEnd {
	/// The listed fragments were swapped and the history entry replaced.
	Applied(Vec<String>),
	/// The session expired; a full navigation to this URL was started.
	Redirected(String),
	/// Nothing on the page changed.
	Failed(UpdateError),
	/// A newer cycle started first. Nothing on the page changed.
	Superseded,
}

/// A live search controller installed on one document.
///
/// Cloning is cheap and yields a handle to the same controller.
#[derive(Debug, Clone)]
pub struct LiveSearch {
	inner: Rc<Inner>,
}

#[derive(Debug)]
struct Inner {
	config: Rc<Config>,
	document: web_sys::Document,
	sessions: SessionManager,
	swapper: FragmentSwapper,
	binder: EventBinder,
	navigation: Rc<dyn Navigation>,
	busy: Rc<Cell<usize>>,
	phase: Cell<Phase>,
}

impl LiveSearch {
	/// Installs with the browser's `fetch` and history.
	///
	/// Returns [`None`] iff `document` has no element matching [`Config::form_selector`].
	#[must_use]
	pub fn install(document: &web_sys::Document, config: Config) -> Option<Self> {
		let transport = Rc::new(BrowserTransport::new(config.marker_header_name.clone(), config.marker_header_value.clone()));
		Self::with_backends(document, config, transport, Rc::new(BrowserNavigation))
	}

	/// Like [`LiveSearch::install`], with custom request and navigation backends.
	#[must_use]
	#[instrument(skip(document, transport, navigation))]
	pub fn with_backends(document: &web_sys::Document, config: Config, transport: Rc<dyn Transport>, navigation: Rc<dyn Navigation>) -> Option<Self> {
		let form = match document.query_selector(&config.form_selector) {
			Ok(Some(form)) => form,
			Ok(None) => {
				debug!("No live search form found.");
				return None;
			}
			Err(error) => {
				error!("Invalid live search form selector: {:?}", error);
				return None;
			}
		};

		let config = Rc::new(config.with_overrides_from(&form));
		let inner = Rc::new_cyclic(|weak: &Weak<Inner>| {
			let weak = weak.clone();
			Inner {
				sessions: SessionManager::new(transport, config.login_path.clone()),
				swapper: FragmentSwapper::new(config.fragment_ids.iter().cloned()),
				binder: EventBinder::new(
					Rc::clone(&config),
					Rc::new(move |request| {
						if let Some(inner) = weak.upgrade() {
							let update = LiveSearch { inner }.update(request);
							wasm_bindgen_futures::spawn_local(async move {
								update.await;
							});
						}
					}),
				),
				config,
				document: document.clone(),
				navigation,
				busy: Rc::default(),
				phase: Cell::new(Phase::Idle),
			}
		});
		let this = Self { inner };

		if let Some(root) = document.document_element() {
			this.bind(&root);
		}

		if this.inner.config.refresh_on_load && this.query_is_empty() {
			info!("Loading the unfiltered listing.");
			let update = this.update(PageRequest::Reset);
			wasm_bindgen_futures::spawn_local(async move {
				update.await;
			});
		}

		Some(this)
	}

	#[must_use]
	pub fn config(&self) -> &Config {
		&self.inner.config
	}

	#[must_use]
	pub fn phase(&self) -> Phase {
		self.inner.phase.get()
	}

	#[must_use]
	pub fn binder(&self) -> &EventBinder {
		&self.inner.binder
	}

	/// Binds listeners at or below `root`. Repeated calls don't duplicate listeners.
	pub fn bind(&self, root: &web_sys::Element) -> usize {
		self.inner.binder.bind(root)
	}

	/// The Target URL for the live form's current values.
	///
	/// # Errors
	///
	/// Iff the form is gone or can't be read.
	pub fn target_url(&self, request: PageRequest) -> Result<String, UpdateError> {
		let form = self.inner.form().ok_or(UpdateError::MissingForm)?;
		let snapshot = FormSnapshot::load(&form).map_err(|error| UpdateError::dom(&error))?;
		Ok(snapshot.target_url(&self.inner.config.query_field, &self.inner.config.page_param, request))
	}

	/// Runs one update cycle for the form's current values.
	///
	/// The form is read and the request dispatched synchronously; only the response is awaited.
	pub fn update(&self, request: PageRequest) -> impl Future<Output = CycleEnd> + 'static {
		let started = self.target_url(request).map(|url| self.run(url));
		let inner = Rc::clone(&self.inner);
		async move {
			match started {
				Ok(cycle) => cycle.await,
				Err(error) => inner.fail(error),
			}
		}
	}

	/// Runs one update cycle for an explicit Target URL.
	pub fn run(&self, url: String) -> impl Future<Output = CycleEnd> + 'static {
		let inner = Rc::clone(&self.inner);
		let busy = BusyGuard::hold(&inner);
		inner.phase.set(Phase::Dispatching);
		let outcome = inner.sessions.dispatch(&url);
		async move {
			let outcome = outcome.await;
			let end = inner.conclude(&url, outcome);
			drop(busy);
			end
		}
	}

	fn query_is_empty(&self) -> bool {
		let query_field = &self.inner.config.query_field;
		self.inner
			.form()
			.and_then(|form| FormSnapshot::load(&form).ok())
			.map_or(true, |snapshot| snapshot.fields.iter().filter(|(name, _)| name == query_field).all(|(_, value)| value.trim().is_empty()))
	}
}

impl Inner {
	fn form(&self) -> Option<web_sys::HtmlFormElement> {
		self.document.query_selector(&self.config.form_selector).ok().flatten().and_then(|form| form.dyn_into().ok())
	}

	#[instrument(skip(self, url, outcome), fields(url = %redact(url)))]
	fn conclude(&self, url: &str, outcome: Outcome) -> CycleEnd {
		match outcome {
			Outcome::Superseded => {
				trace!("Superseded.");
				CycleEnd::Superseded
			}
			Outcome::LoginRedirect(final_url) => {
				self.phase.set(Phase::Redirecting);
				expiry::escalate(&*self.navigation, &final_url);
				self.phase.set(Phase::Idle);
				CycleEnd::Redirected(final_url)
			}
			Outcome::HttpError(status) => self.fail(UpdateError::Http(status)),
			Outcome::NetworkError(message) => self.fail(UpdateError::Network(message)),
			Outcome::Fragment { html, final_url } => {
				self.phase.set(Phase::Applying);
				trace!(final_url = %redact(&final_url), "Applying fragments.");
				let applied = match self.swapper.apply(&self.document, &html) {
					Ok(applied) => applied,
					Err(error) => return self.fail(UpdateError::dom(&error)),
				};
				if applied.is_empty() {
					// History only follows a swap.
					return self.fail(UpdateError::NoFragments);
				}
				let roots: Vec<_> = applied.iter().filter_map(|id| self.document.get_element_by_id(id)).collect();
				self.binder.rebind(&roots);
				history::sync(&*self.navigation, url);
				self.phase.set(Phase::Idle);
				CycleEnd::Applied(applied)
			}
		}
	}

	fn fail(&self, error: UpdateError) -> CycleEnd {
		self.phase.set(Phase::Failed);
		warn!("Live update failed: {}", error);
		if let Some(form) = self.form() {
			if let Err(dispatch_error) = dispatch_error_event(&form, &error) {
				error!("Failed to dispatch {}: {:?}", ERROR_EVENT, dispatch_error);
			}
		}
		self.phase.set(Phase::Idle);
		CycleEnd::Failed(error)
	}
}

fn dispatch_error_event(form: &web_sys::HtmlFormElement, error: &UpdateError) -> Result<(), JsValue> {
	let init = web_sys::CustomEventInit::new();
	init.set_bubbles(true);
	init.set_detail(&JsValue::from_str(&error.to_string()));
	let event = web_sys::CustomEvent::new_with_event_init_dict(ERROR_EVENT, &init)?;
	form.dispatch_event(&event)?;
	Ok(())
}

/// Shows the busy cursor while at least one cycle is in flight.
struct BusyGuard {
	depth: Rc<Cell<usize>>,
	document: web_sys::Document,
}

impl BusyGuard {
	fn hold(inner: &Inner) -> Self {
		let depth = Rc::clone(&inner.busy);
		if depth.replace(depth.get() + 1) == 0 {
			if let Some(body) = inner.document.body() {
				if let Err(error) = body.style().set_property("cursor", &inner.config.busy_cursor) {
					error!("Failed to set busy cursor: {:?}", error);
				}
			}
		}
		Self {
			depth,
			document: inner.document.clone(),
		}
	}
}

impl Drop for BusyGuard {
	fn drop(&mut self) {
		let depth = self.depth.get().saturating_sub(1);
		self.depth.set(depth);
		if depth == 0 {
			if let Some(body) = self.document.body() {
				if let Err(error) = body.style().remove_property("cursor") {
					error!("Failed to clear busy cursor: {:?}", error);
				}
			}
		}
	}
}
