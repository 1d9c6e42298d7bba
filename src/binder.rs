//! Wiring user input to the update pipeline.
//!
//! [`EventBinder::bind`] may be called any number of times on any root. Every element/behaviour pair is bound once,
//! as recorded in the [`BindingRegistry`].

use crate::{
	config::Config,
	debounce::{Debouncer, Scope},
	query::{page_from_href, PageRequest},
	registry::{Binding, BindingRegistry, ElementKey},
};
use std::rc::Rc;
use tracing::{debug, error, instrument, trace};
use wasm_bindgen::{closure::Closure, JsCast};

const TEXT_INPUTS: &str = "input[type='text'], input[type='search'], input:not([type])";
const FILTER_CONTROLS: &str = "select, input[type='checkbox'], input[type='radio']";
const TEXT_EVENTS: &[&str] = &["input", "change", "search"];

/// Receives the page request a user action resolved to.
pub type UpdateHandler = Rc<dyn Fn(PageRequest)>;

pub struct EventBinder {
	config: Rc<Config>,
	registry: BindingRegistry,
	debouncer: Rc<Debouncer>,
	on_update: UpdateHandler,
}

impl core::fmt::Debug for EventBinder {
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		f.debug_struct("EventBinder").field("registry", &self.registry).field("debouncer", &self.debouncer).finish_non_exhaustive()
	}
}

impl EventBinder {
	#[must_use]
	pub fn new(config: Rc<Config>, on_update: UpdateHandler) -> Self {
		Self {
			config,
			registry: BindingRegistry::new(),
			debouncer: Rc::new(Debouncer::new()),
			on_update,
		}
	}

	#[must_use]
	pub fn registry(&self) -> &BindingRegistry {
		&self.registry
	}

	/// Binds the live form(s) and pagination container at or below `root`.
	///
	/// Returns the number of listeners that were newly attached.
	#[instrument(skip(self, root))]
	pub fn bind(&self, root: &web_sys::Element) -> usize {
		let mut attached = 0;

		for form in select_inclusive(root, &self.config.form_selector) {
			attached += self.bind_form(&form);
		}

		if let Some(pagination) = root.owner_document().and_then(|document| document.get_element_by_id(&self.config.pagination_id)) {
			let node: &web_sys::Node = pagination.as_ref();
			if root.contains(Some(node)) {
				attached += usize::from(self.attach(&pagination, Binding::PaginationClick, &["click"], || self.pagination_handler(&pagination)));
			}
		}

		debug!("Attached {} new listener(s), {} total.", attached, self.registry.len());
		attached
	}

	#[must_use]
	pub fn debouncer(&self) -> &Debouncer {
		&self.debouncer
	}

	/// Forgets listeners and debounce timers of detached elements, then binds each of `roots`.
	pub fn rebind(&self, roots: &[web_sys::Element]) -> usize {
		let released = self.registry.release_detached();
		self.debouncer.forget(&released);
		roots.iter().map(|root| self.bind(root)).sum()
	}

	fn bind_form(&self, form: &web_sys::Element) -> usize {
		let form_key = match ElementKey::of(form) {
			Ok(key) => key,
			Err(error) => {
				error!("Could not key the live form: {:?}", error);
				return 0;
			}
		};
		let mut attached = usize::from(self.attach(form, Binding::Submit, &["submit"], || self.submit_handler(form_key)));

		for input in select_inclusive(form, TEXT_INPUTS) {
			let input_key = match ElementKey::of(&input) {
				Ok(key) => key,
				Err(error) => {
					error!("Could not key a text input: {:?}", error);
					continue;
				}
			};
			attached += usize::from(self.attach(&input, Binding::TextInput, TEXT_EVENTS, || self.debounced_handler(Scope::Input(input_key), Some(form_key), self.config.text_debounce_ms)));
		}

		for control in select_inclusive(form, FILTER_CONTROLS) {
			attached += usize::from(self.attach(&control, Binding::FilterChange, &["change"], || self.debounced_handler(Scope::Filters(form_key), None, self.config.filter_debounce_ms)));
		}

		attached
	}

	fn attach(&self, element: &web_sys::Element, binding: Binding, events: &[&'static str], handler: impl FnOnce() -> Closure<dyn FnMut(web_sys::Event)>) -> bool {
		match self.registry.bind_once(element, binding, events, handler) {
			Ok(attached) => attached,
			Err(error) => {
				error!("Failed to bind {:?}: {:?}", binding, error);
				false
			}
		}
	}

	fn submit_handler(&self, form_key: ElementKey) -> Closure<dyn FnMut(web_sys::Event)> {
		let debouncer = Rc::clone(&self.debouncer);
		let on_update = Rc::clone(&self.on_update);
		Closure::wrap(Box::new(move |event: web_sys::Event| {
			event.prevent_default();
			trace!("Form submitted.");
			debouncer.cancel_form(form_key);
			on_update(PageRequest::Reset);
		}))
	}

	fn debounced_handler(&self, scope: Scope, form: Option<ElementKey>, millis: u32) -> Closure<dyn FnMut(web_sys::Event)> {
		let debouncer = Rc::clone(&self.debouncer);
		let on_update = Rc::clone(&self.on_update);
		Closure::wrap(Box::new(move |_: web_sys::Event| {
			let on_update = Rc::clone(&on_update);
			debouncer.schedule(scope, form, millis, move || on_update(PageRequest::Reset));
		}))
	}

	fn pagination_handler(&self, container: &web_sys::Element) -> Closure<dyn FnMut(web_sys::Event)> {
		let container = container.clone();
		let page_param = self.config.page_param.clone();
		let on_update = Rc::clone(&self.on_update);
		Closure::wrap(Box::new(move |event: web_sys::Event| {
			if let Some(mouse) = event.dyn_ref::<web_sys::MouseEvent>() {
				if mouse.button() != 0 || mouse.ctrl_key() || mouse.meta_key() || mouse.shift_key() || mouse.alt_key() {
					// New tab, new window, download: Leave it to the browser.
					return;
				}
			}

			let anchor = match event.target().and_then(|target| target.dyn_into::<web_sys::Element>().ok()).and_then(|target| target.closest("a[href]").ok().flatten()) {
				Some(anchor) if container.contains(Some(anchor.as_ref())) => anchor,
				_ => return,
			};
			let href = match anchor.get_attribute("href") {
				Some(href) => href,
				None => return,
			};
			event.prevent_default();

			let document_url = anchor.owner_document().and_then(|document| document.url().ok()).unwrap_or_default();
			let page = page_from_href(&href, &document_url, &page_param);
			trace!(page, "Pagination link clicked.");
			on_update(PageRequest::Page(page));
		}))
	}
}

/// `root` itself if it matches, followed by all matching descendants in document order.
fn select_inclusive(root: &web_sys::Element, selector: &str) -> Vec<web_sys::Element> {
	let mut found = Vec::new();
	match root.matches(selector) {
		Ok(true) => found.push(root.clone()),
		Ok(false) => (),
		Err(error) => {
			error!("Invalid selector {:?}: {:?}", selector, error);
			return found;
		}
	}
	match root.query_selector_all(selector) {
		Ok(list) => found.extend((0..list.length()).filter_map(|i| list.item(i)).filter_map(|node| node.dyn_into::<web_sys::Element>().ok())),
		Err(error) => error!("Invalid selector {:?}: {:?}", selector, error),
	}
	found
}
