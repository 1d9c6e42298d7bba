//! Which elements already carry which listeners.
//!
//! Elements are identified by a small integer stored under a well-known
//! [***Symbol***](https://developer.mozilla.org/en-US/docs/Web/JavaScript/Reference/Global_Objects/Symbol) on the element object itself,
//! so identity survives for as long as the node does and nothing shows up in the markup.
//!
//! The registry owns every listener [`Closure`]. Removing an entry removes the listener from its element.

use core::{cell::Cell, fmt};
use hashbrown::{hash_map::Entry, HashMap};
use std::cell::RefCell;
use tracing::{error, trace};
use wasm_bindgen::{closure::Closure, JsCast, JsValue};

thread_local! {
	static ELEMENT_KEY: JsValue = js_sys::Symbol::for_("live-search-dom.element-key").into();
	static NEXT_KEY: Cell<u32> = Cell::new(1);
}

/// Stable identity of a DOM element for as long as it lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementKey(u32);

impl ElementKey {
	/// Reads `element`'s key, assigning a fresh one on first use.
	///
	/// # Errors
	///
	/// Iff the key property can't be read or written, e.g. on a frozen object.
	pub fn of(element: &web_sys::Element) -> Result<Self, JsValue> {
		ELEMENT_KEY.with(|symbol| {
			let existing = js_sys::Reflect::get(element, symbol)?;
			if let Some(key) = existing.as_f64() {
				#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
				return Ok(Self(key as u32));
			}

			let key = NEXT_KEY.with(|next| {
				let key = next.get();
				next.set(key.wrapping_add(1));
				key
			});
			if !js_sys::Reflect::set(element, symbol, &JsValue::from(key))? {
				return Err(JsValue::from_str("live-search-dom: Could not tag element."));
			}
			Ok(Self(key))
		})
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Binding {
	Submit,
	TextInput,
	FilterChange,
	PaginationClick,
}

struct Listener {
	element: web_sys::Element,
	events: Vec<&'static str>,
	handler: Closure<dyn FnMut(web_sys::Event)>,
}

impl Drop for Listener {
	fn drop(&mut self) {
		for event in &self.events {
			if let Err(error) = self.element.remove_event_listener_with_callback(event, self.handler.as_ref().unchecked_ref()) {
				error!("Failed to remove {} listener: {:?}", event, error);
			}
		}
		trace!("Destroyed listener.");
	}
}

#[derive(Default)]
pub struct BindingRegistry {
	listeners: RefCell<HashMap<(ElementKey, Binding), Listener>>,
}

impl fmt::Debug for BindingRegistry {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("BindingRegistry").field("len", &self.len()).finish()
	}
}

impl BindingRegistry {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	#[must_use]
	pub fn len(&self) -> usize {
		self.listeners.borrow().len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	#[must_use]
	pub fn is_bound(&self, element: &web_sys::Element, binding: Binding) -> bool {
		ElementKey::of(element).map_or(false, |key| self.listeners.borrow().contains_key(&(key, binding)))
	}

	/// Attaches `handler` for each of `events` unless `element` already has `binding`.
	///
	/// `handler` is only called if a new listener is needed.
	/// Returns whether a new listener was attached.
	///
	/// # Errors
	///
	/// Iff the element can't be keyed or a listener can't be added. No listener is left behind in that case.
	pub fn bind_once(&self, element: &web_sys::Element, binding: Binding, events: &[&'static str], handler: impl FnOnce() -> Closure<dyn FnMut(web_sys::Event)>) -> Result<bool, JsValue> {
		let key = ElementKey::of(element)?;
		let mut listeners = self.listeners.borrow_mut();
		let vacant = match listeners.entry((key, binding)) {
			Entry::Occupied(_) => return Ok(false),
			Entry::Vacant(vacant) => vacant,
		};

		let mut listener = Listener {
			element: element.clone(),
			events: Vec::with_capacity(events.len()),
			handler: handler(),
		};
		for &event in events {
			// On failure, dropping `listener` detaches what was attached so far.
			element.add_event_listener_with_callback(event, listener.handler.as_ref().unchecked_ref())?;
			listener.events.push(event);
		}
		vacant.insert(listener);
		trace!(?key, ?binding, "Created listener.");
		Ok(true)
	}

	/// Drops the listeners of elements that have left the document.
	///
	/// Returns the keys of the released elements.
	pub fn release_detached(&self) -> Vec<ElementKey> {
		let mut released = Vec::new();
		self.listeners.borrow_mut().retain(|&(key, _), listener| {
			let connected = listener.element.is_connected();
			if !connected && !released.contains(&key) {
				released.push(key);
			}
			connected
		});
		trace!("Released {} detached element(s).", released.len());
		released
	}
}
