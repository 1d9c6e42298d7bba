//! Address bar and full navigations.

use core::fmt::Debug;
use tracing::{error, instrument};
use wasm_bindgen::JsValue;

/// The browser's navigation surface, as far as the update pipeline touches it.
pub trait Navigation: Debug {
	/// Replaces the current entry's URL and state. Never adds an entry.
	fn replace_entry(&self, url: &str) -> Result<(), JsValue>;
	/// Leaves the page for `url`.
	fn navigate(&self, url: &str) -> Result<(), JsValue>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct BrowserNavigation;

impl Navigation for BrowserNavigation {
	fn replace_entry(&self, url: &str) -> Result<(), JsValue> {
		let window = web_sys::window().ok_or_else(|| JsValue::from_str("No `window`."))?;
		let state = js_sys::Object::new();
		js_sys::Reflect::set(&state, &JsValue::from_str("liveSearch"), &JsValue::from_str(url))?;
		window.history()?.replace_state_with_url(&state, "", Some(url))
	}

	fn navigate(&self, url: &str) -> Result<(), JsValue> {
		let window = web_sys::window().ok_or_else(|| JsValue::from_str("No `window`."))?;
		window.location().assign(url)
	}
}

/// Makes the current navigation entry point at `url`.
///
/// Only called after a successful swap. Failures are logged; the list has already been updated at that point.
#[instrument(skip(navigation, url), fields(url = %crate::query::redact(url)))]
pub fn sync(navigation: &dyn Navigation, url: &str) {
	if let Err(error) = navigation.replace_entry(url) {
		error!("Failed to replace the current history entry: {:?}", error);
	}
}
