//! [`Transport`] over [***fetch***](https://developer.mozilla.org/en-US/docs/Web/API/fetch).

use crate::session::{FetchedPage, Transport, TransportError};
use core::cell::RefCell;
use futures_util::{future::LocalBoxFuture, FutureExt};
use tracing::{trace, warn};
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;

/// Same-origin, uncached GET requests carrying the partial-content marker header.
///
/// Starting a request aborts the previous one, if it's still running.
/// The session token stays authoritative; aborting only saves bandwidth.
#[derive(Debug)]
pub struct BrowserTransport {
	marker_header: (String, String),
	in_flight: RefCell<Option<web_sys::AbortController>>,
}

impl BrowserTransport {
	#[must_use]
	pub fn new(marker_header_name: impl Into<String>, marker_header_value: impl Into<String>) -> Self {
		Self {
			marker_header: (marker_header_name.into(), marker_header_value.into()),
			in_flight: RefCell::new(None),
		}
	}

	fn request(&self, url: &str, signal: Option<&web_sys::AbortSignal>) -> Result<web_sys::Request, JsValue> {
		let headers = web_sys::Headers::new()?;
		headers.set(&self.marker_header.0, &self.marker_header.1)?;

		let init = web_sys::RequestInit::new();
		init.set_method("GET");
		init.set_credentials(web_sys::RequestCredentials::SameOrigin);
		init.set_cache(web_sys::RequestCache::NoStore);
		init.set_headers(&headers);
		init.set_signal(signal);
		web_sys::Request::new_with_str_and_init(url, &init)
	}
}

impl Transport for BrowserTransport {
	fn get(&self, url: &str) -> LocalBoxFuture<'static, Result<FetchedPage, TransportError>> {
		if let Some(previous) = self.in_flight.borrow_mut().take() {
			trace!("Aborting previous request.");
			previous.abort();
		}

		let controller = match web_sys::AbortController::new() {
			Ok(controller) => Some(controller),
			Err(error) => {
				warn!("Could not create an `AbortController`, requests won't be cancelled: {:?}", error);
				None
			}
		};
		let request = self.request(url, controller.as_ref().map(|controller| controller.signal()).as_ref());
		*self.in_flight.borrow_mut() = controller;

		async move {
			let window = web_sys::window().ok_or_else(|| TransportError::Network("No `window`.".to_owned()))?;
			let request = request.map_err(network_error)?;
			let response = JsFuture::from(window.fetch_with_request(&request)).await.map_err(network_error)?;
			let response: web_sys::Response = response.dyn_into().map_err(network_error)?;

			let status = response.status();
			let final_url = response.url();
			let body = if response.ok() {
				let text = JsFuture::from(response.text().map_err(network_error)?).await.map_err(network_error)?;
				text.as_string().unwrap_or_default()
			} else {
				String::new()
			};
			trace!(status, redirected = response.redirected(), "Received response.");
			Ok::<_, TransportError>(FetchedPage { status, final_url, body })
		}
		.boxed_local()
	}
}

fn network_error(error: JsValue) -> TransportError {
	if error.dyn_ref::<js_sys::Error>().map_or(false, |error| error.name() == "AbortError") || error.dyn_ref::<web_sys::DomException>().map_or(false, |exception| exception.name() == "AbortError") {
		return TransportError::Aborted;
	}
	let message = error
		.dyn_ref::<js_sys::Error>()
		.map(|error| String::from(error.message()))
		.or_else(|| error.as_string())
		.unwrap_or_else(|| format!("{:?}", error));
	TransportError::Network(message)
}
