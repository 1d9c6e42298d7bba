#![allow(dead_code)]

use futures::{
	channel::oneshot,
	future::{self, LocalBoxFuture},
	FutureExt,
};
use live_search_dom::{
	history::Navigation,
	session::{FetchedPage, Transport, TransportError},
	Config, LiveSearch,
};
use std::{
	cell::{Cell, RefCell},
	collections::HashMap,
	rc::Rc,
};
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{window, Document, HtmlBodyElement};

pub const FIXTURE: &str = r#"
<form data-live="search" action="/items/" method="get">
	<input type="search" name="q" id="q">
	<select name="status" id="status">
		<option value="">All</option>
		<option value="active">Active</option>
	</select>
	<button type="submit">Search</button>
</form>
<table><tbody id="list-body"><tr><td>initial row</td></tr></tbody></table>
<nav id="list-pagination" class="pages"><a href="?page=2" id="page-2">2</a> <a href="?page=3" id="page-3">3</a></nav>
<small id="list-pagination-label">Page 1 of 3</small>
"#;

static mut LOG_INITIALIZED: bool = false;

pub fn init_logging() {
	unsafe {
		if !LOG_INITIALIZED {
			tracing_wasm::set_as_global_default();
			LOG_INITIALIZED = true;
		}
	}
}

pub fn document() -> Document {
	window().unwrap().document().unwrap()
}

/// Resets the body to [`FIXTURE`].
pub fn reset_body() -> Document {
	reset_body_to(FIXTURE)
}

pub fn reset_body_to(fixture: &str) -> Document {
	init_logging();
	let document = document();
	let body = document.body().unwrap().dyn_into::<HtmlBodyElement>().unwrap();
	body.set_inner_html(fixture);
	document
}

pub fn test_config() -> Config {
	Config {
		text_debounce_ms: 40,
		filter_debounce_ms: 10,
		..Config::default()
	}
}

pub fn listing(rows: &str, pagination: Option<&str>, label: &str) -> String {
	format!(
		"<!DOCTYPE html><html><body><table><tbody id=\"list-body\">{}</tbody></table>{}<small id=\"list-pagination-label\">{}</small></body></html>",
		rows,
		pagination.map(|links| format!("<nav id=\"list-pagination\" class=\"pages\">{}</nav>", links)).unwrap_or_default(),
		label
	)
}

type Reply = Result<FetchedPage, TransportError>;

/// Records requests and answers them from a table, immediately or when released by the test.
#[derive(Debug, Default)]
pub struct FakeTransport {
	pub requests: RefCell<Vec<String>>,
	replies: RefCell<HashMap<String, Reply>>,
	hold: Cell<bool>,
	held: RefCell<Vec<(String, oneshot::Sender<Reply>)>>,
}

impl FakeTransport {
	pub fn reply(&self, url: &str, reply: Reply) {
		self.replies.borrow_mut().insert(url.to_owned(), reply);
	}

	pub fn reply_html(&self, url: &str, html: &str) {
		self.reply(url, Ok(page(200, url, html)));
	}

	/// Keeps later requests pending until [`FakeTransport::release`].
	pub fn hold(&self) {
		self.hold.set(true);
	}

	pub fn release(&self, url: &str, reply: Reply) {
		let mut held = self.held.borrow_mut();
		let index = held.iter().position(|(u, _)| u == url).expect("No such pending request.");
		let (_, sender) = held.remove(index);
		sender.send(reply).expect("Receiver dropped.");
	}

	pub fn requests(&self) -> Vec<String> {
		self.requests.borrow().clone()
	}

	fn answer(&self, url: &str) -> Reply {
		self.replies.borrow().get(url).cloned().unwrap_or_else(|| Ok(page(200, url, &listing("<tr><td>default</td></tr>", None, "default"))))
	}
}

impl Transport for FakeTransport {
	fn get(&self, url: &str) -> LocalBoxFuture<'static, Reply> {
		self.requests.borrow_mut().push(url.to_owned());
		if self.hold.get() {
			let (sender, receiver) = oneshot::channel();
			self.held.borrow_mut().push((url.to_owned(), sender));
			receiver.map(|reply| reply.unwrap_or(Err(TransportError::Aborted))).boxed_local()
		} else {
			future::ready(self.answer(url)).boxed_local()
		}
	}
}

pub fn page(status: u16, final_url: &str, body: &str) -> FetchedPage {
	FetchedPage {
		status,
		final_url: final_url.to_owned(),
		body: body.to_owned(),
	}
}

#[derive(Debug, Default)]
pub struct RecordingNavigation {
	pub replaced: RefCell<Vec<String>>,
	pub navigated: RefCell<Vec<String>>,
}

impl Navigation for RecordingNavigation {
	fn replace_entry(&self, url: &str) -> Result<(), JsValue> {
		self.replaced.borrow_mut().push(url.to_owned());
		Ok(())
	}

	fn navigate(&self, url: &str) -> Result<(), JsValue> {
		self.navigated.borrow_mut().push(url.to_owned());
		Ok(())
	}
}

pub struct Harness {
	pub document: Document,
	pub transport: Rc<FakeTransport>,
	pub navigation: Rc<RecordingNavigation>,
	pub live_search: LiveSearch,
}

pub fn install() -> Harness {
	install_with(test_config())
}

pub fn install_with(config: Config) -> Harness {
	install_on(FIXTURE, config)
}

pub fn install_on(fixture: &str, config: Config) -> Harness {
	let document = reset_body_to(fixture);
	let transport = Rc::new(FakeTransport::default());
	let navigation = Rc::new(RecordingNavigation::default());
	let live_search = LiveSearch::with_backends(&document, config, transport.clone(), navigation.clone()).expect("Fixture has a live form.");
	Harness {
		document,
		transport,
		navigation,
		live_search,
	}
}

impl Harness {
	pub fn inner_html(&self, id: &str) -> String {
		self.document.get_element_by_id(id).unwrap().inner_html()
	}

	pub fn set_value(&self, id: &str, value: &str) {
		let element = self.document.get_element_by_id(id).unwrap();
		if let Some(input) = element.dyn_ref::<web_sys::HtmlInputElement>() {
			input.set_value(value);
		} else {
			element.dyn_ref::<web_sys::HtmlSelectElement>().unwrap().set_value(value);
		}
	}

	/// Sets `value` and fires `event` on the element, like a user would.
	pub fn type_value(&self, id: &str, value: &str, event: &str) {
		self.set_value(id, value);
		let element = self.document.get_element_by_id(id).unwrap();
		element.dispatch_event(&web_sys::Event::new(event).unwrap()).unwrap();
	}

	pub fn click(&self, id: &str) {
		self.document.get_element_by_id(id).unwrap().dyn_into::<web_sys::HtmlElement>().unwrap().click();
	}
}

pub async fn sleep(millis: u32) {
	gloo_timers::future::TimeoutFuture::new(millis).await;
}
