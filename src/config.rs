//! Per-deployment settings.
//!
//! The defaults match the markup contract of the server-rendered list pages.
//! A handful of values can be overridden per form through `data-live-*` attributes,
//! see [`Config::with_overrides_from`].

use tracing::warn;

pub const DEFAULT_FORM_SELECTOR: &str = "form[data-live='search']";
pub const DEFAULT_QUERY_FIELD: &str = "q";
pub const DEFAULT_PAGE_PARAM: &str = "page";
pub const DEFAULT_ROWS_ID: &str = "list-body";
pub const DEFAULT_PAGINATION_ID: &str = "list-pagination";
pub const DEFAULT_LABEL_ID: &str = "list-pagination-label";
pub const DEFAULT_MARKER_HEADER: (&str, &str) = ("X-Requested-With", "XMLHttpRequest");
pub const DEFAULT_TEXT_DEBOUNCE_MS: u32 = 300;
pub const DEFAULT_FILTER_DEBOUNCE_MS: u32 = 120;
pub const DEFAULT_LOGIN_PATH: &str = "/login/";
pub const DEFAULT_BUSY_CURSOR: &str = "progress";

/// Name of the bubbling [***CustomEvent***](https://developer.mozilla.org/en-US/docs/Web/API/CustomEvent) dispatched on the live form whenever an update fails.
pub const ERROR_EVENT: &str = "live-search:error";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
	/// Selects the live search form within the document.
	pub form_selector: String,
	/// Name of the free-text field. Clearing it resets the listing.
	pub query_field: String,
	pub page_param: String,
	/// Identifiers shared between the live document and partial responses.
	pub fragment_ids: Vec<String>,
	/// The fragment that contains pagination links. Clicks are delegated here.
	pub pagination_id: String,
	pub marker_header_name: String,
	pub marker_header_value: String,
	pub text_debounce_ms: u32,
	pub filter_debounce_ms: u32,
	pub login_path: String,
	pub busy_cursor: String,
	/// Fetch the unfiltered listing right after installation if the free-text field is empty.
	pub refresh_on_load: bool,
}

impl Default for Config {
	fn default() -> Self {
		Self {
			form_selector: DEFAULT_FORM_SELECTOR.to_owned(),
			query_field: DEFAULT_QUERY_FIELD.to_owned(),
			page_param: DEFAULT_PAGE_PARAM.to_owned(),
			fragment_ids: [DEFAULT_ROWS_ID, DEFAULT_PAGINATION_ID, DEFAULT_LABEL_ID].iter().map(|&id| id.to_owned()).collect(),
			pagination_id: DEFAULT_PAGINATION_ID.to_owned(),
			marker_header_name: DEFAULT_MARKER_HEADER.0.to_owned(),
			marker_header_value: DEFAULT_MARKER_HEADER.1.to_owned(),
			text_debounce_ms: DEFAULT_TEXT_DEBOUNCE_MS,
			filter_debounce_ms: DEFAULT_FILTER_DEBOUNCE_MS,
			login_path: DEFAULT_LOGIN_PATH.to_owned(),
			busy_cursor: DEFAULT_BUSY_CURSOR.to_owned(),
			refresh_on_load: false,
		}
	}
}

impl Config {
	/// Applies `data-live-debounce`, `data-live-filter-debounce` and `data-live-login-path` from the given form element.
	#[must_use]
	pub fn with_overrides_from(self, form: &web_sys::Element) -> Self {
		self.with_overrides(|name| form.get_attribute(name))
	}

	/// Same as [`Config::with_overrides_from`], but reads attributes through `attribute`.
	#[must_use]
	pub fn with_overrides(mut self, attribute: impl Fn(&str) -> Option<String>) -> Self {
		if let Some(value) = attribute("data-live-debounce") {
			match parse_millis(&value) {
				Some(ms) => self.text_debounce_ms = ms,
				None => warn!("Ignoring unparseable `data-live-debounce` value {:?}.", value),
			}
		}
		if let Some(value) = attribute("data-live-filter-debounce") {
			match parse_millis(&value) {
				Some(ms) => self.filter_debounce_ms = ms,
				None => warn!("Ignoring unparseable `data-live-filter-debounce` value {:?}.", value),
			}
		}
		if let Some(value) = attribute("data-live-login-path") {
			let value = value.trim();
			if value.starts_with('/') {
				self.login_path = value.to_owned();
			} else {
				warn!("Ignoring `data-live-login-path` {:?}: Expected an absolute path.", value);
			}
		}
		self
	}
}

fn parse_millis(value: &str) -> Option<u32> {
	value.trim().trim_end_matches("ms").trim_end().parse().ok()
}
