//! Canonical query derivation.
//!
//! Everything except [`FormSnapshot::load`] is plain string work, so the URL rules can be checked without a browser.

use std::borrow::Cow;
use tracing::{instrument, trace};
use url::{form_urlencoded, Url};
use wasm_bindgen::JsValue;

/// Which page a Target URL should request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageRequest {
	/// Typing, a filter change or a submit. The page is forced back to the first one.
	Reset,
	/// A pagination click. Active filters are kept, the page is taken as is.
	Page(u32),
}

/// The named, non-empty form fields in canonical order.
///
/// Pairs are sorted by name, then value, so the same selections in any document order give the same query.
/// The page parameter, if any, always comes last.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryState {
	pairs: Vec<(String, String)>,
}

impl QueryState {
	#[must_use]
	pub fn derive(fields: &[(String, String)], query_field: &str, page_param: &str, request: PageRequest) -> Self {
		let query_is_empty = fields.iter().filter(|(name, _)| name == query_field).all(|(_, value)| value.trim().is_empty());
		if request == PageRequest::Reset && query_is_empty {
			// Full, unfiltered listing.
			return Self::default();
		}

		let mut pairs: Vec<(String, String)> = fields
			.iter()
			.filter(|(name, _)| !name.is_empty() && name != page_param)
			.filter_map(|(name, value)| {
				let value = if name == query_field { value.trim() } else { value.as_str() };
				(!value.is_empty()).then(|| (name.clone(), value.to_owned()))
			})
			.collect();
		pairs.sort();

		let page = match request {
			PageRequest::Reset => 1,
			PageRequest::Page(page) => page.max(1),
		};
		if !pairs.is_empty() || page != 1 {
			pairs.push((page_param.to_owned(), page.to_string()));
		}
		Self { pairs }
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.pairs.is_empty()
	}

	#[must_use]
	pub fn pairs(&self) -> &[(String, String)] {
		&self.pairs
	}

	/// `application/x-www-form-urlencoded`, without the leading `?`.
	#[must_use]
	pub fn serialize(&self) -> String {
		form_urlencoded::Serializer::new(String::new()).extend_pairs(&self.pairs).finish()
	}

	/// Combines `base_path` with this query. An empty query yields the bare path.
	#[must_use]
	pub fn target_url(&self, base_path: &str) -> String {
		if self.is_empty() {
			base_path.to_owned()
		} else {
			format!("{}?{}", base_path, self.serialize())
		}
	}
}

/// The live form's values at one point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormSnapshot {
	/// Path of the form's submission target, or of the current document.
	pub base_path: String,
	pub fields: Vec<(String, String)>,
}

impl FormSnapshot {
	/// Reads the successful controls of `form` the way a submission would.
	///
	/// File inputs are skipped.
	///
	/// # Errors
	///
	/// Iff the browser refuses to construct or iterate the form's [***FormData***](https://developer.mozilla.org/en-US/docs/Web/API/FormData).
	#[instrument(skip(form))]
	pub fn load(form: &web_sys::HtmlFormElement) -> Result<Self, JsValue> {
		let data = web_sys::FormData::new_with_form(form)?;
		let mut fields = Vec::new();
		if let Some(entries) = js_sys::try_iter(&data)? {
			for entry in entries {
				let entry = js_sys::Array::from(&entry?);
				if let (Some(name), Some(value)) = (entry.get(0).as_string(), entry.get(1).as_string()) {
					fields.push((name, value));
				}
			}
		}

		let base_path = base_path(&form.action()).unwrap_or_else(|| {
			form.owner_document()
				.and_then(|document| document.location())
				.and_then(|location| location.pathname().ok())
				.unwrap_or_else(|| "/".to_owned())
		});
		trace!(fields = fields.len(), %base_path, "Loaded form snapshot.");
		Ok(Self { base_path, fields })
	}

	/// Builds the Target URL. Identical snapshots always produce identical strings.
	#[must_use]
	pub fn target_url(&self, query_field: &str, page_param: &str, request: PageRequest) -> String {
		QueryState::derive(&self.fields, query_field, page_param, request).target_url(&self.base_path)
	}
}

/// The path of an absolute URL, without query or fragment.
#[must_use]
pub fn base_path(absolute: &str) -> Option<String> {
	let url = Url::parse(absolute).ok()?;
	url.has_host().then(|| url.path().to_owned())
}

/// Extracts the requested page from a pagination link.
///
/// `href` is resolved against `document_url`. A missing or unparseable page means the first one.
#[must_use]
pub fn page_from_href(href: &str, document_url: &str, page_param: &str) -> u32 {
	Url::parse(document_url)
		.and_then(|base| base.join(href))
		.ok()
		.and_then(|url| url.query_pairs().find(|(name, _)| name == page_param).and_then(|(_, value)| value.trim().parse().ok()))
		.map_or(1, |page: u32| page.max(1))
}

/// Removes the query (search terms, filter values) from `url` unless `dangerous-logging` is enabled.
pub(crate) fn redact(url: &str) -> Cow<'_, str> {
	if cfg!(feature = "dangerous-logging") {
		return Cow::Borrowed(url);
	}
	match url.split_once('?') {
		Some((path, _)) => Cow::Owned(format!("{}?…", path)),
		None => Cow::Borrowed(url),
	}
}
