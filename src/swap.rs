//! Splicing server-rendered fragments into the live document.

use tracing::{debug, error, instrument, trace, trace_span};
use wasm_bindgen::{JsCast, JsValue};

/// Replaces the contents of named regions with their counterparts from a partial response.
///
/// The live wrapper elements themselves are kept, so listeners delegated to them survive a swap.
/// Their attributes (other than `id`) are reconciled with the response.
#[derive(Debug, Clone)]
pub struct FragmentSwapper {
	ids: Vec<String>,
}

impl FragmentSwapper {
	#[must_use]
	pub fn new(ids: impl IntoIterator<Item = impl Into<String>>) -> Self {
		Self {
			ids: ids.into_iter().map(Into::into).collect(),
		}
	}

	#[must_use]
	pub fn ids(&self) -> &[String] {
		&self.ids
	}

	/// Parses `html` as an inert document and swaps every fragment present in both it and `document`.
	///
	/// Returns the identifiers that were replaced, in the order they were configured.
	/// A fragment missing on either side is skipped and its live region stays as it was.
	/// Applying the same `html` twice leaves the same DOM as applying it once.
	///
	/// # Errors
	///
	/// Iff `html` can't be parsed at all, in which case nothing was modified.
	#[instrument(skip(self, document, html), fields(html_len = html.len()))]
	pub fn apply(&self, document: &web_sys::Document, html: &str) -> Result<Vec<String>, JsValue> {
		let parsed = web_sys::DomParser::new()?.parse_from_string(html, web_sys::SupportedType::TextHtml)?;

		let mut applied = Vec::with_capacity(self.ids.len());
		for id in &self.ids {
			let span = trace_span!("Swapping fragment", id = id.as_str());
			let _enter = span.enter();

			let incoming = match parsed.get_element_by_id(id) {
				Some(incoming) => incoming,
				None => {
					debug!("Fragment missing from the response; leaving the live region untouched.");
					continue;
				}
			};
			let live = match document.get_element_by_id(id) {
				Some(live) => live,
				None => {
					debug!("No live region to swap into.");
					continue;
				}
			};

			if let Err(error) = neutralize(&incoming) {
				error!("Could not strip active content from the fragment, skipping it: {:?}", error);
				continue;
			}
			reconcile_attributes(&live, &incoming);
			live.set_inner_html(&incoming.inner_html());
			trace!("Swapped.");
			applied.push(id.clone());
		}
		Ok(applied)
	}
}

/// Removes `<script>` elements, inline event handler attributes and `javascript:` URLs from `root` and its descendants.
fn neutralize(root: &web_sys::Element) -> Result<(), JsValue> {
	let scripts = root.query_selector_all("script")?;
	for i in 0..scripts.length() {
		if let Some(script) = scripts.item(i) {
			if let Some(parent) = script.parent_node() {
				parent.remove_child(&script)?;
			}
		}
	}

	strip_active_attributes(root);
	let descendants = root.query_selector_all("*")?;
	for i in 0..descendants.length() {
		if let Some(element) = descendants.item(i).and_then(|node| node.dyn_into::<web_sys::Element>().ok()) {
			strip_active_attributes(&element);
		}
	}
	Ok(())
}

const URL_ATTRIBUTES: &[&str] = &["href", "src", "action", "formaction", "xlink:href"];

fn strip_active_attributes(element: &web_sys::Element) {
	for name in attribute_names(element) {
		let handler = name.len() > 2 && name.get(..2).map_or(false, |prefix| prefix.eq_ignore_ascii_case("on"));
		let script_url = URL_ATTRIBUTES.iter().any(|url_attribute| name.eq_ignore_ascii_case(url_attribute)) && element.get_attribute(&name).map_or(false, |value| is_script_url(&value));
		if handler || script_url {
			trace!(attribute = name.as_str(), "Stripping active attribute.");
			if let Err(error) = element.remove_attribute(&name) {
				error!("Failed to remove attribute {:?}: {:?}", name, error);
			}
		}
	}
}

/// Whether `value` uses the `javascript:` scheme, the way a browser would read it.
fn is_script_url(value: &str) -> bool {
	let scheme: String = value
		.chars()
		.skip_while(|c| c.is_ascii_whitespace() || c.is_ascii_control())
		.filter(|c| !matches!(c, '\t' | '\n' | '\r'))
		.take("javascript:".len())
		.collect();
	scheme.eq_ignore_ascii_case("javascript:")
}

fn reconcile_attributes(live: &web_sys::Element, incoming: &web_sys::Element) {
	for name in attribute_names(live) {
		if name != "id" && !incoming.has_attribute(&name) {
			if let Err(error) = live.remove_attribute(&name) {
				error!("Failed to remove attribute {:?}: {:?}", name, error);
			}
		}
	}

	let attributes = incoming.attributes();
	for i in 0..attributes.length() {
		let attribute = match attributes.item(i) {
			Some(attribute) => attribute,
			None => continue,
		};
		let name = attribute.name();
		if name == "id" {
			continue;
		}
		let value = attribute.value();
		if live.get_attribute(&name).as_deref() != Some(value.as_str()) {
			if let Err(error) = live.set_attribute(&name, &value) {
				error!("Failed to set attribute {:?}: {:?}", name, error);
			}
		}
	}
}

fn attribute_names(element: &web_sys::Element) -> Vec<String> {
	let attributes = element.attributes();
	(0..attributes.length()).filter_map(|i| attributes.item(i)).map(|attribute| attribute.name()).collect()
}
