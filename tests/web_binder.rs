use live_search_dom::registry::Binding;
use wasm_bindgen::JsCast;
use wasm_bindgen_test::{wasm_bindgen_test, wasm_bindgen_test_configure};

wasm_bindgen_test_configure!(run_in_browser);

mod web_support_;
use web_support_::{install, install_on, listing, sleep, test_config, FIXTURE};

#[wasm_bindgen_test]
async fn binding_again_attaches_nothing() {
	let harness = install();
	let root = harness.document.document_element().unwrap();
	let bound = harness.live_search.binder().registry().len();
	// Submit, text input, select, pagination.
	assert_eq!(bound, 4);

	assert_eq!(harness.live_search.bind(&root), 0);
	assert_eq!(harness.live_search.bind(&harness.document.get_element_by_id("list-pagination").unwrap()), 0);
	assert_eq!(harness.live_search.binder().registry().len(), bound);

	let form = harness.document.query_selector("form").unwrap().unwrap();
	assert!(harness.live_search.binder().registry().is_bound(&form, Binding::Submit));

	harness.set_value("q", "abc");
	form.dyn_into::<web_sys::HtmlFormElement>().unwrap().request_submit().unwrap();
	sleep(20).await;
	assert_eq!(harness.transport.requests(), ["/items/?q=abc&page=1"]);
}

#[wasm_bindgen_test]
async fn typing_is_debounced_into_one_request() {
	let harness = install();
	for value in ["a", "ab", "abc"] {
		harness.type_value("q", value, "input");
		sleep(5).await;
	}
	assert!(harness.transport.requests().is_empty());

	sleep(120).await;
	assert_eq!(harness.transport.requests(), ["/items/?q=abc&page=1"]);
	assert_eq!(*harness.navigation.replaced.borrow(), ["/items/?q=abc&page=1"]);
}

#[wasm_bindgen_test]
async fn submit_cancels_pending_typing() {
	let harness = install();
	harness.type_value("q", "abc", "input");
	harness.document.query_selector("form").unwrap().unwrap().dyn_into::<web_sys::HtmlFormElement>().unwrap().request_submit().unwrap();
	sleep(120).await;
	assert_eq!(harness.transport.requests(), ["/items/?q=abc&page=1"]);
}

#[wasm_bindgen_test]
async fn filter_changes_go_back_to_the_first_page() {
	let harness = install();
	harness.set_value("q", "abc");
	harness.type_value("status", "active", "change");
	sleep(60).await;
	assert_eq!(harness.transport.requests(), ["/items/?q=abc&status=active&page=1"]);
}

#[wasm_bindgen_test]
async fn rapid_filter_changes_coalesce() {
	let harness = install();
	harness.set_value("q", "abc");
	harness.type_value("status", "active", "change");
	harness.type_value("status", "", "change");
	harness.type_value("status", "active", "change");
	sleep(60).await;
	assert_eq!(harness.transport.requests(), ["/items/?q=abc&status=active&page=1"]);
}

#[wasm_bindgen_test]
async fn a_swapped_in_form_is_bound_and_the_old_one_released() {
	let fixture = FIXTURE.replacen("<form", "<div id=\"search-panel\"><form", 1).replacen("</form>", "</form></div>", 1);
	let mut config = test_config();
	config.fragment_ids.insert(0, "search-panel".to_owned());
	let harness = install_on(&fixture, config);
	let bound = harness.live_search.binder().registry().len();
	let old_form = harness.document.query_selector("form").unwrap().unwrap();

	let panel = "<div id=\"search-panel\"><form data-live=\"search\" action=\"/items/\" method=\"get\"><input type=\"search\" name=\"q\" id=\"q\" value=\"abc\"><select name=\"status\" id=\"status\"><option value=\"\">All</option><option value=\"active\">Active</option></select></form></div>";
	let response = listing("<tr><td>abc</td></tr>", None, "abc").replacen("<body>", &format!("<body>{}", panel), 1);
	harness.transport.reply_html("/items/?q=abc&page=1", &response);

	harness.type_value("q", "abc", "input");
	sleep(120).await;

	let new_form = harness.document.query_selector("form").unwrap().unwrap();
	assert!(!old_form.is_connected());
	assert!(!harness.live_search.binder().registry().is_bound(&old_form, Binding::Submit));
	assert!(harness.live_search.binder().registry().is_bound(&new_form, Binding::Submit));
	assert_eq!(harness.live_search.binder().registry().len(), bound);
	assert!(harness.live_search.binder().debouncer().is_empty());

	harness.type_value("q", "abcd", "input");
	sleep(120).await;
	assert_eq!(harness.transport.requests(), ["/items/?q=abc&page=1", "/items/?q=abcd&page=1"]);
}

#[wasm_bindgen_test]
async fn pagination_keeps_active_filters() {
	let harness = install();
	harness.set_value("status", "active");
	harness.click("page-3");
	sleep(20).await;
	assert_eq!(harness.transport.requests(), ["/items/?status=active&page=3"]);
	assert_eq!(*harness.navigation.replaced.borrow(), ["/items/?status=active&page=3"]);
}

#[wasm_bindgen_test]
async fn links_from_a_swapped_pagination_are_live() {
	let harness = install();
	harness.set_value("q", "abc");
	harness.transport.reply_html("/items/?q=abc&page=1", &listing("<tr><td>abc</td></tr>", Some("<a id=\"page-5\" href=\"?q=abc&amp;page=5\">5</a>"), "Page 1 of 5"));

	harness.live_search.update(live_search_dom::PageRequest::Reset).await;
	let bound = harness.live_search.binder().registry().len();
	harness.click("page-5");
	sleep(20).await;

	assert_eq!(harness.transport.requests(), ["/items/?q=abc&page=1", "/items/?q=abc&page=5"]);
	assert_eq!(harness.live_search.binder().registry().len(), bound);
}

#[wasm_bindgen_test]
async fn modified_clicks_are_left_to_the_browser() {
	let harness = install();
	let init = web_sys::MouseEventInit::new();
	init.set_bubbles(true);
	init.set_cancelable(true);
	init.set_ctrl_key(true);
	let event = web_sys::MouseEvent::new_with_mouse_event_init_dict("click", &init).unwrap();
	// Cancel at the document so the test page stays put.
	let guard = wasm_bindgen::closure::Closure::wrap(Box::new(|event: web_sys::Event| event.prevent_default()) as Box<dyn FnMut(web_sys::Event)>);
	harness.document.add_event_listener_with_callback("click", guard.as_ref().unchecked_ref()).unwrap();

	harness.document.get_element_by_id("page-2").unwrap().dispatch_event(&event).unwrap();
	sleep(20).await;

	harness.document.remove_event_listener_with_callback("click", guard.as_ref().unchecked_ref()).unwrap();
	assert!(harness.transport.requests().is_empty());
}
