//! Session expiry shows up as a redirect to the login resource.

use tracing::{error, info, instrument};
use url::Url;

use crate::{history::Navigation, query::redact};

/// Whether `url`'s path is (or ends in) the login resource `login_path`.
///
/// Trailing slashes are ignored on both sides. `url` may be absolute or origin-relative.
#[must_use]
pub fn is_login_location(url: &str, login_path: &str) -> bool {
	let login = login_path.trim_end_matches('/');
	if login.is_empty() {
		return false;
	}

	let parsed = Url::parse(url).or_else(|_| Url::parse("http://localhost/").and_then(|base| base.join(url)));
	let path = match &parsed {
		Ok(parsed) => parsed.path(),
		Err(_) => return false,
	};
	let path = path.trim_end_matches('/');

	match path.strip_suffix(login) {
		Some(prefix) => prefix.is_empty() || prefix.ends_with('/') || login.starts_with('/'),
		None => false,
	}
}

/// Abandons the partial update and lets the browser load the login page for real.
#[instrument(skip(navigation, final_url), fields(url = %redact(final_url)))]
pub fn escalate(navigation: &dyn Navigation, final_url: &str) {
	info!("Session expired; navigating to the login page.");
	if let Err(error) = navigation.navigate(final_url) {
		error!("Failed to navigate to the login page: {:?}", error);
	}
}
