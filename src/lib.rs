#![doc(html_root_url = "https://docs.rs/live-search-dom/0.0.1")]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

#[cfg(doctest)]
pub mod readme {
	doc_comment::doctest!("../README.md");
}

pub mod binder;
pub mod config;
pub mod controller;
pub mod debounce;
pub mod expiry;
pub mod fetch;
pub mod history;
pub mod query;
pub mod registry;
pub mod session;
pub mod swap;

pub use config::Config;
pub use controller::{install_live_search, CycleEnd, LiveSearch, Phase, UpdateError};
pub use query::PageRequest;
