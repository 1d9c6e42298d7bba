//! Cancellable delayed actions, one pending timer per scope.

use crate::registry::ElementKey;
use core::fmt;
use gloo_timers::callback::Timeout;
use hashbrown::HashMap;
use std::cell::RefCell;
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
	/// A single free-text input.
	Input(ElementKey),
	/// All filter controls of one form.
	Filters(ElementKey),
}

impl Scope {
	fn form(self) -> Option<ElementKey> {
		match self {
			Scope::Input(_) => None,
			Scope::Filters(form) => Some(form),
		}
	}

	fn element(self) -> ElementKey {
		match self {
			Scope::Input(element) | Scope::Filters(element) => element,
		}
	}
}

/// Holds at most one [`Timeout`] per [`Scope`].
///
/// Scheduling replaces (and thereby cancels) the scope's pending timer, so bursts collapse into the last action.
/// Fired timers stay in place until they are replaced, cancelled or [forgotten](`Debouncer::forget`).
#[derive(Default)]
pub struct Debouncer {
	pending: RefCell<HashMap<Scope, (Timeout, Option<ElementKey>)>>,
}

impl fmt::Debug for Debouncer {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Debouncer").field("scopes", &self.pending.borrow().len()).finish()
	}
}

impl Debouncer {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	/// Number of scopes with a timer, pending or fired.
	#[must_use]
	pub fn len(&self) -> usize {
		self.pending.borrow().len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Runs `action` after `millis` of quiet in `scope`.
	///
	/// `form` ties the scope to a form for [`Debouncer::cancel_form`].
	pub fn schedule(&self, scope: Scope, form: Option<ElementKey>, millis: u32, action: impl 'static + FnOnce()) {
		let timeout = Timeout::new(millis, action);
		let previous = self.pending.borrow_mut().insert(scope, (timeout, form.or_else(|| scope.form())));
		if previous.is_some() {
			trace!(?scope, "Debounce timer reset.");
		}
		// `previous` is dropped here, after the borrow ends, which clears its timer.
	}

	/// Cancels every pending timer belonging to `form`.
	pub fn cancel_form(&self, form: ElementKey) {
		let removed: Vec<_> = {
			let mut pending = self.pending.borrow_mut();
			let scopes: Vec<Scope> = pending.iter().filter(|(_, (_, owner))| *owner == Some(form)).map(|(scope, _)| *scope).collect();
			scopes.into_iter().filter_map(|scope| pending.remove(&scope)).collect()
		};
		if !removed.is_empty() {
			trace!("Cancelled {} pending debounce timer(s).", removed.len());
		}
	}

	/// Drops the timers of scopes that belong to any of `elements`, whether by input or by form.
	pub fn forget(&self, elements: &[ElementKey]) {
		if elements.is_empty() {
			return;
		}
		let removed: Vec<_> = {
			let mut pending = self.pending.borrow_mut();
			let scopes: Vec<Scope> = pending
				.iter()
				.filter(|(scope, (_, owner))| elements.contains(&scope.element()) || owner.map_or(false, |owner| elements.contains(&owner)))
				.map(|(scope, _)| *scope)
				.collect();
			scopes.into_iter().filter_map(|scope| pending.remove(&scope)).collect()
		};
		if !removed.is_empty() {
			trace!("Forgot {} debounce scope(s) of detached elements.", removed.len());
		}
	}
}
