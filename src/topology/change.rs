//! Decides, poll by poll, whether the topology needs a rebuild.
//!
//! This is a heuristic over eventually consistent polling data: an add and
//! a remove landing in the same poll can cancel out. Whatever is missed is
//! picked up on a later poll since the fingerprint is refreshed after every
//! acted-on change.

use std::collections::BTreeMap;

use super::entity::{CONNECTION, Snapshot};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Change {
	/// A router or connection went away; the graph can be redrawn right away.
	Removed,
	Unchanged,
	/// A router appeared; all of its entities are needed before drawing.
	Added,
}

/// Connection count per router key, for routers that reported connections.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Fingerprint(BTreeMap<String, usize>);

impl Fingerprint {
	pub fn capture(snapshot: &Snapshot) -> Self {
		Self(
			snapshot
				.iter()
				.filter_map(|(key, entities)| {
					entities
						.get(CONNECTION)
						.map(|table| (key.to_string(), table.len()))
				})
				.collect(),
		)
	}

	pub fn len(&self) -> usize {
		self.0.len()
	}

	pub fn connections(&self, key: &str) -> Option<usize> {
		self.0.get(key).copied()
	}

	/// Classify `snapshot` against this (earlier) fingerprint.
	/// `router_nodes` is the number of router nodes currently drawn.
	pub fn classify(&self, snapshot: &Snapshot, router_nodes: usize) -> Change {
		let current = Fingerprint::capture(snapshot);
		if router_nodes > current.len() {
			return Change::Removed;
		}
		if current.len() != self.len() {
			return if current.len() > self.len() {
				Change::Added
			} else {
				Change::Removed
			};
		}
		for (key, count) in &current.0 {
			match self.connections(key) {
				None => return Change::Added,
				Some(saved) if saved != *count => return Change::Removed,
				Some(_) => {}
			}
		}
		Change::Unchanged
	}
}

/// Holds the fingerprint of the last snapshot the graph was built from.
#[derive(Clone, Debug, Default)]
pub struct ChangeDetector {
	saved: Fingerprint,
}

impl ChangeDetector {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn detect(&self, snapshot: &Snapshot, router_nodes: usize) -> Change {
		self.saved.classify(snapshot, router_nodes)
	}

	pub fn save(&mut self, snapshot: &Snapshot) {
		self.saved = Fingerprint::capture(snapshot);
	}
}
