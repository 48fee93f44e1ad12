//! The polling feed of management entities the topology view consumes.

use log::debug;

use super::entity::Snapshot;

/// One entity type to fetch, optionally narrowed to some attributes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntitySpec {
	pub entity: String,
	pub attrs: Vec<String>,
	/// Fetch even when a copy is already cached.
	pub force: bool,
}

impl EntitySpec {
	pub fn new(entity: &str) -> Self {
		Self {
			entity: entity.to_string(),
			attrs: Vec::new(),
			force: false,
		}
	}

	pub fn attrs(mut self, attrs: &[&str]) -> Self {
		self.attrs = attrs.iter().map(|a| a.to_string()).collect();
		self
	}

	pub fn forced(mut self) -> Self {
		self.force = true;
		self
	}
}

/// Handle for an `ensure_entities` request, echoed back when it completes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ticket(pub u64);

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SourceEvent {
	/// A background poll finished; fired once per registered action name.
	Updated(String),
	/// The entities asked for under this ticket are now in `node_info`.
	Ready(Ticket),
}

/// An eventually consistent, polled view of every router's entities.
///
/// Requests never block: results and poll completions come back as events
/// from [`SnapshotSource::poll`], which the owner calls from its event loop.
pub trait SnapshotSource {
	fn node_info(&self) -> &Snapshot;

	fn ensure_entities(&mut self, keys: &[String], specs: &[EntitySpec]) -> Ticket;

	fn ensure_all_entities(&mut self, specs: &[EntitySpec]) -> Ticket {
		let keys: Vec<String> = self.node_info().keys().map(str::to_string).collect();
		self.ensure_entities(&keys, specs)
	}

	fn add_updated_action(&mut self, name: &str);
	fn del_updated_action(&mut self, name: &str);

	/// Entities refreshed on every background poll.
	fn set_update_entities(&mut self, specs: Vec<EntitySpec>);
	fn add_update_entities(&mut self, spec: EntitySpec);

	fn start_updating(&mut self, immediate: bool);
	fn stop_updating(&mut self);

	fn poll(&mut self, now_ms: f64) -> Vec<SourceEvent>;
}

struct Request {
	ticket: Ticket,
	keys: Vec<String>,
	specs: Vec<EntitySpec>,
}

/// A source backed by an in-memory "backend" snapshot that a producer
/// mutates. The console's view only sees the entities it has asked for,
/// copied across on ensure requests and on each update interval.
///
/// Attribute narrowing is not applied; whole tables are copied.
pub struct MemorySource {
	backend: Snapshot,
	view: Snapshot,
	interval_ms: f64,
	next_due: Option<f64>,
	updating: bool,
	update_entities: Vec<EntitySpec>,
	actions: Vec<String>,
	requests: Vec<Request>,
	next_ticket: u64,
}

impl MemorySource {
	pub fn new(interval_ms: f64) -> Self {
		Self {
			backend: Snapshot::new(),
			view: Snapshot::new(),
			interval_ms,
			next_due: None,
			updating: false,
			update_entities: Vec::new(),
			actions: Vec::new(),
			requests: Vec::new(),
			next_ticket: 0,
		}
	}

	#[cfg(test)]
	pub fn backend_mut(&mut self) -> &mut Snapshot {
		&mut self.backend
	}

	pub fn set_backend(&mut self, snapshot: Snapshot) {
		self.backend = snapshot;
	}

	#[cfg(test)]
	pub fn is_updating(&self) -> bool {
		self.updating
	}

	#[cfg(test)]
	pub fn actions(&self) -> &[String] {
		&self.actions
	}

	fn copy_entities(&mut self, key: &str, entities: &[String]) {
		let Some(source) = self.backend.get(key) else {
			return;
		};
		let tables: Vec<_> = entities
			.iter()
			.filter_map(|e| source.get(e).map(|t| (e.clone(), t.clone())))
			.collect();
		if self.view.get(key).is_none() {
			self.view.insert(key, Default::default());
		}
		for (entity, table) in tables {
			self.view.set_entity(key, &entity, table);
		}
	}

	fn refresh(&mut self) {
		let gone: Vec<String> = self
			.view
			.keys()
			.filter(|k| self.backend.get(k).is_none())
			.map(str::to_string)
			.collect();
		for key in gone {
			debug!("router {key} left the network");
			self.view.remove(&key);
		}
		let entities: Vec<String> = self.update_entities.iter().map(|s| s.entity.clone()).collect();
		let keys: Vec<String> = self.backend.keys().map(str::to_string).collect();
		for key in keys {
			self.copy_entities(&key, &entities);
		}
	}
}

impl SnapshotSource for MemorySource {
	fn node_info(&self) -> &Snapshot {
		&self.view
	}

	fn ensure_entities(&mut self, keys: &[String], specs: &[EntitySpec]) -> Ticket {
		self.next_ticket += 1;
		let ticket = Ticket(self.next_ticket);
		self.requests.push(Request {
			ticket,
			keys: keys.to_vec(),
			specs: specs.to_vec(),
		});
		ticket
	}

	/// Every router the backend knows, not just the ones already in view.
	fn ensure_all_entities(&mut self, specs: &[EntitySpec]) -> Ticket {
		let keys: Vec<String> = self.backend.keys().map(str::to_string).collect();
		self.ensure_entities(&keys, specs)
	}

	fn add_updated_action(&mut self, name: &str) {
		if !self.actions.iter().any(|a| a == name) {
			self.actions.push(name.to_string());
		}
	}

	fn del_updated_action(&mut self, name: &str) {
		self.actions.retain(|a| a != name);
	}

	fn set_update_entities(&mut self, specs: Vec<EntitySpec>) {
		self.update_entities = specs;
	}

	fn add_update_entities(&mut self, spec: EntitySpec) {
		if !self.update_entities.iter().any(|s| s.entity == spec.entity) {
			self.update_entities.push(spec);
		}
	}

	fn start_updating(&mut self, immediate: bool) {
		self.updating = true;
		self.next_due = immediate.then_some(f64::NEG_INFINITY);
	}

	fn stop_updating(&mut self) {
		self.updating = false;
		self.next_due = None;
	}

	fn poll(&mut self, now_ms: f64) -> Vec<SourceEvent> {
		let mut events = Vec::new();
		for request in std::mem::take(&mut self.requests) {
			let entities: Vec<String> = request.specs.iter().map(|s| s.entity.clone()).collect();
			for key in &request.keys {
				self.copy_entities(key, &entities);
			}
			events.push(SourceEvent::Ready(request.ticket));
		}

		if !self.updating {
			return events;
		}
		match self.next_due {
			None => self.next_due = Some(now_ms + self.interval_ms),
			Some(due) if now_ms >= due => {
				self.refresh();
				self.next_due = Some(now_ms + self.interval_ms);
				events.extend(self.actions.iter().cloned().map(SourceEvent::Updated));
			}
			Some(_) => {}
		}
		events
	}
}
