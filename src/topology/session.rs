//! The live topology view: rebuilds the graph as the network changes and
//! tracks what the user has selected, pinned and is hovering over.

use std::collections::HashMap;

use log::{debug, info};

use super::builder::GraphBuilder;
use super::change::{Change, ChangeDetector};
use super::entity::{CONNECTION, LISTENER, ROUTER, ROUTER_LINK, ROUTER_NODE};
use super::layout::{ForceParams, RestartSchedule, Simulation, Tick, Viewport};
use super::model::{Graph, NodeKind};
use super::next_hop::{NextHopTable, highlight_route};
use super::positions::PositionStore;
use super::source::{EntitySpec, SnapshotSource, SourceEvent, Ticket};
use super::tooltip;

/// Update action that drives change detection.
pub const TOPOLOGY_ACTION: &str = "topology";
/// Update action that refreshes an open link popup.
pub const POPUP_ACTION: &str = "connectionPopupHTML";
/// Update action registered by the client statistics panel.
pub const NORMALS_STATS_ACTION: &str = "normalsStats";

/// What an outstanding `ensure_entities` ticket was for.
#[derive(Clone, Debug, PartialEq, Eq)]
enum Pending {
	InitialUpdate,
	Unknowns,
	NextHop,
	RouterTooltip(String),
	LinkPopup,
}

fn connection_spec() -> EntitySpec {
	EntitySpec::new(CONNECTION)
}

fn router_node_spec() -> EntitySpec {
	EntitySpec::new(ROUTER_NODE).attrs(&["id", "nextHop"])
}

pub struct TopologySession {
	graph: Graph,
	detector: ChangeDetector,
	simulation: Simulation,
	restarts: RestartSchedule,
	positions: Box<dyn PositionStore>,
	viewport: Viewport,
	/// When false, the next tick stops the layout after a single step.
	animate: bool,
	pending: HashMap<Ticket, Pending>,
	next_hops: NextHopTable,
	selected: Option<String>,
	/// Node under the pointer.
	hovered: Option<String>,
	/// Hovered router a route is traced to; only set while something is selected.
	mouseover: Option<String>,
	mousedown: Option<String>,
	hovered_link: Option<String>,
	tooltip: Option<String>,
	tooltip_version: u64,
	version: u64,
}

impl TopologySession {
	pub fn new(viewport: Viewport, positions: Box<dyn PositionStore>) -> Self {
		Self {
			graph: Graph::new(),
			detector: ChangeDetector::new(),
			simulation: Simulation::new(ForceParams::new(0), viewport),
			restarts: RestartSchedule::default(),
			positions,
			viewport,
			animate: false,
			pending: HashMap::new(),
			next_hops: NextHopTable::default(),
			selected: None,
			hovered: None,
			mouseover: None,
			mousedown: None,
			hovered_link: None,
			tooltip: None,
			tooltip_version: 0,
			version: 0,
		}
	}

	pub fn graph(&self) -> &Graph {
		&self.graph
	}

	/// Bumped every time the graph is rebuilt.
	pub fn version(&self) -> u64 {
		self.version
	}

	pub fn tooltip(&self) -> Option<&str> {
		self.tooltip.as_deref()
	}

	/// Bumped every time the tooltip text changes.
	pub fn tooltip_version(&self) -> u64 {
		self.tooltip_version
	}

	pub fn selected(&self) -> Option<usize> {
		self.selected
			.as_deref()
			.and_then(|name| self.graph.node_by_name(name))
	}

	pub fn mouseover(&self) -> Option<usize> {
		self.mouseover
			.as_deref()
			.and_then(|name| self.graph.node_by_name(name))
	}

	pub fn hovered_link(&self) -> Option<usize> {
		let uid = self.hovered_link.as_deref()?;
		self.graph.links.iter().position(|l| l.uid == uid)
	}

	/// Kick off the first fetch and the background polling.
	pub fn start(&mut self, source: &mut dyn SnapshotSource) {
		self.setup_initial_update(source);
		source.start_updating(false);
	}

	/// Ask every router for its connections before the first draw.
	pub fn setup_initial_update(&mut self, source: &mut dyn SnapshotSource) {
		let ticket = source.ensure_all_entities(&[connection_spec()]);
		self.pending.insert(ticket, Pending::InitialUpdate);
	}

	fn handle_initial_update(&mut self, source: &mut dyn SnapshotSource) {
		source.set_update_entities(vec![connection_spec()]);
		self.detector.save(source.node_info());
		self.build_initial_graph(source);
		source.add_update_entities(router_node_spec());
		source.add_updated_action(TOPOLOGY_ACTION);
	}

	fn build_initial_graph(&mut self, source: &mut dyn SnapshotSource) {
		self.save_positions();
		let build = GraphBuilder::new(self.positions.as_ref(), self.viewport).build(source.node_info());
		let unknown_keys = build.unknown_keys();
		self.graph = build.graph;
		self.animate |= build.has_new_nodes;
		self.next_hops = NextHopTable::from_snapshot(source.node_info());
		self.save_positions();

		let params = ForceParams::new(self.graph.router_count());
		self.simulation.set_params(params);
		self.simulation.set_viewport(self.viewport);
		self.simulation.start();
		self.restarts = RestartSchedule::new(params.restart_budget());
		self.version += 1;
		info!(
			"topology drawn with {} nodes and {} links",
			self.graph.nodes.len(),
			self.graph.links.len()
		);

		if self.selected.is_some() && self.mouseover.is_some() {
			self.request_next_hops(source);
		}
		if !unknown_keys.is_empty() {
			self.request_unknowns(source, &unknown_keys);
		}
	}

	fn rebuild(&mut self, source: &dyn SnapshotSource) -> Vec<String> {
		self.save_positions();
		let build = GraphBuilder::new(self.positions.as_ref(), self.viewport).build(source.node_info());
		let keys = build.unknown_keys();
		self.graph = build.graph;
		self.animate = build.has_new_nodes;
		self.version += 1;
		keys
	}

	fn request_unknowns(&mut self, source: &mut dyn SnapshotSource, keys: &[String]) {
		debug!("looking up link directions on {} routers", keys.len());
		let ticket = source.ensure_entities(
			keys,
			&[
				connection_spec().forced(),
				EntitySpec::new(ROUTER_LINK)
					.attrs(&["linkType", "connectionId", "linkDir"])
					.forced(),
			],
		);
		self.pending.insert(ticket, Pending::Unknowns);
	}

	fn on_unknowns_ready(&mut self, source: &mut dyn SnapshotSource) {
		let still_unknown = self.rebuild(source);
		if !still_unknown.is_empty() {
			debug!(
				"{} routers still have connections of unknown direction",
				still_unknown.len()
			);
		}
		self.animate = true;
		self.simulation.start();
	}

	fn on_topology_updated(&mut self, source: &mut dyn SnapshotSource) {
		self.next_hops = NextHopTable::from_snapshot(source.node_info());
		match self.detector.detect(source.node_info(), self.graph.router_count()) {
			Change::Added => {
				info!("router added, refetching topology");
				source.del_updated_action(TOPOLOGY_ACTION);
				self.animate = true;
				self.setup_initial_update(source);
			}
			Change::Removed => {
				info!("router or connection removed, redrawing");
				self.detector.save(source.node_info());
				let unknown_keys = self.rebuild(source);
				self.restarts = RestartSchedule::default();
				if self.selected().is_none() {
					self.selected = None;
				}
				if unknown_keys.is_empty() {
					self.simulation.start();
				} else {
					self.request_unknowns(source, &unknown_keys);
				}
			}
			Change::Unchanged => {}
		}
	}

	pub fn handle_events(&mut self, source: &mut dyn SnapshotSource, events: Vec<SourceEvent>) {
		for event in events {
			match event {
				SourceEvent::Updated(action) => match action.as_str() {
					TOPOLOGY_ACTION => self.on_topology_updated(source),
					POPUP_ACTION => self.refresh_link_popup(source),
					_ => {}
				},
				SourceEvent::Ready(ticket) => match self.pending.remove(&ticket) {
					Some(Pending::InitialUpdate) => self.handle_initial_update(source),
					Some(Pending::Unknowns) => self.on_unknowns_ready(source),
					Some(Pending::NextHop) => {
						self.next_hops = NextHopTable::from_snapshot(source.node_info());
						self.highlight();
					}
					Some(Pending::RouterTooltip(name)) => self.show_router_tooltip(source, &name),
					Some(Pending::LinkPopup) => self.refresh_link_popup(source),
					None => debug!("ignoring stale ticket {ticket:?}"),
				},
			}
		}
	}

	/// Run scheduled restarts that fall due at `now_ms`.
	pub fn advance(&mut self, now_ms: f64) {
		if self.restarts.due(now_ms) {
			self.simulation.start();
		}
	}

	pub fn tick(&mut self) -> Tick {
		let tick = self.simulation.tick(&mut self.graph);
		if tick == Tick::Running && !self.animate {
			self.animate = true;
			self.simulation.stop();
			self.save_positions();
			return Tick::Settled;
		}
		if tick == Tick::Settled {
			self.save_positions();
		}
		tick
	}

	pub fn resize(&mut self, viewport: Viewport) {
		self.viewport = viewport;
		self.simulation.set_viewport(viewport);
		self.simulation.start();
	}

	pub fn save_positions(&mut self) {
		for node in &self.graph.nodes {
			self.positions.set(&node.name, node.position());
		}
	}

	pub fn mouse_down(&mut self, node: usize) {
		self.mousedown = self.graph.nodes.get(node).map(|n| n.name.clone());
	}

	/// Move a node under the pointer; it stays where it is dropped.
	pub fn drag_to(&mut self, node: usize, x: f64, y: f64) {
		let Some(n) = self.graph.nodes.get_mut(node) else {
			return;
		};
		n.place(x, y);
		n.fixed = true;
		if !self.simulation.is_running() {
			self.simulation.start();
		}
	}

	/// Finish a press on `node`. A drag pins it; a plain click toggles selection.
	pub fn mouse_up(&mut self, node: usize, dragged: bool) {
		let Some(down) = self.mousedown.take() else {
			return;
		};
		let Some(name) = self.graph.nodes.get(node).map(|n| n.name.clone()) else {
			return;
		};
		if down != name {
			return;
		}
		if dragged {
			self.graph.set_fixed(&name, true);
			self.save_positions();
			return;
		}
		if self.selected.as_deref() == Some(name.as_str()) {
			self.selected = None;
		} else if self.graph.nodes[node].is_selectable() {
			self.selected = Some(name);
		}
		self.graph.clear_highlights();
	}

	/// Release a pinned node back to the layout.
	pub fn double_click(&mut self, node: usize) {
		let Some(n) = self.graph.nodes.get(node) else {
			return;
		};
		if !n.fixed {
			return;
		}
		let name = n.name.clone();
		self.set_fixed(&name, false);
		self.simulation.start();
	}

	pub fn set_fixed(&mut self, name: &str, fixed: bool) {
		self.graph.set_fixed(name, fixed);
		self.save_positions();
	}

	pub fn hover_node(&mut self, source: &mut dyn SnapshotSource, node: usize) {
		let Some(n) = self.graph.nodes.get(node) else {
			return;
		};
		let name = n.name.clone();
		let router_key = matches!(n.kind, NodeKind::Router).then(|| n.key.clone());
		let client_html = router_key.is_none().then(|| tooltip::client_tooltip(n));
		source.del_updated_action(POPUP_ACTION);
		self.hovered = Some(name.clone());
		self.hovered_link = None;
		if let Some(key) = router_key {
			let ticket = source.ensure_entities(
				&[key],
				&[
					EntitySpec::new(LISTENER).attrs(&["role", "port", "http"]),
					EntitySpec::new(ROUTER).attrs(&["name", "version", "hostName"]),
				],
			);
			self.pending.insert(ticket, Pending::RouterTooltip(name.clone()));
		} else {
			self.set_tooltip(client_html);
		}

		if self.mousedown.as_deref() == Some(name.as_str()) {
			return;
		}
		if self.selected.is_some() {
			self.graph.clear_highlights();
			self.mouseover = Some(name);
			self.request_next_hops(source);
		}
	}

	pub fn leave_node(&mut self) {
		self.hovered = None;
		self.set_tooltip(None);
		self.graph.clear_highlights();
		self.mouseover = None;
	}

	pub fn hover_link(&mut self, source: &mut dyn SnapshotSource, link: usize) {
		let Some(uid) = self.graph.links.get(link).map(|l| l.uid.clone()) else {
			return;
		};
		self.hovered = None;
		self.hovered_link = Some(uid);
		source.add_updated_action(POPUP_ACTION);
		let ticket = source.ensure_all_entities(&[
			EntitySpec::new(ROUTER_LINK).forced(),
			connection_spec(),
		]);
		self.pending.insert(ticket, Pending::LinkPopup);
		self.refresh_link_popup(source);
	}

	pub fn leave_link(&mut self, source: &mut dyn SnapshotSource) {
		source.del_updated_action(POPUP_ACTION);
		self.hovered_link = None;
		self.set_tooltip(None);
	}

	/// Stop polling and unregister every update action the view added.
	pub fn teardown(&mut self, source: &mut dyn SnapshotSource) {
		self.save_positions();
		source.set_update_entities(Vec::new());
		source.stop_updating();
		for action in [NORMALS_STATS_ACTION, TOPOLOGY_ACTION, POPUP_ACTION] {
			source.del_updated_action(action);
		}
		self.pending.clear();
		self.simulation.stop();
	}

	fn request_next_hops(&mut self, source: &mut dyn SnapshotSource) {
		let ticket = source.ensure_all_entities(&[router_node_spec()]);
		self.pending.insert(ticket, Pending::NextHop);
	}

	fn highlight(&mut self) {
		let (Some(selected), Some(hovered)) = (self.selected(), self.mouseover()) else {
			return;
		};
		self.graph.clear_highlights();
		if !highlight_route(&mut self.graph, &self.next_hops, selected, hovered) {
			debug!("no complete route between the selected and hovered routers");
		}
	}

	fn show_router_tooltip(&mut self, source: &dyn SnapshotSource, name: &str) {
		// the pointer moved on before the router answered
		if self.hovered.as_deref() != Some(name) {
			return;
		}
		let Some(node) = self.graph.node_by_name(name) else {
			return;
		};
		let html = tooltip::router_tooltip(source.node_info(), &self.graph.nodes[node]);
		if html.is_some() {
			self.set_tooltip(html);
		}
	}

	fn refresh_link_popup(&mut self, source: &dyn SnapshotSource) {
		let Some(link) = self.hovered_link() else {
			return;
		};
		let html = tooltip::connection_popup(&self.graph, source.node_info(), link);
		self.set_tooltip(Some(html));
	}

	fn set_tooltip(&mut self, html: Option<String>) {
		if self.tooltip != html {
			self.tooltip = html;
			self.tooltip_version += 1;
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::topology::entity::{EntityTable, Snapshot};
	use crate::topology::fixtures::*;
	use crate::topology::model::Cdir;
	use crate::topology::positions::MemoryPositions;
	use crate::topology::source::MemorySource;
	use serde_json::json;

	fn pump(session: &mut TopologySession, source: &mut MemorySource, now: f64) {
		let events = source.poll(now);
		session.handle_events(source, events);
	}

	fn started(snapshot: Snapshot) -> (TopologySession, MemorySource) {
		let mut source = MemorySource::new(1000.0);
		source.set_backend(snapshot);
		let mut session = TopologySession::new(Viewport::default(), Box::new(MemoryPositions::new()));
		session.start(&mut source);
		pump(&mut session, &mut source, 0.0);
		pump(&mut session, &mut source, 1.0);
		(session, source)
	}

	#[test]
	fn initial_update_resolves_directions_and_registers_actions() {
		let (session, source) = started(two_routers_with_sender());
		let graph = session.graph();
		assert_eq!(graph.nodes.len(), 3);
		assert_eq!(graph.links.len(), 2);
		assert_eq!(graph.nodes[2].cdir(), Cdir::In);
		assert_eq!(source.actions(), [TOPOLOGY_ACTION.to_string()]);
		assert!(session.simulation.is_running());
		assert_eq!(session.version(), 2);
	}

	#[test]
	fn removed_connection_redraws_without_the_client() {
		let (mut session, mut source) = started(two_routers_with_sender());
		source.set_backend(routers(vec![
			("A", vec![conn("1", "inter-router", "out", "B")], vec![]),
			("B", vec![conn("1", "inter-router", "in", "A")], vec![]),
		]));
		pump(&mut session, &mut source, 1000.0);
		assert_eq!(session.graph().nodes.len(), 2);
		assert_eq!(session.graph().links.len(), 1);
	}

	#[test]
	fn unchanged_poll_keeps_the_graph() {
		let (mut session, mut source) = started(two_routers_with_sender());
		let version = session.version();
		pump(&mut session, &mut source, 1000.0);
		assert_eq!(session.version(), version);
	}

	#[test]
	fn new_router_triggers_a_full_refetch() {
		let (mut session, mut source) = started(two_routers_with_sender());
		source.backend_mut().set_entity(
			&id_for("C"),
			CONNECTION,
			connections(vec![conn("1", "inter-router", "in", "B")]),
		);
		pump(&mut session, &mut source, 1000.0);
		assert!(source.actions().is_empty());
		pump(&mut session, &mut source, 1001.0);
		assert_eq!(session.graph().router_count(), 3);
		assert_eq!(source.actions(), [TOPOLOGY_ACTION.to_string()]);
	}

	#[test]
	fn dragging_pins_and_saves() {
		let (mut session, _) = started(two_routers_with_sender());
		session.mouse_down(0);
		session.drag_to(0, 321.0, 123.0);
		session.mouse_up(0, true);
		let node = &session.graph().nodes[0];
		assert!(node.fixed);
		assert_eq!((node.x, node.y), (321.0, 123.0));
		assert_eq!(session.selected(), None);

		session.double_click(0);
		assert!(!session.graph().nodes[0].fixed);
	}

	#[test]
	fn click_toggles_selection_of_routers_only() {
		let (mut session, _) = started(two_routers_with_sender());
		session.mouse_down(2);
		session.mouse_up(2, false);
		assert_eq!(session.selected(), None);

		session.mouse_down(0);
		session.mouse_up(0, false);
		assert_eq!(session.selected(), Some(0));
		session.mouse_down(0);
		session.mouse_up(0, false);
		assert_eq!(session.selected(), None);
	}

	#[test]
	fn hovering_with_a_selection_highlights_the_route() {
		let (mut session, mut source) = started(three_router_chain());
		session.mouse_down(0);
		session.mouse_up(0, false);
		session.hover_node(&mut source, 2);
		pump(&mut session, &mut source, 2.0);
		let graph = session.graph();
		assert!(graph.nodes.iter().all(|n| n.highlighted));
		assert!(graph.links.iter().all(|l| l.highlighted));

		session.leave_node();
		assert!(session.graph().nodes.iter().all(|n| !n.highlighted));
	}

	fn with_router_entity() -> Snapshot {
		let mut snapshot = two_routers_with_sender();
		snapshot.set_entity(
			&id_for("A"),
			ROUTER,
			EntityTable::with_rows(
				&["name", "version", "hostName"],
				vec![vec![json!("A"), json!("1.19.0"), json!("host-a")]],
			),
		);
		snapshot
	}

	#[test]
	fn router_tooltip_arrives_with_the_router_entity() {
		let (mut session, mut source) = started(with_router_entity());
		session.hover_node(&mut source, 0);
		assert_eq!(session.tooltip(), None);
		pump(&mut session, &mut source, 2.0);
		let html = session.tooltip().unwrap_or_default();
		assert!(html.contains("host-a"));
		assert!(html.contains("1.19.0"));
	}

	#[test]
	fn late_router_tooltip_is_dropped_after_leaving() {
		let (mut session, mut source) = started(with_router_entity());
		session.hover_node(&mut source, 0);
		session.leave_node();
		pump(&mut session, &mut source, 2.0);
		assert_eq!(session.tooltip(), None);
	}

	#[test]
	fn late_router_tooltip_does_not_replace_a_client_tooltip() {
		let (mut session, mut source) = started(with_router_entity());
		session.hover_node(&mut source, 0);
		session.leave_node();
		session.hover_node(&mut source, 2);
		pump(&mut session, &mut source, 2.0);
		let html = session.tooltip().unwrap_or_default();
		assert!(html.contains("Sender"));
		assert!(!html.contains("<td>Router</td>"));
	}

	#[test]
	fn client_tooltip_is_immediate() {
		let (mut session, mut source) = started(two_routers_with_sender());
		session.hover_node(&mut source, 2);
		assert!(session.tooltip().is_some_and(|t| t.contains("Sender")));
		session.leave_node();
		assert_eq!(session.tooltip(), None);
	}

	#[test]
	fn link_popup_follows_updates_until_left() {
		let (mut session, mut source) = started(two_routers_with_sender());
		let link = session.graph().link_into(2).unwrap_or_default();
		session.hover_link(&mut source, link);
		assert!(source.actions().iter().any(|a| a == POPUP_ACTION));
		assert!(session.tooltip().is_some());
		session.leave_link(&mut source);
		assert!(!source.actions().iter().any(|a| a == POPUP_ACTION));
		assert_eq!(session.tooltip(), None);
	}

	#[test]
	fn teardown_stops_polling() {
		let (mut session, mut source) = started(two_routers_with_sender());
		session.teardown(&mut source);
		assert!(!source.is_updating());
		assert!(source.actions().is_empty());
		assert!(source.poll(5000.0).is_empty());
	}

	#[test]
	fn connections_of_unknown_direction_stay_out_of_the_graph() {
		let (mut session, mut source) = started(routers(vec![(
			"A",
			vec![conn("9", "normal", "in", "c9")],
			vec![],
		)]));
		// initial draw, then the redraw after router.link was forced
		assert_eq!(session.version(), 2);
		assert_eq!(session.graph().nodes.len(), 1);
		assert!(session.graph().links.is_empty());
		assert!(session.simulation.is_running());

		pump(&mut session, &mut source, 2.0);
		assert_eq!(session.version(), 2);
		assert!(session.pending.is_empty());
	}

	#[test]
	fn redraw_without_new_nodes_stops_after_one_tick() {
		let (mut session, mut source) = started(two_routers_with_sender());
		source.set_backend(routers(vec![
			("A", vec![conn("1", "inter-router", "out", "B")], vec![]),
			("B", vec![conn("1", "inter-router", "in", "A")], vec![]),
		]));
		pump(&mut session, &mut source, 1000.0);
		assert!(session.simulation.is_running());
		assert_eq!(session.tick(), Tick::Settled);
		assert!(!session.simulation.is_running());
		assert_eq!(session.tick(), Tick::Idle);
	}

	#[test]
	fn restarts_are_spaced_and_bounded() {
		let (mut session, _) = started(router_line(10));
		let budget = ForceParams::new(10).restart_budget();
		assert_eq!(budget, 11);

		let mut restarted_at = Vec::new();
		for step in 0..100 {
			let now = step as f64 * 50.0;
			session.simulation.stop();
			session.advance(now);
			if session.simulation.is_running() {
				restarted_at.push(now);
			}
		}
		assert_eq!(restarted_at.len(), budget as usize);
		assert!(restarted_at.windows(2).all(|w| w[1] - w[0] >= 100.0));
	}

	#[test]
	fn positions_survive_a_rebuild() {
		let (mut session, mut source) = started(two_routers_with_sender());
		session.mouse_down(1);
		session.drag_to(1, 500.0, 400.0);
		session.mouse_up(1, true);
		source.set_backend(routers(vec![
			("A", vec![conn("1", "inter-router", "out", "B")], vec![]),
			("B", vec![conn("1", "inter-router", "in", "A")], vec![]),
		]));
		pump(&mut session, &mut source, 1000.0);
		let b = session.graph().node_by_name("B").unwrap_or_default();
		let node = &session.graph().nodes[b];
		assert!(node.fixed);
		assert_eq!((node.x, node.y), (500.0, 400.0));
	}
}
