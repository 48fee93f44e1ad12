use crate::topology::layout::{Tick, Viewport};
use crate::topology::legend::{LegendEntry, legend};
use crate::topology::positions::PositionStore;
use crate::topology::TopologySession;
use crate::topology::source::SnapshotSource;

/// Extra pick radius around nodes, in screen pixels.
pub const HIT_SLOP: f64 = 3.0;
/// How close the pointer must be to a link to hover it, in screen pixels.
pub const LINK_HIT: f64 = 5.0;
/// Pointer travel before a press on a node counts as a drag.
pub const DRAG_THRESHOLD: f64 = 3.0;

#[derive(Clone, Debug)]
pub struct ViewTransform {
	pub x: f64,
	pub y: f64,
	pub k: f64,
}

impl Default for ViewTransform {
	fn default() -> Self {
		Self {
			x: 0.0,
			y: 0.0,
			k: 1.0,
		}
	}
}

#[derive(Clone, Debug, Default)]
pub struct DragState {
	pub active: bool,
	pub node: Option<usize>,
	pub moved: bool,
	pub start_x: f64,
	pub start_y: f64,
	pub node_start_x: f64,
	pub node_start_y: f64,
}

#[derive(Clone, Debug, Default)]
pub struct PanState {
	pub active: bool,
	pub start_x: f64,
	pub start_y: f64,
	pub transform_start_x: f64,
	pub transform_start_y: f64,
}

/// What the overlay and legend need after a frame or an event.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ViewUpdate {
	pub tooltip: Option<Option<String>>,
	pub legend: Option<Vec<LegendEntry>>,
}

pub struct TopologyViewState {
	pub session: TopologySession,
	source: Box<dyn SnapshotSource>,
	pub transform: ViewTransform,
	pub drag: DragState,
	pub pan: PanState,
	pub width: f64,
	pub height: f64,
	hovered_node: Option<usize>,
	hovered_link: Option<usize>,
	seen_version: u64,
	seen_tooltip: u64,
}

impl TopologyViewState {
	pub fn new(
		mut source: Box<dyn SnapshotSource>,
		positions: Box<dyn PositionStore>,
		width: f64,
		height: f64,
	) -> Self {
		let mut session = TopologySession::new(Viewport::new(width, height), positions);
		session.start(source.as_mut());
		Self {
			session,
			source,
			transform: ViewTransform::default(),
			drag: DragState::default(),
			pan: PanState::default(),
			width,
			height,
			hovered_node: None,
			hovered_link: None,
			seen_version: 0,
			seen_tooltip: 0,
		}
	}

	pub fn screen_to_graph(&self, sx: f64, sy: f64) -> (f64, f64) {
		(
			(sx - self.transform.x) / self.transform.k,
			(sy - self.transform.y) / self.transform.k,
		)
	}

	/// Topmost node under a screen point.
	pub fn node_at_position(&self, sx: f64, sy: f64) -> Option<usize> {
		let (gx, gy) = self.screen_to_graph(sx, sy);
		let slop = HIT_SLOP / self.transform.k;
		self.session
			.graph()
			.nodes
			.iter()
			.rposition(|n| (n.x - gx).hypot(n.y - gy) <= n.radius() + slop)
	}

	pub fn link_at_position(&self, sx: f64, sy: f64) -> Option<usize> {
		let (gx, gy) = self.screen_to_graph(sx, sy);
		let reach = LINK_HIT / self.transform.k;
		let graph = self.session.graph();
		graph.links.iter().position(|l| {
			let (a, b) = (&graph.nodes[l.source], &graph.nodes[l.target]);
			segment_distance((gx, gy), (a.x, a.y), (b.x, b.y)) <= reach
		})
	}

	pub fn hovered_node(&self) -> Option<usize> {
		self.hovered_node
	}

	/// Poll the source, apply its events and step the layout once.
	pub fn frame(&mut self, now_ms: f64) -> Tick {
		let events = self.source.poll(now_ms);
		if !events.is_empty() {
			self.session.handle_events(self.source.as_mut(), events);
		}
		self.session.advance(now_ms);
		self.forget_stale_indices();
		self.session.tick()
	}

	/// Track what is under the pointer, opening and closing tooltips.
	pub fn set_hover(&mut self, sx: f64, sy: f64) {
		let node = self.node_at_position(sx, sy);
		let link = if node.is_none() {
			self.link_at_position(sx, sy)
		} else {
			None
		};
		if node != self.hovered_node {
			if self.hovered_node.is_some() {
				self.session.leave_node();
			}
			self.hovered_node = node;
			if let Some(idx) = node {
				self.session.hover_node(self.source.as_mut(), idx);
			}
		}
		if link != self.hovered_link {
			if self.hovered_link.is_some() {
				self.session.leave_link(self.source.as_mut());
			}
			self.hovered_link = link;
			if let Some(idx) = link {
				self.session.hover_link(self.source.as_mut(), idx);
			}
		}
	}

	pub fn clear_hover(&mut self) {
		if self.hovered_node.take().is_some() {
			self.session.leave_node();
		}
		if self.hovered_link.take().is_some() {
			self.session.leave_link(self.source.as_mut());
		}
	}

	pub fn press(&mut self, sx: f64, sy: f64) {
		if let Some(idx) = self.node_at_position(sx, sy) {
			let node = &self.session.graph().nodes[idx];
			self.drag = DragState {
				active: true,
				node: Some(idx),
				moved: false,
				start_x: sx,
				start_y: sy,
				node_start_x: node.x,
				node_start_y: node.y,
			};
			self.session.mouse_down(idx);
		} else {
			self.pan = PanState {
				active: true,
				start_x: sx,
				start_y: sy,
				transform_start_x: self.transform.x,
				transform_start_y: self.transform.y,
			};
		}
	}

	pub fn pointer_moved(&mut self, sx: f64, sy: f64) {
		if self.drag.active {
			let Some(idx) = self.drag.node else {
				return;
			};
			let (dx, dy) = (sx - self.drag.start_x, sy - self.drag.start_y);
			if !self.drag.moved && dx.hypot(dy) < DRAG_THRESHOLD {
				return;
			}
			self.drag.moved = true;
			let k = self.transform.k;
			self.session.drag_to(
				idx,
				self.drag.node_start_x + dx / k,
				self.drag.node_start_y + dy / k,
			);
		} else if self.pan.active {
			self.transform.x = self.pan.transform_start_x + (sx - self.pan.start_x);
			self.transform.y = self.pan.transform_start_y + (sy - self.pan.start_y);
		} else {
			self.set_hover(sx, sy);
		}
	}

	pub fn release(&mut self) {
		if self.drag.active {
			if let Some(idx) = self.drag.node {
				self.session.mouse_up(idx, self.drag.moved);
			}
		}
		self.drag = DragState::default();
		self.pan.active = false;
	}

	pub fn double_click(&mut self, sx: f64, sy: f64) {
		if let Some(idx) = self.node_at_position(sx, sy) {
			self.session.double_click(idx);
		}
	}

	/// Pin or release the node under the pointer. Returns false when there is none.
	pub fn toggle_pin(&mut self, sx: f64, sy: f64) -> bool {
		let Some(idx) = self.node_at_position(sx, sy) else {
			return false;
		};
		let node = &self.session.graph().nodes[idx];
		let (name, fixed) = (node.name.clone(), node.fixed);
		self.session.set_fixed(&name, !fixed);
		true
	}

	pub fn zoom(&mut self, sx: f64, sy: f64, zoom_in: bool) {
		let factor = if zoom_in { 1.1 } else { 0.9 };
		let new_k = (self.transform.k * factor).clamp(0.1, 10.0);
		let ratio = new_k / self.transform.k;
		self.transform.x = sx - (sx - self.transform.x) * ratio;
		self.transform.y = sy - (sy - self.transform.y) * ratio;
		self.transform.k = new_k;
	}

	pub fn resize(&mut self, width: f64, height: f64) {
		self.width = width;
		self.height = height;
		self.session.resize(Viewport::new(width, height));
	}

	/// Changes to push into the reactive overlay since the last call.
	pub fn take_update(&mut self) -> ViewUpdate {
		let mut update = ViewUpdate::default();
		if self.session.tooltip_version() != self.seen_tooltip {
			self.seen_tooltip = self.session.tooltip_version();
			update.tooltip = Some(self.session.tooltip().map(str::to_string));
		}
		if self.session.version() != self.seen_version {
			self.seen_version = self.session.version();
			update.legend = Some(legend(self.session.graph()));
		}
		update
	}

	pub fn teardown(&mut self) {
		self.session.teardown(self.source.as_mut());
	}

	// indices held across a rebuild may point at different nodes now
	fn forget_stale_indices(&mut self) {
		if self.session.version() == self.seen_version {
			return;
		}
		self.hovered_node = None;
		self.hovered_link = None;
		if self.drag.active {
			self.drag = DragState::default();
		}
	}
}

fn segment_distance(p: (f64, f64), a: (f64, f64), b: (f64, f64)) -> f64 {
	let (dx, dy) = (b.0 - a.0, b.1 - a.1);
	let len2 = dx * dx + dy * dy;
	if len2 < f64::EPSILON {
		return (p.0 - a.0).hypot(p.1 - a.1);
	}
	let t = (((p.0 - a.0) * dx + (p.1 - a.1) * dy) / len2).clamp(0.0, 1.0);
	(p.0 - (a.0 + t * dx)).hypot(p.1 - (a.1 + t * dy))
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::topology::demo::{DemoNetwork, DemoSource};
	use crate::topology::positions::MemoryPositions;

	fn view() -> TopologyViewState {
		let source = DemoSource::new(DemoNetwork::new(3), 1000.0, 60_000.0);
		let mut state = TopologyViewState::new(
			Box::new(source),
			Box::new(MemoryPositions::new()),
			800.0,
			600.0,
		);
		state.frame(0.0);
		state
	}

	#[test]
	fn segment_distance_clamps_to_the_ends() {
		assert_eq!(segment_distance((5.0, 3.0), (0.0, 0.0), (10.0, 0.0)), 3.0);
		assert_eq!(segment_distance((-4.0, 3.0), (0.0, 0.0), (10.0, 0.0)), 5.0);
		assert_eq!(segment_distance((1.0, 1.0), (1.0, 1.0), (1.0, 1.0)), 0.0);
	}

	#[test]
	fn first_frame_builds_the_graph_and_legend() {
		let mut state = view();
		assert_eq!(state.session.graph().router_count(), 3);
		let update = state.take_update();
		assert!(update.legend.is_some_and(|l| l.contains(&LegendEntry::Router)));
		assert_eq!(state.take_update(), ViewUpdate::default());
	}

	#[test]
	fn nodes_are_picked_through_the_transform() {
		let mut state = view();
		let (x, y) = {
			let n = &state.session.graph().nodes[0];
			(n.x, n.y)
		};
		assert_eq!(state.node_at_position(x, y), Some(0));
		state.transform = ViewTransform {
			x: 100.0,
			y: 50.0,
			k: 2.0,
		};
		assert_eq!(state.node_at_position(x * 2.0 + 100.0, y * 2.0 + 50.0), Some(0));
	}

	#[test]
	fn zoom_keeps_the_pointer_fixed() {
		let mut state = view();
		let before = state.screen_to_graph(300.0, 200.0);
		state.zoom(300.0, 200.0, true);
		let after = state.screen_to_graph(300.0, 200.0);
		assert!((before.0 - after.0).abs() < 1e-9);
		assert!((before.1 - after.1).abs() < 1e-9);
		assert!(state.transform.k > 1.0);
	}

	#[test]
	fn press_move_release_drags_and_pins() {
		let mut state = view();
		let (x, y) = {
			let n = &state.session.graph().nodes[0];
			(n.x, n.y)
		};
		state.press(x, y);
		state.pointer_moved(x + 40.0, y + 10.0);
		state.release();
		let node = &state.session.graph().nodes[0];
		assert!(node.fixed);
		assert_eq!((node.x, node.y), (x + 40.0, y + 10.0));
	}

	#[test]
	fn background_press_pans() {
		let mut state = view();
		state.press(-500.0, -500.0);
		state.pointer_moved(-480.0, -490.0);
		state.release();
		assert_eq!((state.transform.x, state.transform.y), (20.0, 10.0));
	}
}
