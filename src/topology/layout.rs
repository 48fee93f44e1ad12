//! Force-directed layout over the topology graph.
//!
//! Position Verlet in the classic d3 style: each tick applies link springs,
//! a pull toward the centre and pairwise repulsion, then integrates with
//! friction. Parameters scale with the number of routers.

use super::model::{Graph, Node, NodeType};

const FEW_ROUTERS: f64 = 6.0;
const MANY_ROUTERS: f64 = 80.0;

pub const FRICTION: f64 = 0.1;
pub const RESTART_DELAY_MS: f64 = 100.0;

const START_ALPHA: f64 = 0.1;
const ALPHA_DECAY: f64 = 0.99;
const MIN_ALPHA: f64 = 0.005;
/// Largest per-tick displacement, in pixels, still counted as movement.
const MOTION_THRESHOLD: f64 = 0.05;
/// Coincident nodes are treated as this far apart.
const MIN_DISTANCE: f64 = 1.0;
/// Nodes are kept at least this far from the top and left edges.
const EDGE_MARGIN: f64 = 30.0;

/// Interpolate between `min` (6 or fewer routers) and `max` (80 or more).
pub fn force_scale(router_count: usize, min: f64, max: f64) -> f64 {
	let count = (router_count as f64).clamp(FEW_ROUTERS, MANY_ROUTERS);
	min + (max - min) * (count - FEW_ROUTERS) / (MANY_ROUTERS - FEW_ROUTERS)
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ForceParams {
	pub router_count: usize,
}

impl ForceParams {
	pub fn new(router_count: usize) -> Self {
		Self { router_count }
	}

	/// Rest length of a link, by the type of node it points at.
	pub fn link_distance(&self, target: NodeType) -> f64 {
		match target {
			NodeType::InterRouter => force_scale(self.router_count, 150.0, 70.0),
			_ => force_scale(self.router_count, 75.0, 40.0),
		}
	}

	pub fn charge(&self, node: NodeType) -> f64 {
		match node {
			NodeType::InterRouter => force_scale(self.router_count, -1800.0, -900.0),
			_ => -900.0,
		}
	}

	pub fn gravity(&self) -> f64 {
		force_scale(self.router_count, 0.1, 0.0001)
	}

	pub fn friction(&self) -> f64 {
		FRICTION
	}

	/// How many times the layout is kicked again after a rebuild.
	pub fn restart_budget(&self) -> u32 {
		force_scale(self.router_count, 0.0, 200.0).round() as u32
	}
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
	pub width: f64,
	pub height: f64,
}

impl Default for Viewport {
	fn default() -> Self {
		Self::new(800.0, 600.0)
	}
}

impl Viewport {
	pub fn new(width: f64, height: f64) -> Self {
		Self { width, height }
	}

	pub fn center(&self) -> (f64, f64) {
		(self.width / 2.0, self.height / 2.0)
	}

	/// Keep a node fully on screen.
	pub fn clamp(&self, node: &mut Node) {
		let r = node.radius();
		node.x = node.x.max(EDGE_MARGIN).min(self.width - r).max(0.0);
		node.y = node.y.max(EDGE_MARGIN).min(self.height - r).max(0.0);
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tick {
	Idle,
	Running,
	/// Motion died down this tick; the simulation has stopped itself.
	Settled,
}

#[derive(Clone, Debug)]
pub struct Simulation {
	params: ForceParams,
	viewport: Viewport,
	alpha: f64,
	running: bool,
}

impl Simulation {
	pub fn new(params: ForceParams, viewport: Viewport) -> Self {
		Self {
			params,
			viewport,
			alpha: 0.0,
			running: false,
		}
	}

	pub fn start(&mut self) {
		self.alpha = START_ALPHA;
		self.running = true;
	}

	pub fn stop(&mut self) {
		self.alpha = 0.0;
		self.running = false;
	}

	pub fn is_running(&self) -> bool {
		self.running
	}

	pub fn set_params(&mut self, params: ForceParams) {
		self.params = params;
	}

	pub fn set_viewport(&mut self, viewport: Viewport) {
		self.viewport = viewport;
	}

	pub fn tick(&mut self, graph: &mut Graph) -> Tick {
		if !self.running {
			return Tick::Idle;
		}
		let before: Vec<(f64, f64)> = graph.nodes.iter().map(|n| (n.x, n.y)).collect();

		self.apply_links(graph);
		self.apply_gravity(graph);
		self.apply_charge(graph);

		let friction = self.params.friction();
		for node in &mut graph.nodes {
			if node.fixed {
				node.x = node.px;
				node.y = node.py;
			} else {
				let (x, y) = (node.x, node.y);
				node.x -= (node.px - x) * friction;
				node.y -= (node.py - y) * friction;
				node.px = x;
				node.py = y;
			}
			self.viewport.clamp(node);
		}

		let motion = graph
			.nodes
			.iter()
			.zip(&before)
			.map(|(n, (x, y))| (n.x - x).abs().max((n.y - y).abs()))
			.fold(0.0, f64::max);

		self.alpha *= ALPHA_DECAY;
		if self.alpha < MIN_ALPHA || motion < MOTION_THRESHOLD {
			self.stop();
			return Tick::Settled;
		}
		Tick::Running
	}

	fn apply_links(&self, graph: &mut Graph) {
		let mut degree = vec![0usize; graph.nodes.len()];
		for link in &graph.links {
			degree[link.source] += 1;
			degree[link.target] += 1;
		}
		for link in &graph.links {
			let (s, t) = (link.source, link.target);
			if s == t {
				continue;
			}
			let (dx, dy) = (
				graph.nodes[t].x - graph.nodes[s].x,
				graph.nodes[t].y - graph.nodes[s].y,
			);
			let len = (dx * dx + dy * dy).sqrt();
			if len == 0.0 {
				continue;
			}
			let distance = self.params.link_distance(graph.nodes[t].node_type());
			let l = self.alpha * (len - distance) / len;
			let (fx, fy) = (dx * l, dy * l);
			let k = degree[s] as f64 / (degree[t] + degree[s]) as f64;
			graph.nodes[t].x -= fx * k;
			graph.nodes[t].y -= fy * k;
			graph.nodes[s].x += fx * (1.0 - k);
			graph.nodes[s].y += fy * (1.0 - k);
		}
	}

	fn apply_gravity(&self, graph: &mut Graph) {
		let k = self.alpha * self.params.gravity();
		let (cx, cy) = self.viewport.center();
		for node in &mut graph.nodes {
			node.x += (cx - node.x) * k;
			node.y += (cy - node.y) * k;
		}
	}

	fn apply_charge(&self, graph: &mut Graph) {
		let charges: Vec<f64> = graph
			.nodes
			.iter()
			.map(|n| self.alpha * self.params.charge(n.node_type()))
			.collect();
		let points: Vec<(f64, f64)> = graph.nodes.iter().map(|n| (n.x, n.y)).collect();

		for (i, node) in graph.nodes.iter_mut().enumerate() {
			if node.fixed {
				continue;
			}
			for (j, &(ox, oy)) in points.iter().enumerate() {
				if i == j {
					continue;
				}
				let (mut dx, mut dy) = (ox - node.x, oy - node.y);
				let mut d2 = dx * dx + dy * dy;
				if d2 < MIN_DISTANCE * MIN_DISTANCE {
					// push coincident nodes apart along x, lower index to the left
					dx = if i < j { MIN_DISTANCE } else { -MIN_DISTANCE };
					dy = 0.0;
					d2 = MIN_DISTANCE * MIN_DISTANCE;
				}
				let k = charges[j] / d2;
				node.px -= dx * k;
				node.py -= dy * k;
			}
		}
	}
}

/// Bounded series of layout restarts, spaced [`RESTART_DELAY_MS`] apart,
/// that gives freshly added nodes time to settle.
#[derive(Clone, Debug, Default)]
pub struct RestartSchedule {
	remaining: u32,
	next_at: Option<f64>,
}

impl RestartSchedule {
	pub fn new(budget: u32) -> Self {
		Self {
			remaining: budget,
			next_at: None,
		}
	}

	/// True when the simulation should be restarted at `now_ms`.
	pub fn due(&mut self, now_ms: f64) -> bool {
		if self.remaining == 0 || self.next_at.is_some_and(|at| now_ms < at) {
			return false;
		}
		self.remaining -= 1;
		self.next_at = Some(now_ms + RESTART_DELAY_MS);
		true
	}
}
