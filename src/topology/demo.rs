//! A simulated router network for running the console without a backend.

use serde_json::{Value, json};

use super::entity::{
	CONNECTION, EntityTable, LISTENER, ROUTER, ROUTER_LINK, ROUTER_NODE, Snapshot, id_from_name,
};
use super::model::{ARTEMIS_PRODUCT, CONSOLE_IDENTIFIER, QPID_PRODUCT};
use super::source::{EntitySpec, MemorySource, SnapshotSource, SourceEvent, Ticket};

const CONNECTION_ATTRS: &[&str] = &[
	"identity",
	"name",
	"role",
	"dir",
	"container",
	"host",
	"user",
	"isEncrypted",
	"isAuthenticated",
	"sasl",
	"sslProto",
	"sslCipher",
	"tenant",
	"properties",
];

const LINK_ATTRS: &[&str] = &[
	"linkType",
	"connectionId",
	"linkDir",
	"owningAddr",
	"undeliveredCount",
	"unsettledCount",
	"rejectedCount",
	"releasedCount",
	"modifiedCount",
];

const ROUTER_NAMES: &[&str] = &[
	"Hub", "East", "West", "North", "South", "Gateway.Primary", "Edge", "Core",
];

const VERSION: &str = "1.19.0";

/// Simple pseudo-random number generator (deterministic for consistency).
fn rand_simple(seed: usize) -> f64 {
	let x = ((seed + 1) * 9301 + 49297) % 233280;
	(x as f64) / 233280.0
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Traffic {
	Send,
	Receive,
	Both,
}

impl Traffic {
	fn link_dirs(self) -> &'static [&'static str] {
		match self {
			Traffic::Send => &["in"],
			Traffic::Receive => &["out"],
			Traffic::Both => &["in", "out"],
		}
	}
}

#[derive(Clone, Debug)]
struct DemoClient {
	identity: u64,
	role: &'static str,
	dir: &'static str,
	container: String,
	traffic: Traffic,
	properties: Value,
	address: String,
}

#[derive(Clone, Debug)]
struct DemoRouter {
	name: String,
	clients: Vec<DemoClient>,
}

/// A line of routers, each with a few attached clients that come and go.
#[derive(Clone, Debug)]
pub struct DemoNetwork {
	routers: Vec<DemoRouter>,
	step: usize,
	next_identity: u64,
}

impl DemoNetwork {
	pub fn new(router_count: usize) -> Self {
		let router_count = router_count.max(1);
		let mut network = Self {
			routers: (0..router_count)
				.map(|i| DemoRouter {
					name: router_name(i),
					clients: Vec::new(),
				})
				.collect(),
			step: 0,
			next_identity: 10,
		};
		for r in 0..router_count {
			network.add_client(r, Traffic::Send);
			network.add_client(r, Traffic::Receive);
		}
		network.attach(
			0,
			"normal",
			"in",
			"console",
			json!({ "console_identifier": CONSOLE_IDENTIFIER }),
			Traffic::Both,
		);
		let last = router_count - 1;
		network.attach(
			last,
			"route-container",
			"out",
			"broker.qpid",
			json!({ "product": QPID_PRODUCT }),
			Traffic::Both,
		);
		network.attach(
			last / 2,
			"on-demand",
			"out",
			"broker.artemis",
			json!({ "product": ARTEMIS_PRODUCT }),
			Traffic::Both,
		);
		network
	}

	pub fn router_count(&self) -> usize {
		self.routers.len()
	}

	fn attach(
		&mut self,
		router: usize,
		role: &'static str,
		dir: &'static str,
		container: &str,
		properties: Value,
		traffic: Traffic,
	) {
		let identity = self.next_identity;
		self.next_identity += 1;
		self.routers[router].clients.push(DemoClient {
			identity,
			role,
			dir,
			container: container.to_string(),
			traffic,
			properties,
			address: format!("queue.{}", identity % 4),
		});
	}

	fn add_client(&mut self, router: usize, traffic: Traffic) {
		let container = format!("client-{}", self.next_identity);
		self.attach(router, "normal", "in", &container, json!({}), traffic);
	}

	/// Advance one tick: a client connects or disconnects somewhere.
	pub fn step(&mut self) {
		self.step += 1;
		let router = (rand_simple(self.step) * self.routers.len() as f64) as usize % self.routers.len();
		let roll = rand_simple(self.step * 7 + 3);
		let normals = self.routers[router]
			.clients
			.iter()
			.filter(|c| c.role == "normal" && c.container.starts_with("client-"))
			.count();
		if roll < 0.4 && normals > 1 {
			if let Some(pos) = self.routers[router]
				.clients
				.iter()
				.rposition(|c| c.container.starts_with("client-"))
			{
				self.routers[router].clients.remove(pos);
			}
			return;
		}
		let traffic = if roll < 0.7 {
			Traffic::Send
		} else if roll < 0.9 {
			Traffic::Receive
		} else {
			Traffic::Both
		};
		self.add_client(router, traffic);
	}

	/// What every router would answer right now.
	pub fn snapshot(&self) -> Snapshot {
		let mut snapshot = Snapshot::new();
		for (i, router) in self.routers.iter().enumerate() {
			let key = id_from_name(&router.name);
			snapshot.set_entity(&key, CONNECTION, self.connections(i));
			snapshot.set_entity(&key, ROUTER_LINK, self.links(i));
			snapshot.set_entity(&key, ROUTER_NODE, self.next_hops(i));
			snapshot.set_entity(
				&key,
				ROUTER,
				EntityTable::with_rows(
					&["name", "version", "hostName"],
					vec![vec![json!(router.name), json!(VERSION), json!(format!("demo-{i}.local"))]],
				),
			);
			snapshot.set_entity(
				&key,
				LISTENER,
				EntityTable::with_rows(
					&["role", "port", "http"],
					vec![
						vec![json!("normal"), json!((5672 + i).to_string()), json!(false)],
						vec![json!("inter-router"), json!("55672"), json!(false)],
					],
				),
			);
		}
		snapshot
	}

	fn connections(&self, i: usize) -> EntityTable {
		let mut table = EntityTable::new(CONNECTION_ATTRS);
		let peer = |identity: &str, dir: &str, name: &str| {
			vec![
				json!(identity),
				json!(format!("{name}:55672")),
				json!("inter-router"),
				json!(dir),
				json!(name),
				json!(format!("{name}:55672")),
				Value::Null,
				json!(false),
				json!(true),
				json!("ANONYMOUS"),
				Value::Null,
				Value::Null,
				Value::Null,
				json!({}),
			]
		};
		if i > 0 {
			table.push_row(peer("1", "in", &self.routers[i - 1].name));
		}
		if let Some(next) = self.routers.get(i + 1) {
			table.push_row(peer("2", "out", &next.name));
		}
		for client in &self.routers[i].clients {
			let encrypted = client.identity % 3 == 0;
			table.push_row(vec![
				json!(client.identity.to_string()),
				json!(format!("10.1.{i}.{}:{}", client.identity % 250, 40000 + client.identity)),
				json!(client.role),
				json!(client.dir),
				json!(client.container),
				json!(format!("10.1.{i}.{}:{}", client.identity % 250, 40000 + client.identity)),
				json!(format!("user{}", client.identity % 5)),
				json!(encrypted),
				json!(encrypted),
				json!(if encrypted { "PLAIN" } else { "ANONYMOUS" }),
				if encrypted { json!("TLSv1.3") } else { Value::Null },
				if encrypted {
					json!("TLS_AES_256_GCM_SHA384")
				} else {
					Value::Null
				},
				Value::Null,
				client.properties.clone(),
			]);
		}
		table
	}

	fn links(&self, i: usize) -> EntityTable {
		let mut table = EntityTable::new(LINK_ATTRS);
		for client in &self.routers[i].clients {
			for (n, dir) in client.traffic.link_dirs().iter().enumerate() {
				let seed = self.step + client.identity as usize * 13 + n;
				let noise = |salt: usize| (rand_simple(seed * 31 + salt) * 20.0) as u64;
				table.push_row(vec![
					json!("endpoint"),
					json!(client.identity.to_string()),
					json!(dir),
					json!(format!("M0{}", client.address)),
					json!(noise(1)),
					json!(noise(2)),
					json!(noise(3) / 10),
					json!(noise(4) / 5),
					json!(noise(5) / 10),
				]);
			}
		}
		table
	}

	fn next_hops(&self, i: usize) -> EntityTable {
		let rows = (0..self.routers.len())
			.filter(|&j| j != i)
			.map(|j| {
				let hop = if j.abs_diff(i) == 1 {
					Value::Null
				} else if j > i {
					json!(self.routers[i + 1].name)
				} else {
					json!(self.routers[i - 1].name)
				};
				vec![json!(self.routers[j].name), hop]
			})
			.collect();
		EntityTable::with_rows(&["id", "nextHop"], rows)
	}
}

fn router_name(i: usize) -> String {
	let base = ROUTER_NAMES[i % ROUTER_NAMES.len()];
	match i / ROUTER_NAMES.len() {
		0 => base.to_string(),
		round => format!("{base}{round}"),
	}
}

/// A [`MemorySource`] whose backend is a [`DemoNetwork`] stepped on a timer.
pub struct DemoSource {
	network: DemoNetwork,
	inner: MemorySource,
	step_ms: f64,
	next_step: Option<f64>,
}

impl DemoSource {
	pub fn new(network: DemoNetwork, poll_interval_ms: f64, step_ms: f64) -> Self {
		let mut inner = MemorySource::new(poll_interval_ms);
		inner.set_backend(network.snapshot());
		Self {
			network,
			inner,
			step_ms,
			next_step: None,
		}
	}
}

impl SnapshotSource for DemoSource {
	fn node_info(&self) -> &Snapshot {
		self.inner.node_info()
	}

	fn ensure_entities(&mut self, keys: &[String], specs: &[EntitySpec]) -> Ticket {
		self.inner.ensure_entities(keys, specs)
	}

	fn ensure_all_entities(&mut self, specs: &[EntitySpec]) -> Ticket {
		self.inner.ensure_all_entities(specs)
	}

	fn add_updated_action(&mut self, name: &str) {
		self.inner.add_updated_action(name);
	}

	fn del_updated_action(&mut self, name: &str) {
		self.inner.del_updated_action(name);
	}

	fn set_update_entities(&mut self, specs: Vec<EntitySpec>) {
		self.inner.set_update_entities(specs);
	}

	fn add_update_entities(&mut self, spec: EntitySpec) {
		self.inner.add_update_entities(spec);
	}

	fn start_updating(&mut self, immediate: bool) {
		self.inner.start_updating(immediate);
	}

	fn stop_updating(&mut self) {
		self.inner.stop_updating();
	}

	fn poll(&mut self, now_ms: f64) -> Vec<SourceEvent> {
		match self.next_step {
			None => self.next_step = Some(now_ms + self.step_ms),
			Some(at) if now_ms >= at => {
				self.network.step();
				self.inner.set_backend(self.network.snapshot());
				self.next_step = Some(now_ms + self.step_ms);
			}
			Some(_) => {}
		}
		self.inner.poll(now_ms)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::topology::builder::GraphBuilder;
	use crate::topology::layout::Viewport;
	use crate::topology::model::{Cdir, LinkClass};
	use crate::topology::next_hop::NextHopTable;
	use crate::topology::positions::MemoryPositions;

	#[test]
	fn demo_network_builds_a_connected_graph() {
		let network = DemoNetwork::new(4);
		let store = MemoryPositions::new();
		let build = GraphBuilder::new(&store, Viewport::default()).build(&network.snapshot());
		assert!(build.unknowns.is_empty());
		assert_eq!(network.router_count(), 4);
		assert_eq!(network.routers.iter().map(|r| r.clients.len()).sum::<usize>(), 11);
		assert_eq!(build.graph.router_count(), 4);
		let inter_router = build
			.graph
			.links
			.iter()
			.filter(|l| l.class == LinkClass::InterRouter)
			.count();
		assert_eq!(inter_router, 3);
		assert!(build.graph.nodes.iter().any(|n| n.is_console()));
		assert!(build.graph.nodes.iter().any(|n| n.is_qpid()));
		assert!(build.graph.nodes.iter().any(|n| n.cdir() == Cdir::In));
	}

	#[test]
	fn next_hops_walk_the_line() {
		let network = DemoNetwork::new(4);
		let table = NextHopTable::from_snapshot(&network.snapshot());
		assert_eq!(table.next_hop("Hub", "North"), Some("East"));
		assert_eq!(table.next_hop("North", "Hub"), Some("West"));
		assert_eq!(table.next_hop("Hub", "East"), Some("East"));
	}

	#[test]
	fn steps_are_deterministic() {
		let mut a = DemoNetwork::new(3);
		let mut b = DemoNetwork::new(3);
		for _ in 0..20 {
			a.step();
			b.step();
		}
		assert_eq!(a.snapshot(), b.snapshot());
		assert_ne!(a.snapshot(), DemoNetwork::new(3).snapshot());
	}

	#[test]
	fn long_router_names_are_shortened() {
		let network = DemoNetwork::new(6);
		let store = MemoryPositions::new();
		let graph = GraphBuilder::new(&store, Viewport::default())
			.build(&network.snapshot())
			.graph;
		let gateway = graph.node_by_name("Gateway.Primary").unwrap_or_default();
		assert_eq!(graph.nodes[gateway].label(), "Gatewa...");
	}

	#[test]
	fn demo_source_steps_the_backend() {
		let mut source = DemoSource::new(DemoNetwork::new(2), 1000.0, 500.0);
		let before = source.network.snapshot();
		source.poll(0.0);
		source.poll(600.0);
		assert_ne!(source.network.snapshot(), before);
	}
}
