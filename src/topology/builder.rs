//! Turns a management snapshot into the node and link lists the layout runs on.

use std::collections::HashMap;
use std::f64::consts::PI;

use log::{debug, warn};

use super::entity::{
	CONNECTION, Connection, NodeEntities, ROUTER_LINK, RouterLink, Snapshot, name_from_id,
};
use super::error::TopologyError;
use super::layout::Viewport;
use super::model::{
	Cdir, ClientConnection, ClientGroup, ClientKind, Endpoint, Graph, LinkClass, Node, NodeKind,
	NodeType,
};
use super::positions::{Position, PositionStore};

/// Distance of a new client from its router.
const CLIENT_SPREAD: f64 = 40.0;

/// A normal connection whose direction could not be worked out from `router.link`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Unresolved {
	/// Management key of the router the connection is on.
	pub key: String,
	pub connection: String,
}

#[derive(Clone, Debug, Default)]
pub struct Build {
	pub graph: Graph,
	pub unknowns: Vec<Unresolved>,
	/// Some node had no saved position and was placed by the fan-out.
	pub has_new_nodes: bool,
}

impl Build {
	/// Distinct router keys that need a direction lookup, in first-seen order.
	pub fn unknown_keys(&self) -> Vec<String> {
		let mut keys: Vec<String> = Vec::new();
		for u in &self.unknowns {
			if !keys.contains(&u.key) {
				keys.push(u.key.clone());
			}
		}
		keys
	}
}

pub struct GraphBuilder<'a> {
	positions: &'a dyn PositionStore,
	viewport: Viewport,
}

impl<'a> GraphBuilder<'a> {
	pub fn new(positions: &'a dyn PositionStore, viewport: Viewport) -> Self {
		Self {
			positions,
			viewport,
		}
	}

	pub fn build(&self, snapshot: &Snapshot) -> Build {
		let mut graph = Graph::new();
		let mut unknowns = Vec::new();
		let new_routers = self.initialize_nodes(snapshot, &mut graph);
		let new_clients = self.initialize_links(snapshot, &mut graph, &mut unknowns);
		debug!(
			"built topology: {} nodes, {} links, {} unresolved",
			graph.nodes.len(),
			graph.links.len(),
			unknowns.len()
		);
		Build {
			graph,
			unknowns,
			has_new_nodes: new_routers || new_clients,
		}
	}

	fn initialize_nodes(&self, snapshot: &Snapshot, graph: &mut Graph) -> bool {
		let Viewport { width, height } = self.viewport;
		let count = snapshot.len().max(1) as f64;
		let mut y_init = 50.0;
		let mut fresh = false;

		for key in snapshot.keys() {
			let name = name_from_id(key);
			if graph.node_by_name(name).is_some() {
				warn!("router {name} reported twice, keeping the first");
				continue;
			}
			let i = graph.nodes.len() as f64;
			let mut position = self.positions.get(name).unwrap_or_else(|| {
				fresh = true;
				Position::new(
					(width / 4.0 + ((width / 2.0) / count) * i).round(),
					(height / 2.0 + (i / (PI * 2.0)).sin() * height / 4.0).round(),
				)
			});
			if position.y > height {
				position.y = 200.0 - y_init;
				y_init = -y_init;
			}
			graph
				.nodes
				.push(Node::new(key, name, name, NodeKind::Router, position));
		}
		fresh
	}

	fn initialize_links(
		&self,
		snapshot: &Snapshot,
		graph: &mut Graph,
		unknowns: &mut Vec<Unresolved>,
	) -> bool {
		let mut client = 1.0_f64;
		let mut fresh = false;

		for (key, entities) in snapshot.iter() {
			let Some(table) = entities.get(CONNECTION) else {
				continue;
			};
			let router_name = name_from_id(key);
			let Some(source) = router_index(graph, router_name) else {
				continue;
			};
			// first node of each (kind, direction) group on this router
			let mut groups: HashMap<(ClientKind, Cdir), usize> = HashMap::new();

			for (row, record) in table.records().enumerate() {
				let conn = match Connection::from_record(&record) {
					Ok(conn) => conn,
					Err(e) => {
						warn!("skipping connection {row} on {router_name}: {e}");
						continue;
					}
				};
				let Some(node_type) = NodeType::from_role(&conn.role) else {
					warn!(
						"skipping connection {} on {router_name}: {}",
						conn.identity,
						TopologyError::UnknownRole(conn.role.clone())
					);
					continue;
				};

				if node_type == NodeType::InterRouter {
					if let Some(target) = router_index(graph, &conn.container) {
						let uid = format!("{source}-{target}");
						graph.get_link(source, target, conn.dir, LinkClass::InterRouter, &uid);
					}
					continue;
				}

				let name = format!("{router_name}.{}", conn.identity);
				let angle = client / (PI * 2.0);
				let (sx, sy) = (graph.nodes[source].x, graph.nodes[source].y);
				let saved = self.positions.get(&name);
				let mut position = saved.unwrap_or_else(|| {
					Position::new(
						(sx + CLIENT_SPREAD * angle.sin()).round(),
						(sy + CLIENT_SPREAD * angle.cos()).round(),
					)
				});
				if position.y > self.viewport.height {
					position.y = (sy + CLIENT_SPREAD + angle.cos()).round();
				}
				let kind = if conn.properties.is_console() {
					ClientKind::Console
				} else {
					ClientKind::Client
				};
				let mut cdir = resolve_direction(&conn.identity, entities);
				let member = ClientConnection {
					identity: conn.identity.clone(),
					row,
					container: conn.container.clone(),
					host: conn.host.clone(),
					user: conn.user.clone(),
					is_encrypted: conn.is_encrypted,
				};

				let has_container = !conn.container.is_empty();
				if let Some(existing) = graph
					.node_by_container(&conn.container)
					.filter(|_| has_container)
				{
					if conn.properties.product.is_some() {
						graph.nodes[existing].properties = conn.properties.clone();
					}
					graph.get_link(source, existing, conn.dir, LinkClass::Small, &conn.name);
					continue;
				}

				if let Some((group, member_idx)) =
					collapsed_member(graph, &conn.container).filter(|_| has_container)
				{
					// seen as a collapsed client on another router: give it its own node
					if let Some(parent) = graph.link_into(group).map(|l| graph.links[l].source) {
						if !cdir.is_known() {
							cdir = conn.dir;
						}
						let node = external_node(
							key,
							&name,
							&conn,
							row,
							NodeKind::Client(ClientGroup {
								kind,
								cdir,
								normals: vec![member],
							}),
							position,
						);
						fresh |= saved.is_none();
						graph.nodes.push(node);
						let idx = graph.nodes.len() - 1;
						graph.get_link(parent, idx, cdir, LinkClass::Small, &conn.name);
						graph.get_link(source, idx, cdir, LinkClass::Small, &conn.name);
						if let NodeKind::Client(g) = &mut graph.nodes[group].kind {
							g.normals.remove(member_idx);
						}
					}
					continue;
				}

				match node_type {
					NodeType::Normal if cdir.is_known() => {
						if let Some(&group) = groups.get(&(kind, cdir)) {
							if let NodeKind::Client(g) = &mut graph.nodes[group].kind {
								g.normals.push(member);
							}
							continue;
						}
						let node = external_node(
							key,
							&name,
							&conn,
							row,
							NodeKind::Client(ClientGroup {
								kind,
								cdir,
								normals: vec![member],
							}),
							position,
						);
						fresh |= saved.is_none();
						graph.nodes.push(node);
						let idx = graph.nodes.len() - 1;
						groups.insert((kind, cdir), idx);
						graph.get_link(source, idx, cdir, LinkClass::Small, &conn.name);
						client += 1.0;
					}
					NodeType::Normal => unknowns.push(Unresolved {
						key: key.to_string(),
						connection: conn.identity.clone(),
					}),
					_ => {
						let endpoint = Endpoint {
							cdir,
							connection: member,
						};
						let kind = if node_type == NodeType::OnDemand {
							NodeKind::OnDemand(endpoint)
						} else {
							NodeKind::RouteContainer(endpoint)
						};
						let node = external_node(key, &name, &conn, row, kind, position);
						fresh |= saved.is_none();
						graph.nodes.push(node);
						let idx = graph.nodes.len() - 1;
						graph.get_link(source, idx, conn.dir, LinkClass::Small, &conn.name);
						client += 1.0;
					}
				}
			}
		}
		fresh
	}
}

fn router_index(graph: &Graph, name: &str) -> Option<usize> {
	graph
		.nodes
		.iter()
		.position(|n| n.is_router() && n.name == name)
}

/// Group node and member index of a collapsed client with this container.
fn collapsed_member(graph: &Graph, container: &str) -> Option<(usize, usize)> {
	graph.nodes.iter().enumerate().find_map(|(i, node)| {
		node.kind
			.normals()?
			.iter()
			.position(|n| n.container == container)
			.map(|j| (i, j))
	})
}

fn external_node(
	key: &str,
	name: &str,
	conn: &Connection,
	row: usize,
	kind: NodeKind,
	position: Position,
) -> Node {
	let mut node = Node::new(key, name, &conn.container, kind, position);
	node.properties = conn.properties.clone();
	node.result_index = Some(row);
	node
}

/// Direction of a connection judged by the endpoint links the router reports for it.
pub fn resolve_direction(identity: &str, entities: &NodeEntities) -> Cdir {
	let Some(links) = entities.get(ROUTER_LINK) else {
		return Cdir::Unknown;
	};
	let (mut ins, mut outs) = (0, 0);
	for record in links.records() {
		let Ok(link) = RouterLink::from_record(&record) else {
			continue;
		};
		if link.link_type == "endpoint" && link.connection_id.as_deref() == Some(identity) {
			if link.link_dir.as_deref() == Some("in") {
				ins += 1;
			} else {
				outs += 1;
			}
		}
	}
	Cdir::from_counts(ins, outs)
}
