//! Nodes, links and the graph the builder produces and the layout moves.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::positions::Position;

pub const ROUTER_RADIUS: f64 = 25.0;
pub const CLIENT_RADIUS: f64 = 15.0;

pub const ARTEMIS_PRODUCT: &str = "apache-activemq-artemis";
pub const QPID_PRODUCT: &str = "qpid-cpp";
pub const CONSOLE_IDENTIFIER: &str = "Dispatch console";

/// Direction of the traffic on a client connection, as seen from the router.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cdir {
	In,
	Out,
	Both,
	#[default]
	Unknown,
}

impl Cdir {
	pub fn parse(s: &str) -> Self {
		match s {
			"in" => Cdir::In,
			"out" => Cdir::Out,
			"both" => Cdir::Both,
			_ => Cdir::Unknown,
		}
	}

	pub fn from_counts(in_count: usize, out_count: usize) -> Self {
		match (in_count > 0, out_count > 0) {
			(true, true) => Cdir::Both,
			(true, false) => Cdir::In,
			(false, true) => Cdir::Out,
			(false, false) => Cdir::Unknown,
		}
	}

	pub fn as_str(self) -> &'static str {
		match self {
			Cdir::In => "in",
			Cdir::Out => "out",
			Cdir::Both => "both",
			Cdir::Unknown => "unknown",
		}
	}

	pub fn is_known(self) -> bool {
		self != Cdir::Unknown
	}

	/// Arrow visibility `(left, right)` for a link drawn in this direction.
	pub fn arrows(self) -> (bool, bool) {
		(self != Cdir::Out, matches!(self, Cdir::Out | Cdir::Both))
	}
}

/// The bits of a connection's `properties` map the view cares about.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Properties {
	pub product: Option<String>,
	pub console_identifier: Option<String>,
}

impl Properties {
	pub fn from_value(value: &Value) -> Self {
		let text = |k: &str| value.get(k).and_then(Value::as_str).map(str::to_string);
		Self {
			product: text("product"),
			console_identifier: text("console_identifier"),
		}
	}

	pub fn is_console(&self) -> bool {
		self.console_identifier.as_deref() == Some(CONSOLE_IDENTIFIER)
	}

	pub fn is_artemis(&self) -> bool {
		self.product.as_deref() == Some(ARTEMIS_PRODUCT)
	}

	pub fn is_qpid(&self) -> bool {
		self.product.as_deref() == Some(QPID_PRODUCT)
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NodeType {
	InterRouter,
	Normal,
	OnDemand,
	RouteContainer,
}

impl NodeType {
	pub fn from_role(role: &str) -> Option<Self> {
		match role {
			"inter-router" => Some(NodeType::InterRouter),
			"normal" => Some(NodeType::Normal),
			"on-demand" => Some(NodeType::OnDemand),
			"route-container" => Some(NodeType::RouteContainer),
			_ => None,
		}
	}

	pub fn as_str(self) -> &'static str {
		match self {
			NodeType::InterRouter => "inter-router",
			NodeType::Normal => "normal",
			NodeType::OnDemand => "on-demand",
			NodeType::RouteContainer => "route-container",
		}
	}

	pub fn radius(self) -> f64 {
		match self {
			NodeType::InterRouter => ROUTER_RADIUS,
			_ => CLIENT_RADIUS,
		}
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ClientKind {
	Client,
	Console,
}

/// One external connection on a router, kept even when collapsed into a group.
#[derive(Clone, Debug, PartialEq)]
pub struct ClientConnection {
	pub identity: String,
	/// Row of this connection in the owning router's `connection` table.
	pub row: usize,
	pub container: String,
	pub host: String,
	pub user: Option<String>,
	pub is_encrypted: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ClientGroup {
	pub kind: ClientKind,
	pub cdir: Cdir,
	pub normals: Vec<ClientConnection>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Endpoint {
	pub cdir: Cdir,
	pub connection: ClientConnection,
}

#[derive(Clone, Debug, PartialEq)]
pub enum NodeKind {
	Router,
	Client(ClientGroup),
	OnDemand(Endpoint),
	RouteContainer(Endpoint),
}

impl NodeKind {
	pub fn node_type(&self) -> NodeType {
		match self {
			NodeKind::Router => NodeType::InterRouter,
			NodeKind::Client(_) => NodeType::Normal,
			NodeKind::OnDemand(_) => NodeType::OnDemand,
			NodeKind::RouteContainer(_) => NodeType::RouteContainer,
		}
	}

	pub fn cdir(&self) -> Cdir {
		match self {
			NodeKind::Router => Cdir::Unknown,
			NodeKind::Client(group) => group.cdir,
			NodeKind::OnDemand(ep) | NodeKind::RouteContainer(ep) => ep.cdir,
		}
	}

	pub fn normals(&self) -> Option<&[ClientConnection]> {
		match self {
			NodeKind::Client(group) => Some(&group.normals),
			_ => None,
		}
	}
}

#[derive(Clone, Debug, PartialEq)]
pub struct Node {
	/// Management key of the router this node is, or hangs off.
	pub key: String,
	pub name: String,
	pub container: String,
	pub kind: NodeKind,
	pub properties: Properties,
	pub result_index: Option<usize>,
	pub x: f64,
	pub y: f64,
	pub(crate) px: f64,
	pub(crate) py: f64,
	pub fixed: bool,
	pub highlighted: bool,
}

impl Node {
	pub fn new(key: &str, name: &str, container: &str, kind: NodeKind, position: Position) -> Self {
		Self {
			key: key.to_string(),
			name: name.to_string(),
			container: container.to_string(),
			kind,
			properties: Properties::default(),
			result_index: None,
			x: position.x,
			y: position.y,
			px: position.x,
			py: position.y,
			fixed: position.fixed,
			highlighted: false,
		}
	}

	pub fn node_type(&self) -> NodeType {
		self.kind.node_type()
	}

	pub fn is_router(&self) -> bool {
		matches!(self.kind, NodeKind::Router)
	}

	pub fn radius(&self) -> f64 {
		self.node_type().radius()
	}

	pub fn cdir(&self) -> Cdir {
		self.kind.cdir()
	}

	pub fn is_console(&self) -> bool {
		matches!(&self.kind, NodeKind::Client(g) if g.kind == ClientKind::Console)
			|| self.properties.is_console()
	}

	pub fn is_artemis(&self) -> bool {
		self.properties.is_artemis()
	}

	pub fn is_qpid(&self) -> bool {
		self.properties.is_qpid()
	}

	/// Number of connections this node stands for.
	pub fn multiplicity(&self) -> usize {
		self.kind.normals().map_or(1, <[_]>::len)
	}

	/// Routers and route containers can be selected; clients and on-demand brokers cannot.
	pub fn is_selectable(&self) -> bool {
		matches!(self.kind, NodeKind::Router | NodeKind::RouteContainer(_))
	}

	/// Short text drawn inside the node.
	pub fn label(&self) -> String {
		if self.is_console() {
			return "\u{1F5A5}".into();
		}
		if self.is_artemis() {
			return "A".into();
		}
		if self.is_qpid() {
			return "Q".into();
		}
		match &self.kind {
			NodeKind::Router if self.name.chars().count() > 7 => {
				format!("{}...", self.name.chars().take(6).collect::<String>())
			}
			NodeKind::Router => self.name.clone(),
			NodeKind::RouteContainer(_) => self
				.properties
				.product
				.as_deref()
				.and_then(|p| p.chars().next())
				.map(|c| c.to_uppercase().to_string())
				.unwrap_or_else(|| "S".into()),
			NodeKind::Client(_) => "\u{1F4BB}".into(),
			NodeKind::OnDemand(_) => "B".into(),
		}
	}

	pub fn position(&self) -> Position {
		Position {
			x: self.x.round(),
			y: self.y.round(),
			fixed: self.fixed,
		}
	}

	pub fn place(&mut self, x: f64, y: f64) {
		self.x = x;
		self.y = y;
		self.px = x;
		self.py = y;
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LinkClass {
	InterRouter,
	Small,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Link {
	pub source: usize,
	pub target: usize,
	pub left: bool,
	pub right: bool,
	pub class: LinkClass,
	pub uid: String,
	pub highlighted: bool,
}

impl Link {
	pub fn joins(&self, a: usize, b: usize) -> bool {
		(self.source == a && self.target == b) || (self.source == b && self.target == a)
	}
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Graph {
	pub nodes: Vec<Node>,
	pub links: Vec<Link>,
}

impl Graph {
	pub fn new() -> Self {
		Self::default()
	}

	/// Index of the link between `source` and `target` in either orientation,
	/// creating it when the pair has no link of this class yet.
	pub fn get_link(
		&mut self,
		source: usize,
		target: usize,
		dir: Cdir,
		class: LinkClass,
		uid: &str,
	) -> usize {
		if let Some(idx) = self
			.links
			.iter()
			.position(|l| l.class == class && l.joins(source, target))
		{
			return idx;
		}
		let uid = if self.links.iter().any(|l| l.uid == uid) {
			format!("{uid}.{}", self.links.len())
		} else {
			uid.to_string()
		};
		let (left, right) = dir.arrows();
		self.links.push(Link {
			source,
			target,
			left,
			right,
			class,
			uid,
			highlighted: false,
		});
		self.links.len() - 1
	}

	pub fn link_for(&self, a: usize, b: usize) -> Option<usize> {
		self.links.iter().position(|l| l.joins(a, b))
	}

	/// First link pointing at `target`; for a client node that is its parent router's link.
	pub fn link_into(&self, target: usize) -> Option<usize> {
		self.links.iter().position(|l| l.target == target)
	}

	pub fn node_by_name(&self, name: &str) -> Option<usize> {
		self.nodes.iter().position(|n| n.name == name)
	}

	pub fn node_by_container(&self, container: &str) -> Option<usize> {
		self.nodes.iter().position(|n| n.container == container)
	}

	pub fn router_count(&self) -> usize {
		self.nodes.iter().filter(|n| n.is_router()).count()
	}

	pub fn set_fixed(&mut self, name: &str, fixed: bool) {
		self.nodes
			.iter_mut()
			.filter(|n| n.name == name)
			.for_each(|n| n.fixed = fixed);
	}

	pub fn clear_highlights(&mut self) {
		self.nodes.iter_mut().for_each(|n| n.highlighted = false);
		self.links.iter_mut().for_each(|l| l.highlighted = false);
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn router(name: &str) -> Node {
		Node::new(name, name, name, NodeKind::Router, Position::default())
	}

	#[test]
	fn arrows_follow_direction() {
		assert_eq!(Cdir::In.arrows(), (true, false));
		assert_eq!(Cdir::Out.arrows(), (false, true));
		assert_eq!(Cdir::Both.arrows(), (true, true));
		assert_eq!(Cdir::Unknown.arrows(), (true, false));
	}

	#[test]
	fn reversed_pair_reuses_link() {
		let mut graph = Graph::new();
		graph.nodes = vec![router("A"), router("B")];
		let first = graph.get_link(0, 1, Cdir::In, LinkClass::InterRouter, "0-1");
		let again = graph.get_link(1, 0, Cdir::Out, LinkClass::InterRouter, "1-0");
		assert_eq!(first, again);
		assert_eq!(graph.links.len(), 1);
	}

	#[test]
	fn colliding_uid_is_disambiguated() {
		let mut graph = Graph::new();
		graph.nodes = vec![router("A"), router("B"), router("C")];
		graph.get_link(0, 1, Cdir::In, LinkClass::Small, "conn");
		graph.get_link(0, 2, Cdir::In, LinkClass::Small, "conn");
		assert_eq!(graph.links[1].uid, "conn.1");
	}

	#[test]
	fn long_router_names_are_shortened() {
		assert_eq!(router("ROUTER.ALPHA").label(), "ROUTER...");
		assert_eq!(router("R1").label(), "R1");
	}
}
