//! Which kinds of node are on screen, for the legend panel.

use super::model::{Cdir, Graph, Node, NodeKind};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LegendEntry {
	Router,
	Console,
	Sender,
	Receiver,
	SenderReceiver,
	QpidBroker,
	ArtemisBroker,
	Service,
}

impl LegendEntry {
	pub fn label(self) -> &'static str {
		match self {
			LegendEntry::Router => "Router",
			LegendEntry::Console => "Console",
			LegendEntry::Sender => "Sender",
			LegendEntry::Receiver => "Receiver",
			LegendEntry::SenderReceiver => "Sender/Receiver",
			LegendEntry::QpidBroker => "Qpid broker",
			LegendEntry::ArtemisBroker => "Artemis broker",
			LegendEntry::Service => "Service",
		}
	}

	/// Category a node is drawn as. Clients of unknown direction and
	/// on-demand connections that are not a known broker have none.
	pub fn of(node: &Node) -> Option<Self> {
		if node.is_router() {
			return Some(LegendEntry::Router);
		}
		if node.is_console() {
			return Some(LegendEntry::Console);
		}
		if node.is_artemis() {
			return Some(LegendEntry::ArtemisBroker);
		}
		if node.is_qpid() {
			return Some(LegendEntry::QpidBroker);
		}
		match &node.kind {
			NodeKind::Client(group) => match group.cdir {
				Cdir::In => Some(LegendEntry::Sender),
				Cdir::Out => Some(LegendEntry::Receiver),
				Cdir::Both => Some(LegendEntry::SenderReceiver),
				Cdir::Unknown => None,
			},
			NodeKind::RouteContainer(_) => Some(LegendEntry::Service),
			NodeKind::OnDemand(_) => None,
			NodeKind::Router => Some(LegendEntry::Router),
		}
	}
}

/// Categories present in `graph`, in legend order.
pub fn legend(graph: &Graph) -> Vec<LegendEntry> {
	let mut entries: Vec<LegendEntry> = graph.nodes.iter().filter_map(LegendEntry::of).collect();
	entries.sort();
	entries.dedup();
	entries
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::topology::builder::GraphBuilder;
	use crate::topology::fixtures::*;
	use crate::topology::layout::Viewport;
	use crate::topology::positions::MemoryPositions;

	#[test]
	fn router_and_sender_are_listed() {
		let store = MemoryPositions::new();
		let graph = GraphBuilder::new(&store, Viewport::default())
			.build(&two_routers_with_sender())
			.graph;
		assert_eq!(legend(&graph), vec![LegendEntry::Router, LegendEntry::Sender]);
		assert_eq!(LegendEntry::SenderReceiver.label(), "Sender/Receiver");
	}

	#[test]
	fn route_containers_are_services() {
		let store = MemoryPositions::new();
		let snapshot = routers(vec![(
			"A",
			vec![conn("5", "route-container", "in", "svc")],
			vec![],
		)]);
		let graph = GraphBuilder::new(&store, Viewport::default())
			.build(&snapshot)
			.graph;
		assert_eq!(legend(&graph), vec![LegendEntry::Router, LegendEntry::Service]);
	}

	#[test]
	fn plain_on_demand_connections_have_no_entry() {
		let store = MemoryPositions::new();
		let snapshot = routers(vec![(
			"A",
			vec![conn("5", "on-demand", "out", "backend")],
			vec![],
		)]);
		let graph = GraphBuilder::new(&store, Viewport::default())
			.build(&snapshot)
			.graph;
		assert_eq!(graph.nodes.len(), 2);
		assert_eq!(LegendEntry::of(&graph.nodes[1]), None);
		assert_eq!(legend(&graph), vec![LegendEntry::Router]);
	}
}
