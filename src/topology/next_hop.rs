//! Route highlighting between a selected router and the one under the mouse.

use std::collections::HashMap;

use log::warn;

use super::entity::{ROUTER_NODE, RouterNodeEntry, Snapshot, name_from_id};
use super::model::Graph;

/// Per router name: destination router name -> next hop (`None` for a direct neighbour).
#[derive(Clone, Debug, Default)]
pub struct NextHopTable {
	routes: HashMap<String, HashMap<String, Option<String>>>,
}

impl NextHopTable {
	pub fn from_snapshot(snapshot: &Snapshot) -> Self {
		let mut routes = HashMap::new();
		for (key, entities) in snapshot.iter() {
			let Some(table) = entities.get(ROUTER_NODE) else {
				continue;
			};
			let hops = table
				.records()
				.filter_map(|r| match RouterNodeEntry::from_record(&r) {
					Ok(entry) => Some((entry.id, entry.next_hop)),
					Err(e) => {
						warn!("ignoring router.node row on {key}: {e}");
						None
					}
				})
				.collect();
			routes.insert(name_from_id(key).to_string(), hops);
		}
		Self { routes }
	}

	/// The router `from` forwards to on the way to `to`.
	pub fn next_hop<'a>(&'a self, from: &str, to: &'a str) -> Option<&'a str> {
		let hop = self.routes.get(from)?.get(to)?;
		Some(hop.as_deref().unwrap_or(to))
	}
}

/// Highlight every link and node on the path from `selected` to `hovered`.
///
/// Walks at most one hop per node, so a looping table cannot hang the view.
/// Returns whether the walk reached `hovered`.
pub fn highlight_route(
	graph: &mut Graph,
	table: &NextHopTable,
	selected: usize,
	hovered: usize,
) -> bool {
	let destination = graph.nodes[hovered].name.clone();
	let mut current = selected;
	for _ in 0..graph.nodes.len() {
		if current == hovered {
			break;
		}
		let Some(target) = table
			.next_hop(&graph.nodes[current].name, &destination)
			.and_then(|hop| graph.node_by_name(hop))
		else {
			return false;
		};
		let Some(link) = graph.link_for(current, target) else {
			return false;
		};
		graph.links[link].highlighted = true;
		graph.nodes[current].highlighted = true;
		current = target;
	}
	if current != hovered {
		return false;
	}
	graph.nodes[hovered].highlighted = true;
	true
}
