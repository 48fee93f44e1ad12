//! Snapshot builders shared by the topology unit tests.

use serde_json::{Value, json};

use super::entity::{
	CONNECTION, EntityTable, ROUTER_LINK, ROUTER_NODE, Snapshot, id_from_name,
};

pub const CONNECTION_ATTRS: &[&str] = &[
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
	"tenant",
	"properties",
];
pub const PROPERTIES_COLUMN: usize = 11;

pub const LINK_ATTRS: &[&str] = &[
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

pub fn id_for(name: &str) -> String {
	id_from_name(name)
}

pub fn conn(identity: &str, role: &str, dir: &str, container: &str) -> Vec<Value> {
	vec![
		json!(identity),
		json!(format!("connection/{identity}")),
		json!(role),
		json!(dir),
		json!(container),
		json!(format!("10.0.0.{identity}:5672")),
		Value::Null,
		json!(false),
		json!(false),
		Value::Null,
		Value::Null,
		json!({}),
	]
}

pub fn connections(rows: Vec<Vec<Value>>) -> EntityTable {
	EntityTable::with_rows(CONNECTION_ATTRS, rows)
}

pub fn endpoint(connection_id: &str, dir: &str) -> Vec<Value> {
	traffic(connection_id, dir, None, 0)
}

/// An endpoint link with `busy` undelivered deliveries.
pub fn traffic(connection_id: &str, dir: &str, addr: Option<&str>, busy: u64) -> Vec<Value> {
	vec![
		json!("endpoint"),
		json!(connection_id),
		json!(dir),
		addr.map_or(Value::Null, |a| json!(a)),
		json!(busy),
		json!(0),
		json!(0),
		json!(0),
		json!(0),
	]
}

pub fn router_links(rows: Vec<Vec<Value>>) -> EntityTable {
	EntityTable::with_rows(LINK_ATTRS, rows)
}

pub fn next_hops(rows: &[(&str, Option<&str>)]) -> EntityTable {
	EntityTable::with_rows(
		&["id", "nextHop"],
		rows.iter()
			.map(|(id, hop)| vec![json!(id), hop.map_or(Value::Null, |h| json!(h))])
			.collect(),
	)
}

pub fn routers(spec: Vec<(&str, Vec<Vec<Value>>, Vec<Vec<Value>>)>) -> Snapshot {
	let mut snapshot = Snapshot::new();
	for (name, conns, links) in spec {
		let key = id_for(name);
		snapshot.set_entity(&key, CONNECTION, connections(conns));
		snapshot.set_entity(&key, ROUTER_LINK, router_links(links));
	}
	snapshot
}

/// A and B joined by an inter-router connection; A has one sender with two inbound links.
pub fn two_routers_with_sender() -> Snapshot {
	routers(vec![
		(
			"A",
			vec![
				conn("1", "inter-router", "out", "B"),
				conn("2", "normal", "in", "client-1"),
			],
			vec![endpoint("2", "in"), endpoint("2", "in")],
		),
		("B", vec![conn("1", "inter-router", "in", "A")], vec![]),
	])
}

/// Three routers in a line, A - B - C, with next-hop tables.
pub fn three_router_chain() -> Snapshot {
	let mut snapshot = routers(vec![
		("A", vec![conn("1", "inter-router", "out", "B")], vec![]),
		(
			"B",
			vec![
				conn("1", "inter-router", "in", "A"),
				conn("2", "inter-router", "out", "C"),
			],
			vec![],
		),
		("C", vec![conn("1", "inter-router", "in", "B")], vec![]),
	]);
	snapshot.set_entity(
		&id_for("A"),
		ROUTER_NODE,
		next_hops(&[("B", None), ("C", Some("B"))]),
	);
	snapshot.set_entity(
		&id_for("B"),
		ROUTER_NODE,
		next_hops(&[("A", None), ("C", None)]),
	);
	snapshot.set_entity(
		&id_for("C"),
		ROUTER_NODE,
		next_hops(&[("A", Some("B")), ("B", None)]),
	);
	snapshot
}

/// `count` routers in a line, R0 - R1 - ... , with no clients.
pub fn router_line(count: usize) -> Snapshot {
	let names: Vec<String> = (0..count).map(|i| format!("R{i}")).collect();
	let mut snapshot = Snapshot::new();
	for (i, name) in names.iter().enumerate() {
		let mut rows = Vec::new();
		if let Some(prev) = i.checked_sub(1).map(|p| &names[p]) {
			rows.push(conn("1", "inter-router", "in", prev));
		}
		if let Some(next) = names.get(i + 1) {
			rows.push(conn("2", "inter-router", "out", next));
		}
		let key = id_for(name);
		snapshot.set_entity(&key, CONNECTION, connections(rows));
		snapshot.set_entity(&key, ROUTER_LINK, router_links(vec![]));
	}
	snapshot
}
