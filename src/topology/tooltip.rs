//! HTML fragments for the hover popups over links, clients and routers.
//!
//! Every value taken from the management data is escaped before it is
//! interpolated, so the output can be set as inner HTML.

use std::fmt::Write;

use super::entity::{
	CONNECTION, Connection, EntityTable, LISTENER, Listener, ROUTER, ROUTER_LINK, RouterLink,
	RouterRecord, Snapshot, name_from_id,
};
use super::model::{Cdir, Graph, LinkClass, Node, NodeKind};

/// Rows shown in a link popup before it switches to a "Top N" listing.
pub const MAX_LINKS: usize = 10;

const TABLE_OPEN: &str = "<table class=\"popupTable\">";

pub fn escape_html(s: &str) -> String {
	let mut out = String::with_capacity(s.len());
	for c in s.chars() {
		match c {
			'&' => out.push_str("&amp;"),
			'<' => out.push_str("&lt;"),
			'>' => out.push_str("&gt;"),
			'"' => out.push_str("&quot;"),
			'\'' => out.push_str("&#39;"),
			_ => out.push(c),
		}
	}
	out
}

/// `1234567` -> `1,234,567`.
pub fn pretty(n: u64) -> String {
	let digits = n.to_string();
	let mut out = String::with_capacity(digits.len() + digits.len() / 3);
	for (i, c) in digits.chars().enumerate() {
		if i > 0 && (digits.len() - i) % 3 == 0 {
			out.push(',');
		}
		out.push(c);
	}
	out
}

/// Strip the address class prefix: `M0` for mobile addresses, one character otherwise.
pub fn addr_text(addr: &str) -> &str {
	if addr.is_empty() {
		return "-";
	}
	let skip = if addr.starts_with('M') { 2 } else { 1 };
	addr.get(skip..).unwrap_or("")
}

pub fn identity_clean(identity: &str) -> &str {
	match identity.find('/') {
		Some(pos) => &identity[pos + 1..],
		None => identity,
	}
}

/// Hover title for a node; `" x N"` is appended for collapsed groups.
pub fn title(node: &Node) -> String {
	let count = node.multiplicity();
	let x = if count > 1 {
		format!(" x {count}")
	} else {
		String::new()
	};
	if node.is_console() {
		return format!("Dispatch console{x}");
	}
	if node.is_artemis() {
		return format!("Broker - Artemis{x}");
	}
	if node.is_qpid() {
		return format!("Broker - qpid-cpp{x}");
	}
	match &node.kind {
		NodeKind::Client(group) => match group.cdir {
			Cdir::In => format!("Sender{x}"),
			Cdir::Out => format!("Receiver{x}"),
			Cdir::Both => format!("Sender/Receiver{x}"),
			Cdir::Unknown => format!("client{x}"),
		},
		NodeKind::OnDemand(_) => "broker".into(),
		_ => node.properties.product.clone().unwrap_or_default(),
	}
}

pub fn client_tooltip(node: &Node) -> String {
	let mut html = format!(
		"{TABLE_OPEN}<tr><td>Type</td><td>{}</td></tr>",
		escape_html(&title(node))
	);
	if node.multiplicity() < 2 {
		let host = match &node.kind {
			NodeKind::Client(group) => group.normals.first().map(|n| n.host.as_str()),
			NodeKind::OnDemand(ep) | NodeKind::RouteContainer(ep) => Some(ep.connection.host.as_str()),
			NodeKind::Router => None,
		};
		let _ = write!(
			html,
			"<tr><td>Host</td><td>{}</td></tr>",
			escape_html(host.unwrap_or(""))
		);
	}
	html.push_str("</table>");
	html
}

/// Router name, host, version and client listener ports. `None` until the
/// `router` entity has been fetched for this router.
pub fn router_tooltip(snapshot: &Snapshot, node: &Node) -> Option<String> {
	let router = snapshot
		.entity(&node.key, ROUTER)?
		.record(0)
		.and_then(|r| RouterRecord::from_record(&r).ok())?;
	let mut html = format!(
		"{TABLE_OPEN}<tr><td>Router</td><td>{}</td></tr>",
		escape_html(&router.name)
	);
	if let Some(host) = &router.host_name {
		let _ = write!(html, "<tr><td>Host Name</td><td>{}</td></tr>", escape_html(host));
	}
	let _ = write!(
		html,
		"<tr><td>Version</td><td>{}</td></tr>",
		escape_html(&router.version)
	);
	let ports: Vec<String> = snapshot
		.entity(&node.key, LISTENER)
		.map(|table| {
			table
				.records()
				.filter_map(|r| Listener::from_record(&r).ok())
				.filter(|l| l.role == "normal")
				.map(|l| escape_html(&l.port))
				.collect()
		})
		.unwrap_or_default();
	if !ports.is_empty() {
		let _ = write!(html, "<tr><td>Ports</td><td>{}</td></tr>", ports.join(", "));
	}
	html.push_str("</table>");
	Some(html)
}

pub fn connection_security(conn: &Connection) -> String {
	if !conn.is_encrypted {
		return "no-security".into();
	}
	if conn.sasl.as_deref() == Some("GSSAPI") {
		return "Kerberos".into();
	}
	format!(
		"{}({})",
		conn.ssl_proto.as_deref().unwrap_or(""),
		conn.ssl_cipher.as_deref().unwrap_or("")
	)
}

pub fn connection_auth(conn: &Connection) -> String {
	if !conn.is_authenticated {
		return "no-auth".into();
	}
	let sasl = match conn.sasl.as_deref() {
		Some("GSSAPI") => "Kerberos",
		Some("EXTERNAL") => "x.509",
		Some("ANONYMOUS") => return "anonymous-user".into(),
		Some(other) => other,
		None => "",
	};
	match &conn.user {
		Some(user) => format!("{user}({sasl})"),
		None => sasl.into(),
	}
}

pub fn connection_tenant(conn: &Connection) -> Option<String> {
	let tenant = conn.tenant.as_deref()?;
	if tenant.chars().count() < 2 {
		return None;
	}
	Some(tenant.strip_suffix('/').unwrap_or(tenant).to_string())
}

/// Popup for a link: its connection's security details and the busiest
/// router links riding on it.
pub fn connection_popup(graph: &Graph, snapshot: &Snapshot, link: usize) -> String {
	let Some(l) = graph.links.get(link) else {
		return String::new();
	};
	let (left, right) = if l.left {
		(&graph.nodes[l.source], &graph.nodes[l.target])
	} else {
		(&graph.nodes[l.target], &graph.nodes[l.source])
	};
	let Some(table) = snapshot.entity(&left.key, CONNECTION) else {
		return String::new();
	};
	let right_router = name_from_id(&right.key);
	let row = table
		.records()
		.position(|r| r.text("container").as_deref() == Some(right_router))
		.or(left.result_index)
		.or(right.result_index);
	let Some(conn) = row
		.and_then(|row| table.record(row))
		.and_then(|r| Connection::from_record(&r).ok())
	else {
		return String::new();
	};

	let conns = if l.class == LinkClass::Small {
		group_connections(graph, l.source, l.target, table).unwrap_or_else(|| vec![conn])
	} else {
		vec![conn]
	};

	let mut html = String::new();
	if let [conn] = conns.as_slice() {
		html.push_str("<h5>Connection</h5>");
		html.push_str(TABLE_OPEN);
		html.push_str("<tr class=\"header\"><td>Security</td><td>Authentication</td><td>Tenant</td><td>Host</td></tr>");
		let _ = write!(
			html,
			"<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
			escape_html(&connection_security(conn)),
			escape_html(&connection_auth(conn)),
			escape_html(connection_tenant(conn).as_deref().unwrap_or("--")),
			escape_html(&conn.host)
		);
		html.push_str("</table>");
	}
	if let Some(links) = snapshot.entity(&left.key, ROUTER_LINK) {
		html.push_str(&links_table(links, &conns));
	}
	html
}

/// Every member connection of the client group at either end of a small link.
fn group_connections(
	graph: &Graph,
	source: usize,
	target: usize,
	table: &EntityTable,
) -> Option<Vec<Connection>> {
	let normals = graph.nodes[target]
		.kind
		.normals()
		.or_else(|| graph.nodes[source].kind.normals())?;
	Some(
		normals
			.iter()
			.filter_map(|n| table.record(n.row))
			.filter_map(|r| Connection::from_record(&r).ok())
			.collect(),
	)
}

pub fn links_table(links: &EntityTable, conns: &[Connection]) -> String {
	const FIELDS: [&str; 5] = ["undelivered", "unsettled", "rejected", "released", "modified"];

	let mut rows: Vec<RouterLink> = links
		.records()
		.filter_map(|r| RouterLink::from_record(&r).ok())
		.filter(|l| l.link_type != "router-control")
		.filter(|l| {
			l.connection_id
				.as_deref()
				.is_some_and(|id| conns.iter().any(|c| c.identity == id))
		})
		.collect();
	// stable: equally busy links keep the router's order
	rows.sort_by(|a, b| b.activity().cmp(&a.activity()));
	let has_address = rows.iter().any(|l| l.owning_addr.is_some());

	let heading = if rows.len() > MAX_LINKS {
		format!("<h4>Top {MAX_LINKS} Links</h4>")
	} else {
		"<h5>Links</h5>".to_string()
	};

	let mut html = String::from(TABLE_OPEN);
	html.push_str("<tr class=\"header\">");
	if has_address {
		html.push_str("<td>address</td>");
	}
	html.push_str("<td>dir</td>");
	for f in FIELDS {
		let _ = write!(html, "<td>{f}</td>");
	}
	html.push_str("</tr>");

	for link in rows.iter().take(MAX_LINKS) {
		html.push_str("<tr>");
		if has_address {
			let addr = link
				.owning_addr
				.as_deref()
				.map(|a| addr_text(identity_clean(a)))
				.unwrap_or("-");
			let _ = write!(html, "<td>{}</td>", escape_html(addr));
		}
		let _ = write!(
			html,
			"<td>{}</td>",
			escape_html(link.link_dir.as_deref().unwrap_or(""))
		);
		for n in [
			link.undelivered,
			link.unsettled,
			link.rejected,
			link.released,
			link.modified,
		] {
			let _ = write!(html, "<td align=\"right\">{}</td>", pretty(n));
		}
		html.push_str("</tr>");
	}
	html.push_str("</table>");
	heading + &html
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;
	use crate::topology::builder::GraphBuilder;
	use crate::topology::fixtures::*;
	use crate::topology::layout::Viewport;
	use crate::topology::positions::MemoryPositions;

	fn conn_with(encrypted: bool, authenticated: bool, sasl: Option<&str>, user: Option<&str>) -> Connection {
		Connection {
			is_encrypted: encrypted,
			is_authenticated: authenticated,
			sasl: sasl.map(str::to_string),
			user: user.map(str::to_string),
			ssl_proto: Some("TLSv1.3".into()),
			ssl_cipher: Some("AES256".into()),
			..Connection::default()
		}
	}

	#[test]
	fn numbers_get_thousands_separators() {
		assert_eq!(pretty(0), "0");
		assert_eq!(pretty(999), "999");
		assert_eq!(pretty(1000), "1,000");
		assert_eq!(pretty(1234567), "1,234,567");
	}

	#[test]
	fn addresses_lose_class_prefix() {
		assert_eq!(addr_text(identity_clean("router.address/M0queue")), "queue");
		assert_eq!(addr_text("Lrouter"), "router");
		assert_eq!(addr_text(""), "-");
	}

	#[test]
	fn security_and_auth_descriptions() {
		assert_eq!(connection_security(&conn_with(false, false, None, None)), "no-security");
		assert_eq!(connection_security(&conn_with(true, true, Some("GSSAPI"), None)), "Kerberos");
		assert_eq!(connection_security(&conn_with(true, true, None, None)), "TLSv1.3(AES256)");
		assert_eq!(connection_auth(&conn_with(true, false, None, None)), "no-auth");
		assert_eq!(connection_auth(&conn_with(true, true, Some("ANONYMOUS"), Some("bob"))), "anonymous-user");
		assert_eq!(connection_auth(&conn_with(true, true, Some("EXTERNAL"), Some("bob"))), "bob(x.509)");
		assert_eq!(connection_auth(&conn_with(true, true, Some("PLAIN"), None)), "PLAIN");
	}

	#[test]
	fn tenant_loses_trailing_slash() {
		let mut conn = Connection::default();
		assert_eq!(connection_tenant(&conn), None);
		conn.tenant = Some("/".into());
		assert_eq!(connection_tenant(&conn), None);
		conn.tenant = Some("acme/".into());
		assert_eq!(connection_tenant(&conn).as_deref(), Some("acme"));
	}

	#[test]
	fn busiest_links_first_and_truncated() {
		let conns = vec![Connection {
			identity: "5".into(),
			..Connection::default()
		}];
		let mut rows: Vec<_> = (0..12u64)
			.map(|i| traffic("5", "in", Some("M0queue"), i % 4))
			.collect();
		rows.push(traffic("6", "in", None, 9999));
		let html = links_table(&router_links(rows), &conns);
		assert!(html.starts_with("<h4>Top 10 Links</h4>"));
		assert!(!html.contains("9,999"));
		assert!(html.contains("<td>address</td>"));
		assert_eq!(html.matches("<td>queue</td>").count(), MAX_LINKS);
		let first = html.find("<td align=\"right\">3</td>").unwrap();
		let last = html.rfind("<td align=\"right\">1</td>").unwrap();
		assert!(first < last);
	}

	#[test]
	fn sender_link_popup_shows_its_connection() {
		let snapshot = two_routers_with_sender();
		let store = MemoryPositions::new();
		let graph = GraphBuilder::new(&store, Viewport::default())
			.build(&snapshot)
			.graph;
		let html = connection_popup(&graph, &snapshot, 1);
		assert!(html.starts_with("<h5>Connection</h5>"));
		assert!(html.contains("<td>no-security</td><td>no-auth</td><td>--</td><td>10.0.0.2:5672</td>"));
		assert!(html.contains("<h5>Links</h5>"));
		assert_eq!(html.matches("<td>in</td>").count(), 2);
	}

	#[test]
	fn router_popup_needs_router_entity() {
		let mut snapshot = two_routers_with_sender();
		let store = MemoryPositions::new();
		let graph = GraphBuilder::new(&store, Viewport::default())
			.build(&snapshot)
			.graph;
		assert_eq!(router_tooltip(&snapshot, &graph.nodes[0]), None);

		snapshot.set_entity(
			&id_for("A"),
			ROUTER,
			EntityTable::with_rows(&["name", "version", "hostName"], vec![vec![json!("A"), json!("1.9"), json!("<host>")]]),
		);
		snapshot.set_entity(
			&id_for("A"),
			LISTENER,
			EntityTable::with_rows(
				&["role", "port"],
				vec![vec![json!("normal"), json!(5672)], vec![json!("inter-router"), json!(55672)]],
			),
		);
		let html = router_tooltip(&snapshot, &graph.nodes[0]).unwrap();
		assert!(html.contains("<td>Router</td><td>A</td>"));
		assert!(html.contains("&lt;host&gt;"));
		assert!(html.contains("<td>Ports</td><td>5672</td>"));
	}

	#[test]
	fn client_titles_and_tooltip() {
		let snapshot = two_routers_with_sender();
		let store = MemoryPositions::new();
		let graph = GraphBuilder::new(&store, Viewport::default())
			.build(&snapshot)
			.graph;
		assert_eq!(title(&graph.nodes[2]), "Sender");
		assert_eq!(
			client_tooltip(&graph.nodes[2]),
			"<table class=\"popupTable\"><tr><td>Type</td><td>Sender</td></tr><tr><td>Host</td><td>10.0.0.2:5672</td></tr></table>"
		);
	}
}
