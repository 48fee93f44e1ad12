//! Management entity tables as the router's management agent reports them,
//! and the typed records the topology view reads out of them.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::{Result, TopologyError};
use super::model::{Cdir, Properties};

pub const CONNECTION: &str = "connection";
pub const ROUTER_LINK: &str = "router.link";
pub const ROUTER_NODE: &str = "router.node";
pub const ROUTER: &str = "router";
pub const LISTENER: &str = "listener";

/// One entity type's query result on one router: column names plus rows.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityTable {
	pub attribute_names: Vec<String>,
	pub results: Vec<Vec<Value>>,
}

impl EntityTable {
	pub fn new(attribute_names: &[&str]) -> Self {
		Self {
			attribute_names: attribute_names.iter().map(|a| a.to_string()).collect(),
			results: Vec::new(),
		}
	}

	pub fn with_rows(attribute_names: &[&str], rows: Vec<Vec<Value>>) -> Self {
		Self {
			results: rows,
			..Self::new(attribute_names)
		}
	}

	pub fn push_row(&mut self, row: Vec<Value>) {
		self.results.push(row);
	}

	pub fn len(&self) -> usize {
		self.results.len()
	}

	pub fn is_empty(&self) -> bool {
		self.results.is_empty()
	}

	pub fn record(&self, row: usize) -> Option<Record<'_>> {
		self.results.get(row).map(|values| Record {
			names: &self.attribute_names,
			values,
		})
	}

	pub fn records(&self) -> impl Iterator<Item = Record<'_>> {
		self.results.iter().map(|values| Record {
			names: &self.attribute_names,
			values,
		})
	}
}

/// A flattened row: attribute lookups by name.
#[derive(Clone, Copy, Debug)]
pub struct Record<'a> {
	names: &'a [String],
	values: &'a [Value],
}

impl<'a> Record<'a> {
	pub fn get(&self, attribute: &str) -> Option<&'a Value> {
		let idx = self.names.iter().position(|n| n == attribute)?;
		self.values.get(idx).filter(|v| !v.is_null())
	}

	/// Strings as-is, numbers and booleans in their JSON text form.
	pub fn text(&self, attribute: &str) -> Option<String> {
		match self.get(attribute)? {
			Value::String(s) => Some(s.clone()),
			Value::Number(n) => Some(n.to_string()),
			Value::Bool(b) => Some(b.to_string()),
			_ => None,
		}
	}

	pub fn count(&self, attribute: &str) -> u64 {
		match self.get(attribute) {
			Some(Value::Number(n)) => n.as_u64().unwrap_or(0),
			Some(Value::String(s)) => s.parse().unwrap_or(0),
			_ => 0,
		}
	}

	pub fn flag(&self, attribute: &str) -> bool {
		matches!(self.get(attribute), Some(Value::Bool(true)))
	}

	fn required(&self, entity: &'static str, attribute: &'static str) -> Result<String> {
		let value = self
			.get(attribute)
			.ok_or(TopologyError::MissingAttribute { entity, attribute })?;
		self.text(attribute)
			.ok_or_else(|| TopologyError::InvalidAttribute {
				entity,
				attribute,
				value: value.to_string(),
			})
	}
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Connection {
	pub identity: String,
	pub name: String,
	pub role: String,
	pub dir: Cdir,
	pub container: String,
	pub host: String,
	pub user: Option<String>,
	pub is_encrypted: bool,
	pub is_authenticated: bool,
	pub sasl: Option<String>,
	pub ssl_proto: Option<String>,
	pub ssl_cipher: Option<String>,
	pub tenant: Option<String>,
	pub properties: Properties,
}

impl Connection {
	pub fn from_record(record: &Record<'_>) -> Result<Self> {
		let identity = record.required(CONNECTION, "identity")?;
		let role = record.required(CONNECTION, "role")?;
		Ok(Self {
			name: record.text("name").unwrap_or_else(|| identity.clone()),
			dir: record
				.text("dir")
				.map(|d| Cdir::parse(&d))
				.unwrap_or_default(),
			container: record.text("container").unwrap_or_default(),
			host: record.text("host").unwrap_or_default(),
			user: record.text("user"),
			is_encrypted: record.flag("isEncrypted"),
			is_authenticated: record.flag("isAuthenticated"),
			sasl: record.text("sasl"),
			ssl_proto: record.text("sslProto"),
			ssl_cipher: record.text("sslCipher"),
			tenant: record.text("tenant"),
			properties: record
				.get("properties")
				.map(Properties::from_value)
				.unwrap_or_default(),
			identity,
			role,
		})
	}
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct RouterLink {
	pub link_type: String,
	pub connection_id: Option<String>,
	pub link_dir: Option<String>,
	pub owning_addr: Option<String>,
	pub undelivered: u64,
	pub unsettled: u64,
	pub rejected: u64,
	pub released: u64,
	pub modified: u64,
}

impl RouterLink {
	pub fn from_record(record: &Record<'_>) -> Result<Self> {
		Ok(Self {
			link_type: record.required(ROUTER_LINK, "linkType")?,
			connection_id: record.text("connectionId"),
			link_dir: record.text("linkDir"),
			owning_addr: record.text("owningAddr"),
			undelivered: record.count("undeliveredCount"),
			unsettled: record.count("unsettledCount"),
			rejected: record.count("rejectedCount"),
			released: record.count("releasedCount"),
			modified: record.count("modifiedCount"),
		})
	}

	/// Sum of the traffic counters used to rank links in the link popup.
	pub fn activity(&self) -> u64 {
		self.undelivered + self.unsettled + self.rejected + self.released + self.modified
	}
}

/// A `router.node` row: the next hop this router uses to reach `id`.
#[derive(Clone, Debug, PartialEq)]
pub struct RouterNodeEntry {
	pub id: String,
	pub next_hop: Option<String>,
}

impl RouterNodeEntry {
	pub fn from_record(record: &Record<'_>) -> Result<Self> {
		Ok(Self {
			id: record.required(ROUTER_NODE, "id")?,
			next_hop: record.text("nextHop"),
		})
	}
}

#[derive(Clone, Debug, PartialEq)]
pub struct RouterRecord {
	pub name: String,
	pub version: String,
	pub host_name: Option<String>,
}

impl RouterRecord {
	pub fn from_record(record: &Record<'_>) -> Result<Self> {
		Ok(Self {
			name: record.required(ROUTER, "name")?,
			version: record.text("version").unwrap_or_default(),
			host_name: record.text("hostName"),
		})
	}
}

#[derive(Clone, Debug, PartialEq)]
pub struct Listener {
	pub role: String,
	pub port: String,
}

impl Listener {
	pub fn from_record(record: &Record<'_>) -> Result<Self> {
		Ok(Self {
			role: record.text("role").unwrap_or_else(|| "normal".into()),
			port: record.required(LISTENER, "port")?,
		})
	}
}

pub type NodeEntities = HashMap<String, EntityTable>;

/// Every router's entity tables, in the order the backend reported the routers.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
	entries: Vec<(String, NodeEntities)>,
}

impl Snapshot {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn insert(&mut self, key: impl Into<String>, entities: NodeEntities) {
		let key = key.into();
		match self.position(&key) {
			Some(idx) => self.entries[idx].1 = entities,
			None => self.entries.push((key, entities)),
		}
	}

	/// Replace one entity table on a router, adding the router when it is new.
	pub fn set_entity(&mut self, key: &str, entity: &str, table: EntityTable) {
		let idx = match self.position(key) {
			Some(idx) => idx,
			None => {
				self.entries.push((key.to_string(), NodeEntities::new()));
				self.entries.len() - 1
			}
		};
		self.entries[idx].1.insert(entity.to_string(), table);
	}

	pub fn remove(&mut self, key: &str) -> Option<NodeEntities> {
		let idx = self.position(key)?;
		Some(self.entries.remove(idx).1)
	}

	pub fn position(&self, key: &str) -> Option<usize> {
		self.entries.iter().position(|(k, _)| k == key)
	}

	pub fn get(&self, key: &str) -> Option<&NodeEntities> {
		self.entries
			.iter()
			.find(|(k, _)| k == key)
			.map(|(_, entities)| entities)
	}

	pub fn entity(&self, key: &str, entity: &str) -> Option<&EntityTable> {
		self.get(key)?.get(entity)
	}

	pub fn keys(&self) -> impl Iterator<Item = &str> {
		self.entries.iter().map(|(k, _)| k.as_str())
	}

	pub fn iter(&self) -> impl Iterator<Item = (&str, &NodeEntities)> {
		self.entries.iter().map(|(k, e)| (k.as_str(), e))
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}
}

/// Router name from a management node id such as `amqp:/_topo/0/A/$management`.
pub fn name_from_id(id: &str) -> &str {
	id.split('/').nth(3).filter(|s| !s.is_empty()).unwrap_or(id)
}

pub fn id_from_name(name: &str) -> String {
	format!("amqp:/_topo/0/{name}/$management")
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	#[test]
	fn name_from_id_reads_router_segment() {
		assert_eq!(name_from_id("amqp:/_topo/0/ROUTER.A/$management"), "ROUTER.A");
		assert_eq!(name_from_id(&id_from_name("B")), "B");
		assert_eq!(name_from_id("standalone"), "standalone");
	}

	#[test]
	fn record_lookups_by_attribute_name() {
		let table = EntityTable::with_rows(
			&["identity", "role", "isEncrypted", "host"],
			vec![vec![json!(7), json!("normal"), json!(true), Value::Null]],
		);
		let record = table.record(0).unwrap();
		assert_eq!(record.text("identity").as_deref(), Some("7"));
		assert!(record.flag("isEncrypted"));
		assert_eq!(record.text("host"), None);
		assert!(table.record(1).is_none());
	}

	#[test]
	fn connection_without_role_is_rejected() {
		let table = EntityTable::with_rows(&["identity"], vec![vec![json!("1")]]);
		let err = Connection::from_record(&table.record(0).unwrap()).unwrap_err();
		assert!(matches!(
			err,
			TopologyError::MissingAttribute {
				attribute: "role",
				..
			}
		));
	}

	#[test]
	fn structured_identity_is_invalid() {
		let table = EntityTable::with_rows(
			&["identity", "role"],
			vec![vec![json!(["a"]), json!("normal")]],
		);
		let err = Connection::from_record(&table.record(0).unwrap()).unwrap_err();
		assert!(matches!(
			err,
			TopologyError::InvalidAttribute {
				attribute: "identity",
				..
			}
		));
	}

	#[test]
	fn connection_decodes_properties_and_dir() {
		let table = EntityTable::with_rows(
			&["identity", "role", "dir", "container", "properties"],
			vec![vec![
				json!("3"),
				json!("route-container"),
				json!("out"),
				json!("broker"),
				json!({"product": "qpid-cpp"}),
			]],
		);
		let conn = Connection::from_record(&table.record(0).unwrap()).unwrap();
		assert_eq!(conn.dir, Cdir::Out);
		assert_eq!(conn.name, "3");
		assert_eq!(conn.properties.product.as_deref(), Some("qpid-cpp"));
	}

	#[test]
	fn snapshot_keeps_backend_order() {
		let mut snapshot = Snapshot::new();
		snapshot.set_entity("b", CONNECTION, EntityTable::default());
		snapshot.set_entity("a", CONNECTION, EntityTable::default());
		snapshot.set_entity("b", ROUTER_LINK, EntityTable::default());
		assert_eq!(snapshot.keys().collect::<Vec<_>>(), vec!["b", "a"]);
		assert_eq!(snapshot.get("b").map(|e| e.len()), Some(2));
		snapshot.remove("b");
		assert_eq!(snapshot.len(), 1);
	}
}
