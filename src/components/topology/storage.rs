//! Browser local storage for node positions and view options.

use log::warn;
use serde::{Deserialize, Serialize};
use web_sys::Storage;

use crate::topology::positions::{Position, PositionStore};
use crate::topology::{Result, TopologyError};

/// Key the view options are saved under.
pub const OPTIONS_KEY: &str = "topoOptions";

fn local_storage() -> Option<Storage> {
	web_sys::window()?.local_storage().ok().flatten()
}

fn write(storage: &Storage, key: &str, value: &str) -> Result<()> {
	storage
		.set_item(key, value)
		.map_err(|e| TopologyError::Storage(format!("{key}: {e:?}")))
}

/// Node positions keyed by node name, one JSON value per entry.
pub struct StoragePositions {
	storage: Option<Storage>,
}

impl StoragePositions {
	pub fn new() -> Self {
		let storage = local_storage();
		if storage.is_none() {
			warn!("local storage unavailable, node positions will not persist");
		}
		Self { storage }
	}
}

impl Default for StoragePositions {
	fn default() -> Self {
		Self::new()
	}
}

impl PositionStore for StoragePositions {
	fn get(&self, name: &str) -> Option<Position> {
		let raw = self.storage.as_ref()?.get_item(name).ok().flatten()?;
		match Position::from_json(&raw) {
			Ok(position) => Some(position),
			Err(e) => {
				warn!("ignoring saved position for {name}: {e}");
				None
			}
		}
	}

	fn set(&mut self, name: &str, position: Position) {
		let Some(storage) = &self.storage else {
			return;
		};
		if let Err(e) = position.to_json().and_then(|json| write(storage, name, &json)) {
			warn!("could not save position for {name}: {e}");
		}
	}
}

/// User settings for the topology page.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TopologyOptions {
	pub legend_open: bool,
	pub poll_interval_ms: f64,
}

impl Default for TopologyOptions {
	fn default() -> Self {
		Self {
			legend_open: true,
			poll_interval_ms: 2000.0,
		}
	}
}

impl TopologyOptions {
	pub fn from_json(s: &str) -> Result<Self> {
		Ok(serde_json::from_str(s)?)
	}

	pub fn to_json(&self) -> Result<String> {
		Ok(serde_json::to_string(self)?)
	}

	/// Saved options, or the defaults when none are saved or they do not parse.
	pub fn load() -> Self {
		let Some(raw) = local_storage().and_then(|s| s.get_item(OPTIONS_KEY).ok().flatten()) else {
			return Self::default();
		};
		Self::from_json(&raw).unwrap_or_else(|e| {
			warn!("ignoring saved topology options: {e}");
			Self::default()
		})
	}

	pub fn save(&self) {
		let Some(storage) = local_storage() else {
			return;
		};
		if let Err(e) = self.to_json().and_then(|json| write(&storage, OPTIONS_KEY, &json)) {
			warn!("could not save topology options: {e}");
		}
	}
}
