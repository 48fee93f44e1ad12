use std::collections::HashMap;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::error::Result;

/// A node's saved coordinates, keyed by node name in a [`PositionStore`].
///
/// Stored as `{"x": .., "y": .., "fixed": 0|1}`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
	pub x: f64,
	pub y: f64,
	#[serde(
		default,
		serialize_with = "fixed_as_int",
		deserialize_with = "fixed_from_int_or_bool"
	)]
	pub fixed: bool,
}

impl Position {
	pub fn new(x: f64, y: f64) -> Self {
		Self { x, y, fixed: false }
	}

	pub fn to_json(&self) -> Result<String> {
		Ok(serde_json::to_string(self)?)
	}

	pub fn from_json(s: &str) -> Result<Self> {
		Ok(serde_json::from_str(s)?)
	}
}

fn fixed_as_int<S: Serializer>(fixed: &bool, s: S) -> std::result::Result<S::Ok, S::Error> {
	s.serialize_u8(u8::from(*fixed))
}

fn fixed_from_int_or_bool<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<bool, D::Error> {
	#[derive(Deserialize)]
	#[serde(untagged)]
	enum Fixed {
		Flag(bool),
		Bits(i64),
	}
	Ok(match Fixed::deserialize(d)? {
		Fixed::Flag(b) => b,
		Fixed::Bits(n) => n & 1 == 1,
	})
}

/// Client-side storage of node positions that survives page reloads.
pub trait PositionStore {
	fn get(&self, name: &str) -> Option<Position>;
	fn set(&mut self, name: &str, position: Position);
}

#[derive(Clone, Debug, Default)]
pub struct MemoryPositions {
	saved: HashMap<String, Position>,
}

impl MemoryPositions {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn len(&self) -> usize {
		self.saved.len()
	}

	pub fn is_empty(&self) -> bool {
		self.saved.is_empty()
	}
}

impl PositionStore for MemoryPositions {
	fn get(&self, name: &str) -> Option<Position> {
		self.saved.get(name).copied()
	}

	fn set(&mut self, name: &str, position: Position) {
		self.saved.insert(name.to_string(), position);
	}
}
