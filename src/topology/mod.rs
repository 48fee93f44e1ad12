//! Network topology model: snapshot decoding, graph building, change
//! detection, force layout and the session that ties them together.

pub mod builder;
pub mod change;
pub mod demo;
pub mod entity;
pub mod error;
pub mod layout;
pub mod legend;
pub mod model;
pub mod next_hop;
pub mod positions;
pub mod session;
pub mod source;
pub mod tooltip;

#[cfg(test)]
mod fixtures;

pub use error::{Result, TopologyError};
pub use session::TopologySession;
