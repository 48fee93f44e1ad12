use thiserror::Error;

/// Errors raised while decoding management entities or persisted console state.
#[derive(Debug, Error)]
pub enum TopologyError {
	#[error("{entity} record has no `{attribute}` attribute")]
	MissingAttribute {
		entity: &'static str,
		attribute: &'static str,
	},

	#[error("{entity} attribute `{attribute}` has an unexpected value: {value}")]
	InvalidAttribute {
		entity: &'static str,
		attribute: &'static str,
		value: String,
	},

	#[error("unknown connection role `{0}`")]
	UnknownRole(String),

	#[error("storage unavailable: {0}")]
	Storage(String),

	#[error(transparent)]
	Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, TopologyError>;
