//! Error taxonomy of the codec.
//!
//! Decoders fail fast on the offending byte; no partial result is returned.
//! Builder invariant violations fail at the offending call.

use thiserror::Error;

/// Crate-wide result type.
pub type Result<T> = std::result::Result<T, CodecError>;

/// All errors the codec can produce.
#[derive(Debug, Error)]
pub enum CodecError {
	/// Varint overflow, truncated frame, wrong tag type, odd-length v2
	/// attribute stream, type-code mismatch in an attribute context.
	#[error("malformed input: {0}")]
	MalformedInput(String),

	/// Intern-table or scaling-table index beyond the table size.
	#[error("index out of range: {0}")]
	OutOfRange(String),

	/// A version-3-only field or API used with a version 1/2 layer, or vice
	/// versa.
	#[error("version mismatch: {0}")]
	VersionMismatch(String),

	/// Unknown command id, MoveTo count != 1 where required, unclosed ring,
	/// elevation stream length != vertex count.
	#[error("geometry error: {0}")]
	Geometry(String),

	/// A builder method called in the wrong state.
	#[error("builder state error: {0}")]
	BuilderState(String),
}

macro_rules! bail {
	($kind:ident, $($arg:tt)*) => {
		return Err($crate::error::CodecError::$kind(format!($($arg)*)))
	};
}

macro_rules! ensure {
	($cond:expr, $kind:ident, $($arg:tt)*) => {
		if !($cond) {
			return Err($crate::error::CodecError::$kind(format!($($arg)*)));
		}
	};
}

pub(crate) use bail;
pub(crate) use ensure;
