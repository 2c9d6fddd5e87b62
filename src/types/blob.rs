//! [`Blob`] is a thin wrapper around [`Vec<u8>`] used for serialized output.
//!
//! Decoding never produces a `Blob`; decode entities borrow the caller's
//! buffer. The builder returns its result as a `Blob` so the bytes outlive
//! the builder.

use std::fmt::Debug;

/// An owned byte buffer, produced by the builder's `serialize()`.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Blob(Vec<u8>);

impl Blob {
	/// Creates an empty `Blob`.
	#[must_use]
	pub fn new_empty() -> Blob {
		Blob(Vec::new())
	}

	/// Returns the content as a byte slice.
	#[must_use]
	pub fn as_slice(&self) -> &[u8] {
		&self.0
	}

	/// Consumes the `Blob` and returns the underlying vector.
	#[must_use]
	pub fn into_vec(self) -> Vec<u8> {
		self.0
	}

	#[must_use]
	pub fn len(&self) -> usize {
		self.0.len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}
}

impl From<Vec<u8>> for Blob {
	fn from(vec: Vec<u8>) -> Self {
		Blob(vec)
	}
}

impl From<&[u8]> for Blob {
	fn from(slice: &[u8]) -> Self {
		Blob(slice.to_vec())
	}
}

impl Debug for Blob {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Blob").field("len", &self.0.len()).finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_basics() {
		let blob = Blob::from(vec![1u8, 2, 3]);
		assert_eq!(blob.len(), 3);
		assert!(!blob.is_empty());
		assert_eq!(blob.as_slice(), &[1, 2, 3]);
		assert_eq!(blob.into_vec(), vec![1, 2, 3]);
	}

	#[test]
	fn test_empty() {
		let blob = Blob::new_empty();
		assert_eq!(blob.len(), 0);
		assert!(blob.is_empty());
	}

	#[test]
	fn test_debug() {
		assert_eq!(format!("{:?}", Blob::from(vec![0u8; 5])), "Blob { len: 5 }");
	}
}
