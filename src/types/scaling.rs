use crate::error::{Result, bail};
use crate::io::{ValueReaderSlice, ValueWriterBlob};

/// An affine transform turning stored integer deltas into doubles.
///
/// Version 3 layers carry one implicit elevation scaling plus any number of
/// attribute scalings referenced by index from number lists and per-vertex
/// attribute streams.
#[derive(Clone, Debug, PartialEq)]
pub struct Scaling {
	pub offset: i64,
	pub multiplier: f64,
	pub base: f64,
}

impl Default for Scaling {
	fn default() -> Self {
		Scaling {
			offset: 0,
			multiplier: 1.0,
			base: 0.0,
		}
	}
}

impl Scaling {
	pub fn new(offset: i64, multiplier: f64, base: f64) -> Scaling {
		Scaling { offset, multiplier, base }
	}

	/// Maps a stored integer onto its real value.
	pub fn apply(&self, value: i64) -> f64 {
		self.base + self.offset as f64 + value as f64 * self.multiplier
	}

	pub fn is_default(&self) -> bool {
		self.offset == 0 && self.multiplier == 1.0 && self.base == 0.0
	}

	pub(crate) fn read(reader: &mut ValueReaderSlice) -> Result<Scaling> {
		let mut scaling = Scaling::default();
		while reader.has_remaining() {
			match reader.read_pbf_key()? {
				(1, 0) => scaling.offset = reader.read_svarint()?,
				(2, 1) => scaling.multiplier = reader.read_f64()?,
				(3, 1) => scaling.base = reader.read_f64()?,
				(f, w) => bail!(MalformedInput, "unexpected field {f} with wire type {w} in scaling"),
			}
		}
		Ok(scaling)
	}

	pub(crate) fn write(&self, writer: &mut ValueWriterBlob) {
		let mut message = ValueWriterBlob::new();
		if self.offset != 0 {
			message.write_pbf_key(1, 0);
			message.write_svarint(self.offset);
		}
		if self.multiplier != 1.0 {
			message.write_pbf_key(2, 1);
			message.write_f64(self.multiplier);
		}
		if self.base != 0.0 {
			message.write_pbf_key(3, 1);
			message.write_f64(self.base);
		}
		writer.write_pbf_message(&message);
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use anyhow::Result;

	#[test]
	fn test_apply() {
		let scaling = Scaling::new(10, 2.0, 0.5);
		assert_eq!(scaling.apply(0), 10.5);
		assert_eq!(scaling.apply(3), 16.5);
		assert_eq!(scaling.apply(-3), 4.5);

		assert_eq!(Scaling::default().apply(42), 42.0);
	}

	#[test]
	fn test_round_trip() -> Result<()> {
		let scaling = Scaling::new(-7, 0.25, 100.0);
		let mut writer = ValueWriterBlob::new();
		scaling.write(&mut writer);

		let blob = writer.into_blob();
		let mut reader = ValueReaderSlice::new(blob.as_slice());
		let mut sub = reader.get_pbf_sub_reader()?;
		assert_eq!(Scaling::read(&mut sub)?, scaling);
		Ok(())
	}

	#[test]
	fn test_default_writes_empty_message() {
		let mut writer = ValueWriterBlob::new();
		Scaling::default().write(&mut writer);
		assert_eq!(writer.into_blob().into_vec(), vec![0]);
	}

	#[test]
	fn test_read_rejects_unknown_field() {
		let data = vec![0x20, 0x01]; // field 4, wire type 0
		let mut reader = ValueReaderSlice::new(&data);
		assert!(Scaling::read(&mut reader).is_err());
	}
}
