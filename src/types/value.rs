//! Attribute value types.
//!
//! [`PropertyValue`] is the borrowed view of a legacy (v1/v2) value-table
//! entry. [`AttributeValue`] is the input type of the builder; in a v1/v2
//! layer it is interned into the value table, in a v3 layer it is encoded
//! as a complex value against the layer's string/double/float/int tables.

use crate::error::{Result, bail};
use crate::io::{ValueReaderSlice, ValueWriterBlob};

/// A legacy value-table entry, borrowed from the tile buffer.
///
/// Exactly one variant is present per entry. `Int` is the plain-varint
/// encoding, `SInt` the zigzag one; both hold signed integers.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum PropertyValue<'a> {
	String(&'a str),
	Float(f32),
	Double(f64),
	Int(i64),
	UInt(u64),
	SInt(i64),
	Bool(bool),
}

impl<'a> PropertyValue<'a> {
	pub(crate) fn read(reader: &mut ValueReaderSlice<'a>) -> Result<PropertyValue<'a>> {
		let mut value = None;
		while reader.has_remaining() {
			value = Some(match reader.read_pbf_key()? {
				(1, 2) => PropertyValue::String(reader.read_pbf_string()?),
				(2, 5) => PropertyValue::Float(reader.read_f32()?),
				(3, 1) => PropertyValue::Double(reader.read_f64()?),
				(4, 0) => PropertyValue::Int(reader.read_varint()? as i64),
				(5, 0) => PropertyValue::UInt(reader.read_varint()?),
				(6, 0) => PropertyValue::SInt(reader.read_svarint()?),
				(7, 0) => PropertyValue::Bool(reader.read_varint()? != 0),
				(f, w) => bail!(MalformedInput, "unexpected field {f} with wire type {w} in value message"),
			});
		}
		match value {
			Some(value) => Ok(value),
			None => bail!(MalformedInput, "empty value message"),
		}
	}

	pub(crate) fn write(&self, writer: &mut ValueWriterBlob) {
		let mut message = ValueWriterBlob::new();
		match self {
			PropertyValue::String(s) => {
				message.write_pbf_key(1, 2);
				message.write_pbf_string(s);
			}
			PropertyValue::Float(f) => {
				message.write_pbf_key(2, 5);
				message.write_f32(*f);
			}
			PropertyValue::Double(d) => {
				message.write_pbf_key(3, 1);
				message.write_f64(*d);
			}
			PropertyValue::Int(i) => {
				message.write_pbf_key(4, 0);
				message.write_varint(*i as u64);
			}
			PropertyValue::UInt(u) => {
				message.write_pbf_key(5, 0);
				message.write_varint(*u);
			}
			PropertyValue::SInt(i) => {
				message.write_pbf_key(6, 0);
				message.write_svarint(*i);
			}
			PropertyValue::Bool(b) => {
				message.write_pbf_key(7, 0);
				message.write_varint(u64::from(*b));
			}
		}
		writer.write_pbf_message(&message);
	}
}

/// A value handed to the builder.
#[derive(Clone, Debug, PartialEq)]
pub enum AttributeValue<'a> {
	String(&'a str),
	Float(f32),
	Double(f64),
	/// Signed integer stored via the v3 int table (plain varint in v1/v2).
	Int(i64),
	UInt(u64),
	/// Signed integer stored inline with zigzag encoding.
	SInt(i64),
	Bool(bool),
	/// Only representable in version 3 layers.
	Null,
}

impl<'a> AttributeValue<'a> {
	/// The legacy value-table form of this value, or an error for `Null`.
	pub(crate) fn as_property_value(&self) -> Result<PropertyValue<'a>> {
		Ok(match self {
			AttributeValue::String(s) => PropertyValue::String(s),
			AttributeValue::Float(f) => PropertyValue::Float(*f),
			AttributeValue::Double(d) => PropertyValue::Double(*d),
			AttributeValue::Int(i) => PropertyValue::Int(*i),
			AttributeValue::UInt(u) => PropertyValue::UInt(*u),
			AttributeValue::SInt(i) => PropertyValue::SInt(*i),
			AttributeValue::Bool(b) => PropertyValue::Bool(*b),
			AttributeValue::Null => bail!(VersionMismatch, "null attribute values require a version 3 layer"),
		})
	}
}

impl<'a> From<&'a str> for AttributeValue<'a> {
	fn from(value: &'a str) -> Self {
		AttributeValue::String(value)
	}
}

impl From<f32> for AttributeValue<'_> {
	fn from(value: f32) -> Self {
		AttributeValue::Float(value)
	}
}

impl From<f64> for AttributeValue<'_> {
	fn from(value: f64) -> Self {
		AttributeValue::Double(value)
	}
}

impl From<i32> for AttributeValue<'_> {
	fn from(value: i32) -> Self {
		AttributeValue::SInt(i64::from(value))
	}
}

impl From<i64> for AttributeValue<'_> {
	fn from(value: i64) -> Self {
		AttributeValue::SInt(value)
	}
}

impl From<u32> for AttributeValue<'_> {
	fn from(value: u32) -> Self {
		AttributeValue::UInt(u64::from(value))
	}
}

impl From<u64> for AttributeValue<'_> {
	fn from(value: u64) -> Self {
		AttributeValue::UInt(value)
	}
}

impl From<bool> for AttributeValue<'_> {
	fn from(value: bool) -> Self {
		AttributeValue::Bool(value)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use anyhow::Result;

	fn round_trip(value: PropertyValue) -> Result<()> {
		let mut writer = ValueWriterBlob::new();
		value.write(&mut writer);
		let blob = writer.into_blob();
		let mut reader = ValueReaderSlice::new(blob.as_slice());
		let mut sub = reader.get_pbf_sub_reader()?;
		assert_eq!(PropertyValue::read(&mut sub)?, value);
		Ok(())
	}

	#[test]
	fn test_round_trips() -> Result<()> {
		round_trip(PropertyValue::String("hello"))?;
		round_trip(PropertyValue::Float(2.7))?;
		round_trip(PropertyValue::Double(-1.25))?;
		round_trip(PropertyValue::Int(-123456))?;
		round_trip(PropertyValue::UInt(u64::MAX))?;
		round_trip(PropertyValue::SInt(-14))?;
		round_trip(PropertyValue::Bool(true))?;
		round_trip(PropertyValue::Bool(false))?;
		Ok(())
	}

	#[test]
	fn test_read_string() -> Result<()> {
		let data = vec![0x0A, 0x05, b'h', b'e', b'l', b'l', b'o'];
		let mut reader = ValueReaderSlice::new(&data);
		assert_eq!(PropertyValue::read(&mut reader)?, PropertyValue::String("hello"));
		Ok(())
	}

	#[test]
	fn test_read_sint() -> Result<()> {
		let data = vec![0x30, 0x96, 0x01]; // field 6: zigzag 150 = 75
		let mut reader = ValueReaderSlice::new(&data);
		assert_eq!(PropertyValue::read(&mut reader)?, PropertyValue::SInt(75));
		Ok(())
	}

	#[test]
	fn test_read_empty_message_fails() {
		let mut reader = ValueReaderSlice::new(&[]);
		assert!(PropertyValue::read(&mut reader).is_err());
	}

	#[test]
	fn test_attribute_value_conversions() {
		assert_eq!(AttributeValue::from("foo"), AttributeValue::String("foo"));
		assert_eq!(AttributeValue::from(17u32), AttributeValue::UInt(17));
		assert_eq!(AttributeValue::from(-22), AttributeValue::SInt(-22));
		assert_eq!(AttributeValue::from(true), AttributeValue::Bool(true));
	}

	#[test]
	fn test_null_has_no_legacy_form() {
		assert!(AttributeValue::Null.as_property_value().is_err());
	}
}
