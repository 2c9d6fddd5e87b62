//! Attribute decoding for both layer versions.
//!
//! Version 1/2 features carry a packed stream of alternating key/value
//! intern-table indexes. Version 3 features carry *complex values*: a u64
//! tag whose low 4 bits select the type and whose upper 60 bits hold an
//! inline value, a table index, or a container size.
//!
//! Complex value types:
//!
//! | code | meaning   | payload                          |
//! |------|-----------|----------------------------------|
//! | 0    | string    | string-table index               |
//! | 1    | float     | float-table index                |
//! | 2    | double    | double-table index               |
//! | 3    | int       | int-table index                  |
//! | 4    | uint      | inline value                     |
//! | 5    | sint      | inline zigzag value              |
//! | 6    | bool/null | 0 false, 1 true, 2 null          |
//! | 7    | list      | element count                    |
//! | 8    | map       | entry count                      |
//! | 9    | number list | see below                      |
//! | 10   | per-vertex values | see below                |
//!
//! Lists and maps are followed by their elements. Number lists (9) and
//! per-vertex value streams (10) are followed by a scaling word and a run
//! of *slots*. The scaling word stores the attribute-scaling index plus
//! one; word 0 means no scaling ("raw integer"). Slot 0 is a null, any
//! other slot advances a persistent cursor by `zigzag(slot - 1)`, so
//! slot 1 encodes a delta of zero.
//!
//! In the scalar attribute section each attribute is a key index followed
//! by one complex value; types 9 and 10 are rejected there. In the
//! geometric attribute section the key index rides in the tag payload, so
//! only container types (7, 8, 9, 10) can appear at the top level.

use crate::error::{Result, bail, ensure};
use crate::io::{ValueReaderSlice, zigzag_decode};
use crate::layer::Layer;
use crate::types::PropertyValue;
use itertools::Itertools;

pub(crate) const COMPLEX_STRING: u64 = 0;
pub(crate) const COMPLEX_FLOAT: u64 = 1;
pub(crate) const COMPLEX_DOUBLE: u64 = 2;
pub(crate) const COMPLEX_INT: u64 = 3;
pub(crate) const COMPLEX_UINT: u64 = 4;
pub(crate) const COMPLEX_SINT: u64 = 5;
pub(crate) const COMPLEX_BOOL_NULL: u64 = 6;
pub(crate) const COMPLEX_LIST: u64 = 7;
pub(crate) const COMPLEX_MAP: u64 = 8;
pub(crate) const COMPLEX_NUMBER_LIST: u64 = 9;
pub(crate) const COMPLEX_VERTEX_LIST: u64 = 10;

/// Inline payloads are limited to the 60 bits above the type code.
pub(crate) const MAX_INLINE_VALUE: u64 = (1 << 60) - 1;

/// Bound on list/map nesting, so hostile input cannot exhaust the stack.
pub(crate) const MAX_NESTING_DEPTH: usize = 32;

/// Callbacks fired while decoding attributes.
///
/// Every method has a default implementation, so handlers only override
/// what they need. Returning `Ok(false)` stops decoding at the next
/// attribute boundary; errors abort immediately and propagate unchanged.
#[allow(unused_variables)]
pub trait AttributeHandler {
	fn attribute_key(&mut self, key: &str) -> Result<bool> {
		Ok(true)
	}
	fn value_string(&mut self, value: &str) -> Result<bool> {
		Ok(true)
	}
	fn value_float(&mut self, value: f32) -> Result<bool> {
		Ok(true)
	}
	fn value_double(&mut self, value: f64) -> Result<bool> {
		Ok(true)
	}
	fn value_int(&mut self, value: i64) -> Result<bool> {
		Ok(true)
	}
	fn value_uint(&mut self, value: u64) -> Result<bool> {
		Ok(true)
	}
	fn value_sint(&mut self, value: i64) -> Result<bool> {
		Ok(true)
	}
	fn value_bool(&mut self, value: bool) -> Result<bool> {
		Ok(true)
	}
	fn value_null(&mut self) -> Result<bool> {
		Ok(true)
	}
	fn start_list_attribute(&mut self, count: u32) -> Result<bool> {
		Ok(true)
	}
	fn end_list_attribute(&mut self) -> Result<bool> {
		Ok(true)
	}
	fn start_map_attribute(&mut self, count: u32) -> Result<bool> {
		Ok(true)
	}
	fn end_map_attribute(&mut self) -> Result<bool> {
		Ok(true)
	}
	/// `scaling_index` is `None` for a raw integer list; otherwise it
	/// indexes the layer's attribute scalings.
	fn start_number_list(&mut self, count: u32, scaling_index: Option<u32>) -> Result<bool> {
		Ok(true)
	}
	fn number_list_value(&mut self, value: i64) -> Result<bool> {
		Ok(true)
	}
	fn number_list_null_value(&mut self) -> Result<bool> {
		Ok(true)
	}
	fn end_number_list(&mut self) -> Result<bool> {
		Ok(true)
	}
}

pub(crate) fn to_index(payload: u64) -> Result<u32> {
	u32::try_from(payload).map_err(|_| crate::CodecError::MalformedInput(format!("index {payload} does not fit in 32 bits")))
}

macro_rules! emit {
	($self:ident, $call:expr) => {
		if !($call)? {
			$self.stopped = true;
			return Ok(());
		}
	};
}

/// Walks attribute sections and drives an [`AttributeHandler`].
///
/// One decoder can run over several sections; the attribute and value
/// counts accumulate.
pub(crate) struct AttributeDecoder<'l, 'a> {
	layer: &'l Layer<'a>,
	attribute_count: u64,
	value_count: u64,
	stopped: bool,
}

impl<'l, 'a> AttributeDecoder<'l, 'a> {
	pub fn new(layer: &'l Layer<'a>) -> AttributeDecoder<'l, 'a> {
		AttributeDecoder {
			layer,
			attribute_count: 0,
			value_count: 0,
			stopped: false,
		}
	}

	pub fn counts(&self) -> (u64, u64) {
		(self.attribute_count, self.value_count)
	}

	/// Decodes a v1/v2 packed key/value index stream.
	pub fn decode_tag_pairs<H: AttributeHandler>(&mut self, data: &[u8], handler: &mut H) -> Result<()> {
		let mut reader = ValueReaderSlice::new(data);
		let mut tag_ids = Vec::new();
		while reader.has_remaining() {
			tag_ids.push(reader.read_varint32()?);
		}
		ensure!(tag_ids.len() % 2 == 0, MalformedInput, "odd-length tag stream");

		for (key_index, value_index) in tag_ids.iter().tuples() {
			if self.stopped {
				break;
			}
			emit!(self, handler.attribute_key(self.layer.key(*key_index)?));
			self.attribute_count += 1;
			self.value_count += 1;
			match self.layer.value(*value_index)? {
				PropertyValue::String(s) => emit!(self, handler.value_string(s)),
				PropertyValue::Float(f) => emit!(self, handler.value_float(f)),
				PropertyValue::Double(d) => emit!(self, handler.value_double(d)),
				PropertyValue::Int(i) => emit!(self, handler.value_int(i)),
				PropertyValue::UInt(u) => emit!(self, handler.value_uint(u)),
				PropertyValue::SInt(i) => emit!(self, handler.value_sint(i)),
				PropertyValue::Bool(b) => emit!(self, handler.value_bool(b)),
			}
		}
		Ok(())
	}

	/// Decodes a v3 scalar attribute section: `(key index, complex value)*`.
	pub fn decode_scalar_section<H: AttributeHandler>(&mut self, data: &[u8], handler: &mut H) -> Result<()> {
		let mut reader = ValueReaderSlice::new(data);
		while reader.has_remaining() {
			if self.stopped {
				break;
			}
			let key_index = reader.read_varint32()?;
			emit!(self, handler.attribute_key(self.layer.key(key_index)?));
			self.attribute_count += 1;
			self.decode_complex_value(&mut reader, handler, 0, false)?;
		}
		Ok(())
	}

	/// Decodes a v3 geometric attribute section, where the key index rides
	/// in the tag payload.
	pub fn decode_geometric_section<H: AttributeHandler>(&mut self, data: &[u8], handler: &mut H) -> Result<()> {
		let mut reader = ValueReaderSlice::new(data);
		while reader.has_remaining() {
			if self.stopped {
				break;
			}
			let tag = reader.read_varint()?;
			let key_index = to_index(tag >> 4)?;
			emit!(self, handler.attribute_key(self.layer.key(key_index)?));
			self.attribute_count += 1;
			self.value_count += 1;
			match tag & 0x0F {
				COMPLEX_LIST => {
					let count = reader.read_varint32()?;
					emit!(self, handler.start_list_attribute(count));
					self.decode_list_elements(&mut reader, handler, count, 1, true)?;
					if self.stopped {
						return Ok(());
					}
					emit!(self, handler.end_list_attribute());
				}
				COMPLEX_MAP => {
					let count = reader.read_varint32()?;
					emit!(self, handler.start_map_attribute(count));
					self.decode_map_entries(&mut reader, handler, count, 1, true)?;
					if self.stopped {
						return Ok(());
					}
					emit!(self, handler.end_map_attribute());
				}
				COMPLEX_NUMBER_LIST | COMPLEX_VERTEX_LIST => {
					let count = reader.read_varint32()?;
					self.decode_number_list(&mut reader, handler, count)?;
				}
				t => bail!(MalformedInput, "value type {t} cannot carry a key in geometric attributes"),
			}
		}
		Ok(())
	}

	fn decode_complex_value<H: AttributeHandler>(
		&mut self,
		reader: &mut ValueReaderSlice,
		handler: &mut H,
		depth: usize,
		geometric: bool,
	) -> Result<()> {
		ensure!(depth < MAX_NESTING_DEPTH, MalformedInput, "attributes nested deeper than {MAX_NESTING_DEPTH}");
		let tag = reader.read_varint()?;
		let payload = tag >> 4;
		self.value_count += 1;
		match tag & 0x0F {
			COMPLEX_STRING => emit!(self, handler.value_string(self.layer.string_table_value(to_index(payload)?)?)),
			COMPLEX_FLOAT => emit!(self, handler.value_float(self.layer.float_table_value(to_index(payload)?)?)),
			COMPLEX_DOUBLE => emit!(self, handler.value_double(self.layer.double_table_value(to_index(payload)?)?)),
			COMPLEX_INT => emit!(self, handler.value_int(self.layer.int_table_value(to_index(payload)?)?)),
			COMPLEX_UINT => emit!(self, handler.value_uint(payload)),
			COMPLEX_SINT => emit!(self, handler.value_sint(zigzag_decode(payload))),
			COMPLEX_BOOL_NULL => match payload {
				0 => emit!(self, handler.value_bool(false)),
				1 => emit!(self, handler.value_bool(true)),
				2 => emit!(self, handler.value_null()),
				p => bail!(MalformedInput, "invalid bool/null payload {p}"),
			},
			COMPLEX_LIST => {
				let count = to_index(payload)?;
				emit!(self, handler.start_list_attribute(count));
				self.decode_list_elements(reader, handler, count, depth + 1, geometric)?;
				if self.stopped {
					return Ok(());
				}
				emit!(self, handler.end_list_attribute());
			}
			COMPLEX_MAP => {
				let count = to_index(payload)?;
				emit!(self, handler.start_map_attribute(count));
				self.decode_map_entries(reader, handler, count, depth + 1, geometric)?;
				if self.stopped {
					return Ok(());
				}
				emit!(self, handler.end_map_attribute());
			}
			COMPLEX_NUMBER_LIST => {
				ensure!(geometric, MalformedInput, "number lists are only valid in geometric attributes");
				let count = to_index(payload)?;
				self.decode_number_list(reader, handler, count)?;
			}
			COMPLEX_VERTEX_LIST => bail!(MalformedInput, "per-vertex values cannot be nested"),
			t => bail!(MalformedInput, "unknown complex value type {t}"),
		}
		Ok(())
	}

	fn decode_list_elements<H: AttributeHandler>(
		&mut self,
		reader: &mut ValueReaderSlice,
		handler: &mut H,
		count: u32,
		depth: usize,
		geometric: bool,
	) -> Result<()> {
		for _ in 0..count {
			if self.stopped {
				return Ok(());
			}
			self.decode_complex_value(reader, handler, depth, geometric)?;
		}
		Ok(())
	}

	fn decode_map_entries<H: AttributeHandler>(
		&mut self,
		reader: &mut ValueReaderSlice,
		handler: &mut H,
		count: u32,
		depth: usize,
		geometric: bool,
	) -> Result<()> {
		for _ in 0..count {
			if self.stopped {
				return Ok(());
			}
			let key_tag = reader.read_varint()?;
			ensure!(
				key_tag & 0x0F == COMPLEX_STRING,
				MalformedInput,
				"map keys must be string references"
			);
			self.value_count += 1;
			emit!(self, handler.attribute_key(self.layer.string_table_value(to_index(key_tag >> 4)?)?));
			self.decode_complex_value(reader, handler, depth, geometric)?;
		}
		Ok(())
	}

	fn decode_number_list<H: AttributeHandler>(
		&mut self,
		reader: &mut ValueReaderSlice,
		handler: &mut H,
		count: u32,
	) -> Result<()> {
		// the scaling word is biased by one so 0 can mean "no scaling"
		let scaling_index = reader.read_varint32()?.checked_sub(1);
		emit!(self, handler.start_number_list(count, scaling_index));
		let mut cursor = 0i64;
		for _ in 0..count {
			if self.stopped {
				return Ok(());
			}
			let slot = reader.read_varint()?;
			if slot == 0 {
				emit!(self, handler.number_list_null_value());
			} else {
				cursor = cursor.wrapping_add(zigzag_decode(slot - 1));
				emit!(self, handler.number_list_value(cursor));
			}
		}
		emit!(self, handler.end_number_list());
		Ok(())
	}
}

/// Skips one complex value without firing callbacks. Used by the geometry
/// decoder to step over non-vertex entries in the geometric section.
pub(crate) fn skip_complex_value(reader: &mut ValueReaderSlice, depth: usize) -> Result<()> {
	ensure!(depth < MAX_NESTING_DEPTH, MalformedInput, "attributes nested deeper than {MAX_NESTING_DEPTH}");
	let tag = reader.read_varint()?;
	let payload = tag >> 4;
	match tag & 0x0F {
		COMPLEX_STRING..=COMPLEX_BOOL_NULL => {}
		COMPLEX_LIST => {
			for _ in 0..payload {
				skip_complex_value(reader, depth + 1)?;
			}
		}
		COMPLEX_MAP => {
			for _ in 0..payload {
				reader.read_varint()?;
				skip_complex_value(reader, depth + 1)?;
			}
		}
		COMPLEX_NUMBER_LIST => {
			reader.read_varint()?;
			for _ in 0..payload {
				reader.read_varint()?;
			}
		}
		COMPLEX_VERTEX_LIST => bail!(MalformedInput, "per-vertex values cannot be nested"),
		t => bail!(MalformedInput, "unknown complex value type {t}"),
	}
	Ok(())
}
