//! A layer view over a memory-held tile buffer.
//!
//! The layer frame is scanned once on construction to locate the intern
//! tables and the feature frames; individual entries are materialized on
//! demand. All views borrow the caller's buffer.
//!
//! Layer fields:
//!  * 1 `name` (string, required)
//!  * 2 repeated `feature` (embedded message)
//!  * 3 repeated `keys` (string)
//!  * 4 repeated `values` (embedded message, v1/v2)
//!  * 5 `extent` (varint, default 4096)
//!  * 6 repeated string-table entry (v3)
//!  * 7 double table (packed fixed64, v3)
//!  * 8 float table (packed fixed32, v3)
//!  * 9 int table (packed zigzag varint, v3)
//!  * 10 elevation scaling (embedded message, v3)
//!  * 11 repeated attribute scaling (embedded message, v3)
//!  * 12 tile reference (embedded message, v3)
//!  * 15 `version` (varint, default 1)

use crate::error::{Result, bail, ensure};
use crate::feature::Feature;
use crate::io::ValueReaderSlice;
use crate::types::{PropertyValue, Scaling};
use byteorder::{ByteOrder, LittleEndian};

/// The tile a version 3 layer belongs to.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct TileRef {
	pub x: u32,
	pub y: u32,
	pub zoom: u32,
}

impl TileRef {
	pub fn new(x: u32, y: u32, zoom: u32) -> TileRef {
		TileRef { x, y, zoom }
	}

	pub(crate) fn read(reader: &mut ValueReaderSlice) -> Result<TileRef> {
		let mut tile_ref = TileRef::default();
		while reader.has_remaining() {
			match reader.read_pbf_key()? {
				(1, 0) => tile_ref.x = reader.read_varint32()?,
				(2, 0) => tile_ref.y = reader.read_varint32()?,
				(3, 0) => tile_ref.zoom = reader.read_varint32()?,
				(f, w) => bail!(MalformedInput, "unexpected field {f} with wire type {w} in tile reference"),
			}
		}
		Ok(tile_ref)
	}

	pub(crate) fn write(&self, writer: &mut crate::io::ValueWriterBlob) {
		let mut message = crate::io::ValueWriterBlob::new();
		if self.x != 0 {
			message.write_pbf_key(1, 0);
			message.write_varint(u64::from(self.x));
		}
		if self.y != 0 {
			message.write_pbf_key(2, 0);
			message.write_varint(u64::from(self.y));
		}
		if self.zoom != 0 {
			message.write_pbf_key(3, 0);
			message.write_varint(u64::from(self.zoom));
		}
		writer.write_pbf_message(&message);
	}
}

/// A borrowed view of one layer.
pub struct Layer<'a> {
	name: &'a str,
	version: u32,
	extent: u32,
	keys: Vec<&'a [u8]>,
	values: Vec<&'a [u8]>,
	string_table: Vec<&'a [u8]>,
	double_table: &'a [u8],
	float_table: &'a [u8],
	int_table: Vec<i64>,
	elevation_scaling: Scaling,
	attribute_scalings: Vec<Scaling>,
	tile_ref: Option<TileRef>,
	feature_frames: Vec<&'a [u8]>,
}

impl<'a> Layer<'a> {
	pub(crate) fn read(data: &'a [u8]) -> Result<Layer<'a>> {
		let mut name = None;
		let mut version = 1;
		let mut extent = 4096;
		let mut keys = Vec::new();
		let mut values = Vec::new();
		let mut string_table = Vec::new();
		let mut double_table: &[u8] = &[];
		let mut float_table: &[u8] = &[];
		let mut int_table = Vec::new();
		let mut elevation_scaling = Scaling::default();
		let mut attribute_scalings = Vec::new();
		let mut tile_ref = None;
		let mut feature_frames = Vec::new();
		let mut first_v3_field = None;

		let mut reader = ValueReaderSlice::new(data);
		while reader.has_remaining() {
			let (field, wire) = reader.read_pbf_key()?;
			if (6..=12).contains(&field) && first_v3_field.is_none() {
				first_v3_field = Some(field);
			}
			match (field, wire) {
				(1, 2) => name = Some(reader.read_pbf_string()?),
				(2, 2) => feature_frames.push(reader.read_pbf_view()?),
				(3, 2) => keys.push(reader.read_pbf_view()?),
				(4, 2) => values.push(reader.read_pbf_view()?),
				(5, 0) => {
					extent = reader.read_varint32()?;
					ensure!(extent > 0, MalformedInput, "layer extent must be greater than zero");
				}
				(6, 2) => string_table.push(reader.read_pbf_view()?),
				(7, 2) => {
					double_table = reader.read_pbf_view()?;
					ensure!(
						double_table.len() % 8 == 0,
						MalformedInput,
						"double table length is not a multiple of 8"
					);
				}
				(8, 2) => {
					float_table = reader.read_pbf_view()?;
					ensure!(
						float_table.len() % 4 == 0,
						MalformedInput,
						"float table length is not a multiple of 4"
					);
				}
				(9, 2) => {
					let mut table = ValueReaderSlice::new(reader.read_pbf_view()?);
					while table.has_remaining() {
						int_table.push(table.read_svarint()?);
					}
				}
				(10, 2) => elevation_scaling = Scaling::read(&mut reader.get_pbf_sub_reader()?)?,
				(11, 2) => attribute_scalings.push(Scaling::read(&mut reader.get_pbf_sub_reader()?)?),
				(12, 2) => tile_ref = Some(TileRef::read(&mut reader.get_pbf_sub_reader()?)?),
				(15, 0) => version = reader.read_varint32()?,
				(f, w) => bail!(MalformedInput, "unexpected field {f} with wire type {w} in layer"),
			}
		}

		ensure!((1..=3).contains(&version), VersionMismatch, "unsupported layer version {version}");
		if version < 3 {
			if let Some(field) = first_v3_field {
				bail!(
					VersionMismatch,
					"layer field {field} requires version 3, but the layer version is {version}"
				);
			}
		}
		let Some(name) = name else {
			bail!(MalformedInput, "layer name is required");
		};

		Ok(Layer {
			name,
			version,
			extent,
			keys,
			values,
			string_table,
			double_table,
			float_table,
			int_table,
			elevation_scaling,
			attribute_scalings,
			tile_ref,
			feature_frames,
		})
	}

	pub fn name(&self) -> &'a str {
		self.name
	}

	pub fn version(&self) -> u32 {
		self.version
	}

	pub fn extent(&self) -> u32 {
		self.extent
	}

	pub fn num_features(&self) -> usize {
		self.feature_frames.len()
	}

	pub fn is_empty(&self) -> bool {
		self.feature_frames.is_empty()
	}

	pub fn num_keys(&self) -> usize {
		self.keys.len()
	}

	pub fn num_values(&self) -> usize {
		self.values.len()
	}

	/// Looks up an entry of the key table.
	pub fn key(&self, index: u32) -> Result<&'a str> {
		let Some(&view) = self.keys.get(index as usize) else {
			bail!(OutOfRange, "key index {index} beyond table size {}", self.keys.len());
		};
		std::str::from_utf8(view).map_err(|_| crate::CodecError::MalformedInput("key is not valid UTF-8".to_string()))
	}

	/// Iterates over the key table.
	pub fn keys(&self) -> impl Iterator<Item = Result<&'a str>> + '_ {
		(0..self.keys.len() as u32).map(move |index| self.key(index))
	}

	/// Iterates over the legacy value table.
	pub fn values(&self) -> impl Iterator<Item = Result<PropertyValue<'a>>> + '_ {
		(0..self.values.len() as u32).map(move |index| self.value(index))
	}

	/// Looks up and parses an entry of the legacy value table.
	pub fn value(&self, index: u32) -> Result<PropertyValue<'a>> {
		let Some(&view) = self.values.get(index as usize) else {
			bail!(OutOfRange, "value index {index} beyond table size {}", self.values.len());
		};
		PropertyValue::read(&mut ValueReaderSlice::new(view))
	}

	pub fn string_table_value(&self, index: u32) -> Result<&'a str> {
		let Some(&view) = self.string_table.get(index as usize) else {
			bail!(OutOfRange, "string index {index} beyond table size {}", self.string_table.len());
		};
		std::str::from_utf8(view).map_err(|_| crate::CodecError::MalformedInput("string-table entry is not valid UTF-8".to_string()))
	}

	pub fn double_table_value(&self, index: u32) -> Result<f64> {
		let offset = index as usize * 8;
		ensure!(
			offset + 8 <= self.double_table.len(),
			OutOfRange,
			"double index {index} beyond table size {}",
			self.double_table.len() / 8
		);
		Ok(LittleEndian::read_f64(&self.double_table[offset..]))
	}

	pub fn float_table_value(&self, index: u32) -> Result<f32> {
		let offset = index as usize * 4;
		ensure!(
			offset + 4 <= self.float_table.len(),
			OutOfRange,
			"float index {index} beyond table size {}",
			self.float_table.len() / 4
		);
		Ok(LittleEndian::read_f32(&self.float_table[offset..]))
	}

	pub fn int_table_value(&self, index: u32) -> Result<i64> {
		let Some(value) = self.int_table.get(index as usize) else {
			bail!(OutOfRange, "int index {index} beyond table size {}", self.int_table.len());
		};
		Ok(*value)
	}

	/// The scaling applied to the elevation stream; the default scaling if
	/// the layer does not carry one.
	pub fn elevation_scaling(&self) -> &Scaling {
		&self.elevation_scaling
	}

	/// Looks up an attribute scaling by index.
	pub fn scaling(&self, index: u32) -> Result<&Scaling> {
		let Some(scaling) = self.attribute_scalings.get(index as usize) else {
			bail!(
				OutOfRange,
				"scaling index {index} beyond table size {}",
				self.attribute_scalings.len()
			);
		};
		Ok(scaling)
	}

	pub fn num_attribute_scalings(&self) -> u32 {
		self.attribute_scalings.len() as u32
	}

	pub fn tile_ref(&self) -> Option<TileRef> {
		self.tile_ref
	}

	/// Iterates over the features in source order, parsing each frame on
	/// demand.
	pub fn features<'l>(&'l self) -> impl Iterator<Item = Result<Feature<'l, 'a>>> + 'l {
		self.feature_frames.iter().map(move |&frame| Feature::read(self, frame))
	}

	/// Finds a feature by integer id with a linear scan. Absence is not an
	/// error.
	pub fn get_feature_by_id<'l>(&'l self, id: u64) -> Result<Option<Feature<'l, 'a>>> {
		for &frame in &self.feature_frames {
			let feature = Feature::read(self, frame)?;
			if feature.integer_id() == Some(id) {
				return Ok(Some(feature));
			}
		}
		Ok(None)
	}
}

impl std::fmt::Debug for Layer<'_> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Layer")
			.field("name", &self.name)
			.field("version", &self.version)
			.field("extent", &self.extent)
			.field("num_features", &self.feature_frames.len())
			.field("num_keys", &self.keys.len())
			.field("num_values", &self.values.len())
			.finish()
	}
}
