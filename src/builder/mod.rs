//! Building tiles.
//!
//! The builder hierarchy mirrors the reader: a [`TileBuilder`] collects
//! [`LayerBuilder`]s, and features are added to a layer through a
//! [`FeatureBuilder`] that borrows it. Intern tables (keys, legacy values,
//! and the v3 string/double/float/int tables) deduplicate on the fly.
//!
//! Builders own their internal buffers; `serialize()` yields one
//! contiguous byte sequence readable by [`VectorTile`](crate::VectorTile).

mod feature;
mod intern;

pub use feature::FeatureBuilder;

use crate::error::{Result, ensure};
use crate::io::ValueWriterBlob;
use crate::layer::TileRef;
use crate::types::{AttributeValue, Blob, Scaling};
use intern::InternTable;

/// Builds one layer: name, version, extent, intern tables, scalings and
/// the committed feature frames.
pub struct LayerBuilder {
	name: String,
	version: u32,
	extent: u32,
	keys: InternTable<String>,
	values: InternTable<Vec<u8>>,
	string_table: InternTable<String>,
	double_table: InternTable<u64>,
	float_table: InternTable<u32>,
	int_table: InternTable<i64>,
	elevation_scaling: Scaling,
	attribute_scalings: Vec<Scaling>,
	tile_ref: Option<TileRef>,
	features: Vec<Vec<u8>>,
}

impl LayerBuilder {
	/// Creates a layer builder with the default extent of 4096.
	pub fn new(name: &str, version: u32) -> Result<LayerBuilder> {
		ensure!((1..=3).contains(&version), VersionMismatch, "unsupported layer version {version}");
		Ok(LayerBuilder {
			name: name.to_string(),
			version,
			extent: 4096,
			keys: InternTable::new(),
			values: InternTable::new(),
			string_table: InternTable::new(),
			double_table: InternTable::new(),
			float_table: InternTable::new(),
			int_table: InternTable::new(),
			elevation_scaling: Scaling::default(),
			attribute_scalings: Vec::new(),
			tile_ref: None,
			features: Vec::new(),
		})
	}

	pub fn version(&self) -> u32 {
		self.version
	}

	pub fn num_features(&self) -> usize {
		self.features.len()
	}

	pub fn set_extent(&mut self, extent: u32) -> Result<()> {
		ensure!(extent > 0, BuilderState, "layer extent must be greater than zero");
		self.extent = extent;
		Ok(())
	}

	pub fn set_tile_ref(&mut self, tile_ref: TileRef) -> Result<()> {
		self.ensure_v3("tile references")?;
		self.tile_ref = Some(tile_ref);
		Ok(())
	}

	pub fn set_elevation_scaling(&mut self, scaling: Scaling) -> Result<()> {
		self.ensure_v3("elevation scalings")?;
		self.elevation_scaling = scaling;
		Ok(())
	}

	/// Registers an attribute scaling and returns its index.
	pub fn add_attribute_scaling(&mut self, scaling: Scaling) -> Result<u32> {
		self.ensure_v3("attribute scalings")?;
		self.attribute_scalings.push(scaling);
		Ok(self.attribute_scalings.len() as u32 - 1)
	}

	pub fn num_attribute_scalings(&self) -> u32 {
		self.attribute_scalings.len() as u32
	}

	fn ensure_v3(&self, what: &str) -> Result<()> {
		ensure!(
			self.version == 3,
			VersionMismatch,
			"{what} require a version 3 layer (layer version is {})",
			self.version
		);
		Ok(())
	}

	pub(crate) fn add_key(&mut self, key: &str) -> u32 {
		self.keys.add(key.to_string())
	}

	pub(crate) fn add_legacy_value(&mut self, value: &AttributeValue) -> Result<u32> {
		let mut message = ValueWriterBlob::new();
		value.as_property_value()?.write(&mut message);
		Ok(self.values.add(message.into_blob().into_vec()))
	}

	pub(crate) fn add_string(&mut self, value: &str) -> u32 {
		self.string_table.add(value.to_string())
	}

	pub(crate) fn add_double(&mut self, value: f64) -> u32 {
		self.double_table.add(value.to_bits())
	}

	pub(crate) fn add_float(&mut self, value: f32) -> u32 {
		self.float_table.add(value.to_bits())
	}

	pub(crate) fn add_int(&mut self, value: i64) -> u32 {
		self.int_table.add(value)
	}

	pub(crate) fn push_feature(&mut self, frame: Vec<u8>) {
		self.features.push(frame);
	}

	pub(crate) fn build(&self) -> Result<Blob> {
		let mut writer = ValueWriterBlob::new();

		writer.write_pbf_key(1, 2);
		writer.write_pbf_string(&self.name);

		for feature in &self.features {
			writer.write_pbf_key(2, 2);
			writer.write_pbf_view(feature);
		}

		for key in self.keys.iter() {
			writer.write_pbf_key(3, 2);
			writer.write_pbf_string(key);
		}

		for value in self.values.iter() {
			writer.write_pbf_key(4, 2);
			writer.write_slice(value);
		}

		if self.extent != 4096 {
			writer.write_pbf_key(5, 0);
			writer.write_varint(u64::from(self.extent));
		}

		if self.version == 3 {
			for entry in self.string_table.iter() {
				writer.write_pbf_key(6, 2);
				writer.write_pbf_string(entry);
			}
			if !self.double_table.is_empty() {
				let mut packed = ValueWriterBlob::new();
				for &bits in self.double_table.iter() {
					packed.write_f64(f64::from_bits(bits));
				}
				writer.write_pbf_key(7, 2);
				writer.write_pbf_message(&packed);
			}
			if !self.float_table.is_empty() {
				let mut packed = ValueWriterBlob::new();
				for &bits in self.float_table.iter() {
					packed.write_f32(f32::from_bits(bits));
				}
				writer.write_pbf_key(8, 2);
				writer.write_pbf_message(&packed);
			}
			if !self.int_table.is_empty() {
				let mut packed = ValueWriterBlob::new();
				for &value in self.int_table.iter() {
					packed.write_svarint(value);
				}
				writer.write_pbf_key(9, 2);
				writer.write_pbf_message(&packed);
			}
			if !self.elevation_scaling.is_default() {
				writer.write_pbf_key(10, 2);
				self.elevation_scaling.write(&mut writer);
			}
			for scaling in &self.attribute_scalings {
				writer.write_pbf_key(11, 2);
				scaling.write(&mut writer);
			}
			if let Some(tile_ref) = &self.tile_ref {
				writer.write_pbf_key(12, 2);
				tile_ref.write(&mut writer);
			}
		}

		if self.version != 1 {
			writer.write_pbf_key(15, 0);
			writer.write_varint(u64::from(self.version));
		}

		Ok(writer.into_blob())
	}
}

/// Collects layers and serializes the tile.
#[derive(Default)]
pub struct TileBuilder {
	layers: Vec<LayerBuilder>,
}

impl TileBuilder {
	pub fn new() -> TileBuilder {
		TileBuilder::default()
	}

	pub fn add_layer(&mut self, layer: LayerBuilder) {
		self.layers.push(layer);
	}

	/// Serializes all layers into one contiguous byte sequence.
	pub fn serialize(&self) -> Result<Blob> {
		let mut writer = ValueWriterBlob::new();
		for layer in &self.layers {
			writer.write_pbf_key(3, 2);
			writer.write_pbf_view(layer.build()?.as_slice());
		}
		Ok(writer.into_blob())
	}
}
