//! Building one feature.
//!
//! Vertices are buffered per part and the command stream (headers, zigzag
//! deltas, ClosePath) is emitted when the part closes. The cursor persists
//! across parts, so deltas stay small. Attributes are written eagerly into
//! the scalar or geometric section; switching to geometric attributes is
//! one-way per feature.
//!
//! `commit()` validates completeness and appends the feature frame to the
//! layer; dropping the builder without committing rolls the feature back.

use crate::attributes::{
	COMPLEX_BOOL_NULL, COMPLEX_DOUBLE, COMPLEX_FLOAT, COMPLEX_INT, COMPLEX_LIST, COMPLEX_MAP, COMPLEX_NUMBER_LIST,
	COMPLEX_SINT, COMPLEX_STRING, COMPLEX_UINT, COMPLEX_VERTEX_LIST, MAX_INLINE_VALUE,
};
use crate::builder::LayerBuilder;
use crate::error::{Result, bail, ensure};
use crate::io::{ValueWriterBlob, zigzag_encode};
use crate::types::{AttributeValue, GeomType};

const CMD_MOVE_TO: u64 = 1;
const CMD_LINE_TO: u64 = 2;
const CMD_CLOSE_PATH: u64 = 7;

fn command(id: u64, count: u64) -> u64 {
	(count << 3) | id
}

#[derive(Debug, PartialEq, Eq)]
enum PartState {
	Empty,
	Points,
	LineString,
	Ring,
}

enum PendingContainer {
	List { remaining: u32 },
	Map { remaining: u32, awaiting_value: bool },
	NumberList { remaining: u32, cursor: i64 },
}

enum BuilderId {
	None,
	Integer(u64),
	String(String),
}

/// Builds one feature inside a layer.
pub struct FeatureBuilder<'l> {
	layer: &'l mut LayerBuilder,
	geom_type: GeomType,
	id: BuilderId,
	geometry: ValueWriterBlob,
	elevations: ValueWriterBlob,
	part: Vec<(i64, i64, i64)>,
	part_state: PartState,
	cursor: (i64, i64),
	cursor_z: i64,
	vertex_count: u32,
	dimensions: Option<u8>,
	tag_ids: Vec<u32>,
	attributes: ValueWriterBlob,
	geometric_attributes: ValueWriterBlob,
	geometric_mode: bool,
	pending: Vec<PendingContainer>,
	knots: Vec<Option<i64>>,
	knot_scaling: Option<u32>,
	spline_degree: u32,
}

/// Encodes one scalar value as a complex value, interning table-backed
/// types into the layer.
fn write_complex_value(writer: &mut ValueWriterBlob, layer: &mut LayerBuilder, value: &AttributeValue) -> Result<()> {
	match value {
		AttributeValue::String(s) => {
			writer.write_varint((u64::from(layer.add_string(s)) << 4) | COMPLEX_STRING);
		}
		AttributeValue::Float(f) => {
			writer.write_varint((u64::from(layer.add_float(*f)) << 4) | COMPLEX_FLOAT);
		}
		AttributeValue::Double(d) => {
			writer.write_varint((u64::from(layer.add_double(*d)) << 4) | COMPLEX_DOUBLE);
		}
		AttributeValue::Int(i) => {
			writer.write_varint((u64::from(layer.add_int(*i)) << 4) | COMPLEX_INT);
		}
		AttributeValue::UInt(u) => {
			ensure!(*u <= MAX_INLINE_VALUE, BuilderState, "uint value {u} exceeds 60 bits");
			writer.write_varint((*u << 4) | COMPLEX_UINT);
		}
		AttributeValue::SInt(i) => {
			let encoded = zigzag_encode(*i);
			ensure!(encoded <= MAX_INLINE_VALUE, BuilderState, "sint value {i} exceeds 60 bits");
			writer.write_varint((encoded << 4) | COMPLEX_SINT);
		}
		AttributeValue::Bool(b) => {
			writer.write_varint((u64::from(*b) << 4) | COMPLEX_BOOL_NULL);
		}
		AttributeValue::Null => {
			writer.write_varint((2 << 4) | COMPLEX_BOOL_NULL);
		}
	}
	Ok(())
}

impl<'l> FeatureBuilder<'l> {
	pub fn new(layer: &'l mut LayerBuilder, geom_type: GeomType) -> Result<FeatureBuilder<'l>> {
		ensure!(
			geom_type != GeomType::Unknown,
			BuilderState,
			"cannot build a feature of unknown geometry type"
		);
		if geom_type == GeomType::Spline {
			ensure!(
				layer.version() == 3,
				VersionMismatch,
				"splines require a version 3 layer (layer version is {})",
				layer.version()
			);
		}
		Ok(FeatureBuilder {
			layer,
			geom_type,
			id: BuilderId::None,
			geometry: ValueWriterBlob::new(),
			elevations: ValueWriterBlob::new(),
			part: Vec::new(),
			part_state: PartState::Empty,
			cursor: (0, 0),
			cursor_z: 0,
			vertex_count: 0,
			dimensions: None,
			tag_ids: Vec::new(),
			attributes: ValueWriterBlob::new(),
			geometric_attributes: ValueWriterBlob::new(),
			geometric_mode: false,
			pending: Vec::new(),
			knots: Vec::new(),
			knot_scaling: None,
			spline_degree: 2,
		})
	}

	pub fn set_integer_id(&mut self, id: u64) {
		self.id = BuilderId::Integer(id);
	}

	pub fn set_string_id(&mut self, id: &str) -> Result<()> {
		ensure!(
			self.layer.version() == 3,
			VersionMismatch,
			"string ids require a version 3 layer"
		);
		self.id = BuilderId::String(id.to_string());
		Ok(())
	}

	// ------------------------------------------------------------------
	// geometry
	// ------------------------------------------------------------------

	fn check_dimensions(&mut self, dimensions: u8) -> Result<()> {
		match self.dimensions {
			None => {
				if dimensions == 3 {
					ensure!(
						self.layer.version() == 3,
						VersionMismatch,
						"3D vertices require a version 3 layer"
					);
				}
				self.dimensions = Some(dimensions);
				Ok(())
			}
			Some(existing) => {
				ensure!(existing == dimensions, BuilderState, "cannot mix 2D and 3D vertices");
				Ok(())
			}
		}
	}

	/// Appends one point to a point feature.
	pub fn add_point(&mut self, x: i64, y: i64) -> Result<()> {
		self.add_point_vertex(x, y, 0, 2)
	}

	pub fn add_point_3d(&mut self, x: i64, y: i64, z: i64) -> Result<()> {
		self.add_point_vertex(x, y, z, 3)
	}

	/// Appends several points at once.
	pub fn add_points(&mut self, points: &[(i64, i64)]) -> Result<()> {
		for &(x, y) in points {
			self.add_point(x, y)?;
		}
		Ok(())
	}

	fn add_point_vertex(&mut self, x: i64, y: i64, z: i64, dimensions: u8) -> Result<()> {
		ensure!(
			self.geom_type == GeomType::Point,
			BuilderState,
			"add_point is only valid for point features"
		);
		self.check_dimensions(dimensions)?;
		self.part_state = PartState::Points;
		self.part.push((x, y, z));
		Ok(())
	}

	/// Opens a new linestring part, closing the previous one.
	pub fn start_linestring(&mut self) -> Result<()> {
		ensure!(
			self.geom_type == GeomType::LineString || self.geom_type == GeomType::Spline,
			BuilderState,
			"start_linestring is only valid for linestring and spline features"
		);
		if self.part_state == PartState::LineString {
			self.flush_linestring()?;
		}
		self.part_state = PartState::LineString;
		Ok(())
	}

	/// Opens the spline's vertex sequence.
	pub fn start_spline(&mut self) -> Result<()> {
		ensure!(
			self.geom_type == GeomType::Spline,
			BuilderState,
			"start_spline is only valid for spline features"
		);
		self.start_linestring()
	}

	/// Opens a new polygon ring. The previous ring must be closed.
	pub fn start_ring(&mut self) -> Result<()> {
		ensure!(
			self.geom_type == GeomType::Polygon,
			BuilderState,
			"start_ring is only valid for polygon features"
		);
		ensure!(self.part_state != PartState::Ring, BuilderState, "previous ring is still open");
		self.part_state = PartState::Ring;
		Ok(())
	}

	/// Appends a vertex to the open linestring or ring.
	pub fn set_point(&mut self, x: i64, y: i64) -> Result<()> {
		self.set_part_vertex(x, y, 0, 2)
	}

	pub fn set_point_3d(&mut self, x: i64, y: i64, z: i64) -> Result<()> {
		self.set_part_vertex(x, y, z, 3)
	}

	fn set_part_vertex(&mut self, x: i64, y: i64, z: i64, dimensions: u8) -> Result<()> {
		ensure!(
			self.part_state == PartState::LineString || self.part_state == PartState::Ring,
			BuilderState,
			"no open linestring or ring"
		);
		self.check_dimensions(dimensions)?;
		self.part.push((x, y, z));
		Ok(())
	}

	/// Closes the open ring, synthesizing the ClosePath command. A final
	/// vertex equal to the first one is dropped.
	pub fn close_ring(&mut self) -> Result<()> {
		ensure!(self.part_state == PartState::Ring, BuilderState, "no open ring");
		let mut part = std::mem::take(&mut self.part);
		if part.len() >= 4 && part.first() == part.last() {
			part.pop();
		}
		ensure!(part.len() >= 3, Geometry, "polygon ring with fewer than three vertices");

		self.geometry.write_varint(command(CMD_MOVE_TO, 1));
		self.write_vertex(part[0]);
		self.geometry.write_varint(command(CMD_LINE_TO, part.len() as u64 - 1));
		for &vertex in &part[1..] {
			self.write_vertex(vertex);
		}
		self.geometry.write_varint(command(CMD_CLOSE_PATH, 1));
		self.part_state = PartState::Empty;
		Ok(())
	}

	fn flush_linestring(&mut self) -> Result<()> {
		let part = std::mem::take(&mut self.part);
		ensure!(part.len() >= 2, Geometry, "linestring with fewer than two vertices");

		self.geometry.write_varint(command(CMD_MOVE_TO, 1));
		self.write_vertex(part[0]);
		self.geometry.write_varint(command(CMD_LINE_TO, part.len() as u64 - 1));
		for &vertex in &part[1..] {
			self.write_vertex(vertex);
		}
		self.part_state = PartState::Empty;
		Ok(())
	}

	fn flush_points(&mut self) -> Result<()> {
		let part = std::mem::take(&mut self.part);
		if part.is_empty() {
			return Ok(());
		}
		self.geometry.write_varint(command(CMD_MOVE_TO, part.len() as u64));
		for &vertex in &part {
			self.write_vertex(vertex);
		}
		self.part_state = PartState::Empty;
		Ok(())
	}

	fn write_vertex(&mut self, (x, y, z): (i64, i64, i64)) {
		self.geometry.write_svarint(x - self.cursor.0);
		self.geometry.write_svarint(y - self.cursor.1);
		self.cursor = (x, y);
		if self.dimensions == Some(3) {
			self.elevations.write_svarint(z - self.cursor_z);
			self.cursor_z = z;
		}
		self.vertex_count += 1;
	}

	// ------------------------------------------------------------------
	// spline knots
	// ------------------------------------------------------------------

	pub fn spline_knot(&mut self, value: i64) -> Result<()> {
		ensure!(self.geom_type == GeomType::Spline, BuilderState, "knots are only valid for splines");
		self.knots.push(Some(value));
		Ok(())
	}

	pub fn spline_null_knot(&mut self) -> Result<()> {
		ensure!(self.geom_type == GeomType::Spline, BuilderState, "knots are only valid for splines");
		self.knots.push(None);
		Ok(())
	}

	pub fn set_knot_scaling(&mut self, scaling_index: u32) -> Result<()> {
		ensure!(self.geom_type == GeomType::Spline, BuilderState, "knots are only valid for splines");
		self.knot_scaling = Some(scaling_index);
		Ok(())
	}

	pub fn set_spline_degree(&mut self, degree: u32) -> Result<()> {
		ensure!(
			self.geom_type == GeomType::Spline,
			BuilderState,
			"the degree is only valid for splines"
		);
		self.spline_degree = degree;
		Ok(())
	}

	// ------------------------------------------------------------------
	// attributes
	// ------------------------------------------------------------------

	fn ensure_v3(&self, what: &str) -> Result<()> {
		ensure!(
			self.layer.version() == 3,
			VersionMismatch,
			"{what} require a version 3 layer (layer version is {})",
			self.layer.version()
		);
		Ok(())
	}

	/// Adds one scalar attribute. Interned into the key/value tables on
	/// v1/v2 layers, encoded as a complex value on v3 layers.
	pub fn add_scalar_attribute<'v>(&mut self, key: &str, value: impl Into<AttributeValue<'v>>) -> Result<()> {
		ensure!(
			!self.geometric_mode,
			BuilderState,
			"scalar attributes cannot follow the switch to geometric attributes"
		);
		ensure!(self.pending.is_empty(), BuilderState, "an attribute container is still open");
		let value = value.into();
		let key_index = self.layer.add_key(key);
		if self.layer.version() < 3 {
			let value_index = self.layer.add_legacy_value(&value)?;
			self.tag_ids.push(key_index);
			self.tag_ids.push(value_index);
		} else {
			self.attributes.write_varint(u64::from(key_index));
			write_complex_value(&mut self.attributes, self.layer, &value)?;
		}
		Ok(())
	}

	/// Routes subsequent attributes into the geometric section. One-way
	/// per feature.
	pub fn switch_to_geometric_attributes(&mut self) -> Result<()> {
		self.ensure_v3("geometric attributes")?;
		ensure!(self.pending.is_empty(), BuilderState, "an attribute container is still open");
		ensure!(!self.geometric_mode, BuilderState, "already building geometric attributes");
		self.geometric_mode = true;
		Ok(())
	}

	pub fn start_list_attribute_with_key(&mut self, key: &str, count: u32) -> Result<()> {
		self.ensure_v3("list attributes")?;
		ensure!(self.pending.is_empty(), BuilderState, "an attribute container is still open");
		let key_index = self.layer.add_key(key);
		if self.geometric_mode {
			self.geometric_attributes.write_varint((u64::from(key_index) << 4) | COMPLEX_LIST);
			self.geometric_attributes.write_varint(u64::from(count));
		} else {
			self.attributes.write_varint(u64::from(key_index));
			self.attributes.write_varint((u64::from(count) << 4) | COMPLEX_LIST);
		}
		if count > 0 {
			self.pending.push(PendingContainer::List { remaining: count });
		}
		Ok(())
	}

	pub fn start_map_attribute_with_key(&mut self, key: &str, count: u32) -> Result<()> {
		self.ensure_v3("map attributes")?;
		ensure!(self.pending.is_empty(), BuilderState, "an attribute container is still open");
		let key_index = self.layer.add_key(key);
		if self.geometric_mode {
			self.geometric_attributes.write_varint((u64::from(key_index) << 4) | COMPLEX_MAP);
			self.geometric_attributes.write_varint(u64::from(count));
		} else {
			self.attributes.write_varint(u64::from(key_index));
			self.attributes.write_varint((u64::from(count) << 4) | COMPLEX_MAP);
		}
		if count > 0 {
			self.pending.push(PendingContainer::Map {
				remaining: count,
				awaiting_value: false,
			});
		}
		Ok(())
	}

	/// Starts a nested list as the next value of the open container.
	pub fn start_list_attribute(&mut self, count: u32) -> Result<()> {
		ensure!(!self.pending.is_empty(), BuilderState, "no open list or map attribute");
		self.consume_slot()?;
		let writer = if self.geometric_mode {
			&mut self.geometric_attributes
		} else {
			&mut self.attributes
		};
		writer.write_varint((u64::from(count) << 4) | COMPLEX_LIST);
		if count > 0 {
			self.pending.push(PendingContainer::List { remaining: count });
		}
		Ok(())
	}

	/// Sets the key of the next map entry.
	pub fn map_key(&mut self, key: &str) -> Result<()> {
		match self.pending.last_mut() {
			Some(PendingContainer::Map { awaiting_value, .. }) => {
				ensure!(!*awaiting_value, BuilderState, "the previous map entry has no value yet");
				*awaiting_value = true;
			}
			_ => bail!(BuilderState, "no open map attribute"),
		}
		let index = self.layer.add_string(key);
		let writer = if self.geometric_mode {
			&mut self.geometric_attributes
		} else {
			&mut self.attributes
		};
		writer.write_varint((u64::from(index) << 4) | COMPLEX_STRING);
		Ok(())
	}

	/// Appends the next value of the open list or map.
	pub fn attribute_value<'v>(&mut self, value: impl Into<AttributeValue<'v>>) -> Result<()> {
		let value = value.into();
		self.consume_slot()?;
		let writer = if self.geometric_mode {
			&mut self.geometric_attributes
		} else {
			&mut self.attributes
		};
		write_complex_value(writer, self.layer, &value)
	}

	fn consume_slot(&mut self) -> Result<()> {
		let finished = match self.pending.last_mut() {
			Some(PendingContainer::List { remaining }) => {
				*remaining -= 1;
				*remaining == 0
			}
			Some(PendingContainer::Map { remaining, awaiting_value }) => {
				ensure!(*awaiting_value, BuilderState, "map entries need a key first");
				*awaiting_value = false;
				*remaining -= 1;
				*remaining == 0
			}
			Some(PendingContainer::NumberList { .. }) => {
				bail!(BuilderState, "number lists only accept number_list_value calls")
			}
			None => bail!(BuilderState, "no open list or map attribute"),
		};
		if finished {
			self.pending.pop();
		}
		Ok(())
	}

	/// Starts a number list in the geometric section. Pass `None` as
	/// `scaling_index` for raw integer values.
	pub fn start_number_list_with_key(&mut self, key: &str, count: u32, scaling_index: Option<u32>) -> Result<()> {
		self.start_slot_stream(key, count, scaling_index, COMPLEX_NUMBER_LIST)
	}

	/// Starts a per-vertex attribute stream; its values align one-to-one
	/// with the vertices of the geometry.
	pub fn start_vertex_attribute_with_key(&mut self, key: &str, count: u32, scaling_index: Option<u32>) -> Result<()> {
		self.start_slot_stream(key, count, scaling_index, COMPLEX_VERTEX_LIST)
	}

	fn start_slot_stream(&mut self, key: &str, count: u32, scaling_index: Option<u32>, type_code: u64) -> Result<()> {
		self.ensure_v3("number lists")?;
		ensure!(
			self.geometric_mode,
			BuilderState,
			"number lists belong to the geometric attribute section"
		);
		ensure!(self.pending.is_empty(), BuilderState, "an attribute container is still open");
		let key_index = self.layer.add_key(key);
		self.geometric_attributes.write_varint((u64::from(key_index) << 4) | type_code);
		self.geometric_attributes.write_varint(u64::from(count));
		// the scaling word is biased by one so 0 can mean "no scaling"
		self.geometric_attributes.write_varint(match scaling_index {
			Some(index) => u64::from(index) + 1,
			None => 0,
		});
		if count > 0 {
			self.pending.push(PendingContainer::NumberList { remaining: count, cursor: 0 });
		}
		Ok(())
	}

	pub fn number_list_value(&mut self, value: i64) -> Result<()> {
		let Some(PendingContainer::NumberList { remaining, cursor }) = self.pending.last_mut() else {
			bail!(BuilderState, "no open number list");
		};
		let slot = zigzag_encode(value.wrapping_sub(*cursor));
		ensure!(slot < u64::MAX, BuilderState, "number list delta out of range");
		*cursor = value;
		*remaining -= 1;
		let finished = *remaining == 0;
		self.geometric_attributes.write_varint(slot + 1);
		if finished {
			self.pending.pop();
		}
		Ok(())
	}

	pub fn number_list_null_value(&mut self) -> Result<()> {
		let Some(PendingContainer::NumberList { remaining, .. }) = self.pending.last_mut() else {
			bail!(BuilderState, "no open number list");
		};
		*remaining -= 1;
		let finished = *remaining == 0;
		self.geometric_attributes.write_varint(0);
		if finished {
			self.pending.pop();
		}
		Ok(())
	}

	// ------------------------------------------------------------------
	// commit / rollback
	// ------------------------------------------------------------------

	/// Validates the feature and appends its frame to the layer.
	pub fn commit(mut self) -> Result<()> {
		ensure!(self.pending.is_empty(), BuilderState, "an attribute container is still open");
		match self.part_state {
			PartState::Ring => bail!(BuilderState, "polygon ring is still open"),
			PartState::LineString => self.flush_linestring()?,
			PartState::Points => self.flush_points()?,
			PartState::Empty => {}
		}
		ensure!(self.vertex_count > 0, Geometry, "feature has no geometry");

		let mut frame = ValueWriterBlob::new();
		match &self.id {
			BuilderId::Integer(id) => {
				frame.write_pbf_key(1, 0);
				frame.write_varint(*id);
			}
			BuilderId::String(id) => {
				frame.write_pbf_key(8, 2);
				frame.write_pbf_string(id);
			}
			BuilderId::None => {}
		}
		if !self.tag_ids.is_empty() {
			frame.write_pbf_key(2, 2);
			frame.write_pbf_packed_uint32(&self.tag_ids);
		}
		frame.write_pbf_key(3, 0);
		frame.write_varint(self.geom_type.as_u64());
		frame.write_pbf_key(4, 2);
		frame.write_pbf_view(self.geometry.as_slice());
		if !self.elevations.is_empty() {
			frame.write_pbf_key(5, 2);
			frame.write_pbf_view(self.elevations.as_slice());
		}
		if !self.attributes.is_empty() {
			frame.write_pbf_key(6, 2);
			frame.write_pbf_view(self.attributes.as_slice());
		}
		if !self.geometric_attributes.is_empty() {
			frame.write_pbf_key(7, 2);
			frame.write_pbf_view(self.geometric_attributes.as_slice());
		}
		if !self.knots.is_empty() {
			let mut body = ValueWriterBlob::new();
			body.write_varint(self.knots.len() as u64);
			body.write_varint(match self.knot_scaling {
				Some(index) => u64::from(index) + 1,
				None => 0,
			});
			let mut cursor = 0i64;
			for knot in &self.knots {
				match knot {
					Some(value) => {
						body.write_varint(zigzag_encode(value.wrapping_sub(cursor)) + 1);
						cursor = *value;
					}
					None => body.write_varint(0),
				}
			}
			frame.write_pbf_key(9, 2);
			frame.write_pbf_message(&body);
		}
		if self.spline_degree != 2 {
			frame.write_pbf_key(10, 0);
			frame.write_varint(u64::from(self.spline_degree));
		}

		self.layer.push_feature(frame.into_blob().into_vec());
		Ok(())
	}

	/// Discards the feature. Dropping the builder has the same effect.
	pub fn rollback(self) {}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::builder::TileBuilder;
	use crate::geometry::{GeometryHandler, Point, Winding};
	use crate::types::Scaling;
	use crate::{FeatureId, VectorTile};
	use anyhow::Result;

	#[derive(Default)]
	struct RecordingHandler {
		points: Vec<Point>,
		part_sizes: Vec<u32>,
		windings: Vec<Winding>,
		knots: Vec<Option<i64>>,
		knot_header: Option<(u32, Option<u32>)>,
	}

	impl GeometryHandler for RecordingHandler {
		fn points_begin(&mut self, count: u32) -> Result<bool, crate::CodecError> {
			self.part_sizes.push(count);
			Ok(true)
		}
		fn points_point(&mut self, point: Point) -> Result<bool, crate::CodecError> {
			self.points.push(point);
			Ok(true)
		}
		fn linestring_begin(&mut self, count: u32) -> Result<bool, crate::CodecError> {
			self.part_sizes.push(count);
			Ok(true)
		}
		fn linestring_point(&mut self, point: Point) -> Result<bool, crate::CodecError> {
			self.points.push(point);
			Ok(true)
		}
		fn ring_begin(&mut self, count: u32) -> Result<bool, crate::CodecError> {
			self.part_sizes.push(count);
			Ok(true)
		}
		fn ring_point(&mut self, point: Point) -> Result<bool, crate::CodecError> {
			self.points.push(point);
			Ok(true)
		}
		fn ring_end(&mut self, winding: Winding) -> Result<bool, crate::CodecError> {
			self.windings.push(winding);
			Ok(true)
		}
		fn knots_begin(&mut self, count: u32, scaling_index: Option<u32>) -> Result<bool, crate::CodecError> {
			self.knot_header = Some((count, scaling_index));
			Ok(true)
		}
		fn knot_value(&mut self, value: i64) -> Result<bool, crate::CodecError> {
			self.knots.push(Some(value));
			Ok(true)
		}
		fn knot_null_value(&mut self) -> Result<bool, crate::CodecError> {
			self.knots.push(None);
			Ok(true)
		}
	}

	fn single_feature_tile(layer: LayerBuilder) -> Result<Vec<u8>> {
		let mut builder = TileBuilder::new();
		builder.add_layer(layer);
		Ok(builder.serialize()?.into_vec())
	}

	#[test]
	fn test_linestring_round_trip() -> Result<()> {
		let mut layer = LayerBuilder::new("test", 2)?;
		{
			let mut feature = FeatureBuilder::new(&mut layer, GeomType::LineString)?;
			feature.start_linestring()?;
			feature.set_point(2, 2)?;
			feature.set_point(2, 10)?;
			feature.set_point(10, 10)?;
			feature.commit()?;
		}
		let data = single_feature_tile(layer)?;

		let mut tile = VectorTile::from_slice(&data);
		let layer = tile.next_layer()?.unwrap();
		let feature = layer.features().next().unwrap()?;
		assert_eq!(feature.geometry_data(), &[9, 4, 4, 18, 0, 16, 16, 0]);

		let mut handler = RecordingHandler::default();
		feature.decode_geometry(&mut handler)?;
		assert_eq!(handler.part_sizes, vec![3]);
		assert_eq!(
			handler.points,
			vec![Point::new(2, 2), Point::new(2, 10), Point::new(10, 10)]
		);
		Ok(())
	}

	#[test]
	fn test_multi_linestring_round_trip() -> Result<()> {
		let mut layer = LayerBuilder::new("test", 2)?;
		{
			let mut feature = FeatureBuilder::new(&mut layer, GeomType::LineString)?;
			feature.start_linestring()?;
			feature.set_point(0, 0)?;
			feature.set_point(5, 0)?;
			feature.start_linestring()?;
			feature.set_point(5, 5)?;
			feature.set_point(0, 5)?;
			feature.set_point(0, 6)?;
			feature.commit()?;
		}
		let data = single_feature_tile(layer)?;

		let mut tile = VectorTile::from_slice(&data);
		let layer = tile.next_layer()?.unwrap();
		let feature = layer.features().next().unwrap()?;

		let mut handler = RecordingHandler::default();
		feature.decode_geometry(&mut handler)?;
		assert_eq!(handler.part_sizes, vec![2, 3]);
		assert_eq!(handler.points.len(), 5);
		assert_eq!(handler.points[2], Point::new(5, 5));
		Ok(())
	}

	#[test]
	fn test_polygon_round_trip() -> Result<()> {
		let mut layer = LayerBuilder::new("test", 2)?;
		{
			let mut feature = FeatureBuilder::new(&mut layer, GeomType::Polygon)?;
			feature.start_ring()?;
			feature.set_point(0, 0)?;
			feature.set_point(0, 10)?;
			feature.set_point(10, 10)?;
			// the closing vertex is dropped and re-synthesized on decode
			feature.set_point(0, 0)?;
			feature.close_ring()?;
			feature.commit()?;
		}
		let data = single_feature_tile(layer)?;

		let mut tile = VectorTile::from_slice(&data);
		let layer = tile.next_layer()?.unwrap();
		let feature = layer.features().next().unwrap()?;
		assert_eq!(feature.geometry_data(), &[9, 0, 0, 18, 0, 20, 20, 0, 15]);

		let mut handler = RecordingHandler::default();
		feature.decode_geometry(&mut handler)?;
		assert_eq!(handler.part_sizes, vec![4]);
		assert_eq!(handler.points[0], Point::new(0, 0));
		assert_eq!(handler.points[3], Point::new(0, 0));
		assert_eq!(handler.windings, vec![Winding::Inner]);
		Ok(())
	}

	#[test]
	fn test_points_3d_round_trip() -> Result<()> {
		let mut layer = LayerBuilder::new("test", 3)?;
		{
			let mut feature = FeatureBuilder::new(&mut layer, GeomType::Point)?;
			feature.add_point_3d(5, 7, 22)?;
			feature.add_point_3d(3, 2, 25)?;
			feature.commit()?;
		}
		let data = single_feature_tile(layer)?;

		let mut tile = VectorTile::from_slice(&data);
		let layer = tile.next_layer()?.unwrap();
		let feature = layer.features().next().unwrap()?;

		let mut handler = RecordingHandler::default();
		feature.decode_geometry(&mut handler)?;
		assert_eq!(handler.points, vec![Point::new_3d(5, 7, 22), Point::new_3d(3, 2, 25)]);
		Ok(())
	}

	#[test]
	fn test_vertex_attribute_round_trip() -> Result<()> {
		#[derive(Default)]
		struct VertexAttrs {
			values: Vec<(u32, Option<u32>, Option<i64>)>,
		}
		impl GeometryHandler for VertexAttrs {
			fn vertex_attribute(&mut self, key_index: u32, scaling_index: Option<u32>, value: i64) -> Result<bool, crate::CodecError> {
				self.values.push((key_index, scaling_index, Some(value)));
				Ok(true)
			}
			fn vertex_attribute_null(&mut self, key_index: u32) -> Result<bool, crate::CodecError> {
				self.values.push((key_index, None, None));
				Ok(true)
			}
		}

		let mut layer = LayerBuilder::new("test", 3)?;
		let scaling = layer.add_attribute_scaling(Scaling::new(0, 0.5, 0.0))?;
		{
			let mut feature = FeatureBuilder::new(&mut layer, GeomType::Point)?;
			feature.add_point(1, 1)?;
			feature.add_point(2, 2)?;
			feature.add_point(3, 3)?;
			feature.switch_to_geometric_attributes()?;
			feature.start_vertex_attribute_with_key("speed", 3, Some(scaling))?;
			feature.number_list_value(40)?;
			feature.number_list_null_value()?;
			feature.number_list_value(60)?;
			feature.commit()?;
		}
		let data = single_feature_tile(layer)?;

		let mut tile = VectorTile::from_slice(&data);
		let layer = tile.next_layer()?.unwrap();
		let feature = layer.features().next().unwrap()?;

		let mut handler = VertexAttrs::default();
		feature.decode_geometry(&mut handler)?;
		assert_eq!(
			handler.values,
			vec![(0, Some(0), Some(40)), (0, None, None), (0, Some(0), Some(60))]
		);
		Ok(())
	}

	#[test]
	fn test_map_attribute_round_trip() -> Result<()> {
		use crate::attributes::test_handlers::AttributeDumpHandler;

		let mut layer = LayerBuilder::new("test", 3)?;
		{
			let mut feature = FeatureBuilder::new(&mut layer, GeomType::Point)?;
			feature.add_point(0, 0)?;
			feature.start_map_attribute_with_key("tags", 2)?;
			feature.map_key("name")?;
			feature.attribute_value("center")?;
			feature.map_key("height")?;
			feature.attribute_value(12u32)?;
			feature.commit()?;
		}
		let data = single_feature_tile(layer)?;

		let mut tile = VectorTile::from_slice(&data);
		let layer = tile.next_layer()?.unwrap();
		let feature = layer.features().next().unwrap()?;

		let mut handler = AttributeDumpHandler::default();
		let counts = feature.decode_attributes(&mut handler)?;
		assert_eq!(counts, (1, 5));
		assert_eq!(handler.out, "tags=map(2)[\nnamecenter\nheight12\n]\n");
		Ok(())
	}

	#[test]
	fn test_spline_round_trip() -> Result<()> {
		let mut layer = LayerBuilder::new("test", 3)?;
		{
			let mut feature = FeatureBuilder::new(&mut layer, GeomType::Spline)?;
			feature.set_string_id("ramp-7")?;
			feature.start_spline()?;
			feature.set_point(0, 0)?;
			feature.set_point(4, 4)?;
			feature.set_point(8, 0)?;
			feature.set_spline_degree(3)?;
			feature.spline_knot(0)?;
			feature.spline_knot(0)?;
			feature.spline_null_knot()?;
			feature.spline_knot(1)?;
			feature.commit()?;
		}
		let data = single_feature_tile(layer)?;

		let mut tile = VectorTile::from_slice(&data);
		let layer = tile.next_layer()?.unwrap();
		let feature = layer.features().next().unwrap()?;
		assert_eq!(feature.id(), FeatureId::String("ramp-7"));
		assert_eq!(feature.spline_degree(), 3);

		let mut handler = RecordingHandler::default();
		feature.decode_geometry(&mut handler)?;
		assert_eq!(handler.part_sizes, vec![3]);
		assert_eq!(handler.knot_header, Some((4, None)));
		assert_eq!(handler.knots, vec![Some(0), Some(0), None, Some(1)]);
		Ok(())
	}

	#[test]
	fn test_rollback_discards_feature() -> Result<()> {
		let mut layer = LayerBuilder::new("test", 2)?;
		{
			let mut feature = FeatureBuilder::new(&mut layer, GeomType::Point)?;
			feature.add_point(1, 1)?;
			feature.rollback();
		}
		{
			let mut feature = FeatureBuilder::new(&mut layer, GeomType::Point)?;
			feature.add_point(1, 1)?;
			// dropped without commit
		}
		assert_eq!(layer.num_features(), 0);
		Ok(())
	}

	#[test]
	fn test_commit_requires_geometry() -> Result<()> {
		let mut layer = LayerBuilder::new("test", 2)?;
		let feature = FeatureBuilder::new(&mut layer, GeomType::Point)?;
		let err = feature.commit().unwrap_err();
		assert!(matches!(err, crate::CodecError::Geometry(_)));
		Ok(())
	}

	#[test]
	fn test_commit_rejects_open_ring() -> Result<()> {
		let mut layer = LayerBuilder::new("test", 2)?;
		let mut feature = FeatureBuilder::new(&mut layer, GeomType::Polygon)?;
		feature.start_ring()?;
		feature.set_point(0, 0)?;
		feature.set_point(0, 1)?;
		feature.set_point(1, 1)?;
		let err = feature.commit().unwrap_err();
		assert!(matches!(err, crate::CodecError::BuilderState(_)));
		Ok(())
	}

	#[test]
	fn test_commit_rejects_open_list() -> Result<()> {
		let mut layer = LayerBuilder::new("test", 3)?;
		let mut feature = FeatureBuilder::new(&mut layer, GeomType::Point)?;
		feature.add_point(0, 0)?;
		feature.start_list_attribute_with_key("list", 3)?;
		feature.attribute_value(1u32)?;
		let err = feature.commit().unwrap_err();
		assert!(matches!(err, crate::CodecError::BuilderState(_)));
		Ok(())
	}

	#[test]
	fn test_builder_state_errors() -> Result<()> {
		let mut layer = LayerBuilder::new("test", 3)?;
		let mut feature = FeatureBuilder::new(&mut layer, GeomType::Point)?;

		assert!(feature.start_linestring().is_err());
		assert!(feature.set_point(0, 0).is_err());
		assert!(feature.attribute_value(1u32).is_err());
		assert!(feature.number_list_value(1).is_err());

		feature.add_point(0, 0)?;
		assert!(feature.add_point_3d(1, 1, 1).is_err()); // mixing dimensions

		assert!(feature.start_number_list_with_key("n", 2, None).is_err()); // scalar mode
		feature.switch_to_geometric_attributes()?;
		assert!(feature.switch_to_geometric_attributes().is_err());
		assert!(feature.add_scalar_attribute("k", 1u32).is_err());
		Ok(())
	}

	#[test]
	fn test_v2_layer_rejects_v3_builder_calls() -> Result<()> {
		let mut layer = LayerBuilder::new("test", 2)?;
		let mut feature = FeatureBuilder::new(&mut layer, GeomType::Point)?;
		assert!(feature.set_string_id("x").is_err());
		assert!(feature.add_point_3d(0, 0, 5).is_err());
		assert!(feature.switch_to_geometric_attributes().is_err());
		assert!(feature.start_list_attribute_with_key("l", 1).is_err());
		Ok(())
	}

	#[test]
	fn test_spline_requires_v3() -> Result<()> {
		let mut layer = LayerBuilder::new("test", 2)?;
		assert!(FeatureBuilder::new(&mut layer, GeomType::Spline).is_err());
		Ok(())
	}

	#[test]
	fn test_int_table_attribute_round_trip() -> Result<()> {
		use crate::attributes::test_handlers::AttributeDumpHandler;

		let mut layer = LayerBuilder::new("test", 3)?;
		{
			let mut feature = FeatureBuilder::new(&mut layer, GeomType::Point)?;
			feature.add_point(0, 0)?;
			feature.add_scalar_attribute("a", AttributeValue::Int(-123456789))?;
			feature.add_scalar_attribute("b", AttributeValue::Int(-123456789))?;
			feature.add_scalar_attribute("c", AttributeValue::Double(2.5))?;
			feature.add_scalar_attribute("d", AttributeValue::Float(1.5))?;
			feature.commit()?;
		}
		let data = single_feature_tile(layer)?;

		let mut tile = VectorTile::from_slice(&data);
		let layer = tile.next_layer()?.unwrap();
		assert_eq!(layer.int_table_value(0)?, -123456789);
		assert!(layer.int_table_value(1).is_err()); // deduplicated

		let feature = layer.features().next().unwrap()?;
		let mut handler = AttributeDumpHandler::default();
		feature.decode_attributes(&mut handler)?;
		assert_eq!(handler.out, "a=-123456789\nb=-123456789\nc=2.5\nd=1.5\n");
		Ok(())
	}
}
