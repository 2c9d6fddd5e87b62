//! Geometry command-stream decoding.
//!
//! A command word packs `(id & 0x7) | (count << 3)` with MoveTo = 1,
//! LineTo = 2 and ClosePath = 7. MoveTo and LineTo are followed by
//! `2 * count` zigzag deltas updating a cursor that starts at (0, 0, 0)
//! and persists across commands within one feature.
//!
//! The decoder is the single coordinator of all parallel streams: the
//! optional elevation stream contributes one z-delta per vertex, and every
//! active per-vertex attribute stream contributes one slot per vertex.
//! Attribute streams never advance on their own.

use crate::attributes::{COMPLEX_LIST, COMPLEX_MAP, COMPLEX_NUMBER_LIST, COMPLEX_VERTEX_LIST, skip_complex_value, to_index};
use crate::error::{Result, bail, ensure};
use crate::io::{ValueReaderSlice, zigzag_decode};
use crate::types::GeomType;
use log::trace;

const CMD_MOVE_TO: u32 = 1;
const CMD_LINE_TO: u32 = 2;
const CMD_CLOSE_PATH: u32 = 7;

/// A decoded vertex in tile coordinates. `z` stays 0 for features without
/// an elevation stream.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Point {
	pub x: i64,
	pub y: i64,
	pub z: i64,
}

impl Point {
	pub fn new(x: i64, y: i64) -> Point {
		Point { x, y, z: 0 }
	}

	pub fn new_3d(x: i64, y: i64, z: i64) -> Point {
		Point { x, y, z }
	}
}

/// Ring orientation derived from the signed shoelace sum in integer space.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Winding {
	Outer,
	Inner,
	/// The ring has zero area.
	Invalid,
}

/// Callbacks fired while decoding geometry.
///
/// Every method has a default implementation. Returning `Ok(false)` stops
/// decoding at the next vertex boundary; errors abort immediately.
#[allow(unused_variables)]
pub trait GeometryHandler {
	fn points_begin(&mut self, count: u32) -> Result<bool> {
		Ok(true)
	}
	fn points_point(&mut self, point: Point) -> Result<bool> {
		Ok(true)
	}
	fn points_end(&mut self) -> Result<bool> {
		Ok(true)
	}
	fn linestring_begin(&mut self, count: u32) -> Result<bool> {
		Ok(true)
	}
	fn linestring_point(&mut self, point: Point) -> Result<bool> {
		Ok(true)
	}
	fn linestring_end(&mut self) -> Result<bool> {
		Ok(true)
	}
	fn ring_begin(&mut self, count: u32) -> Result<bool> {
		Ok(true)
	}
	fn ring_point(&mut self, point: Point) -> Result<bool> {
		Ok(true)
	}
	fn ring_end(&mut self, winding: Winding) -> Result<bool> {
		Ok(true)
	}
	/// `scaling_index` is `None` for raw integer values; otherwise it
	/// indexes the layer's attribute scalings.
	fn vertex_attribute(&mut self, key_index: u32, scaling_index: Option<u32>, value: i64) -> Result<bool> {
		Ok(true)
	}
	fn vertex_attribute_null(&mut self, key_index: u32) -> Result<bool> {
		Ok(true)
	}
	fn knots_begin(&mut self, count: u32, scaling_index: Option<u32>) -> Result<bool> {
		Ok(true)
	}
	fn knot_value(&mut self, value: i64) -> Result<bool> {
		Ok(true)
	}
	fn knot_null_value(&mut self) -> Result<bool> {
		Ok(true)
	}
	fn knots_end(&mut self) -> Result<bool> {
		Ok(true)
	}
}

/// One per-vertex attribute stream, positioned at its slots.
struct VertexAttributeStream<'a> {
	reader: ValueReaderSlice<'a>,
	key_index: u32,
	scaling_index: Option<u32>,
	remaining: u32,
	cursor: i64,
}

/// Extracts the per-vertex streams (type 10) from a geometric attribute
/// section, skipping everything else.
fn parse_vertex_streams<'a>(data: &'a [u8]) -> Result<Vec<VertexAttributeStream<'a>>> {
	let mut streams = Vec::new();
	let mut reader = ValueReaderSlice::new(data);
	while reader.has_remaining() {
		let tag = reader.read_varint()?;
		let key_index = to_index(tag >> 4)?;
		match tag & 0x0F {
			COMPLEX_VERTEX_LIST => {
				let count = reader.read_varint32()?;
				// the scaling word is biased by one so 0 can mean "no scaling"
				let scaling_index = reader.read_varint32()?.checked_sub(1);
				let start = reader.position();
				for _ in 0..count {
					reader.read_varint()?;
				}
				streams.push(VertexAttributeStream {
					reader: ValueReaderSlice::new(&data[start..reader.position()]),
					key_index,
					scaling_index,
					remaining: count,
					cursor: 0,
				});
			}
			COMPLEX_NUMBER_LIST => {
				let count = reader.read_varint()?;
				reader.read_varint()?;
				for _ in 0..count {
					reader.read_varint()?;
				}
			}
			COMPLEX_LIST => {
				let count = reader.read_varint()?;
				for _ in 0..count {
					skip_complex_value(&mut reader, 1)?;
				}
			}
			COMPLEX_MAP => {
				let count = reader.read_varint()?;
				for _ in 0..count {
					reader.read_varint()?;
					skip_complex_value(&mut reader, 1)?;
				}
			}
			t => bail!(MalformedInput, "value type {t} cannot carry a key in geometric attributes"),
		}
	}
	Ok(streams)
}

macro_rules! emit {
	($self:ident, $call:expr) => {
		if !($call)? {
			$self.stopped = true;
			return Ok(());
		}
	};
}

/// Decodes one feature's geometry and its parallel streams.
pub(crate) struct GeometryDecoder<'a> {
	geometry: ValueReaderSlice<'a>,
	elevations: Option<ValueReaderSlice<'a>>,
	streams: Vec<VertexAttributeStream<'a>>,
	knots: Option<&'a [u8]>,
	cursor: Point,
	stopped: bool,
}

impl<'a> GeometryDecoder<'a> {
	pub fn new(
		geometry: &'a [u8],
		elevations: Option<&'a [u8]>,
		geometric_attributes: Option<&'a [u8]>,
		knots: Option<&'a [u8]>,
	) -> Result<GeometryDecoder<'a>> {
		Ok(GeometryDecoder {
			geometry: ValueReaderSlice::new(geometry),
			elevations: elevations.map(ValueReaderSlice::new),
			streams: match geometric_attributes {
				Some(data) => parse_vertex_streams(data)?,
				None => Vec::new(),
			},
			knots,
			cursor: Point::default(),
			stopped: false,
		})
	}

	pub fn decode<H: GeometryHandler>(mut self, geom_type: GeomType, handler: &mut H) -> Result<()> {
		match geom_type {
			GeomType::Point => self.decode_point(handler),
			GeomType::LineString => self.decode_linestring(handler),
			GeomType::Polygon => self.decode_polygon(handler),
			GeomType::Spline => self.decode_spline(handler),
			GeomType::Unknown => bail!(Geometry, "cannot decode a geometry of unknown type"),
		}
	}

	fn read_command(&mut self) -> Result<(u32, u32)> {
		let word = self.geometry.read_varint32()?;
		let id = word & 0x7;
		ensure!(
			id == CMD_MOVE_TO || id == CMD_LINE_TO || id == CMD_CLOSE_PATH,
			Geometry,
			"unknown command id {id}"
		);
		Ok((id, word >> 3))
	}

	fn next_vertex(&mut self) -> Result<Point> {
		let dx = self.geometry.read_svarint()?;
		let dy = self.geometry.read_svarint()?;
		self.cursor.x = self.cursor.x.wrapping_add(dx);
		self.cursor.y = self.cursor.y.wrapping_add(dy);
		if let Some(elevations) = &mut self.elevations {
			ensure!(elevations.has_remaining(), Geometry, "elevation stream shorter than the vertex count");
			let dz = elevations.read_svarint()?;
			self.cursor.z = self.cursor.z.wrapping_add(dz);
		}
		Ok(self.cursor)
	}

	fn emit_vertex_attributes<H: GeometryHandler>(&mut self, handler: &mut H) -> Result<()> {
		for stream in &mut self.streams {
			if stream.remaining == 0 {
				continue;
			}
			stream.remaining -= 1;
			let slot = stream.reader.read_varint()?;
			if slot == 0 {
				emit!(self, handler.vertex_attribute_null(stream.key_index));
			} else {
				stream.cursor = stream.cursor.wrapping_add(zigzag_decode(slot - 1));
				emit!(self, handler.vertex_attribute(stream.key_index, stream.scaling_index, stream.cursor));
			}
		}
		Ok(())
	}

	fn decode_point<H: GeometryHandler>(&mut self, handler: &mut H) -> Result<()> {
		let (id, count) = self.read_command()?;
		ensure!(id == CMD_MOVE_TO, Geometry, "point geometry must start with a MoveTo command");
		ensure!(count >= 1, Geometry, "point geometry with a vertex count of zero");
		emit!(self, handler.points_begin(count));
		for _ in 0..count {
			if self.stopped {
				return Ok(());
			}
			let point = self.next_vertex()?;
			emit!(self, handler.points_point(point));
			self.emit_vertex_attributes(handler)?;
		}
		if self.stopped {
			return Ok(());
		}
		emit!(self, handler.points_end());
		self.finish()
	}

	fn decode_linestring<H: GeometryHandler>(&mut self, handler: &mut H) -> Result<()> {
		self.decode_line_parts(handler)?;
		self.finish()
	}

	fn decode_line_parts<H: GeometryHandler>(&mut self, handler: &mut H) -> Result<()> {
		while self.geometry.has_remaining() {
			if self.stopped {
				return Ok(());
			}
			let (id, count) = self.read_command()?;
			ensure!(id == CMD_MOVE_TO, Geometry, "linestring part must start with a MoveTo command");
			ensure!(count == 1, Geometry, "MoveTo in a linestring must have exactly one vertex");
			let first = self.next_vertex()?;

			let (id, count) = self.read_command()?;
			ensure!(id == CMD_LINE_TO, Geometry, "expected a LineTo command after MoveTo");
			ensure!(count >= 1, Geometry, "LineTo with a vertex count of zero");

			emit!(self, handler.linestring_begin(count + 1));
			emit!(self, handler.linestring_point(first));
			self.emit_vertex_attributes(handler)?;
			for _ in 0..count {
				if self.stopped {
					return Ok(());
				}
				let point = self.next_vertex()?;
				emit!(self, handler.linestring_point(point));
				self.emit_vertex_attributes(handler)?;
			}
			if self.stopped {
				return Ok(());
			}
			emit!(self, handler.linestring_end());
		}
		Ok(())
	}

	fn decode_polygon<H: GeometryHandler>(&mut self, handler: &mut H) -> Result<()> {
		while self.geometry.has_remaining() {
			if self.stopped {
				return Ok(());
			}
			let (id, count) = self.read_command()?;
			ensure!(id == CMD_MOVE_TO, Geometry, "polygon ring must start with a MoveTo command");
			ensure!(count == 1, Geometry, "MoveTo in a polygon must have exactly one vertex");
			let first = self.next_vertex()?;

			let (id, count) = self.read_command()?;
			ensure!(id == CMD_LINE_TO, Geometry, "expected a LineTo command after MoveTo");
			ensure!(count >= 2, Geometry, "polygon ring with fewer than four vertices");

			emit!(self, handler.ring_begin(count + 2));
			emit!(self, handler.ring_point(first));
			self.emit_vertex_attributes(handler)?;

			// twice the signed area, accumulated edge by edge
			let mut area = 0i128;
			let mut previous = first;
			for _ in 0..count {
				if self.stopped {
					return Ok(());
				}
				let point = self.next_vertex()?;
				area += i128::from(previous.x) * i128::from(point.y) - i128::from(point.x) * i128::from(previous.y);
				previous = point;
				emit!(self, handler.ring_point(point));
				self.emit_vertex_attributes(handler)?;
			}
			area += i128::from(previous.x) * i128::from(first.y) - i128::from(first.x) * i128::from(previous.y);

			let (id, count) = self.read_command()?;
			ensure!(id == CMD_CLOSE_PATH, Geometry, "polygon ring must end with a ClosePath command");
			ensure!(count <= 1, Geometry, "ClosePath must not have a vertex count");

			if self.stopped {
				return Ok(());
			}
			// the closing vertex repeats the MoveTo vertex and consumes
			// nothing from the parallel streams
			emit!(self, handler.ring_point(first));
			let winding = if area > 0 {
				Winding::Outer
			} else if area < 0 {
				Winding::Inner
			} else {
				trace!("polygon ring with zero area");
				Winding::Invalid
			};
			emit!(self, handler.ring_end(winding));
		}
		self.finish()
	}

	fn decode_spline<H: GeometryHandler>(&mut self, handler: &mut H) -> Result<()> {
		self.decode_line_parts(handler)?;
		if self.stopped {
			return Ok(());
		}
		if let Some(data) = self.knots {
			let mut reader = ValueReaderSlice::new(data);
			let count = reader.read_varint32()?;
			let scaling_index = reader.read_varint32()?.checked_sub(1);
			emit!(self, handler.knots_begin(count, scaling_index));
			let mut cursor = 0i64;
			for _ in 0..count {
				if self.stopped {
					return Ok(());
				}
				let slot = reader.read_varint()?;
				if slot == 0 {
					emit!(self, handler.knot_null_value());
				} else {
					cursor = cursor.wrapping_add(zigzag_decode(slot - 1));
					emit!(self, handler.knot_value(cursor));
				}
			}
			ensure!(!reader.has_remaining(), MalformedInput, "trailing data after the knot stream");
			emit!(self, handler.knots_end());
		}
		self.finish()
	}

	fn finish(&mut self) -> Result<()> {
		if self.stopped {
			return Ok(());
		}
		ensure!(
			!self.geometry.has_remaining(),
			Geometry,
			"trailing data after the geometry command stream"
		);
		if let Some(elevations) = &self.elevations {
			ensure!(
				!elevations.has_remaining(),
				Geometry,
				"elevation stream longer than the vertex count"
			);
		}
		for stream in &self.streams {
			if stream.remaining > 0 {
				trace!(
					"per-vertex attribute stream for key {} ends with {} unused values",
					stream.key_index, stream.remaining
				);
			}
		}
		Ok(())
	}
}
