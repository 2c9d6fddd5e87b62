//! A single feature, viewed inside its layer.
//!
//! Features are parsed from their frame when visited; the geometry and
//! attribute sections stay raw until one of the `decode_*` methods walks
//! them, and a feature can be decoded repeatedly.

use crate::attributes::{AttributeDecoder, AttributeHandler};
use crate::error::{Result, bail, ensure};
use crate::geometry::{GeometryDecoder, GeometryHandler};
use crate::io::ValueReaderSlice;
use crate::layer::Layer;
use crate::types::GeomType;

/// A feature id. Version 3 layers also permit string ids.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum FeatureId<'a> {
	#[default]
	None,
	Integer(u64),
	String(&'a str),
}

impl<'a> FeatureId<'a> {
	pub fn as_integer(&self) -> Option<u64> {
		match self {
			FeatureId::Integer(id) => Some(*id),
			_ => None,
		}
	}

	pub fn as_string(&self) -> Option<&'a str> {
		match *self {
			FeatureId::String(id) => Some(id),
			_ => None,
		}
	}

	pub fn is_none(&self) -> bool {
		matches!(self, FeatureId::None)
	}
}

/// A borrowed view of one feature.
///
/// Holds views into the tile buffer plus a reference to its layer for
/// intern-table lookups during attribute decoding.
pub struct Feature<'l, 'a> {
	layer: &'l Layer<'a>,
	id: FeatureId<'a>,
	geom_type: GeomType,
	geometry: &'a [u8],
	elevations: Option<&'a [u8]>,
	tag_ids: Option<&'a [u8]>,
	attributes: Option<&'a [u8]>,
	geometric_attributes: Option<&'a [u8]>,
	spline_knots: Option<&'a [u8]>,
	spline_degree: u32,
}

impl<'l, 'a> Feature<'l, 'a> {
	pub(crate) fn read(layer: &'l Layer<'a>, data: &'a [u8]) -> Result<Feature<'l, 'a>> {
		let version = layer.version();
		let mut feature = Feature {
			layer,
			id: FeatureId::None,
			geom_type: GeomType::Unknown,
			geometry: &[],
			elevations: None,
			tag_ids: None,
			attributes: None,
			geometric_attributes: None,
			spline_knots: None,
			spline_degree: 2,
		};

		let mut reader = ValueReaderSlice::new(data);
		while reader.has_remaining() {
			match reader.read_pbf_key()? {
				(1, 0) => feature.id = FeatureId::Integer(reader.read_varint()?),
				(2, 2) => {
					ensure!(version < 3, VersionMismatch, "legacy tags are not allowed in a version 3 layer");
					feature.tag_ids = Some(reader.read_pbf_view()?);
				}
				(3, 0) => feature.geom_type = GeomType::from(reader.read_varint()?),
				(4, 2) => feature.geometry = reader.read_pbf_view()?,
				(5, 2) => {
					ensure!(version == 3, VersionMismatch, "elevations require a version 3 layer");
					feature.elevations = Some(reader.read_pbf_view()?);
				}
				(6, 2) => {
					ensure!(version == 3, VersionMismatch, "complex attributes require a version 3 layer");
					feature.attributes = Some(reader.read_pbf_view()?);
				}
				(7, 2) => {
					ensure!(version == 3, VersionMismatch, "geometric attributes require a version 3 layer");
					feature.geometric_attributes = Some(reader.read_pbf_view()?);
				}
				(8, 2) => {
					ensure!(version == 3, VersionMismatch, "string ids require a version 3 layer");
					feature.id = FeatureId::String(reader.read_pbf_string()?);
				}
				(9, 2) => {
					ensure!(version == 3, VersionMismatch, "spline knots require a version 3 layer");
					feature.spline_knots = Some(reader.read_pbf_view()?);
				}
				(10, 0) => {
					ensure!(version == 3, VersionMismatch, "spline degree requires a version 3 layer");
					feature.spline_degree = reader.read_varint32()?;
				}
				(f, w) => bail!(MalformedInput, "unexpected field {f} with wire type {w} in feature"),
			}
		}

		Ok(feature)
	}

	pub fn id(&self) -> FeatureId<'a> {
		self.id
	}

	/// The integer id, if the feature has one.
	pub fn integer_id(&self) -> Option<u64> {
		self.id.as_integer()
	}

	pub fn geom_type(&self) -> GeomType {
		self.geom_type
	}

	/// The raw geometry command stream.
	pub fn geometry_data(&self) -> &'a [u8] {
		self.geometry
	}

	pub fn has_attributes(&self) -> bool {
		self.tag_ids.is_some_and(|d| !d.is_empty()) || self.attributes.is_some_and(|d| !d.is_empty())
	}

	pub fn has_geometric_attributes(&self) -> bool {
		self.geometric_attributes.is_some_and(|d| !d.is_empty())
	}

	pub fn spline_degree(&self) -> u32 {
		self.spline_degree
	}

	/// Replays the geometry through `handler`, stepping the elevation and
	/// per-vertex attribute streams in lockstep with the vertices.
	pub fn decode_geometry<H: GeometryHandler>(&self, handler: &mut H) -> Result<()> {
		ensure!(!self.geometry.is_empty(), Geometry, "feature has no geometry");
		GeometryDecoder::new(self.geometry, self.elevations, self.geometric_attributes, self.spline_knots)?
			.decode(self.geom_type, handler)
	}

	/// Decodes the scalar attributes. Returns the number of attributes and
	/// the number of values visited.
	pub fn decode_attributes<H: AttributeHandler>(&self, handler: &mut H) -> Result<(u64, u64)> {
		let mut decoder = AttributeDecoder::new(self.layer);
		self.run_scalar(&mut decoder, handler)?;
		Ok(decoder.counts())
	}

	/// Decodes the geometric attributes as attributes (keys, number lists,
	/// lists), without touching the geometry.
	pub fn decode_geometric_attributes<H: AttributeHandler>(&self, handler: &mut H) -> Result<(u64, u64)> {
		let mut decoder = AttributeDecoder::new(self.layer);
		self.run_geometric(&mut decoder, handler)?;
		Ok(decoder.counts())
	}

	/// Decodes the scalar attributes followed by the geometric ones.
	pub fn decode_all_attributes<H: AttributeHandler>(&self, handler: &mut H) -> Result<(u64, u64)> {
		let mut decoder = AttributeDecoder::new(self.layer);
		self.run_scalar(&mut decoder, handler)?;
		self.run_geometric(&mut decoder, handler)?;
		Ok(decoder.counts())
	}

	fn run_scalar<H: AttributeHandler>(&self, decoder: &mut AttributeDecoder<'l, 'a>, handler: &mut H) -> Result<()> {
		if self.layer.version() < 3 {
			if let Some(data) = self.tag_ids {
				decoder.decode_tag_pairs(data, handler)?;
			}
		} else if let Some(data) = self.attributes {
			decoder.decode_scalar_section(data, handler)?;
		}
		Ok(())
	}

	fn run_geometric<H: AttributeHandler>(&self, decoder: &mut AttributeDecoder<'l, 'a>, handler: &mut H) -> Result<()> {
		if let Some(data) = self.geometric_attributes {
			decoder.decode_geometric_section(data, handler)?;
		}
		Ok(())
	}
}

impl std::fmt::Debug for Feature<'_, '_> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Feature")
			.field("id", &self.id)
			.field("geom_type", &self.geom_type)
			.field("geometry_len", &self.geometry.len())
			.field("has_attributes", &self.has_attributes())
			.finish()
	}
}
