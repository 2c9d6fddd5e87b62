//! Reading and writing Mapbox Vector Tiles.
//!
//! This crate covers the released v2 format and the draft v3 extension
//! (elevation streams, string/double/float/int tables, scalings, string
//! ids, geometric attributes, complex values).
//!
//! Reading is zero-copy: [`VectorTile`], [`Layer`] and [`Feature`] are
//! views borrowing the caller's buffer, and geometry/attributes are
//! replayed through handler traits ([`GeometryHandler`],
//! [`AttributeHandler`]) whose methods all have defaults.
//!
//! Writing mirrors the reader: [`TileBuilder`] → [`LayerBuilder`] →
//! [`FeatureBuilder`], with `serialize()` producing one contiguous
//! [`Blob`].
//!
//! ```
//! use tilezero::{FeatureBuilder, GeomType, LayerBuilder, TileBuilder, VectorTile};
//!
//! # fn main() -> tilezero::Result<()> {
//! let mut tile = TileBuilder::new();
//! let mut layer = LayerBuilder::new("poi", 2)?;
//! let mut feature = FeatureBuilder::new(&mut layer, GeomType::Point)?;
//! feature.set_integer_id(17);
//! feature.add_point(2048, 2048)?;
//! feature.add_scalar_attribute("name", "center")?;
//! feature.commit()?;
//! tile.add_layer(layer);
//! let blob = tile.serialize()?;
//!
//! let mut tile = VectorTile::from_slice(blob.as_slice());
//! let layer = tile.next_layer()?.unwrap();
//! assert_eq!(layer.name(), "poi");
//! assert_eq!(layer.num_features(), 1);
//! # Ok(())
//! # }
//! ```

mod attributes;
mod builder;
mod error;
mod feature;
mod geometry;
pub mod io;
mod layer;
mod tile;
mod types;

pub use attributes::AttributeHandler;
pub use builder::{FeatureBuilder, LayerBuilder, TileBuilder};
pub use error::{CodecError, Result};
pub use feature::{Feature, FeatureId};
pub use geometry::{GeometryHandler, Point, Winding};
pub use layer::{Layer, TileRef};
pub use tile::{Layers, VectorTile};
pub use types::{AttributeValue, Blob, GeomType, PropertyValue, Scaling};
