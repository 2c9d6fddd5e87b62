//! A tile view over a byte buffer.
//!
//! Tiles are a sequence of layer messages (field 3). Nothing is parsed
//! upfront; each layer frame is scanned when it is reached.

use crate::error::{Result, bail};
use crate::io::ValueReaderSlice;
use crate::layer::Layer;

fn read_next_layer<'a>(reader: &mut ValueReaderSlice<'a>) -> Result<Option<Layer<'a>>> {
	if !reader.has_remaining() {
		return Ok(None);
	}
	match reader.read_pbf_key()? {
		(3, 2) => Ok(Some(Layer::read(reader.read_pbf_view()?)?)),
		(f, w) => bail!(MalformedInput, "unexpected field {f} with wire type {w} in tile"),
	}
}

/// A borrowed view of a whole tile.
pub struct VectorTile<'a> {
	data: &'a [u8],
	reader: ValueReaderSlice<'a>,
}

impl<'a> VectorTile<'a> {
	/// Wraps a byte buffer. No parsing happens until layers are visited;
	/// the buffer must stay alive while any view derived from it is used.
	pub fn from_slice(data: &'a [u8]) -> VectorTile<'a> {
		VectorTile {
			data,
			reader: ValueReaderSlice::new(data),
		}
	}

	/// Returns the next layer, or `None` at the end of the tile.
	pub fn next_layer(&mut self) -> Result<Option<Layer<'a>>> {
		read_next_layer(&mut self.reader)
	}

	/// A fresh iterator over all layers in source order.
	pub fn layers(&self) -> Layers<'a> {
		Layers {
			reader: ValueReaderSlice::new(self.data),
		}
	}

	/// Finds a layer by name with a linear search from the start.
	pub fn get_layer_by_name(&self, name: &str) -> Result<Option<Layer<'a>>> {
		let mut reader = ValueReaderSlice::new(self.data);
		while let Some(layer) = read_next_layer(&mut reader)? {
			if layer.name() == name {
				return Ok(Some(layer));
			}
		}
		Ok(None)
	}
}

/// Iterator over the layers of a tile.
pub struct Layers<'a> {
	reader: ValueReaderSlice<'a>,
}

impl<'a> Iterator for Layers<'a> {
	type Item = Result<Layer<'a>>;

	fn next(&mut self) -> Option<Self::Item> {
		read_next_layer(&mut self.reader).transpose()
	}
}
