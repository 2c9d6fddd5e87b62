use crate::error::{Result, bail, ensure};
use crate::io::zigzag_decode;
use byteorder::{ByteOrder, LittleEndian};

/// A cursor over a borrowed byte slice.
///
/// All length-delimited reads return sub-slices of the input; the reader
/// never copies payload bytes. Every primitive fails with
/// [`MalformedInput`](crate::CodecError::MalformedInput) when the buffer is
/// exhausted.
pub struct ValueReaderSlice<'a> {
	buf: &'a [u8],
	pos: usize,
}

impl<'a> ValueReaderSlice<'a> {
	pub fn new(buf: &'a [u8]) -> ValueReaderSlice<'a> {
		ValueReaderSlice { buf, pos: 0 }
	}

	pub fn len(&self) -> usize {
		self.buf.len()
	}

	pub fn is_empty(&self) -> bool {
		self.buf.is_empty()
	}

	pub fn position(&self) -> usize {
		self.pos
	}

	pub fn remaining(&self) -> usize {
		self.buf.len() - self.pos
	}

	pub fn has_remaining(&self) -> bool {
		self.remaining() > 0
	}

	pub fn read_varint(&mut self) -> Result<u64> {
		let mut value = 0u64;
		let mut shift = 0u32;
		loop {
			let Some(&byte) = self.buf.get(self.pos) else {
				bail!(MalformedInput, "unexpected end of buffer inside varint");
			};
			self.pos += 1;
			value |= u64::from(byte & 0x7F) << shift;
			if byte & 0x80 == 0 {
				break;
			}
			shift += 7;
			if shift >= 70 {
				bail!(MalformedInput, "varint longer than 10 bytes");
			}
		}
		Ok(value)
	}

	pub fn read_varint32(&mut self) -> Result<u32> {
		let value = self.read_varint()?;
		u32::try_from(value).map_err(|_| crate::CodecError::MalformedInput(format!("varint {value} does not fit in 32 bits")))
	}

	pub fn read_svarint(&mut self) -> Result<i64> {
		Ok(zigzag_decode(self.read_varint()?))
	}

	pub fn read_f32(&mut self) -> Result<f32> {
		ensure!(self.remaining() >= 4, MalformedInput, "unexpected end of buffer reading fixed32");
		let value = LittleEndian::read_f32(&self.buf[self.pos..]);
		self.pos += 4;
		Ok(value)
	}

	pub fn read_f64(&mut self) -> Result<f64> {
		ensure!(self.remaining() >= 8, MalformedInput, "unexpected end of buffer reading fixed64");
		let value = LittleEndian::read_f64(&self.buf[self.pos..]);
		self.pos += 8;
		Ok(value)
	}

	/// Returns the next `length` bytes as a view into the input.
	pub fn read_view(&mut self, length: usize) -> Result<&'a [u8]> {
		ensure!(
			self.remaining() >= length,
			MalformedInput,
			"length-delimited field of {length} bytes exceeds the remaining {} bytes",
			self.remaining()
		);
		let view = &self.buf[self.pos..self.pos + length];
		self.pos += length;
		Ok(view)
	}

	pub fn read_string(&mut self, length: usize) -> Result<&'a str> {
		let view = self.read_view(length)?;
		std::str::from_utf8(view).map_err(|_| crate::CodecError::MalformedInput("string field is not valid UTF-8".to_string()))
	}

	/// Reads a field key and splits it into `(field number, wire type)`.
	pub fn read_pbf_key(&mut self) -> Result<(u32, u8)> {
		let value = self.read_varint()?;
		Ok(((value >> 3) as u32, (value & 0x07) as u8))
	}

	pub fn read_pbf_view(&mut self) -> Result<&'a [u8]> {
		let length = self.read_varint()?;
		self.read_view(length as usize)
	}

	pub fn read_pbf_string(&mut self) -> Result<&'a str> {
		let length = self.read_varint()?;
		self.read_string(length as usize)
	}

	/// Returns a reader over the next length-delimited field.
	pub fn get_pbf_sub_reader(&mut self) -> Result<ValueReaderSlice<'a>> {
		Ok(ValueReaderSlice::new(self.read_pbf_view()?))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_read_varint() -> Result<()> {
		let data = vec![0b10101100, 0b00000010]; // 300
		let mut reader = ValueReaderSlice::new(&data);
		assert_eq!(reader.read_varint()?, 300);
		assert!(!reader.has_remaining());
		Ok(())
	}

	#[test]
	fn test_read_varint_too_long() {
		let data = vec![0x80; 11];
		let mut reader = ValueReaderSlice::new(&data);
		assert!(reader.read_varint().is_err());
	}

	#[test]
	fn test_read_varint_truncated() {
		let data = vec![0x80, 0x80];
		let mut reader = ValueReaderSlice::new(&data);
		assert!(reader.read_varint().is_err());
	}

	#[test]
	fn test_read_svarint() -> Result<()> {
		let data = vec![149, 1]; // zigzag of -75
		let mut reader = ValueReaderSlice::new(&data);
		assert_eq!(reader.read_svarint()?, -75);
		Ok(())
	}

	#[test]
	fn test_read_f32() -> Result<()> {
		let data = vec![0x00, 0x00, 0x80, 0x3F];
		let mut reader = ValueReaderSlice::new(&data);
		assert_eq!(reader.read_f32()?, 1.0);
		Ok(())
	}

	#[test]
	fn test_read_f64() -> Result<()> {
		let data = vec![0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xF0, 0x3F];
		let mut reader = ValueReaderSlice::new(&data);
		assert_eq!(reader.read_f64()?, 1.0);
		Ok(())
	}

	#[test]
	fn test_read_view_is_borrowed() -> Result<()> {
		let data = vec![1u8, 2, 3, 4, 5];
		let mut reader = ValueReaderSlice::new(&data);
		let view = reader.read_view(3)?;
		assert_eq!(view, &data[0..3]);
		assert!(std::ptr::eq(view.as_ptr(), data.as_ptr()));
		Ok(())
	}

	#[test]
	fn test_read_view_too_long() {
		let data = vec![1u8, 2];
		let mut reader = ValueReaderSlice::new(&data);
		assert!(reader.read_view(3).is_err());
	}

	#[test]
	fn test_read_pbf_key() -> Result<()> {
		let data = vec![0x1A]; // field 3, wire type 2
		let mut reader = ValueReaderSlice::new(&data);
		assert_eq!(reader.read_pbf_key()?, (3, 2));
		Ok(())
	}

	#[test]
	fn test_read_pbf_string() -> Result<()> {
		let data = vec![0x05, b'h', b'e', b'l', b'l', b'o'];
		let mut reader = ValueReaderSlice::new(&data);
		assert_eq!(reader.read_pbf_string()?, "hello");
		Ok(())
	}

	#[test]
	fn test_read_pbf_string_invalid_utf8() {
		let data = vec![0x02, 0xFF, 0xFE];
		let mut reader = ValueReaderSlice::new(&data);
		assert!(reader.read_pbf_string().is_err());
	}

	#[test]
	fn test_sub_reader() -> Result<()> {
		let data = vec![0x02, 0x07, 0x08, 0x09];
		let mut reader = ValueReaderSlice::new(&data);
		let mut sub = reader.get_pbf_sub_reader()?;
		assert_eq!(sub.len(), 2);
		assert_eq!(sub.read_varint()?, 7);
		assert_eq!(sub.read_varint()?, 8);
		assert!(!sub.has_remaining());
		assert_eq!(reader.read_varint()?, 9);
		Ok(())
	}
}
