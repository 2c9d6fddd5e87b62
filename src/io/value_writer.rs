use crate::io::zigzag_encode;
use crate::types::Blob;
use byteorder::{ByteOrder, LittleEndian};

/// Appends typed fields to an in-memory buffer.
///
/// Writing to a vector cannot fail, so the methods are infallible; errors
/// surface earlier, when values are validated.
#[derive(Default)]
pub struct ValueWriterBlob {
	buf: Vec<u8>,
}

impl ValueWriterBlob {
	pub fn new() -> ValueWriterBlob {
		ValueWriterBlob { buf: Vec::new() }
	}

	pub fn len(&self) -> usize {
		self.buf.len()
	}

	pub fn is_empty(&self) -> bool {
		self.buf.is_empty()
	}

	pub fn into_blob(self) -> Blob {
		Blob::from(self.buf)
	}

	pub fn as_slice(&self) -> &[u8] {
		&self.buf
	}

	pub fn write_varint(&mut self, mut value: u64) {
		while value >= 0x80 {
			self.buf.push((value as u8 & 0x7F) | 0x80);
			value >>= 7;
		}
		self.buf.push(value as u8);
	}

	pub fn write_svarint(&mut self, value: i64) {
		self.write_varint(zigzag_encode(value));
	}

	pub fn write_f32(&mut self, value: f32) {
		let mut bytes = [0u8; 4];
		LittleEndian::write_f32(&mut bytes, value);
		self.buf.extend_from_slice(&bytes);
	}

	pub fn write_f64(&mut self, value: f64) {
		let mut bytes = [0u8; 8];
		LittleEndian::write_f64(&mut bytes, value);
		self.buf.extend_from_slice(&bytes);
	}

	pub fn write_slice(&mut self, slice: &[u8]) {
		self.buf.extend_from_slice(slice);
	}

	pub fn write_pbf_key(&mut self, field_number: u32, wire_type: u8) {
		self.write_varint((u64::from(field_number) << 3) | u64::from(wire_type));
	}

	pub fn write_pbf_view(&mut self, view: &[u8]) {
		self.write_varint(view.len() as u64);
		self.write_slice(view);
	}

	pub fn write_pbf_string(&mut self, text: &str) {
		self.write_pbf_view(text.as_bytes());
	}

	pub fn write_pbf_packed_uint32(&mut self, values: &[u32]) {
		let mut packed = ValueWriterBlob::new();
		for &value in values {
			packed.write_varint(u64::from(value));
		}
		self.write_pbf_view(packed.as_slice());
	}

	/// Writes another writer's content as a length-delimited field.
	pub fn write_pbf_message(&mut self, message: &ValueWriterBlob) {
		self.write_pbf_view(message.as_slice());
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_write_varint() {
		let mut writer = ValueWriterBlob::new();
		writer.write_varint(300);
		assert_eq!(writer.into_blob().into_vec(), vec![0b10101100, 0b00000010]);
	}

	#[test]
	fn test_write_svarint() {
		let mut writer = ValueWriterBlob::new();
		writer.write_svarint(-75);
		assert_eq!(writer.into_blob().into_vec(), vec![149, 1]);
	}

	#[test]
	fn test_write_f32() {
		let mut writer = ValueWriterBlob::new();
		writer.write_f32(1.0);
		assert_eq!(writer.into_blob().into_vec(), vec![0x00, 0x00, 0x80, 0x3F]);
	}

	#[test]
	fn test_write_f64() {
		let mut writer = ValueWriterBlob::new();
		writer.write_f64(1.0);
		assert_eq!(
			writer.into_blob().into_vec(),
			vec![0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xF0, 0x3F]
		);
	}

	#[test]
	fn test_write_pbf_key() {
		let mut writer = ValueWriterBlob::new();
		writer.write_pbf_key(1, 0);
		assert_eq!(writer.into_blob().into_vec(), vec![0x08]);
	}

	#[test]
	fn test_write_pbf_string() {
		let mut writer = ValueWriterBlob::new();
		writer.write_pbf_string("hello");
		assert_eq!(writer.into_blob().into_vec(), vec![0x05, b'h', b'e', b'l', b'l', b'o']);
	}

	#[test]
	fn test_write_pbf_packed_uint32() {
		let mut writer = ValueWriterBlob::new();
		writer.write_pbf_packed_uint32(&[100, 150, 300]);
		assert_eq!(writer.into_blob().into_vec(), vec![5, 100, 150, 1, 172, 2]);
	}

	#[test]
	fn test_round_trip_with_reader() -> anyhow::Result<()> {
		use crate::io::ValueReaderSlice;

		let mut writer = ValueWriterBlob::new();
		writer.write_pbf_key(5, 0);
		writer.write_varint(4096);
		writer.write_pbf_key(1, 2);
		writer.write_pbf_string("water");

		let blob = writer.into_blob();
		let mut reader = ValueReaderSlice::new(blob.as_slice());
		assert_eq!(reader.read_pbf_key()?, (5, 0));
		assert_eq!(reader.read_varint()?, 4096);
		assert_eq!(reader.read_pbf_key()?, (1, 2));
		assert_eq!(reader.read_pbf_string()?, "water");
		Ok(())
	}
}
