// Typed, length-prefixed binary serialization of a row's values. The layout
// is deterministic and little-endian, matching the page header:
//
//   row_id:u64 | deleted:u8 | n_fields:u32
//   | (name_len:u16, name:utf8, type_tag:u8, value)*
//
// Type tags: 0 NULL, 1 i32, 2 i64, 3 f64, 4 bool (1 byte), 5 utf8 string
// (u32 length prefix). An unknown tag on decode is an error, never a skip.

use crate::common::{Row, Value};

pub const TAG_NULL: u8 = 0;
pub const TAG_I32: u8 = 1;
pub const TAG_I64: u8 = 2;
pub const TAG_F64: u8 = 3;
pub const TAG_BOOL: u8 = 4;
pub const TAG_STRING: u8 = 5;

/// Serialize a row into its page image.
pub fn encode_row(row: &Row) -> Vec<u8> {
    let mut buf = Vec::with_capacity(16 + row.values.len() * 16);
    buf.extend_from_slice(&row.row_id.to_le_bytes());
    buf.push(row.deleted as u8);
    buf.extend_from_slice(&(row.values.len() as u32).to_le_bytes());
    for (name, value) in &row.values {
        buf.extend_from_slice(&(name.len() as u16).to_le_bytes());
        buf.extend_from_slice(name.as_bytes());
        encode_value(&mut buf, value);
    }
    buf
}

fn encode_value(buf: &mut Vec<u8>, value: &Value) {
    match value {
        Value::Null => buf.push(TAG_NULL),
        Value::Integer(i) => {
            buf.push(TAG_I32);
            buf.extend_from_slice(&i.to_le_bytes());
        }
        Value::BigInt(i) => {
            buf.push(TAG_I64);
            buf.extend_from_slice(&i.to_le_bytes());
        }
        Value::Double(d) => {
            buf.push(TAG_F64);
            buf.extend_from_slice(&d.to_le_bytes());
        }
        Value::Boolean(b) => {
            buf.push(TAG_BOOL);
            buf.push(*b as u8);
        }
        Value::String(s) => {
            buf.push(TAG_STRING);
            buf.extend_from_slice(&(s.len() as u32).to_le_bytes());
            buf.extend_from_slice(s.as_bytes());
        }
    }
}

/// Deserialize a row from its page image. Timestamps are not part of the
/// image and come back freshly initialized.
pub fn decode_row(bytes: &[u8]) -> std::result::Result<Row, String> {
    let mut cursor = Cursor::new(bytes);
    let row_id = cursor.read_u64()?;
    let deleted = cursor.read_u8()? != 0;
    let n_fields = cursor.read_u32()? as usize;

    let mut values = Vec::with_capacity(n_fields);
    for _ in 0..n_fields {
        let name_len = cursor.read_u16()? as usize;
        let name = String::from_utf8(cursor.read_bytes(name_len)?.to_vec())
            .map_err(|_| "column name is not valid UTF-8".to_string())?;
        let value = decode_value(&mut cursor)?;
        values.push((name, value));
    }

    let mut row = Row::new(row_id, values);
    row.deleted = deleted;
    Ok(row)
}

fn decode_value(cursor: &mut Cursor<'_>) -> std::result::Result<Value, String> {
    let tag = cursor.read_u8()?;
    match tag {
        TAG_NULL => Ok(Value::Null),
        TAG_I32 => Ok(Value::Integer(i32::from_le_bytes(
            cursor.read_bytes(4)?.try_into().unwrap(),
        ))),
        TAG_I64 => Ok(Value::BigInt(i64::from_le_bytes(
            cursor.read_bytes(8)?.try_into().unwrap(),
        ))),
        TAG_F64 => Ok(Value::Double(f64::from_le_bytes(
            cursor.read_bytes(8)?.try_into().unwrap(),
        ))),
        TAG_BOOL => Ok(Value::Boolean(cursor.read_u8()? != 0)),
        TAG_STRING => {
            let len = cursor.read_u32()? as usize;
            let bytes = cursor.read_bytes(len)?;
            String::from_utf8(bytes.to_vec())
                .map(Value::String)
                .map_err(|_| "string value is not valid UTF-8".to_string())
        }
        other => Err(format!("unknown value tag {}", other)),
    }
}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn read_bytes(&mut self, len: usize) -> std::result::Result<&'a [u8], String> {
        if self.pos + len > self.bytes.len() {
            return Err("row image truncated".to_string());
        }
        let slice = &self.bytes[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn read_u8(&mut self) -> std::result::Result<u8, String> {
        Ok(self.read_bytes(1)?[0])
    }

    fn read_u16(&mut self) -> std::result::Result<u16, String> {
        Ok(u16::from_le_bytes(self.read_bytes(2)?.try_into().unwrap()))
    }

    fn read_u32(&mut self) -> std::result::Result<u32, String> {
        Ok(u32::from_le_bytes(self.read_bytes(4)?.try_into().unwrap()))
    }

    fn read_u64(&mut self) -> std::result::Result<u64, String> {
        Ok(u64::from_le_bytes(self.read_bytes(8)?.try_into().unwrap()))
    }
}
