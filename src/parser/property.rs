//! MAPI property storage inside an MSG compound file.
//!
//! Each storage (the message root, every attachment and recipient) keeps
//! variable-length properties as separate streams named
//! `__substg1.0_IIIITTTT` and fixed-size ones in a single
//! `__properties_version1.0` table.

use std::collections::HashMap;
use std::io::{Cursor, Read, Seek};
use std::path::{Path, PathBuf};

use byteorder::{LittleEndian, ReadBytesExt};
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::error::{ConvertError, Result};
use crate::model::message::FieldValue;

pub const PT_LONG: u16 = 0x0003;
pub const PT_BOOLEAN: u16 = 0x000B;
pub const PT_STRING8: u16 = 0x001E;
pub const PT_UNICODE: u16 = 0x001F;
pub const PT_SYSTIME: u16 = 0x0040;
pub const PT_BINARY: u16 = 0x0102;
pub const PT_MV_UNICODE: u16 = 0x101F;
pub const PT_MV_STRING8: u16 = 0x101E;

pub const SUBSTG_PREFIX: &str = "__substg1.0_";
pub const PROPERTIES_STREAM: &str = "__properties_version1.0";

/// Seconds between 1601-01-01 and 1970-01-01.
const FILETIME_EPOCH_OFFSET: i64 = 11_644_473_600;

/// Size of the `__properties_version1.0` header for each storage kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    /// Top-level message: 32-byte header.
    Message,
    /// Attachment or recipient: 8-byte header.
    Child,
}

impl StorageKind {
    fn header_len(self) -> usize {
        match self {
            Self::Message => 32,
            Self::Child => 8,
        }
    }
}

/// A fixed-size property value from the property table.
#[derive(Debug, Clone, Copy, PartialEq)]
enum FixedValue {
    Long(i32),
    Boolean(bool),
    Time(DateTime<Utc>),
}

/// Index of all properties in one storage.
#[derive(Debug, Default)]
pub struct PropertyStorage {
    path: PathBuf,
    /// Property id → (type, stream path). Multi-value entries are keyed by their base type.
    streams: HashMap<u16, (u16, PathBuf)>,
    fixed: HashMap<u16, FixedValue>,
}

impl PropertyStorage {
    /// Scan the storage at `path` and parse its property table.
    pub fn load<F: Read + Seek>(
        cf: &mut cfb::CompoundFile<F>,
        path: &Path,
        kind: StorageKind,
    ) -> Result<Self> {
        let entries: Vec<(String, PathBuf, bool)> = cf
            .read_storage(path)
            .map_err(|e| ConvertError::io(path, e))?
            .map(|e| (e.name().to_string(), e.path().to_path_buf(), e.is_stream()))
            .collect();

        let mut storage = PropertyStorage {
            path: path.to_path_buf(),
            ..Default::default()
        };

        let mut has_table = false;
        for (name, entry_path, is_stream) in entries {
            if !is_stream {
                continue;
            }
            if name.eq_ignore_ascii_case(PROPERTIES_STREAM) {
                has_table = true;
                match read_stream(cf, &entry_path) {
                    Ok(bytes) => storage.fixed = parse_property_table(&bytes, kind),
                    Err(e) => debug!(path = %entry_path.display(), error = %e, "Unreadable property table"),
                }
            } else if let Some((id, ptype)) = parse_substg_name(&name) {
                // Prefer Unicode over 8-bit when a writer stored both
                let replace = match storage.streams.get(&id) {
                    Some((existing, _)) => *existing != PT_UNICODE && ptype == PT_UNICODE,
                    None => true,
                };
                if replace {
                    storage.streams.insert(id, (ptype, entry_path));
                }
            }
        }

        if !has_table && kind == StorageKind::Message && storage.streams.is_empty() {
            return Err(ConvertError::MissingPropertyStream(path.to_path_buf()));
        }
        Ok(storage)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether any variable-length stream exists for `id`.
    pub fn has_stream(&self, id: u16) -> bool {
        self.streams.contains_key(&id)
    }

    /// Read a string or binary property. Unicode text becomes `Text`,
    /// 8-bit text and binary become `Bytes`.
    pub fn value<F: Read + Seek>(
        &self,
        cf: &mut cfb::CompoundFile<F>,
        id: u16,
    ) -> Option<FieldValue> {
        let (ptype, path) = self.streams.get(&id)?;
        let bytes = match read_stream(cf, path) {
            Ok(b) => b,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "Failed to read property stream");
                return None;
            }
        };
        match *ptype {
            PT_UNICODE => Some(FieldValue::Text(decode_utf16(&bytes))),
            PT_STRING8 => Some(FieldValue::Bytes(trim_nul(bytes))),
            PT_BINARY => Some(FieldValue::Bytes(bytes)),
            PT_MV_UNICODE | PT_MV_STRING8 => {
                let values = self.multi_values(cf, id);
                if values.is_empty() {
                    None
                } else {
                    Some(FieldValue::Text(values.join(", ")))
                }
            }
            other => {
                debug!(
                    id = %format!("{id:04X}"),
                    ptype = %format!("{other:04X}"),
                    "Unsupported property type"
                );
                None
            }
        }
    }

    /// Read the elements of a multi-valued string property.
    pub fn multi_values<F: Read + Seek>(
        &self,
        cf: &mut cfb::CompoundFile<F>,
        id: u16,
    ) -> Vec<String> {
        let Some((ptype, path)) = self.streams.get(&id) else {
            return Vec::new();
        };
        if *ptype != PT_MV_UNICODE && *ptype != PT_MV_STRING8 {
            return Vec::new();
        }
        let base = path.to_string_lossy().to_string();
        let mut values = Vec::new();
        for index in 0u32.. {
            let element = PathBuf::from(format!("{base}-{index:08X}"));
            if !cf.is_stream(&element) {
                break;
            }
            match read_stream(cf, &element) {
                Ok(bytes) if *ptype == PT_MV_UNICODE => values.push(decode_utf16(&bytes)),
                Ok(bytes) => values.push(String::from_utf8_lossy(&trim_nul(bytes)).into_owned()),
                Err(e) => {
                    debug!(path = %element.display(), error = %e, "Failed to read multi-value element");
                    break;
                }
            }
        }
        values.retain(|v| !v.trim().is_empty());
        values
    }

    /// Read a binary property as raw bytes, whatever its declared type.
    pub fn bytes<F: Read + Seek>(&self, cf: &mut cfb::CompoundFile<F>, id: u16) -> Option<Vec<u8>> {
        let (_, path) = self.streams.get(&id)?;
        read_stream(cf, path).ok()
    }

    pub fn long(&self, id: u16) -> Option<i32> {
        match self.fixed.get(&id)? {
            FixedValue::Long(v) => Some(*v),
            _ => None,
        }
    }

    pub fn boolean(&self, id: u16) -> Option<bool> {
        match self.fixed.get(&id)? {
            FixedValue::Boolean(v) => Some(*v),
            _ => None,
        }
    }

    pub fn time(&self, id: u16) -> Option<DateTime<Utc>> {
        match self.fixed.get(&id)? {
            FixedValue::Time(v) => Some(*v),
            _ => None,
        }
    }

    /// Fixed property as a [`FieldValue`], whatever its type.
    pub fn fixed_value(&self, id: u16) -> Option<FieldValue> {
        Some(match self.fixed.get(&id)? {
            FixedValue::Long(v) => FieldValue::Integer(i64::from(*v)),
            FixedValue::Boolean(v) => FieldValue::Flag(*v),
            FixedValue::Time(v) => FieldValue::Timestamp(*v),
        })
    }
}

/// Read a whole stream into memory.
pub fn read_stream<F: Read + Seek>(
    cf: &mut cfb::CompoundFile<F>,
    path: &Path,
) -> std::io::Result<Vec<u8>> {
    let mut stream = cf.open_stream(path)?;
    let mut buf = Vec::new();
    stream.read_to_end(&mut buf)?;
    Ok(buf)
}

/// `__substg1.0_0037001F` → `(0x0037, 0x001F)`. Multi-value element streams
/// (`...-00000000`) are not properties themselves and yield `None`.
pub fn parse_substg_name(name: &str) -> Option<(u16, u16)> {
    let tag = name.strip_prefix(SUBSTG_PREFIX)?;
    if tag.len() != 8 || !tag.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    let id = u16::from_str_radix(tag.get(..4)?, 16).ok()?;
    let ptype = u16::from_str_radix(tag.get(4..)?, 16).ok()?;
    Some((id, ptype))
}

/// Parse the fixed-size entries of a property table.
fn parse_property_table(bytes: &[u8], kind: StorageKind) -> HashMap<u16, FixedValue> {
    let mut props = HashMap::new();
    let Some(body) = bytes.get(kind.header_len()..) else {
        return props;
    };

    for chunk in body.chunks_exact(16) {
        let mut cur = Cursor::new(chunk);
        let (Ok(ptype), Ok(id), Ok(_flags), Ok(raw)) = (
            cur.read_u16::<LittleEndian>(),
            cur.read_u16::<LittleEndian>(),
            cur.read_u32::<LittleEndian>(),
            cur.read_u64::<LittleEndian>(),
        ) else {
            break;
        };

        let value = match ptype {
            PT_LONG => Some(FixedValue::Long(raw as u32 as i32)),
            PT_BOOLEAN => Some(FixedValue::Boolean(raw & 0xFFFF != 0)),
            PT_SYSTIME => filetime_to_utc(raw).map(FixedValue::Time),
            _ => None,
        };
        if let Some(value) = value {
            props.insert(id, value);
        }
    }
    props
}

/// Convert a Windows FILETIME (100 ns ticks since 1601) to UTC. Zero means unset.
pub fn filetime_to_utc(ticks: u64) -> Option<DateTime<Utc>> {
    if ticks == 0 {
        return None;
    }
    let secs = (ticks / 10_000_000) as i64 - FILETIME_EPOCH_OFFSET;
    let nanos = ((ticks % 10_000_000) * 100) as u32;
    DateTime::from_timestamp(secs, nanos)
}

/// Decode UTF-16LE property text, dropping the trailing NUL terminator.
pub fn decode_utf16(bytes: &[u8]) -> String {
    let (text, _) = encoding_rs::UTF_16LE.decode_without_bom_handling(bytes);
    text.trim_end_matches('\0').to_string()
}

fn trim_nul(mut bytes: Vec<u8>) -> Vec<u8> {
    while bytes.last() == Some(&0) {
        bytes.pop();
    }
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_substg_name() {
        assert_eq!(
            parse_substg_name("__substg1.0_0037001F"),
            Some((0x0037, PT_UNICODE))
        );
        assert_eq!(
            parse_substg_name("__substg1.0_37010102"),
            Some((0x3701, PT_BINARY))
        );
        assert_eq!(parse_substg_name("__substg1.0_8000101F-00000000"), None);
        assert_eq!(parse_substg_name("__properties_version1.0"), None);
        assert_eq!(parse_substg_name("__substg1.0_abc\u{e9}def"), None);
        assert_eq!(parse_substg_name("__substg1.0_+0370001"), None);
    }

    #[test]
    fn test_filetime_conversion() {
        // 2024-01-15 09:30:00 UTC
        let ticks: u64 = (1_705_311_000 + 11_644_473_600) * 10_000_000;
        let dt = filetime_to_utc(ticks).unwrap();
        assert_eq!(dt, Utc.with_ymd_and_hms(2024, 1, 15, 9, 30, 0).unwrap());
        assert_eq!(filetime_to_utc(0), None);
    }

    #[test]
    fn test_parse_property_table_child_header() {
        let mut table = vec![0u8; 8];
        // PT_LONG 0x0C15 = 2
        table.extend_from_slice(&PT_LONG.to_le_bytes());
        table.extend_from_slice(&0x0C15u16.to_le_bytes());
        table.extend_from_slice(&6u32.to_le_bytes());
        table.extend_from_slice(&2u64.to_le_bytes());
        // PT_BOOLEAN 0x0029 = true
        table.extend_from_slice(&PT_BOOLEAN.to_le_bytes());
        table.extend_from_slice(&0x0029u16.to_le_bytes());
        table.extend_from_slice(&6u32.to_le_bytes());
        table.extend_from_slice(&1u64.to_le_bytes());
        // Unsupported type is skipped
        table.extend_from_slice(&0x0005u16.to_le_bytes());
        table.extend_from_slice(&0x1234u16.to_le_bytes());
        table.extend_from_slice(&6u32.to_le_bytes());
        table.extend_from_slice(&7u64.to_le_bytes());

        let props = parse_property_table(&table, StorageKind::Child);
        assert_eq!(props.get(&0x0C15), Some(&FixedValue::Long(2)));
        assert_eq!(props.get(&0x0029), Some(&FixedValue::Boolean(true)));
        assert!(!props.contains_key(&0x1234));
    }

    #[test]
    fn test_parse_property_table_truncated() {
        assert!(parse_property_table(&[0u8; 4], StorageKind::Message).is_empty());
        // Trailing partial entry is ignored
        let table = vec![0u8; 32 + 10];
        assert!(parse_property_table(&table, StorageKind::Message).is_empty());
    }

    #[test]
    fn test_decode_utf16_trims_nul() {
        let bytes: Vec<u8> = "Hi\0"
            .encode_utf16()
            .flat_map(|u| u.to_le_bytes())
            .collect();
        assert_eq!(decode_utf16(&bytes), "Hi");
    }
}
