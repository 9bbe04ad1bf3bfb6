//! Decoder for the HotSpot performance data file (`hsperfdata_<user>/<pid>`).
//!
//! Layout of the v2 file:
//! ```text
//! prologue (32 bytes)
//!   u32 magic           0xcafec0c0, always big-endian
//!   u8  byte_order      0 = big-endian, 1 = little-endian (applies to the rest)
//!   u8  major, u8 minor
//!   u8  accessible      non-zero once the JVM finished initialising the region
//!   i32 used, i32 overflow
//!   i64 mod_time_stamp
//!   i32 entry_offset, i32 num_entries
//! entries
//!   i32 entry_length, i32 name_offset, i32 vector_length
//!   u8 data_type ('J' = i64, 'B' = byte vector), u8 flags, u8 units, u8 variability
//!   i32 data_offset
//!   ... NUL terminated name at name_offset, data at data_offset
//! ```

use crate::introspection::error::{SessionError, SessionResult};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

const MAGIC: [u8; 4] = [0xca, 0xfe, 0xc0, 0xc0];
const PROLOGUE_LEN: usize = 32;
const ENTRY_HEADER_LEN: usize = 20;
const TYPE_LONG: u8 = b'J';
const TYPE_BYTE: u8 = b'B';

#[derive(Debug, Clone, PartialEq)]
pub enum PerfValue {
    Long(i64),
    Text(String),
}

#[derive(Debug, Clone, Default)]
pub struct PerfData {
    counters: HashMap<String, PerfValue>,
    mod_time_stamp: i64,
}

#[derive(Clone, Copy)]
struct Reader<'a> {
    bytes: &'a [u8],
    little_endian: bool,
}

impl<'a> Reader<'a> {
    fn slice(&self, at: usize, len: usize) -> SessionResult<&'a [u8]> {
        at.checked_add(len)
            .and_then(|end| self.bytes.get(at..end))
            .ok_or_else(|| SessionError::malformed(format!("read of {} bytes at {} out of bounds", len, at)))
    }

    fn u8(&self, at: usize) -> SessionResult<u8> {
        Ok(self.slice(at, 1)?[0])
    }

    fn i32(&self, at: usize) -> SessionResult<i32> {
        let mut buf = [0u8; 4];
        buf.copy_from_slice(self.slice(at, 4)?);
        Ok(if self.little_endian {
            i32::from_le_bytes(buf)
        } else {
            i32::from_be_bytes(buf)
        })
    }

    fn i64(&self, at: usize) -> SessionResult<i64> {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(self.slice(at, 8)?);
        Ok(if self.little_endian {
            i64::from_le_bytes(buf)
        } else {
            i64::from_be_bytes(buf)
        })
    }

    fn offset(&self, at: usize) -> SessionResult<usize> {
        usize::try_from(self.i32(at)?)
            .map_err(|_| SessionError::malformed(format!("negative offset at {}", at)))
    }

    fn c_string(&self, at: usize, max_len: usize) -> SessionResult<String> {
        let available = self.bytes.len().saturating_sub(at).min(max_len);
        let raw = self.slice(at, available)?;
        let end = raw.iter().position(|b| *b == 0).unwrap_or(raw.len());
        Ok(String::from_utf8_lossy(&raw[..end]).into_owned())
    }
}

impl PerfData {
    pub fn parse(bytes: &[u8]) -> SessionResult<Self> {
        if bytes.len() < PROLOGUE_LEN {
            return Err(SessionError::malformed("file shorter than prologue"));
        }
        if bytes[..4] != MAGIC {
            return Err(SessionError::malformed("bad magic"));
        }

        let reader = Reader {
            bytes,
            little_endian: match bytes[4] {
                0 => false,
                1 => true,
                other => {
                    return Err(SessionError::malformed(format!("unknown byte order {}", other)))
                }
            },
        };

        let major = reader.u8(5)?;
        if major != 2 {
            return Err(SessionError::malformed(format!("unsupported major version {}", major)));
        }
        if reader.u8(7)? == 0 {
            return Err(SessionError::malformed("region not yet accessible"));
        }

        let mod_time_stamp = reader.i64(16)?;
        let mut at = reader.offset(24)?;
        let num_entries = reader.offset(28)?;
        let max_entries = bytes.len().saturating_sub(at) / ENTRY_HEADER_LEN;
        if num_entries > max_entries {
            return Err(SessionError::malformed(format!(
                "{} entries do not fit in {} bytes",
                num_entries,
                bytes.len()
            )));
        }

        let mut counters = HashMap::with_capacity(num_entries);
        for _ in 0..num_entries {
            let entry_length = reader.offset(at)?;
            if entry_length < ENTRY_HEADER_LEN {
                return Err(SessionError::malformed(format!("entry at {} too short", at)));
            }
            let name_offset = reader.offset(at + 4)?;
            let vector_length = reader.offset(at + 8)?;
            let data_type = reader.u8(at + 12)?;
            let data_offset = reader.offset(at + 16)?;

            let name = reader.c_string(at + name_offset, entry_length.saturating_sub(name_offset))?;
            let data_at = at + data_offset;

            let value = match (data_type, vector_length) {
                (TYPE_LONG, 0) => Some(PerfValue::Long(reader.i64(data_at)?)),
                (TYPE_BYTE, len) if len > 0 => Some(PerfValue::Text(reader.c_string(data_at, len)?)),
                // long vectors and other types carry nothing we report
                _ => None,
            };
            if let Some(value) = value {
                counters.insert(name, value);
            }
            at += entry_length;
        }

        Ok(Self {
            counters,
            mod_time_stamp,
        })
    }

    pub fn mod_time_stamp(&self) -> i64 {
        self.mod_time_stamp
    }

    pub fn len(&self) -> usize {
        self.counters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }

    pub fn long(&self, name: &str) -> Option<i64> {
        match self.counters.get(name) {
            Some(PerfValue::Long(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        match self.counters.get(name) {
            Some(PerfValue::Text(v)) => Some(v.as_str()),
            _ => None,
        }
    }

    /// Converts a tick counter to milliseconds using `sun.os.hrt.frequency`.
    pub fn ticks_to_millis(&self, ticks: i64) -> Option<i64> {
        let frequency = self.long("sun.os.hrt.frequency").filter(|f| *f > 0)?;
        Some(((ticks as i128) * 1000 / (frequency as i128)) as i64)
    }
}

/// Finds `<root>/hsperfdata_*/<pid>`.
pub fn find_perf_data(root: &Path, pid: u32) -> Option<PathBuf> {
    let file_name = pid.to_string();
    std::fs::read_dir(root)
        .ok()?
        .flatten()
        .filter(|entry| {
            entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.starts_with("hsperfdata_"))
        })
        .map(|entry| entry.path().join(&file_name))
        .find(|candidate| candidate.is_file())
}
