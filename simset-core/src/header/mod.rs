//! Fixed-size binary header container, ported from `LbHeader.c`.
//!
//! A header is a fixed-size byte region carved into `(id, size,
//! payload)` elements: `id` and `size` are always stored big-endian so
//! the layout is byte-order independent to read, while `payload` is
//! written in the host's native endianness (the original's own
//! documented trade-off: avoids alignment faults on every platform it
//! shipped on, at the cost of payload portability across architectures
//! with different endianness). An all-`0xFF` id marks the start of the
//! unused tail of the region.

use std::io::{Read, Seek, SeekFrom, Write};

use crate::error::{SimError, SimResult};

const ID_LEN: usize = 4;
const SIZE_LEN: usize = 4;
const EMPTY_FILL: u8 = 0xFF;
const EMPTY_ID: u32 = 0xFFFF_FFFF;

/// A fixed-size, in-memory header region that can be read from and
/// written back to a file verbatim.
#[derive(Debug, Clone)]
pub struct Header {
    data: Vec<u8>,
}

impl Header {
    /// Creates a new, empty header of the given byte size, filled with
    /// the empty-field sentinel (`LbHdrNew`).
    pub fn new(size: usize) -> Self {
        Self {
            data: vec![EMPTY_FILL; size],
        }
    }

    /// Total size in bytes of the header region.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True if the header region is zero-length.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Reads a header of the given size from the start of `reader`,
    /// leaving the reader's position unspecified afterwards
    /// (`LbHdrOpen`).
    pub fn read_from<R: Read + Seek>(reader: &mut R, size: usize, path: &std::path::Path) -> SimResult<Self> {
        reader
            .seek(SeekFrom::Start(0))
            .map_err(|source| SimError::Io { path: path.to_path_buf(), source })?;
        let mut data = vec![0u8; size];
        reader
            .read_exact(&mut data)
            .map_err(|source| SimError::Io { path: path.to_path_buf(), source })?;
        Ok(Self { data })
    }

    /// Writes this header to the start of `writer`, restoring the
    /// writer's original position afterwards (`LbHdrWrite`).
    pub fn write_to<W: Write + Seek>(&self, writer: &mut W, path: &std::path::Path) -> SimResult<()> {
        let cur_pos = writer
            .stream_position()
            .map_err(|source| SimError::Io { path: path.to_path_buf(), source })?;
        writer
            .seek(SeekFrom::Start(0))
            .map_err(|source| SimError::Io { path: path.to_path_buf(), source })?;
        writer
            .write_all(&self.data)
            .map_err(|source| SimError::Io { path: path.to_path_buf(), source })?;
        writer
            .seek(SeekFrom::Start(cur_pos))
            .map_err(|source| SimError::Io { path: path.to_path_buf(), source })?;
        Ok(())
    }

    /// Scans the header elements, returning `(id, offset_of_payload,
    /// size)` for each live element in storage order, stopping at the
    /// first `0xFFFFFFFF` id or when the region is exhausted.
    fn scan(&self) -> Vec<(u32, usize, usize)> {
        let mut elems = Vec::new();
        let mut offset = 0usize;
        while offset + ID_LEN <= self.data.len() {
            let id = u32::from_be_bytes(self.data[offset..offset + ID_LEN].try_into().unwrap());
            if id == EMPTY_ID {
                break;
            }
            let size_offset = offset + ID_LEN;
            if size_offset + SIZE_LEN > self.data.len() {
                break;
            }
            let size = u32::from_be_bytes(
                self.data[size_offset..size_offset + SIZE_LEN].try_into().unwrap(),
            ) as usize;
            let payload_offset = size_offset + SIZE_LEN;
            elems.push((id, payload_offset, size));
            offset = payload_offset + size;
        }
        elems
    }

    /// Returns the raw payload bytes for `id`, erroring with
    /// [`SimError::HeaderSizeMismatch`] if `expected_size` doesn't match
    /// the stored element's size (`LbHdrGtElem`).
    pub fn get_raw(&self, id: u32, expected_size: usize) -> SimResult<&[u8]> {
        let (_, payload_offset, size) = self
            .scan()
            .into_iter()
            .find(|(elem_id, _, _)| *elem_id == id)
            .ok_or(SimError::HeaderElementNotFound(id))?;

        if size != expected_size {
            return Err(SimError::HeaderSizeMismatch {
                id,
                stored: size as u32,
                expected: expected_size as u32,
            });
        }
        Ok(&self.data[payload_offset..payload_offset + size])
    }

    /// Reads a fixed-width numeric element, in host byte order, as the
    /// original does (`LbHdrGtElem`).
    pub fn get_i32(&self, id: u32) -> SimResult<i32> {
        let bytes = self.get_raw(id, 4)?;
        Ok(i32::from_ne_bytes(bytes.try_into().unwrap()))
    }

    /// Reads a 64-bit float element, in host byte order.
    pub fn get_f64(&self, id: u32) -> SimResult<f64> {
        let bytes = self.get_raw(id, 8)?;
        Ok(f64::from_ne_bytes(bytes.try_into().unwrap()))
    }

    /// Writes or replaces the element `id` with `payload`, appending it
    /// after the last live element if not already present
    /// (`LbHdrStElem`). Errors if there is no room left in the region.
    pub fn set_raw(&mut self, id: u32, payload: &[u8]) -> SimResult<()> {
        let elems = self.scan();
        if let Some((_, payload_offset, size)) = elems.iter().find(|(elem_id, _, _)| *elem_id == id) {
            if *size != payload.len() {
                return Err(SimError::HeaderSizeMismatch {
                    id,
                    stored: *size as u32,
                    expected: payload.len() as u32,
                });
            }
            self.data[*payload_offset..*payload_offset + *size].copy_from_slice(payload);
            return Ok(());
        }

        let append_at = elems
            .last()
            .map(|(_, payload_offset, size)| payload_offset + size)
            .unwrap_or(0);
        let needed = ID_LEN + SIZE_LEN + payload.len();
        if append_at + needed > self.data.len() {
            return Err(SimError::Numeric {
                context: "header",
                detail: format!(
                    "no room for element {id} ({needed} bytes needed, {} available)",
                    self.data.len() - append_at
                ),
            });
        }

        let mut offset = append_at;
        self.data[offset..offset + ID_LEN].copy_from_slice(&id.to_be_bytes());
        offset += ID_LEN;
        self.data[offset..offset + SIZE_LEN].copy_from_slice(&(payload.len() as u32).to_be_bytes());
        offset += SIZE_LEN;
        self.data[offset..offset + payload.len()].copy_from_slice(payload);
        Ok(())
    }

    /// Writes a fixed-width numeric element in host byte order.
    pub fn set_i32(&mut self, id: u32, value: i32) -> SimResult<()> {
        self.set_raw(id, &value.to_ne_bytes())
    }

    /// Writes a 64-bit float element in host byte order.
    pub fn set_f64(&mut self, id: u32, value: f64) -> SimResult<()> {
        self.set_raw(id, &value.to_ne_bytes())
    }
}

/// Canonical element IDs shared across header-writing modules. Values
/// are arbitrary but stable once a history file format is on disk.
pub mod field_id {
    /// Run seed (u64, stored as two i32 elements: hi, lo).
    pub const RUN_SEED_HI: u32 = 1;
    pub const RUN_SEED_LO: u32 = 2;
    /// Total number of decays simulated.
    pub const NUM_DECAYS: u32 = 3;
    /// Total number of photons tracked.
    pub const NUM_PHOTONS: u32 = 4;
    /// Isotope energy in keV.
    pub const ISOTOPE_ENERGY: u32 = 5;
    /// Simset software version, as a packed i32.
    pub const VERSION: u32 = 6;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn fresh_header_is_all_empty_fill() {
        let header = Header::new(64);
        assert!(header.data.iter().all(|&b| b == EMPTY_FILL));
    }

    #[test]
    fn set_then_get_round_trips() {
        let mut header = Header::new(64);
        header.set_i32(field_id::NUM_DECAYS, 12345).unwrap();
        assert_eq!(header.get_i32(field_id::NUM_DECAYS).unwrap(), 12345);
    }

    #[test]
    fn missing_element_is_reported() {
        let header = Header::new(64);
        match header.get_i32(field_id::NUM_DECAYS) {
            Err(SimError::HeaderElementNotFound(id)) => assert_eq!(id, field_id::NUM_DECAYS),
            other => panic!("expected HeaderElementNotFound, got {other:?}"),
        }
    }

    #[test]
    fn size_mismatch_is_reported() {
        let mut header = Header::new(64);
        header.set_i32(field_id::NUM_DECAYS, 1).unwrap();
        match header.get_f64(field_id::NUM_DECAYS) {
            Err(SimError::HeaderSizeMismatch { id, stored, expected }) => {
                assert_eq!(id, field_id::NUM_DECAYS);
                assert_eq!(stored, 4);
                assert_eq!(expected, 8);
            }
            other => panic!("expected HeaderSizeMismatch, got {other:?}"),
        }
    }

    #[test]
    fn overwrite_preserves_other_elements() {
        let mut header = Header::new(64);
        header.set_i32(field_id::NUM_DECAYS, 1).unwrap();
        header.set_i32(field_id::NUM_PHOTONS, 2).unwrap();
        header.set_i32(field_id::NUM_DECAYS, 99).unwrap();
        assert_eq!(header.get_i32(field_id::NUM_DECAYS).unwrap(), 99);
        assert_eq!(header.get_i32(field_id::NUM_PHOTONS).unwrap(), 2);
    }

    #[test]
    fn file_round_trip() {
        let mut header = Header::new(32);
        header.set_i32(field_id::NUM_DECAYS, 7).unwrap();

        let mut buf = Cursor::new(vec![0u8; 32]);
        header.write_to(&mut buf, std::path::Path::new("test")).unwrap();

        let read_back = Header::read_from(&mut buf, 32, std::path::Path::new("test")).unwrap();
        assert_eq!(read_back.get_i32(field_id::NUM_DECAYS).unwrap(), 7);
    }

    #[test]
    fn region_too_small_for_element_is_an_error() {
        let mut header = Header::new(8);
        assert!(header.set_raw(field_id::NUM_DECAYS, &[0u8; 100]).is_err());
    }
}
