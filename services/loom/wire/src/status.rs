//! get-file-status reply layout.
//!
//! ```text
//! [0:4)   body total units    (u32 LE)
//! [4:8)   body current units  (u32 LE, always 0)
//! [8:24)  body name           (15 chars max, NUL padded)
//! [24:28) border total units  (u32 LE)
//! [28:32) border current units(u32 LE, always 0)
//! [32:48) border name         (15 chars max, NUL padded)
//! ```

use crate::WireError;
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Width of each name field, terminator included
pub const NAME_FIELD_LEN: usize = 16;

/// Bytes per target: total, current, name
const TARGET_STATUS_LEN: usize = 4 + 4 + NAME_FIELD_LEN;

/// Total reply payload size
pub const FILE_STATUS_LEN: usize = 2 * TARGET_STATUS_LEN;

/// Status of one file target
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetStatus {
    /// Units (picks) the stored pattern describes
    pub total_units: u32,
    /// Units already woven; progress is not tracked, so this is reported as 0
    pub current_units: u32,
    /// Last-known file name, empty if none
    pub name: String,
}

impl TargetStatus {
    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u32_le(self.total_units);
        buf.put_u32_le(self.current_units);

        let mut field = [0u8; NAME_FIELD_LEN];
        let name = self.name.as_bytes();
        let visible = name.len().min(NAME_FIELD_LEN - 1);
        field[..visible].copy_from_slice(&name[..visible]);
        buf.put_slice(&field);
    }

    fn decode(buf: &mut Bytes) -> Self {
        let total_units = buf.get_u32_le();
        let current_units = buf.get_u32_le();
        let field = buf.split_to(NAME_FIELD_LEN);
        let end = field.iter().position(|b| *b == 0).unwrap_or(field.len());
        Self {
            total_units,
            current_units,
            name: String::from_utf8_lossy(&field[..end]).into_owned(),
        }
    }
}

/// Status of both file targets, body first
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileStatus {
    /// Body pattern target
    pub body: TargetStatus,
    /// Border pattern target
    pub border: TargetStatus,
}

impl FileStatus {
    /// Encode into the fixed-size reply payload
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(FILE_STATUS_LEN);
        self.body.encode(&mut buf);
        self.border.encode(&mut buf);
        buf.freeze()
    }

    /// Decode a reply payload
    pub fn decode(mut payload: Bytes) -> Result<Self, WireError> {
        if payload.len() != FILE_STATUS_LEN {
            return Err(WireError::Truncated);
        }
        let body = TargetStatus::decode(&mut payload);
        let border = TargetStatus::decode(&mut payload);
        Ok(Self { body, border })
    }
}
