//! Pick count derived from a stored BMP pattern.
//!
//! Each pixel row of a pattern is one pick, so the total is the image height:
//! a signed 32-bit little-endian integer at offset 22 of the BMP header.
//! Top-down bitmaps store a negative height.

use crate::FileStore;
use tracing::debug;

/// Offset of the height field in a BMP header
pub const BMP_HEIGHT_OFFSET: u64 = 22;

/// Total picks for a stored pattern; 0 when no name is known or the header cannot be read
pub fn total_units(store: &dyn FileStore, name: Option<&str>) -> u32 {
    let Some(name) = name else {
        return 0;
    };

    match store.read_header_field(name, BMP_HEIGHT_OFFSET, 4) {
        Ok(field) => match <[u8; 4]>::try_from(field.as_slice()) {
            Ok(height) => i32::from_le_bytes(height).unsigned_abs(),
            Err(_) => 0,
        },
        Err(e) => {
            debug!("No pick count for {}: {}", name, e);
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStore;

    fn bmp_with_height(height: i32) -> Vec<u8> {
        let mut header = vec![0u8; 54];
        header[0..2].copy_from_slice(b"BM");
        header[18..22].copy_from_slice(&64i32.to_le_bytes());
        header[22..26].copy_from_slice(&height.to_le_bytes());
        header
    }

    #[test]
    fn test_bottom_up_height() {
        let store = MemoryStore::new();
        store.insert("body.bmp", bmp_with_height(1200));

        assert_eq!(total_units(&store, Some("body.bmp")), 1200);
    }

    #[test]
    fn test_top_down_height() {
        let store = MemoryStore::new();
        store.insert("border.bmp", bmp_with_height(-300));

        assert_eq!(total_units(&store, Some("border.bmp")), 300);
    }

    #[test]
    fn test_missing_or_short() {
        let store = MemoryStore::new();
        store.insert("tiny.bmp", b"BM".to_vec());

        assert_eq!(total_units(&store, None), 0);
        assert_eq!(total_units(&store, Some("missing.bmp")), 0);
        assert_eq!(total_units(&store, Some("tiny.bmp")), 0);
    }
}
