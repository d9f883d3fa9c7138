//! Reading archive members whose declared sizes cannot be trusted

use std::io::Read;

/// Largest `pack.json` accepted from an archive
pub const MAX_DOCUMENT_SIZE: u64 = 16 * 1024 * 1024;

/// Largest `info.json` accepted from a mod archive
pub const MAX_INFO_SIZE: u64 = 1024 * 1024;

/// Read everything from `reader` if it holds at most `limit` bytes
///
/// Returns `None` when there is more. Memory grows with the data actually
/// read, never with a size taken from an archive header.
pub(crate) fn read_bounded<R: Read>(reader: R, limit: u64) -> std::io::Result<Option<Vec<u8>>> {
    let mut bytes = Vec::new();
    reader.take(limit.saturating_add(1)).read_to_end(&mut bytes)?;
    if bytes.len() as u64 > limit {
        return Ok(None);
    }
    Ok(Some(bytes))
}
