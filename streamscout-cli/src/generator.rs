//! Random test input with the search term sprinkled through it.
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

const CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// A newline is written every this many bytes for readability
const LINE_LENGTH: u64 = 500;

/// Writes `size` random alphanumeric bytes to `path`.
///
/// The term is written at every multiple of a random stride `p * q` (both
/// factors in `53..1553`) that leaves room for it. Returns the offsets it was
/// written at.
pub fn generate_input(path: &Path, size: u64, term: &str, seed: Option<u64>) -> io::Result<Vec<u64>> {
    let mut rng = match seed {
        Some(seed) => fastrand::Rng::with_seed(seed),
        None => fastrand::Rng::new(),
    };

    let stride = rng.u64(53..1553) * rng.u64(53..1553);
    let needle = term.as_bytes();
    let needle_len = needle.len() as u64;

    let mut out = BufWriter::with_capacity(64 * 1024, File::create(path)?);
    let mut inserted = Vec::new();
    let mut i = 0u64;

    while i < size {
        if needle_len > 0 && i != 0 && i % stride == 0 && i + needle_len < size {
            out.write_all(needle)?;
            inserted.push(i);
            i += needle_len;
            continue;
        }

        let byte = if i != 0 && i % LINE_LENGTH == 0 {
            b'\n'
        } else {
            CHARSET[rng.usize(..CHARSET.len())]
        };
        out.write_all(&[byte])?;
        i += 1;
    }

    out.flush()?;
    Ok(inserted)
}
