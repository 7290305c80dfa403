//! Serialize an `Index` into the on-disk version 2 format.

use git_hash::{hasher::Hasher, HashAlgorithm};

use crate::{Index, IndexError};

pub fn serialize(index: &Index) -> Result<Vec<u8>, IndexError> {
    let mut buf = Vec::new();

    buf.extend_from_slice(b"DIRC");
    buf.extend_from_slice(&2u32.to_be_bytes());
    buf.extend_from_slice(&(index.entries.len() as u32).to_be_bytes());

    for entry in &index.entries {
        let start = buf.len();

        buf.extend_from_slice(&entry.stat.ctime_secs.to_be_bytes());
        buf.extend_from_slice(&entry.stat.ctime_nsecs.to_be_bytes());
        buf.extend_from_slice(&entry.stat.mtime_secs.to_be_bytes());
        buf.extend_from_slice(&entry.stat.mtime_nsecs.to_be_bytes());
        buf.extend_from_slice(&entry.stat.dev.to_be_bytes());
        buf.extend_from_slice(&entry.stat.ino.to_be_bytes());
        buf.extend_from_slice(&entry.mode.raw().to_be_bytes());
        buf.extend_from_slice(&entry.stat.uid.to_be_bytes());
        buf.extend_from_slice(&entry.stat.gid.to_be_bytes());
        buf.extend_from_slice(&entry.stat.size.to_be_bytes());
        buf.extend_from_slice(entry.oid.as_bytes());

        let name_len = entry.path.len().min(0xfff) as u16;
        let mut flags = (entry.stage.to_bits() << 12) | name_len;
        if entry.flags.assume_valid {
            flags |= 0x8000;
        }
        buf.extend_from_slice(&flags.to_be_bytes());

        buf.extend_from_slice(&entry.path);

        // NUL-terminate and pad with NULs to a multiple of 8 bytes counted
        // from the start of this entry, matching C git's on-disk layout.
        loop {
            buf.push(0);
            if (buf.len() - start) % 8 == 0 {
                break;
            }
        }
    }

    for ext in &index.extensions {
        buf.extend_from_slice(&ext.signature);
        buf.extend_from_slice(&(ext.data.len() as u32).to_be_bytes());
        buf.extend_from_slice(&ext.data);
    }

    let mut hasher = Hasher::new(HashAlgorithm::Sha1);
    hasher.update(&buf);
    let checksum = hasher.finalize()?;
    buf.extend_from_slice(checksum.as_bytes());

    Ok(buf)
}
