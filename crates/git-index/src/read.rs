//! Parse the on-disk index format (versions 2 and 3; version 4's path
//! prefix-compression is not supported, matching this implementation's
//! scope of "read what a normal working repository writes").

use bstr::BString;
use git_hash::{HashAlgorithm, ObjectId};
use git_object::FileMode;

use crate::entry::{EntryFlags, IndexEntry, Stage, StatData};
use crate::{Index, IndexError, RawExtension};

const HEADER_LEN: usize = 12;
const ENTRY_FIXED_LEN: usize = 62;
const SHA1_LEN: usize = 20;

pub fn parse(data: &[u8]) -> Result<Index, IndexError> {
    if data.len() < HEADER_LEN + SHA1_LEN {
        return Err(IndexError::InvalidHeader("file too short".into()));
    }

    let checksum_offset = data.len() - SHA1_LEN;
    verify_checksum(data, checksum_offset)?;

    if &data[0..4] != b"DIRC" {
        return Err(IndexError::InvalidHeader("missing DIRC signature".into()));
    }
    let version = u32::from_be_bytes(data[4..8].try_into().unwrap());
    if version != 2 && version != 3 {
        return Err(IndexError::UnsupportedVersion(version));
    }
    let entry_count = u32::from_be_bytes(data[8..12].try_into().unwrap()) as usize;

    let mut pos = HEADER_LEN;
    let mut entries = Vec::with_capacity(entry_count);

    for _ in 0..entry_count {
        let (entry, consumed) = parse_entry(data, pos, checksum_offset)?;
        pos += consumed;
        entries.push(entry);
    }

    let mut extensions = Vec::new();
    while pos + 8 <= checksum_offset {
        let signature: [u8; 4] = data[pos..pos + 4].try_into().unwrap();
        let len = u32::from_be_bytes(data[pos + 4..pos + 8].try_into().unwrap()) as usize;
        pos += 8;
        if pos + len > checksum_offset {
            return Err(IndexError::InvalidEntry {
                offset: pos,
                reason: "extension runs past checksum".into(),
            });
        }
        extensions.push(RawExtension {
            signature,
            data: data[pos..pos + len].to_vec(),
        });
        pos += len;
    }

    Ok(Index {
        version,
        entries,
        extensions,
    })
}

fn parse_entry(
    data: &[u8],
    start: usize,
    limit: usize,
) -> Result<(IndexEntry, usize), IndexError> {
    if start + ENTRY_FIXED_LEN > limit {
        return Err(IndexError::InvalidEntry {
            offset: start,
            reason: "truncated entry header".into(),
        });
    }

    let u32_at = |off: usize| u32::from_be_bytes(data[start + off..start + off + 4].try_into().unwrap());

    let stat = StatData {
        ctime_secs: u32_at(0),
        ctime_nsecs: u32_at(4),
        mtime_secs: u32_at(8),
        mtime_nsecs: u32_at(12),
        dev: u32_at(16),
        ino: u32_at(20),
        uid: u32_at(28),
        gid: u32_at(32),
        size: u32_at(36),
    };
    let mode = FileMode::from_raw(u32_at(24));

    let oid_off = start + 40;
    let oid = ObjectId::from_bytes(&data[oid_off..oid_off + SHA1_LEN], HashAlgorithm::Sha1)?;

    let flags_off = oid_off + SHA1_LEN;
    let flags_raw = u16::from_be_bytes(data[flags_off..flags_off + 2].try_into().unwrap());
    let stage = Stage::from_bits(flags_raw >> 12);
    let name_len = (flags_raw & 0x0fff) as usize;
    let flags = EntryFlags {
        assume_valid: flags_raw & 0x8000 != 0,
        skip_worktree: false,
        intent_to_add: false,
    };

    let name_off = flags_off + 2;
    let path = if name_len < 0xfff {
        if name_off + name_len > limit {
            return Err(IndexError::InvalidEntry {
                offset: start,
                reason: "path runs past checksum".into(),
            });
        }
        BString::from(data[name_off..name_off + name_len].to_vec())
    } else {
        // Name length saturated at 0xfff: the path is NUL-terminated instead.
        let nul = data[name_off..limit]
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| IndexError::InvalidEntry {
                offset: start,
                reason: "unterminated long path".into(),
            })?;
        BString::from(data[name_off..name_off + nul].to_vec())
    };

    let mut end = name_off + path.len();
    // Consume the NUL terminator and padding up to a multiple of 8 from `start`.
    loop {
        if end >= limit {
            return Err(IndexError::InvalidEntry {
                offset: start,
                reason: "missing NUL terminator".into(),
            });
        }
        let was_nul = data[end] == 0;
        end += 1;
        if was_nul && (end - start) % 8 == 0 {
            break;
        }
    }

    Ok((
        IndexEntry {
            path,
            oid,
            mode,
            stage,
            stat,
            flags,
        },
        end - start,
    ))
}

fn verify_checksum(data: &[u8], checksum_offset: usize) -> Result<(), IndexError> {
    use git_hash::hasher::Hasher;

    let expected = &data[checksum_offset..];
    let mut hasher = Hasher::new(HashAlgorithm::Sha1);
    hasher.update(&data[..checksum_offset]);
    let actual = hasher.finalize()?;
    if actual.as_bytes() != expected {
        return Err(IndexError::ChecksumMismatch);
    }
    Ok(())
}
