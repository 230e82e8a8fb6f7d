//! Byte ranges for partial reads.

use object_store::GetRange;
use std::fmt;

use crate::{Error, Result};

/// A byte range of an object, rendered as an HTTP `Range` header value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteRange {
    /// `size` bytes starting at `offset`
    Bounded { offset: u64, size: u64 },
    /// The last `n` bytes
    Suffix(u64),
    /// Everything from `offset` to the end
    From(u64),
}

impl ByteRange {
    /// Build a range from an `(offset, size)` pair where an offset of `-1`
    /// selects the last `size` bytes.
    pub fn from_offset(offset: i64, size: u64) -> Result<Self> {
        match offset {
            -1 => {
                let range = ByteRange::Suffix(size);
                range.validate()?;
                Ok(range)
            }
            o if o >= 0 => {
                let range = ByteRange::Bounded {
                    offset: o as u64,
                    size,
                };
                range.validate()?;
                Ok(range)
            }
            o => Err(Error::Config(format!("invalid range offset: {}", o))),
        }
    }

    /// Reject ranges that select no bytes or run past `u64::MAX`.
    pub fn validate(&self) -> Result<()> {
        match *self {
            ByteRange::Bounded { size: 0, .. } | ByteRange::Suffix(0) => {
                Err(Error::Config("range size must be > 0".to_string()))
            }
            ByteRange::Bounded { offset, size } if offset.checked_add(size).is_none() => Err(
                Error::Config(format!("range {}+{} overflows", offset, size)),
            ),
            _ => Ok(()),
        }
    }

    /// Offset of the last byte of a bounded range
    fn last_byte(offset: u64, size: u64) -> u64 {
        offset.saturating_add(size.max(1) - 1)
    }

    /// Number of bytes requested, when known up front.
    pub fn requested_len(&self) -> Option<u64> {
        match self {
            ByteRange::Bounded { size, .. } => Some(*size),
            ByteRange::Suffix(n) => Some(*n),
            ByteRange::From(_) => None,
        }
    }
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ByteRange::Bounded { offset, size } => {
                write!(f, "bytes={}-{}", offset, Self::last_byte(*offset, *size))
            }
            ByteRange::Suffix(n) => write!(f, "bytes=-{}", n),
            ByteRange::From(offset) => write!(f, "bytes={}-", offset),
        }
    }
}

impl From<ByteRange> for GetRange {
    fn from(range: ByteRange) -> Self {
        match range {
            ByteRange::Bounded { offset, size } => {
                GetRange::Bounded(offset as usize..offset.saturating_add(size) as usize)
            }
            ByteRange::Suffix(n) => GetRange::Suffix(n as usize),
            ByteRange::From(offset) => GetRange::Offset(offset as usize),
        }
    }
}
