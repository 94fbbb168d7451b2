//! Single `Range: bytes=...` header parsing for PDF streaming

/// Inclusive byte range within a body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    pub fn content_range(&self, total: u64) -> String {
        format!("bytes {}-{}/{}", self.start, self.end, total)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeRequest {
    /// No usable range: serve the whole body
    Full,
    Partial(ByteRange),
    Unsatisfiable,
}

/// Interpret a `Range` header against a body of `len` bytes.
///
/// Malformed headers and multi-range requests are ignored and the whole
/// body is served.
pub fn parse_range(header: &str, len: u64) -> RangeRequest {
    let Some(ranges) = header.trim().strip_prefix("bytes=") else {
        return RangeRequest::Full;
    };
    if ranges.contains(',') {
        return RangeRequest::Full;
    }
    let Some((start, end)) = ranges.trim().split_once('-') else {
        return RangeRequest::Full;
    };
    let (start, end) = (start.trim(), end.trim());

    if start.is_empty() {
        // Suffix range: the last N bytes
        let Ok(suffix) = end.parse::<u64>() else {
            return RangeRequest::Full;
        };
        if suffix == 0 || len == 0 {
            return RangeRequest::Unsatisfiable;
        }
        return RangeRequest::Partial(ByteRange {
            start: len.saturating_sub(suffix),
            end: len - 1,
        });
    }

    let Ok(start) = start.parse::<u64>() else {
        return RangeRequest::Full;
    };
    let end = if end.is_empty() {
        None
    } else {
        match end.parse::<u64>() {
            Ok(end) if end >= start => Some(end),
            _ => return RangeRequest::Full,
        }
    };

    if start >= len {
        return RangeRequest::Unsatisfiable;
    }

    RangeRequest::Partial(ByteRange {
        start,
        end: end.map_or(len - 1, |e| e.min(len - 1)),
    })
}


#[cfg(test)]
mod range_proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Any satisfiable range stays inside the body
        #[test]
        fn partial_ranges_in_bounds(len in 1u64..100_000, a in 0u64..200_000, b in 0u64..200_000) {
            let header = format!("bytes={}-{}", a.min(b), a.max(b));
            match parse_range(&header, len) {
                RangeRequest::Partial(range) => {
                    prop_assert!(range.start <= range.end);
                    prop_assert!(range.end < len);
                    prop_assert!(range.len() <= len);
                }
                RangeRequest::Unsatisfiable => prop_assert!(a.min(b) >= len),
                RangeRequest::Full => prop_assert!(false, "well-formed header ignored"),
            }
        }

        /// Suffix ranges always end on the last byte
        #[test]
        fn suffix_ends_at_last_byte(len in 1u64..100_000, suffix in 1u64..200_000) {
            match parse_range(&format!("bytes=-{}", suffix), len) {
                RangeRequest::Partial(range) => {
                    prop_assert_eq!(range.end, len - 1);
                    prop_assert_eq!(range.len(), suffix.min(len));
                }
                other => prop_assert!(false, "unexpected {:?}", other),
            }
        }

        /// Arbitrary header text never panics
        #[test]
        fn arbitrary_headers_do_not_panic(header in ".{0,40}", len in 0u64..10_000) {
            let _ = parse_range(&header, len);
        }
    }
}
