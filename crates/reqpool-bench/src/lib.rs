//! Benchmark fixtures for the reqpool arena ownership model.
//!
//! - [`request_config`]: the arena shape used by every benchmark
//! - [`SAMPLE_HEADERS`]: a realistic request header set
//! - [`fill_headers`]: builds a header table in an arena

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use reqpool_arena::{Arena, ArenaConfig, ArenaError};
use reqpool_bytes::{SegmentedList, TableEntry};

/// Block size used by benchmark arenas.
pub const BENCH_BLOCK_SIZE: usize = 4096;

/// Header entries per list segment.
pub const HEADER_SEGMENT: usize = 8;

/// Headers a typical browser request carries.
pub const SAMPLE_HEADERS: &[(&str, &str)] = &[
    ("Host", "blog.example.org"),
    ("User-Agent", "Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0"),
    ("Accept", "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
    ("Accept-Language", "en-US,en;q=0.5"),
    ("Accept-Encoding", "gzip, deflate, br"),
    ("Connection", "keep-alive"),
    ("Cookie", "session=8f14e45fceea167a5a36dedd4bea2543; theme=dark"),
    ("Upgrade-Insecure-Requests", "1"),
    ("Sec-Fetch-Dest", "document"),
    ("Sec-Fetch-Mode", "navigate"),
    ("Cache-Control", "max-age=0"),
];

/// Arena configuration for one benchmark request.
pub fn request_config() -> ArenaConfig {
    ArenaConfig::new(BENCH_BLOCK_SIZE).with_label("bench")
}

/// Copy `pairs` into a header table in `arena`.
///
/// Hashes are the 1-based position so every entry is active.
pub fn fill_headers<'a>(
    arena: &'a Arena,
    pairs: &[(&str, &str)],
) -> Result<SegmentedList<'a, TableEntry<'a>>, ArenaError> {
    let mut headers = SegmentedList::new_in(arena, HEADER_SEGMENT)?;
    for (i, (name, value)) in pairs.iter().enumerate() {
        TableEntry::new_in_list(&mut headers)?
            .set_key(arena, name)?
            .set_value(arena, value)?
            .set_hash(i + 1);
    }
    Ok(headers)
}
