//! Checksum verification: the persisted store, upstream file parsing and
//! digest computation.

pub mod calculate;
pub mod fetch;
pub mod parser;
pub mod store;

pub use calculate::{Hasher, digest_bytes};
pub use fetch::{FetchError, fetch_checksums};
pub use parser::{ChecksumFileParser, ParseError, ParsedChecksums};
pub use store::{CHECKSUM_FILE_NAME, ChecksumStore, FlushGuard, StoreError, checksum_file_path};
