pub mod download;
pub mod extract;

pub use download::{
    ByteStream, ChecksumDownloader, DownloadError, Downloaded, HttpDownloader, PackageDownloader,
    hash_stream, write_stream,
};
pub use extract::{ArchiveUnarchiver, ExtractError, Unarchiver};
