//! 🗜️ Artifact transfer: deciding how bytes move, then moving them.
//!
//! [`selector`] decides, [`uploader`] and [`downloader`] do, [`archive`] zips.

pub mod archive;
pub mod downloader;
pub mod selector;
pub mod uploader;

pub use downloader::ArtifactDownloader;
pub use selector::{DownloadStrategy, LargeSource, UploadStrategy, select_download, select_upload};
pub use uploader::{ArtifactUploader, UploadOptions};
