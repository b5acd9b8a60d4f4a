//! Content-sync protocol
//!
//! - [`key`]: how an image and its description are named
//! - [`uploader`]: one artifact, one remote write
//! - [`catalog`]: listing images and re-pairing descriptions
//! - [`gallery`]: submit, batch submit, browse and orphan detection
//! - [`retry`]: opt-in retries for transient upload failures

pub mod catalog;
pub mod clock;
pub mod gallery;
pub mod key;
pub mod retry;
pub mod uploader;

pub use catalog::{CatalogReader, ImageRef};
pub use clock::{Clock, FixedClock, SystemClock};
pub use gallery::{
    BatchItem, BatchReport, CatalogEntry, Gallery, ItemState, OrphanReport, SubmitItem,
    UploadOutcome,
};
pub use key::{ArtifactKey, ImageExtension};
pub use retry::{Retriable, RetryPolicy};
pub use uploader::{ArtifactKind, UploadError, UploadPolicy, UploadReceipt, Uploader};
