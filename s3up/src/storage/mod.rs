//! Storage backends

mod memory;
mod s3;
mod traits;


pub use memory::{MemoryStore, MemoryStoreError, StoredObject};
pub use s3::{S3Backend, S3UploadError, DEFAULT_QUEUE_SIZE, MAX_PARTS, MIN_PART_SIZE};
pub use traits::{ObjectStore, UploadOutput, UploadRequest};
