pub mod blob;
pub mod error;
pub mod fingerprint;
pub mod store;

pub use crate::blob::Blob;
pub use crate::fingerprint::Fingerprint;
pub use crate::store::BlobStore;
pub use crate::store::FsStore;
#[cfg(feature = "mock")]
pub use crate::store::MemoryStore;
use std::sync::Arc;

pub type StoreHandle = Arc<dyn BlobStore + Send + Sync>;
