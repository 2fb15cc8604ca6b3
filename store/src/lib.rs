pub mod encoding;
pub mod landing;
pub mod object_store;
pub mod partition;
pub mod processed;
pub mod quarantine;
pub mod types;

pub use encoding::{EncodingError, TransportCodec, TransportEncoding};
pub use landing::{LandingStore, NoticeSink, PublishError};
pub use object_store::{FilesystemStore, MemoryStore, ObjectStore, StoreError, StoredObject};
pub use partition::PartitionKey;
pub use processed::ProcessedStore;
pub use quarantine::Quarantine;
pub use types::{LandingNotice, NormalizedDocument, ObjectMeta, RecordId};
