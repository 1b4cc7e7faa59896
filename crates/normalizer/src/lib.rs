pub mod columns;
pub mod models;
pub mod payloads;
pub mod transform;

pub use columns::{header_line, COLUMNS};
pub use models::{CanonicalRecord, ItemState, PrStatus, RecordKind, SCHEMA_VERSION};
pub use payloads::{GraphItemPayload, PullMergePayload, RawItem, RestItemPayload};
pub use transform::normalize;
