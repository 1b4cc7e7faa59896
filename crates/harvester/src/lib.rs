pub mod adapter;
pub mod cursor;
pub mod enricher;
pub mod harvest;
pub mod metrics;
pub mod shutdown;
pub mod sink;
pub mod stream;

pub use adapter::{build_adapters, GraphqlAdapter, RepoTarget, ResourceAdapter, RestListingAdapter};
pub use cursor::{Cursor, PageMarker, StreamState};
pub use enricher::{Enricher, EnrichmentFailure};
pub use harvest::{Harvester, HarvestReport, HarvestStatus, StreamOutcome};
pub use sink::{open_sink, CsvFileSink, JsonLinesSink, MemorySink, RecordSink, SinkError};
pub use stream::{StreamAbort, StreamEnd, StreamFetcher, StreamReport};
