pub mod ingestion;
pub mod parsing;
pub mod processing;
pub mod record;

pub use ingestion::{DataIngestion, FetchError, Fetcher, IngestionOutcome, RawRow};
pub use processing::{normalize, normalize_batch, relative_strength_index};
pub use record::{CanonicalRecord, FieldFamily, SourceFamily, SourceTag};
