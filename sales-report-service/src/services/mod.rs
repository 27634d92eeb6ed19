pub mod aggregator;
pub mod catalog;
pub mod database;
pub mod directory;
pub mod export;
pub mod fetcher;
pub mod fields;
pub mod generation;
pub mod metrics;
pub mod normalizer;
pub mod pipeline;
pub mod store;

pub use catalog::{CatalogIndex, CategoryVariant};
pub use database::MongoDb;
pub use directory::{Directory, DirectorySources};
pub use export::{ExportError, ExportFile, ExportFormat};
pub use fetcher::{DocumentFetcher, FetchError};
pub use generation::{SearchGenerations, SearchTicket};
pub use metrics::{get_metrics, init_metrics};
pub use pipeline::{FetchOutcome, LineItemsOutcome, ReportOutcome, ReportPipeline, ReportRequest};
pub use store::{DocumentQuery, DocumentStore, MemoryStore};
