//! POST body handling: the streaming urlencoded decoder and the ingestion
//! pipeline it feeds.

pub mod decoder;
pub mod ingest;

pub use decoder::{FieldSink, FormDecoder};
pub use ingest::{parse_field_key, ConfigIngest, Ingest, SplitField, WorkoutIngest};
