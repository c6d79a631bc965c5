#![doc = include_str!("../README.md")]

pub mod buffer;
pub mod classifier;
pub mod error;
pub mod service;
pub mod sink_worker;
pub mod source;

pub use buffer::{BufferStats, QueryFilter, QueryPage, RecordBuffer};
pub use classifier::{classify, is_important, now_iso};
pub use error::CollectError;
pub use service::{CollectorService, CollectorServiceBuilder, ExternalRecord};
pub use source::{FileSource, MongoSource, MysqlSource, SourceAdapter, SourceState};
