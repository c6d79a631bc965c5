#![doc = include_str!("../README.md")]

pub mod config;
pub mod error;
pub mod metrics;
pub mod sink;
pub mod types;

// --- 주요 타입 re-export ---
// 각 모듈의 핵심 타입을 크레이트 루트에서 바로 사용할 수 있도록 합니다.

// 에러
pub use error::{CollectorError, ConfigError, LogwardError, StorageError};

// 설정
pub use config::{
    FileSourceConfig, LogwardConfig, MongoSourceConfig, MysqlSourceConfig, SourceConfig,
};

// 싱크 계약
pub use sink::{EventSink, MemorySink, SinkAggregates, SinkQuery, TimeRange};

// 도메인 타입
pub use types::{EventRecord, EventType, Severity, SourceKind, SourceStatus};
