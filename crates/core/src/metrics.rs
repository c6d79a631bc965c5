//! 메트릭 상수 및 설명 등록
//!
//! 모든 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 각 모듈은 이 상수를 사용하여 `metrics::counter!()`, `metrics::gauge!()`
//! 매크로를 호출합니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `logward_`
//! - 모듈명: `collector_`, `buffer_`, `sink_`
//! - 접미어: `_total` (counter), 없음 (gauge)
//!
//! # 사용 예시
//!
//! ```ignore
//! use metrics::counter;
//!
//! counter!(logward_core::metrics::COLLECTOR_RECORDS_TOTAL).increment(1);
//! ```

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 소스 이름 레이블 키
pub const LABEL_SOURCE: &str = "source";

/// 소스 종류 레이블 키 (file, mysql, mongodb, frontend)
pub const LABEL_SOURCE_TYPE: &str = "source_type";

// ─── Collector 메트릭 ──────────────────────────────────────────────

/// Collector: 수집된 전체 레코드 수 (counter, label: source)
pub const COLLECTOR_RECORDS_TOTAL: &str = "logward_collector_records_total";

/// Collector: 수집 사이클 수 (counter)
pub const COLLECTOR_CYCLES_TOTAL: &str = "logward_collector_cycles_total";

/// Collector: 소스 수집 실패 수 (counter, label: source)
pub const COLLECTOR_SOURCE_ERRORS_TOTAL: &str = "logward_collector_source_errors_total";

/// Collector: 등록된 소스 수 (gauge)
pub const COLLECTOR_SOURCES_REGISTERED: &str = "logward_collector_sources_registered";

// ─── Buffer 메트릭 ─────────────────────────────────────────────────

/// Buffer: 현재 보존 중인 레코드 수 (gauge)
pub const BUFFER_SIZE: &str = "logward_buffer_size";

/// Buffer: 용량 초과로 축출된 레코드 수 (counter)
pub const BUFFER_EVICTED_TOTAL: &str = "logward_buffer_evicted_total";

// ─── Sink 메트릭 ───────────────────────────────────────────────────

/// Sink: 싱크에 기록된 레코드 수 (counter)
pub const SINK_RECORDS_WRITTEN_TOTAL: &str = "logward_sink_records_written_total";

/// Sink: 기록 실패 수 (counter)
pub const SINK_WRITE_FAILURES_TOTAL: &str = "logward_sink_write_failures_total";

/// Sink: 큐 포화로 드롭된 배치 수 (counter)
pub const SINK_BATCHES_DROPPED_TOTAL: &str = "logward_sink_batches_dropped_total";

// ─── 설명 등록 함수 ─────────────────────────────────────────────────

/// 모든 메트릭의 설명(description)을 등록합니다.
///
/// 이 함수는 전역 레코더 설치 후 한 번만 호출해야 합니다.
/// 일반적으로 `logward-daemon`의 시작 시점에서 호출합니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge};

    describe_counter!(
        COLLECTOR_RECORDS_TOTAL,
        "Total number of records collected from all sources"
    );
    describe_counter!(
        COLLECTOR_CYCLES_TOTAL,
        "Total number of completed collection cycles"
    );
    describe_counter!(
        COLLECTOR_SOURCE_ERRORS_TOTAL,
        "Total number of per-source collection failures"
    );
    describe_gauge!(
        COLLECTOR_SOURCES_REGISTERED,
        "Number of sources currently registered"
    );

    describe_gauge!(
        BUFFER_SIZE,
        "Current number of records retained in the in-memory buffer"
    );
    describe_counter!(
        BUFFER_EVICTED_TOTAL,
        "Total number of records evicted due to buffer capacity"
    );

    describe_counter!(
        SINK_RECORDS_WRITTEN_TOTAL,
        "Total number of records written to the durable sink"
    );
    describe_counter!(
        SINK_WRITE_FAILURES_TOTAL,
        "Total number of failed sink append calls"
    );
    describe_counter!(
        SINK_BATCHES_DROPPED_TOTAL,
        "Total number of batches dropped because the sink queue was full"
    );
}
