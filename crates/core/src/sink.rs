//! 싱크 계약 — 내구 저장소 추상화
//!
//! 수집기는 버퍼에 적재한 레코드를 [`EventSink`] 구현체에 미러링합니다.
//! 구체 저장소(검색 엔진 등)는 이 트레이트 뒤에 숨고, 저장소가 없는
//! 구성에서는 [`MemorySink`]가 버퍼 전용 동작과 테스트를 지원합니다.
//!
//! 전달 보장은 at-least-once이며, `append`의 부분 성공이 허용됩니다.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::StorageError;
use crate::types::EventRecord;

/// 싱크 조회 조건
///
/// 모든 필드는 선택이며, 지정된 조건만 AND로 결합됩니다.
#[derive(Debug, Clone, Default)]
pub struct SinkQuery {
    /// 소스 이름 또는 source_type 일치
    pub source: Option<String>,
    /// 심각도 (대소문자 무시)
    pub severity: Option<String>,
    /// 이벤트 유형 (대소문자 무시)
    pub event_type: Option<String>,
    /// message/raw/source 부분 문자열 검색 (대소문자 무시)
    pub search: Option<String>,
    /// 타임스탬프 하한 (ISO-8601, 포함)
    pub start: Option<String>,
    /// 타임스탬프 상한 (ISO-8601, 포함)
    pub end: Option<String>,
    /// 최대 반환 개수
    pub limit: usize,
}

impl SinkQuery {
    /// 기본 limit(100)으로 빈 조건을 생성합니다.
    pub fn new() -> Self {
        Self {
            limit: 100,
            ..Self::default()
        }
    }
}

/// 집계 시간 범위 (ISO-8601 문자열, 양 끝 포함)
#[derive(Debug, Clone, Default)]
pub struct TimeRange {
    /// 하한
    pub start: Option<String>,
    /// 상한
    pub end: Option<String>,
}

/// 싱크 집계 결과
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SinkAggregates {
    /// 범위 내 전체 레코드 수
    pub total: u64,
    /// 심각도별 개수
    pub by_severity: HashMap<String, u64>,
    /// 이벤트 유형별 개수
    pub by_event_type: HashMap<String, u64>,
    /// 소스별 개수
    pub by_source: HashMap<String, u64>,
    /// 시간 버킷(시 단위)별 개수, 오름차순
    pub time_buckets: Vec<(String, u64)>,
}

/// 내구 저장소 계약
///
/// 구현체는 스레드 간 공유되므로 `Send + Sync`가 필요합니다.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// 레코드 배치를 기록하고 성공 개수를 반환합니다.
    ///
    /// 부분 성공이 허용됩니다. 반환값이 `records.len()`보다 작으면
    /// 일부 레코드가 거부된 것입니다.
    async fn append(&self, records: &[EventRecord]) -> Result<usize, StorageError>;

    /// 조건에 맞는 레코드를 타임스탬프 내림차순으로 반환합니다.
    async fn query(&self, query: SinkQuery) -> Result<Vec<EventRecord>, StorageError>;

    /// 범위 내 레코드를 심각도/유형/소스/시간 버킷으로 집계합니다.
    async fn aggregate(&self, range: TimeRange) -> Result<SinkAggregates, StorageError>;

    /// 저장된 레코드를 모두 삭제하고 삭제 개수를 반환합니다.
    async fn delete_all(&self) -> Result<u64, StorageError>;
}

/// 메모리 싱크
///
/// 내구성이 없는 참조 구현입니다. 저장소 미구성 데몬과 테스트에서
/// 사용됩니다.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<EventRecord>>,
}

impl MemorySink {
    /// 빈 메모리 싱크를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 저장된 레코드 수를 반환합니다.
    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    /// 비어있는지 확인합니다.
    pub async fn is_empty(&self) -> bool {
        self.records.lock().await.is_empty()
    }
}

fn matches_query(record: &EventRecord, query: &SinkQuery) -> bool {
    if let Some(source) = &query.source {
        let type_match = record.source_type.as_deref() == Some(source.as_str());
        if record.source != *source && !type_match {
            return false;
        }
    }
    if let Some(severity) = &query.severity
        && !record.severity.as_str().eq_ignore_ascii_case(severity)
    {
        return false;
    }
    if let Some(event_type) = &query.event_type
        && !record.event_type.as_str().eq_ignore_ascii_case(event_type)
    {
        return false;
    }
    if let Some(search) = &query.search {
        let needle = search.to_lowercase();
        let hit = record.message.to_lowercase().contains(&needle)
            || record.raw.to_lowercase().contains(&needle)
            || record.source.to_lowercase().contains(&needle);
        if !hit {
            return false;
        }
    }
    if let Some(start) = &query.start
        && record.timestamp.as_str() < start.as_str()
    {
        return false;
    }
    if let Some(end) = &query.end
        && record.timestamp.as_str() > end.as_str()
    {
        return false;
    }
    true
}

fn in_range(record: &EventRecord, range: &TimeRange) -> bool {
    if let Some(start) = &range.start
        && record.timestamp.as_str() < start.as_str()
    {
        return false;
    }
    if let Some(end) = &range.end
        && record.timestamp.as_str() > end.as_str()
    {
        return false;
    }
    true
}

#[async_trait]
impl EventSink for MemorySink {
    async fn append(&self, records: &[EventRecord]) -> Result<usize, StorageError> {
        let mut store = self.records.lock().await;
        store.extend_from_slice(records);
        Ok(records.len())
    }

    async fn query(&self, query: SinkQuery) -> Result<Vec<EventRecord>, StorageError> {
        let store = self.records.lock().await;
        let mut hits: Vec<EventRecord> = store
            .iter()
            .filter(|r| matches_query(r, &query))
            .cloned()
            .collect();
        hits.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        let limit = if query.limit == 0 { 100 } else { query.limit };
        hits.truncate(limit);
        Ok(hits)
    }

    async fn aggregate(&self, range: TimeRange) -> Result<SinkAggregates, StorageError> {
        let store = self.records.lock().await;
        let mut agg = SinkAggregates::default();
        let mut buckets: HashMap<String, u64> = HashMap::new();
        for record in store.iter().filter(|r| in_range(r, &range)) {
            agg.total += 1;
            *agg.by_severity
                .entry(record.severity.as_str().to_owned())
                .or_insert(0) += 1;
            *agg.by_event_type
                .entry(record.event_type.as_str().to_owned())
                .or_insert(0) += 1;
            *agg.by_source.entry(record.source.clone()).or_insert(0) += 1;
            // ISO-8601 접두사의 시 단위 버킷 (예: "2024-01-26T20")
            let bucket = record.timestamp.chars().take(13).collect::<String>();
            *buckets.entry(bucket).or_insert(0) += 1;
        }
        let mut time_buckets: Vec<(String, u64)> = buckets.into_iter().collect();
        time_buckets.sort_by(|a, b| a.0.cmp(&b.0));
        agg.time_buckets = time_buckets;
        Ok(agg)
    }

    async fn delete_all(&self) -> Result<u64, StorageError> {
        let mut store = self.records.lock().await;
        let removed = store.len() as u64;
        store.clear();
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EventType, Severity};

    fn record(source: &str, timestamp: &str, severity: Severity) -> EventRecord {
        let mut r = EventRecord::new("raw line", timestamp, source);
        r.severity = severity;
        r.message = format!("message from {source}");
        r
    }

    #[tokio::test]
    async fn append_reports_count() {
        let sink = MemorySink::new();
        let batch = vec![
            record("a", "2024-01-26T10:00:00", Severity::Info),
            record("b", "2024-01-26T11:00:00", Severity::Error),
        ];
        let written = sink.append(&batch).await.unwrap();
        assert_eq!(written, 2);
        assert_eq!(sink.len().await, 2);
    }

    #[tokio::test]
    async fn query_sorts_descending_and_limits() {
        let sink = MemorySink::new();
        let batch = vec![
            record("a", "2024-01-26T10:00:00", Severity::Info),
            record("b", "2024-01-26T12:00:00", Severity::Info),
            record("c", "2024-01-26T11:00:00", Severity::Info),
        ];
        sink.append(&batch).await.unwrap();

        let hits = sink.query(SinkQuery::new()).await.unwrap();
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].source, "b");
        assert_eq!(hits[2].source, "a");

        let limited = sink
            .query(SinkQuery {
                limit: 1,
                ..SinkQuery::new()
            })
            .await
            .unwrap();
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].source, "b");
    }

    #[tokio::test]
    async fn query_filters_by_severity_case_insensitive() {
        let sink = MemorySink::new();
        sink.append(&[
            record("a", "2024-01-26T10:00:00", Severity::Error),
            record("b", "2024-01-26T11:00:00", Severity::Info),
        ])
        .await
        .unwrap();

        let hits = sink
            .query(SinkQuery {
                severity: Some("error".to_owned()),
                ..SinkQuery::new()
            })
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].source, "a");
    }

    #[tokio::test]
    async fn query_source_matches_source_type_too() {
        let sink = MemorySink::new();
        let mut r = record("app-logs", "2024-01-26T10:00:00", Severity::Info);
        r.source_type = Some("file".to_owned());
        sink.append(&[r]).await.unwrap();

        let by_name = sink
            .query(SinkQuery {
                source: Some("app-logs".to_owned()),
                ..SinkQuery::new()
            })
            .await
            .unwrap();
        assert_eq!(by_name.len(), 1);

        let by_type = sink
            .query(SinkQuery {
                source: Some("file".to_owned()),
                ..SinkQuery::new()
            })
            .await
            .unwrap();
        assert_eq!(by_type.len(), 1);
    }

    #[tokio::test]
    async fn query_time_range_inclusive() {
        let sink = MemorySink::new();
        sink.append(&[
            record("a", "2024-01-26T10:00:00", Severity::Info),
            record("b", "2024-01-26T11:00:00", Severity::Info),
            record("c", "2024-01-26T12:00:00", Severity::Info),
        ])
        .await
        .unwrap();

        let hits = sink
            .query(SinkQuery {
                start: Some("2024-01-26T10:30:00".to_owned()),
                end: Some("2024-01-26T11:30:00".to_owned()),
                ..SinkQuery::new()
            })
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].source, "b");
    }

    #[tokio::test]
    async fn aggregate_counts_by_dimension() {
        let sink = MemorySink::new();
        let mut error = record("db", "2024-01-26T10:05:00", Severity::Error);
        error.event_type = EventType::Error;
        sink.append(&[
            record("app", "2024-01-26T10:00:00", Severity::Info),
            record("app", "2024-01-26T11:00:00", Severity::Info),
            error,
        ])
        .await
        .unwrap();

        let agg = sink.aggregate(TimeRange::default()).await.unwrap();
        assert_eq!(agg.total, 3);
        assert_eq!(agg.by_severity.get("INFO"), Some(&2));
        assert_eq!(agg.by_severity.get("ERROR"), Some(&1));
        assert_eq!(agg.by_event_type.get("ERROR"), Some(&1));
        assert_eq!(agg.by_source.get("app"), Some(&2));
        // 10시 버킷에 2건, 11시 버킷에 1건
        assert_eq!(agg.time_buckets.len(), 2);
        assert_eq!(agg.time_buckets[0], ("2024-01-26T10".to_owned(), 2));
    }

    #[tokio::test]
    async fn delete_all_reports_removed_count() {
        let sink = MemorySink::new();
        sink.append(&[record("a", "2024-01-26T10:00:00", Severity::Info)])
            .await
            .unwrap();
        let removed = sink.delete_all().await.unwrap();
        assert_eq!(removed, 1);
        assert!(sink.is_empty().await);
    }
}
