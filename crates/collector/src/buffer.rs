//! 레코드 버퍼 -- 보존 버퍼와 조회 레이어
//!
//! [`RecordBuffer`]는 수집된 레코드를 용량 제한이 있는 FIFO 버퍼에
//! 보존하고, 필터/정렬/페이지네이션 조회를 제공합니다.
//!
//! # 오버플로우 정책
//! 용량 초과 시 항상 가장 오래된 레코드를 조용히 축출합니다.
//! 동일 타임스탬프 레코드 간에는 삽입 순서가 유지됩니다.

use std::collections::{HashMap, VecDeque};

use serde::Serialize;

use logward_core::types::EventRecord;

/// 페이지 크기 상한
const MAX_PAGE_SIZE: usize = 500;

/// 조회 필터
///
/// 모든 필드는 선택이며 지정된 조건만 AND로 결합됩니다.
/// `level`/`operation`은 구버전 API 호환 별칭으로, 각각
/// `severity`/`event_type`이 비어있을 때만 적용됩니다.
#[derive(Debug, Clone, Default)]
pub struct QueryFilter {
    /// 소스 이름 또는 source_type 정확 일치
    pub source: Option<String>,
    /// 심각도 (대소문자 무시)
    pub severity: Option<String>,
    /// 이벤트 유형 (대소문자 무시)
    pub event_type: Option<String>,
    /// message/raw/source 부분 문자열 검색 (대소문자 무시)
    pub search: Option<String>,
    /// `severity`의 구버전 별칭
    pub level: Option<String>,
    /// `event_type`의 구버전 별칭
    pub operation: Option<String>,
}

impl QueryFilter {
    fn effective_severity(&self) -> Option<&str> {
        self.severity.as_deref().or(self.level.as_deref())
    }

    fn effective_event_type(&self) -> Option<&str> {
        self.event_type.as_deref().or(self.operation.as_deref())
    }

    fn matches(&self, record: &EventRecord) -> bool {
        if let Some(source) = &self.source {
            let type_match = record.source_type.as_deref() == Some(source.as_str());
            if record.source != *source && !type_match {
                return false;
            }
        }
        if let Some(severity) = self.effective_severity()
            && !record.severity.as_str().eq_ignore_ascii_case(severity)
        {
            return false;
        }
        if let Some(event_type) = self.effective_event_type()
            && !record.event_type.as_str().eq_ignore_ascii_case(event_type)
        {
            return false;
        }
        if let Some(search) = &self.search {
            let needle = search.to_lowercase();
            let hit = record.message.to_lowercase().contains(&needle)
                || record.raw.to_lowercase().contains(&needle)
                || record.source.to_lowercase().contains(&needle);
            if !hit {
                return false;
            }
        }
        true
    }
}

/// 조회 결과 한 페이지
#[derive(Debug, Clone, Serialize)]
pub struct QueryPage {
    /// 해당 페이지의 레코드 (타임스탬프 내림차순)
    pub records: Vec<EventRecord>,
    /// 필터 적용 후 전체 레코드 수
    pub total: usize,
    /// 실제 반환된 페이지 번호 (범위로 클램프됨)
    pub page: usize,
    /// 실제 적용된 페이지 크기
    pub page_size: usize,
    /// 전체 페이지 수 (최소 1)
    pub total_pages: usize,
}

/// 버퍼 내용 집계
#[derive(Debug, Clone, Default, Serialize)]
pub struct BufferStats {
    /// 보존 중인 전체 레코드 수
    pub total: usize,
    /// 심각도별 개수
    pub by_severity: HashMap<String, u64>,
    /// 이벤트 유형별 개수
    pub by_event_type: HashMap<String, u64>,
    /// 소스별 개수
    pub by_source: HashMap<String, u64>,
}

/// 보존 레코드 버퍼
///
/// 서비스가 `Mutex` 뒤에서 단일 쓰기 주체로 사용합니다.
pub struct RecordBuffer {
    records: VecDeque<EventRecord>,
    capacity: usize,
    /// 용량 초과로 축출된 레코드 수 (통계용)
    evicted_count: u64,
    /// 총 유입 레코드 수
    total_received: u64,
}

impl RecordBuffer {
    /// 새 버퍼를 생성합니다.
    pub fn new(capacity: usize) -> Self {
        Self {
            records: VecDeque::with_capacity(capacity.min(10_000)),
            capacity,
            evicted_count: 0,
            total_received: 0,
        }
    }

    /// 레코드 배치를 추가하고 축출된 개수를 반환합니다.
    pub fn append(&mut self, batch: Vec<EventRecord>) -> usize {
        let mut evicted = 0;
        for record in batch {
            self.total_received += 1;
            if self.records.len() >= self.capacity {
                self.records.pop_front();
                self.evicted_count += 1;
                evicted += 1;
            }
            self.records.push_back(record);
        }
        if evicted > 0 {
            tracing::debug!(
                evicted,
                capacity = self.capacity,
                "buffer full, evicted oldest records"
            );
        }
        evicted
    }

    /// 버퍼를 비우고 제거된 레코드 수를 반환합니다.
    pub fn clear(&mut self) -> usize {
        let removed = self.records.len();
        self.records.clear();
        removed
    }

    /// 현재 보존 중인 레코드 수를 반환합니다.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// 버퍼가 비어있는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// 버퍼 최대 용량을 반환합니다.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// 지금까지 축출된 레코드 수를 반환합니다.
    pub fn evicted_count(&self) -> u64 {
        self.evicted_count
    }

    /// 총 유입 레코드 수를 반환합니다.
    pub fn total_received(&self) -> u64 {
        self.total_received
    }

    /// 필터/정렬/페이지네이션 조회를 수행합니다.
    ///
    /// - 정렬: 타임스탬프 내림차순 (ISO 문자열 사전순, 안정 정렬이므로
    ///   동일 타임스탬프는 삽입 순서 유지)
    /// - `page`는 1 이상, 유효 범위로 클램프
    /// - `page_size`는 1..=500으로 클램프
    pub fn query(&self, filter: &QueryFilter, page: usize, page_size: usize) -> QueryPage {
        let page_size = page_size.clamp(1, MAX_PAGE_SIZE);
        let page = page.max(1);

        let mut hits: Vec<&EventRecord> =
            self.records.iter().filter(|r| filter.matches(r)).collect();
        hits.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        let total = hits.len();
        let total_pages = total.div_ceil(page_size).max(1);
        let page = page.min(total_pages);

        let offset = (page - 1) * page_size;
        let records = hits
            .into_iter()
            .skip(offset)
            .take(page_size)
            .cloned()
            .collect();

        QueryPage {
            records,
            total,
            page,
            page_size,
            total_pages,
        }
    }

    /// 심각도/유형/소스별 개수를 집계합니다.
    pub fn stats(&self) -> BufferStats {
        let mut stats = BufferStats {
            total: self.records.len(),
            ..BufferStats::default()
        };
        for record in &self.records {
            *stats
                .by_severity
                .entry(record.severity.as_str().to_owned())
                .or_insert(0) += 1;
            *stats
                .by_event_type
                .entry(record.event_type.as_str().to_owned())
                .or_insert(0) += 1;
            *stats.by_source.entry(record.source.clone()).or_insert(0) += 1;
        }
        stats
    }
}
