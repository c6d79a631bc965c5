//! 소스 어댑터 — 파일 tail, MySQL 폴러, MongoDB 변경 감지
//!
//! 각 어댑터는 외부 시스템에서 신규 로그만 증분 수집합니다.
//! 어댑터 종류는 설정의 `type` 필드로 결정되는 닫힌 집합이며,
//! [`SourceAdapter`]가 공통 상태 추적과 디스패치를 담당합니다.
//!
//! # 에러 격리
//! 수집 실패는 어댑터의 `last_error`에 기록될 뿐 루프를 중단시키지
//! 않습니다. 다음 성공 시 `last_error`는 해제됩니다.

mod file;
mod mongo;
mod mysql;

pub use file::FileSource;
pub use mongo::MongoSource;
pub use mysql::MysqlSource;

use tracing::warn;

use logward_core::config::SourceConfig;
use logward_core::metrics::{COLLECTOR_SOURCE_ERRORS_TOTAL, LABEL_SOURCE};
use logward_core::types::{EventRecord, SourceKind, SourceStatus};

/// 어댑터 공통 런타임 상태
///
/// [`SourceStatus`] 스냅샷의 원본이 되는 가변 상태입니다.
#[derive(Debug, Clone)]
pub struct SourceState {
    /// 활성화 여부 (토글 가능)
    pub enabled: bool,
    /// 수집 루프 참여 여부
    pub running: bool,
    /// 마지막 수집 성공 시각
    pub last_check: Option<String>,
    /// 누적 수집 레코드 수
    pub logs_collected: u64,
    /// 마지막 에러 메시지
    pub last_error: Option<String>,
}

impl SourceState {
    fn new(enabled: bool) -> Self {
        Self {
            enabled,
            running: false,
            last_check: None,
            logs_collected: 0,
            last_error: None,
        }
    }

    /// 수집 성공을 기록합니다. 직전 에러는 해제됩니다.
    fn record_success(&mut self, count: u64) {
        self.last_check = Some(crate::classifier::now_iso());
        self.logs_collected += count;
        self.last_error = None;
    }

    /// 수집 실패를 기록합니다.
    fn record_error(&mut self, message: impl Into<String>) {
        self.last_error = Some(message.into());
    }
}

enum AdapterKind {
    File(FileSource),
    Mysql(MysqlSource),
    Mongo(MongoSource),
}

/// 소스 어댑터
///
/// 설정 한 항목에 대응하는 수집 주체입니다. 종류별 구현을 감싸고
/// 상태 추적, 에러 격리, 상태 스냅샷을 공통으로 제공합니다.
pub struct SourceAdapter {
    state: SourceState,
    inner: AdapterKind,
}

impl SourceAdapter {
    /// 설정에서 어댑터를 생성합니다.
    ///
    /// 설정 열거형이 닫혀 있으므로 항상 성공합니다. 실제 연결은
    /// 첫 수집 또는 [`test_connection`](Self::test_connection)에서
    /// 지연 수립됩니다.
    pub fn from_config(config: &SourceConfig) -> Self {
        let state = SourceState::new(config.enabled());
        let inner = match config {
            SourceConfig::File(c) => AdapterKind::File(FileSource::new(c.clone())),
            SourceConfig::Mysql(c) => AdapterKind::Mysql(MysqlSource::new(c.clone())),
            SourceConfig::Mongodb(c) => AdapterKind::Mongo(MongoSource::new(c.clone())),
        };
        Self { state, inner }
    }

    /// 소스 이름을 반환합니다.
    pub fn name(&self) -> &str {
        match &self.inner {
            AdapterKind::File(s) => s.name(),
            AdapterKind::Mysql(s) => s.name(),
            AdapterKind::Mongo(s) => s.name(),
        }
    }

    /// 어댑터 종류를 반환합니다.
    pub fn kind(&self) -> SourceKind {
        match &self.inner {
            AdapterKind::File(_) => SourceKind::File,
            AdapterKind::Mysql(_) => SourceKind::Mysql,
            AdapterKind::Mongo(_) => SourceKind::Mongodb,
        }
    }

    /// 런타임 상태를 반환합니다.
    pub fn state(&self) -> &SourceState {
        &self.state
    }

    /// 수집 대상 여부 (활성화 + 실행 중)를 반환합니다.
    pub fn is_active(&self) -> bool {
        self.state.enabled && self.state.running
    }

    /// 활성화 여부를 변경합니다.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.state.enabled = enabled;
    }

    /// 실행 여부를 변경합니다.
    pub fn set_running(&mut self, running: bool) {
        self.state.running = running;
    }

    /// 한 사이클 분량의 신규 레코드를 수집합니다.
    ///
    /// 실패는 `last_error`에 기록하고 빈 벡터를 반환합니다.
    /// 에러가 루프 밖으로 전파되지 않는 것이 소스 격리 규약입니다.
    pub async fn collect(&mut self) -> Vec<EventRecord> {
        let result = match &mut self.inner {
            AdapterKind::File(s) => s.collect().await,
            AdapterKind::Mysql(s) => s.collect().await,
            AdapterKind::Mongo(s) => s.collect().await,
        };
        match result {
            Ok(records) => {
                self.state.record_success(records.len() as u64);
                records
            }
            Err(err) => {
                warn!(
                    source = self.name(),
                    kind = %self.kind(),
                    error = %err,
                    "source collection failed"
                );
                metrics::counter!(
                    COLLECTOR_SOURCE_ERRORS_TOTAL,
                    LABEL_SOURCE => self.name().to_owned()
                )
                .increment(1);
                self.state.record_error(err.to_string());
                Vec::new()
            }
        }
    }

    /// 소스 연결 가능 여부를 확인합니다.
    ///
    /// 실패 시 조치 가능한 메시지를 `last_error`에 남깁니다.
    pub async fn test_connection(&mut self) -> bool {
        let result = match &mut self.inner {
            AdapterKind::File(s) => s.test_connection().await,
            AdapterKind::Mysql(s) => s.test_connection().await,
            AdapterKind::Mongo(s) => s.test_connection().await,
        };
        match result {
            Ok(()) => {
                self.state.last_error = None;
                true
            }
            Err(err) => {
                self.state.record_error(err.to_string());
                false
            }
        }
    }

    /// 증분 커서를 초기화합니다.
    ///
    /// 다음 수집은 첫 수집과 동일하게 동작합니다. `logs_collected`
    /// 누적치는 유지됩니다.
    pub fn reset_tracking(&mut self) {
        match &mut self.inner {
            AdapterKind::File(s) => s.reset_tracking(),
            AdapterKind::Mysql(s) => s.reset_tracking(),
            AdapterKind::Mongo(s) => s.reset_tracking(),
        }
    }

    /// `logs_collected` 누적치를 0으로 되돌립니다.
    pub fn reset_collected_count(&mut self) {
        self.state.logs_collected = 0;
    }

    /// 조회용 상태 스냅샷을 생성합니다.
    pub fn status(&self) -> SourceStatus {
        SourceStatus {
            name: self.name().to_owned(),
            kind: self.kind(),
            enabled: self.state.enabled,
            running: self.state.running,
            last_check: self.state.last_check.clone(),
            logs_collected: self.state.logs_collected,
            last_error: self.state.last_error.clone(),
        }
    }
}
