//! 도메인 타입 — 시스템 전역에서 사용되는 공통 타입
//!
//! 모든 모듈이 공유하는 데이터 구조를 정의합니다.
//! 수집기, 분류기, 버퍼, 싱크가 모두 [`EventRecord`]를 교환 단위로 사용합니다.

use std::fmt;

use serde::{Deserialize, Serialize};

/// 이벤트 유형
///
/// 분류기가 원시 로그 라인에서 판별한 이벤트 종류입니다.
/// 직렬화 시 SCREAMING_SNAKE_CASE 문자열로 표현됩니다 (예: `INITIAL_LOAD`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    /// SELECT 쿼리
    Select,
    /// INSERT 쿼리 또는 신규 문서 감지
    Insert,
    /// UPDATE 쿼리 또는 문서 변경 감지
    Update,
    /// DELETE 쿼리 또는 문서 삭제 감지
    Delete,
    /// 에러 이벤트
    Error,
    /// 분류되지 않은 일반 쿼리 (general_log)
    Query,
    /// CREATE 문
    Create,
    /// DROP 문
    Drop,
    /// ALTER 문
    Alter,
    /// 외부(프론트엔드)에서 제출된 일반 로그
    Log,
    /// 미분류 — 기본값
    #[default]
    Other,
    /// 문서 스냅샷 첫 수집
    InitialLoad,
    /// 커스텀 테이블 모드의 행 레코드
    DbRecord,
}

impl EventType {
    /// 직렬화 형태와 동일한 문자열 표현을 반환합니다.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Select => "SELECT",
            Self::Insert => "INSERT",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
            Self::Error => "ERROR",
            Self::Query => "QUERY",
            Self::Create => "CREATE",
            Self::Drop => "DROP",
            Self::Alter => "ALTER",
            Self::Log => "LOG",
            Self::Other => "OTHER",
            Self::InitialLoad => "INITIAL_LOAD",
            Self::DbRecord => "DB_RECORD",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 심각도 레벨
///
/// `Ord` 구현으로 심각도 비교가 가능합니다 (`Debug < Info < Warning < Error`).
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    /// 디버그 수준
    Debug,
    /// 정보성 이벤트 — 기본값
    #[default]
    Info,
    /// 경고
    Warning,
    /// 에러
    Error,
}

impl Severity {
    /// 문자열에서 심각도를 파싱합니다.
    ///
    /// 대소문자를 구분하지 않으며, `warn`/`warning` 같은 축약형을 허용합니다.
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "debug" => Some(Self::Debug),
            "info" | "informational" => Some(Self::Info),
            "warn" | "warning" => Some(Self::Warning),
            "error" | "err" => Some(Self::Error),
            _ => None,
        }
    }

    /// 직렬화 형태와 동일한 문자열 표현을 반환합니다.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 이벤트 레코드
///
/// 시스템을 흐르는 표준 단위입니다. 분류기가 생성하고, 수집 루프가
/// `source_type`/`collected_at`을 스탬프하며, 버퍼와 싱크가 저장합니다.
///
/// `raw`/`timestamp`/`source`는 항상 존재합니다. 나머지 선택 필드는
/// 값이 없으면 직렬화에서 생략되어 압축된 형태를 유지합니다
/// (생략 규칙은 직렬화 경계에서만 적용).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    /// 원본 텍스트 (또는 행/문서의 문자열 표현)
    pub raw: String,
    /// 이벤트 귀속 시각 (ISO-8601 문자열, 항상 비어있지 않음)
    pub timestamp: String,
    /// 발생 소스 이름 (어댑터 인스턴스 식별자)
    pub source: String,
    /// 이벤트 유형
    #[serde(default)]
    pub event_type: EventType,
    /// 심각도
    #[serde(default)]
    pub severity: Severity,
    /// 감지된 대상 테이블/컬렉션 이름
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table_name: Option<String>,
    /// "N rows affected" 패턴에서 추출한 행 수
    #[serde(skip_serializing_if = "Option::is_none")]
    pub affected_rows: Option<u64>,
    /// 정리된 메시지 (500자 제한)
    #[serde(default)]
    pub message: String,
    /// 추출된 사용자 식별자
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    /// 어댑터 종류 (file/mysql/mongodb/frontend) — 수집 루프가 부여
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_type: Option<String>,
    /// 수집 루프가 레코드를 받아들인 시각 — `timestamp`와 구분됨
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collected_at: Option<String>,
}

impl EventRecord {
    /// 필수 필드만으로 새 레코드를 생성합니다.
    pub fn new(
        raw: impl Into<String>,
        timestamp: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            raw: raw.into(),
            timestamp: timestamp.into(),
            source: source.into(),
            event_type: EventType::default(),
            severity: Severity::default(),
            table_name: None,
            affected_rows: None,
            message: String::new(),
            user: None,
            source_type: None,
            collected_at: None,
        }
    }
}

impl fmt::Display for EventRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} {} {}: {}",
            self.severity, self.timestamp, self.source, self.event_type, self.message,
        )
    }
}

/// 소스 어댑터 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// 로그 파일 tail
    File,
    /// MySQL 폴러
    Mysql,
    /// MongoDB 변경 감지 폴러
    Mongodb,
}

impl SourceKind {
    /// 설정 파일과 동일한 소문자 문자열을 반환합니다.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Mysql => "mysql",
            Self::Mongodb => "mongodb",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 소스 상태 — 조회 전용 스냅샷
///
/// API 레이어가 소스 목록을 노출할 때 사용하는 파생 정보입니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceStatus {
    /// 소스 이름
    pub name: String,
    /// 어댑터 종류
    #[serde(rename = "type")]
    pub kind: SourceKind,
    /// 활성화 여부
    pub enabled: bool,
    /// 수집 중 여부
    pub running: bool,
    /// 마지막 수집 성공 시각
    pub last_check: Option<String>,
    /// 누적 수집 레코드 수
    pub logs_collected: u64,
    /// 마지막 에러 메시지 (다음 성공 시 해제)
    pub last_error: Option<String>,
}
