//! 규칙 기반 로그 분류기
//!
//! 원시 로그 한 줄을 [`EventRecord`]로 변환합니다. DB 사용 행위 감시가
//! 목적이므로 SELECT/INSERT/UPDATE/DELETE와 에러만 "중요"로 취급합니다.
//!
//! 분류는 순수 함수이며 어떤 입력에도 panic하지 않습니다.
//! 모든 패턴은 [`LazyLock`]으로 한 번만 컴파일됩니다.
//!
//! # 분류 단계
//! 1. 타임스탬프 추출 (고정 우선순위, 첫 매치 승리)
//! 2. SQL 감지 (INSERT → UPDATE → DELETE → SELECT 순서, 대상 테이블 캡처)
//! 3. 에러 키워드 감지 (심각도 상향, SQL 미감지 시 유형도 ERROR)
//! 4. affected rows / user 추출
//! 5. 메시지 정리 (타임스탬프 제거, 500자 제한)

use std::sync::LazyLock;

use chrono::{NaiveDateTime, Utc};
use regex::Regex;

use logward_core::types::{EventRecord, EventType, Severity};

/// 정리된 메시지의 최대 길이 (문자 수)
pub(crate) const MAX_MESSAGE_CHARS: usize = 500;

/// SQL 패턴 — 감지 순서가 곧 우선순위
static SQL_PATTERNS: LazyLock<[(EventType, Regex); 4]> = LazyLock::new(|| {
    [
        (
            EventType::Insert,
            Regex::new(r#"(?i)\bINSERT\s+INTO\s+[`"']?(\w+)"#).expect("valid regex"),
        ),
        (
            EventType::Update,
            Regex::new(r#"(?i)\bUPDATE\s+[`"']?(\w+)"#).expect("valid regex"),
        ),
        (
            EventType::Delete,
            Regex::new(r#"(?i)\bDELETE\s+FROM\s+[`"']?(\w+)"#).expect("valid regex"),
        ),
        // SELECT와 FROM 사이에는 임의의 절 목록 허용 (개행 포함, 비탐욕)
        (
            EventType::Select,
            Regex::new(r#"(?is)\bSELECT\b.+?\bFROM\s+[`"']?(\w+)"#).expect("valid regex"),
        ),
    ]
});

/// 에러 키워드 패턴
static ERROR_PATTERNS: LazyLock<[Regex; 2]> = LazyLock::new(|| {
    [
        Regex::new(r"(?i)\b(ERROR|FATAL|CRITICAL|EXCEPTION)\b").expect("valid regex"),
        Regex::new(r"(?i)\b(failed|failure|error|exception)\b").expect("valid regex"),
    ]
});

/// affected rows 패턴 (예: "3 rows affected")
static ROWS_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d+)\s*(?:rows?|records?)\s*(?:affected|changed|deleted|inserted|updated)")
        .expect("valid regex")
});

/// 사용자 식별자 패턴 (user=, user_id:, uid, username 등)
static USER_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)(?:user[_\s]?(?:id)?|uid|username)[=:\s]+["']?(\w+)"#).expect("valid regex")
});

/// 타임스탬프 패턴과 해당 파싱 형식 — 배열 순서가 추출 우선순위
static TIMESTAMP_PATTERNS: LazyLock<[(Regex, &'static [&'static str]); 4]> = LazyLock::new(|| {
    [
        // 기본 ISO: 2024-01-26T20:30:15 또는 2024-01-26 20:30:15
        (
            Regex::new(r"(\d{4}-\d{2}-\d{2}[T\s]\d{2}:\d{2}:\d{2})").expect("valid regex"),
            &["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"][..],
        ),
        // 대괄호 로그 형식: [2024-01-26 20:30:15]
        (
            Regex::new(r"\[(\d{4}-\d{2}-\d{2}\s\d{2}:\d{2}:\d{2})\]").expect("valid regex"),
            &["%Y-%m-%d %H:%M:%S"][..],
        ),
        // 소수 초 포함 ISO: 2024-01-26T20:30:15.123456Z
        (
            Regex::new(r"(\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}\.\d+Z?)").expect("valid regex"),
            &["%Y-%m-%dT%H:%M:%S%.f"][..],
        ),
        // 일/월/연: 26/01/2024 20:30:15
        (
            Regex::new(r"(\d{2}/\d{2}/\d{4}\s\d{2}:\d{2}:\d{2})").expect("valid regex"),
            &["%d/%m/%Y %H:%M:%S"][..],
        ),
    ]
});

/// 현재 시각을 ISO-8601 문자열로 반환합니다 (UTC, 마이크로초 포함).
pub fn now_iso() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
}

/// 원시 로그 한 줄을 분류합니다.
///
/// 전체 함수이며 어떤 입력에도 panic하지 않습니다. 빈 입력은
/// `Other` 유형의 빈 레코드가 됩니다 (타임스탬프는 현재 시각).
pub fn classify(raw: &str, source: &str) -> EventRecord {
    let raw = raw.trim();
    if raw.is_empty() {
        return EventRecord::new("", now_iso(), source);
    }

    let timestamp = extract_timestamp(raw).unwrap_or_else(now_iso);

    let mut event_type = EventType::Other;
    let mut table_name = None;
    for (sql_type, pattern) in SQL_PATTERNS.iter() {
        if let Some(captures) = pattern.captures(raw) {
            event_type = *sql_type;
            table_name = captures.get(1).map(|m| m.as_str().to_owned());
            break;
        }
    }

    let mut severity = Severity::Info;
    for pattern in ERROR_PATTERNS.iter() {
        if pattern.is_match(raw) {
            severity = Severity::Error;
            if event_type == EventType::Other {
                event_type = EventType::Error;
            }
            break;
        }
    }

    let affected_rows = ROWS_PATTERN
        .captures(raw)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<u64>().ok());

    let user = USER_PATTERN
        .captures(raw)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_owned());

    let mut record = EventRecord::new(raw, timestamp, source);
    record.event_type = event_type;
    record.severity = severity;
    record.table_name = table_name;
    record.affected_rows = affected_rows;
    record.user = user;
    record.message = clean_message(raw);
    record
}

/// 중요 이벤트 여부 — DB 행위와 에러만 중요로 취급합니다.
pub fn is_important(record: &EventRecord) -> bool {
    matches!(
        record.event_type,
        EventType::Select
            | EventType::Insert
            | EventType::Update
            | EventType::Delete
            | EventType::Error
    )
}

/// 텍스트에서 타임스탬프를 추출합니다.
///
/// 첫 매치의 형식 계열로 파싱을 시도하며, 파싱 실패 시 매치된
/// 부분 문자열을 그대로 반환합니다. 매치가 없으면 `None`.
fn extract_timestamp(text: &str) -> Option<String> {
    for (pattern, formats) in TIMESTAMP_PATTERNS.iter() {
        let Some(matched) = pattern.captures(text).and_then(|c| c.get(1)) else {
            continue;
        };
        let ts_str = matched.as_str();
        let candidate = ts_str.strip_suffix('Z').unwrap_or(ts_str);
        for fmt in formats.iter() {
            if let Ok(dt) = NaiveDateTime::parse_from_str(candidate, fmt) {
                return Some(dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string());
            }
        }
        // 파싱 실패 시 매치된 문자열 그대로
        return Some(ts_str.to_owned());
    }
    None
}

/// 메시지를 정리합니다: 타임스탬프 제거, 선두 대괄호 제거, 500자 제한.
fn clean_message(raw: &str) -> String {
    static LEADING_BRACKETS: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"^\s*[\[\]]+\s*").expect("valid regex"));

    let mut message = raw.to_owned();
    for (pattern, _) in TIMESTAMP_PATTERNS.iter() {
        message = pattern.replace_all(&message, "").into_owned();
    }
    let message = LEADING_BRACKETS.replace(&message, "");
    truncate_chars(message.trim(), MAX_MESSAGE_CHARS)
}

/// 문자 경계를 존중하여 최대 `max`자로 자릅니다.
pub(crate) fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}
