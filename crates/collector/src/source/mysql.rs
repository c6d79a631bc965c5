//! MySQL 폴링 어댑터
//!
//! 두 가지 모드로 동작합니다.
//!
//! - **커스텀 테이블 모드** (`monitor_table` 설정): 정수 커서 컬럼으로
//!   신규 행만 증분 조회합니다. 행은 [`EventType::DbRecord`]로 수집됩니다.
//! - **general_log 모드** (기본): `mysql.general_log` 테이블에서 쿼리
//!   이벤트를 시각 커서로 증분 조회하고, 문장 접두어로 분류합니다.
//!
//! 연결 풀은 첫 수집 시 지연 생성됩니다. general_log 모드의 전제 조건
//! (`general_log=ON`, `log_output=TABLE`)은 매 사이클 검사하며,
//! 미충족 시 조치 방법을 담은 에러로 보고됩니다.

use chrono::{Duration, NaiveDateTime, Utc};
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions, MySqlRow};
use sqlx::{Column, Row};
use tracing::debug;

use logward_core::config::MysqlSourceConfig;
use logward_core::types::{EventRecord, EventType, Severity};

use crate::classifier::{now_iso, truncate_chars, MAX_MESSAGE_CHARS};
use crate::error::CollectError;

/// 커스텀 테이블 모드 사이클당 최대 행 수
const TABLE_BATCH_LIMIT: i64 = 1000;
/// general_log 모드 사이클당 최대 행 수
const GENERAL_LOG_BATCH_LIMIT: i64 = 500;

/// MySQL 폴링 소스
pub struct MysqlSource {
    config: MysqlSourceConfig,
    pool: Option<MySqlPool>,
    /// 커스텀 테이블 모드 커서 (monitor_column 최고값)
    high_water_mark: Option<i64>,
    /// general_log 모드 커서 (event_time 최고값)
    log_cursor: Option<NaiveDateTime>,
}

impl MysqlSource {
    /// 설정에서 MySQL 소스를 생성합니다.
    pub fn new(config: MysqlSourceConfig) -> Self {
        Self {
            config,
            pool: None,
            high_water_mark: None,
            log_cursor: None,
        }
    }

    /// 소스 이름을 반환합니다.
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// 풀을 지연 생성하여 반환합니다.
    async fn pool(&mut self) -> Result<MySqlPool, CollectError> {
        if let Some(pool) = &self.pool {
            return Ok(pool.clone());
        }
        let options = MySqlConnectOptions::new()
            .host(&self.config.host)
            .port(self.config.port)
            .username(&self.config.user)
            .password(&self.config.password)
            .database(&self.config.database);
        let pool = MySqlPoolOptions::new()
            .max_connections(2)
            .acquire_timeout(std::time::Duration::from_secs(5))
            .connect_with(options)
            .await?;
        self.pool = Some(pool.clone());
        Ok(pool)
    }

    /// 한 사이클 분량의 신규 레코드를 수집합니다.
    pub async fn collect(&mut self) -> Result<Vec<EventRecord>, CollectError> {
        if self.config.monitor_table.is_some() {
            self.collect_table().await
        } else {
            self.collect_general_log().await
        }
    }

    /// 커스텀 테이블 모드 수집.
    async fn collect_table(&mut self) -> Result<Vec<EventRecord>, CollectError> {
        let table = self.config.monitor_table.clone().unwrap_or_default();
        let column = self.config.monitor_column.clone();
        validate_identifier(&self.config.name, &table)?;
        validate_identifier(&self.config.name, &column)?;
        if let Some(ts_col) = &self.config.timestamp_column {
            validate_identifier(&self.config.name, ts_col)?;
        }

        let pool = self.pool().await?;
        let cursor = self.high_water_mark.unwrap_or(0);
        let query = format!(
            "SELECT * FROM `{table}` WHERE `{column}` > ? ORDER BY `{column}` ASC LIMIT {TABLE_BATCH_LIMIT}"
        );
        let rows = sqlx::query(&query).bind(cursor).fetch_all(&pool).await?;

        let mut records = Vec::with_capacity(rows.len());
        let mut max_id = cursor;
        for row in &rows {
            let id: i64 = row.try_get(column.as_str())?;
            if id > max_id {
                max_id = id;
            }

            let raw = stringify_row(row);
            let timestamp = self
                .config
                .timestamp_column
                .as_deref()
                .and_then(|col| row_timestamp(row, col))
                .unwrap_or_else(now_iso);

            let mut record = EventRecord::new(raw.clone(), timestamp, &self.config.name);
            record.event_type = EventType::DbRecord;
            record.table_name = Some(table.clone());
            record.message = truncate_chars(&raw, MAX_MESSAGE_CHARS);
            records.push(record);
        }
        // 커서는 배치 전체가 디코딩된 뒤에만 전진한다
        if !rows.is_empty() {
            self.high_water_mark = Some(max_id);
        }
        debug!(
            source = self.config.name,
            table,
            count = records.len(),
            "collected custom table rows"
        );
        Ok(records)
    }

    /// general_log 모드 수집.
    async fn collect_general_log(&mut self) -> Result<Vec<EventRecord>, CollectError> {
        let pool = self.pool().await?;
        // 서버에서 런타임에 꺼질 수 있으므로 매 사이클 검사한다
        self.check_general_log_preconditions(&pool).await?;

        // 첫 사이클은 직전 5초만 본다 (과거 로그 폭주 방지)
        let cursor = self
            .log_cursor
            .unwrap_or_else(|| Utc::now().naive_utc() - Duration::seconds(5));

        let query = format!(
            "SELECT event_time, user_host, command_type, argument \
             FROM mysql.general_log \
             WHERE event_time > ? AND command_type IN ('Query', 'Execute') \
             ORDER BY event_time ASC LIMIT {GENERAL_LOG_BATCH_LIMIT}"
        );
        let rows = sqlx::query(&query).bind(cursor).fetch_all(&pool).await?;

        let mut records = Vec::new();
        let mut max_time = cursor;
        for row in &rows {
            let event_time: NaiveDateTime = row.try_get("event_time")?;
            if event_time > max_time {
                max_time = event_time;
            }

            let argument = blob_to_string(row, "argument");
            let statement = argument.trim();
            if !is_interesting_statement(statement) {
                continue;
            }

            let (event_type, severity) = classify_statement(statement);
            let user_host: String = row.try_get("user_host").unwrap_or_default();
            let timestamp = event_time.format("%Y-%m-%dT%H:%M:%S%.f").to_string();

            let mut record = EventRecord::new(statement, timestamp, &self.config.name);
            record.event_type = event_type;
            record.severity = severity;
            record.message = truncate_chars(statement, MAX_MESSAGE_CHARS);
            if !user_host.is_empty() {
                record.user = Some(user_host);
            }
            records.push(record);
        }
        // 커서는 배치 전체가 디코딩된 뒤에만 전진한다
        self.log_cursor = Some(max_time);
        Ok(records)
    }

    /// general_log 활성화 여부를 검사하고, 미충족 시 조치 방법을 안내합니다.
    async fn check_general_log_preconditions(
        &self,
        pool: &MySqlPool,
    ) -> Result<(), CollectError> {
        let general_log = show_variable(pool, "general_log").await?;
        let log_output = show_variable(pool, "log_output").await?;
        verify_general_log_settings(&self.config.name, &general_log, &log_output)
    }

    /// 접속 가능 여부를 확인합니다 (`SELECT 1`).
    pub async fn test_connection(&mut self) -> Result<(), CollectError> {
        let pool = self.pool().await?;
        sqlx::query("SELECT 1").fetch_one(&pool).await?;
        Ok(())
    }

    /// 증분 커서를 초기화합니다. 풀은 유지됩니다.
    pub fn reset_tracking(&mut self) {
        self.high_water_mark = None;
        self.log_cursor = None;
    }
}

/// `SHOW VARIABLES LIKE ?` 결과의 Value를 반환합니다.
async fn show_variable(pool: &MySqlPool, name: &str) -> Result<String, CollectError> {
    let row = sqlx::query("SHOW VARIABLES LIKE ?")
        .bind(name)
        .fetch_optional(pool)
        .await?;
    Ok(row
        .and_then(|r| r.try_get::<String, _>(1).ok())
        .unwrap_or_default())
}

/// general_log 서버 변수 값이 수집 가능한 상태인지 판정합니다.
fn verify_general_log_settings(
    source: &str,
    general_log: &str,
    log_output: &str,
) -> Result<(), CollectError> {
    if !general_log.eq_ignore_ascii_case("ON") {
        return Err(CollectError::Precondition {
            source_name: source.to_owned(),
            reason: "general_log is OFF — run `SET GLOBAL general_log = 'ON'` \
                     on the server to enable query logging"
                .to_owned(),
        });
    }
    if !log_output.to_uppercase().contains("TABLE") {
        return Err(CollectError::Precondition {
            source_name: source.to_owned(),
            reason: format!(
                "log_output is '{log_output}' — run `SET GLOBAL log_output = 'TABLE'` \
                 so queries are written to mysql.general_log"
            ),
        });
    }
    Ok(())
}

/// 식별자가 SQL 인터폴레이션에 안전한지 검증합니다.
fn validate_identifier(source: &str, identifier: &str) -> Result<(), CollectError> {
    let ok = !identifier.is_empty()
        && identifier
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');
    if ok {
        Ok(())
    } else {
        Err(CollectError::Precondition {
            source_name: source.to_owned(),
            reason: format!(
                "identifier '{identifier}' must contain only letters, digits and underscores"
            ),
        })
    }
}

/// 수집 대상 문장인지 판별합니다.
///
/// 관리성 문장(SHOW/SET)과 수집기 자신의 조회는 제외합니다.
fn is_interesting_statement(statement: &str) -> bool {
    if statement.is_empty() {
        return false;
    }
    let lower = statement.to_lowercase();
    // 키워드는 첫 토큰 전체로 비교한다 (setup_x() 같은 프로시저 호출 보존)
    let first = lower.split_whitespace().next().unwrap_or("");
    if first == "show" || first == "set" {
        return false;
    }
    !lower.contains("general_log") && !lower.contains("information_schema")
}

/// SQL 문장 접두어로 이벤트 유형과 심각도를 결정합니다.
fn classify_statement(statement: &str) -> (EventType, Severity) {
    let upper = statement.trim_start().to_uppercase();
    if upper.starts_with("INSERT") {
        (EventType::Insert, Severity::Info)
    } else if upper.starts_with("UPDATE") {
        (EventType::Update, Severity::Warning)
    } else if upper.starts_with("DELETE") {
        (EventType::Delete, Severity::Warning)
    } else if upper.starts_with("SELECT") {
        (EventType::Select, Severity::Debug)
    } else if upper.starts_with("CREATE") {
        (EventType::Create, Severity::Info)
    } else if upper.starts_with("DROP") {
        (EventType::Drop, Severity::Error)
    } else if upper.starts_with("ALTER") {
        (EventType::Alter, Severity::Warning)
    } else {
        (EventType::Query, Severity::Info)
    }
}

/// 행 전체를 `col=value` 나열 문자열로 변환합니다.
fn stringify_row(row: &MySqlRow) -> String {
    let mut parts = Vec::with_capacity(row.columns().len());
    for column in row.columns() {
        let name = column.name();
        let value = column_to_string(row, name);
        parts.push(format!("{name}={value}"));
    }
    parts.join(", ")
}

/// 컬럼 값을 타입 폴백 체인으로 문자열화합니다.
fn column_to_string(row: &MySqlRow, name: &str) -> String {
    if let Ok(v) = row.try_get::<i64, _>(name) {
        return v.to_string();
    }
    if let Ok(v) = row.try_get::<f64, _>(name) {
        return v.to_string();
    }
    if let Ok(v) = row.try_get::<String, _>(name) {
        return v;
    }
    if let Ok(v) = row.try_get::<NaiveDateTime, _>(name) {
        return v.format("%Y-%m-%dT%H:%M:%S%.f").to_string();
    }
    if let Ok(v) = row.try_get::<Vec<u8>, _>(name) {
        return String::from_utf8_lossy(&v).into_owned();
    }
    "<unsupported>".to_owned()
}

/// 타임스탬프 컬럼을 ISO 문자열로 읽습니다.
fn row_timestamp(row: &MySqlRow, name: &str) -> Option<String> {
    if let Ok(v) = row.try_get::<NaiveDateTime, _>(name) {
        return Some(v.format("%Y-%m-%dT%H:%M:%S%.f").to_string());
    }
    row.try_get::<String, _>(name).ok()
}

/// BLOB 컬럼을 손실 허용 디코딩으로 읽습니다 (general_log.argument).
fn blob_to_string(row: &MySqlRow, name: &str) -> String {
    if let Ok(v) = row.try_get::<String, _>(name) {
        return v;
    }
    row.try_get::<Vec<u8>, _>(name)
        .map(|b| String::from_utf8_lossy(&b).into_owned())
        .unwrap_or_default()
}
