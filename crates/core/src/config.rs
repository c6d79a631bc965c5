//! 설정 관리 — logward.toml 파싱 및 런타임 설정
//!
//! [`LogwardConfig`]는 모든 모듈의 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`LOGWARD_COLLECTOR_POLL_INTERVAL_SECS=5` 형식)
//! 3. 설정 파일 (`logward.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), logward_core::error::LogwardError> {
//! use logward_core::config::LogwardConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = LogwardConfig::load("logward.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = LogwardConfig::parse("[general]\nlog_level = \"debug\"")?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, LogwardError};
use crate::types::SourceKind;

/// Logward 통합 설정
///
/// `logward.toml` 파일의 최상위 구조를 나타냅니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogwardConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 수집기 설정
    #[serde(default)]
    pub collector: CollectorSettings,
    /// 소스 목록
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
}

impl LogwardConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    ///
    /// 설정 로딩 순서:
    /// 1. TOML 파일 파싱
    /// 2. 환경변수 오버라이드 적용
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, LogwardError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, LogwardError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                LogwardError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                LogwardError::Io(e)
            }
        })?;
        let config = Self::parse(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, LogwardError> {
        toml::from_str(toml_str).map_err(|e| {
            LogwardError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `LOGWARD_{SECTION}_{FIELD}`
    /// 소스 목록은 파일 전용이며 환경변수로 오버라이드할 수 없습니다.
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "LOGWARD_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "LOGWARD_GENERAL_LOG_FORMAT");

        // Collector
        override_u64(
            &mut self.collector.poll_interval_secs,
            "LOGWARD_COLLECTOR_POLL_INTERVAL_SECS",
        );
        override_usize(
            &mut self.collector.buffer_capacity,
            "LOGWARD_COLLECTOR_BUFFER_CAPACITY",
        );
        override_usize(
            &mut self.collector.sink_queue_capacity,
            "LOGWARD_COLLECTOR_SINK_QUEUE_CAPACITY",
        );
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), LogwardError> {
        // log_level 검증
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_level".to_owned(),
                reason: format!("must be one of: {}", valid_levels.join(", ")),
            }
            .into());
        }

        // log_format 검증
        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_format".to_owned(),
                reason: format!("must be one of: {}", valid_formats.join(", ")),
            }
            .into());
        }

        // 수집 주기 검증
        if self.collector.poll_interval_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "collector.poll_interval_secs".to_owned(),
                reason: "must be at least 1".to_owned(),
            }
            .into());
        }

        // 버퍼 용량 검증
        if self.collector.buffer_capacity == 0 || self.collector.buffer_capacity > 1_000_000 {
            return Err(ConfigError::InvalidValue {
                field: "collector.buffer_capacity".to_owned(),
                reason: "must be between 1 and 1000000".to_owned(),
            }
            .into());
        }

        if self.collector.sink_queue_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                field: "collector.sink_queue_capacity".to_owned(),
                reason: "must be at least 1".to_owned(),
            }
            .into());
        }

        // 소스 이름: 비어있지 않고 중복 없음
        let mut seen = std::collections::HashSet::new();
        for source in &self.sources {
            let name = source.name();
            if name.is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "sources.name".to_owned(),
                    reason: "source name must not be empty".to_owned(),
                }
                .into());
            }
            if !seen.insert(name) {
                return Err(ConfigError::InvalidValue {
                    field: "sources.name".to_owned(),
                    reason: format!("duplicate source name: {name}"),
                }
                .into());
            }
            source.validate()?;
        }

        Ok(())
    }
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "json".to_owned(),
        }
    }
}

/// 수집기 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorSettings {
    /// 수집 주기 (초)
    pub poll_interval_secs: u64,
    /// 메모리 버퍼 보존 레코드 수
    pub buffer_capacity: usize,
    /// 싱크 워커 큐 용량 (배치 단위)
    pub sink_queue_capacity: usize,
}

impl Default for CollectorSettings {
    fn default() -> Self {
        Self {
            poll_interval_secs: 2,
            buffer_capacity: 10_000,
            sink_queue_capacity: 256,
        }
    }
}

/// 소스 설정
///
/// `[[sources]]` 배열의 한 항목입니다. `type` 필드로 어댑터 종류를
/// 판별하는 내부 태그 열거형이며, 알 수 없는 `type`은 파싱 단계에서
/// 명확한 에러로 거부됩니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SourceConfig {
    /// 로그 파일 tail 소스
    File(FileSourceConfig),
    /// MySQL 폴링 소스
    Mysql(MysqlSourceConfig),
    /// MongoDB 변경 감지 소스
    Mongodb(MongoSourceConfig),
}

impl SourceConfig {
    /// 소스 이름을 반환합니다.
    pub fn name(&self) -> &str {
        match self {
            Self::File(c) => &c.name,
            Self::Mysql(c) => &c.name,
            Self::Mongodb(c) => &c.name,
        }
    }

    /// 활성화 여부를 반환합니다.
    pub fn enabled(&self) -> bool {
        match self {
            Self::File(c) => c.enabled,
            Self::Mysql(c) => c.enabled,
            Self::Mongodb(c) => c.enabled,
        }
    }

    /// 어댑터 종류를 반환합니다.
    pub fn kind(&self) -> SourceKind {
        match self {
            Self::File(_) => SourceKind::File,
            Self::Mysql(_) => SourceKind::Mysql,
            Self::Mongodb(_) => SourceKind::Mongodb,
        }
    }

    /// 타입별 필수 필드를 검증합니다.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            Self::File(c) => {
                if c.path.trim().is_empty() {
                    return Err(ConfigError::InvalidValue {
                        field: format!("sources.{}.path", c.name),
                        reason: "path must not be empty".to_owned(),
                    });
                }
            }
            Self::Mysql(c) => {
                if c.host.is_empty() {
                    return Err(ConfigError::InvalidValue {
                        field: format!("sources.{}.host", c.name),
                        reason: "host must not be empty".to_owned(),
                    });
                }
                if c.database.is_empty() {
                    return Err(ConfigError::InvalidValue {
                        field: format!("sources.{}.database", c.name),
                        reason: "database must not be empty".to_owned(),
                    });
                }
            }
            Self::Mongodb(c) => {
                if c.uri.is_empty() {
                    return Err(ConfigError::InvalidValue {
                        field: format!("sources.{}.uri", c.name),
                        reason: "uri must not be empty".to_owned(),
                    });
                }
                if c.database.is_empty() {
                    return Err(ConfigError::InvalidValue {
                        field: format!("sources.{}.database", c.name),
                        reason: "database must not be empty".to_owned(),
                    });
                }
            }
        }
        Ok(())
    }
}

fn default_true() -> bool {
    true
}

/// 파일 소스 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileSourceConfig {
    /// 소스 이름
    pub name: String,
    /// 활성화 여부
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// 파일 또는 디렉토리 경로
    pub path: String,
    /// 디렉토리일 때 적용할 glob 패턴
    #[serde(default = "FileSourceConfig::default_patterns")]
    pub patterns: Vec<String>,
    /// 중요 이벤트만 남길지 여부
    #[serde(default)]
    pub filter_important: bool,
}

impl FileSourceConfig {
    fn default_patterns() -> Vec<String> {
        vec!["*.log".to_owned(), "*.txt".to_owned()]
    }
}

/// MySQL 소스 설정
///
/// `monitor_table`이 설정되면 커스텀 테이블 모드, 아니면 general_log
/// 모드로 동작합니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MysqlSourceConfig {
    /// 소스 이름
    pub name: String,
    /// 활성화 여부
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// 접속 호스트
    pub host: String,
    /// 접속 포트
    #[serde(default = "MysqlSourceConfig::default_port")]
    pub port: u16,
    /// 접속 사용자
    pub user: String,
    /// 접속 비밀번호
    #[serde(default)]
    pub password: String,
    /// 대상 데이터베이스
    pub database: String,
    /// 감시할 커스텀 테이블 (없으면 general_log 모드)
    #[serde(default)]
    pub monitor_table: Option<String>,
    /// 증분 커서로 사용할 정수 컬럼
    #[serde(default = "MysqlSourceConfig::default_monitor_column")]
    pub monitor_column: String,
    /// 레코드 타임스탬프로 사용할 컬럼
    #[serde(default)]
    pub timestamp_column: Option<String>,
}

impl MysqlSourceConfig {
    fn default_port() -> u16 {
        3306
    }

    fn default_monitor_column() -> String {
        "id".to_owned()
    }
}

/// MongoDB 소스 설정
///
/// `collection`이 설정되면 스냅샷 비교 모드, 아니면 프로파일러 모드로
/// 동작합니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoSourceConfig {
    /// 소스 이름
    pub name: String,
    /// 활성화 여부
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// 접속 URI
    pub uri: String,
    /// 대상 데이터베이스
    pub database: String,
    /// 감시할 컬렉션 (없으면 프로파일러 모드)
    #[serde(default)]
    pub collection: Option<String>,
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_usize(target: &mut usize, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<usize>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse usize from env var, ignoring"
            ),
        }
    }
}

fn override_u64(target: &mut u64, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u64>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u64 from env var, ignoring"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_sane_values() {
        let config = LogwardConfig::default();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.general.log_format, "json");
        assert_eq!(config.collector.poll_interval_secs, 2);
        assert_eq!(config.collector.buffer_capacity, 10_000);
        assert!(config.sources.is_empty());
    }

    #[test]
    fn default_config_passes_validation() {
        let config = LogwardConfig::default();
        config.validate().unwrap();
    }

    #[test]
    fn from_str_empty_toml_uses_defaults() {
        let config = LogwardConfig::parse("").unwrap();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.collector.poll_interval_secs, 2);
    }

    #[test]
    fn from_str_partial_toml_merges_with_defaults() {
        let toml = r#"
[general]
log_level = "debug"

[collector]
poll_interval_secs = 5
"#;
        let config = LogwardConfig::parse(toml).unwrap();
        assert_eq!(config.general.log_level, "debug");
        // log_format은 기본값 유지
        assert_eq!(config.general.log_format, "json");
        assert_eq!(config.collector.poll_interval_secs, 5);
        assert_eq!(config.collector.buffer_capacity, 10_000);
    }

    #[test]
    fn from_str_full_toml_with_sources() {
        let toml = r#"
[general]
log_level = "warn"
log_format = "pretty"

[collector]
poll_interval_secs = 3
buffer_capacity = 5000
sink_queue_capacity = 64

[[sources]]
type = "file"
name = "app-logs"
path = "/var/log/app"
patterns = ["*.log"]
filter_important = true

[[sources]]
type = "mysql"
name = "orders-db"
host = "db.internal"
port = 3307
user = "monitor"
password = "secret"
database = "orders"
monitor_table = "audit_log"
monitor_column = "seq"
timestamp_column = "created_at"

[[sources]]
type = "mongodb"
name = "events-db"
uri = "mongodb://mongo:27017"
database = "events"
collection = "actions"
"#;
        let config = LogwardConfig::parse(toml).unwrap();
        assert_eq!(config.collector.buffer_capacity, 5000);
        assert_eq!(config.sources.len(), 3);

        assert_eq!(config.sources[0].name(), "app-logs");
        assert_eq!(config.sources[0].kind(), SourceKind::File);
        let SourceConfig::File(file) = &config.sources[0] else {
            panic!("expected file source");
        };
        assert!(file.filter_important);
        assert_eq!(file.patterns, vec!["*.log"]);

        let SourceConfig::Mysql(mysql) = &config.sources[1] else {
            panic!("expected mysql source");
        };
        assert_eq!(mysql.port, 3307);
        assert_eq!(mysql.monitor_table.as_deref(), Some("audit_log"));
        assert_eq!(mysql.monitor_column, "seq");

        let SourceConfig::Mongodb(mongo) = &config.sources[2] else {
            panic!("expected mongodb source");
        };
        assert_eq!(mongo.collection.as_deref(), Some("actions"));

        config.validate().unwrap();
    }

    #[test]
    fn source_defaults_applied() {
        let toml = r#"
[[sources]]
type = "file"
name = "minimal"
path = "/var/log/app.log"
"#;
        let config = LogwardConfig::parse(toml).unwrap();
        let SourceConfig::File(file) = &config.sources[0] else {
            panic!("expected file source");
        };
        assert!(file.enabled);
        assert!(!file.filter_important);
        assert_eq!(file.patterns, vec!["*.log", "*.txt"]);
    }

    #[test]
    fn unknown_source_type_is_rejected_at_parse() {
        let toml = r#"
[[sources]]
type = "kafka"
name = "stream"
"#;
        let err = LogwardConfig::parse(toml).unwrap_err();
        assert!(matches!(
            err,
            LogwardError::Config(ConfigError::ParseFailed { .. })
        ));
    }

    #[test]
    fn from_str_invalid_toml_returns_error() {
        let result = LogwardConfig::parse("invalid = [[[toml");
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(matches!(
            err,
            LogwardError::Config(ConfigError::ParseFailed { .. })
        ));
    }

    #[test]
    fn validate_rejects_invalid_log_level() {
        let mut config = LogwardConfig::default();
        config.general.log_level = "verbose".to_owned();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("log_level"));
    }

    #[test]
    fn validate_rejects_invalid_log_format() {
        let mut config = LogwardConfig::default();
        config.general.log_format = "xml".to_owned();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("log_format"));
    }

    #[test]
    fn validate_rejects_zero_poll_interval() {
        let mut config = LogwardConfig::default();
        config.collector.poll_interval_secs = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("poll_interval_secs"));
    }

    #[test]
    fn validate_rejects_zero_buffer_capacity() {
        let mut config = LogwardConfig::default();
        config.collector.buffer_capacity = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("buffer_capacity"));
    }

    #[test]
    fn validate_rejects_duplicate_source_names() {
        let toml = r#"
[[sources]]
type = "file"
name = "dup"
path = "/var/log/a.log"

[[sources]]
type = "file"
name = "dup"
path = "/var/log/b.log"
"#;
        let config = LogwardConfig::parse(toml).unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate source name"));
    }

    #[test]
    fn validate_rejects_empty_source_name() {
        let toml = r#"
[[sources]]
type = "file"
name = ""
path = "/var/log/a.log"
"#;
        let config = LogwardConfig::parse(toml).unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("must not be empty"));
    }

    #[test]
    fn validate_rejects_empty_mysql_host() {
        let toml = r#"
[[sources]]
type = "mysql"
name = "db"
host = ""
user = "root"
database = "app"
"#;
        let config = LogwardConfig::parse(toml).unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("host"));
    }

    #[test]
    fn env_override_string() {
        let mut val = "original".to_owned();
        // SAFETY: 테스트는 단일 스레드에서 실행되므로 환경변수 조작이 안전합니다.
        unsafe { std::env::set_var("TEST_LOGWARD_STR", "overridden") };
        override_string(&mut val, "TEST_LOGWARD_STR");
        assert_eq!(val, "overridden");
        unsafe { std::env::remove_var("TEST_LOGWARD_STR") };
    }

    #[test]
    fn env_override_u64_invalid_keeps_original() {
        let mut val = 2u64;
        // SAFETY: 테스트는 단일 스레드에서 실행되므로 환경변수 조작이 안전합니다.
        unsafe { std::env::set_var("TEST_LOGWARD_U64_BAD", "not-a-number") };
        override_u64(&mut val, "TEST_LOGWARD_U64_BAD");
        assert_eq!(val, 2); // 원래 값 유지
        unsafe { std::env::remove_var("TEST_LOGWARD_U64_BAD") };
    }

    #[test]
    fn env_override_missing_var_keeps_original() {
        let mut val = "original".to_owned();
        override_string(&mut val, "TEST_LOGWARD_NONEXISTENT_12345");
        assert_eq!(val, "original");
    }

    #[test]
    #[serial_test::serial]
    fn apply_env_overrides_collector_fields() {
        let mut config = LogwardConfig::default();
        // SAFETY: 테스트는 단일 스레드에서 실행되므로 환경변수 조작이 안전합니다.
        unsafe { std::env::set_var("LOGWARD_COLLECTOR_POLL_INTERVAL_SECS", "7") };
        unsafe { std::env::set_var("LOGWARD_COLLECTOR_BUFFER_CAPACITY", "1234") };
        config.apply_env_overrides();
        assert_eq!(config.collector.poll_interval_secs, 7);
        assert_eq!(config.collector.buffer_capacity, 1234);
        unsafe { std::env::remove_var("LOGWARD_COLLECTOR_POLL_INTERVAL_SECS") };
        unsafe { std::env::remove_var("LOGWARD_COLLECTOR_BUFFER_CAPACITY") };
    }

    #[test]
    fn config_serialize_roundtrip() {
        let config = LogwardConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed = LogwardConfig::parse(&toml_str).unwrap();
        assert_eq!(config.general.log_level, parsed.general.log_level);
        assert_eq!(
            config.collector.buffer_capacity,
            parsed.collector.buffer_capacity
        );
    }

    #[tokio::test]
    async fn from_file_not_found() {
        let result = LogwardConfig::from_file("/nonexistent/path/logward.toml").await;
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(matches!(
            err,
            LogwardError::Config(ConfigError::FileNotFound { .. })
        ));
    }
}
