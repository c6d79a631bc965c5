//! 에러 타입 — 도메인별 에러 정의

/// Logward 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum LogwardError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 수집기 에러
    #[error("collector error: {0}")]
    Collector(#[from] CollectorError),

    /// 싱크/스토리지 에러
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 수집기 에러
#[derive(Debug, thiserror::Error)]
pub enum CollectorError {
    /// 이미 실행 중인 서비스를 다시 시작함
    #[error("collector already running")]
    AlreadyRunning,

    /// 실행 중이 아닌 서비스를 정지함
    #[error("collector not running")]
    NotRunning,

    /// 등록되지 않은 소스 참조
    #[error("unknown source: {name}")]
    UnknownSource { name: String },

    /// 같은 이름의 소스가 이미 존재함
    #[error("duplicate source name: {name}")]
    DuplicateSource { name: String },

    /// 소스 수집 실패
    #[error("source '{source_name}' collect failed: {reason}")]
    Collect { source_name: String, reason: String },

    /// 소스 전제 조건 미충족 (예: general_log 비활성화)
    #[error("source '{source_name}' precondition not met: {reason}")]
    Precondition { source_name: String, reason: String },

    /// 수집 루프 채널 전송 실패
    #[error("channel send failed: {0}")]
    ChannelSend(String),
}

/// 싱크/스토리지 에러
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// 연결 실패
    #[error("connection failed: {0}")]
    Connection(String),

    /// 기록 실패
    #[error("append failed: {0}")]
    Append(String),

    /// 조회 실패
    #[error("query failed: {0}")]
    Query(String),
}
