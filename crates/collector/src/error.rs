//! 수집기 에러 타입
//!
//! [`CollectError`]는 어댑터와 수집 루프 내부에서 발생하는 모든 에러를
//! 표현합니다. `From<CollectError> for LogwardError` 변환이 구현되어
//! 상위 레이어에서 `?` 연산자로 자연스럽게 전파할 수 있습니다.

use logward_core::error::{CollectorError, LogwardError};

/// 수집 도메인 에러
///
/// 파일 I/O, DB 질의, 전제 조건 검사, 채널 통신 등 수집 내부의
/// 모든 에러 상황을 포괄합니다.
#[derive(Debug, thiserror::Error)]
pub enum CollectError {
    /// 소스 수집 실패
    #[error("source error: {source_type}: {reason}")]
    Source {
        /// 수집 소스 유형 (file, mysql, mongodb)
        source_type: String,
        /// 에러 사유
        reason: String,
    },

    /// 소스 전제 조건 미충족 (general_log OFF, profiling 비활성화 등)
    ///
    /// 사용자가 해결할 수 있도록 구체적인 조치를 메시지에 담습니다.
    #[error("precondition not met for '{source_name}': {reason}")]
    Precondition {
        /// 소스 이름
        source_name: String,
        /// 미충족 사유와 조치 방법
        reason: String,
    },

    /// 채널 통신 에러
    #[error("channel error: {0}")]
    Channel(String),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// MySQL 질의 에러
    #[error("mysql error: {0}")]
    Sql(#[from] sqlx::Error),

    /// MongoDB 드라이버 에러
    #[error("mongodb error: {0}")]
    Mongo(#[from] mongodb::error::Error),

    /// BSON 역직렬화 에러
    #[error("bson error: {0}")]
    Bson(#[from] bson::de::Error),
}

impl From<CollectError> for LogwardError {
    fn from(err: CollectError) -> Self {
        match err {
            CollectError::Precondition { source_name, reason } => {
                LogwardError::Collector(CollectorError::Precondition { source_name, reason })
            }
            CollectError::Channel(reason) => {
                LogwardError::Collector(CollectorError::ChannelSend(reason))
            }
            other => LogwardError::Collector(CollectorError::Collect {
                source_name: String::new(),
                reason: other.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_error_display() {
        let err = CollectError::Source {
            source_type: "file".to_owned(),
            reason: "permission denied".to_owned(),
        };
        let msg = err.to_string();
        assert!(msg.contains("file"));
        assert!(msg.contains("permission denied"));
    }

    #[test]
    fn precondition_converts_to_logward_error() {
        let err = CollectError::Precondition {
            source_name: "mysql-prod".to_owned(),
            reason: "general_log is OFF".to_owned(),
        };
        let top: LogwardError = err.into();
        assert!(matches!(
            top,
            LogwardError::Collector(CollectorError::Precondition { .. })
        ));
    }

    #[test]
    fn io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err = CollectError::from(io);
        let top: LogwardError = err.into();
        assert!(top.to_string().contains("gone"));
    }
}
