//! wavepilot 핵심 에러 타입.
//!
//! 모든 어댑터 crate는 자체 에러 타입에서 `#[from] CoreError`로 래핑한다.
//! 인식(perception) 실패는 스케줄러 루프를 멈추지 않도록 `PerceptionError`로 분리한다.

use thiserror::Error;

/// 코어 레이어 에러.
/// 직렬화, 설정, 유효성 검증, 입력/캡처 어댑터 실패 등 도메인 공통 에러를 정의한다.
#[derive(Debug, Error)]
pub enum CoreError {
    /// JSON 직렬화/역직렬화 실패
    #[error("직렬화 에러: {0}")]
    Serialization(#[from] serde_json::Error),

    /// 설정값 오류
    #[error("설정 에러: {0}")]
    Config(String),

    /// 필드 유효성 검증 실패
    #[error("유효성 검증 실패 — {field}: {message}")]
    Validation {
        /// 검증 실패한 필드명
        field: String,
        /// 실패 사유
        message: String,
    },

    /// 리소스를 찾을 수 없음
    #[error("{resource_type} 미발견: {id}")]
    NotFound {
        /// 리소스 종류 (예: "Task", "Scene")
        resource_type: String,
        /// 리소스 식별자
        id: String,
    },

    /// 입력 이벤트 전송 실패 (게임 내 효과가 아닌 디스패치 자체의 실패)
    #[error("입력 전송 실패: {0}")]
    Input(String),

    /// 스크린 캡처 실패
    #[error("캡처 실패: {0}")]
    Capture(String),

    /// 내부 에러 (예상치 못한 상황)
    #[error("내부 에러: {0}")]
    Internal(String),

    /// I/O 에러
    #[error("I/O 에러: {0}")]
    Io(#[from] std::io::Error),
}

/// 인식 파이프라인 에러.
///
/// 스케줄러는 이 에러를 "이번 틱은 정보 없음"으로 취급하며 루프를 계속한다.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PerceptionError {
    /// 비전 모델 내부 실패
    #[error("비전 모델 실패: {0}")]
    ModelFailure(String),

    /// 지연 예산 초과
    #[error("인식 지연 예산 초과: {budget_ms}ms")]
    Timeout {
        /// 허용된 지연 예산 (밀리초)
        budget_ms: u64,
    },

    /// 재시도 후에도 실패 — 이번 틱 인식 불가
    #[error("인식 불가 (재시도 {attempts}회 후): {last}")]
    Unavailable {
        /// 총 시도 횟수
        attempts: u32,
        /// 마지막 실패 사유
        last: String,
    },

    /// 프레임 캡처 실패
    #[error("프레임 캡처 실패: {0}")]
    Capture(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_message_contains_field() {
        let err = CoreError::Validation {
            field: "tasks[0].id".to_string(),
            message: "중복 ID".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("tasks[0].id"));
        assert!(msg.contains("중복 ID"));
    }

    #[test]
    fn perception_unavailable_message() {
        let err = PerceptionError::Unavailable {
            attempts: 2,
            last: "timeout".to_string(),
        };
        assert!(err.to_string().contains("2회"));
    }

    #[test]
    fn io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: CoreError = io.into();
        assert!(matches!(err, CoreError::Io(_)));
    }
}
