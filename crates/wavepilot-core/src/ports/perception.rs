//! 인식(perception) 포트.
//!
//! 구현: `wavepilot-vision` crate (xcap 캡처, 지연 예산 어댑터, 최신 프레임 워커)

use async_trait::async_trait;

use crate::error::{CoreError, PerceptionError};
use crate::models::detection::{Detection, Observation};
use crate::models::frame::Frame;

/// 비전 모델 — 프레임에서 인식 결과 추출
///
/// 템플릿 매칭, OCR, 객체 탐지 등 내부 구현은 이 경계 밖에 있다.
#[async_trait]
pub trait Perception: Send + Sync {
    async fn detect(&self, frame: &Frame) -> Result<Vec<Detection>, PerceptionError>;

    /// 모델 이름 (로그용)
    fn name(&self) -> &str {
        "perception"
    }
}

/// 프레임 소스 — 대상 창/모니터 캡처
#[async_trait]
pub trait FrameSource: Send + Sync {
    async fn capture(&self) -> Result<Frame, CoreError>;
}

/// 관측 소스 — 스케줄러가 틱마다 한 번 호출
///
/// 실패는 `Observation::error`로 표현되며 이 호출은 실패하지 않는다.
#[async_trait]
pub trait ObservationSource: Send {
    async fn observe(&mut self) -> Observation;
}
