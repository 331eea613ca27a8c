//! 인식 어댑터.
//!
//! 비전 모델(`Perception` 포트) 호출을 지연 예산으로 감싼다.
//! 예산 초과나 모델 실패는 한 번 재시도하고, 그래도 실패하면
//! 빈 인식 결과와 `PerceptionError::Unavailable`을 반환한다.
//! 창 제목으로 판별한 언어의 `<feature>_<lang>` 레이블은 공통 레이블로 정규화된다.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};
use wavepilot_core::error::PerceptionError;
use wavepilot_core::models::detection::{Detection, Observation};
use wavepilot_core::models::frame::Frame;
use wavepilot_core::ports::perception::Perception;

use crate::echo::read_echo;
use crate::language::GameLanguage;
use crate::stamina::read_stamina;

/// 기본 시도 횟수 (최초 1회 + 재시도 1회)
const DEFAULT_ATTEMPTS: u32 = 2;

/// 지연 예산 인식 어댑터
pub struct PerceptionAdapter {
    model: Arc<dyn Perception>,
    budget: Duration,
    attempts: u32,
}

impl PerceptionAdapter {
    /// 새 어댑터 생성
    pub fn new(model: Arc<dyn Perception>, budget: Duration) -> Self {
        Self {
            model,
            budget,
            attempts: DEFAULT_ATTEMPTS,
        }
    }

    /// 지연 예산 반환
    pub fn budget(&self) -> Duration {
        self.budget
    }

    /// 프레임 인식. 실패해도 에러를 전파하지 않는다.
    pub async fn classify(&self, frame: &Frame) -> Observation {
        let budget_ms = self.budget.as_millis() as u64;
        let mut last = String::new();

        for attempt in 1..=self.attempts {
            match tokio::time::timeout(self.budget, self.model.detect(frame)).await {
                Ok(Ok(detections)) => {
                    debug!(
                        frame_id = frame.id,
                        attempt,
                        count = detections.len(),
                        model = self.model.name(),
                        "인식 완료"
                    );
                    return Self::observation(frame, detections, None);
                }
                Ok(Err(e)) => {
                    warn!(frame_id = frame.id, attempt, error = %e, "인식 실패");
                    last = e.to_string();
                }
                Err(_) => {
                    let e = PerceptionError::Timeout { budget_ms };
                    warn!(frame_id = frame.id, attempt, budget_ms, "인식 지연 예산 초과");
                    last = e.to_string();
                }
            }
        }

        Self::observation(
            frame,
            Vec::new(),
            Some(PerceptionError::Unavailable {
                attempts: self.attempts,
                last,
            }),
        )
    }

    fn observation(
        frame: &Frame,
        mut detections: Vec<Detection>,
        error: Option<PerceptionError>,
    ) -> Observation {
        if let Some(title) = frame.window_title.as_deref() {
            GameLanguage::from_window_title(title).localize(&mut detections);
        }
        let stamina = read_stamina(&detections, Some(frame.size));
        let echo = read_echo(&detections, Some(frame.size));
        Observation {
            frame_id: Some(frame.id),
            frame_size: Some(frame.size),
            window_title: frame.window_title.clone(),
            detections,
            stamina,
            echo,
            error,
            repeated: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use wavepilot_core::models::frame::{FrameSize, Rect};

    /// 처음 `fail_first`번 실패(또는 지연)한 뒤 성공하는 모델
    struct FlakyModel {
        calls: AtomicU32,
        fail_first: u32,
        slow: bool,
    }

    #[async_trait]
    impl Perception for FlakyModel {
        async fn detect(&self, frame: &Frame) -> Result<Vec<Detection>, PerceptionError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.fail_first {
                if self.slow {
                    tokio::time::sleep(Duration::from_millis(500)).await;
                } else {
                    return Err(PerceptionError::ModelFailure("boom".into()));
                }
            }
            Ok(vec![Detection::template(
                "main_menu_button",
                0.95,
                Rect::new(0, 0, 10, 10),
                frame.id,
            )])
        }
    }

    fn make_adapter(fail_first: u32, slow: bool) -> (PerceptionAdapter, Arc<FlakyModel>) {
        let model = Arc::new(FlakyModel {
            calls: AtomicU32::new(0),
            fail_first,
            slow,
        });
        (
            PerceptionAdapter::new(model.clone(), Duration::from_millis(30)),
            model,
        )
    }

    #[tokio::test]
    async fn success_on_first_attempt() {
        let (adapter, model) = make_adapter(0, false);
        let obs = adapter.classify(&Frame::blank(7, FrameSize::new(100, 100))).await;
        assert!(obs.is_ok());
        assert_eq!(obs.frame_id, Some(7));
        assert_eq!(obs.detections.len(), 1);
        assert_eq!(model.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn model_failure_is_retried_once() {
        let (adapter, model) = make_adapter(1, false);
        let obs = adapter.classify(&Frame::blank(1, FrameSize::new(100, 100))).await;
        assert!(obs.is_ok());
        assert_eq!(model.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn repeated_failure_is_unavailable() {
        let (adapter, model) = make_adapter(5, false);
        let obs = adapter.classify(&Frame::blank(1, FrameSize::new(100, 100))).await;
        assert!(obs.detections.is_empty());
        assert!(matches!(
            obs.error,
            Some(PerceptionError::Unavailable { attempts: 2, .. })
        ));
        assert_eq!(model.calls.load(Ordering::SeqCst), 2);
    }

    /// 언어별 템플릿 레이블만 돌려주는 모델
    struct LocalizedModel;

    #[async_trait]
    impl Perception for LocalizedModel {
        async fn detect(&self, frame: &Frame) -> Result<Vec<Detection>, PerceptionError> {
            Ok(vec![Detection::template(
                "main_menu_button_en_US",
                0.9,
                Rect::new(0, 0, 10, 10),
                frame.id,
            )])
        }
    }

    #[tokio::test]
    async fn window_language_normalizes_labels() {
        let adapter = PerceptionAdapter::new(Arc::new(LocalizedModel), Duration::from_millis(30));
        let frame = Frame::blank(3, FrameSize::new(100, 100)).with_window_title("Wuthering Waves");
        let obs = adapter.classify(&frame).await;
        assert_eq!(obs.detections[0].label, "main_menu_button");

        let untitled = adapter.classify(&Frame::blank(4, FrameSize::new(100, 100))).await;
        assert_eq!(untitled.detections[0].label, "main_menu_button_en_US");
    }

    #[tokio::test]
    async fn latency_budget_exceeded_is_retried() {
        let (adapter, _model) = make_adapter(1, true);
        let obs = adapter.classify(&Frame::blank(1, FrameSize::new(100, 100))).await;
        assert!(obs.is_ok());

        let (adapter, _model) = make_adapter(2, true);
        let obs = adapter.classify(&Frame::blank(2, FrameSize::new(100, 100))).await;
        match obs.error {
            Some(PerceptionError::Unavailable { last, .. }) => assert!(last.contains("30ms")),
            other => unreachable!("unexpected error: {:?}", other),
        }
    }
}
