//! 관측 소스 구현.
//!
//! - `InlinePerception`: 스케줄러 틱 안에서 캡처 → 인식을 직접 수행
//! - `PerceptionLane`: 별도 워커가 주기적으로 캡처/인식하고
//!   최신 관측만 단일 슬롯(`watch`) 버퍼에 게시. 오래된 관측은 버려진다.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use wavepilot_core::error::PerceptionError;
use wavepilot_core::models::detection::Observation;
use wavepilot_core::ports::perception::{FrameSource, ObservationSource};

use crate::adapter::PerceptionAdapter;

// ============================================================
// InlinePerception
// ============================================================

/// 틱 내 동기 인식
pub struct InlinePerception {
    source: Arc<dyn FrameSource>,
    adapter: Arc<PerceptionAdapter>,
}

impl InlinePerception {
    pub fn new(source: Arc<dyn FrameSource>, adapter: Arc<PerceptionAdapter>) -> Self {
        Self { source, adapter }
    }
}

#[async_trait]
impl ObservationSource for InlinePerception {
    async fn observe(&mut self) -> Observation {
        match self.source.capture().await {
            Ok(frame) => self.adapter.classify(&frame).await,
            Err(e) => {
                warn!(error = %e, "프레임 캡처 실패");
                Observation::failed(PerceptionError::Capture(e.to_string()))
            }
        }
    }
}

// ============================================================
// PerceptionLane
// ============================================================

/// 최신 프레임 인식 워커
pub struct PerceptionLane {
    latest: watch::Receiver<Option<Arc<Observation>>>,
    handle: JoinHandle<()>,
}

impl PerceptionLane {
    /// 워커 시작
    pub fn spawn(
        source: Arc<dyn FrameSource>,
        adapter: Arc<PerceptionAdapter>,
        period: Duration,
        mut shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        let (tx, rx) = watch::channel(None);

        let handle = tokio::spawn(async move {
            let mut inline = InlinePerception::new(source, adapter);
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        let observation = inline.observe().await;
                        debug!(frame_id = ?observation.frame_id, "최신 관측 게시");
                        if tx.send(Some(Arc::new(observation))).is_err() {
                            break;
                        }
                    }
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            info!("인식 워커 종료");
                            break;
                        }
                    }
                }
            }
        });

        Self { latest: rx, handle }
    }

    /// 가장 최근 게시된 관측
    pub fn latest(&self) -> Option<Arc<Observation>> {
        self.latest.borrow().clone()
    }

    /// 새 관측이 게시될 때까지 대기
    pub async fn changed(&mut self) -> bool {
        self.latest.changed().await.is_ok()
    }
}

impl Drop for PerceptionLane {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[async_trait]
impl ObservationSource for PerceptionLane {
    /// 최신 관측 반환. 새 관측이 없으면 직전 관측을 `repeated`로 표시해 다시 넘긴다.
    async fn observe(&mut self) -> Observation {
        let fresh = self.latest.has_changed().unwrap_or(false);
        let latest = self.latest.borrow_and_update().clone();
        match latest {
            Some(observation) => {
                let mut observation = (*observation).clone();
                observation.repeated = !fresh;
                observation
            }
            None => Observation::failed(PerceptionError::Unavailable {
                attempts: 0,
                last: "아직 게시된 관측 없음".to_string(),
            }),
        }
    }
}
