//! 기록된 인식 결과 재생.
//!
//! 실제 비전 모델 없이 스케줄러를 구동할 때 사용한다 (dry-run, 통합 테스트).
//! 입력 형식: 프레임별 인식 결과 배열의 JSON 배열.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, info};
use wavepilot_core::error::{CoreError, PerceptionError};
use wavepilot_core::models::detection::Detection;
use wavepilot_core::models::frame::{Frame, FrameSize};
use wavepilot_core::ports::perception::{FrameSource, Perception};

/// 기록 재생 비전 모델
///
/// 호출마다 다음 프레임의 결과를 반환하고, 기록이 끝나면 빈 결과를 반환한다.
pub struct ReplayPerception {
    frames: Mutex<VecDeque<Vec<Detection>>>,
}

impl ReplayPerception {
    pub fn new(frames: Vec<Vec<Detection>>) -> Self {
        Self {
            frames: Mutex::new(frames.into()),
        }
    }

    pub fn from_json(json: &str) -> Result<Self, CoreError> {
        let frames: Vec<Vec<Detection>> = serde_json::from_str(json)?;
        Ok(Self::new(frames))
    }

    pub fn load(path: &Path) -> Result<Self, CoreError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            CoreError::Config(format!("재생 파일 읽기 실패 ({}): {e}", path.display()))
        })?;
        let replay = Self::from_json(&content)?;
        info!(path = %path.display(), frames = replay.remaining(), "인식 기록 로드");
        Ok(replay)
    }

    /// 남은 프레임 수
    pub fn remaining(&self) -> usize {
        self.frames.lock().len()
    }
}

#[async_trait]
impl Perception for ReplayPerception {
    async fn detect(&self, frame: &Frame) -> Result<Vec<Detection>, PerceptionError> {
        let next = self.frames.lock().pop_front();
        match next {
            Some(detections) => Ok(detections
                .into_iter()
                .map(|d| Detection {
                    source_frame_id: frame.id,
                    ..d
                })
                .collect()),
            None => {
                debug!(frame_id = frame.id, "인식 기록 소진");
                Ok(Vec::new())
            }
        }
    }

    fn name(&self) -> &str {
        "replay"
    }
}

/// 픽셀 없는 프레임 소스 (캡처 없이 구동할 때)
pub struct BlankFrameSource {
    size: FrameSize,
    next_id: AtomicU64,
    window_title: Option<Arc<str>>,
}

impl BlankFrameSource {
    pub fn new(size: FrameSize) -> Self {
        Self {
            size,
            next_id: AtomicU64::new(1),
            window_title: None,
        }
    }

    pub fn with_window_title(mut self, title: &str) -> Self {
        self.window_title = Some(Arc::from(title));
        self
    }
}

#[async_trait]
impl FrameSource for BlankFrameSource {
    async fn capture(&self) -> Result<Frame, CoreError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut frame = Frame::blank(id, self.size);
        if let Some(title) = &self.window_title {
            frame = frame.with_window_title(title.as_ref());
        }
        Ok(frame)
    }
}
