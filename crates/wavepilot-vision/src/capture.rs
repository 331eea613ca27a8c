//! 스크린 캡처.
//!
//! xcap 기반 모니터 캡처. `FrameSource` 포트 구현.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use image::RgbaImage;
use tracing::debug;
use wavepilot_core::error::CoreError;
use wavepilot_core::models::frame::{Frame, FrameSize};
use wavepilot_core::ports::perception::FrameSource;
use xcap::{Monitor, Window};

use crate::language::GameLanguage;

/// 스크린 캡처 — xcap 기반
pub struct ScreenCapture {
    /// 캡처 대상 모니터 인덱스 (None이면 주 모니터)
    monitor_index: Option<usize>,
    /// 다음 프레임 ID
    next_id: AtomicU64,
}

impl ScreenCapture {
    /// 주 모니터 캡처 인스턴스 생성
    pub fn new() -> Self {
        Self {
            monitor_index: None,
            next_id: AtomicU64::new(1),
        }
    }

    /// 특정 모니터 캡처 인스턴스 생성
    pub fn with_monitor(index: usize) -> Self {
        Self {
            monitor_index: Some(index),
            next_id: AtomicU64::new(1),
        }
    }

    /// 사용 가능한 모니터 수
    pub fn monitor_count() -> Result<usize, CoreError> {
        Monitor::all()
            .map(|m| m.len())
            .map_err(|e| CoreError::Capture(format!("모니터 목록 조회 실패: {e}")))
    }

    fn capture_blocking(index: Option<usize>) -> Result<(RgbaImage, Option<String>), CoreError> {
        let monitors = Monitor::all()
            .map_err(|e| CoreError::Capture(format!("모니터 목록 조회 실패: {e}")))?;

        let monitor = match index {
            Some(i) => monitors
                .into_iter()
                .nth(i)
                .ok_or_else(|| CoreError::Capture(format!("모니터 인덱스 {i} 없음")))?,
            None => {
                let mut monitors = monitors;
                let primary = monitors
                    .iter()
                    .position(|m| m.is_primary().unwrap_or(false))
                    .unwrap_or(0);
                if monitors.is_empty() {
                    return Err(CoreError::Capture("모니터를 찾을 수 없음".to_string()));
                }
                monitors.swap_remove(primary)
            }
        };

        let image = monitor
            .capture_image()
            .map_err(|e| CoreError::Capture(format!("스크린 캡처 실패: {e}")))?;

        Ok((image, game_window_title()))
    }
}

/// 게임 창 제목 탐색 (언어 판별 가능한 첫 창)
fn game_window_title() -> Option<String> {
    Window::all()
        .ok()?
        .into_iter()
        .filter_map(|w| w.title().ok())
        .find(|title| GameLanguage::from_window_title(title) != GameLanguage::Unknown)
}

impl Default for ScreenCapture {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FrameSource for ScreenCapture {
    async fn capture(&self) -> Result<Frame, CoreError> {
        let index = self.monitor_index;
        let (image, title) = tokio::task::spawn_blocking(move || Self::capture_blocking(index))
            .await
            .map_err(|e| CoreError::Internal(format!("캡처 작업 실패: {e}")))??;

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let size = FrameSize::new(image.width(), image.height());
        debug!(frame_id = id, width = size.width, height = size.height, "스크린 캡처 완료");

        let mut frame = Frame::new(id, size, Arc::from(image.into_raw()));
        if let Some(title) = title {
            frame = frame.with_window_title(title);
        }
        Ok(frame)
    }
}
