//! 프레임(스크린샷) 및 화면 좌표 모델.
//!
//! 캡처 파이프라인이 생성한 프레임은 불변이며, 인식 어댑터가 읽기 전용으로 소비한다.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 캡처된 프레임 (RGBA8 픽셀 + 메타데이터)
#[derive(Debug, Clone)]
pub struct Frame {
    /// 단조 증가 프레임 ID
    pub id: u64,
    /// 캡처 시각
    pub captured_at: DateTime<Utc>,
    /// 프레임 크기
    pub size: FrameSize,
    /// RGBA8 픽셀 데이터
    pub pixels: Arc<[u8]>,
    /// 대상 창 제목 (언어 판별용)
    pub window_title: Option<String>,
}

impl Frame {
    /// 새 프레임 생성
    pub fn new(id: u64, size: FrameSize, pixels: Arc<[u8]>) -> Self {
        Self {
            id,
            captured_at: Utc::now(),
            size,
            pixels,
            window_title: None,
        }
    }

    /// 창 제목 지정
    pub fn with_window_title(mut self, title: impl Into<String>) -> Self {
        self.window_title = Some(title.into());
        self
    }

    /// 픽셀 데이터 없는 빈 프레임 (테스트, 시뮬레이션용)
    pub fn blank(id: u64, size: FrameSize) -> Self {
        Self::new(id, size, Arc::from(Vec::new()))
    }
}

/// 프레임 크기 (픽셀)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

impl FrameSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// 전체 화면 영역
    pub fn full_rect(&self) -> Rect {
        Rect::new(0, 0, self.width, self.height)
    }
}

/// 화면 좌표 직사각형 영역
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    /// 좌상단 X 좌표
    pub x: i32,
    /// 좌상단 Y 좌표
    pub y: i32,
    /// 너비
    pub width: u32,
    /// 높이
    pub height: u32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// 영역의 중심 좌표 반환
    pub fn center(&self) -> (i32, i32) {
        (
            self.x + self.width as i32 / 2,
            self.y + self.height as i32 / 2,
        )
    }

    /// 지정 좌표가 영역 내에 있는지 확인
    pub fn contains(&self, px: i32, py: i32) -> bool {
        px >= self.x
            && px < self.x + self.width as i32
            && py >= self.y
            && py < self.y + self.height as i32
    }

    /// 다른 영역이 이 영역 안에 완전히 포함되는지 확인
    pub fn encloses(&self, other: &Rect) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.x + other.width as i32 <= self.x + self.width as i32
            && other.y + other.height as i32 <= self.y + self.height as i32
    }

    /// 두 영역이 겹치는지 확인
    pub fn intersects(&self, other: &Rect) -> bool {
        self.x < other.x + other.width as i32
            && other.x < self.x + self.width as i32
            && self.y < other.y + other.height as i32
            && other.y < self.y + self.height as i32
    }
}

/// 기준 영역 대비 비율 좌표 (0.0 ~ 1.0)
///
/// 해상도와 무관하게 UI 위치를 기술할 때 사용한다.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RelativeRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl RelativeRect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// 단일 지점 (크기 0)
    pub fn point(x: f32, y: f32) -> Self {
        Self::new(x, y, 0.0, 0.0)
    }

    /// 프레임 전체 기준 절대 좌표로 변환
    pub fn to_absolute(&self, size: FrameSize) -> Rect {
        self.within(&size.full_rect())
    }

    /// 기준 영역 안의 절대 좌표로 변환
    pub fn within(&self, base: &Rect) -> Rect {
        let bw = base.width as f32;
        let bh = base.height as f32;
        Rect {
            x: base.x + (self.x * bw).round() as i32,
            y: base.y + (self.y * bh).round() as i32,
            width: (self.width * bw).round().max(0.0) as u32,
            height: (self.height * bh).round().max(0.0) as u32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rect_center_and_contains() {
        let r = Rect::new(10, 20, 100, 50);
        assert_eq!(r.center(), (60, 45));
        assert!(r.contains(10, 20));
        assert!(!r.contains(110, 20));
    }

    #[test]
    fn rect_encloses_and_intersects() {
        let outer = Rect::new(0, 0, 100, 100);
        let inner = Rect::new(10, 10, 20, 20);
        let apart = Rect::new(200, 200, 5, 5);
        assert!(outer.encloses(&inner));
        assert!(!inner.encloses(&outer));
        assert!(outer.intersects(&inner));
        assert!(!outer.intersects(&apart));
    }

    #[test]
    fn relative_rect_to_absolute() {
        let size = FrameSize::new(1920, 1080);
        let r = RelativeRect::new(0.5, 0.5, 0.1, 0.2).to_absolute(size);
        assert_eq!(r, Rect::new(960, 540, 192, 216));
    }

    #[test]
    fn relative_rect_within_detection() {
        let base = Rect::new(100, 100, 40, 20);
        let r = RelativeRect::new(1.0, 0.0, 2.0, 1.0).within(&base);
        assert_eq!(r, Rect::new(140, 100, 80, 20));
    }
}
