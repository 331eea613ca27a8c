//! 인식 결과 모델.
//!
//! `Detection`은 프레임 단위로 생성되며 이후 변경되지 않는다.
//! `Observation`은 한 인식 사이클의 결과 묶음이다.

use serde::{Deserialize, Serialize};

use super::echo::EchoProfile;
use super::frame::{FrameSize, Rect};
use crate::error::PerceptionError;

/// 인식 소스 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionKind {
    /// 템플릿 매칭
    Template,
    /// OCR 텍스트 영역
    Ocr,
    /// 객체 탐지 모델 박스
    Object,
}

/// 단일 인식 결과
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// 인식 소스
    pub kind: DetectionKind,
    /// 레이블 (템플릿 이름, OCR 텍스트, 객체 클래스)
    pub label: String,
    /// 신뢰도 (0.0 ~ 1.0)
    pub confidence: f32,
    /// 화면 좌표 영역
    pub region: Rect,
    /// 원본 프레임 ID
    pub source_frame_id: u64,
}

impl Detection {
    /// 새 인식 결과 생성 (신뢰도는 [0, 1]로 클램프)
    pub fn new(
        kind: DetectionKind,
        label: impl Into<String>,
        confidence: f32,
        region: Rect,
        source_frame_id: u64,
    ) -> Self {
        let confidence = if confidence.is_nan() {
            0.0
        } else {
            confidence.clamp(0.0, 1.0)
        };
        Self {
            kind,
            label: label.into(),
            confidence,
            region,
            source_frame_id,
        }
    }

    /// 템플릿 매칭 결과 단축 생성자
    pub fn template(label: impl Into<String>, confidence: f32, region: Rect, frame: u64) -> Self {
        Self::new(DetectionKind::Template, label, confidence, region, frame)
    }

    /// OCR 결과 단축 생성자
    pub fn ocr(text: impl Into<String>, confidence: f32, region: Rect, frame: u64) -> Self {
        Self::new(DetectionKind::Ocr, text, confidence, region, frame)
    }
}

/// 레이블로 가장 신뢰도 높은 인식 결과 탐색
pub fn best_by_label<'a>(detections: &'a [Detection], label: &str) -> Option<&'a Detection> {
    detections
        .iter()
        .filter(|d| d.label == label)
        .max_by(|a, b| {
            a.confidence
                .partial_cmp(&b.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        })
}

/// 체력(스태미나) 판독 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaminaReading {
    /// 현재 스태미나
    pub current: u32,
    /// 예비 스태미나
    pub backup: u32,
}

impl StaminaReading {
    /// 합계
    pub fn total(&self) -> u32 {
        self.current + self.backup
    }
}

/// 한 인식 사이클의 결과
#[derive(Debug, Clone, Default)]
pub struct Observation {
    /// 원본 프레임 ID (캡처 실패 시 None)
    pub frame_id: Option<u64>,
    /// 프레임 크기
    pub frame_size: Option<FrameSize>,
    /// 창 제목
    pub window_title: Option<String>,
    /// 인식 결과
    pub detections: Vec<Detection>,
    /// 스태미나 판독 (OCR 결과에서 추출된 경우)
    pub stamina: Option<StaminaReading>,
    /// 에코 패널 판독 (패널이 열려 있을 때)
    pub echo: Option<EchoProfile>,
    /// 인식 실패 사유 (있으면 detections는 비어 있음)
    pub error: Option<PerceptionError>,
    /// 직전에 넘겨준 것과 같은 프레임 (인식 워커가 아직 새 결과를 내지 않음)
    pub repeated: bool,
}

impl Observation {
    /// 인식 실패 관측
    pub fn failed(error: PerceptionError) -> Self {
        Self {
            error: Some(error),
            ..Self::default()
        }
    }

    /// 인식 결과만으로 구성된 관측 (테스트, 스크립트 입력용)
    pub fn from_detections(detections: Vec<Detection>) -> Self {
        Self {
            frame_id: detections.first().map(|d| d.source_frame_id),
            detections,
            ..Self::default()
        }
    }

    /// 프레임 크기 지정
    pub fn with_frame_size(mut self, size: FrameSize) -> Self {
        self.frame_size = Some(size);
        self
    }

    /// 인식 성공 여부
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}
