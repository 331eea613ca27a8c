//! 스태미나 OCR 판독.
//!
//! 스태미나 영역의 OCR 결과에서 `현재/최대` 형식은 현재 스태미나로,
//! 단독 숫자는 예비 스태미나로 해석한다.

use once_cell::sync::Lazy;
use regex::Regex;
use wavepilot_core::models::detection::{Detection, DetectionKind, StaminaReading};
use wavepilot_core::models::frame::{FrameSize, RelativeRect};

static STAMINA_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d+)/(\d+)$").unwrap_or_else(|e| unreachable!("정적 정규식 오류: {e}"))
});
static NUMBER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+$").unwrap_or_else(|e| unreachable!("정적 정규식 오류: {e}")));

/// 화면 상단 우측 스태미나 표시 영역
pub const STAMINA_REGION: RelativeRect = RelativeRect {
    x: 0.49,
    y: 0.0,
    width: 0.43,
    height: 0.10,
};

/// OCR 결과에서 스태미나 판독
///
/// 프레임 크기를 알면 `STAMINA_REGION` 밖의 결과는 무시한다.
/// 해석 가능한 결과가 하나도 없으면 None.
pub fn read_stamina(detections: &[Detection], frame: Option<FrameSize>) -> Option<StaminaReading> {
    let area = frame.map(|size| STAMINA_REGION.to_absolute(size));
    let boxes: Vec<&Detection> = detections
        .iter()
        .filter(|d| d.kind == DetectionKind::Ocr)
        .filter(|d| area.map_or(true, |a| a.encloses(&d.region)))
        .collect();

    let current = boxes.iter().find_map(|d| {
        STAMINA_RE
            .captures(d.label.trim())
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse::<u32>().ok())
    });
    let backup = boxes.iter().find_map(|d| {
        let text = d.label.trim();
        if NUMBER_RE.is_match(text) {
            text.parse::<u32>().ok()
        } else {
            None
        }
    });

    if current.is_none() && backup.is_none() {
        return None;
    }
    Some(StaminaReading {
        current: current.unwrap_or(0),
        backup: backup.unwrap_or(0),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use wavepilot_core::models::frame::Rect;

    fn ocr(text: &str, x: i32, y: i32) -> Detection {
        Detection::ocr(text, 0.9, Rect::new(x, y, 40, 20), 1)
    }

    #[test]
    fn reads_current_and_backup() {
        let ds = vec![ocr("180/240", 1200, 30), ocr("60", 1500, 30)];
        let reading = read_stamina(&ds, Some(FrameSize::new(1920, 1080))).unwrap();
        assert_eq!(reading.current, 180);
        assert_eq!(reading.backup, 60);
        assert_eq!(reading.total(), 240);
    }

    #[test]
    fn missing_backup_defaults_to_zero() {
        let reading = read_stamina(&[ocr("35/240", 1200, 30)], None).unwrap();
        assert_eq!(reading.current, 35);
        assert_eq!(reading.backup, 0);
    }

    #[test]
    fn ignores_text_outside_region_and_templates() {
        let ds = vec![
            ocr("180/240", 10, 900),
            Detection::template("60", 0.9, Rect::new(1200, 30, 10, 10), 1),
        ];
        assert!(read_stamina(&ds, Some(FrameSize::new(1920, 1080))).is_none());
    }
}
