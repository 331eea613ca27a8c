//! 장면(Scene) 모델과 장면 분류 규칙.
//!
//! 장면은 열거 가능한 이름 집합이며, 어떤 규칙도 맞지 않으면 `Scene::Unknown`이 된다.
//! `Unknown`은 어떤 `SceneId`와도 같지 않다.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::detection::{Detection, DetectionKind};
use super::frame::{FrameSize, RelativeRect};

/// 예약된 장면 이름 (설정에서 사용 불가)
pub const UNKNOWN_SCENE_NAME: &str = "unknown";

/// 설정된 장면 식별자
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SceneId(String);

impl SceneId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SceneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SceneId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// 현재 장면
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Scene {
    /// 설정된 장면
    Known(SceneId),
    /// 어떤 규칙도 일치하지 않음
    #[default]
    Unknown,
}

impl Scene {
    pub fn known(name: impl Into<String>) -> Self {
        Self::Known(SceneId::new(name))
    }

    /// 지정 장면과 일치하는지 (`Unknown`은 항상 false)
    pub fn is(&self, id: &SceneId) -> bool {
        matches!(self, Scene::Known(current) if current == id)
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Scene::Unknown)
    }

    pub fn id(&self) -> Option<&SceneId> {
        match self {
            Scene::Known(id) => Some(id),
            Scene::Unknown => None,
        }
    }
}

impl fmt::Display for Scene {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scene::Known(id) => write!(f, "{id}"),
            Scene::Unknown => f.write_str(UNKNOWN_SCENE_NAME),
        }
    }
}

fn default_min_confidence() -> f32 {
    0.8
}

fn default_confirmations() -> u32 {
    1
}

/// 인식 결과에 대한 선언적 조건
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DetectionMatcher {
    /// 레이블 일치 (종류/영역/최소 신뢰도 조건 포함)
    Label {
        label: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        kind: Option<DetectionKind>,
        #[serde(default = "default_min_confidence")]
        min_confidence: f32,
        /// 프레임 대비 검색 영역 (없으면 전체 화면)
        #[serde(default, skip_serializing_if = "Option::is_none")]
        within: Option<RelativeRect>,
    },
    /// 모든 조건 만족
    All { of: Vec<DetectionMatcher> },
    /// 하나 이상 만족
    Any { of: Vec<DetectionMatcher> },
    /// 조건 부정
    Not { matcher: Box<DetectionMatcher> },
}

impl DetectionMatcher {
    /// 레이블 조건 단축 생성자
    pub fn label(label: impl Into<String>, min_confidence: f32) -> Self {
        Self::Label {
            label: label.into(),
            kind: None,
            min_confidence,
            within: None,
        }
    }

    /// 인식 결과 집합에 대해 평가
    ///
    /// `within` 조건은 프레임 크기를 알 때만 적용된다.
    pub fn matches(&self, detections: &[Detection], frame: Option<FrameSize>) -> bool {
        match self {
            DetectionMatcher::Label {
                label,
                kind,
                min_confidence,
                within,
            } => {
                let area = match (within, frame) {
                    (Some(rel), Some(size)) => Some(rel.to_absolute(size)),
                    _ => None,
                };
                detections.iter().any(|d| {
                    d.label == *label
                        && d.confidence >= *min_confidence
                        && kind.map_or(true, |k| k == d.kind)
                        && area.map_or(true, |a| a.encloses(&d.region))
                })
            }
            DetectionMatcher::All { of } => of.iter().all(|m| m.matches(detections, frame)),
            DetectionMatcher::Any { of } => of.iter().any(|m| m.matches(detections, frame)),
            DetectionMatcher::Not { matcher } => !matcher.matches(detections, frame),
        }
    }

    /// 참조하는 모든 레이블
    pub fn labels(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_labels(&mut out);
        out
    }

    fn collect_labels<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            DetectionMatcher::Label { label, .. } => out.push(label),
            DetectionMatcher::All { of } | DetectionMatcher::Any { of } => {
                of.iter().for_each(|m| m.collect_labels(out))
            }
            DetectionMatcher::Not { matcher } => matcher.collect_labels(out),
        }
    }
}

/// 장면 분류 규칙 (선언 순서 = 우선순위)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneRule {
    /// 규칙이 만족되면 선택되는 장면
    pub scene: SceneId,
    /// 인식 결과 조건
    pub matcher: DetectionMatcher,
    /// 새 장면으로 확정되기까지 필요한 연속 승리 횟수 (K)
    #[serde(default = "default_confirmations")]
    pub confirmations: u32,
    /// 이전 틱의 인식 결과를 몇 틱까지 이어서 볼지
    #[serde(default)]
    pub carryover_ticks: u32,
}

impl SceneRule {
    pub fn new(scene: impl Into<String>, matcher: DetectionMatcher) -> Self {
        Self {
            scene: SceneId::new(scene),
            matcher,
            confirmations: default_confirmations(),
            carryover_ticks: 0,
        }
    }

    pub fn with_confirmations(mut self, k: u32) -> Self {
        self.confirmations = k;
        self
    }

    pub fn with_carryover(mut self, ticks: u32) -> Self {
        self.carryover_ticks = ticks;
        self
    }

    /// 깜빡임 방지를 위해 다회 확인이 필요한 장면인지
    pub fn is_transient(&self) -> bool {
        self.confirmations > 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::frame::Rect;

    fn det(label: &str, conf: f32, x: i32, y: i32) -> Detection {
        Detection::template(label, conf, Rect::new(x, y, 10, 10), 1)
    }

    #[test]
    fn unknown_never_equals_configured_scene() {
        let id = SceneId::new("main_menu");
        assert!(!Scene::Unknown.is(&id));
        assert!(Scene::known("main_menu").is(&id));
        assert_eq!(Scene::Unknown.to_string(), "unknown");
    }

    #[test]
    fn label_matcher_checks_confidence() {
        let m = DetectionMatcher::label("main_menu_button", 0.9);
        assert!(m.matches(&[det("main_menu_button", 0.95, 0, 0)], None));
        assert!(!m.matches(&[det("main_menu_button", 0.85, 0, 0)], None));
        assert!(!m.matches(&[], None));
    }

    #[test]
    fn label_matcher_region_filter() {
        let m = DetectionMatcher::Label {
            label: "icon".into(),
            kind: Some(DetectionKind::Template),
            min_confidence: 0.5,
            within: Some(RelativeRect::new(0.0, 0.0, 0.5, 0.5)),
        };
        let size = Some(FrameSize::new(100, 100));
        assert!(m.matches(&[det("icon", 0.9, 10, 10)], size));
        assert!(!m.matches(&[det("icon", 0.9, 80, 80)], size));
    }

    #[test]
    fn combinators() {
        let ds = vec![det("a", 0.9, 0, 0)];
        let all = DetectionMatcher::All {
            of: vec![
                DetectionMatcher::label("a", 0.5),
                DetectionMatcher::Not {
                    matcher: Box::new(DetectionMatcher::label("b", 0.5)),
                },
            ],
        };
        assert!(all.matches(&ds, None));
        let any = DetectionMatcher::Any {
            of: vec![
                DetectionMatcher::label("b", 0.5),
                DetectionMatcher::label("c", 0.5),
            ],
        };
        assert!(!any.matches(&ds, None));
        assert_eq!(all.labels(), vec!["a", "b"]);
    }

    #[test]
    fn scene_rule_deserializes_with_defaults() {
        let json = r#"{
            "scene": "loading",
            "matcher": {"type": "label", "label": "loading_bar"}
        }"#;
        let rule: SceneRule = serde_json::from_str(json).unwrap();
        assert_eq!(rule.confirmations, 1);
        assert_eq!(rule.carryover_ticks, 0);
        assert!(!rule.is_transient());
        match rule.matcher {
            DetectionMatcher::Label { min_confidence, .. } => assert_eq!(min_confidence, 0.8),
            other => unreachable!("unexpected matcher: {:?}", other),
        }
    }
}
