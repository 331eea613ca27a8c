//! 선언적 액션 단계, 조건식, 입력 이벤트 모델.
//!
//! `ActionStep`은 카탈로그에서 작성된 뒤 변경되지 않는다.
//! 실행기는 단계를 입력 이벤트(`InputEvent`)로 변환한다.

use serde::{Deserialize, Serialize};

use super::detection::{best_by_label, Detection, StaminaReading};
use super::echo::{EchoKeepRule, EchoProfile, StatTable};
use super::frame::{Rect, RelativeRect};
use super::scene::{Scene, SceneId};
use super::task::TaskId;

// ============================================================
// 입력 이벤트
// ============================================================

/// 마우스 버튼 유형
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MouseButton {
    #[default]
    Left,
    Right,
    Middle,
}

impl MouseButton {
    pub fn as_str(&self) -> &'static str {
        match self {
            MouseButton::Left => "left",
            MouseButton::Right => "right",
            MouseButton::Middle => "middle",
        }
    }
}

/// 입력 드라이버로 전달되는 저수준 이벤트
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputEvent {
    /// 마우스 이동
    MouseMove { x: i32, y: i32 },
    /// 마우스 클릭
    MouseClick { button: MouseButton, x: i32, y: i32 },
    /// 키 누름
    KeyDown { key: String },
    /// 키 놓음
    KeyUp { key: String },
}

// ============================================================
// 영역 참조
// ============================================================

fn default_offset() -> RelativeRect {
    RelativeRect::new(0.0, 0.0, 1.0, 1.0)
}

/// 클릭 대상 영역
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RegionRef {
    /// 화면 절대 좌표
    Absolute { rect: Rect },
    /// 프레임 대비 비율 좌표
    Relative { rect: RelativeRect },
    /// 인식된 요소 기준 상대 영역 (가장 신뢰도 높은 결과 사용)
    Detection {
        label: String,
        #[serde(default = "default_offset")]
        offset: RelativeRect,
    },
}

// ============================================================
// 조건식
// ============================================================

/// 조건식 평가 입력
#[derive(Debug, Clone, Copy)]
pub struct PredicateInput<'a> {
    pub scene: &'a Scene,
    pub detections: &'a [Detection],
    pub stamina: Option<StaminaReading>,
    pub echo: Option<&'a EchoProfile>,
}

/// 트리거 활성 조건 및 분기 조건
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Predicate {
    /// 현재 장면이 지정 장면
    SceneIs { scene: SceneId },
    /// 현재 장면이 목록 중 하나
    SceneIn { scenes: Vec<SceneId> },
    /// 레이블이 최소 신뢰도 이상으로 인식됨
    Detected {
        label: String,
        #[serde(default)]
        min_confidence: f32,
    },
    /// 레이블이 인식되지 않음
    NotDetected { label: String },
    /// 스태미나 합계가 지정값 이상 (판독 실패 시 false)
    StaminaAtLeast { amount: u32 },
    /// 열린 에코가 보존 기준을 만족 (패널 판독 실패 시 false)
    EchoKeep(EchoKeepRule),
    /// 열린 에코의 강화 레벨이 지정값 미만
    EchoLevelBelow { level: u8 },
    All { of: Vec<Predicate> },
    Any { of: Vec<Predicate> },
    Not { predicate: Box<Predicate> },
}

impl Predicate {
    pub fn scene_is(scene: impl Into<String>) -> Self {
        Self::SceneIs {
            scene: SceneId::new(scene),
        }
    }

    /// 조건 평가. `Unknown` 장면은 어떤 장면 조건과도 일치하지 않는다.
    pub fn holds(&self, input: &PredicateInput<'_>) -> bool {
        match self {
            Predicate::SceneIs { scene } => input.scene.is(scene),
            Predicate::SceneIn { scenes } => scenes.iter().any(|s| input.scene.is(s)),
            Predicate::Detected {
                label,
                min_confidence,
            } => best_by_label(input.detections, label)
                .is_some_and(|d| d.confidence >= *min_confidence),
            Predicate::NotDetected { label } => best_by_label(input.detections, label).is_none(),
            Predicate::StaminaAtLeast { amount } => {
                input.stamina.is_some_and(|s| s.total() >= *amount)
            }
            Predicate::EchoKeep(rule) => input
                .echo
                .is_some_and(|echo| rule.keeps(echo, StatTable::builtin())),
            Predicate::EchoLevelBelow { level } => input.echo.is_some_and(|e| e.level < *level),
            Predicate::All { of } => of.iter().all(|p| p.holds(input)),
            Predicate::Any { of } => of.iter().any(|p| p.holds(input)),
            Predicate::Not { predicate } => !predicate.holds(input),
        }
    }

    /// 참조하는 장면 ID 수집
    pub fn scene_refs<'a>(&'a self, out: &mut Vec<&'a SceneId>) {
        match self {
            Predicate::SceneIs { scene } => out.push(scene),
            Predicate::SceneIn { scenes } => out.extend(scenes.iter()),
            Predicate::All { of } | Predicate::Any { of } => {
                of.iter().for_each(|p| p.scene_refs(out))
            }
            Predicate::Not { predicate } => predicate.scene_refs(out),
            Predicate::Detected { .. }
            | Predicate::NotDetected { .. }
            | Predicate::StaminaAtLeast { .. }
            | Predicate::EchoKeep(_)
            | Predicate::EchoLevelBelow { .. } => {}
        }
    }
}

// ============================================================
// 액션 단계
// ============================================================

/// 선언적 액션 단계
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionStep {
    /// 지정 장면이 될 때까지 대기
    WaitForScene { scene: SceneId, timeout_ms: u64 },
    /// 영역 클릭 (jitter_px 이내 무작위 오프셋, 영역 안으로 제한)
    ClickRegion {
        region: RegionRef,
        /// 없으면 설정의 기본값
        #[serde(default, skip_serializing_if = "Option::is_none")]
        jitter_px: Option<u32>,
        #[serde(default)]
        button: MouseButton,
    },
    /// 키 입력 (hold_ms 동안 누름)
    PressKey {
        key: String,
        #[serde(default)]
        hold_ms: u64,
    },
    /// 조건 분기
    Branch {
        condition: Predicate,
        #[serde(default)]
        then_steps: Vec<ActionStep>,
        #[serde(default)]
        else_steps: Vec<ActionStep>,
    },
    /// 다른 태스크의 단계 목록 실행
    SubSequence { task_id: TaskId },
    /// 고정 대기
    Wait { ms: u64 },
}

impl ActionStep {
    /// 단계 종류 이름 (로그용)
    pub fn kind_name(&self) -> &'static str {
        match self {
            ActionStep::WaitForScene { .. } => "wait_for_scene",
            ActionStep::ClickRegion { .. } => "click_region",
            ActionStep::PressKey { .. } => "press_key",
            ActionStep::Branch { .. } => "branch",
            ActionStep::SubSequence { .. } => "sub_sequence",
            ActionStep::Wait { .. } => "wait",
        }
    }

    /// 입력 이벤트를 발생시키는 단계인지
    pub fn emits_input(&self) -> bool {
        matches!(
            self,
            ActionStep::ClickRegion { .. } | ActionStep::PressKey { .. }
        )
    }

    /// 단계(하위 분기 포함)가 참조하는 장면 ID 수집
    pub fn scene_refs<'a>(&'a self, out: &mut Vec<&'a SceneId>) {
        match self {
            ActionStep::WaitForScene { scene, .. } => out.push(scene),
            ActionStep::Branch {
                condition,
                then_steps,
                else_steps,
            } => {
                condition.scene_refs(out);
                then_steps
                    .iter()
                    .chain(else_steps.iter())
                    .for_each(|s| s.scene_refs(out));
            }
            _ => {}
        }
    }

    /// 단계(하위 분기 포함)가 참조하는 하위 시퀀스 태스크 ID 수집
    pub fn subsequence_refs<'a>(&'a self, out: &mut Vec<&'a TaskId>) {
        match self {
            ActionStep::SubSequence { task_id } => out.push(task_id),
            ActionStep::Branch {
                then_steps,
                else_steps,
                ..
            } => then_steps
                .iter()
                .chain(else_steps.iter())
                .for_each(|s| s.subsequence_refs(out)),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input<'a>(scene: &'a Scene, detections: &'a [Detection]) -> PredicateInput<'a> {
        PredicateInput {
            scene,
            detections,
            stamina: None,
            echo: None,
        }
    }

    #[test]
    fn scene_predicates_never_match_unknown() {
        let p = Predicate::SceneIn {
            scenes: vec![SceneId::new("world"), SceneId::new("main_menu")],
        };
        assert!(!p.holds(&input(&Scene::Unknown, &[])));
        assert!(p.holds(&input(&Scene::known("world"), &[])));
    }

    #[test]
    fn detection_predicates() {
        let ds = vec![Detection::template(
            "pickup_prompt",
            0.7,
            Rect::new(0, 0, 5, 5),
            3,
        )];
        let scene = Scene::known("world");
        let hit = Predicate::Detected {
            label: "pickup_prompt".into(),
            min_confidence: 0.6,
        };
        let strict = Predicate::Detected {
            label: "pickup_prompt".into(),
            min_confidence: 0.9,
        };
        let absent = Predicate::NotDetected {
            label: "dialog_box".into(),
        };
        assert!(hit.holds(&input(&scene, &ds)));
        assert!(!strict.holds(&input(&scene, &ds)));
        assert!(absent.holds(&input(&scene, &ds)));
    }

    #[test]
    fn stamina_predicate_requires_reading() {
        let scene = Scene::known("world");
        let p = Predicate::StaminaAtLeast { amount: 60 };
        assert!(!p.holds(&input(&scene, &[])));
        let with = PredicateInput {
            scene: &scene,
            detections: &[],
            stamina: Some(StaminaReading {
                current: 40,
                backup: 20,
            }),
            echo: None,
        };
        assert!(p.holds(&with));
    }

    #[test]
    fn echo_predicates_read_open_panel() {
        use crate::models::echo::{EntryCoef, StatKey};

        let scene = Scene::known("echo_panel");
        let keep = Predicate::EchoKeep(EchoKeepRule {
            coef: EntryCoef::default(),
            threshold: 0.5,
            min_chance: None,
        });
        let below_max = Predicate::EchoLevelBelow { level: 25 };
        assert!(!keep.holds(&input(&scene, &[])));
        assert!(!below_max.holds(&input(&scene, &[])));

        let crit = EchoProfile::new(10)
            .with_stat(StatKey::CriRate, 9.9)
            .with_stat(StatKey::CriDmg, 19.8);
        let with = PredicateInput {
            echo: Some(&crit),
            ..input(&scene, &[])
        };
        assert!(keep.holds(&with));
        assert!(below_max.holds(&with));

        let json = r#"{"type": "echo_keep", "threshold": 0.5}"#;
        let parsed: Predicate = serde_json::from_str(json).unwrap();
        assert_eq!(parsed, keep);
    }

    #[test]
    fn step_deserializes_from_tagged_json() {
        let json = r#"[
            {"type": "wait_for_scene", "scene": "world", "timeout_ms": 5000},
            {"type": "click_region", "region": {"type": "relative", "rect": {"x": 0.5, "y": 0.89, "width": 0.0, "height": 0.0}}},
            {"type": "press_key", "key": "esc"},
            {"type": "sub_sequence", "task_id": "ensure_main"}
        ]"#;
        let steps: Vec<ActionStep> = serde_json::from_str(json).unwrap();
        assert_eq!(steps.len(), 4);
        match &steps[1] {
            ActionStep::ClickRegion {
                jitter_px, button, ..
            } => {
                assert_eq!(*jitter_px, None);
                assert_eq!(*button, MouseButton::Left);
            }
            other => unreachable!("unexpected step: {:?}", other),
        }
        let mut subs = Vec::new();
        steps.iter().for_each(|s| s.subsequence_refs(&mut subs));
        assert_eq!(subs, vec![&TaskId::new("ensure_main")]);
    }

    #[test]
    fn branch_collects_nested_scene_refs() {
        let step = ActionStep::Branch {
            condition: Predicate::scene_is("dialog"),
            then_steps: vec![ActionStep::WaitForScene {
                scene: SceneId::new("world"),
                timeout_ms: 100,
            }],
            else_steps: vec![],
        };
        let mut refs = Vec::new();
        step.scene_refs(&mut refs);
        assert_eq!(refs, vec![&SceneId::new("dialog"), &SceneId::new("world")]);
    }
}
