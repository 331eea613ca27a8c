//! 내장 카탈로그 프리셋.
//!
//! 카탈로그 파일이 지정되지 않았을 때 사용하는 장면 규칙, 태스크, 캐릭터 스킬 테이블.
//! 레이블 이름은 비전 모델의 템플릿/OCR 레이블과 일치해야 한다.

use wavepilot_core::models::action::{ActionStep, MouseButton, Predicate, RegionRef};
use wavepilot_core::models::catalog::Catalog;
use wavepilot_core::models::combat::{SkillEntry, SkillTable};
use wavepilot_core::models::echo::{EchoKeepRule, EntryCoef, MAX_ECHO_LEVEL};
use wavepilot_core::models::frame::RelativeRect;
use wavepilot_core::models::scene::{DetectionMatcher, SceneId, SceneRule};
use wavepilot_core::models::task::{CombatSpec, TaskBody, TaskDescriptor, TaskId, TaskKind};

/// 월정액 팝업 확인 버튼 위치 (프레임 비율)
const MONTHLY_CARD_CONFIRM: (f32, f32) = (0.50, 0.89);

/// 에코 보존 기준 (새 에코 최대 점수 대비 기대 점수 비율)
const ECHO_KEEP_THRESHOLD: f64 = 0.5;

fn press(key: &str) -> ActionStep {
    ActionStep::PressKey {
        key: key.to_string(),
        hold_ms: 0,
    }
}

fn click_relative(x: f32, y: f32) -> ActionStep {
    ActionStep::ClickRegion {
        region: RegionRef::Relative {
            rect: RelativeRect::point(x, y),
        },
        jitter_px: Some(0),
        button: MouseButton::Left,
    }
}

fn click_detection(label: &str) -> ActionStep {
    ActionStep::ClickRegion {
        region: RegionRef::Detection {
            label: label.to_string(),
            offset: RelativeRect::new(0.0, 0.0, 1.0, 1.0),
        },
        jitter_px: None,
        button: MouseButton::Left,
    }
}

fn wait_for(scene: &str, timeout_ms: u64) -> ActionStep {
    ActionStep::WaitForScene {
        scene: SceneId::new(scene),
        timeout_ms,
    }
}

fn detected(label: &str, min_confidence: f32) -> Predicate {
    Predicate::Detected {
        label: label.to_string(),
        min_confidence,
    }
}

/// 내장 장면 규칙 (선언 순서 = 우선순위)
pub fn builtin_scenes() -> Vec<SceneRule> {
    let team_visible = DetectionMatcher::Any {
        of: ["char_1_text", "char_2_text", "char_3_text"]
            .iter()
            .map(|l| DetectionMatcher::label(*l, 0.8))
            .collect(),
    };

    vec![
        SceneRule::new("login", DetectionMatcher::label("login_account", 0.7)),
        SceneRule::new("monthly_card", DetectionMatcher::label("monthly_card", 0.8)),
        // 로딩 화면은 잠깐 스쳐 지나가므로 연속 확인 필요
        SceneRule::new("loading", DetectionMatcher::label("loading_bar", 0.8)).with_confirmations(2),
        SceneRule::new(
            "dialog",
            DetectionMatcher::label("claim_cancel_button_hcenter_vcenter", 0.8),
        )
        .with_confirmations(2),
        SceneRule::new("echo_panel", DetectionMatcher::label("echo_enhance_btn", 0.8)),
        SceneRule::new(
            "in_combat",
            DetectionMatcher::Any {
                of: vec![
                    DetectionMatcher::label("combat_hp_bar", 0.7),
                    DetectionMatcher::label("boss_health", 0.7),
                ],
            },
        )
        .with_carryover(2),
        SceneRule::new("main_menu", DetectionMatcher::label("main_menu_button", 0.9)),
        SceneRule::new(
            "world",
            DetectionMatcher::All {
                of: vec![
                    DetectionMatcher::label("world_earth_icon", 0.55),
                    team_visible,
                    DetectionMatcher::Not {
                        matcher: Box::new(DetectionMatcher::label("illusive_realm_exit", 0.8)),
                    },
                ],
            },
        )
        .with_carryover(2),
    ]
}

/// 내장 태스크 목록
pub fn builtin_tasks() -> Vec<TaskDescriptor> {
    let (cx, cy) = MONTHLY_CARD_CONFIRM;
    let mut tasks = Vec::new();

    // ── 재동기화 (월드 복귀) ──

    let mut ensure_main = TaskDescriptor::steps(
        "ensure_main",
        TaskKind::OneShot,
        vec![
            ActionStep::Branch {
                condition: Predicate::scene_is("world"),
                then_steps: vec![],
                else_steps: vec![press("esc"), wait_for("world", 3_000)],
            },
            wait_for("world", 10_000),
        ],
    )
    .with_retries(2);
    ensure_main.description = "ESC로 창을 닫고 월드 화면으로 복귀".to_string();
    tasks.push(ensure_main);

    // ── 트리거 ──

    let mut monthly_card = TaskDescriptor::steps(
        "monthly_card",
        TaskKind::Trigger,
        vec![
            click_relative(cx, cy),
            ActionStep::Wait { ms: 2_000 },
            click_relative(cx, cy),
            ActionStep::Wait { ms: 2_000 },
            wait_for("world", 10_000),
        ],
    )
    .with_activation(Predicate::scene_is("monthly_card"))
    .with_priority(10)
    .with_cooldown(50);
    monthly_card.description = "월정액 팝업 수령".to_string();
    tasks.push(monthly_card);

    let mut auto_pickup = TaskDescriptor::steps(
        "auto_pickup",
        TaskKind::Trigger,
        vec![
            press("f"),
            ActionStep::Wait { ms: 800 },
            ActionStep::Branch {
                condition: detected("claim_cancel_button_hcenter_vcenter", 0.8),
                then_steps: vec![click_detection("claim_cancel_button_hcenter_vcenter")],
                else_steps: vec![],
            },
        ],
    )
    .with_activation(Predicate::All {
        of: vec![
            Predicate::scene_is("world"),
            detected("pick_up_f_hcenter_vcenter", 0.8),
        ],
    })
    .with_priority(5)
    .with_cooldown(10);
    auto_pickup.description = "F 상호작용 아이콘이 보이면 줍기".to_string();
    tasks.push(auto_pickup);

    tasks.push(TaskDescriptor {
        id: TaskId::new("auto_combat"),
        kind: TaskKind::Trigger,
        activation: Some(Predicate::scene_is("in_combat")),
        priority: 8,
        cooldown_ticks: 5,
        enabled: true,
        required: false,
        body: TaskBody::Combat(CombatSpec {
            combat_scene: SceneId::new("in_combat"),
            ui_labels: vec!["combat_hp_bar".to_string(), "boss_health".to_string()],
            lost_ui_ms: None,
            actions_per_tick: 1,
            resync_task: Some(TaskId::new("ensure_main")),
            team: vec!["generic".to_string(); 3],
            team_labels: vec![
                "char_1_text".to_string(),
                "char_2_text".to_string(),
                "char_3_text".to_string(),
            ],
        }),
        step_retries: 0,
        run_to_completion: false,
        max_pause_ticks: None,
        description: "전투 장면에서 스킬 로테이션".to_string(),
    });

    // ── One-Shot ──

    let mut daily = TaskDescriptor::steps(
        "daily",
        TaskKind::OneShot,
        vec![
            ActionStep::SubSequence {
                task_id: TaskId::new("ensure_main"),
            },
            press("f2"),
            ActionStep::Wait { ms: 1_500 },
            ActionStep::Branch {
                condition: detected("daily_claim_all", 0.8),
                then_steps: vec![click_detection("daily_claim_all"), ActionStep::Wait { ms: 1_000 }],
                else_steps: vec![],
            },
            press("esc"),
            wait_for("world", 5_000),
        ],
    )
    .with_retries(1)
    .required();
    daily.description = "일일 활동 보상 수령".to_string();
    tasks.push(daily);

    // 열린 에코 패널에서 한 개 판정: 보존 기준을 넘으면 강화 후 조율, 아니면 다음 에코로
    let keep = Predicate::EchoKeep(EchoKeepRule {
        coef: EntryCoef::default(),
        threshold: ECHO_KEEP_THRESHOLD,
        min_chance: None,
    });
    let enhance = vec![
        click_detection("echo_enhance_btn"),
        ActionStep::Wait { ms: 2_000 },
        ActionStep::Branch {
            condition: detected("echo_enhance_confirm", 0.8),
            then_steps: vec![
                click_detection("echo_enhance_confirm"),
                ActionStep::Wait { ms: 1_000 },
            ],
            else_steps: vec![],
        },
        ActionStep::Branch {
            condition: detected("red_dot", 0.8),
            then_steps: vec![click_detection("red_dot"), ActionStep::Wait { ms: 1_000 }],
            else_steps: vec![],
        },
    ];
    let mut enhance_echo = TaskDescriptor::steps(
        "enhance_echo",
        TaskKind::OneShot,
        vec![
            wait_for("echo_panel", 5_000),
            ActionStep::Branch {
                condition: keep,
                then_steps: vec![ActionStep::Branch {
                    condition: Predicate::EchoLevelBelow {
                        level: MAX_ECHO_LEVEL,
                    },
                    then_steps: enhance,
                    else_steps: vec![],
                }],
                else_steps: vec![click_detection("echo_next"), ActionStep::Wait { ms: 1_500 }],
            },
        ],
    );
    enhance_echo.description = "열린 에코를 점수로 판정해 강화 또는 넘기기".to_string();
    tasks.push(enhance_echo);

    tasks
}

/// 내장 캐릭터 스킬 테이블
pub fn builtin_characters() -> Vec<SkillTable> {
    vec![SkillTable {
        character: "generic".to_string(),
        skills: vec![
            SkillEntry {
                name: "liberation".to_string(),
                priority: 30,
                ready_label: "liberation_ready".to_string(),
                resource_label: Some("liberation_energy_full".to_string()),
                min_confidence: 0.7,
                action: press("r"),
            },
            SkillEntry {
                name: "echo".to_string(),
                priority: 20,
                ready_label: "echo_ready".to_string(),
                resource_label: None,
                min_confidence: 0.7,
                action: press("q"),
            },
            SkillEntry {
                name: "resonance_skill".to_string(),
                priority: 10,
                ready_label: "resonance_skill_ready".to_string(),
                resource_label: None,
                min_confidence: 0.7,
                action: press("e"),
            },
        ],
        basic_attack: Some(ActionStep::ClickRegion {
            region: RegionRef::Relative {
                rect: RelativeRect::point(0.5, 0.5),
            },
            jitter_px: Some(0),
            button: MouseButton::Left,
        }),
    }]
}

/// 내장 카탈로그
pub fn builtin_catalog() -> Catalog {
    Catalog {
        scenes: builtin_scenes(),
        tasks: builtin_tasks(),
        characters: builtin_characters(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_catalog_loads() {
        let catalog = builtin_catalog();
        assert_eq!(catalog.scenes.len(), 8);
        assert!(catalog.task(&TaskId::new("ensure_main")).is_some());
        assert!(catalog.character("generic").is_some());
    }

    #[test]
    fn task_ids_unique() {
        let tasks = builtin_tasks();
        let mut ids: Vec<&str> = tasks.iter().map(|t| t.id.as_str()).collect();
        let total = ids.len();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), total, "중복 태스크 ID 발견");
    }

    #[test]
    fn triggers_have_activation() {
        for task in builtin_tasks().iter().filter(|t| t.is_trigger()) {
            assert!(task.activation.is_some(), "트리거 '{}'에 활성 조건 없음", task.id);
        }
    }

    #[test]
    fn auto_pickup_matches_documented_timing() {
        let tasks = builtin_tasks();
        let pickup = tasks
            .iter()
            .find(|t| t.id.as_str() == "auto_pickup")
            .unwrap();
        assert_eq!(pickup.priority, 5);
        assert_eq!(pickup.cooldown_ticks, 10);
    }

    #[test]
    fn enhance_echo_gates_on_echo_score() {
        let tasks = builtin_tasks();
        let task = tasks
            .iter()
            .find(|t| t.id.as_str() == "enhance_echo")
            .unwrap();
        let TaskBody::Steps { steps } = &task.body else {
            unreachable!("enhance_echo는 단계 태스크");
        };
        match &steps[1] {
            ActionStep::Branch {
                condition: Predicate::EchoKeep(rule),
                ..
            } => assert_eq!(rule.threshold, ECHO_KEEP_THRESHOLD),
            other => unreachable!("unexpected step: {:?}", other),
        }
    }

    #[test]
    fn catalog_survives_json() {
        let catalog = builtin_catalog();
        let json = serde_json::to_string(&catalog).unwrap();
        let back = Catalog::from_json(&json).unwrap();
        assert_eq!(back, catalog);
    }
}
