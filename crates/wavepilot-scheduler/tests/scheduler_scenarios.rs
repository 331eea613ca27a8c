//! 스케줄러 시나리오 통합 테스트.
//!
//! 스크립트된 관측 소스 + 기록 입력 드라이버로 틱 단위 동작을 검증한다.

use std::sync::Arc;

use assert_matches::assert_matches;
use async_trait::async_trait;
use wavepilot_automation::input_driver::RecordingInputDriver;
use wavepilot_automation::presets::builtin_catalog;
use wavepilot_core::config::AppConfig;
use wavepilot_core::error::PerceptionError;
use wavepilot_core::models::action::{ActionStep, InputEvent, Predicate};
use wavepilot_core::models::catalog::Catalog;
use wavepilot_core::models::combat::SkillTable;
use wavepilot_core::models::detection::{Detection, Observation};
use wavepilot_core::models::frame::Rect;
use wavepilot_core::models::scene::{DetectionMatcher, Scene, SceneId, SceneRule};
use wavepilot_core::models::task::{
    CombatSpec, TaskBody, TaskDescriptor, TaskId, TaskKind, TaskStatus,
};
use wavepilot_core::ports::perception::ObservationSource;
use wavepilot_scheduler::task::{FailureCause, PauseReason};
use wavepilot_scheduler::{CatalogError, Scheduler, SchedulerError, SchedulerEvent};

// ============================================================
// 헬퍼
// ============================================================

/// 틱별로 준비된 관측을 돌려주는 소스 (끝나면 마지막 관측 반복)
struct ScriptedSource {
    frames: Vec<Observation>,
    next: usize,
}

impl ScriptedSource {
    fn new(frames: Vec<Observation>) -> Self {
        Self { frames, next: 0 }
    }
}

#[async_trait]
impl ObservationSource for ScriptedSource {
    async fn observe(&mut self) -> Observation {
        let idx = self.next.min(self.frames.len().saturating_sub(1));
        self.next += 1;
        self.frames.get(idx).cloned().unwrap_or_default()
    }
}

fn det(label: &str, conf: f32) -> Detection {
    Detection::template(label, conf, Rect::new(100, 100, 40, 40), 0)
}

fn seen(labels: &[&str]) -> Observation {
    Observation::from_detections(labels.iter().map(|l| det(l, 0.95)).collect())
}

fn press(key: &str) -> ActionStep {
    ActionStep::PressKey {
        key: key.to_string(),
        hold_ms: 0,
    }
}

fn world_rule() -> SceneRule {
    SceneRule::new("world", DetectionMatcher::label("minimap", 0.8))
}

fn scheduler(catalog: Catalog, frames: Vec<Observation>) -> (Scheduler, RecordingInputDriver) {
    let driver = RecordingInputDriver::new();
    let sched = Scheduler::new(
        &AppConfig::default_config(),
        &catalog,
        Box::new(ScriptedSource::new(frames)),
        Arc::new(driver.clone()),
    )
    .unwrap()
    .with_executor_seed(7);
    (sched, driver)
}

fn pickup_catalog() -> Catalog {
    Catalog {
        scenes: vec![world_rule()],
        tasks: vec![
            TaskDescriptor::steps(
                "daily",
                TaskKind::OneShot,
                vec![press("a"), ActionStep::Wait { ms: 5_000 }, press("b")],
            ),
            TaskDescriptor::steps(
                "auto_pickup",
                TaskKind::Trigger,
                vec![press("f"), press("f"), press("f")],
            )
            .with_activation(Predicate::All {
                of: vec![
                    Predicate::scene_is("world"),
                    Predicate::Detected {
                        label: "pick_up_f".into(),
                        min_confidence: 0.8,
                    },
                ],
            })
            .with_priority(5)
            .with_cooldown(10),
        ],
        characters: vec![],
    }
}

// ============================================================
// 장면 분류
// ============================================================

#[tokio::test]
async fn main_menu_detected_on_first_tick() {
    let (mut sched, driver) = scheduler(
        builtin_catalog(),
        vec![seen(&["main_menu_button"])],
    );

    let summary = sched.tick().await;
    assert_eq!(summary.tick, 1);
    assert_eq!(summary.scene, Scene::known("main_menu"));
    assert!(summary.scene_changed);
    assert_eq!(summary.foreground, None);

    let summary = sched.tick().await;
    assert!(!summary.scene_changed);
    assert!(driver.events().is_empty());
}

#[tokio::test]
async fn perception_gap_is_unknown_and_gates_triggers() {
    let catalog = Catalog {
        scenes: vec![world_rule()],
        tasks: vec![TaskDescriptor::steps("recover", TaskKind::Trigger, vec![press("esc")])
            .with_activation(Predicate::NotDetected {
                label: "minimap".into(),
            })],
        characters: vec![],
    };
    let frames = vec![
        seen(&["minimap"]),
        seen(&["minimap"]),
        Observation::failed(PerceptionError::ModelFailure("frame dropped".into())),
        seen(&["minimap"]),
    ];
    let (mut sched, driver) = scheduler(catalog, frames);

    let summaries = sched.run_ticks(4).await;
    assert_eq!(summaries[1].scene, Scene::known("world"));
    assert!(summaries[2].perception_failed);
    assert_eq!(summaries[2].scene, Scene::Unknown);
    assert_eq!(summaries[2].foreground, None);
    assert_eq!(summaries[3].scene, Scene::known("world"));

    assert_eq!(sched.instance("recover").unwrap().invocations, 0);
    assert!(driver.events().is_empty());
}

#[tokio::test]
async fn carryover_bridges_single_failed_frame() {
    let catalog = Catalog {
        scenes: vec![world_rule().with_carryover(1)],
        tasks: vec![],
        characters: vec![],
    };
    let frames = vec![
        seen(&["minimap"]),
        Observation::failed(PerceptionError::ModelFailure("frame dropped".into())),
        Observation::default(),
    ];
    let (mut sched, _driver) = scheduler(catalog, frames);

    let summaries = sched.run_ticks(3).await;
    assert_eq!(summaries[1].scene, Scene::known("world"));
    assert!(!summaries[1].scene_changed);
    assert_eq!(summaries[2].scene, Scene::Unknown);
}

#[tokio::test]
async fn transient_scene_needs_consecutive_wins() {
    let catalog = Catalog {
        scenes: vec![
            SceneRule::new("loading", DetectionMatcher::label("loading_bar", 0.8))
                .with_confirmations(2),
            world_rule(),
        ],
        tasks: vec![],
        characters: vec![],
    };
    let frames = vec![
        seen(&["minimap"]),
        seen(&["loading_bar"]),
        seen(&["minimap"]),
        seen(&["loading_bar"]),
        seen(&["loading_bar"]),
    ];
    let (mut sched, _driver) = scheduler(catalog, frames);

    let scenes: Vec<Scene> = sched
        .run_ticks(5)
        .await
        .into_iter()
        .map(|s| s.scene)
        .collect();
    assert_eq!(
        scenes,
        vec![
            Scene::known("world"),
            Scene::known("world"),
            Scene::known("world"),
            Scene::known("world"),
            Scene::known("loading"),
        ]
    );
}

// ============================================================
// 선점 / 재개
// ============================================================

#[tokio::test]
async fn trigger_preempts_and_one_shot_resumes_in_place() {
    let mut frames: Vec<Observation> = (1..=19).map(|_| seen(&["minimap"])).collect();
    frames.push(seen(&["minimap", "pick_up_f"]));
    frames.push(seen(&["minimap"]));
    let (mut sched, _driver) = scheduler(pickup_catalog(), frames);

    sched.run_task(&TaskId::new("daily")).unwrap();
    sched.run_ticks(19).await;
    assert_eq!(sched.foreground(), Some(&TaskId::new("daily")));
    let snapshot = sched.instance("daily").unwrap().cursor.clone();
    assert_eq!(snapshot.root_index(), Some(1));

    // 틱 20: 선점
    let summary = sched.tick().await;
    assert_eq!(summary.foreground, Some(TaskId::new("auto_pickup")));
    assert_eq!(sched.instance("daily").unwrap().status, TaskStatus::Paused);
    assert_eq!(sched.paused_stack(), &[TaskId::new("daily")]);

    // 틱 21, 22: 트리거 진행, 22에서 완료
    sched.tick().await;
    let summary = sched.tick().await;
    assert_eq!(summary.tick, 22);
    assert_eq!(summary.foreground, None);
    let pickup = sched.instance("auto_pickup").unwrap();
    assert_eq!(pickup.status, TaskStatus::Idle);
    assert_eq!(pickup.cooldown_until, 32);
    assert_eq!(sched.instance("daily").unwrap().cursor, snapshot);

    // 틱 23: 같은 위치에서 재개
    let summary = sched.tick().await;
    assert_eq!(summary.foreground, Some(TaskId::new("daily")));
    let daily = sched.instance("daily").unwrap();
    assert_eq!(daily.status, TaskStatus::Active);
    assert_eq!(daily.cursor.root_index(), Some(1));
    assert_eq!(daily.resume_inconsistency, None);

    let pickup_ticks: Vec<u64> = sched
        .audit()
        .tasks_by_tick()
        .into_iter()
        .filter(|(_, tasks)| tasks.contains(&TaskId::new("auto_pickup")))
        .map(|(tick, _)| tick)
        .collect();
    assert_eq!(pickup_ticks, vec![20, 21, 22]);
    assert_eq!(
        sched.audit().events_for(&TaskId::new("auto_pickup")).len(),
        6
    );

    let events: Vec<&SchedulerEvent> = sched.events().collect();
    assert!(events.contains(&&SchedulerEvent::Preempted {
        tick: 20,
        task: TaskId::new("daily"),
        by: TaskId::new("auto_pickup"),
    }));
    assert!(events.contains(&&SchedulerEvent::Resumed {
        tick: 23,
        task: TaskId::new("daily"),
    }));
}

#[tokio::test]
async fn paused_occupant_resumes_before_lower_priority_trigger() {
    let catalog = Catalog {
        scenes: vec![world_rule()],
        tasks: vec![
            TaskDescriptor::steps(
                "daily",
                TaskKind::OneShot,
                vec![press("a"), ActionStep::Wait { ms: 5_000 }, press("b")],
            )
            .with_priority(10),
            TaskDescriptor::steps("pickup", TaskKind::Trigger, vec![press("f")])
                .with_activation(Predicate::Detected {
                    label: "pick_up_f".into(),
                    min_confidence: 0.8,
                })
                .with_priority(20)
                .with_cooldown(100),
            TaskDescriptor::steps(
                "sweep",
                TaskKind::Trigger,
                vec![press("x"), press("x"), press("x")],
            )
            .with_activation(Predicate::Detected {
                label: "junk".into(),
                min_confidence: 0.8,
            })
            .with_priority(1)
            .with_cooldown(100),
        ],
        characters: vec![],
    };
    let frames = vec![
        seen(&["minimap"]),
        seen(&["minimap", "pick_up_f"]),
        seen(&["minimap", "junk"]),
    ];
    let (mut sched, _driver) = scheduler(catalog, frames);
    sched.run_task(&TaskId::new("daily")).unwrap();

    sched.run_ticks(2).await;
    assert_eq!(sched.paused_stack(), &[TaskId::new("daily")]);

    sched.run_ticks(4).await;
    assert_eq!(sched.foreground(), Some(&TaskId::new("daily")));
    assert!(sched.paused_stack().is_empty());
    assert_eq!(sched.instance("daily").unwrap().status, TaskStatus::Active);
    assert_eq!(sched.instance("pickup").unwrap().invocations, 1);
    assert_eq!(sched.instance("sweep").unwrap().invocations, 0);
    assert!(sched.audit().events_for(&TaskId::new("sweep")).is_empty());
}

#[tokio::test]
async fn only_foreground_task_emits_input() {
    let mut frames: Vec<Observation> = Vec::new();
    for tick in 1..=40 {
        if tick % 7 == 0 {
            frames.push(seen(&["minimap", "pick_up_f"]));
        } else {
            frames.push(seen(&["minimap"]));
        }
    }
    let (mut sched, _driver) = scheduler(pickup_catalog(), frames);
    sched.run_task(&TaskId::new("daily")).unwrap();
    sched.run_ticks(40).await;

    for (tick, tasks) in sched.audit().tasks_by_tick() {
        assert_eq!(tasks.len(), 1, "틱 {tick}에 여러 태스크가 입력: {tasks:?}");
    }
}

#[tokio::test]
async fn cooldown_blocks_refire() {
    let frames: Vec<Observation> = (0..30).map(|_| seen(&["minimap", "pick_up_f"])).collect();
    let (mut sched, _driver) = scheduler(pickup_catalog(), frames);

    sched.run_ticks(30).await;
    // 1~3 실행, 13~15 실행 (쿨다운 3+10), 25~27 실행
    let pickup = sched.instance("auto_pickup").unwrap();
    assert_eq!(pickup.invocations, 3);
    assert_eq!(pickup.cooldown_until, 37);
}

#[tokio::test]
async fn equal_priority_conflict_uses_declaration_order() {
    let catalog = Catalog {
        scenes: vec![world_rule()],
        tasks: vec![
            TaskDescriptor::steps("first", TaskKind::Trigger, vec![press("1")])
                .with_activation(Predicate::scene_is("world"))
                .with_priority(3)
                .with_cooldown(100),
            TaskDescriptor::steps("second", TaskKind::Trigger, vec![press("2")])
                .with_activation(Predicate::scene_is("world"))
                .with_priority(3)
                .with_cooldown(100),
        ],
        characters: vec![],
    };
    let (mut sched, driver) = scheduler(catalog, vec![seen(&["minimap"])]);

    sched.run_ticks(2).await;
    assert_eq!(
        driver.events(),
        vec![
            InputEvent::KeyDown { key: "1".into() },
            InputEvent::KeyUp { key: "1".into() },
            InputEvent::KeyDown { key: "2".into() },
            InputEvent::KeyUp { key: "2".into() },
        ]
    );
    assert_matches!(
        sched.events().next(),
        Some(SchedulerEvent::ActivationConflict { tick: 1, chosen, deferred, priority: 3 })
            if chosen.as_str() == "first" && deferred.as_str() == "second"
    );
}

#[tokio::test]
async fn blocked_equal_priority_triggers_are_not_conflicts() {
    let chest = || Predicate::Detected {
        label: "chest".into(),
        min_confidence: 0.8,
    };
    let catalog = Catalog {
        scenes: vec![world_rule()],
        tasks: vec![
            TaskDescriptor::steps(
                "daily",
                TaskKind::OneShot,
                vec![ActionStep::Wait { ms: 5_000 }],
            )
            .with_priority(10),
            TaskDescriptor::steps("first", TaskKind::Trigger, vec![press("1")])
                .with_activation(chest())
                .with_priority(3),
            TaskDescriptor::steps("second", TaskKind::Trigger, vec![press("2")])
                .with_activation(chest())
                .with_priority(3),
        ],
        characters: vec![],
    };
    let frames = vec![seen(&["minimap"]), seen(&["minimap", "chest"])];
    let (mut sched, _driver) = scheduler(catalog, frames);
    sched.run_task(&TaskId::new("daily")).unwrap();

    sched.run_ticks(5).await;
    assert_eq!(sched.foreground(), Some(&TaskId::new("daily")));
    assert_eq!(sched.instance("first").unwrap().invocations, 0);
    assert!(!sched
        .events()
        .any(|e| matches!(e, SchedulerEvent::ActivationConflict { .. })));
}

// ============================================================
// 전투
// ============================================================

fn combat_catalog() -> Catalog {
    Catalog {
        scenes: vec![SceneRule::new(
            "in_combat",
            DetectionMatcher::label("enemy_marker", 0.8),
        )],
        tasks: vec![
            TaskDescriptor::steps("ensure_main", TaskKind::OneShot, vec![press("esc")]),
            TaskDescriptor {
                body: TaskBody::Combat(CombatSpec {
                    combat_scene: SceneId::new("in_combat"),
                    ui_labels: vec!["skill_bar".into()],
                    lost_ui_ms: Some(200),
                    actions_per_tick: 1,
                    resync_task: Some(TaskId::new("ensure_main")),
                    team: vec!["generic".into()],
                    team_labels: vec![],
                }),
                ..TaskDescriptor::steps("auto_combat", TaskKind::Trigger, vec![])
            }
            .with_activation(Predicate::scene_is("in_combat"))
            .with_priority(8)
            .with_cooldown(5),
        ],
        characters: vec![SkillTable {
            character: "generic".into(),
            skills: vec![],
            basic_attack: Some(press("j")),
        }],
    }
}

#[tokio::test]
async fn lost_combat_ui_runs_resync() {
    let frames = vec![
        seen(&["enemy_marker", "skill_bar"]),
        seen(&["enemy_marker", "skill_bar"]),
        seen(&["enemy_marker"]),
    ];
    let (mut sched, _driver) = scheduler(combat_catalog(), frames);

    sched.run_ticks(6).await;

    let keys: Vec<String> = sched
        .audit()
        .events_for(&TaskId::new("auto_combat"))
        .into_iter()
        .filter_map(|e| match e {
            InputEvent::KeyDown { key } => Some(key),
            _ => None,
        })
        .collect();
    // 틱 3, 4: UI 손실 허용 (2틱), 틱 5: 재동기화, 틱 6: 로테이션 복귀
    assert_eq!(keys, vec!["j", "j", "j", "j", "esc", "j"]);

    let combat = sched.instance("auto_combat").unwrap();
    assert_eq!(combat.status, TaskStatus::Active);
    assert_eq!(combat.cursor.combat().map(|c| c.resyncs), Some(1));
}

#[tokio::test]
async fn leaving_combat_ends_invocation() {
    let frames = vec![
        seen(&["enemy_marker", "skill_bar"]),
        seen(&["enemy_marker", "skill_bar"]),
        seen(&["minimap"]),
    ];
    let (mut sched, _driver) = scheduler(combat_catalog(), frames);

    sched.run_ticks(3).await;
    let combat = sched.instance("auto_combat").unwrap();
    assert_eq!(combat.status, TaskStatus::Idle);
    assert_eq!(combat.cooldown_until, 8);
    assert_eq!(sched.foreground(), None);
}

fn combat_keys(sched: &Scheduler) -> Vec<String> {
    sched
        .audit()
        .events_for(&TaskId::new("auto_combat"))
        .into_iter()
        .filter_map(|e| match e {
            InputEvent::KeyDown { key } => Some(key),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn combat_counts_each_skill_once() {
    let frames = vec![seen(&["enemy_marker", "skill_bar"])];
    let (mut sched, _driver) = scheduler(combat_catalog(), frames);

    sched.run_ticks(3).await;
    assert_eq!(combat_keys(&sched), vec!["j", "j", "j"]);
    let combat = sched.instance("auto_combat").unwrap();
    assert_eq!(combat.cursor.combat().map(|c| c.actions), Some(3));
}

#[tokio::test]
async fn leaving_combat_abandons_pending_skill_branch() {
    let mut catalog = combat_catalog();
    catalog.characters[0].basic_attack = Some(ActionStep::Branch {
        condition: Predicate::scene_is("in_combat"),
        then_steps: vec![press("j"), press("k"), press("l")],
        else_steps: vec![],
    });
    let frames = vec![
        seen(&["enemy_marker", "skill_bar"]),
        seen(&["enemy_marker", "skill_bar"]),
        seen(&["minimap"]),
    ];
    let (mut sched, _driver) = scheduler(catalog, frames);

    sched.run_ticks(4).await;
    // 틱 1: 분기 진입, 틱 2: j, 틱 3: 장면 이탈로 중단
    assert_eq!(combat_keys(&sched), vec!["j"]);
    let combat = sched.instance("auto_combat").unwrap();
    assert_eq!(combat.status, TaskStatus::Idle);
    assert_eq!(combat.cooldown_until, 8);
}

// ============================================================
// 명령 / 종료
// ============================================================

fn required_catalog() -> Catalog {
    Catalog {
        scenes: vec![
            world_rule(),
            SceneRule::new("main_menu", DetectionMatcher::label("main_menu_button", 0.9)),
        ],
        tasks: vec![TaskDescriptor::steps(
            "daily",
            TaskKind::OneShot,
            vec![ActionStep::WaitForScene {
                scene: SceneId::new("main_menu"),
                timeout_ms: 200,
            }],
        )
        .required()],
        characters: vec![],
    }
}

#[tokio::test]
async fn required_failure_sets_exit_code() {
    let (sched, _driver) = scheduler(required_catalog(), vec![seen(&["minimap"])]);
    let mut sched = sched.with_exit_when_idle(true);
    sched.run_task(&TaskId::new("daily")).unwrap();

    sched.run_ticks(20).await;
    assert!(sched.is_halted());

    let report = sched.report();
    assert_eq!(report.exit_code, 1);
    let outcome = report.outcome("daily").unwrap();
    assert_eq!(outcome.status, TaskStatus::Failed);
    let failure = outcome.failure.as_ref().unwrap();
    assert_matches!(failure.cause, FailureCause::Step(_));
    assert_eq!(failure.step_path, vec![0]);
    assert_eq!(failure.last_scene, Scene::known("world"));
}

#[tokio::test]
async fn handle_commands_apply_on_next_tick() {
    let (mut sched, _driver) = scheduler(required_catalog(), vec![seen(&["main_menu_button"])]);
    let handle = sched.handle();

    handle.run_task("daily").await.unwrap();
    let summary = sched.tick().await;
    assert_eq!(summary.foreground, None);
    assert_eq!(sched.instance("daily").unwrap().status, TaskStatus::Completed);

    handle.shutdown().await.unwrap();
    sched.tick().await;
    assert!(sched.is_halted());
    assert_eq!(sched.report().exit_code, 0);
}

#[tokio::test]
async fn stop_and_resume_one_shot() {
    let (mut sched, _driver) = scheduler(pickup_catalog(), vec![seen(&["minimap"])]);
    let daily = TaskId::new("daily");
    sched.run_task(&daily).unwrap();
    sched.run_ticks(3).await;

    sched.stop_task(&daily).unwrap();
    sched.run_ticks(2).await;
    assert_eq!(sched.foreground(), None);
    assert_eq!(sched.instance("daily").unwrap().status, TaskStatus::Paused);

    sched.resume_task(&daily).unwrap();
    sched.tick().await;
    assert_eq!(sched.foreground(), Some(&daily));
    assert_eq!(sched.instance("daily").unwrap().cursor.root_index(), Some(1));
}

#[tokio::test]
async fn stopped_one_shot_fails_when_not_resumed() {
    let mut catalog = pickup_catalog();
    catalog.tasks[0].max_pause_ticks = Some(5);
    let (mut sched, _driver) = scheduler(catalog, vec![seen(&["minimap"])]);
    let daily = TaskId::new("daily");
    sched.run_task(&daily).unwrap();
    sched.run_ticks(3).await;

    sched.stop_task(&daily).unwrap();
    sched.run_ticks(5).await;
    assert_eq!(sched.instance("daily").unwrap().status, TaskStatus::Paused);

    sched.run_ticks(2).await;
    let instance = sched.instance("daily").unwrap();
    assert_eq!(instance.status, TaskStatus::Failed);
    let failure = instance.failure.as_ref().unwrap();
    assert_matches!(failure.cause, FailureCause::PauseExpired);
    assert_eq!(failure.tick, 9);
    assert!(sched.events().any(|e| *e
        == SchedulerEvent::PauseExpired {
            tick: 9,
            task: daily.clone(),
        }));
}

#[tokio::test]
async fn shutdown_pauses_occupant() {
    let (mut sched, _driver) = scheduler(pickup_catalog(), vec![seen(&["minimap"])]);
    sched.run_task(&TaskId::new("daily")).unwrap();
    sched.run_ticks(2).await;
    assert_eq!(sched.foreground(), Some(&TaskId::new("daily")));

    sched.handle().shutdown().await.unwrap();
    sched.tick().await;

    assert!(sched.is_halted());
    assert_eq!(sched.foreground(), None);
    let daily = sched.instance("daily").unwrap();
    assert_eq!(daily.status, TaskStatus::Paused);
    assert_eq!(daily.pause_reason, Some(PauseReason::Shutdown));
    assert_eq!(daily.cursor.root_index(), Some(1));
    let report = sched.report();
    assert_eq!(report.outcome("daily").unwrap().status, TaskStatus::Paused);
    assert_eq!(report.exit_code, 0);
}

#[tokio::test]
async fn stop_after_current_halts_when_slot_frees() {
    let (mut sched, _driver) = scheduler(pickup_catalog(), vec![seen(&["minimap"])]);
    sched.run_task(&TaskId::new("daily")).unwrap();
    sched.tick().await;
    sched.stop_after_current();

    sched.run_ticks(100).await;
    assert!(sched.is_halted());
    assert_eq!(sched.instance("daily").unwrap().status, TaskStatus::Completed);
}

#[tokio::test]
async fn trigger_cannot_be_run_directly() {
    let (mut sched, _driver) = scheduler(pickup_catalog(), vec![seen(&["minimap"])]);
    assert_matches!(
        sched.run_task(&TaskId::new("auto_pickup")),
        Err(SchedulerError::NotOneShot(_))
    );
    assert_matches!(
        sched.run_task(&TaskId::new("missing")),
        Err(SchedulerError::UnknownTask(_))
    );
}

#[test]
fn invalid_catalog_is_rejected_before_start() {
    let mut catalog = pickup_catalog();
    catalog.tasks.push(TaskDescriptor::steps(
        "broken",
        TaskKind::OneShot,
        vec![ActionStep::SubSequence {
            task_id: TaskId::new("nowhere"),
        }],
    ));
    let result = Scheduler::new(
        &AppConfig::default_config(),
        &catalog,
        Box::new(ScriptedSource::new(vec![])),
        Arc::new(RecordingInputDriver::new()),
    );
    assert_matches!(
        result.err(),
        Some(SchedulerError::CatalogInvalid(CatalogError::UnknownSubSequence { .. }))
    );
}
