//! 전투 시퀀서.
//!
//! 전투 장면에 있는 동안 외부 틱마다 최대 `actions_per_tick`번 스킬을 고른다.
//! 장면이 전투를 벗어나면 즉시 호출을 끝낸다. 전투 UI가 `lost_ui_ms`보다 오래 보이지 않으면
//! 로테이션을 멈추고 재동기화 시퀀스를 실행한다.
//!
//! 캐릭터별 로직은 `CharacterKit` trait 구현으로 분리되며 `CharacterRegistry`가 ID로 찾아준다.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info, warn};
use wavepilot_core::config::{ms_to_ticks, CombatConfig};
use wavepilot_core::models::action::ActionStep;
use wavepilot_core::models::catalog::Catalog;
use wavepilot_core::models::combat::{SkillEntry, SkillTable};
use wavepilot_core::models::detection::{best_by_label, Detection};
use wavepilot_core::models::scene::Scene;
use wavepilot_core::models::task::{CombatSpec, TaskId};
use wavepilot_vision::team::read_team;

use crate::task::CombatCursor;

// ============================================================
// 캐릭터 capability
// ============================================================

/// 스킬 선택 입력
#[derive(Debug, Clone, Copy)]
pub struct CombatContext<'a> {
    pub tick: u64,
    pub scene: &'a Scene,
    pub detections: &'a [Detection],
    /// 활성 파티 슬롯 (0부터)
    pub slot: usize,
    pub character: &'a str,
    /// 이번 틱에 이미 고른 액션
    pub selected: &'a [ActionStep],
}

/// 캐릭터별 스킬 선택 로직
pub trait CharacterKit: Send + Sync {
    /// 캐릭터 ID
    fn character(&self) -> &str;

    /// 다음에 실행할 스킬. 없으면 None.
    fn select_next_skill(&self, ctx: &CombatContext<'_>) -> Option<ActionStep>;
}

/// 스킬 테이블 기반 우선순위 선택
///
/// 우선순위가 높은 스킬부터 준비 아이콘과 자원 조건을 확인하고,
/// 사용할 스킬이 없으면 기본 공격을 돌려준다.
pub struct SkillPriorityKit {
    table: SkillTable,
}

impl SkillPriorityKit {
    pub fn new(table: SkillTable) -> Self {
        Self { table }
    }

    fn is_ready(entry: &SkillEntry, detections: &[Detection]) -> bool {
        let seen = |label: &str| {
            best_by_label(detections, label).is_some_and(|d| d.confidence >= entry.min_confidence)
        };
        seen(&entry.ready_label) && entry.resource_label.as_deref().map_or(true, seen)
    }
}

impl CharacterKit for SkillPriorityKit {
    fn character(&self) -> &str {
        &self.table.character
    }

    fn select_next_skill(&self, ctx: &CombatContext<'_>) -> Option<ActionStep> {
        self.table
            .ordered_skills()
            .into_iter()
            .filter(|entry| !ctx.selected.contains(&entry.action))
            .find(|entry| Self::is_ready(entry, ctx.detections))
            .map(|entry| {
                debug!(character = ctx.character, skill = %entry.name, "스킬 선택");
                entry.action.clone()
            })
            .or_else(|| self.table.basic_attack.clone())
    }
}

/// 캐릭터 ID → 스킬 선택 로직
#[derive(Clone, Default)]
pub struct CharacterRegistry {
    kits: HashMap<String, Arc<dyn CharacterKit>>,
}

impl CharacterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 카탈로그 스킬 테이블로 구성
    pub fn from_catalog(catalog: &Catalog) -> Self {
        let mut registry = Self::new();
        for table in &catalog.characters {
            registry.register(Arc::new(SkillPriorityKit::new(table.clone())));
        }
        registry
    }

    /// 구현 등록 (같은 ID는 교체)
    pub fn register(&mut self, kit: Arc<dyn CharacterKit>) {
        self.kits.insert(kit.character().to_string(), kit);
    }

    pub fn get(&self, character: &str) -> Option<&Arc<dyn CharacterKit>> {
        self.kits.get(character)
    }

    pub fn contains(&self, character: &str) -> bool {
        self.kits.contains_key(character)
    }

    pub fn len(&self) -> usize {
        self.kits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kits.is_empty()
    }
}

// ============================================================
// 시퀀서
// ============================================================

/// 한 틱의 전투 판단
#[derive(Debug, Clone, PartialEq)]
pub enum CombatDecision {
    /// 전투 장면 이탈 → 호출 종료
    Yield,
    /// 전투 UI 손실 → 재동기화 시퀀스 실행
    Resync(Arc<[ActionStep]>),
    /// 스킬 실행
    Act(Vec<ActionStep>),
    /// 이번 틱은 입력 없음
    Hold,
}

/// 전투 시퀀서
pub struct CombatSequencer {
    tick_interval_ms: u64,
    default_lost_ui_ms: u64,
    default_team: Vec<String>,
}

impl CombatSequencer {
    pub fn new(tick_interval_ms: u64, config: &CombatConfig) -> Self {
        Self {
            tick_interval_ms,
            default_lost_ui_ms: config.lost_ui_ms,
            default_team: config.team.clone(),
        }
    }

    /// 전투 UI 손실 허용 틱 수
    pub fn lost_ui_ticks(&self, spec: &CombatSpec) -> u64 {
        ms_to_ticks(
            spec.lost_ui_ms.unwrap_or(self.default_lost_ui_ms),
            self.tick_interval_ms,
        )
    }

    /// 이번 틱의 판단
    ///
    /// `resync`는 `spec.resync_task`의 단계 목록 (호출자가 해석).
    #[allow(clippy::too_many_arguments)]
    pub fn plan(
        &self,
        task_id: &TaskId,
        spec: &CombatSpec,
        cursor: &mut CombatCursor,
        characters: &CharacterRegistry,
        resync: Option<Arc<[ActionStep]>>,
        tick: u64,
        scene: &Scene,
        detections: &[Detection],
    ) -> CombatDecision {
        if !scene.is(&spec.combat_scene) {
            info!(task = %task_id, %scene, actions = cursor.actions, "전투 장면 이탈, 호출 종료");
            return CombatDecision::Yield;
        }

        if !spec.ui_labels.is_empty() {
            let visible = spec
                .ui_labels
                .iter()
                .any(|label| best_by_label(detections, label).is_some());
            if visible {
                cursor.ui_missing_ticks = 0;
            } else {
                cursor.ui_missing_ticks += 1;
            }

            let limit = self.lost_ui_ticks(spec);
            if cursor.ui_missing_ticks > limit {
                match resync {
                    Some(steps) => {
                        warn!(
                            task = %task_id,
                            missing_ticks = cursor.ui_missing_ticks,
                            limit,
                            "전투 UI 손실, 재동기화 실행"
                        );
                        cursor.ui_missing_ticks = 0;
                        cursor.resyncs += 1;
                        return CombatDecision::Resync(steps);
                    }
                    None => {
                        warn!(task = %task_id, "전투 UI 손실, 재동기화 태스크 없음 → 입력 중단");
                        return CombatDecision::Hold;
                    }
                }
            }
        }

        let team = if spec.team.is_empty() {
            &self.default_team
        } else {
            &spec.team
        };
        let state = read_team(detections, &spec.team_labels);
        let slot = state.active_slot.or(cursor.last_slot).unwrap_or(0);
        cursor.last_slot = Some(slot);

        let Some(character) = team.get(slot) else {
            debug!(task = %task_id, slot, "슬롯에 캐릭터 없음");
            return CombatDecision::Hold;
        };
        let Some(kit) = characters.get(character) else {
            warn!(task = %task_id, character = %character, "캐릭터 스킬 로직 없음");
            return CombatDecision::Hold;
        };

        let mut actions: Vec<ActionStep> = Vec::new();
        for _ in 0..spec.actions_per_tick.max(1) {
            let ctx = CombatContext {
                tick,
                scene,
                detections,
                slot,
                character,
                selected: &actions,
            };
            match kit.select_next_skill(&ctx) {
                Some(step) => actions.push(step),
                None => break,
            }
        }

        if actions.is_empty() {
            CombatDecision::Hold
        } else {
            cursor.actions += actions.len() as u64;
            CombatDecision::Act(actions)
        }
    }
}
