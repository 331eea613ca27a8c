//! 틱 컨텍스트.
//!
//! 스케줄러가 틱마다 구성해 태스크, 실행기, 전투 시퀀서에 참조로 넘긴다.
//! 전역 상태는 없다.

use wavepilot_automation::executor::StepContext;
use wavepilot_core::models::action::PredicateInput;
use wavepilot_core::models::detection::Observation;
use wavepilot_core::models::scene::Scene;
use wavepilot_core::models::task::{TaskId, TaskStatus};

use crate::task::TaskInstance;

/// 한 틱 동안 읽기 전용으로 공유되는 상태
#[derive(Debug, Clone)]
pub struct SchedulerContext<'a> {
    pub tick: u64,
    /// 확정 장면 (디바운스 후)
    pub scene: &'a Scene,
    pub observation: &'a Observation,
    /// 이번 틱 중재 후 포그라운드 점유자
    pub foreground: Option<TaskId>,
    pub tick_interval_ms: u64,
}

impl<'a> SchedulerContext<'a> {
    pub fn predicate_input(&self) -> PredicateInput<'a> {
        PredicateInput {
            scene: self.scene,
            detections: &self.observation.detections,
            stamina: self.observation.stamina,
            echo: self.observation.echo.as_ref(),
        }
    }

    /// 실행기용 컨텍스트
    pub fn step_context<'b>(&'b self, task_id: &'b TaskId) -> StepContext<'b> {
        StepContext {
            tick: self.tick,
            task_id,
            scene: self.scene,
            observation: self.observation,
        }
    }

    /// 트리거 활성 가능 여부
    ///
    /// Unknown 장면에서는 어떤 트리거도 활성되지 않는다.
    pub fn trigger_eligible(&self, instance: &TaskInstance) -> bool {
        if !instance.is_trigger() || !instance.enabled || self.scene.is_unknown() {
            return false;
        }
        if instance.status != TaskStatus::Idle
            || instance.in_cooldown(self.tick)
        {
            return false;
        }
        instance
            .descriptor
            .activation
            .as_ref()
            .is_some_and(|p| p.holds(&self.predicate_input()))
    }
}
