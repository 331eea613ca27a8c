//! 액션 실행기.
//!
//! 선언적 `ActionStep`을 입력 이벤트로 변환한다. 한 번의 호출은 한 틱 분량의 일이며,
//! 장면 대기/고정 대기는 `StepProgress::InProgress`로 협력적으로 양보한다.
//! 분기와 하위 시퀀스는 새 단계 목록(`StepProgress::Descend`)을 돌려주고,
//! 호출자(스케줄러)가 커서 스택에 쌓는다.
//!
//! 실행기는 재시도하지 않는다. 실패는 `Timeout`/`Aborted`로 보고되며
//! 재시도 횟수는 소유 태스크가 관리한다.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use wavepilot_core::config::ms_to_ticks;
use wavepilot_core::models::action::{ActionStep, InputEvent, PredicateInput, RegionRef};
use wavepilot_core::models::catalog::Catalog;
use wavepilot_core::models::detection::{best_by_label, Observation};
use wavepilot_core::models::frame::Rect;
use wavepilot_core::models::scene::Scene;
use wavepilot_core::models::task::TaskId;
use wavepilot_core::ports::input_driver::InputDriver;

use crate::audit::InputAudit;

/// 단계 실행 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepResult {
    Success,
    Timeout,
    Aborted,
}

/// 하위 단계 목록의 출처
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameOrigin {
    /// 태스크 본문
    Root,
    /// 분기 선택 결과
    Branch,
    /// 다른 태스크의 단계 목록
    SubSequence(TaskId),
    /// 전투 재동기화 시퀀스
    Resync(TaskId),
}

/// 한 번의 실행 호출 결과
#[derive(Debug, Clone, PartialEq)]
pub enum StepProgress {
    /// 아직 진행 중 (다음 틱에 같은 단계를 다시 호출)
    InProgress,
    /// 단계 종료
    Finished(StepResult),
    /// 하위 단계 목록 진입
    Descend {
        origin: FrameOrigin,
        steps: Arc<[ActionStep]>,
    },
}

/// 단계 실행 컨텍스트 (스케줄러가 틱마다 구성)
#[derive(Debug, Clone, Copy)]
pub struct StepContext<'a> {
    pub tick: u64,
    pub task_id: &'a TaskId,
    pub scene: &'a Scene,
    pub observation: &'a Observation,
}

impl<'a> StepContext<'a> {
    pub fn predicate_input(&self) -> PredicateInput<'a> {
        PredicateInput {
            scene: self.scene,
            detections: &self.observation.detections,
            stamina: self.observation.stamina,
            echo: self.observation.echo.as_ref(),
        }
    }
}

/// 액션 실행기
pub struct ActionExecutor {
    driver: Arc<dyn InputDriver>,
    audit: InputAudit,
    rng: StdRng,
    tick_interval_ms: u64,
    default_jitter_px: u32,
    sequences: HashMap<TaskId, Arc<[ActionStep]>>,
}

impl ActionExecutor {
    /// 새 실행기 생성
    pub fn new(driver: Arc<dyn InputDriver>, tick_interval_ms: u64) -> Self {
        Self {
            driver,
            audit: InputAudit::default(),
            rng: StdRng::from_entropy(),
            tick_interval_ms,
            default_jitter_px: 0,
            sequences: HashMap::new(),
        }
    }

    /// 하위 시퀀스로 참조 가능한 단계 목록 등록 (카탈로그의 모든 Steps 태스크)
    pub fn with_catalog(mut self, catalog: &Catalog) -> Self {
        for task in &catalog.tasks {
            if let Some(steps) = task.step_list() {
                self.sequences.insert(task.id.clone(), Arc::from(steps));
            }
        }
        self
    }

    pub fn with_audit_capacity(mut self, capacity: usize) -> Self {
        self.audit = InputAudit::new(capacity);
        self
    }

    pub fn with_default_jitter(mut self, px: u32) -> Self {
        self.default_jitter_px = px;
        self
    }

    /// 결정적 jitter (테스트, 재현용)
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn audit(&self) -> &InputAudit {
        &self.audit
    }

    pub fn audit_mut(&mut self) -> &mut InputAudit {
        &mut self.audit
    }

    pub fn tick_interval_ms(&self) -> u64 {
        self.tick_interval_ms
    }

    /// 등록된 하위 시퀀스 조회
    pub fn sequence(&self, task_id: &TaskId) -> Option<Arc<[ActionStep]>> {
        self.sequences.get(task_id).cloned()
    }

    /// 단계 한 틱 분량 실행
    ///
    /// `wait_ticks`는 현재 단계에서 대기한 틱 수로, 호출자가 단계별로 보관한다.
    pub async fn execute(
        &mut self,
        step: &ActionStep,
        wait_ticks: &mut u64,
        ctx: &StepContext<'_>,
    ) -> StepProgress {
        match step {
            ActionStep::WaitForScene { scene, timeout_ms } => {
                if ctx.scene.is(scene) {
                    debug!(task = %ctx.task_id, %scene, waited = *wait_ticks, "장면 도달");
                    return StepProgress::Finished(StepResult::Success);
                }
                *wait_ticks += 1;
                let limit = ms_to_ticks(*timeout_ms, self.tick_interval_ms);
                if *wait_ticks > limit {
                    warn!(task = %ctx.task_id, %scene, current = %ctx.scene, limit, "장면 대기 시간 초과");
                    StepProgress::Finished(StepResult::Timeout)
                } else {
                    StepProgress::InProgress
                }
            }
            ActionStep::Wait { ms } => {
                let limit = ms_to_ticks(*ms, self.tick_interval_ms);
                if *wait_ticks >= limit {
                    StepProgress::Finished(StepResult::Success)
                } else {
                    *wait_ticks += 1;
                    StepProgress::InProgress
                }
            }
            ActionStep::ClickRegion {
                region,
                jitter_px,
                button,
            } => {
                let Some(rect) = self.resolve_region(region, ctx) else {
                    warn!(task = %ctx.task_id, ?region, "클릭 영역 해석 실패");
                    return StepProgress::Finished(StepResult::Aborted);
                };
                let jitter = jitter_px.unwrap_or(self.default_jitter_px);
                let (x, y) = self.jittered_point(&rect, jitter);
                let events = [
                    InputEvent::MouseMove { x, y },
                    InputEvent::MouseClick {
                        button: *button,
                        x,
                        y,
                    },
                ];
                self.dispatch_all(&events, ctx).await
            }
            ActionStep::PressKey { key, hold_ms } => {
                let down = InputEvent::KeyDown { key: key.clone() };
                if let StepProgress::Finished(StepResult::Aborted) =
                    self.dispatch_all(std::slice::from_ref(&down), ctx).await
                {
                    return StepProgress::Finished(StepResult::Aborted);
                }
                if *hold_ms > 0 {
                    tokio::time::sleep(Duration::from_millis(*hold_ms)).await;
                }
                self.dispatch_all(&[InputEvent::KeyUp { key: key.clone() }], ctx)
                    .await
            }
            ActionStep::Branch {
                condition,
                then_steps,
                else_steps,
            } => {
                let taken = condition.holds(&ctx.predicate_input());
                debug!(task = %ctx.task_id, taken, "분기 평가");
                let chosen = if taken { then_steps } else { else_steps };
                if chosen.is_empty() {
                    StepProgress::Finished(StepResult::Success)
                } else {
                    StepProgress::Descend {
                        origin: FrameOrigin::Branch,
                        steps: Arc::from(chosen.as_slice()),
                    }
                }
            }
            ActionStep::SubSequence { task_id } => match self.sequences.get(task_id) {
                Some(steps) if steps.is_empty() => StepProgress::Finished(StepResult::Success),
                Some(steps) => StepProgress::Descend {
                    origin: FrameOrigin::SubSequence(task_id.clone()),
                    steps: steps.clone(),
                },
                None => {
                    warn!(task = %ctx.task_id, sub = %task_id, "하위 시퀀스 없음");
                    StepProgress::Finished(StepResult::Aborted)
                }
            },
        }
    }

    /// 영역 참조 → 절대 좌표 영역
    fn resolve_region(&self, region: &RegionRef, ctx: &StepContext<'_>) -> Option<Rect> {
        match region {
            RegionRef::Absolute { rect } => Some(*rect),
            RegionRef::Relative { rect } => ctx
                .observation
                .frame_size
                .map(|size| rect.to_absolute(size)),
            RegionRef::Detection { label, offset } => {
                best_by_label(&ctx.observation.detections, label).map(|d| offset.within(&d.region))
            }
        }
    }

    /// 영역 중심에 jitter를 더한 좌표 (영역 안으로 제한)
    fn jittered_point(&mut self, rect: &Rect, jitter: u32) -> (i32, i32) {
        let (cx, cy) = rect.center();
        if jitter == 0 {
            return (cx, cy);
        }
        let j = jitter as i32;
        let x = cx + self.rng.gen_range(-j..=j);
        let y = cy + self.rng.gen_range(-j..=j);
        let max_x = rect.x + (rect.width as i32 - 1).max(0);
        let max_y = rect.y + (rect.height as i32 - 1).max(0);
        (x.clamp(rect.x, max_x), y.clamp(rect.y, max_y))
    }

    /// 이벤트 순차 전송 (실패 시 즉시 중단)
    async fn dispatch_all(&mut self, events: &[InputEvent], ctx: &StepContext<'_>) -> StepProgress {
        for event in events {
            if let Err(e) = self.driver.emit(event).await {
                warn!(task = %ctx.task_id, ?event, error = %e, "입력 전송 실패");
                return StepProgress::Finished(StepResult::Aborted);
            }
            self.audit.record(ctx.tick, ctx.task_id, event);
        }
        StepProgress::Finished(StepResult::Success)
    }
}
