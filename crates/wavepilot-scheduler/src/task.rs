//! 태스크 인스턴스 상태 기계와 재개 가능한 커서.
//!
//! 상태 전이: `Idle → Active → {Completed, Failed, Paused}`, `Paused → Active | Failed`.
//! 트리거는 호출이 끝나면 `Idle`로 돌아가 쿨다운을 시작한다 (종료 상태 없음).
//! 상태는 스케줄러만 바꾼다.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};
use wavepilot_automation::executor::{
    ActionExecutor, FrameOrigin, StepContext, StepProgress, StepResult,
};
use wavepilot_core::models::action::ActionStep;
use wavepilot_core::models::scene::Scene;
use wavepilot_core::models::task::{TaskBody, TaskDescriptor, TaskId, TaskKind, TaskStatus};

use crate::error::SchedulerEvent;

// ============================================================
// 커서
// ============================================================

/// 커서 스택의 한 프레임 (단계 목록 하나의 진행 상태)
#[derive(Debug, Clone, PartialEq)]
pub struct CursorFrame {
    pub origin: FrameOrigin,
    pub steps: Arc<[ActionStep]>,
    /// 다음에 실행할 단계
    pub index: usize,
    /// 현재 단계 실패 횟수
    pub attempts: u32,
    /// 현재 단계에서 대기한 틱 수
    pub wait_ticks: u64,
}

impl CursorFrame {
    pub fn new(origin: FrameOrigin, steps: Arc<[ActionStep]>) -> Self {
        Self {
            origin,
            steps,
            index: 0,
            attempts: 0,
            wait_ticks: 0,
        }
    }

    pub fn current(&self) -> Option<&ActionStep> {
        self.steps.get(self.index)
    }

    pub fn is_done(&self) -> bool {
        self.index >= self.steps.len()
    }

    fn advance(&mut self) {
        self.index += 1;
        self.attempts = 0;
        self.wait_ticks = 0;
    }
}

/// 전투 본문 진행 상태
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CombatCursor {
    /// 전투 UI가 연속으로 보이지 않은 틱 수
    pub ui_missing_ticks: u64,
    /// 이번 호출에서 실행한 스킬 수
    pub actions: u64,
    /// 마지막으로 판독된 활성 슬롯
    pub last_slot: Option<usize>,
    /// 재동기화 실행 횟수
    pub resyncs: u32,
}

/// 재개 가능한 태스크 커서
///
/// 선점 후 재개 시 일시정지 직전과 완전히 같은 값이어야 한다.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskCursor {
    frames: Vec<CursorFrame>,
    combat: Option<CombatCursor>,
}

impl TaskCursor {
    /// 단계 목록 커서
    pub fn for_steps(steps: Arc<[ActionStep]>) -> Self {
        Self {
            frames: vec![CursorFrame::new(FrameOrigin::Root, steps)],
            combat: None,
        }
    }

    /// 전투 본문 커서
    pub fn for_combat() -> Self {
        Self {
            frames: Vec::new(),
            combat: Some(CombatCursor::default()),
        }
    }

    pub fn frames(&self) -> &[CursorFrame] {
        &self.frames
    }

    pub fn has_frames(&self) -> bool {
        !self.frames.is_empty()
    }

    pub fn push(&mut self, frame: CursorFrame) {
        self.frames.push(frame);
    }

    pub fn combat(&self) -> Option<&CombatCursor> {
        self.combat.as_ref()
    }

    pub fn combat_mut(&mut self) -> Option<&mut CombatCursor> {
        self.combat.as_mut()
    }

    /// 루트 프레임의 단계 인덱스
    pub fn root_index(&self) -> Option<usize> {
        self.frames.first().map(|f| f.index)
    }

    /// 루트부터의 단계 인덱스 경로
    pub fn step_path(&self) -> Vec<usize> {
        self.frames.iter().map(|f| f.index).collect()
    }

    /// 끝난 프레임을 걷어내고 부모 단계를 성공 처리.
    /// 프레임이 모두 없어지면 true.
    fn unwind_finished(&mut self) -> bool {
        while let Some(top) = self.frames.last() {
            if !top.is_done() {
                return false;
            }
            self.frames.pop();
            if let Some(parent) = self.frames.last_mut() {
                parent.advance();
            }
        }
        true
    }

    /// 현재 단계 한 번 실행
    ///
    /// 실패한 단계는 `retries`만큼 재시도된다. 하위 프레임이 재시도를 소진하면
    /// 그 실패는 부모 단계(분기/하위 시퀀스)의 실패가 된다.
    pub async fn advance(
        &mut self,
        executor: &mut ActionExecutor,
        ctx: &StepContext<'_>,
        retries: u32,
        events: &mut Vec<SchedulerEvent>,
    ) -> Advance {
        if self.unwind_finished() {
            return Advance::Completed;
        }
        let Some(frame) = self.frames.last_mut() else {
            return Advance::Completed;
        };
        let steps = frame.steps.clone();
        let Some(step) = steps.get(frame.index) else {
            return Advance::Completed;
        };

        let progress = executor.execute(step, &mut frame.wait_ticks, ctx).await;
        match progress {
            StepProgress::InProgress => Advance::Waiting,
            StepProgress::Descend { origin, steps } => {
                debug!(task = %ctx.task_id, depth = self.frames.len(), "하위 단계 진입");
                self.frames.push(CursorFrame::new(origin, steps));
                Advance::Running
            }
            StepProgress::Finished(StepResult::Success) => {
                frame.advance();
                if self.unwind_finished() {
                    Advance::Completed
                } else {
                    Advance::Running
                }
            }
            StepProgress::Finished(result) => self.fail_step(result, ctx, retries, events),
        }
    }

    fn fail_step(
        &mut self,
        result: StepResult,
        ctx: &StepContext<'_>,
        retries: u32,
        events: &mut Vec<SchedulerEvent>,
    ) -> Advance {
        loop {
            let step_path = self.step_path();
            let depth = self.frames.len();
            let Some(frame) = self.frames.last_mut() else {
                return Advance::Failed(StepFailure { step_path, result });
            };
            frame.attempts += 1;
            frame.wait_ticks = 0;
            let attempt = frame.attempts;
            let will_retry = attempt <= retries;

            warn!(
                task = %ctx.task_id,
                ?step_path,
                ?result,
                attempt,
                will_retry,
                "단계 실패"
            );
            let event = match result {
                StepResult::Timeout => SchedulerEvent::StepTimeout {
                    tick: ctx.tick,
                    task: ctx.task_id.clone(),
                    step_path: step_path.clone(),
                    attempt,
                    will_retry,
                },
                _ => SchedulerEvent::StepAborted {
                    tick: ctx.tick,
                    task: ctx.task_id.clone(),
                    step_path: step_path.clone(),
                    attempt,
                    will_retry,
                },
            };
            events.push(event);

            if will_retry {
                return Advance::Running;
            }
            if depth <= 1 {
                return Advance::Failed(StepFailure { step_path, result });
            }
            self.frames.pop();
        }
    }
}

/// 한 번의 전진 결과
#[derive(Debug, Clone, PartialEq)]
pub enum Advance {
    /// 진행함 (단계 완료, 하위 진입, 재시도 예약)
    Running,
    /// 대기 중인 단계 (다음 틱에 다시 확인)
    Waiting,
    /// 모든 단계 완료
    Completed,
    /// 재시도 소진
    Failed(StepFailure),
}

/// 재시도를 소진한 단계
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepFailure {
    pub step_path: Vec<usize>,
    pub result: StepResult,
}

// ============================================================
// 태스크 인스턴스
// ============================================================

/// 일시정지 사유
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PauseReason {
    /// 더 높은 우선순위 트리거에 선점됨 (슬롯이 비면 자동 재개)
    Preempted,
    /// 외부 정지 명령 (명시적 재개 필요)
    Stopped,
    /// 스케줄러 종료
    Shutdown,
}

/// 트리거 호출 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationOutcome {
    Completed,
    Failed,
    Abandoned,
}

/// 실패 원인
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureCause {
    /// 단계 재시도 소진
    Step(StepResult),
    /// 일시정지 허용 시간 초과
    PauseExpired,
}

/// 태스크 실패 기록
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskFailure {
    pub tick: u64,
    pub cause: FailureCause,
    /// 실패 시점 커서의 단계 경로
    pub step_path: Vec<usize>,
    pub last_scene: Scene,
}

impl fmt::Display for TaskFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cause = match &self.cause {
            FailureCause::Step(StepResult::Timeout) => "단계 타임아웃",
            FailureCause::Step(StepResult::Aborted) => "단계 중단",
            FailureCause::Step(StepResult::Success) => "성공",
            FailureCause::PauseExpired => "일시정지 시간 초과",
        };
        write!(
            f,
            "{} (틱 {}, 단계 {:?}, 장면 {})",
            cause, self.tick, self.step_path, self.last_scene
        )
    }
}

/// 런타임 태스크 상태
#[derive(Debug, Clone)]
pub struct TaskInstance {
    pub descriptor: Arc<TaskDescriptor>,
    pub status: TaskStatus,
    /// 런타임 활성화 여부 (트리거 정지/재개)
    pub enabled: bool,
    pub last_run_tick: Option<u64>,
    pub cursor: TaskCursor,
    pub paused_at_tick: Option<u64>,
    pub paused_scene: Option<Scene>,
    pub pause_reason: Option<PauseReason>,
    /// 이 틱 이전에는 재발동하지 않음
    pub cooldown_until: u64,
    pub invocations: u64,
    pub last_outcome: Option<InvocationOutcome>,
    pub failure: Option<TaskFailure>,
    /// 재개 시 감지된 장면 불일치 (일시정지 당시 장면, 재개 시 장면)
    pub resume_inconsistency: Option<(Scene, Scene)>,
}

impl TaskInstance {
    pub fn new(descriptor: Arc<TaskDescriptor>) -> Self {
        let enabled = descriptor.enabled;
        Self {
            descriptor,
            status: TaskStatus::Idle,
            enabled,
            last_run_tick: None,
            cursor: TaskCursor::default(),
            paused_at_tick: None,
            paused_scene: None,
            pause_reason: None,
            cooldown_until: 0,
            invocations: 0,
            last_outcome: None,
            failure: None,
            resume_inconsistency: None,
        }
    }

    pub fn id(&self) -> &TaskId {
        &self.descriptor.id
    }

    pub fn is_trigger(&self) -> bool {
        self.descriptor.kind == TaskKind::Trigger
    }

    pub fn priority(&self) -> i32 {
        self.descriptor.priority
    }

    pub fn in_cooldown(&self, tick: u64) -> bool {
        tick < self.cooldown_until
    }

    /// 허용된 상태 전이인지
    pub fn can_transition(from: TaskStatus, to: TaskStatus) -> bool {
        use TaskStatus::*;
        matches!(
            (from, to),
            (Idle, Active)
                | (Active, Paused)
                | (Active, Completed)
                | (Active, Failed)
                | (Active, Idle)
                | (Paused, Active)
                | (Paused, Failed)
                | (Paused, Idle)
                | (Completed, Idle)
                | (Failed, Idle)
        )
    }

    fn transition(&mut self, to: TaskStatus) -> bool {
        if !Self::can_transition(self.status, to) {
            warn!(task = %self.id(), from = %self.status, %to, "허용되지 않는 상태 전이");
            return false;
        }
        debug!(task = %self.id(), from = %self.status, %to, "상태 전이");
        self.status = to;
        true
    }

    fn fresh_cursor(&self) -> TaskCursor {
        match &self.descriptor.body {
            TaskBody::Steps { steps } => TaskCursor::for_steps(Arc::from(steps.as_slice())),
            TaskBody::Combat(_) => TaskCursor::for_combat(),
        }
    }

    /// Idle → Active (새 커서로 시작)
    pub fn activate(&mut self, tick: u64) -> bool {
        if !self.transition(TaskStatus::Active) {
            return false;
        }
        self.cursor = self.fresh_cursor();
        self.invocations += 1;
        self.last_run_tick = Some(tick);
        self.resume_inconsistency = None;
        true
    }

    /// Active → Paused (커서 유지)
    pub fn pause(&mut self, tick: u64, scene: &Scene, reason: PauseReason) -> bool {
        if !self.transition(TaskStatus::Paused) {
            return false;
        }
        self.paused_at_tick = Some(tick);
        self.paused_scene = Some(scene.clone());
        self.pause_reason = Some(reason);
        true
    }

    /// Paused → Active. 일시정지 당시와 장면이 다르면 불일치를 기록해 돌려준다.
    pub fn resume(&mut self, tick: u64, scene: &Scene) -> Option<(Scene, Scene)> {
        if !self.transition(TaskStatus::Active) {
            return None;
        }
        self.last_run_tick = Some(tick);
        self.paused_at_tick = None;
        self.pause_reason = None;
        let paused_scene = self.paused_scene.take();
        self.resume_inconsistency = match paused_scene {
            Some(before) if &before != scene => Some((before, scene.clone())),
            _ => None,
        };
        self.resume_inconsistency.clone()
    }

    /// 정상 완료. One-Shot은 Completed, 트리거는 Idle + 쿨다운.
    pub fn complete(&mut self, tick: u64) {
        self.last_run_tick = Some(tick);
        if self.is_trigger() {
            self.finish_invocation(tick, InvocationOutcome::Completed);
        } else if self.transition(TaskStatus::Completed) {
            self.last_outcome = Some(InvocationOutcome::Completed);
        }
    }

    /// 실패. One-Shot은 Failed, 트리거는 Idle + 쿨다운.
    pub fn fail(&mut self, failure: TaskFailure) {
        let tick = failure.tick;
        self.failure = Some(failure);
        if self.is_trigger() {
            self.finish_invocation(tick, InvocationOutcome::Failed);
        } else if self.transition(TaskStatus::Failed) {
            self.last_outcome = Some(InvocationOutcome::Failed);
            self.paused_at_tick = None;
            self.pause_reason = None;
        }
    }

    /// 트리거 호출 종료 → Idle, `cooldown_until = tick + cooldown_ticks`
    pub fn finish_invocation(&mut self, tick: u64, outcome: InvocationOutcome) {
        if self.transition(TaskStatus::Idle) {
            self.cooldown_until = tick + self.descriptor.cooldown_ticks;
            self.last_outcome = Some(outcome);
            self.paused_at_tick = None;
            self.paused_scene = None;
            self.pause_reason = None;
        }
    }

    /// 세션 종료 또는 비활성화 시 초기화
    pub fn reset(&mut self) {
        self.status = TaskStatus::Idle;
        self.cursor = TaskCursor::default();
        self.paused_at_tick = None;
        self.paused_scene = None;
        self.pause_reason = None;
        self.cooldown_until = 0;
        self.resume_inconsistency = None;
    }

    /// 일시정지가 허용 시간을 넘었는지
    pub fn pause_expired(&self, tick: u64, max_pause_ticks: u64) -> bool {
        self.status == TaskStatus::Paused
            && self
                .paused_at_tick
                .is_some_and(|at| tick.saturating_sub(at) > max_pause_ticks)
    }
}
