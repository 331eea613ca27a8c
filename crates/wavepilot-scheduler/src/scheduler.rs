//! 스케줄러 루프.
//!
//! 틱마다 순서대로:
//! 1. 외부 명령 처리
//! 2. 관측 → 장면 분류 (디바운스)
//! 3. 일시정지 만료 처리
//! 4. 트리거 평가 → 포그라운드 슬롯 중재 (선점, LIFO 재개, 대기 One-Shot 시작)
//! 5. 포그라운드 태스크 한 단계 전진
//!
//! 입력은 포그라운드 점유자만 보낼 수 있다. 한 틱에 실행기는 한 번만 전진한다
//! (`run_to_completion` 트리거와 전투 스킬 묶음은 예외).

use std::cmp::Reverse;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};
use wavepilot_automation::audit::InputAudit;
use wavepilot_automation::executor::{
    ActionExecutor, FrameOrigin, StepContext, StepProgress, StepResult,
};
use wavepilot_core::config::AppConfig;
use wavepilot_core::models::catalog::Catalog;
use wavepilot_core::models::detection::Observation;
use wavepilot_core::models::scene::Scene;
use wavepilot_core::models::task::{
    CombatSpec, TaskBody, TaskDescriptor, TaskId, TaskKind, TaskStatus,
};
use wavepilot_core::ports::input_driver::InputDriver;
use wavepilot_core::ports::perception::ObservationSource;
use wavepilot_vision::scene_classifier::SceneClassifier;

use crate::combat::{CharacterKit, CharacterRegistry, CombatDecision, CombatSequencer};
use crate::context::SchedulerContext;
use crate::error::{SchedulerError, SchedulerEvent};
use crate::foreground::ForegroundSlot;
use crate::registry::TaskRegistry;
use crate::task::{
    Advance, CursorFrame, FailureCause, InvocationOutcome, PauseReason, TaskFailure, TaskInstance,
};

/// 명령 채널 버퍼
const COMMAND_BUFFER: usize = 64;
/// 보관할 운영 이벤트 수
const EVENT_LOG_CAPACITY: usize = 1024;
/// `run_to_completion` 트리거가 한 틱에 전진할 수 있는 최대 단계 수
const RUN_TO_COMPLETION_LIMIT: usize = 64;

// ============================================================
// 명령 / 핸들
// ============================================================

/// 외부 명령
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerCommand {
    /// One-Shot 실행 요청 (대기열 추가)
    RunTask(TaskId),
    /// 태스크 정지 (트리거는 비활성화)
    StopTask(TaskId),
    /// 정지된 태스크 재개 (트리거는 재활성화)
    ResumeTask(TaskId),
    /// 현재 태스크가 끝나면 정지
    StopAfterCurrent,
    /// 즉시 종료
    Shutdown,
}

/// 다른 태스크에서 스케줄러에 명령을 보내는 핸들
#[derive(Debug, Clone)]
pub struct SchedulerHandle {
    tx: mpsc::Sender<SchedulerCommand>,
}

impl SchedulerHandle {
    pub async fn send(&self, command: SchedulerCommand) -> Result<(), SchedulerError> {
        self.tx
            .send(command)
            .await
            .map_err(|_| SchedulerError::ChannelClosed)
    }

    pub async fn run_task(&self, id: impl Into<String>) -> Result<(), SchedulerError> {
        self.send(SchedulerCommand::RunTask(TaskId::new(id))).await
    }

    pub async fn stop_task(&self, id: impl Into<String>) -> Result<(), SchedulerError> {
        self.send(SchedulerCommand::StopTask(TaskId::new(id))).await
    }

    pub async fn resume_task(&self, id: impl Into<String>) -> Result<(), SchedulerError> {
        self.send(SchedulerCommand::ResumeTask(TaskId::new(id))).await
    }

    pub async fn stop_after_current(&self) -> Result<(), SchedulerError> {
        self.send(SchedulerCommand::StopAfterCurrent).await
    }

    pub async fn shutdown(&self) -> Result<(), SchedulerError> {
        self.send(SchedulerCommand::Shutdown).await
    }
}

// ============================================================
// 보고서
// ============================================================

/// 태스크별 최종 상태
#[derive(Debug, Clone, PartialEq)]
pub struct TaskOutcome {
    pub task_id: TaskId,
    pub kind: TaskKind,
    pub status: TaskStatus,
    pub required: bool,
    pub invocations: u64,
    pub failure: Option<TaskFailure>,
}

/// 세션 종료 보고서
#[derive(Debug, Clone)]
pub struct SchedulerReport {
    pub ticks: u64,
    pub outcomes: Vec<TaskOutcome>,
    pub events: Vec<SchedulerEvent>,
    /// 0: 정상, 1: 필수 태스크 실패
    pub exit_code: i32,
}

impl SchedulerReport {
    pub fn outcome(&self, id: &str) -> Option<&TaskOutcome> {
        self.outcomes.iter().find(|o| o.task_id.as_str() == id)
    }

    /// 실패한 필수 태스크
    pub fn required_failures(&self) -> impl Iterator<Item = &TaskOutcome> {
        self.outcomes
            .iter()
            .filter(|o| o.required && o.status == TaskStatus::Failed)
    }
}

/// 트리거 평가 결과: 선택된 트리거와 같은 우선순위로 밀린 트리거
struct TriggerPick {
    chosen: usize,
    tied: Vec<usize>,
}

/// 한 틱 요약
#[derive(Debug, Clone, PartialEq)]
pub struct TickSummary {
    pub tick: u64,
    pub scene: Scene,
    pub scene_changed: bool,
    /// 틱 종료 시점 포그라운드 점유자
    pub foreground: Option<TaskId>,
    pub perception_failed: bool,
}

// ============================================================
// 스케줄러
// ============================================================

/// 장면 기반 태스크 스케줄러
pub struct Scheduler {
    tick_interval_ms: u64,
    max_pause_ticks: u64,
    registry: TaskRegistry,
    instances: Vec<TaskInstance>,
    classifier: SceneClassifier,
    source: Box<dyn ObservationSource>,
    executor: ActionExecutor,
    characters: CharacterRegistry,
    sequencer: CombatSequencer,
    slot: ForegroundSlot,
    /// 시작 대기 중인 One-Shot (FIFO)
    queue: VecDeque<TaskId>,
    /// 이번 세션에 실행 요청된 One-Shot
    requested: Vec<TaskId>,
    command_tx: mpsc::Sender<SchedulerCommand>,
    command_rx: mpsc::Receiver<SchedulerCommand>,
    tick: u64,
    scene: Scene,
    stop_after_current: bool,
    exit_when_idle: bool,
    halted: bool,
    events: VecDeque<SchedulerEvent>,
}

impl Scheduler {
    /// 스케줄러 생성 (카탈로그 검증 포함)
    pub fn new(
        config: &AppConfig,
        catalog: &Catalog,
        source: Box<dyn ObservationSource>,
        driver: Arc<dyn InputDriver>,
    ) -> Result<Self, SchedulerError> {
        config.validate()?;
        let registry = TaskRegistry::build(catalog, &config.combat.team)?;
        let instances = registry
            .iter()
            .map(|d| TaskInstance::new(d.clone()))
            .collect();

        let tick_interval_ms = config.scheduler.tick_interval_ms;
        let classifier = SceneClassifier::new(
            catalog.scenes.clone(),
            config.perception.staleness_ticks,
            config.perception.unknown_confirmations,
        );
        let executor = ActionExecutor::new(driver, tick_interval_ms)
            .with_catalog(catalog)
            .with_audit_capacity(config.scheduler.audit_capacity)
            .with_default_jitter(config.input.default_jitter_px);
        let characters = CharacterRegistry::from_catalog(catalog);
        let sequencer = CombatSequencer::new(tick_interval_ms, &config.combat);
        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);

        info!(
            tasks = registry.len(),
            scenes = catalog.scenes.len(),
            characters = characters.len(),
            tick_ms = tick_interval_ms,
            "스케줄러 구성 완료"
        );

        Ok(Self {
            tick_interval_ms,
            max_pause_ticks: config.ms_to_ticks(config.scheduler.max_pause_ms),
            registry,
            instances,
            classifier,
            source,
            executor,
            characters,
            sequencer,
            slot: ForegroundSlot::new(),
            queue: VecDeque::new(),
            requested: Vec::new(),
            command_tx,
            command_rx,
            tick: 0,
            scene: Scene::Unknown,
            stop_after_current: false,
            exit_when_idle: false,
            halted: false,
            events: VecDeque::new(),
        })
    }

    /// 좌표 지터 난수 시드 고정
    pub fn with_executor_seed(mut self, seed: u64) -> Self {
        self.executor = self.executor.with_seed(seed);
        self
    }

    /// 요청된 One-Shot이 모두 끝나고 슬롯이 비면 정지
    pub fn with_exit_when_idle(mut self, enabled: bool) -> Self {
        self.exit_when_idle = enabled;
        self
    }

    /// 캐릭터 스킬 로직 등록 (카탈로그 기본 로직 대체)
    pub fn register_kit(&mut self, kit: Arc<dyn CharacterKit>) {
        self.characters.register(kit);
    }

    pub fn handle(&self) -> SchedulerHandle {
        SchedulerHandle {
            tx: self.command_tx.clone(),
        }
    }

    pub fn current_tick(&self) -> u64 {
        self.tick
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn foreground(&self) -> Option<&TaskId> {
        self.slot.occupant()
    }

    pub fn paused_stack(&self) -> &[TaskId] {
        self.slot.paused()
    }

    pub fn instance(&self, id: &str) -> Option<&TaskInstance> {
        self.registry
            .position(&TaskId::new(id))
            .and_then(|i| self.instances.get(i))
    }

    pub fn instances(&self) -> &[TaskInstance] {
        &self.instances
    }

    pub fn audit(&self) -> &InputAudit {
        self.executor.audit()
    }

    pub fn events(&self) -> impl Iterator<Item = &SchedulerEvent> {
        self.events.iter()
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    fn index_of(&self, id: &TaskId) -> Result<usize, SchedulerError> {
        self.registry
            .position(id)
            .ok_or_else(|| SchedulerError::UnknownTask(id.clone()))
    }

    fn push_events(&mut self, events: impl IntoIterator<Item = SchedulerEvent>) {
        for event in events {
            if self.events.len() >= EVENT_LOG_CAPACITY {
                self.events.pop_front();
            }
            self.events.push_back(event);
        }
    }

    // ============================================================
    // 명령
    // ============================================================

    /// One-Shot 실행 요청
    ///
    /// 이미 끝난 태스크는 초기화 후 다시 대기열에 들어간다.
    pub fn run_task(&mut self, id: &TaskId) -> Result<(), SchedulerError> {
        let idx = self.index_of(id)?;
        let instance = &mut self.instances[idx];
        if instance.is_trigger() {
            return Err(SchedulerError::NotOneShot(id.clone()));
        }
        if !instance.enabled {
            return Err(SchedulerError::Disabled(id.clone()));
        }
        match instance.status {
            TaskStatus::Idle if self.queue.contains(id) => {
                return Err(SchedulerError::InvalidState {
                    task: id.clone(),
                    status: instance.status,
                    command: "실행 요청",
                });
            }
            TaskStatus::Idle => {}
            TaskStatus::Completed | TaskStatus::Failed => {
                instance.reset();
                instance.failure = None;
            }
            status @ (TaskStatus::Active | TaskStatus::Paused) => {
                return Err(SchedulerError::InvalidState {
                    task: id.clone(),
                    status,
                    command: "실행 요청",
                });
            }
        }

        self.queue.push_back(id.clone());
        if !self.requested.contains(id) {
            self.requested.push(id.clone());
        }
        info!(task = %id, queued = self.queue.len(), "One-Shot 실행 요청");
        Ok(())
    }

    /// 태스크 정지
    ///
    /// 트리거는 비활성화되고 진행 중 호출은 포기된다.
    /// One-Shot은 `Paused(Stopped)`가 되어 자동 재개 대상에서 빠진다.
    pub fn stop_task(&mut self, id: &TaskId) -> Result<(), SchedulerError> {
        let idx = self.index_of(id)?;
        let tick = self.tick;
        let occupying = self.slot.is_occupied_by(id);

        if self.instances[idx].is_trigger() {
            let instance = &mut self.instances[idx];
            instance.enabled = false;
            if matches!(instance.status, TaskStatus::Active | TaskStatus::Paused) {
                instance.finish_invocation(tick, InvocationOutcome::Abandoned);
            }
            if occupying {
                self.slot.release();
            }
            self.slot.remove_paused(id);
            info!(task = %id, "트리거 비활성화");
            return Ok(());
        }

        let status = self.instances[idx].status;
        match status {
            TaskStatus::Active if occupying => {
                let scene = self.scene.clone();
                self.instances[idx].pause(tick, &scene, PauseReason::Stopped);
                self.slot.release();
            }
            TaskStatus::Paused => {
                self.slot.remove_paused(id);
                self.instances[idx].pause_reason = Some(PauseReason::Stopped);
            }
            TaskStatus::Idle if self.queue.contains(id) => {
                self.queue.retain(|q| q != id);
            }
            _ => {
                return Err(SchedulerError::InvalidState {
                    task: id.clone(),
                    status,
                    command: "정지",
                })
            }
        }
        info!(task = %id, "태스크 정지");
        Ok(())
    }

    /// 정지된 태스크 재개
    ///
    /// 트리거는 다시 활성화되고, One-Shot은 일시정지 스택 맨 위로 올라간다.
    pub fn resume_task(&mut self, id: &TaskId) -> Result<(), SchedulerError> {
        let idx = self.index_of(id)?;
        let instance = &mut self.instances[idx];
        if instance.is_trigger() {
            instance.enabled = true;
            info!(task = %id, "트리거 재활성화");
            return Ok(());
        }
        if instance.status != TaskStatus::Paused {
            return Err(SchedulerError::InvalidState {
                task: id.clone(),
                status: instance.status,
                command: "재개",
            });
        }
        instance.pause_reason = Some(PauseReason::Preempted);
        self.slot.push_paused(id.clone());
        info!(task = %id, "재개 예약");
        Ok(())
    }

    /// 현재 태스크가 끝나면 정지 (새 태스크는 시작하지 않음)
    pub fn stop_after_current(&mut self) {
        info!(foreground = ?self.slot.occupant(), "현재 태스크 완료 후 정지 예약");
        self.stop_after_current = true;
    }

    /// 즉시 종료. 점유자는 `Paused(Shutdown)`으로 남는다.
    pub fn shutdown(&mut self) {
        if self.halted {
            return;
        }
        if let Some(id) = self.slot.release() {
            if let Ok(idx) = self.index_of(&id) {
                let scene = self.scene.clone();
                self.instances[idx].pause(self.tick, &scene, PauseReason::Shutdown);
                info!(task = %id, "종료로 태스크 일시정지");
            }
        }
        self.halted = true;
        info!(tick = self.tick, "스케줄러 정지");
    }

    fn apply_command(&mut self, command: SchedulerCommand) {
        debug!(?command, "명령 수신");
        let result = match &command {
            SchedulerCommand::RunTask(id) => self.run_task(id),
            SchedulerCommand::StopTask(id) => self.stop_task(id),
            SchedulerCommand::ResumeTask(id) => self.resume_task(id),
            SchedulerCommand::StopAfterCurrent => {
                self.stop_after_current();
                Ok(())
            }
            SchedulerCommand::Shutdown => {
                self.shutdown();
                Ok(())
            }
        };
        if let Err(e) = result {
            warn!(?command, "명령 거부: {e}");
        }
    }

    fn drain_commands(&mut self) {
        while let Ok(command) = self.command_rx.try_recv() {
            self.apply_command(command);
            if self.halted {
                break;
            }
        }
    }

    // ============================================================
    // 틱
    // ============================================================

    /// 한 틱 실행
    pub async fn tick(&mut self) -> TickSummary {
        if self.halted {
            return self.summary(false, false);
        }
        self.tick += 1;
        let tick = self.tick;

        self.drain_commands();
        if self.halted {
            return self.summary(false, false);
        }

        let observation = self.source.observe().await;
        let perception_failed = observation.error.is_some();
        if let Some(err) = &observation.error {
            warn!(tick, "인식 실패, 빈 결과로 진행: {err}");
        }

        let verdict = self.classifier.classify_observation(tick, &observation);
        let scene = verdict.scene;
        self.scene = scene.clone();

        self.expire_pauses(tick, &scene);
        let winner = self.evaluate_triggers(tick, &scene, &observation);
        self.arbitrate(tick, &scene, winner);
        self.advance_foreground(tick, &scene, &observation).await;
        self.check_halt();

        self.summary(verdict.changed, perception_failed)
    }

    fn summary(&self, scene_changed: bool, perception_failed: bool) -> TickSummary {
        TickSummary {
            tick: self.tick,
            scene: self.scene.clone(),
            scene_changed,
            foreground: self.slot.occupant().cloned(),
            perception_failed,
        }
    }

    /// 최대 `ticks`틱 실행 (정지되면 중단)
    pub async fn run_ticks(&mut self, ticks: u64) -> Vec<TickSummary> {
        let mut summaries = Vec::new();
        for _ in 0..ticks {
            if self.halted {
                break;
            }
            summaries.push(self.tick().await);
        }
        summaries
    }

    /// 종료 신호나 정지 조건까지 고정 주기로 실행
    pub async fn run(mut self, mut shutdown_rx: watch::Receiver<bool>) -> SchedulerReport {
        info!(tick_ms = self.tick_interval_ms, "스케줄러 루프 시작");
        let mut interval = tokio::time::interval(Duration::from_millis(self.tick_interval_ms));
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.tick().await;
                    if self.halted {
                        break;
                    }
                }
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        info!("종료 신호 수신");
                        self.shutdown();
                        break;
                    }
                }
            }
        }

        let report = self.report();
        info!(
            ticks = report.ticks,
            exit_code = report.exit_code,
            "스케줄러 루프 종료"
        );
        report
    }

    /// 현재 상태 보고서
    pub fn report(&self) -> SchedulerReport {
        let outcomes: Vec<TaskOutcome> = self
            .instances
            .iter()
            .map(|inst| TaskOutcome {
                task_id: inst.id().clone(),
                kind: inst.descriptor.kind,
                status: inst.status,
                required: inst.descriptor.required,
                invocations: inst.invocations,
                failure: inst.failure.clone(),
            })
            .collect();
        let exit_code = if outcomes
            .iter()
            .any(|o| o.required && o.status == TaskStatus::Failed)
        {
            1
        } else {
            0
        };
        SchedulerReport {
            ticks: self.tick,
            outcomes,
            events: self.events.iter().cloned().collect(),
            exit_code,
        }
    }

    // ============================================================
    // 일시정지 만료
    // ============================================================

    fn expire_pauses(&mut self, tick: u64, scene: &Scene) {
        for idx in 0..self.instances.len() {
            let limit = self.instances[idx]
                .descriptor
                .max_pause_ticks
                .unwrap_or(self.max_pause_ticks);
            if !self.instances[idx].pause_expired(tick, limit) {
                continue;
            }

            let id = self.instances[idx].id().clone();
            self.slot.remove_paused(&id);
            self.push_events([SchedulerEvent::PauseExpired {
                tick,
                task: id.clone(),
            }]);

            let instance = &mut self.instances[idx];
            if instance.is_trigger() {
                warn!(task = %id, limit, "트리거 일시정지 시간 초과, 호출 포기");
                instance.finish_invocation(tick, InvocationOutcome::Abandoned);
            } else {
                let failure = TaskFailure {
                    tick,
                    cause: FailureCause::PauseExpired,
                    step_path: instance.cursor.step_path(),
                    last_scene: scene.clone(),
                };
                if instance.descriptor.required {
                    error!(task = %id, "필수 태스크 실패: {failure}");
                } else {
                    warn!(task = %id, "태스크 실패: {failure}");
                }
                instance.fail(failure);
            }
        }
    }

    // ============================================================
    // 트리거 평가 / 중재
    // ============================================================

    /// 활성 가능한 트리거 중 가장 높은 우선순위 (같으면 선언 순서)
    fn evaluate_triggers(
        &self,
        tick: u64,
        scene: &Scene,
        observation: &Observation,
    ) -> Option<TriggerPick> {
        let ctx = SchedulerContext {
            tick,
            scene,
            observation,
            foreground: self.slot.occupant().cloned(),
            tick_interval_ms: self.tick_interval_ms,
        };
        let mut eligible: Vec<usize> = (0..self.instances.len())
            .filter(|&i| ctx.trigger_eligible(&self.instances[i]))
            .collect();
        // 안정 정렬: 같은 우선순위는 선언 순서 유지
        eligible.sort_by_key(|&i| Reverse(self.instances[i].priority()));

        let chosen = *eligible.first()?;
        let priority = self.instances[chosen].priority();
        let tied = eligible[1..]
            .iter()
            .copied()
            .take_while(|&i| self.instances[i].priority() == priority)
            .collect();
        Some(TriggerPick { chosen, tied })
    }

    /// 일시정지 스택에서 다음에 재개될 태스크의 우선순위
    fn next_paused_priority(&self) -> Option<(TaskId, i32)> {
        self.slot.paused().iter().rev().find_map(|id| {
            let idx = self.registry.position(id)?;
            let instance = &self.instances[idx];
            (instance.status == TaskStatus::Paused).then(|| (id.clone(), instance.priority()))
        })
    }

    /// 선택된 트리거가 실제로 활성화된 틱에만 동순위 충돌 기록
    fn record_conflicts(&mut self, tick: u64, pick: &TriggerPick) {
        let chosen = self.instances[pick.chosen].id().clone();
        let priority = self.instances[pick.chosen].priority();
        let conflicts: Vec<SchedulerEvent> = pick
            .tied
            .iter()
            .map(|&i| {
                let deferred = self.instances[i].id().clone();
                warn!(tick, %chosen, %deferred, priority, "같은 우선순위 트리거 동시 활성");
                SchedulerEvent::ActivationConflict {
                    tick,
                    chosen: chosen.clone(),
                    deferred,
                    priority,
                }
            })
            .collect();
        self.push_events(conflicts);
    }

    fn arbitrate(&mut self, tick: u64, scene: &Scene, winner: Option<TriggerPick>) {
        if let Some(pick) = winner {
            let w = pick.chosen;
            let winner_id = self.instances[w].id().clone();
            let priority = self.instances[w].priority();
            let activated = match self.slot.occupant().cloned() {
                // 빈 슬롯이어도 일시정지 스택 맨 위가 실질 점유자
                None => match self.next_paused_priority() {
                    Some((paused, paused_priority)) if priority <= paused_priority => {
                        debug!(
                            tick,
                            task = %winner_id,
                            %paused,
                            "트리거 대기: 일시정지된 태스크 재개가 우선"
                        );
                        false
                    }
                    _ => {
                        let claimed = self.instances[w].activate(tick)
                            && self.slot.claim(winner_id.clone()).is_ok();
                        if claimed {
                            info!(tick, task = %winner_id, %scene, "트리거 활성");
                        }
                        claimed
                    }
                },
                Some(occupant) => {
                    let Some(oi) = self.registry.position(&occupant) else {
                        self.slot.release();
                        return;
                    };
                    if priority > self.instances[oi].priority() {
                        self.instances[oi].pause(tick, scene, PauseReason::Preempted);
                        self.instances[w].activate(tick);
                        self.slot.preempt(winner_id.clone());
                        info!(tick, task = %winner_id, paused = %occupant, "선점");
                        self.push_events([SchedulerEvent::Preempted {
                            tick,
                            task: occupant,
                            by: winner_id,
                        }]);
                        true
                    } else {
                        debug!(
                            tick,
                            task = %winner_id,
                            occupant = %occupant,
                            "트리거 대기: 점유자 우선순위가 같거나 높음"
                        );
                        false
                    }
                }
            };
            if activated {
                self.record_conflicts(tick, &pick);
            }
        }

        if !self.slot.is_free() {
            return;
        }

        // LIFO 재개
        while let Some(paused) = self.slot.pop_paused() {
            let Some(pi) = self.registry.position(&paused) else {
                continue;
            };
            if self.instances[pi].status != TaskStatus::Paused {
                continue;
            }
            let inconsistency = self.instances[pi].resume(tick, scene);
            if self.slot.claim(paused.clone()).is_err() {
                return;
            }
            info!(tick, task = %paused, "재개");
            self.push_events([SchedulerEvent::Resumed {
                tick,
                task: paused.clone(),
            }]);
            if let Some((before, now)) = inconsistency {
                warn!(tick, task = %paused, %before, %now, "일시정지 중 장면 변경, 그대로 재개");
                self.push_events([SchedulerEvent::ResumeInconsistency {
                    tick,
                    task: paused,
                    paused_scene: before,
                    current_scene: now,
                }]);
            }
            return;
        }

        if self.stop_after_current {
            return;
        }

        while let Some(queued) = self.queue.pop_front() {
            let Some(qi) = self.registry.position(&queued) else {
                continue;
            };
            if self.instances[qi].status != TaskStatus::Idle || !self.instances[qi].enabled {
                continue;
            }
            if self.instances[qi].activate(tick) && self.slot.claim(queued.clone()).is_ok() {
                info!(tick, task = %queued, %scene, "One-Shot 시작");
            }
            return;
        }
    }

    // ============================================================
    // 전진
    // ============================================================

    async fn advance_foreground(&mut self, tick: u64, scene: &Scene, observation: &Observation) {
        let Some(id) = self.slot.occupant().cloned() else {
            return;
        };
        let Some(idx) = self.registry.position(&id) else {
            self.slot.release();
            return;
        };
        let descriptor = self.instances[idx].descriptor.clone();
        let ctx = SchedulerContext {
            tick,
            scene,
            observation,
            foreground: Some(id.clone()),
            tick_interval_ms: self.tick_interval_ms,
        };

        let outcome = match &descriptor.body {
            TaskBody::Steps { .. } => self.advance_steps(idx, &descriptor, &ctx).await,
            TaskBody::Combat(spec) => self.advance_combat(idx, &descriptor, spec, &ctx).await,
        };
        self.instances[idx].last_run_tick = Some(tick);

        match outcome {
            Advance::Running | Advance::Waiting => {}
            Advance::Completed => {
                self.instances[idx].complete(tick);
                self.slot.release();
                info!(tick, task = %id, "태스크 완료");
            }
            Advance::Failed(step_failure) => {
                let failure = TaskFailure {
                    tick,
                    cause: FailureCause::Step(step_failure.result),
                    step_path: step_failure.step_path,
                    last_scene: scene.clone(),
                };
                if descriptor.required && !descriptor.is_trigger() {
                    error!(task = %id, "필수 태스크 실패: {failure}");
                } else {
                    warn!(task = %id, "태스크 실패: {failure}");
                }
                self.instances[idx].fail(failure);
                self.slot.release();
            }
        }
    }

    async fn advance_steps(
        &mut self,
        idx: usize,
        descriptor: &TaskDescriptor,
        ctx: &SchedulerContext<'_>,
    ) -> Advance {
        let step_ctx = ctx.step_context(&descriptor.id);
        let mut events = Vec::new();
        let mut outcome = self.instances[idx]
            .cursor
            .advance(&mut self.executor, &step_ctx, descriptor.step_retries, &mut events)
            .await;

        if descriptor.run_to_completion && descriptor.is_trigger() {
            let mut steps = 1;
            while outcome == Advance::Running && steps < RUN_TO_COMPLETION_LIMIT {
                outcome = self.instances[idx]
                    .cursor
                    .advance(&mut self.executor, &step_ctx, descriptor.step_retries, &mut events)
                    .await;
                steps += 1;
            }
        }

        self.push_events(events);
        outcome
    }

    /// 전투 본문 한 틱
    ///
    /// 진행 중인 하위 프레임(재동기화, 스킬 분기)이 있으면 그것을 먼저 한 단계 전진하고,
    /// 모두 끝나면 다음 틱부터 로테이션으로 돌아간다.
    async fn advance_combat(
        &mut self,
        idx: usize,
        descriptor: &TaskDescriptor,
        spec: &CombatSpec,
        ctx: &SchedulerContext<'_>,
    ) -> Advance {
        let step_ctx = ctx.step_context(&descriptor.id);

        if self.instances[idx].cursor.has_frames() {
            // 스킬 분기는 전투 장면 안에서만 이어간다. 재동기화는 장면을 벗어나도 계속.
            let resyncing = self.instances[idx]
                .cursor
                .frames()
                .first()
                .is_some_and(|f| matches!(f.origin, FrameOrigin::Resync(_)));
            if !resyncing && !ctx.scene.is(&spec.combat_scene) {
                info!(task = %descriptor.id, scene = %ctx.scene, "전투 장면 이탈, 스킬 분기 중단");
                return Advance::Completed;
            }
            return self.advance_combat_frames(idx, descriptor, &step_ctx).await;
        }

        let resync = spec
            .resync_task
            .as_ref()
            .and_then(|t| self.executor.sequence(t));
        let instance = &mut self.instances[idx];
        let Some(combat) = instance.cursor.combat_mut() else {
            return Advance::Completed;
        };
        let decision = self.sequencer.plan(
            &descriptor.id,
            spec,
            combat,
            &self.characters,
            resync,
            ctx.tick,
            ctx.scene,
            &ctx.observation.detections,
        );

        match decision {
            CombatDecision::Yield => Advance::Completed,
            CombatDecision::Hold => Advance::Waiting,
            CombatDecision::Resync(steps) => {
                let origin = FrameOrigin::Resync(
                    spec.resync_task
                        .clone()
                        .unwrap_or_else(|| descriptor.id.clone()),
                );
                self.instances[idx]
                    .cursor
                    .push(CursorFrame::new(origin, steps));
                self.advance_combat_frames(idx, descriptor, &step_ctx).await
            }
            CombatDecision::Act(actions) => {
                for action in &actions {
                    let mut wait_ticks = 0;
                    match self.executor.execute(action, &mut wait_ticks, &step_ctx).await {
                        StepProgress::Descend { origin, steps } => {
                            self.instances[idx]
                                .cursor
                                .push(CursorFrame::new(origin, steps));
                            break;
                        }
                        StepProgress::Finished(StepResult::Success) | StepProgress::InProgress => {}
                        StepProgress::Finished(result) => {
                            warn!(task = %descriptor.id, ?result, "스킬 실행 실패");
                        }
                    }
                }
                Advance::Waiting
            }
        }
    }

    async fn advance_combat_frames(
        &mut self,
        idx: usize,
        descriptor: &TaskDescriptor,
        step_ctx: &StepContext<'_>,
    ) -> Advance {
        let mut events = Vec::new();
        let outcome = self.instances[idx]
            .cursor
            .advance(&mut self.executor, step_ctx, descriptor.step_retries, &mut events)
            .await;
        self.push_events(events);
        match outcome {
            Advance::Completed => {
                debug!(task = %descriptor.id, "하위 시퀀스 완료, 로테이션 복귀");
                Advance::Waiting
            }
            other => other,
        }
    }

    // ============================================================
    // 정지 조건
    // ============================================================

    fn check_halt(&mut self) {
        if self.halted || !self.slot.is_free() || !self.slot.paused().is_empty() {
            return;
        }
        if self.stop_after_current {
            info!(tick = self.tick, "현재 태스크 완료, 정지");
            self.halted = true;
            return;
        }
        if self.exit_when_idle && self.queue.is_empty() {
            let all_done = self.requested.iter().all(|id| {
                self.registry
                    .position(id)
                    .map_or(true, |i| self.instances[i].status.is_terminal())
            });
            if all_done {
                info!(tick = self.tick, "요청된 태스크 모두 종료, 정지");
                self.halted = true;
            }
        }
    }
}
