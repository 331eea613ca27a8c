//! 스케줄러 에러 및 이벤트 타입.
//!
//! - `CatalogError`: 시작 전 카탈로그 검증 실패 (치명적)
//! - `SchedulerError`: 명령/구성 실패
//! - `SchedulerEvent`: 루프를 멈추지 않는 운영 이벤트 (타임아웃, 충돌, 재개 불일치 등)

use thiserror::Error;
use wavepilot_core::error::CoreError;
use wavepilot_core::models::scene::Scene;
use wavepilot_core::models::task::{TaskId, TaskStatus};

/// 카탈로그 검증 에러
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    /// 장면 규칙 없음
    #[error("장면 규칙이 하나도 없습니다")]
    NoSceneRules,

    /// 중복 식별자
    #[error("중복 {kind} ID: {id}")]
    DuplicateId {
        /// "task" 또는 "character"
        kind: &'static str,
        id: String,
    },

    /// 예약된 장면 이름 사용
    #[error("'{context}'에서 예약된 장면 이름 'unknown' 사용")]
    ReservedScene { context: String },

    /// 규칙에 없는 장면 참조
    #[error("태스크 '{task}'가 알 수 없는 장면 참조: {scene}")]
    UnknownScene { task: String, scene: String },

    /// 없는 하위 시퀀스 참조
    #[error("태스크 '{task}'가 알 수 없는 하위 시퀀스 참조: {target}")]
    UnknownSubSequence { task: String, target: String },

    /// 단계 목록이 아닌 태스크를 하위 시퀀스로 참조
    #[error("태스크 '{task}'가 참조한 '{target}'는 단계 목록 태스크가 아닙니다")]
    NotASequence { task: String, target: String },

    /// 하위 시퀀스 순환
    #[error("하위 시퀀스 순환: {}", path.join(" → "))]
    CyclicSubSequence { path: Vec<String> },

    /// 없는 캐릭터 참조
    #[error("태스크 '{task}'가 알 수 없는 캐릭터 참조: {character}")]
    UnknownCharacter { task: String, character: String },

    /// 활성 조건 없는 트리거
    #[error("트리거 태스크 '{task}'에 활성 조건이 없습니다")]
    MissingActivation { task: String },
}

/// 스케줄러 에러
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// 카탈로그 검증 실패 (시작 전)
    #[error("카탈로그 오류: {0}")]
    CatalogInvalid(#[from] CatalogError),

    /// 없는 태스크
    #[error("알 수 없는 태스크: {0}")]
    UnknownTask(TaskId),

    /// 트리거 태스크를 직접 실행하려 함
    #[error("One-Shot 태스크만 직접 실행할 수 있습니다: {0}")]
    NotOneShot(TaskId),

    /// 비활성화된 태스크
    #[error("비활성화된 태스크: {0}")]
    Disabled(TaskId),

    /// 현재 상태에서 허용되지 않는 명령
    #[error("태스크 '{task}'는 {status} 상태에서 {command}할 수 없습니다")]
    InvalidState {
        task: TaskId,
        status: TaskStatus,
        command: &'static str,
    },

    /// 명령 채널 닫힘
    #[error("스케줄러가 종료되어 명령을 보낼 수 없습니다")]
    ChannelClosed,

    #[error(transparent)]
    Core(#[from] CoreError),
}

/// 운영 이벤트 (로그와 함께 보고서에 남음)
#[derive(Debug, Clone, PartialEq)]
pub enum SchedulerEvent {
    /// 단계 타임아웃
    StepTimeout {
        tick: u64,
        task: TaskId,
        /// 커서 스택의 단계 인덱스 경로 (루트부터)
        step_path: Vec<usize>,
        attempt: u32,
        will_retry: bool,
    },
    /// 단계 중단 (영역 해석 실패, 입력 전송 실패 등)
    StepAborted {
        tick: u64,
        task: TaskId,
        step_path: Vec<usize>,
        attempt: u32,
        will_retry: bool,
    },
    /// 같은 우선순위 트리거가 동시에 활성 (선언 순서로 결정)
    ActivationConflict {
        tick: u64,
        chosen: TaskId,
        deferred: TaskId,
        priority: i32,
    },
    /// 선점
    Preempted { tick: u64, task: TaskId, by: TaskId },
    /// 재개
    Resumed { tick: u64, task: TaskId },
    /// 일시정지 중 장면이 바뀐 채로 재개됨
    ResumeInconsistency {
        tick: u64,
        task: TaskId,
        paused_scene: Scene,
        current_scene: Scene,
    },
    /// 일시정지 허용 시간 초과
    PauseExpired { tick: u64, task: TaskId },
}

impl SchedulerEvent {
    pub fn tick(&self) -> u64 {
        match self {
            SchedulerEvent::StepTimeout { tick, .. }
            | SchedulerEvent::StepAborted { tick, .. }
            | SchedulerEvent::ActivationConflict { tick, .. }
            | SchedulerEvent::Preempted { tick, .. }
            | SchedulerEvent::Resumed { tick, .. }
            | SchedulerEvent::ResumeInconsistency { tick, .. }
            | SchedulerEvent::PauseExpired { tick, .. } => *tick,
        }
    }
}
