//! 태스크 정의 모델.
//!
//! `TaskDescriptor`는 카탈로그에 정적으로 정의되며 실행 중에는 읽기 전용이다.
//! 실행 상태(`TaskStatus`, 커서 등)는 스케줄러가 소유한다.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::action::{ActionStep, Predicate};
use super::scene::SceneId;

/// 태스크 식별자
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// 태스크 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    /// 명시적으로 선택되어 끝까지 실행되는 태스크
    OneShot,
    /// 활성 조건이 만족될 때 기회적으로 실행되는 태스크
    Trigger,
}

/// 태스크 실행 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Idle,
    Active,
    Paused,
    Completed,
    Failed,
}

impl TaskStatus {
    /// 종료 상태 여부 (Completed, Failed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskStatus::Idle => "idle",
            TaskStatus::Active => "active",
            TaskStatus::Paused => "paused",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

fn default_actions_per_tick() -> u32 {
    1
}

fn default_team_labels() -> Vec<String> {
    vec![
        "char_1_text".to_string(),
        "char_2_text".to_string(),
        "char_3_text".to_string(),
    ]
}

/// 전투 본문 설정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombatSpec {
    /// 전투 장면
    pub combat_scene: SceneId,
    /// 전투 UI 생존 판정 레이블 (하나라도 보이면 UI 유지)
    #[serde(default)]
    pub ui_labels: Vec<String>,
    /// UI 손실 허용 시간 (없으면 전역 설정값)
    #[serde(default)]
    pub lost_ui_ms: Option<u64>,
    /// 외부 틱당 최대 스킬 실행 횟수
    #[serde(default = "default_actions_per_tick")]
    pub actions_per_tick: u32,
    /// UI 손실 시 실행할 재동기화 태스크
    #[serde(default)]
    pub resync_task: Option<TaskId>,
    /// 슬롯 순서대로의 캐릭터 ID (없으면 전역 설정값)
    #[serde(default)]
    pub team: Vec<String>,
    /// 슬롯별 캐릭터 이름표 레이블
    #[serde(default = "default_team_labels")]
    pub team_labels: Vec<String>,
}

/// 태스크 본문
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskBody {
    /// 고정 단계 목록
    Steps { steps: Vec<ActionStep> },
    /// 실시간 전투 시퀀서
    Combat(CombatSpec),
}

fn default_enabled() -> bool {
    true
}

/// 카탈로그에 정의된 태스크
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDescriptor {
    pub id: TaskId,
    pub kind: TaskKind,
    /// 트리거 활성 조건 (One-Shot은 무시)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activation: Option<Predicate>,
    /// 우선순위 (클수록 높음)
    #[serde(default)]
    pub priority: i32,
    /// 트리거 재발동 대기 틱 수
    #[serde(default)]
    pub cooldown_ticks: u64,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// 실패 시 프로세스 종료 코드에 반영
    #[serde(default)]
    pub required: bool,
    pub body: TaskBody,
    /// 단계별 재시도 횟수
    #[serde(default)]
    pub step_retries: u32,
    /// 트리거 시퀀스를 한 틱 안에 모두 실행
    #[serde(default)]
    pub run_to_completion: bool,
    /// 일시정지 허용 최대 틱 수 (없으면 전역 설정값)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_pause_ticks: Option<u64>,
    #[serde(default)]
    pub description: String,
}

impl TaskDescriptor {
    /// 단계 목록 태스크 생성
    pub fn steps(id: impl Into<String>, kind: TaskKind, steps: Vec<ActionStep>) -> Self {
        Self {
            id: TaskId::new(id),
            kind,
            activation: None,
            priority: 0,
            cooldown_ticks: 0,
            enabled: true,
            required: false,
            body: TaskBody::Steps { steps },
            step_retries: 0,
            run_to_completion: false,
            max_pause_ticks: None,
            description: String::new(),
        }
    }

    pub fn with_activation(mut self, predicate: Predicate) -> Self {
        self.activation = Some(predicate);
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_cooldown(mut self, ticks: u64) -> Self {
        self.cooldown_ticks = ticks;
        self
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.step_retries = retries;
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn is_trigger(&self) -> bool {
        self.kind == TaskKind::Trigger
    }

    /// 단계 목록 본문이면 단계 반환
    pub fn step_list(&self) -> Option<&[ActionStep]> {
        match &self.body {
            TaskBody::Steps { steps } => Some(steps),
            TaskBody::Combat(_) => None,
        }
    }
}
