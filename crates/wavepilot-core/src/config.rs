//! 애플리케이션 설정 구조체.
//!
//! 스케줄러 틱 주기, 인식 지연 예산, 입력 드라이버, 전투 기본값 등
//! 런타임 설정을 정의한다. `ConfigManager`를 통해 JSON 파일에서 로드하며
//! CLI 플래그가 일부 값을 덮어쓴다.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::CoreError;

/// 최상위 애플리케이션 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// 스케줄러 설정
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    /// 인식 파이프라인 설정
    #[serde(default)]
    pub perception: PerceptionConfig,
    /// 입력 드라이버 설정
    #[serde(default)]
    pub input: InputConfig,
    /// 전투 기본값
    #[serde(default)]
    pub combat: CombatConfig,
    /// 카탈로그 파일 경로 (None이면 내장 프리셋)
    #[serde(default)]
    pub catalog_path: Option<PathBuf>,
}

// ============================================================
// 스케줄러 설정
// ============================================================

/// 스케줄러 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// 틱 주기 (밀리초)
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    /// 일시정지 태스크 포기 시간 (밀리초, 태스크별 설정이 우선)
    #[serde(default = "default_max_pause_ms")]
    pub max_pause_ms: u64,
    /// 입력 감사 로그 최대 보관 개수
    #[serde(default = "default_audit_capacity")]
    pub audit_capacity: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            max_pause_ms: default_max_pause_ms(),
            audit_capacity: default_audit_capacity(),
        }
    }
}

// ============================================================
// 인식 설정
// ============================================================

/// 인식 파이프라인 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerceptionConfig {
    /// 인식 1회 지연 예산 (밀리초)
    #[serde(default = "default_latency_budget_ms")]
    pub latency_budget_ms: u64,
    /// 인식 결과 최대 보관 틱 수 (규칙별 carryover 상한)
    #[serde(default = "default_staleness_ticks")]
    pub staleness_ticks: u32,
    /// Unknown 장면 확정에 필요한 연속 횟수
    #[serde(default = "default_unknown_confirmations")]
    pub unknown_confirmations: u32,
    /// 별도 워커에서 최신 프레임만 인식할지 여부
    #[serde(default)]
    pub use_worker_lane: bool,
    /// 캡처 대상 모니터 인덱스
    #[serde(default)]
    pub monitor_index: usize,
}

impl Default for PerceptionConfig {
    fn default() -> Self {
        Self {
            latency_budget_ms: default_latency_budget_ms(),
            staleness_ticks: default_staleness_ticks(),
            unknown_confirmations: default_unknown_confirmations(),
            use_worker_lane: false,
            monitor_index: 0,
        }
    }
}

// ============================================================
// 입력 설정
// ============================================================

/// 입력 드라이버 종류
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputDriverKind {
    /// 이벤트를 로그로만 남김
    #[default]
    NoOp,
    /// enigo 기반 실제 입력 (`enigo` feature 필요)
    Enigo,
}

/// 입력 드라이버 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    #[serde(default)]
    pub driver: InputDriverKind,
    /// 카탈로그에서 jitter를 지정하지 않은 클릭에 적용할 기본값 (픽셀)
    #[serde(default = "default_jitter_px")]
    pub default_jitter_px: u32,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            driver: InputDriverKind::NoOp,
            default_jitter_px: default_jitter_px(),
        }
    }
}

// ============================================================
// 전투 설정
// ============================================================

/// 전투 기본값
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CombatConfig {
    /// 슬롯 순서대로의 캐릭터 ID
    #[serde(default)]
    pub team: Vec<String>,
    /// 전투 UI 손실 허용 시간 (밀리초)
    #[serde(default = "default_lost_ui_ms")]
    pub lost_ui_ms: u64,
}

impl Default for CombatConfig {
    fn default() -> Self {
        Self {
            team: Vec::new(),
            lost_ui_ms: default_lost_ui_ms(),
        }
    }
}

// ============================================================
// AppConfig impl
// ============================================================

impl AppConfig {
    /// 기본 설정값 반환
    pub fn default_config() -> Self {
        Self {
            scheduler: SchedulerConfig::default(),
            perception: PerceptionConfig::default(),
            input: InputConfig::default(),
            combat: CombatConfig::default(),
            catalog_path: None,
        }
    }

    /// 설정값 검증
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.scheduler.tick_interval_ms == 0 {
            return Err(CoreError::Validation {
                field: "scheduler.tick_interval_ms".to_string(),
                message: "0보다 커야 합니다".to_string(),
            });
        }
        if self.perception.latency_budget_ms == 0 {
            return Err(CoreError::Validation {
                field: "perception.latency_budget_ms".to_string(),
                message: "0보다 커야 합니다".to_string(),
            });
        }
        if self.perception.unknown_confirmations == 0 {
            return Err(CoreError::Validation {
                field: "perception.unknown_confirmations".to_string(),
                message: "1 이상이어야 합니다".to_string(),
            });
        }
        Ok(())
    }

    /// 틱 주기를 Duration으로 반환
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.scheduler.tick_interval_ms)
    }

    /// 인식 지연 예산을 Duration으로 반환
    pub fn latency_budget(&self) -> Duration {
        Duration::from_millis(self.perception.latency_budget_ms)
    }

    /// 밀리초를 틱 수로 변환 (올림)
    pub fn ms_to_ticks(&self, ms: u64) -> u64 {
        ms_to_ticks(ms, self.scheduler.tick_interval_ms)
    }
}

/// 밀리초를 틱 수로 변환 (올림, 틱 주기 0은 1로 취급)
pub fn ms_to_ticks(ms: u64, tick_interval_ms: u64) -> u64 {
    ms.div_ceil(tick_interval_ms.max(1))
}

// ============================================================
// 기본값 함수
// ============================================================

fn default_tick_interval_ms() -> u64 {
    100
}
fn default_max_pause_ms() -> u64 {
    600_000 // 10분
}
fn default_audit_capacity() -> usize {
    1_000
}
fn default_latency_budget_ms() -> u64 {
    500
}
fn default_staleness_ticks() -> u32 {
    5
}
fn default_unknown_confirmations() -> u32 {
    1
}
fn default_jitter_px() -> u32 {
    3
}
fn default_lost_ui_ms() -> u64 {
    3_000
}
