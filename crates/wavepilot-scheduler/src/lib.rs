//! # wavepilot-scheduler
//!
//! 장면 기반 태스크 스케줄러.
//! 카탈로그 검증, 트리거 평가, 단일 포그라운드 슬롯 중재(선점/LIFO 재개),
//! 재개 가능한 태스크 커서, 전투 시퀀서를 담당한다.

pub mod combat;
pub mod context;
pub mod error;
pub mod foreground;
pub mod registry;
pub mod scheduler;
pub mod task;

pub use error::{CatalogError, SchedulerError, SchedulerEvent};
pub use scheduler::{
    Scheduler, SchedulerCommand, SchedulerHandle, SchedulerReport, TaskOutcome, TickSummary,
};
