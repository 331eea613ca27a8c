//! # wavepilot-automation
//!
//! 입력 자동화 크레이트.
//! 선언적 액션 단계를 입력 이벤트로 변환해 입력 드라이버로 전송하고,
//! 전송된 모든 이벤트를 감사 로그에 기록한다. 내장 카탈로그 프리셋도 제공한다.

pub mod audit;
pub mod executor;
pub mod input_driver;
pub mod presets;
