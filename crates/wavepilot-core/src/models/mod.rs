//! wavepilot 도메인 모델.
//!
//! 카탈로그(JSON)로 직렬화되는 정적 정의와 인식 파이프라인이 생성하는 값 타입을 정의한다.
//! 모든 정적 모델은 `serde` Serialize/Deserialize를 구현한다.

pub mod action;
pub mod catalog;
pub mod combat;
pub mod detection;
pub mod echo;
pub mod frame;
pub mod scene;
pub mod task;
