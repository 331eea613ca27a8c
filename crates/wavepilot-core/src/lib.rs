//! # wavepilot-core
//!
//! wavepilot 도메인 모델, 포트(trait) 정의, 에러 타입.
//! 모든 크레이트가 공유하는 핵심 타입과 인터페이스를 제공한다.
//!
//! ## 구조
//!
//! - [`models`] — 프레임, 인식 결과, 장면, 액션, 태스크, 카탈로그 (serde)
//! - [`ports`] — Hexagonal Architecture 포트 인터페이스 (async_trait)
//! - [`error`] — 핵심 에러 타입 (thiserror)
//! - [`config`] — 애플리케이션 설정 구조체
//! - [`config_manager`] — 설정 파일 관리 (로드/저장)

pub mod config;
pub mod config_manager;
pub mod error;
pub mod models;
pub mod ports;

#[cfg(test)]
mod tests {
    use crate::models::action::{ActionStep, Predicate};
    use crate::models::catalog::Catalog;
    use crate::models::scene::{DetectionMatcher, SceneRule};
    use crate::models::task::{TaskDescriptor, TaskKind};

    #[test]
    fn catalog_serde_roundtrip() {
        let catalog = Catalog {
            scenes: vec![SceneRule::new("world", DetectionMatcher::label("minimap", 0.8))
                .with_confirmations(2)],
            tasks: vec![TaskDescriptor::steps(
                "auto_pickup",
                TaskKind::Trigger,
                vec![ActionStep::PressKey {
                    key: "f".to_string(),
                    hold_ms: 0,
                }],
            )
            .with_activation(Predicate::scene_is("world"))
            .with_priority(5)
            .with_cooldown(10)],
            characters: vec![],
        };

        let json = serde_json::to_string(&catalog).unwrap();
        let deserialized = Catalog::from_json(&json).unwrap();

        assert_eq!(deserialized, catalog);
        assert!(deserialized.tasks[0].is_trigger());
        assert!(deserialized.scenes[0].is_transient());
    }
}
