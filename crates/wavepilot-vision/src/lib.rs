//! # wavepilot-vision
//!
//! 인식 파이프라인 크레이트.
//! 스크린 캡처, 지연 예산 인식 어댑터, 최신 프레임 워커, 장면 분류,
//! 그리고 스태미나/파티/언어/에코 패널 판독 헬퍼를 담당한다.

pub mod adapter;
pub mod capture;
pub mod echo;
pub mod lane;
pub mod language;
pub mod replay;
pub mod scene_classifier;
pub mod stamina;
pub mod team;
