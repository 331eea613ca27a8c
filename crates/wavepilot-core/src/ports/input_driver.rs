//! 입력 드라이버 포트.
//!
//! 마우스/키보드 조작을 위한 크로스 플랫폼 인터페이스를 정의한다.
//! 드라이버는 이벤트를 그대로 전달할 뿐이며 게임 내 효과는 보장하지 않는다.

use async_trait::async_trait;

use crate::error::CoreError;
use crate::models::action::InputEvent;

/// 입력 드라이버 — 마우스/키보드 시뮬레이션 인터페이스
///
/// 구현체: `EnigoInputDriver` (실제 입력), `NoOpInputDriver` (테스트, dry-run)
#[async_trait]
pub trait InputDriver: Send + Sync {
    /// 입력 이벤트 전송
    async fn emit(&self, event: &InputEvent) -> Result<(), CoreError>;

    /// 플랫폼 이름 (예: "macos", "windows", "linux")
    fn platform(&self) -> &str;
}
