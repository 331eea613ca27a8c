//! 입력 드라이버 구현.
//!
//! `NoOpInputDriver` (dry-run), `RecordingInputDriver` (테스트/시뮬레이션),
//! `EnigoInputDriver` (실제 입력, `enigo` feature)를 제공한다.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::debug;

use wavepilot_core::config::InputDriverKind;
use wavepilot_core::error::CoreError;
use wavepilot_core::models::action::InputEvent;
use wavepilot_core::ports::input_driver::InputDriver;

// ============================================================
// NoOpInputDriver — dry-run/디버깅용
// ============================================================

/// No-Op 입력 드라이버 — 모든 입력을 로깅만 하고 실행하지 않음
pub struct NoOpInputDriver;

#[async_trait]
impl InputDriver for NoOpInputDriver {
    async fn emit(&self, event: &InputEvent) -> Result<(), CoreError> {
        debug!(?event, "[NoOp] 입력 이벤트");
        Ok(())
    }

    fn platform(&self) -> &str {
        "noop"
    }
}

// ============================================================
// RecordingInputDriver — 전송된 이벤트 기록
// ============================================================

/// 전송된 이벤트를 순서대로 기록하는 드라이버
///
/// `fail_after`를 지정하면 그 개수 이후의 전송은 실패한다.
#[derive(Clone, Default)]
pub struct RecordingInputDriver {
    events: Arc<Mutex<Vec<InputEvent>>>,
    fail_after: Option<usize>,
}

impl RecordingInputDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// `n`개 이후의 전송이 실패하는 드라이버
    pub fn failing_after(n: usize) -> Self {
        Self {
            events: Arc::default(),
            fail_after: Some(n),
        }
    }

    /// 기록된 이벤트 복제본
    pub fn events(&self) -> Vec<InputEvent> {
        self.events.lock().clone()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

#[async_trait]
impl InputDriver for RecordingInputDriver {
    async fn emit(&self, event: &InputEvent) -> Result<(), CoreError> {
        let mut events = self.events.lock();
        if self.fail_after.is_some_and(|n| events.len() >= n) {
            return Err(CoreError::Input(format!("전송 거부: {event:?}")));
        }
        events.push(event.clone());
        Ok(())
    }

    fn platform(&self) -> &str {
        "recording"
    }
}

// ============================================================
// EnigoInputDriver — 실제 마우스/키보드 입력
// ============================================================

/// 실제 마우스/키보드 입력 드라이버 (enigo 기반)
///
/// macOS: Accessibility 권한 필요
/// Windows: 게임 창보다 높은 권한(관리자) 필요
/// Linux: X11 또는 Wayland + uinput 권한 필요
#[cfg(feature = "enigo")]
pub struct EnigoInputDriver {
    /// enigo 인스턴스 (Send지만 !Sync → tokio::sync::Mutex 사용)
    enigo: tokio::sync::Mutex<enigo::Enigo>,
}

#[cfg(feature = "enigo")]
impl EnigoInputDriver {
    /// 새 EnigoInputDriver 생성
    pub fn new() -> Result<Self, CoreError> {
        let settings = enigo::Settings::default();
        let enigo = enigo::Enigo::new(&settings)
            .map_err(|e| CoreError::Input(format!("입력 드라이버 초기화 실패: {e}")))?;
        Ok(Self {
            enigo: tokio::sync::Mutex::new(enigo),
        })
    }

    /// 문자열 → enigo 키 매핑
    fn parse_key(key: &str) -> Result<enigo::Key, CoreError> {
        let key = match key.to_lowercase().as_str() {
            "enter" | "return" => enigo::Key::Return,
            "tab" => enigo::Key::Tab,
            "escape" | "esc" => enigo::Key::Escape,
            "backspace" => enigo::Key::Backspace,
            "space" => enigo::Key::Space,
            "up" | "uparrow" => enigo::Key::UpArrow,
            "down" | "downarrow" => enigo::Key::DownArrow,
            "left" | "leftarrow" => enigo::Key::LeftArrow,
            "right" | "rightarrow" => enigo::Key::RightArrow,
            "ctrl" | "control" => enigo::Key::Control,
            "shift" => enigo::Key::Shift,
            "alt" | "option" => enigo::Key::Alt,
            "f1" => enigo::Key::F1,
            "f2" => enigo::Key::F2,
            "f3" => enigo::Key::F3,
            "f4" => enigo::Key::F4,
            "f5" => enigo::Key::F5,
            "f6" => enigo::Key::F6,
            other => {
                let mut chars = other.chars();
                match (chars.next(), chars.next()) {
                    (Some(ch), None) => enigo::Key::Unicode(ch),
                    _ => return Err(CoreError::Input(format!("알 수 없는 키: {other}"))),
                }
            }
        };
        Ok(key)
    }
}

#[cfg(feature = "enigo")]
#[async_trait]
impl InputDriver for EnigoInputDriver {
    async fn emit(&self, event: &InputEvent) -> Result<(), CoreError> {
        use enigo::{Keyboard, Mouse};
        use wavepilot_core::models::action::MouseButton;

        debug!(?event, "[Enigo] 입력 이벤트");
        let mut enigo = self.enigo.lock().await;
        match event {
            InputEvent::MouseMove { x, y } => enigo
                .move_mouse(*x, *y, enigo::Coordinate::Abs)
                .map_err(|e| CoreError::Input(format!("마우스 이동 실패: {e}"))),
            InputEvent::MouseClick { button, x, y } => {
                enigo
                    .move_mouse(*x, *y, enigo::Coordinate::Abs)
                    .map_err(|e| CoreError::Input(format!("마우스 이동 실패: {e}")))?;
                let btn = match button {
                    MouseButton::Left => enigo::Button::Left,
                    MouseButton::Right => enigo::Button::Right,
                    MouseButton::Middle => enigo::Button::Middle,
                };
                enigo
                    .button(btn, enigo::Direction::Click)
                    .map_err(|e| CoreError::Input(format!("마우스 클릭 실패: {e}")))
            }
            InputEvent::KeyDown { key } => enigo
                .key(Self::parse_key(key)?, enigo::Direction::Press)
                .map_err(|e| CoreError::Input(format!("키 누름 실패: {e}"))),
            InputEvent::KeyUp { key } => enigo
                .key(Self::parse_key(key)?, enigo::Direction::Release)
                .map_err(|e| CoreError::Input(format!("키 놓음 실패: {e}"))),
        }
    }

    fn platform(&self) -> &str {
        #[cfg(target_os = "macos")]
        {
            "macos"
        }
        #[cfg(target_os = "windows")]
        {
            "windows"
        }
        #[cfg(target_os = "linux")]
        {
            "linux"
        }
        #[cfg(not(any(target_os = "macos", target_os = "windows", target_os = "linux")))]
        {
            "unknown"
        }
    }
}

/// 설정에 따른 입력 드라이버 생성 팩토리
///
/// `Enigo` 요청 시 feature가 꺼져 있거나 초기화에 실패하면 NoOp으로 폴백한다.
pub fn create_input_driver(kind: InputDriverKind) -> Arc<dyn InputDriver> {
    match kind {
        InputDriverKind::NoOp => Arc::new(NoOpInputDriver),
        InputDriverKind::Enigo => {
            #[cfg(feature = "enigo")]
            {
                match EnigoInputDriver::new() {
                    Ok(driver) => {
                        tracing::info!("실제 입력 드라이버 (enigo) 초기화 완료");
                        return Arc::new(driver);
                    }
                    Err(e) => {
                        tracing::warn!("enigo 초기화 실패, NoOp 폴백: {e}");
                    }
                }
            }
            #[cfg(not(feature = "enigo"))]
            tracing::warn!("enigo feature 비활성화 상태, NoOp 폴백");
            Arc::new(NoOpInputDriver)
        }
    }
}

// ============================================================
// 테스트
// ============================================================
