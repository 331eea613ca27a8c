//! 라이프사이클 관리.
//!
//! 종료 신호 전파와 OS 시그널 대기.

use tokio::sync::watch;
use tracing::{info, warn};

/// 수신한 종료 요청 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopSignal {
    /// SIGINT / Ctrl+C
    Interrupt,
    /// SIGTERM
    Terminate,
}

/// 라이프사이클 관리자
pub struct LifecycleManager {
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl LifecycleManager {
    /// 새 라이프사이클 관리자 생성
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            shutdown_tx: tx,
            shutdown_rx: rx,
        }
    }

    /// 종료 수신기 복제
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.shutdown_rx.clone()
    }

    /// 종료 신호 발송
    pub fn shutdown(&self) {
        info!("종료 신호 발송");
        let _ = self.shutdown_tx.send(true);
    }

    /// OS 시그널 대기 (SIGINT, SIGTERM)
    ///
    /// 핸들러 등록에 실패하면 경고만 남기고 계속 대기한다 (스케줄러 자체 정지 조건에 맡김).
    pub async fn wait_for_signal(&self) -> StopSignal {
        wait_os_signal().await
    }
}

#[cfg(unix)]
async fn wait_os_signal() -> StopSignal {
    use tokio::signal::unix::{signal, SignalKind};

    let (mut sigint, mut sigterm) =
        match (signal(SignalKind::interrupt()), signal(SignalKind::terminate())) {
            (Ok(int), Ok(term)) => (int, term),
            (Err(e), _) | (_, Err(e)) => {
                warn!("시그널 핸들러 등록 실패: {e}");
                return std::future::pending().await;
            }
        };

    tokio::select! {
        _ = sigint.recv() => {
            info!("SIGINT 수신");
            StopSignal::Interrupt
        }
        _ = sigterm.recv() => {
            info!("SIGTERM 수신");
            StopSignal::Terminate
        }
    }
}

#[cfg(not(unix))]
async fn wait_os_signal() -> StopSignal {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Ctrl+C 핸들러 등록 실패: {e}");
        return std::future::pending().await;
    }
    info!("Ctrl+C 수신");
    StopSignal::Interrupt
}

impl Default for LifecycleManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_creation() {
        let lm = LifecycleManager::new();
        let rx = lm.subscribe();
        assert!(!*rx.borrow());
    }

    #[test]
    fn shutdown_signal() {
        let lm = LifecycleManager::new();
        let rx = lm.subscribe();
        lm.shutdown();
        assert!(*rx.borrow());
    }

    #[tokio::test]
    async fn subscriber_sees_change() {
        let lm = LifecycleManager::new();
        let mut rx = lm.subscribe();
        lm.shutdown();
        assert!(rx.changed().await.is_ok());
        assert!(*rx.borrow());
    }
}
