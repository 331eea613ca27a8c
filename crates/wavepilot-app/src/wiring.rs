//! 어댑터 생성 (DI 와이어링).
//!
//! 설정 → 카탈로그 → 관측 소스 → 입력 드라이버 순서로 조립한다.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::watch;
use tracing::{info, warn};
use wavepilot_automation::input_driver::{create_input_driver, NoOpInputDriver};
use wavepilot_automation::presets::builtin_catalog;
use wavepilot_core::config::AppConfig;
use wavepilot_core::config_manager::ConfigManager;
use wavepilot_core::models::catalog::Catalog;
use wavepilot_core::models::frame::FrameSize;
use wavepilot_core::ports::input_driver::InputDriver;
use wavepilot_core::ports::perception::{FrameSource, ObservationSource};
use wavepilot_vision::adapter::PerceptionAdapter;
use wavepilot_vision::capture::ScreenCapture;
use wavepilot_vision::lane::{InlinePerception, PerceptionLane};
use wavepilot_vision::replay::{BlankFrameSource, ReplayPerception};

/// dry-run 시 가상 프레임 크기
const DRY_RUN_FRAME: (u32, u32) = (1920, 1080);

/// 카탈로그 출처
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogSource {
    File(PathBuf),
    Builtin,
}

impl std::fmt::Display for CatalogSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CatalogSource::File(path) => write!(f, "{}", path.display()),
            CatalogSource::Builtin => f.write_str("내장 프리셋"),
        }
    }
}

/// CLI에서 덮어쓸 수 있는 값
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub tick_ms: Option<u64>,
    pub dry_run: bool,
}

/// 설정 로드
///
/// 경로가 주어지면 그 파일을, 아니면 플랫폼 설정 디렉토리의 파일을 사용한다.
/// 파일이 없으면 기본 설정으로 생성된다.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    let manager = match path {
        Some(path) => ConfigManager::with_path(path.to_path_buf())
            .with_context(|| format!("설정 파일 로드 실패: {}", path.display()))?,
        None => match ConfigManager::new() {
            Ok(manager) => manager,
            Err(e) => {
                warn!("설정 디렉토리 사용 불가, 기본 설정 사용: {e}");
                return Ok(AppConfig::default_config());
            }
        },
    };
    info!(path = %manager.config_path().display(), "설정 로드");
    Ok(manager.get())
}

/// CLI 값 반영 후 검증
pub fn apply_overrides(config: &mut AppConfig, overrides: &Overrides) -> Result<()> {
    if let Some(tick_ms) = overrides.tick_ms {
        config.scheduler.tick_interval_ms = tick_ms;
    }
    config.validate().context("설정 검증 실패")?;
    Ok(())
}

/// 카탈로그 로드
///
/// 우선순위: CLI 경로 → 설정의 `catalog_path` → 설정 디렉토리의 catalog.json → 내장 프리셋
pub fn load_catalog(explicit: Option<&Path>, config: &AppConfig) -> Result<(Catalog, CatalogSource)> {
    let configured = explicit
        .map(Path::to_path_buf)
        .or_else(|| config.catalog_path.clone());
    if let Some(path) = configured {
        let catalog = Catalog::load(&path)
            .with_context(|| format!("카탈로그 로드 실패: {}", path.display()))?;
        return Ok((catalog, CatalogSource::File(path)));
    }

    if let Ok(path) = ConfigManager::default_catalog_path() {
        if path.exists() {
            let catalog = Catalog::load(&path)
                .with_context(|| format!("카탈로그 로드 실패: {}", path.display()))?;
            return Ok((catalog, CatalogSource::File(path)));
        }
    }

    Ok((builtin_catalog(), CatalogSource::Builtin))
}

/// 관측 소스 생성
///
/// 비전 모델은 기록 재생(`--replay`)으로 연결된다. 없으면 빈 결과만 돌려주므로
/// 장면은 계속 Unknown이다.
pub fn build_observation_source(
    config: &AppConfig,
    replay: Option<&Path>,
    dry_run: bool,
    shutdown_rx: watch::Receiver<bool>,
) -> Result<Box<dyn ObservationSource>> {
    let model = match replay {
        Some(path) => ReplayPerception::load(path)
            .with_context(|| format!("인식 기록 로드 실패: {}", path.display()))?,
        None => {
            warn!("비전 모델 미연결: 모든 프레임이 빈 인식 결과로 처리됨");
            ReplayPerception::new(Vec::new())
        }
    };
    let adapter = Arc::new(PerceptionAdapter::new(
        Arc::new(model),
        config.latency_budget(),
    ));

    let frames: Arc<dyn FrameSource> = if dry_run || replay.is_some() {
        let (w, h) = DRY_RUN_FRAME;
        Arc::new(BlankFrameSource::new(FrameSize::new(w, h)))
    } else {
        Arc::new(ScreenCapture::with_monitor(config.perception.monitor_index))
    };

    if config.perception.use_worker_lane {
        info!(period_ms = config.scheduler.tick_interval_ms, "인식 워커 사용");
        Ok(Box::new(PerceptionLane::spawn(
            frames,
            adapter,
            config.tick_interval(),
            shutdown_rx,
        )))
    } else {
        Ok(Box::new(InlinePerception::new(frames, adapter)))
    }
}

/// 입력 드라이버 생성 (dry-run은 항상 NoOp)
pub fn build_input_driver(config: &AppConfig, dry_run: bool) -> Arc<dyn InputDriver> {
    if dry_run {
        info!("dry-run: 입력 이벤트는 로그로만 남음");
        return Arc::new(NoOpInputDriver);
    }
    create_input_driver(config.input.driver)
}
