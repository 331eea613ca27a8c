//! # wavepilot
//!
//! wavepilot 바이너리 진입점.
//! 설정/카탈로그 로드, 어댑터 와이어링, 스케줄러 실행, 종료 코드 결정.
//!
//! 종료 코드: 0 정상, 1 필수 태스크 실패, 2 설정/카탈로그 오류.

mod lifecycle;
mod wiring;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use wavepilot_core::config::AppConfig;
use wavepilot_core::models::catalog::Catalog;
use wavepilot_core::models::task::{TaskBody, TaskId, TaskKind};
use wavepilot_scheduler::registry::validate_catalog;
use wavepilot_scheduler::{Scheduler, SchedulerReport};

use crate::lifecycle::{LifecycleManager, StopSignal};
use crate::wiring::{
    apply_overrides, build_input_driver, build_observation_source, load_catalog, load_config,
    CatalogSource, Overrides,
};

const EXIT_CONFIG_ERROR: u8 = 2;

/// 장면 기반 게임 자동화 스케줄러
#[derive(Parser, Debug)]
#[command(name = "wavepilot")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// 설정 파일 경로 (기본: 플랫폼 설정 디렉토리의 config.json)
    #[arg(long, short = 'c', global = true)]
    config: Option<PathBuf>,

    /// 카탈로그 파일 경로 (기본: 설정값, 없으면 내장 프리셋)
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,

    /// 로그 레벨 (trace, debug, info, warn, error)
    #[arg(long, short = 'l', default_value = "info", global = true)]
    log_level: String,

    /// 틱 주기 (밀리초)
    #[arg(long, global = true)]
    tick_ms: Option<u64>,

    /// 실제 입력/캡처 없이 실행
    #[arg(long, global = true)]
    dry_run: bool,

    /// 기록된 인식 결과 파일 (JSON, 프레임별 인식 결과 배열)
    #[arg(long, global = true)]
    replay: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// One-Shot 태스크 실행. 트리거는 함께 동작한다.
    ///
    /// 태스크를 지정하지 않으면 종료 신호까지 트리거만 실행한다.
    Run {
        /// 실행할 태스크 ID (순서대로 대기열에 추가)
        tasks: Vec<String>,

        /// Ctrl+C 시 현재 태스크를 마친 뒤 정지
        #[arg(long)]
        stop_after_current: bool,

        /// 요청한 태스크가 끝나도 종료 신호까지 계속 실행
        #[arg(long)]
        keep_running: bool,
    },
    /// 카탈로그의 태스크 목록 출력
    Tasks,
    /// 설정과 카탈로그 검증
    Validate,
}

fn init_tracing(level: &str) {
    let log_filter = format!(
        "wavepilot={level},wavepilot_core={level},wavepilot_vision={level},wavepilot_automation={level},wavepilot_scheduler={level}"
    );
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_filter)),
        )
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(&args.log_level);

    match run(args).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            error!("{e:#}");
            eprintln!("오류: {e:#}");
            ExitCode::from(EXIT_CONFIG_ERROR)
        }
    }
}

async fn run(args: Args) -> Result<u8> {
    let overrides = Overrides {
        tick_ms: args.tick_ms,
        dry_run: args.dry_run,
    };
    let mut config = load_config(args.config.as_deref())?;
    apply_overrides(&mut config, &overrides)?;
    let (catalog, source) = load_catalog(args.catalog.as_deref(), &config)?;
    info!(catalog = %source, tasks = catalog.tasks.len(), "카탈로그 로드");

    match args.command {
        Command::Tasks => {
            print_tasks(&catalog, &source);
            Ok(0)
        }
        Command::Validate => {
            validate_catalog(&catalog, &config.combat.team).context("카탈로그 검증 실패")?;
            println!(
                "✅ 설정과 카탈로그가 유효합니다 (장면 규칙 {}개, 태스크 {}개, 캐릭터 {}개)",
                catalog.scenes.len(),
                catalog.tasks.len(),
                catalog.characters.len()
            );
            Ok(0)
        }
        Command::Run {
            tasks,
            stop_after_current,
            keep_running,
        } => {
            let report = run_scheduler(
                &config,
                &catalog,
                &overrides,
                args.replay,
                &tasks,
                stop_after_current,
                keep_running,
            )
            .await?;
            print_report(&report);
            Ok(u8::try_from(report.exit_code).unwrap_or(1))
        }
    }
}

async fn run_scheduler(
    config: &AppConfig,
    catalog: &Catalog,
    overrides: &Overrides,
    replay: Option<PathBuf>,
    tasks: &[String],
    stop_after_current: bool,
    keep_running: bool,
) -> Result<SchedulerReport> {
    let lifecycle = LifecycleManager::new();

    // ── 어댑터 생성 (DI 와이어링) ──
    let source = build_observation_source(
        config,
        replay.as_deref(),
        overrides.dry_run,
        lifecycle.subscribe(),
    )?;
    let driver = build_input_driver(config, overrides.dry_run);
    info!(platform = driver.platform(), "입력 드라이버 준비");

    let mut scheduler =
        Scheduler::new(config, catalog, source, driver).context("스케줄러 생성 실패")?;
    for id in tasks {
        scheduler
            .run_task(&TaskId::new(id.as_str()))
            .with_context(|| format!("태스크 실행 요청 실패: {id}"))?;
    }
    if !tasks.is_empty() && !keep_running {
        scheduler = scheduler.with_exit_when_idle(true);
    }

    let handle = scheduler.handle();
    let mut join = tokio::spawn(scheduler.run(lifecycle.subscribe()));
    let mut graceful_requested = false;

    let report = loop {
        tokio::select! {
            result = &mut join => {
                break result.context("스케줄러 태스크 비정상 종료")?;
            }
            signal = lifecycle.wait_for_signal() => {
                if stop_after_current && signal == StopSignal::Interrupt && !graceful_requested {
                    info!("현재 태스크 완료 후 정지 요청 (다시 누르면 즉시 종료)");
                    graceful_requested = true;
                    if handle.stop_after_current().await.is_err() {
                        lifecycle.shutdown();
                    }
                } else {
                    lifecycle.shutdown();
                }
            }
        }
    };

    for failed in report.required_failures() {
        warn!(task = %failed.task_id, "필수 태스크 실패");
    }
    Ok(report)
}

fn print_tasks(catalog: &Catalog, source: &CatalogSource) {
    println!("카탈로그: {source}");
    println!();
    println!(
        "{:<20} {:<9} {:>8} {:>8}  {}",
        "ID", "종류", "우선순위", "쿨다운", "설명"
    );
    for task in &catalog.tasks {
        let kind = match (&task.kind, &task.body) {
            (TaskKind::OneShot, _) => "one-shot",
            (TaskKind::Trigger, TaskBody::Combat(_)) => "combat",
            (TaskKind::Trigger, TaskBody::Steps { .. }) => "trigger",
        };
        let mut description = task.description.clone();
        if task.required {
            description.push_str(" [필수]");
        }
        if !task.enabled {
            description.push_str(" [비활성]");
        }
        println!(
            "{:<20} {:<9} {:>8} {:>8}  {}",
            task.id.as_str(),
            kind,
            task.priority,
            task.cooldown_ticks,
            description.trim()
        );
    }
}

fn print_report(report: &SchedulerReport) {
    println!();
    println!("총 {}틱 실행", report.ticks);
    for outcome in &report.outcomes {
        if outcome.invocations == 0 && !outcome.required {
            continue;
        }
        println!(
            "  {:<20} {:<10} {:>4}회{}",
            outcome.task_id.as_str(),
            outcome.status.to_string(),
            outcome.invocations,
            if outcome.required { " (필수)" } else { "" }
        );
        if let Some(failure) = &outcome.failure {
            println!("      ❌ {failure}");
        }
    }
}
