//! 장면 분류기.
//!
//! 선언 순서대로 규칙을 평가해 처음 만족된 규칙의 장면을 고른다 (혼합 없음).
//! 어떤 규칙도 맞지 않으면 `Scene::Unknown`.
//!
//! - 디바운스: 새 승자는 K번 연속 이겨야 확정된다. 그 전까지는 이전 장면을 보고한다.
//! - 이월(carryover): 인식 결과는 틱별로 보관되며, 규칙은 자신의 `carryover_ticks`
//!   (전역 `staleness_ticks` 상한) 이내의 결과를 함께 본다.
//! - 반복 프레임: 이미 분류한 프레임이 다시 들어오면 이력에 넣지 않고 디바운스도 세지 않는다.
//!   마지막 새 프레임이 `staleness_ticks`보다 오래되면 빈 결과로 분류한다.
//!
//! 같은 인식 결과와 이력이 주어지면 분류 결과는 항상 같다.

use std::collections::VecDeque;

use tracing::{debug, info};
use wavepilot_core::models::detection::{Detection, Observation};
use wavepilot_core::models::frame::FrameSize;
use wavepilot_core::models::scene::{Scene, SceneRule};

/// 틱별 인식 결과 이력 항목
#[derive(Debug, Clone)]
struct HistoryEntry {
    tick: u64,
    detections: Vec<Detection>,
}

/// 확정 대기 중인 후보
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingScene {
    pub scene: Scene,
    /// 연속 승리 횟수
    pub wins: u32,
    /// 확정에 필요한 횟수
    pub required: u32,
}

/// 한 틱의 분류 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SceneVerdict {
    /// 보고되는(확정된) 장면
    pub scene: Scene,
    /// 이번 틱 규칙 평가 결과 (디바운스 전)
    pub raw: Scene,
    /// 확정 대기 후보
    pub pending: Option<PendingScene>,
    /// 이번 틱에 확정 장면이 바뀌었는지
    pub changed: bool,
}

/// 장면 분류기
pub struct SceneClassifier {
    rules: Vec<SceneRule>,
    staleness_ticks: u32,
    unknown_confirmations: u32,
    history: VecDeque<HistoryEntry>,
    frame_size: Option<FrameSize>,
    accepted: Scene,
    pending: Option<PendingScene>,
    last_raw: Scene,
    /// 마지막으로 새 프레임을 기록한 틱
    last_frame_tick: Option<u64>,
}

impl SceneClassifier {
    /// 새 분류기 생성
    pub fn new(rules: Vec<SceneRule>, staleness_ticks: u32, unknown_confirmations: u32) -> Self {
        Self {
            rules,
            staleness_ticks,
            unknown_confirmations: unknown_confirmations.max(1),
            history: VecDeque::new(),
            frame_size: None,
            accepted: Scene::Unknown,
            pending: None,
            last_raw: Scene::Unknown,
            last_frame_tick: None,
        }
    }

    /// 현재 확정 장면
    pub fn current(&self) -> &Scene {
        &self.accepted
    }

    pub fn rules(&self) -> &[SceneRule] {
        &self.rules
    }

    /// 세션 종료 시 상태 초기화
    pub fn reset(&mut self) {
        self.history.clear();
        self.frame_size = None;
        self.accepted = Scene::Unknown;
        self.pending = None;
        self.last_raw = Scene::Unknown;
        self.last_frame_tick = None;
    }

    /// 관측 결과로 분류
    pub fn classify_observation(&mut self, tick: u64, observation: &Observation) -> SceneVerdict {
        if let Some(size) = observation.frame_size {
            self.frame_size = Some(size);
        }
        if observation.repeated {
            return self.hold(tick);
        }
        self.classify(tick, &observation.detections)
    }

    /// 새 프레임 없이 지나간 틱
    fn hold(&mut self, tick: u64) -> SceneVerdict {
        let horizon = tick.saturating_sub(u64::from(self.staleness_ticks));
        if !self.last_frame_tick.is_some_and(|t| t >= horizon) {
            debug!(tick, "새 프레임 없음, 이력 만료");
            return self.classify(tick, &[]);
        }
        SceneVerdict {
            scene: self.accepted.clone(),
            raw: self.last_raw.clone(),
            pending: self.pending.clone(),
            changed: false,
        }
    }

    /// 이번 틱 인식 결과로 분류
    pub fn classify(&mut self, tick: u64, detections: &[Detection]) -> SceneVerdict {
        self.record(tick, detections);
        self.last_frame_tick = Some(tick);

        let (raw, required) = self.evaluate(tick);
        self.last_raw = raw.clone();
        let previous = self.accepted.clone();

        if raw == self.accepted {
            self.pending = None;
        } else {
            let wins = match &self.pending {
                Some(p) if p.scene == raw => p.wins + 1,
                _ => 1,
            };
            if wins >= required {
                self.accepted = raw.clone();
                self.pending = None;
            } else {
                debug!(tick, candidate = %raw, wins, required, "장면 확정 대기");
                self.pending = Some(PendingScene {
                    scene: raw.clone(),
                    wins,
                    required,
                });
            }
        }

        let changed = previous != self.accepted;
        if changed {
            info!(tick, from = %previous, to = %self.accepted, "장면 전환");
        }

        SceneVerdict {
            scene: self.accepted.clone(),
            raw,
            pending: self.pending.clone(),
            changed,
        }
    }

    /// 이력 기록 및 오래된 항목 제거
    fn record(&mut self, tick: u64, detections: &[Detection]) {
        self.history.push_back(HistoryEntry {
            tick,
            detections: detections.to_vec(),
        });
        let horizon = tick.saturating_sub(u64::from(self.staleness_ticks));
        while self
            .history
            .front()
            .is_some_and(|entry| entry.tick < horizon)
        {
            self.history.pop_front();
        }
    }

    /// 규칙 평가 → (원시 장면, 확정에 필요한 연속 횟수)
    fn evaluate(&self, tick: u64) -> (Scene, u32) {
        for rule in &self.rules {
            let carryover = rule.carryover_ticks.min(self.staleness_ticks);
            let window = self.window(tick, carryover);
            if rule.matcher.matches(&window, self.frame_size) {
                return (Scene::Known(rule.scene.clone()), rule.confirmations.max(1));
            }
        }
        (Scene::Unknown, self.unknown_confirmations)
    }

    /// 나이가 `carryover` 이하인 인식 결과 모음
    fn window(&self, tick: u64, carryover: u32) -> Vec<Detection> {
        let oldest = tick.saturating_sub(u64::from(carryover));
        self.history
            .iter()
            .filter(|entry| entry.tick >= oldest && entry.tick <= tick)
            .flat_map(|entry| entry.detections.iter().cloned())
            .collect()
    }
}
