//! 파티 슬롯 판독.
//!
//! 화면 우측 캐릭터 이름표(`char_1_text` 등) 중 현재 조작 중인 캐릭터의 이름표만 사라진다.
//! 이름표가 1~2개 보이면 필드(파티 UI 표시) 상태이며, 첫 번째로 빠진 슬롯이 활성 캐릭터다.

use serde::{Deserialize, Serialize};
use wavepilot_core::models::detection::{best_by_label, Detection};

/// 이름표 인식 최소 신뢰도
pub const TEAM_LABEL_THRESHOLD: f32 = 0.8;

/// 파티 UI 판독 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamState {
    /// 파티 UI 표시 여부
    pub in_team: bool,
    /// 활성 슬롯 (0부터)
    pub active_slot: Option<usize>,
    /// 파티 인원 (보이는 이름표 + 활성 캐릭터)
    pub size: usize,
}

/// 슬롯별 이름표 레이블로 파티 상태 판독
pub fn read_team(detections: &[Detection], labels: &[String]) -> TeamState {
    let present: Vec<bool> = labels
        .iter()
        .map(|label| {
            best_by_label(detections, label).is_some_and(|d| d.confidence >= TEAM_LABEL_THRESHOLD)
        })
        .collect();
    let exist = present.iter().filter(|p| **p).count();
    let in_team = exist >= 1 && exist < labels.len();

    TeamState {
        in_team,
        active_slot: if in_team {
            present.iter().position(|p| !p)
        } else {
            None
        },
        size: exist + 1,
    }
}
