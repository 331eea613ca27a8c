//! 입력 감사 로깅.
//!
//! 실제로 전송된 모든 입력 이벤트를 `(틱, 태스크, 이벤트)` 단위로 로컬 버퍼에 기록한다.
//! 버퍼가 가득 차면 가장 오래된 항목부터 버린다.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;
use wavepilot_core::models::action::InputEvent;
use wavepilot_core::models::task::TaskId;

/// 감사 로그 항목
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    /// 엔트리 고유 ID
    pub entry_id: String,
    /// 기록 시각
    pub timestamp: DateTime<Utc>,
    /// 스케줄러 틱
    pub tick: u64,
    /// 입력을 발생시킨 태스크
    pub task_id: TaskId,
    /// 전송된 이벤트
    pub event: InputEvent,
}

/// 입력 감사 로거
pub struct InputAudit {
    buffer: VecDeque<AuditEntry>,
    max_buffer_size: usize,
}

impl InputAudit {
    /// 새 감사 로거 생성
    pub fn new(max_buffer_size: usize) -> Self {
        Self {
            buffer: VecDeque::with_capacity(max_buffer_size.min(4_096)),
            max_buffer_size: max_buffer_size.max(1),
        }
    }

    /// 전송된 이벤트 기록
    pub fn record(&mut self, tick: u64, task_id: &TaskId, event: &InputEvent) {
        if self.buffer.len() >= self.max_buffer_size {
            self.buffer.pop_front();
            warn!("입력 감사 버퍼 오버플로, 가장 오래된 항목 삭제");
        }
        self.buffer.push_back(AuditEntry {
            entry_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            tick,
            task_id: task_id.clone(),
            event: event.clone(),
        });
    }

    /// 보관 중인 항목 수
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// 전체 항목 (오래된 순)
    pub fn entries(&self) -> impl Iterator<Item = &AuditEntry> {
        self.buffer.iter()
    }

    /// 최근 N개 항목 (최신 순)
    pub fn recent_entries(&self, limit: usize) -> Vec<AuditEntry> {
        self.buffer.iter().rev().take(limit).cloned().collect()
    }

    /// 특정 태스크가 발생시킨 이벤트 (오래된 순)
    pub fn events_for(&self, task_id: &TaskId) -> Vec<InputEvent> {
        self.buffer
            .iter()
            .filter(|e| &e.task_id == task_id)
            .map(|e| e.event.clone())
            .collect()
    }

    /// 틱별로 입력을 발생시킨 태스크 집합
    pub fn tasks_by_tick(&self) -> BTreeMap<u64, BTreeSet<TaskId>> {
        let mut map: BTreeMap<u64, BTreeSet<TaskId>> = BTreeMap::new();
        for entry in &self.buffer {
            map.entry(entry.tick)
                .or_default()
                .insert(entry.task_id.clone());
        }
        map
    }

    /// 모든 항목 꺼내기 (셧다운 시 사용)
    pub fn drain_all(&mut self) -> Vec<AuditEntry> {
        self.buffer.drain(..).collect()
    }
}

impl Default for InputAudit {
    fn default() -> Self {
        Self::new(1000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(k: &str) -> InputEvent {
        InputEvent::KeyDown { key: k.to_string() }
    }

    #[test]
    fn record_and_group_by_tick() {
        let mut audit = InputAudit::new(100);
        let daily = TaskId::new("daily");
        let pickup = TaskId::new("auto_pickup");
        audit.record(1, &daily, &key("a"));
        audit.record(1, &daily, &key("b"));
        audit.record(2, &pickup, &key("f"));

        assert_eq!(audit.len(), 3);
        let by_tick = audit.tasks_by_tick();
        assert_eq!(by_tick[&1].len(), 1);
        assert!(by_tick[&2].contains(&pickup));
        assert_eq!(audit.events_for(&daily).len(), 2);
    }

    #[test]
    fn buffer_overflow_evicts_oldest() {
        let mut audit = InputAudit::new(3);
        let t = TaskId::new("t");
        for (tick, k) in ["a", "b", "c", "d"].iter().enumerate() {
            audit.record(tick as u64, &t, &key(k));
        }
        assert_eq!(audit.len(), 3);
        let entries = audit.drain_all();
        assert_eq!(entries[0].tick, 1);
        assert!(audit.is_empty());
    }

    #[test]
    fn recent_entries_newest_first() {
        let mut audit = InputAudit::default();
        let t = TaskId::new("t");
        audit.record(1, &t, &key("a"));
        audit.record(2, &t, &key("b"));
        let recent = audit.recent_entries(1);
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].tick, 2);
    }
}
