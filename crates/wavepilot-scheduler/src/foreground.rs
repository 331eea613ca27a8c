//! 포그라운드 슬롯.
//!
//! 입력을 구동할 수 있는 태스크는 한 번에 하나뿐이다.
//! 선점된 점유자는 LIFO 스택에 쌓이고 역순으로 재개된다.

use wavepilot_core::models::task::TaskId;

/// 단일 점유 포그라운드 슬롯 + 일시정지 스택
#[derive(Debug, Default, Clone)]
pub struct ForegroundSlot {
    occupant: Option<TaskId>,
    paused: Vec<TaskId>,
}

impl ForegroundSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn occupant(&self) -> Option<&TaskId> {
        self.occupant.as_ref()
    }

    pub fn is_free(&self) -> bool {
        self.occupant.is_none()
    }

    pub fn is_occupied_by(&self, id: &TaskId) -> bool {
        self.occupant.as_ref() == Some(id)
    }

    /// 빈 슬롯 점유. 이미 점유 중이면 현재 점유자를 돌려준다.
    pub fn claim(&mut self, id: TaskId) -> Result<(), TaskId> {
        match &self.occupant {
            Some(current) => Err(current.clone()),
            None => {
                self.occupant = Some(id);
                Ok(())
            }
        }
    }

    /// 슬롯 비우기
    pub fn release(&mut self) -> Option<TaskId> {
        self.occupant.take()
    }

    /// 현재 점유자를 일시정지 스택에 넣고 새 태스크가 점유
    pub fn preempt(&mut self, id: TaskId) -> Option<TaskId> {
        let previous = self.occupant.replace(id);
        if let Some(prev) = &previous {
            self.paused.push(prev.clone());
        }
        previous
    }

    /// 일시정지 스택 맨 위 (다음 재개 대상)
    pub fn next_paused(&self) -> Option<&TaskId> {
        self.paused.last()
    }

    /// 일시정지 스택에서 꺼내기 (LIFO)
    pub fn pop_paused(&mut self) -> Option<TaskId> {
        self.paused.pop()
    }

    /// 일시정지 스택에 직접 넣기 (명시적 재개 요청)
    pub fn push_paused(&mut self, id: TaskId) {
        self.remove_paused(&id);
        self.paused.push(id);
    }

    /// 일시정지 스택에서 제거
    pub fn remove_paused(&mut self, id: &TaskId) -> bool {
        let before = self.paused.len();
        self.paused.retain(|t| t != id);
        before != self.paused.len()
    }

    /// 일시정지 스택 (아래 → 위)
    pub fn paused(&self) -> &[TaskId] {
        &self.paused
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> TaskId {
        TaskId::new(s)
    }

    #[test]
    fn claim_is_exclusive() {
        let mut slot = ForegroundSlot::new();
        assert!(slot.claim(id("daily")).is_ok());
        assert_eq!(slot.claim(id("pickup")), Err(id("daily")));
        assert!(slot.is_occupied_by(&id("daily")));
        assert_eq!(slot.release(), Some(id("daily")));
        assert!(slot.is_free());
    }

    #[test]
    fn preempted_tasks_resume_in_reverse_order() {
        let mut slot = ForegroundSlot::new();
        slot.claim(id("daily")).unwrap();
        assert_eq!(slot.preempt(id("pickup")), Some(id("daily")));
        assert_eq!(slot.preempt(id("monthly_card")), Some(id("pickup")));
        assert_eq!(slot.occupant(), Some(&id("monthly_card")));

        slot.release();
        assert_eq!(slot.pop_paused(), Some(id("pickup")));
        assert_eq!(slot.pop_paused(), Some(id("daily")));
        assert_eq!(slot.pop_paused(), None);
    }

    #[test]
    fn remove_and_push_paused() {
        let mut slot = ForegroundSlot::new();
        slot.claim(id("a")).unwrap();
        slot.preempt(id("b"));
        assert!(slot.remove_paused(&id("a")));
        assert!(!slot.remove_paused(&id("a")));
        slot.push_paused(id("a"));
        slot.push_paused(id("a"));
        assert_eq!(slot.paused(), &[id("a")]);
    }
}
