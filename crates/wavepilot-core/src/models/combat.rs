//! 캐릭터 스킬 테이블 (외부 입력 데이터).

use serde::{Deserialize, Serialize};

use super::action::ActionStep;

fn default_ready_confidence() -> f32 {
    0.7
}

/// 단일 스킬 항목
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillEntry {
    pub name: String,
    /// 클수록 먼저 고려
    #[serde(default)]
    pub priority: i32,
    /// 스킬 준비 아이콘 레이블
    pub ready_label: String,
    /// 추가 자원 조건 레이블 (예: 공명 에너지 가득 참)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_label: Option<String>,
    #[serde(default = "default_ready_confidence")]
    pub min_confidence: f32,
    /// 실행할 단계 (보통 PressKey)
    pub action: ActionStep,
}

/// 캐릭터별 스킬 테이블
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillTable {
    /// 캐릭터 ID
    pub character: String,
    #[serde(default)]
    pub skills: Vec<SkillEntry>,
    /// 사용 가능한 스킬이 없을 때의 기본 공격
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub basic_attack: Option<ActionStep>,
}

impl SkillTable {
    /// 우선순위 내림차순 정렬된 스킬 (동순위는 선언 순서)
    pub fn ordered_skills(&self) -> Vec<&SkillEntry> {
        let mut skills: Vec<&SkillEntry> = self.skills.iter().collect();
        skills.sort_by(|a, b| b.priority.cmp(&a.priority));
        skills
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(key: &str) -> ActionStep {
        ActionStep::PressKey {
            key: key.to_string(),
            hold_ms: 0,
        }
    }

    #[test]
    fn ordered_skills_is_stable() {
        let table = SkillTable {
            character: "rover".into(),
            skills: vec![
                SkillEntry {
                    name: "skill".into(),
                    priority: 1,
                    ready_label: "skill_ready".into(),
                    resource_label: None,
                    min_confidence: 0.7,
                    action: press("e"),
                },
                SkillEntry {
                    name: "liberation".into(),
                    priority: 3,
                    ready_label: "liberation_ready".into(),
                    resource_label: None,
                    min_confidence: 0.7,
                    action: press("r"),
                },
                SkillEntry {
                    name: "echo".into(),
                    priority: 1,
                    ready_label: "echo_ready".into(),
                    resource_label: None,
                    min_confidence: 0.7,
                    action: press("q"),
                },
            ],
            basic_attack: None,
        };
        let names: Vec<&str> = table
            .ordered_skills()
            .iter()
            .map(|s| s.name.as_str())
            .collect();
        assert_eq!(names, vec!["liberation", "skill", "echo"]);
    }
}
