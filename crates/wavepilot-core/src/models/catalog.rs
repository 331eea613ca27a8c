//! 정적 카탈로그 (장면 규칙, 태스크, 캐릭터 스킬 테이블).
//!
//! 시작 시 한 번 로드되며 실행 중에는 변경되지 않는다.
//! 참조 무결성 검증은 스케줄러 레지스트리가 담당한다.

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::combat::SkillTable;
use super::scene::SceneRule;
use super::task::{TaskDescriptor, TaskId};
use crate::error::CoreError;

/// 카탈로그
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    /// 장면 규칙 (선언 순서 = 우선순위)
    #[serde(default)]
    pub scenes: Vec<SceneRule>,
    /// 태스크 (선언 순서 = 동순위 트리거 처리 순서)
    #[serde(default)]
    pub tasks: Vec<TaskDescriptor>,
    /// 캐릭터 스킬 테이블
    #[serde(default)]
    pub characters: Vec<SkillTable>,
}

impl Catalog {
    /// JSON 문자열에서 파싱
    pub fn from_json(json: &str) -> Result<Self, CoreError> {
        Ok(serde_json::from_str(json)?)
    }

    /// 파일에서 로드
    pub fn load(path: &Path) -> Result<Self, CoreError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            CoreError::Config(format!("카탈로그 파일 읽기 실패 ({}): {e}", path.display()))
        })?;
        Self::from_json(&content)
    }

    /// 파일로 저장 (사람이 읽기 쉬운 형식)
    pub fn save(&self, path: &Path) -> Result<(), CoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn task(&self, id: &TaskId) -> Option<&TaskDescriptor> {
        self.tasks.iter().find(|t| &t.id == id)
    }

    pub fn character(&self, id: &str) -> Option<&SkillTable> {
        self.characters.iter().find(|c| c.character == id)
    }
}
