//! 카탈로그 검증 및 태스크 레지스트리.
//!
//! 첫 틱 전에 카탈로그의 참조 무결성을 검사한다. 하나라도 실패하면 스케줄러는 시작하지 않는다.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use wavepilot_core::models::catalog::Catalog;
use wavepilot_core::models::scene::{SceneId, UNKNOWN_SCENE_NAME};
use wavepilot_core::models::task::{TaskBody, TaskDescriptor, TaskId};

use crate::error::CatalogError;

/// 검증된 태스크 목록 (선언 순서 유지)
#[derive(Debug, Clone)]
pub struct TaskRegistry {
    tasks: Vec<Arc<TaskDescriptor>>,
    index: HashMap<TaskId, usize>,
}

impl TaskRegistry {
    /// 카탈로그를 검증하고 레지스트리 생성
    ///
    /// `default_team`은 태스크에 팀이 지정되지 않은 전투 본문에 적용되는 전역 팀이다.
    pub fn build(catalog: &Catalog, default_team: &[String]) -> Result<Self, CatalogError> {
        validate_catalog(catalog, default_team)?;
        let tasks: Vec<Arc<TaskDescriptor>> =
            catalog.tasks.iter().cloned().map(Arc::new).collect();
        let index = tasks
            .iter()
            .enumerate()
            .map(|(i, t)| (t.id.clone(), i))
            .collect();
        Ok(Self { tasks, index })
    }

    pub fn get(&self, id: &TaskId) -> Option<&Arc<TaskDescriptor>> {
        self.index.get(id).map(|&i| &self.tasks[i])
    }

    /// 선언 순서 인덱스
    pub fn position(&self, id: &TaskId) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<TaskDescriptor>> {
        self.tasks.iter()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

/// 카탈로그 참조 무결성 검증
pub fn validate_catalog(catalog: &Catalog, default_team: &[String]) -> Result<(), CatalogError> {
    if catalog.scenes.is_empty() {
        return Err(CatalogError::NoSceneRules);
    }

    let mut scenes: HashSet<&SceneId> = HashSet::new();
    for rule in &catalog.scenes {
        if rule.scene.as_str() == UNKNOWN_SCENE_NAME {
            return Err(CatalogError::ReservedScene {
                context: "scenes".to_string(),
            });
        }
        // 같은 장면에 대한 대체 규칙은 허용
        scenes.insert(&rule.scene);
    }

    let mut characters: HashSet<&str> = HashSet::new();
    for table in &catalog.characters {
        if !characters.insert(table.character.as_str()) {
            return Err(CatalogError::DuplicateId {
                kind: "character",
                id: table.character.clone(),
            });
        }
    }

    let mut tasks: HashMap<&TaskId, &TaskDescriptor> = HashMap::new();
    for task in &catalog.tasks {
        if tasks.insert(&task.id, task).is_some() {
            return Err(CatalogError::DuplicateId {
                kind: "task",
                id: task.id.to_string(),
            });
        }
    }

    for task in &catalog.tasks {
        validate_task(task, &scenes, &characters, &tasks, default_team)?;
    }

    detect_cycles(catalog)
}

fn validate_task(
    task: &TaskDescriptor,
    scenes: &HashSet<&SceneId>,
    characters: &HashSet<&str>,
    tasks: &HashMap<&TaskId, &TaskDescriptor>,
    default_team: &[String],
) -> Result<(), CatalogError> {
    if task.is_trigger() && task.activation.is_none() {
        return Err(CatalogError::MissingActivation {
            task: task.id.to_string(),
        });
    }

    let mut scene_refs: Vec<&SceneId> = Vec::new();
    if let Some(activation) = &task.activation {
        activation.scene_refs(&mut scene_refs);
    }
    let mut sub_refs: Vec<&TaskId> = Vec::new();

    match &task.body {
        TaskBody::Steps { steps } => {
            for step in steps {
                step.scene_refs(&mut scene_refs);
                step.subsequence_refs(&mut sub_refs);
            }
        }
        TaskBody::Combat(spec) => {
            scene_refs.push(&spec.combat_scene);
            if let Some(resync) = &spec.resync_task {
                sub_refs.push(resync);
            }
            let team = if spec.team.is_empty() {
                default_team
            } else {
                &spec.team
            };
            for character in team {
                if !characters.contains(character.as_str()) {
                    return Err(CatalogError::UnknownCharacter {
                        task: task.id.to_string(),
                        character: character.clone(),
                    });
                }
            }
        }
    }

    for scene in scene_refs {
        if scene.as_str() == UNKNOWN_SCENE_NAME {
            return Err(CatalogError::ReservedScene {
                context: task.id.to_string(),
            });
        }
        if !scenes.contains(scene) {
            return Err(CatalogError::UnknownScene {
                task: task.id.to_string(),
                scene: scene.to_string(),
            });
        }
    }

    for target in sub_refs {
        match tasks.get(target) {
            None => {
                return Err(CatalogError::UnknownSubSequence {
                    task: task.id.to_string(),
                    target: target.to_string(),
                })
            }
            Some(t) if t.step_list().is_none() => {
                return Err(CatalogError::NotASequence {
                    task: task.id.to_string(),
                    target: target.to_string(),
                })
            }
            Some(_) => {}
        }
    }

    Ok(())
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Done,
}

/// 하위 시퀀스 그래프 순환 검사 (DFS)
fn detect_cycles(catalog: &Catalog) -> Result<(), CatalogError> {
    let mut edges: HashMap<&TaskId, Vec<&TaskId>> = HashMap::new();
    for task in &catalog.tasks {
        let mut refs = Vec::new();
        if let Some(steps) = task.step_list() {
            steps.iter().for_each(|s| s.subsequence_refs(&mut refs));
        }
        edges.insert(&task.id, refs);
    }

    let mut marks: HashMap<&TaskId, Mark> = HashMap::new();
    let mut path: Vec<&TaskId> = Vec::new();
    for task in &catalog.tasks {
        visit(&task.id, &edges, &mut marks, &mut path)?;
    }
    Ok(())
}

fn visit<'a>(
    node: &'a TaskId,
    edges: &HashMap<&'a TaskId, Vec<&'a TaskId>>,
    marks: &mut HashMap<&'a TaskId, Mark>,
    path: &mut Vec<&'a TaskId>,
) -> Result<(), CatalogError> {
    match marks.get(node) {
        Some(Mark::Done) => return Ok(()),
        Some(Mark::Visiting) => {
            let start = path.iter().position(|t| *t == node).unwrap_or(0);
            let mut cycle: Vec<String> = path[start..].iter().map(|t| t.to_string()).collect();
            cycle.push(node.to_string());
            return Err(CatalogError::CyclicSubSequence { path: cycle });
        }
        None => {}
    }

    marks.insert(node, Mark::Visiting);
    path.push(node);
    if let Some(next) = edges.get(node) {
        for target in next {
            visit(*target, edges, marks, path)?;
        }
    }
    path.pop();
    marks.insert(node, Mark::Done);
    Ok(())
}
