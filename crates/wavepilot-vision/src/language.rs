//! 게임 클라이언트 언어 판별.
//!
//! 창 제목으로 언어를 판별하고, 언어별 템플릿 레이블(`<feature>_<lang>`)을
//! 카탈로그가 쓰는 공통 레이블로 정규화한다.

use serde::{Deserialize, Serialize};
use tracing::debug;
use wavepilot_core::models::detection::Detection;

/// 게임 클라이언트 언어
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GameLanguage {
    #[serde(rename = "zh_CN")]
    ZhCn,
    #[serde(rename = "zh_TW")]
    ZhTw,
    #[serde(rename = "en_US")]
    EnUs,
    #[default]
    #[serde(rename = "unknown_lang")]
    Unknown,
}

impl GameLanguage {
    /// 창 제목으로 언어 판별
    pub fn from_window_title(title: &str) -> Self {
        if title.contains("鸣潮") {
            GameLanguage::ZhCn
        } else if title.contains("Wuthering") {
            GameLanguage::EnUs
        } else if title.contains("鳴潮") {
            GameLanguage::ZhTw
        } else {
            GameLanguage::Unknown
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            GameLanguage::ZhCn => "zh_CN",
            GameLanguage::ZhTw => "zh_TW",
            GameLanguage::EnUs => "en_US",
            GameLanguage::Unknown => "unknown_lang",
        }
    }

    /// 언어별 레이블을 공통 레이블로 정규화
    ///
    /// `<feature>_<lang>` 레이블은 현재 언어와 일치할 때만 `<feature>`로 바뀐다.
    /// 같은 기능의 공통 레이블이 함께 있으면 언어별 결과가 먼저 오도록 정렬한다.
    pub fn localize(&self, detections: &mut Vec<Detection>) {
        if *self == GameLanguage::Unknown {
            return;
        }
        let suffix = format!("_{}", self.code());
        let mut localized = Vec::new();
        let mut rest = Vec::new();
        for mut d in detections.drain(..) {
            match d.label.strip_suffix(suffix.as_str()) {
                Some(feature) if !feature.is_empty() => {
                    d.label = feature.to_string();
                    localized.push(d);
                }
                _ => rest.push(d),
            }
        }
        if !localized.is_empty() {
            debug!(lang = self.code(), count = localized.len(), "언어별 레이블 정규화");
        }
        localized.extend(rest);
        *detections = localized;
    }
}
