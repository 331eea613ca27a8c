//! 에코 패널 OCR 판독.
//!
//! 에코 상세 패널의 OCR 결과에서 강화 레벨(`+N`)과 부옵션 줄(`暴击 6.3%`)을 읽어
//! `EchoProfile`을 만든다. 레벨 표기가 없으면 패널이 열려 있지 않은 것으로 본다.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;
use wavepilot_core::models::detection::{Detection, DetectionKind};
use wavepilot_core::models::echo::{EchoProfile, StatKey, MAX_ECHO_LEVEL};
use wavepilot_core::models::frame::{FrameSize, RelativeRect};

static LEVEL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\+(\d{1,2})$").unwrap_or_else(|e| unreachable!("정적 정규식 오류: {e}")));
static VALUE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d+(?:\.\d+)?)").unwrap_or_else(|e| unreachable!("정적 정규식 오류: {e}"))
});

/// 화면 우측 에코 상세 패널 영역
pub const ECHO_PANEL_REGION: RelativeRect = RelativeRect {
    x: 0.60,
    y: 0.10,
    width: 0.35,
    height: 0.75,
};

/// OCR 결과에서 에코 패널 판독
///
/// 프레임 크기를 알면 `ECHO_PANEL_REGION` 밖의 결과는 무시한다.
/// 같은 옵션이 두 번 읽히면 처음 것을 쓴다.
pub fn read_echo(detections: &[Detection], frame: Option<FrameSize>) -> Option<EchoProfile> {
    let area = frame.map(|size| ECHO_PANEL_REGION.to_absolute(size));
    let lines: Vec<&str> = detections
        .iter()
        .filter(|d| d.kind == DetectionKind::Ocr)
        .filter(|d| area.map_or(true, |a| a.encloses(&d.region)))
        .map(|d| d.label.trim())
        .collect();

    let level = lines.iter().find_map(|text| {
        LEVEL_RE
            .captures(text)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse::<u8>().ok())
            .filter(|level| *level <= MAX_ECHO_LEVEL)
    })?;

    let mut profile = EchoProfile::new(level);
    for text in &lines {
        if let Some((key, value)) = parse_stat_line(text) {
            profile.stats.entry(key).or_insert(value);
        }
    }
    debug!(level, stats = profile.stats.len(), "에코 패널 판독");
    Some(profile)
}

/// 부옵션 한 줄 해석
///
/// 표시 이름이 가장 길게 일치하는 옵션을 고르고, `%` 유무로 퍼센트/고정 수치를 가른다.
/// 이름이 깨진 경우 핵심 글자(攻, 防, 生, 暴, 充)로 추정한다.
pub fn parse_stat_line(text: &str) -> Option<(StatKey, f64)> {
    let line: String = text
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ':' && *c != '：')
        .collect();
    let value = VALUE_RE
        .captures(&line)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())?;
    let percentage = line.contains('%');

    let by_name = StatKey::ALL
        .iter()
        .filter(|key| key.is_percentage() == percentage && line.contains(key.display_name()))
        .max_by_key(|key| key.display_name().chars().count())
        .copied();

    by_name
        .or_else(|| guess_stat(&line, percentage))
        .map(|key| (key, value))
}

fn guess_stat(line: &str, percentage: bool) -> Option<StatKey> {
    let key = if line.contains('攻') {
        if percentage {
            StatKey::AtkRate
        } else {
            StatKey::AtkNum
        }
    } else if line.contains('防') {
        if percentage {
            StatKey::DefRate
        } else {
            StatKey::DefNum
        }
    } else if line.contains('生') {
        if percentage {
            StatKey::HpRate
        } else {
            StatKey::HpNum
        }
    } else if line.contains('暴') || line.contains('爆') {
        if line.contains('伤') {
            StatKey::CriDmg
        } else {
            StatKey::CriRate
        }
    } else if line.contains('充') || line.contains('效') {
        StatKey::ResonanceEff
    } else {
        return None;
    };
    Some(key)
}
