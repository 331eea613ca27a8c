//! 에코(声骸) 부옵션 평가 모델.
//!
//! 에코 패널에서 읽은 부옵션(`EchoProfile`)을 캐릭터별 가중치(`EntryCoef`)로 점수화하고,
//! 만렙(+25)까지 강화했을 때의 기대 점수와 목표 점수 도달 확률을 계산한다.
//!
//! - 부옵션 슬롯은 5개, 5레벨마다 하나씩 열린다.
//! - 새 슬롯의 옵션은 아직 없는 옵션 중에서 균등하게 뽑힌다고 가정한다.
//! - 옵션별 수치 분포는 `StatTable`이 가진다 (내장 테이블: [`StatTable::builtin`]).

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// 부옵션 슬롯 수
pub const SUB_STAT_SLOTS: usize = 5;

/// 최대 강화 레벨
pub const MAX_ECHO_LEVEL: u8 = 25;

/// 확률 분포 병합용 점수 양자화 배율
const SCORE_SCALE: f64 = 10_000.0;

// ============================================================
// 옵션 종류
// ============================================================

/// 부옵션 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatKey {
    AtkRate,
    AtkNum,
    DefRate,
    DefNum,
    HpRate,
    HpNum,
    CriRate,
    CriDmg,
    NormalDmg,
    ChargedAtk,
    ResonanceSkill,
    ResonanceBurst,
    ResonanceEff,
}

impl StatKey {
    pub const ALL: [StatKey; 13] = [
        StatKey::AtkRate,
        StatKey::AtkNum,
        StatKey::DefRate,
        StatKey::DefNum,
        StatKey::HpRate,
        StatKey::HpNum,
        StatKey::CriRate,
        StatKey::CriDmg,
        StatKey::NormalDmg,
        StatKey::ChargedAtk,
        StatKey::ResonanceSkill,
        StatKey::ResonanceBurst,
        StatKey::ResonanceEff,
    ];

    /// 게임 화면에 표시되는 옵션 이름
    pub fn display_name(&self) -> &'static str {
        match self {
            StatKey::AtkRate | StatKey::AtkNum => "攻击",
            StatKey::DefRate | StatKey::DefNum => "防御",
            StatKey::HpRate | StatKey::HpNum => "生命",
            StatKey::CriRate => "暴击",
            StatKey::CriDmg => "暴击伤害",
            StatKey::NormalDmg => "普攻伤害加成",
            StatKey::ChargedAtk => "重击伤害加成",
            StatKey::ResonanceSkill => "共鸣技能伤害加成",
            StatKey::ResonanceBurst => "共鸣解放伤害加成",
            StatKey::ResonanceEff => "共鸣效率",
        }
    }

    /// 퍼센트 수치 옵션인지 (고정 수치 공격/방어/생명만 false)
    pub fn is_percentage(&self) -> bool {
        !matches!(self, StatKey::AtkNum | StatKey::DefNum | StatKey::HpNum)
    }
}

/// 옵션 수치 하나와 그 확률
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StatRoll {
    pub value: f64,
    pub probability: f64,
}

// ============================================================
// 에코 / 가중치
// ============================================================

/// 에코 패널 판독 결과
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EchoProfile {
    /// 강화 레벨 (0 ~ 25)
    pub level: u8,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    /// 열린 부옵션 (수치는 화면 표기 그대로, 퍼센트는 % 단위)
    #[serde(default)]
    pub stats: BTreeMap<StatKey, f64>,
}

impl EchoProfile {
    pub fn new(level: u8) -> Self {
        Self {
            level,
            ..Self::default()
        }
    }

    pub fn with_stat(mut self, key: StatKey, value: f64) -> Self {
        self.stats.insert(key, value);
        self
    }

    /// 값이 있는 부옵션 수
    pub fn filled_slots(&self) -> usize {
        self.stats.values().filter(|v| **v > 0.0).count()
    }

    fn has(&self, key: StatKey) -> bool {
        self.stats.get(&key).is_some_and(|v| *v > 0.0)
    }

    /// 판독 결과가 게임 규칙에 맞는지
    ///
    /// 레벨 범위, 레벨에 맞는 슬롯 수, 각 수치가 분포표에 있는 값인지 확인한다.
    pub fn is_consistent(&self, table: &StatTable) -> bool {
        if self.level > MAX_ECHO_LEVEL {
            return false;
        }
        if self.filled_slots() != usize::from(self.level / 5) {
            return false;
        }
        self.stats
            .iter()
            .filter(|(_, v)| **v > 0.0)
            .all(|(key, value)| table.is_valid_roll(*key, *value))
    }
}

/// 캐릭터 피해 기준 능력치
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DmgSource {
    Atk,
    Hp,
    Def,
}

/// 옵션별 가중치
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryCoef {
    #[serde(default)]
    pub weights: BTreeMap<StatKey, f64>,
}

impl Default for EntryCoef {
    /// 치명 위주 기본 가중치 (공격력 기준)
    fn default() -> Self {
        Self::for_dmg_source(DmgSource::Atk)
    }
}

impl EntryCoef {
    /// 피해 기준 능력치에 맞춘 가중치
    ///
    /// 치명타 확률 2, 치명타 피해 1, 기준 능력치 % 1, 기준 능력치 고정 수치는 환산 계수.
    pub fn for_dmg_source(source: DmgSource) -> Self {
        let mut weights = BTreeMap::from([(StatKey::CriRate, 2.0), (StatKey::CriDmg, 1.0)]);
        let (rate, num, num_weight) = match source {
            DmgSource::Atk => (StatKey::AtkRate, StatKey::AtkNum, 0.125),
            DmgSource::Def => (StatKey::DefRate, StatKey::DefNum, 0.125),
            DmgSource::Hp => (StatKey::HpRate, StatKey::HpNum, 0.00675),
        };
        weights.insert(rate, 1.0);
        weights.insert(num, num_weight);
        Self { weights }
    }

    pub fn with_weight(mut self, key: StatKey, weight: f64) -> Self {
        self.weights.insert(key, weight);
        self
    }

    pub fn weight(&self, key: StatKey) -> f64 {
        self.weights.get(&key).copied().unwrap_or(0.0)
    }
}

// ============================================================
// 분포표 / 점수 계산
// ============================================================

/// 옵션별 수치 분포표
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatTable {
    pub rolls: BTreeMap<StatKey, Vec<StatRoll>>,
}

static BUILTIN_TABLE: Lazy<StatTable> = Lazy::new(StatTable::standard);

/// 8단계 옵션 확률
const EIGHT_TIERS: [f64; 8] = [0.2, 0.2, 0.2, 0.15, 0.1, 0.07, 0.05, 0.03];
/// 4단계 옵션 확률
const FOUR_TIERS: [f64; 4] = [0.3, 0.3, 0.25, 0.15];

fn roll_table(values: &[f64], probabilities: &[f64]) -> Vec<StatRoll> {
    values
        .iter()
        .zip(probabilities)
        .map(|(value, probability)| StatRoll {
            value: *value,
            probability: *probability,
        })
        .collect()
}

impl StatTable {
    /// 내장 분포표
    pub fn builtin() -> &'static StatTable {
        &BUILTIN_TABLE
    }

    fn standard() -> Self {
        let dmg_bonus = [6.4, 7.1, 7.9, 8.6, 9.4, 10.1, 10.9, 11.6];
        let table = [
            (StatKey::AtkRate, roll_table(&dmg_bonus, &EIGHT_TIERS)),
            (StatKey::AtkNum, roll_table(&[30.0, 40.0, 50.0, 60.0], &FOUR_TIERS)),
            (
                StatKey::DefRate,
                roll_table(&[8.1, 9.0, 10.0, 10.9, 11.8, 12.8, 13.8, 14.7], &EIGHT_TIERS),
            ),
            (StatKey::DefNum, roll_table(&[40.0, 50.0, 60.0, 70.0], &FOUR_TIERS)),
            (StatKey::HpRate, roll_table(&dmg_bonus, &EIGHT_TIERS)),
            (
                StatKey::HpNum,
                roll_table(
                    &[320.0, 360.0, 390.0, 430.0, 470.0, 510.0, 540.0, 580.0],
                    &EIGHT_TIERS,
                ),
            ),
            (
                StatKey::CriRate,
                roll_table(&[6.3, 6.9, 7.5, 8.1, 8.7, 9.3, 9.9, 10.5], &EIGHT_TIERS),
            ),
            (
                StatKey::CriDmg,
                roll_table(
                    &[12.6, 13.8, 15.0, 16.2, 17.4, 18.6, 19.8, 21.0],
                    &EIGHT_TIERS,
                ),
            ),
            (StatKey::NormalDmg, roll_table(&dmg_bonus, &EIGHT_TIERS)),
            (StatKey::ChargedAtk, roll_table(&dmg_bonus, &EIGHT_TIERS)),
            (StatKey::ResonanceSkill, roll_table(&dmg_bonus, &EIGHT_TIERS)),
            (StatKey::ResonanceBurst, roll_table(&dmg_bonus, &EIGHT_TIERS)),
            (
                StatKey::ResonanceEff,
                roll_table(&[6.8, 7.6, 8.4, 9.2, 10.0, 10.8, 11.6, 12.4], &EIGHT_TIERS),
            ),
        ];
        Self {
            rolls: table.into_iter().collect(),
        }
    }

    pub fn rolls(&self, key: StatKey) -> &[StatRoll] {
        self.rolls.get(&key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// 분포표에 있는 수치인지 (소수점 표기 오차 허용)
    pub fn is_valid_roll(&self, key: StatKey, value: f64) -> bool {
        self.rolls(key)
            .iter()
            .any(|r| (r.value - value).abs() < 1e-6)
    }

    /// 아직 열리지 않은 옵션 후보
    fn pool(&self, profile: &EchoProfile) -> Vec<StatKey> {
        self.rolls
            .keys()
            .copied()
            .filter(|k| !profile.has(*k))
            .collect()
    }

    fn remaining_slots(profile: &EchoProfile) -> usize {
        SUB_STAT_SLOTS.saturating_sub(profile.filled_slots())
    }

    /// 현재 점수 (가중치 × 수치 합)
    pub fn score(&self, profile: &EchoProfile, coef: &EntryCoef) -> f64 {
        profile
            .stats
            .iter()
            .map(|(key, value)| value * coef.weight(*key))
            .sum()
    }

    /// 남은 슬롯을 가장 유리한 옵션의 최대 수치로 채웠을 때의 점수
    pub fn max_possible_score(&self, profile: &EchoProfile, coef: &EntryCoef) -> f64 {
        let current = self.score(profile, coef);
        let mut best: Vec<f64> = self
            .pool(profile)
            .into_iter()
            .map(|key| {
                let max = self
                    .rolls(key)
                    .iter()
                    .map(|r| r.value)
                    .fold(0.0, f64::max);
                max * coef.weight(key)
            })
            .collect();
        best.sort_by(|a, b| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));
        current + best.iter().take(Self::remaining_slots(profile)).sum::<f64>()
    }

    /// 만렙 기대 점수 (슬롯당 후보 옵션 평균 기대값 × 남은 슬롯)
    pub fn expected_score(&self, profile: &EchoProfile, coef: &EntryCoef) -> f64 {
        let current = self.score(profile, coef);
        let remaining = Self::remaining_slots(profile);
        let pool = self.pool(profile);
        if remaining == 0 || pool.is_empty() {
            return current;
        }
        let pool_sum: f64 = pool
            .iter()
            .map(|key| {
                let mean: f64 = self
                    .rolls(*key)
                    .iter()
                    .map(|r| r.value * r.probability)
                    .sum();
                mean * coef.weight(*key)
            })
            .sum();
        current + pool_sum / pool.len() as f64 * remaining as f64
    }

    /// 만렙까지 강화했을 때 점수가 `threshold` 이상일 확률
    ///
    /// 남은 슬롯 수만큼의 옵션 조합을 모두 나열하고, 조합마다 수치 분포를 합성곱해 평균낸다.
    pub fn prob_above_score(&self, profile: &EchoProfile, coef: &EntryCoef, threshold: f64) -> f64 {
        let needed = threshold - self.score(profile, coef);
        if needed <= 0.0 {
            return 1.0;
        }
        let k = Self::remaining_slots(profile);
        let pool = self.pool(profile);
        if k == 0 || pool.len() < k {
            return 0.0;
        }

        let dists: Vec<BTreeMap<i64, f64>> = pool
            .iter()
            .map(|key| {
                let weight = coef.weight(*key);
                let mut dist = BTreeMap::new();
                if weight == 0.0 {
                    dist.insert(0, 1.0);
                } else {
                    for roll in self.rolls(*key) {
                        let score = (roll.value * weight * SCORE_SCALE).round() as i64;
                        *dist.entry(score).or_insert(0.0) += roll.probability;
                    }
                }
                dist
            })
            .collect();

        let needed_q = (needed * SCORE_SCALE).round() as i64 - 1;
        let mut total = 0.0;
        let mut combos = 0u64;
        for_each_combination(pool.len(), k, &mut |combo| {
            combos += 1;
            let mut acc = BTreeMap::from([(0i64, 1.0)]);
            for idx in combo {
                let mut next = BTreeMap::new();
                for (s1, p1) in &acc {
                    for (s2, p2) in &dists[*idx] {
                        *next.entry(s1 + s2).or_insert(0.0) += p1 * p2;
                    }
                }
                acc = next;
            }
            total += acc.range(needed_q..).map(|(_, p)| p).sum::<f64>();
        });

        if combos == 0 {
            0.0
        } else {
            total / combos as f64
        }
    }

    /// 새 에코(+0) 최대 점수 대비 기대 점수 비율
    pub fn expected_ratio(&self, profile: &EchoProfile, coef: &EntryCoef) -> f64 {
        let potential = self.max_possible_score(&EchoProfile::default(), coef);
        let potential = if potential <= 0.0 { 1.0 } else { potential };
        self.expected_score(profile, coef) / potential
    }
}

/// `n`개 중 `k`개 조합을 사전순으로 방문
fn for_each_combination(n: usize, k: usize, visit: &mut impl FnMut(&[usize])) {
    fn go(start: usize, n: usize, k: usize, picked: &mut Vec<usize>, visit: &mut impl FnMut(&[usize])) {
        if picked.len() == k {
            visit(picked);
            return;
        }
        let need = k - picked.len();
        for i in start..=n.saturating_sub(need) {
            picked.push(i);
            go(i + 1, n, k, picked, visit);
            picked.pop();
        }
    }
    if k > n {
        return;
    }
    go(0, n, k, &mut Vec::with_capacity(k), visit);
}

// ============================================================
// 보존 판정
// ============================================================

/// 에코 보존 기준
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EchoKeepRule {
    #[serde(default)]
    pub coef: EntryCoef,
    /// 최소 기대 점수 비율 (새 에코 최대 점수 대비)
    pub threshold: f64,
    /// 있으면 목표 점수(threshold × 최대 점수) 도달 확률도 이 값 이상이어야 한다
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_chance: Option<f64>,
}

impl EchoKeepRule {
    pub fn keeps(&self, profile: &EchoProfile, table: &StatTable) -> bool {
        let ratio = table.expected_ratio(profile, &self.coef);
        if ratio < self.threshold {
            return false;
        }
        let Some(min_chance) = self.min_chance else {
            return true;
        };
        let target = self.threshold * table.max_possible_score(&EchoProfile::default(), &self.coef);
        table.prob_above_score(profile, &self.coef, target) >= min_chance
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> &'static StatTable {
        StatTable::builtin()
    }

    #[test]
    fn builtin_probabilities_sum_to_one() {
        for key in StatKey::ALL {
            let sum: f64 = table().rolls(key).iter().map(|r| r.probability).sum();
            assert!((sum - 1.0).abs() < 1e-9, "{key:?}: {sum}");
        }
    }

    #[test]
    fn score_uses_weights() {
        let coef = EntryCoef::default();
        let profile = EchoProfile::new(10)
            .with_stat(StatKey::CriRate, 8.1)
            .with_stat(StatKey::DefNum, 50.0);
        assert!((table().score(&profile, &coef) - 16.2).abs() < 1e-9);
    }

    #[test]
    fn max_possible_fills_best_slots() {
        let coef = EntryCoef::default();
        // 치명 21, 치확 10.5×2, 공% 11.6, 공 60×0.125, 나머지 0
        let fresh = table().max_possible_score(&EchoProfile::default(), &coef);
        assert!((fresh - (21.0 + 21.0 + 11.6 + 7.5)).abs() < 1e-9);

        let full = EchoProfile::new(25)
            .with_stat(StatKey::HpNum, 320.0)
            .with_stat(StatKey::DefNum, 40.0)
            .with_stat(StatKey::DefRate, 8.1)
            .with_stat(StatKey::HpRate, 6.4)
            .with_stat(StatKey::ResonanceEff, 6.8);
        assert_eq!(table().max_possible_score(&full, &coef), 0.0);
    }

    #[test]
    fn probability_bounds() {
        let coef = EntryCoef::default();
        let fresh = EchoProfile::default();
        assert_eq!(table().prob_above_score(&fresh, &coef, 0.0), 1.0);
        assert_eq!(table().prob_above_score(&fresh, &coef, 1_000.0), 0.0);

        let p = table().prob_above_score(&fresh, &coef, 20.0);
        assert!(p > 0.0 && p < 1.0, "p = {p}");
    }

    #[test]
    fn single_slot_probability_matches_distribution() {
        // 치명 옵션 하나만 가중치를 가지고 남은 슬롯도 하나
        let coef = EntryCoef {
            weights: BTreeMap::from([(StatKey::CriDmg, 1.0)]),
        };
        let profile = EchoProfile::new(20)
            .with_stat(StatKey::HpNum, 320.0)
            .with_stat(StatKey::DefNum, 40.0)
            .with_stat(StatKey::DefRate, 8.1)
            .with_stat(StatKey::HpRate, 6.4);
        // 후보 9개 중 치명 피해가 뽑히고 19.8 이상일 확률
        let p = table().prob_above_score(&profile, &coef, 19.8);
        assert!((p - (0.05 + 0.03) / 9.0).abs() < 1e-9, "p = {p}");
    }

    #[test]
    fn crit_echo_is_kept_and_flat_echo_is_not() {
        let rule = EchoKeepRule {
            coef: EntryCoef::default(),
            threshold: 0.5,
            min_chance: None,
        };
        let crit = EchoProfile::new(10)
            .with_stat(StatKey::CriRate, 9.9)
            .with_stat(StatKey::CriDmg, 19.8);
        let flat = EchoProfile::new(10)
            .with_stat(StatKey::HpNum, 320.0)
            .with_stat(StatKey::DefNum, 40.0);
        assert!(rule.keeps(&crit, table()));
        assert!(!rule.keeps(&flat, table()));

        // 기대 비율은 넘지만 목표 점수 도달이 확실하지 않음
        let strict = EchoKeepRule {
            threshold: 0.7,
            min_chance: Some(1.0),
            ..rule.clone()
        };
        assert!(!strict.keeps(&crit, table()));
        let lenient = EchoKeepRule {
            min_chance: Some(0.0),
            ..strict
        };
        assert!(lenient.keeps(&crit, table()));
    }

    #[test]
    fn consistency_checks_slots_and_rolls() {
        let ok = EchoProfile::new(10)
            .with_stat(StatKey::CriRate, 6.3)
            .with_stat(StatKey::AtkNum, 40.0);
        assert!(ok.is_consistent(table()));

        let missing_slot = EchoProfile::new(10).with_stat(StatKey::CriRate, 6.3);
        assert!(!missing_slot.is_consistent(table()));

        let bad_roll = EchoProfile::new(5).with_stat(StatKey::CriRate, 6.4);
        assert!(!bad_roll.is_consistent(table()));

        assert!(!EchoProfile::new(30).is_consistent(table()));
    }

    #[test]
    fn combinations_are_complete() {
        let mut seen = Vec::new();
        for_each_combination(4, 2, &mut |c| seen.push(c.to_vec()));
        assert_eq!(
            seen,
            vec![
                vec![0, 1],
                vec![0, 2],
                vec![0, 3],
                vec![1, 2],
                vec![1, 3],
                vec![2, 3]
            ]
        );
    }
}
