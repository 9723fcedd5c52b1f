use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use super::card::{Card, CardId};
use super::clock::Countdown;

/// 游戏生命周期阶段。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum GamePhase {
    Idle,
    Running,
    Ended,
}

impl Default for GamePhase {
    fn default() -> Self {
        GamePhase::Idle
    }
}

/// 终局原因。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum EndReason {
    AllMatched,
    TimeLimitReached,
}

/// 终局统计，随 GameEnded 事件一并发出。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GameSummary {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_millis: Option<u64>,
    pub remaining_millis: u64,
    pub elapsed_millis: u64,
    pub matched_cards: usize,
    pub total_cards: usize,
}

/// 终局结果。整局只产生一次。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GameOutcome {
    pub success: bool,
    pub reason: EndReason,
    pub summary: GameSummary,
}

/// 游戏事件流。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum GameEvent {
    CardRevealed {
        card_id: CardId,
    },
    PairMatched {
        first_id: CardId,
        second_id: CardId,
    },
    PairMismatched {
        first_id: CardId,
        second_id: CardId,
    },
    PairConcealed {
        first_id: CardId,
        second_id: CardId,
    },
    TimeChanged {
        remaining_millis: u64,
        display: String,
    },
    GameEnded {
        outcome: GameOutcome,
    },
}

/// 构造参数不合法，建局直接失败。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum ConfigError {
    EmptyContents,
    InvalidDuration { millis: f64 },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum IntegrityError {
    OddCardCount { count: usize },
    UnpairedContent { content: String },
    DuplicateCardId { card_id: CardId },
    PendingOverflow { count: usize },
    PendingUnknownCard { card_id: CardId },
    PendingMatched { card_id: CardId },
}

/// 游戏整体状态。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GameState {
    #[serde(default)]
    pub cards: Vec<Card>,
    pub phase: GamePhase,
    /// 已亮面、等待比对的卡牌，最多两张。
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pending_pair: Vec<CardId>,
    /// 比对失败、还没盖回去的一对。此值非空期间拒绝一切新翻牌。
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unresolved_mismatch: Option<(CardId, CardId)>,
    pub countdown: Countdown,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub event_log: Vec<GameEvent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<GameOutcome>,
}

impl GameState {
    /// 建局：内容按集合语义去重，每个值复制成一对，洗牌后以 Idle 状态交付。
    pub fn new(contents: Vec<String>, duration_millis: Option<u64>) -> Result<Self, ConfigError> {
        let mut rng = SmallRng::from_entropy();
        Self::with_rng(contents, duration_millis, &mut rng)
    }

    /// 指定随机种子的建局，便于测试与回放。
    pub fn with_seed(
        contents: Vec<String>,
        duration_millis: Option<u64>,
        seed: u64,
    ) -> Result<Self, ConfigError> {
        let mut rng = SmallRng::seed_from_u64(seed);
        Self::with_rng(contents, duration_millis, &mut rng)
    }

    fn with_rng(
        contents: Vec<String>,
        duration_millis: Option<u64>,
        rng: &mut SmallRng,
    ) -> Result<Self, ConfigError> {
        // 原始输入来自 JS 的 Set，重复值按集合语义静默去重
        let mut seen = HashSet::new();
        let mut unique = Vec::new();
        for content in contents {
            if seen.insert(content.clone()) {
                unique.push(content);
            }
        }

        if unique.is_empty() {
            return Err(ConfigError::EmptyContents);
        }
        if duration_millis == Some(0) {
            return Err(ConfigError::InvalidDuration { millis: 0.0 });
        }

        let mut cards = Vec::with_capacity(unique.len() * 2);
        for (index, content) in unique.iter().enumerate() {
            let base = (index as CardId) * 2;
            cards.push(Card::new(base, content.clone()));
            cards.push(Card::new(base + 1, content.clone()));
        }
        cards.shuffle(rng);

        Ok(Self {
            cards,
            phase: GamePhase::Idle,
            pending_pair: Vec::new(),
            unresolved_mismatch: None,
            countdown: Countdown::new(duration_millis),
            event_log: Vec::new(),
            outcome: None,
        })
    }

    pub fn record_event(&mut self, event: GameEvent) {
        self.event_log.push(event);
    }

    pub fn find_card(&self, card_id: CardId) -> Option<&Card> {
        self.cards.iter().find(|card| card.id == card_id)
    }

    pub fn find_card_mut(&mut self, card_id: CardId) -> Option<&mut Card> {
        self.cards.iter_mut().find(|card| card.id == card_id)
    }

    pub fn matched_cards(&self) -> usize {
        self.cards.iter().filter(|card| card.is_matched()).count()
    }

    pub fn matched_pairs(&self) -> usize {
        self.matched_cards() / 2
    }

    pub fn all_matched(&self) -> bool {
        self.cards.iter().all(|card| card.is_matched())
    }

    pub fn is_running(&self) -> bool {
        self.phase == GamePhase::Running
    }

    pub fn is_finished(&self) -> bool {
        self.outcome.is_some()
    }

    pub fn summary(&self) -> GameSummary {
        GameSummary {
            duration_millis: self.countdown.duration_millis(),
            remaining_millis: self.countdown.remaining_millis(),
            elapsed_millis: self.countdown.elapsed_millis(),
            matched_cards: self.matched_cards(),
            total_cards: self.cards.len(),
        }
    }

    /// 终局声明，先到先得：已有结果时后续声明不再生效，也不会重复发事件。
    /// 声明成功时顺带停表，之后一切状态都被冻结。
    pub fn declare_end(&mut self, success: bool, reason: EndReason) -> Option<GameOutcome> {
        if self.outcome.is_some() {
            return None;
        }
        self.countdown.stop();
        self.phase = GamePhase::Ended;
        let outcome = GameOutcome {
            success,
            reason,
            summary: self.summary(),
        };
        self.record_event(GameEvent::GameEnded {
            outcome: outcome.clone(),
        });
        self.outcome = Some(outcome.clone());
        Some(outcome)
    }

    pub fn integrity_check(&self) -> Result<(), IntegrityError> {
        if self.cards.len() % 2 != 0 {
            return Err(IntegrityError::OddCardCount {
                count: self.cards.len(),
            });
        }

        let mut ids = HashSet::new();
        let mut pair_counts: HashMap<&str, usize> = HashMap::new();
        for card in &self.cards {
            if !ids.insert(card.id) {
                return Err(IntegrityError::DuplicateCardId { card_id: card.id });
            }
            *pair_counts.entry(card.content.as_str()).or_insert(0) += 1;
        }
        for (content, count) in pair_counts {
            if count != 2 {
                return Err(IntegrityError::UnpairedContent {
                    content: content.to_string(),
                });
            }
        }

        if self.pending_pair.len() > 2 {
            return Err(IntegrityError::PendingOverflow {
                count: self.pending_pair.len(),
            });
        }
        for card_id in &self.pending_pair {
            match self.find_card(*card_id) {
                None => {
                    return Err(IntegrityError::PendingUnknownCard { card_id: *card_id });
                }
                Some(card) if card.is_matched() => {
                    return Err(IntegrityError::PendingMatched { card_id: *card_id });
                }
                Some(_) => {}
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn contents(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn builds_two_cards_per_content() {
        let state = GameState::with_seed(contents(&["a", "b", "c"]), None, 11)
            .expect("valid config should build");

        assert_eq!(state.cards.len(), 6);
        for content in ["a", "b", "c"] {
            let count = state
                .cards
                .iter()
                .filter(|card| card.content == content)
                .count();
            assert_eq!(count, 2, "content {content} must appear exactly twice");
        }
        assert_eq!(state.phase, GamePhase::Idle);
        assert!(state.cards.iter().all(|card| card.is_hidden()));
        state.integrity_check().expect("fresh board is consistent");
    }

    #[test]
    fn duplicate_contents_collapse_like_a_set() {
        let state = GameState::with_seed(contents(&["a", "a", "b"]), None, 3)
            .expect("duplicates are tolerated");
        assert_eq!(
            state.cards.len(),
            4,
            "duplicate input must not inflate the board"
        );
    }

    #[test]
    fn rejects_empty_contents() {
        let error = GameState::with_seed(Vec::new(), None, 0).expect_err("empty set must fail");
        assert_eq!(error, ConfigError::EmptyContents);
    }

    #[test]
    fn rejects_zero_duration() {
        let error = GameState::with_seed(contents(&["a"]), Some(0), 0)
            .expect_err("zero duration must fail");
        assert!(matches!(error, ConfigError::InvalidDuration { .. }));
    }

    #[test]
    fn shuffle_positions_are_roughly_uniform() {
        // 8 张牌、600 个种子：卡牌 0 落在每个位置的期望次数是 75。
        // 宽松的 ±4σ 界既放得过均匀洗牌，又抓得住有偏实现。
        const TRIALS: u64 = 600;
        let mut position_counts = [0u32; 8];
        for seed in 0..TRIALS {
            let state = GameState::with_seed(contents(&["a", "b", "c", "d"]), None, seed)
                .expect("valid config should build");
            let position = state
                .cards
                .iter()
                .position(|card| card.id == 0)
                .expect("card 0 must exist");
            position_counts[position] += 1;
        }

        for (position, count) in position_counts.iter().enumerate() {
            assert!(
                (40..=110).contains(count),
                "position {position} saw {count} hits, outside plausible range"
            );
        }
    }

    #[test]
    fn declare_end_is_first_come_first_served() {
        let mut state = GameState::with_seed(contents(&["a"]), Some(1_000), 5)
            .expect("valid config should build");

        let first = state.declare_end(false, EndReason::TimeLimitReached);
        assert!(first.is_some(), "first declaration wins");
        assert_eq!(state.phase, GamePhase::Ended);
        assert!(!state.countdown.is_running());

        let second = state.declare_end(true, EndReason::AllMatched);
        assert!(second.is_none(), "second declaration is ignored");

        let terminal_events = state
            .event_log
            .iter()
            .filter(|event| matches!(event, GameEvent::GameEnded { .. }))
            .count();
        assert_eq!(terminal_events, 1, "exactly one terminal event");

        let outcome = state.outcome.expect("outcome recorded");
        assert!(!outcome.success);
        assert_eq!(outcome.reason, EndReason::TimeLimitReached);
        assert_eq!(outcome.summary.total_cards, 2);
    }

    #[test]
    fn integrity_check_flags_corrupted_pending_pair() {
        let mut state = GameState::with_seed(contents(&["a", "b"]), None, 9)
            .expect("valid config should build");

        state.pending_pair = vec![0, 1, 2];
        assert_eq!(
            state.integrity_check(),
            Err(IntegrityError::PendingOverflow { count: 3 })
        );

        state.pending_pair = vec![99];
        assert_eq!(
            state.integrity_check(),
            Err(IntegrityError::PendingUnknownCard { card_id: 99 })
        );
    }

    #[test]
    fn integrity_check_flags_unpaired_content() {
        let mut state = GameState::with_seed(contents(&["a", "b"]), None, 9)
            .expect("valid config should build");
        // 改掉一张牌的内容，张数仍为偶数但不再成对
        if let Some(card) = state.cards.iter_mut().find(|card| card.content == "a") {
            card.content = "z".to_string();
        }
        assert!(matches!(
            state.integrity_check(),
            Err(IntegrityError::UnpairedContent { .. })
        ));
    }

    proptest! {
        #[test]
        fn every_content_set_builds_a_paired_board(
            values in prop::collection::hash_set("[a-z]{1,3}", 1..20),
            seed in 0u64..1_000,
        ) {
            let input: Vec<String> = values.iter().cloned().collect();
            let expected_pairs = values.len();
            let state = GameState::with_seed(input, None, seed)
                .expect("non-empty set must build");

            prop_assert_eq!(state.cards.len(), expected_pairs * 2);
            for content in &values {
                let count = state
                    .cards
                    .iter()
                    .filter(|card| &card.content == content)
                    .count();
                prop_assert_eq!(count, 2);
            }
            prop_assert!(state.integrity_check().is_ok());
        }
    }
}
