use serde::{Deserialize, Serialize};

use super::{
    card::CardId,
    clock::TickOutcome,
    state::{EndReason, GameEvent, GameOutcome, GamePhase, GameState, IntegrityError},
};

/// 配对失败后保持亮面的展示时长，到点再盖回。
pub const DEFAULT_MISMATCH_DELAY_MILLIS: u32 = 1_000;

/// 一次操作后的完整结算：新状态、事件增量、可能出现的终局。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resolution {
    pub state: GameState,
    pub events: Vec<GameEvent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<GameOutcome>,
}

impl Resolution {
    pub fn new(state: GameState, mut events: Vec<GameEvent>) -> Self {
        let outcome = state.outcome.clone();
        if let Some(ref outcome) = outcome {
            let has_terminal = events
                .iter()
                .any(|event| matches!(event, GameEvent::GameEnded { .. }));
            if !has_terminal {
                events.push(GameEvent::GameEnded {
                    outcome: outcome.clone(),
                });
            }
        }

        Self {
            state,
            events,
            outcome,
        }
    }
}

/// 翻牌回合协议的执行引擎。
///
/// 所有不满足前置条件的请求（重复点击、结算期间的第三张牌、终局后的
/// 过期事件）一律静默忽略，返回空事件列表；只有状态数据被破坏时才报错。
#[derive(Debug, Clone)]
pub struct TurnEngine {
    mismatch_delay_millis: u32,
}

impl Default for TurnEngine {
    fn default() -> Self {
        Self {
            mismatch_delay_millis: DEFAULT_MISMATCH_DELAY_MILLIS,
        }
    }
}

impl TurnEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mismatch_delay(mut self, millis: u32) -> Self {
        self.mismatch_delay_millis = millis;
        self
    }

    /// 视图层在配对失败后应等待的展示时长，再调用 resolve_mismatch。
    pub fn mismatch_delay_millis(&self) -> u32 {
        self.mismatch_delay_millis
    }

    fn ensure_integrity(state: &GameState) -> Result<(), IntegrityError> {
        state.integrity_check()
    }

    /// Idle → Running；配了时长就顺带开表。重复调用不生效。
    pub fn start(&mut self, state: &mut GameState) -> Result<(), IntegrityError> {
        Self::ensure_integrity(state)?;
        if state.phase != GamePhase::Idle {
            return Ok(());
        }
        state.phase = GamePhase::Running;
        if state.countdown.duration_millis().is_some() {
            state.countdown.start(None);
        }
        Ok(())
    }

    /// 启动或重启倒计时。显式时长重置剩余时间，省略则续跑既有配置；
    /// 从未配置过时长、或游戏已终局时为空操作，返回 false。
    pub fn start_timer(
        &mut self,
        state: &mut GameState,
        duration_millis: Option<u64>,
    ) -> Result<bool, IntegrityError> {
        Self::ensure_integrity(state)?;
        if state.phase == GamePhase::Ended {
            return Ok(false);
        }
        Ok(state.countdown.start(duration_millis))
    }

    /// 视图层唯一的改动入口：请求翻开一张牌。
    ///
    /// 前置条件全部在改动之前检查，任何一条不满足都按过期 UI 事件处理，
    /// 静默返回空事件。第二张牌落定后立即比对：配对成功双双置为
    /// Matched；失败则登记到 unresolved_mismatch，等展示延时过后由
    /// resolve_mismatch 盖回。登记存在期间新的翻牌请求一概拒绝。
    pub fn request_flip(
        &mut self,
        state: &mut GameState,
        card_id: CardId,
    ) -> Result<Vec<GameEvent>, IntegrityError> {
        Self::ensure_integrity(state)?;

        if state.phase != GamePhase::Running {
            return Ok(Vec::new());
        }
        if state.unresolved_mismatch.is_some() {
            // 上一对还没盖回去，比对进行中
            return Ok(Vec::new());
        }
        if state.pending_pair.len() >= 2 {
            return Ok(Vec::new());
        }
        let card = match state.find_card_mut(card_id) {
            Some(card) => card,
            None => return Ok(Vec::new()),
        };
        if card.reveal().is_err() {
            // 已亮面或已配对的牌，视为重复点击
            return Ok(Vec::new());
        }
        state.pending_pair.push(card_id);

        let mut events = Vec::new();
        let revealed = GameEvent::CardRevealed { card_id };
        state.record_event(revealed.clone());
        events.push(revealed);

        if state.pending_pair.len() < 2 {
            return Ok(events);
        }

        let first_id = state.pending_pair[0];
        let second_id = state.pending_pair[1];
        state.pending_pair.clear();

        let matched = match (state.find_card(first_id), state.find_card(second_id)) {
            (Some(first), Some(second)) => first.content_equals(second),
            _ => false,
        };

        if matched {
            for id in [first_id, second_id] {
                if let Some(card) = state.find_card_mut(id) {
                    let _ = card.mark_matched();
                }
            }
            log::debug!("pair matched: {first_id} / {second_id}");
            let event = GameEvent::PairMatched {
                first_id,
                second_id,
            };
            state.record_event(event.clone());
            events.push(event);

            if state.all_matched() {
                if let Some(outcome) = state.declare_end(true, EndReason::AllMatched) {
                    log::info!("all pairs matched, game won");
                    events.push(GameEvent::GameEnded { outcome });
                }
            }
        } else {
            state.unresolved_mismatch = Some((first_id, second_id));
            log::debug!("pair mismatched: {first_id} / {second_id}");
            let event = GameEvent::PairMismatched {
                first_id,
                second_id,
            };
            state.record_event(event.clone());
            events.push(event);
        }

        Ok(events)
    }

    /// 展示延时结束后执行的盖回动作。
    /// 游戏若已终局则保持原样（Ended 之后卡面全部冻结）。
    pub fn resolve_mismatch(
        &mut self,
        state: &mut GameState,
    ) -> Result<Vec<GameEvent>, IntegrityError> {
        Self::ensure_integrity(state)?;
        if state.phase != GamePhase::Running {
            return Ok(Vec::new());
        }
        let (first_id, second_id) = match state.unresolved_mismatch.take() {
            Some(pair) => pair,
            None => return Ok(Vec::new()),
        };
        for id in [first_id, second_id] {
            if let Some(card) = state.find_card_mut(id) {
                let _ = card.conceal();
            }
        }
        let event = GameEvent::PairConcealed {
            first_id,
            second_id,
        };
        state.record_event(event.clone());
        Ok(vec![event])
    }

    /// 定时器步进：递减剩余时间并广播 TimeChanged；归零则判负收场。
    /// TimeChanged 不进事件日志，10ms 一条会无限膨胀。
    pub fn tick(
        &mut self,
        state: &mut GameState,
        delta_millis: u64,
    ) -> Result<Vec<GameEvent>, IntegrityError> {
        Self::ensure_integrity(state)?;
        if state.phase != GamePhase::Running {
            return Ok(Vec::new());
        }
        match state.countdown.tick(delta_millis) {
            TickOutcome::Idle => Ok(Vec::new()),
            TickOutcome::Ticked { remaining_millis } => {
                let display = state.countdown.display().to_string();
                Ok(vec![GameEvent::TimeChanged {
                    remaining_millis,
                    display,
                }])
            }
            TickOutcome::Expired => {
                let display = state.countdown.display().to_string();
                let mut events = vec![GameEvent::TimeChanged {
                    remaining_millis: 0,
                    display,
                }];
                if let Some(outcome) = state.declare_end(false, EndReason::TimeLimitReached) {
                    log::info!("time limit reached, game lost");
                    events.push(GameEvent::GameEnded { outcome });
                }
                Ok(events)
            }
        }
    }
}
