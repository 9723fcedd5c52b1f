//! 游戏核心逻辑模块（卡牌状态机、回合协议、倒计时）。

pub mod card;
pub mod clock;
pub mod rules;
pub mod state;

pub use card::{
    Card,
    CardId,
    CardStatus,
    TransitionError,
};
pub use clock::{
    Countdown,
    TickOutcome,
    Timestamp,
};
pub use rules::{
    Resolution,
    TurnEngine,
    DEFAULT_MISMATCH_DELAY_MILLIS,
};
pub use state::{
    ConfigError,
    EndReason,
    GameEvent,
    GameOutcome,
    GamePhase,
    GameState,
    GameSummary,
    IntegrityError,
};
