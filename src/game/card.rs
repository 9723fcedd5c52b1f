use serde::{Deserialize, Serialize};

/// 全局唯一的卡牌标识。
pub type CardId = u32;

/// 卡牌翻面状态：Hidden → Revealed → Matched，Matched 为终态不可逆。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum CardStatus {
    Hidden,
    Revealed,
    Matched,
}

impl Default for CardStatus {
    fn default() -> Self {
        CardStatus::Hidden
    }
}

/// 非法的状态迁移。回合引擎会把它降级为空操作，不向视图层抛出。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum TransitionError {
    RevealRejected { card_id: CardId, status: CardStatus },
    ConcealRejected { card_id: CardId, status: CardStatus },
    MatchRejected { card_id: CardId, status: CardStatus },
}

/// 棋盘上的一张卡牌。content 相同的两张牌构成一对。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Card {
    pub id: CardId,
    pub content: String,
    #[serde(default)]
    pub status: CardStatus,
}

impl Card {
    pub fn new(id: CardId, content: impl Into<String>) -> Self {
        Self {
            id,
            content: content.into(),
            status: CardStatus::Hidden,
        }
    }

    pub fn is_hidden(&self) -> bool {
        self.status == CardStatus::Hidden
    }

    pub fn is_revealed(&self) -> bool {
        self.status == CardStatus::Revealed
    }

    pub fn is_matched(&self) -> bool {
        self.status == CardStatus::Matched
    }

    /// Hidden → Revealed。
    pub fn reveal(&mut self) -> Result<(), TransitionError> {
        match self.status {
            CardStatus::Hidden => {
                self.status = CardStatus::Revealed;
                Ok(())
            }
            status => Err(TransitionError::RevealRejected {
                card_id: self.id,
                status,
            }),
        }
    }

    /// Revealed → Hidden，配对失败后盖回。
    pub fn conceal(&mut self) -> Result<(), TransitionError> {
        match self.status {
            CardStatus::Revealed => {
                self.status = CardStatus::Hidden;
                Ok(())
            }
            status => Err(TransitionError::ConcealRejected {
                card_id: self.id,
                status,
            }),
        }
    }

    /// Revealed → Matched。
    pub fn mark_matched(&mut self) -> Result<(), TransitionError> {
        match self.status {
            CardStatus::Revealed => {
                self.status = CardStatus::Matched;
                Ok(())
            }
            status => Err(TransitionError::MatchRejected {
                card_id: self.id,
                status,
            }),
        }
    }

    /// 只比较内容，不读也不改翻面状态。
    pub fn content_equals(&self, other: &Card) -> bool {
        self.content == other.content
    }
}
