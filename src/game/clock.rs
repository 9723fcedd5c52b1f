use serde::{Deserialize, Serialize};

/// 毫秒时间值，附带按整秒缓存的 MM:SS 显示字符串。
/// 毫秒级抖动不会触发重新格式化，只有整秒数变了才会。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Timestamp {
    millis: u64,
    #[serde(skip)]
    cache: Option<(u64, String)>,
}

impl Timestamp {
    pub fn from_millis(millis: u64) -> Self {
        Self {
            millis,
            cache: None,
        }
    }

    pub fn millis(&self) -> u64 {
        self.millis
    }

    pub fn total_seconds(&self) -> u64 {
        self.millis / 1000
    }

    pub fn set_millis(&mut self, millis: u64) {
        self.millis = millis;
    }

    /// 另一个毫秒值是否落在同一整秒内。
    pub fn same_second_as(&self, millis: u64) -> bool {
        self.total_seconds() == millis / 1000
    }

    /// MM:SS 显示。缓存以整秒数为键，秒数没变就直接复用上次的字符串。
    pub fn display(&mut self) -> &str {
        let seconds = self.total_seconds();
        let stale = !matches!(&self.cache, Some((cached, _)) if *cached == seconds);
        if stale {
            let label = format!("{:02}:{:02}", seconds / 60, seconds % 60);
            self.cache = Some((seconds, label));
        }
        self.cache
            .as_ref()
            .map(|(_, label)| label.as_str())
            .unwrap_or("00:00")
    }
}

impl PartialEq for Timestamp {
    fn eq(&self, other: &Self) -> bool {
        self.millis == other.millis
    }
}

impl Eq for Timestamp {}

/// 单次步进的结果。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// 没在走表。
    Idle,
    Ticked { remaining_millis: u64 },
    /// 剩余时间归零，倒计时自动停表。
    Expired,
}

/// 游戏倒计时。duration 为 None 表示不限时，start 是空操作。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Countdown {
    duration_millis: Option<u64>,
    remaining: Timestamp,
    #[serde(default)]
    running: bool,
}

impl Countdown {
    pub fn new(duration_millis: Option<u64>) -> Self {
        Self {
            duration_millis,
            remaining: Timestamp::from_millis(duration_millis.unwrap_or(0)),
            running: false,
        }
    }

    pub fn duration_millis(&self) -> Option<u64> {
        self.duration_millis
    }

    pub fn remaining_millis(&self) -> u64 {
        self.remaining.millis()
    }

    pub fn elapsed_millis(&self) -> u64 {
        self.duration_millis
            .map(|total| total.saturating_sub(self.remaining.millis()))
            .unwrap_or(0)
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// 启动或重启。显式传入时长会同时重置总时长和剩余时间；
    /// 省略则沿用既有配置继续走。从未配置过时长时不启动，返回 false。
    pub fn start(&mut self, duration_millis: Option<u64>) -> bool {
        if let Some(total) = duration_millis {
            self.duration_millis = Some(total);
            self.remaining.set_millis(total);
        }
        match self.duration_millis {
            Some(_) => {
                self.running = true;
                true
            }
            None => false,
        }
    }

    pub fn stop(&mut self) {
        self.running = false;
    }

    /// 前进 delta 毫秒。到零即过期并自动停表。
    pub fn tick(&mut self, delta_millis: u64) -> TickOutcome {
        if !self.running {
            return TickOutcome::Idle;
        }
        let next = self.remaining.millis().saturating_sub(delta_millis);
        self.remaining.set_millis(next);
        if next == 0 {
            self.running = false;
            TickOutcome::Expired
        } else {
            TickOutcome::Ticked {
                remaining_millis: next,
            }
        }
    }

    /// 剩余时间的 MM:SS 显示。
    pub fn display(&mut self) -> &str {
        self.remaining.display()
    }

    pub fn remaining(&self) -> &Timestamp {
        &self.remaining
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_formats_minutes_and_seconds() {
        let mut ten_minutes = Timestamp::from_millis(600_000);
        assert_eq!(ten_minutes.display(), "10:00");

        let mut one_oh_one = Timestamp::from_millis(61_500);
        assert_eq!(one_oh_one.display(), "01:01");

        let mut sub_second = Timestamp::from_millis(900);
        assert_eq!(sub_second.display(), "00:00");
    }

    #[test]
    fn same_second_ignores_millisecond_churn() {
        let stamp = Timestamp::from_millis(1_000);
        assert!(stamp.same_second_as(1_499));
        assert!(stamp.same_second_as(1_999));
        assert!(!stamp.same_second_as(999));
        assert!(!stamp.same_second_as(2_000));
    }

    #[test]
    fn display_survives_sub_second_updates() {
        let mut stamp = Timestamp::from_millis(2_990);
        assert_eq!(stamp.display(), "00:02");

        // 同一整秒内的更新复用缓存结果
        stamp.set_millis(2_400);
        assert_eq!(stamp.display(), "00:02");

        stamp.set_millis(1_999);
        assert_eq!(stamp.display(), "00:01");
    }

    #[test]
    fn explicit_duration_resets_remaining() {
        let mut countdown = Countdown::new(Some(1_000));
        assert!(countdown.start(None));
        assert_eq!(countdown.tick(400), TickOutcome::Ticked { remaining_millis: 600 });

        assert!(countdown.start(Some(2_000)), "restart should succeed");
        assert_eq!(countdown.duration_millis(), Some(2_000));
        assert_eq!(countdown.remaining_millis(), 2_000);
    }

    #[test]
    fn omitted_duration_resumes_previous_configuration() {
        let mut countdown = Countdown::new(Some(1_000));
        assert!(countdown.start(None));
        countdown.tick(300);
        countdown.stop();

        assert!(countdown.start(None), "resume should succeed");
        assert_eq!(countdown.remaining_millis(), 700, "remaining must carry over");
    }

    #[test]
    fn start_without_any_duration_is_a_noop() {
        let mut countdown = Countdown::new(None);
        assert!(!countdown.start(None));
        assert!(!countdown.is_running());
        assert_eq!(countdown.tick(10), TickOutcome::Idle);
    }

    #[test]
    fn tick_counts_down_to_expiry_and_stops() {
        let mut countdown = Countdown::new(Some(30));
        assert!(countdown.start(None));

        assert_eq!(countdown.tick(10), TickOutcome::Ticked { remaining_millis: 20 });
        assert_eq!(countdown.tick(10), TickOutcome::Ticked { remaining_millis: 10 });
        assert_eq!(countdown.tick(10), TickOutcome::Expired);
        assert!(!countdown.is_running(), "expiry must stop the clock");
        assert_eq!(countdown.tick(10), TickOutcome::Idle, "no ticks after expiry");
    }

    #[test]
    fn elapsed_tracks_consumed_time() {
        let mut countdown = Countdown::new(Some(1_000));
        assert!(countdown.start(None));
        countdown.tick(250);
        assert_eq!(countdown.elapsed_millis(), 250);

        let untimed = Countdown::new(None);
        assert_eq!(untimed.elapsed_millis(), 0);
    }
}
