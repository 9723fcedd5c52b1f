pub mod game;

use std::cell::RefCell;
use std::rc::Rc;

use gloo_timers::callback::Interval;
use gloo_timers::future::TimeoutFuture;
use serde_wasm_bindgen::{from_value, to_value};
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::spawn_local;
use web_sys::js_sys::Function;

pub use game::{
    Card, CardId, CardStatus, ConfigError, Countdown, EndReason, GameEvent, GameOutcome,
    GamePhase, GameState, GameSummary, IntegrityError, Resolution, TickOutcome, Timestamp,
    TransitionError, TurnEngine, DEFAULT_MISMATCH_DELAY_MILLIS,
};

/// 定时器步长，沿用浏览器实现的 10ms 粒度。
const TICK_MILLIS: u32 = 10;

#[cfg(feature = "wee_alloc")]
#[global_allocator]
static ALLOC: wee_alloc::WeeAlloc = wee_alloc::WeeAlloc::INIT;

#[wasm_bindgen(start)]
pub fn start() {
    set_panic_hook();
    wasm_logger::init(wasm_logger::Config::default());
}

fn to_js_error<E: serde::Serialize>(error: E) -> JsValue {
    to_value(&error).unwrap_or_else(|serialize_err| JsValue::from_str(&serialize_err.to_string()))
}

fn serde_to_js_error<E: std::fmt::Display>(error: E) -> JsValue {
    JsValue::from_str(&error.to_string())
}

fn make_resolution_json(resolution: Resolution) -> Result<String, JsValue> {
    serde_json::to_string(&resolution).map_err(serde_to_js_error)
}

fn convert_duration(duration_millis: Option<f64>) -> Result<Option<u64>, ConfigError> {
    match duration_millis {
        None => Ok(None),
        Some(millis) if millis.is_finite() && millis > 0.0 => Ok(Some(millis as u64)),
        Some(millis) => Err(ConfigError::InvalidDuration { millis }),
    }
}

struct Shared {
    state: RefCell<GameState>,
    engine: RefCell<TurnEngine>,
    listener: RefCell<Option<Function>>,
    ticker: RefCell<Option<Interval>>,
}

/// 把事件逐条送给 JS 侧注册的回调。没注册回调就什么都不做。
/// 回调先克隆出来再调用，JS 侧在回调里换监听器也不会撞上借用。
fn dispatch(shared: &Rc<Shared>, events: &[GameEvent]) {
    let callback = shared.listener.borrow().clone();
    if let Some(callback) = callback {
        for event in events {
            match to_value(event) {
                Ok(payload) => {
                    let _ = callback.call1(&JsValue::NULL, &payload);
                }
                Err(error) => log::error!("event serialization failed: {error}"),
            }
        }
    }
}

/// 配对失败后的盖回动作：等展示延时走完再执行。
/// 延时期间引擎的 unresolved_mismatch 登记一直生效，挡住第三张牌。
fn schedule_conceal(shared: &Rc<Shared>, delay_millis: u32) {
    let shared = Rc::clone(shared);
    spawn_local(async move {
        TimeoutFuture::new(delay_millis).await;
        let resolved = {
            let mut state = shared.state.borrow_mut();
            let mut engine = shared.engine.borrow_mut();
            engine.resolve_mismatch(&mut state)
        };
        match resolved {
            Ok(events) => dispatch(&shared, &events),
            Err(error) => log::error!("mismatch resolution failed: {error:?}"),
        }
    });
}

/// 以固定步长驱动倒计时。终局后把定时器资源交还给微任务去释放，
/// 定时器回调里不能同步 drop 自己。
fn start_ticker(shared: &Rc<Shared>) {
    if !shared.state.borrow().countdown.is_running() {
        return;
    }
    let handle = Rc::clone(shared);
    let interval = Interval::new(TICK_MILLIS, move || {
        let ticked = {
            let mut state = handle.state.borrow_mut();
            let mut engine = handle.engine.borrow_mut();
            engine.tick(&mut state, u64::from(TICK_MILLIS))
        };
        match ticked {
            Ok(events) => {
                dispatch(&handle, &events);
                if handle.state.borrow().is_finished() {
                    let cleanup = Rc::clone(&handle);
                    spawn_local(async move {
                        cleanup.ticker.replace(None);
                    });
                }
            }
            Err(error) => log::error!("timer tick failed: {error:?}"),
        }
    });
    shared.ticker.replace(Some(interval));
}

/// 浏览器侧的游戏句柄：持有状态、回合引擎、事件回调与定时器资源。
#[wasm_bindgen]
pub struct MemoryGame {
    shared: Rc<Shared>,
}

#[wasm_bindgen]
impl MemoryGame {
    /// 建局并立即进入 Running：内容去重、成对复制、洗牌，配了时长就开表。
    /// contents 接受字符串数组；seed 可选，指定后棋盘布局可复现。
    #[wasm_bindgen(constructor)]
    pub fn new(
        contents: JsValue,
        duration_millis: Option<f64>,
        seed: Option<u32>,
    ) -> Result<MemoryGame, JsValue> {
        let contents: Vec<String> = from_value(contents).map_err(serde_to_js_error)?;
        let duration = convert_duration(duration_millis).map_err(to_js_error)?;

        let mut state = match seed {
            Some(seed) => GameState::with_seed(contents, duration, u64::from(seed)),
            None => GameState::new(contents, duration),
        }
        .map_err(to_js_error)?;

        let mut engine = TurnEngine::new();
        engine.start(&mut state).map_err(to_js_error)?;

        let shared = Rc::new(Shared {
            state: RefCell::new(state),
            engine: RefCell::new(engine),
            listener: RefCell::new(None),
            ticker: RefCell::new(None),
        });
        start_ticker(&shared);

        Ok(MemoryGame { shared })
    }

    /// 注册事件回调。TimeChanged、GameEnded 以及延时盖回都从这里出去。
    pub fn set_listener(&self, callback: Option<Function>) {
        self.shared.listener.replace(callback);
    }

    /// 视图层唯一的改动入口：请求翻开一张牌。
    /// 非法请求静默忽略；配对失败时自动安排延时盖回。返回结算快照 JSON。
    pub fn flip(&self, card_id: u32) -> Result<String, JsValue> {
        let events = {
            let mut state = self.shared.state.borrow_mut();
            let mut engine = self.shared.engine.borrow_mut();
            engine
                .request_flip(&mut state, card_id)
                .map_err(to_js_error)?
        };

        let mismatched = events
            .iter()
            .any(|event| matches!(event, GameEvent::PairMismatched { .. }));
        if mismatched {
            let delay = self.shared.engine.borrow().mismatch_delay_millis();
            schedule_conceal(&self.shared, delay);
        }

        dispatch(&self.shared, &events);
        make_resolution_json(Resolution::new(self.shared.state.borrow().clone(), events))
    }

    /// 启动或重启倒计时。显式时长重置剩余时间，省略则续跑既有配置；
    /// 从未配置过时长时为空操作，返回 false。
    pub fn start_timer(&self, duration_millis: Option<f64>) -> Result<bool, JsValue> {
        let duration = convert_duration(duration_millis).map_err(to_js_error)?;
        let started = {
            let mut state = self.shared.state.borrow_mut();
            let mut engine = self.shared.engine.borrow_mut();
            engine
                .start_timer(&mut state, duration)
                .map_err(to_js_error)?
        };
        if started {
            start_ticker(&self.shared);
        }
        Ok(started)
    }

    /// 调整配对失败后的展示时长（只影响之后的失败）。
    pub fn set_mismatch_delay(&self, millis: u32) {
        let engine = self.shared.engine.borrow().clone().with_mismatch_delay(millis);
        self.shared.engine.replace(engine);
    }

    pub fn state_json(&self) -> Result<String, JsValue> {
        serde_json::to_string(&*self.shared.state.borrow()).map_err(serde_to_js_error)
    }

    /// 剩余时间的 MM:SS 显示，整秒变化才重新格式化。
    pub fn display_time(&self) -> String {
        self.shared
            .state
            .borrow_mut()
            .countdown
            .display()
            .to_string()
    }

    pub fn phase(&self) -> Result<JsValue, JsValue> {
        to_value(&self.shared.state.borrow().phase).map_err(JsValue::from)
    }

    /// 视图卸载时调用：立刻撤掉定时器和回调，避免悬挂的周期任务。
    pub fn destroy(&self) {
        self.shared.ticker.replace(None);
        self.shared.listener.replace(None);
    }
}

impl Drop for MemoryGame {
    fn drop(&mut self) {
        // Interval 闭包持有 shared 的强引用，不先断开整个句柄会被循环引用吊住
        self.shared.ticker.replace(None);
        self.shared.listener.replace(None);
    }
}

#[cfg(feature = "console_error_panic_hook")]
fn set_panic_hook() {
    console_error_panic_hook::set_once();
}

#[cfg(not(feature = "console_error_panic_hook"))]
fn set_panic_hook() {}
