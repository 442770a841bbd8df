//! 指示器状态机：Stopped / Active / Paused
//!
//! start、pause、stop 与定时器回调都在同一把锁内执行，定时器触发不会与
//! stop 的注销、隐藏交错。每次武装定时器都会递增代号，过期代号的触发直接忽略。

use std::convert::TryFrom;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info};

use super::network::{CounterSource, NetworkEvent, NetworkSource, ThroughputTracker};
use super::power::{RunDecision, RunState};
use super::rate::AggregateRate;
use super::render::{DisplaySink, IndicatorRenderer};
use crate::error::{IndicatorError, Result};
use crate::lock_utils::lock;

pub const MIN_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Stopped,
    Active,
    Paused,
}

struct Inner<N: NetworkSource, C, S> {
    state: ControllerState,
    source: N,
    tracker: ThroughputTracker<N::Id, C>,
    renderer: IndicatorRenderer<S>,
    /// 当前网络注册的代号；None 表示未注册
    registration: Option<u64>,
    registrations: u64,
    pump: Option<JoinHandle<()>>,
    timer: Option<JoinHandle<()>>,
    generation: u64,
    ticks: u64,
}

impl<N: NetworkSource, C, S> Inner<N, C, S> {
    fn disarm(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
        self.generation += 1;
    }
}

pub struct IndicatorController<N: NetworkSource, C, S> {
    inner: Arc<Mutex<Inner<N, C, S>>>,
    interval: Duration,
    epoch: Instant,
    runtime: Handle,
}

impl<N: NetworkSource, C, S> Clone for IndicatorController<N, C, S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            interval: self.interval,
            epoch: self.epoch,
            runtime: self.runtime.clone(),
        }
    }
}

impl<N, C, S> IndicatorController<N, C, S>
where
    N: NetworkSource,
    C: CounterSource + Send + 'static,
    S: DisplaySink + Send + 'static,
{
    /// `interval` 小于 1 秒时返回 `InvalidConfiguration`。
    ///
    /// 定时器和事件任务会派发到当前的 Tokio 运行时，不在运行时内调用时返回
    /// `Runtime`；之后 `start` 等方法可以在任意线程调用。
    pub fn new(source: N, counters: C, sink: S, interval: Duration) -> Result<Self> {
        if interval < MIN_INTERVAL {
            return Err(IndicatorError::InvalidConfiguration(format!(
                "sampling interval must be at least {:?}, got {:?}",
                MIN_INTERVAL, interval
            )));
        }
        let runtime = Handle::try_current()?;

        let inner = Inner {
            state: ControllerState::Stopped,
            source,
            tracker: ThroughputTracker::new(counters),
            renderer: IndicatorRenderer::new(sink),
            registration: None,
            registrations: 0,
            pump: None,
            timer: None,
            generation: 0,
            ticks: 0,
        };

        Ok(Self {
            inner: Arc::new(Mutex::new(inner)),
            interval,
            epoch: Instant::now(),
            runtime,
        })
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn state(&self) -> ControllerState {
        lock(&self.inner).state
    }

    /// 已执行的采样次数
    pub fn ticks(&self) -> u64 {
        lock(&self.inner).ticks
    }

    /// 最近一次采样的总速率
    pub fn rate(&self) -> AggregateRate {
        lock(&self.inner).tracker.rate
    }

    pub fn is_tracking(&self) -> bool {
        lock(&self.inner).registration.is_some()
    }

    /// 未跟踪时注册网络来源并显示零速率；随后从现在起重新武装定时器。
    /// 已经 Active 时只重新武装，不会闪一下零。
    pub fn start(&self) {
        let mut guard = lock(&self.inner);
        let inner = &mut *guard;

        if inner.registration.is_none() {
            inner.registrations += 1;
            let registration = inner.registrations;
            let (tx, rx) = mpsc::unbounded_channel();
            inner.source.register(tx);
            inner.pump = Some(self.spawn_pump(rx, registration));
            inner.registration = Some(registration);

            inner.renderer.reset();
            inner.renderer.update(AggregateRate::ZERO);
        }

        self.arm(inner);
        if inner.state != ControllerState::Active {
            info!(from = ?inner.state, "indicator active");
        }
        inner.state = ControllerState::Active;
    }

    /// 只停定时器，注册和显示内容保持不变
    pub fn pause(&self) {
        let mut inner = lock(&self.inner);
        inner.disarm();
        if inner.state != ControllerState::Paused {
            info!(from = ?inner.state, "indicator paused");
        }
        inner.state = ControllerState::Paused;
    }

    /// 停定时器、注销网络来源、隐藏指示器
    pub fn stop(&self) {
        let mut inner = lock(&self.inner);
        inner.disarm();

        if inner.registration.take().is_some() {
            inner.source.unregister();
            if let Some(pump) = inner.pump.take() {
                pump.abort();
            }
            inner.tracker.clear();
        }

        inner.renderer.hide();
        if inner.state != ControllerState::Stopped {
            info!(from = ?inner.state, "indicator stopped");
        }
        inner.state = ControllerState::Stopped;
    }

    pub fn apply_run_state(&self, run_state: RunState) {
        debug!(?run_state, "applying run state");
        match run_state.decision() {
            RunDecision::Run => self.start(),
            RunDecision::Pause => self.pause(),
            RunDecision::Stop => self.stop(),
        }
    }

    fn arm(&self, inner: &mut Inner<N, C, S>) {
        inner.disarm();
        let generation = inner.generation;
        let weak = Arc::downgrade(&self.inner);
        let interval = self.interval;
        let epoch = self.epoch;

        inner.timer = Some(self.runtime.spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                let inner = match weak.upgrade() {
                    Some(inner) => inner,
                    None => return,
                };
                if !Self::fire(&inner, generation, epoch) {
                    return;
                }
            }
        }));
    }

    /// 一次定时器触发；返回 false 表示该定时器已过期
    fn fire(inner: &Mutex<Inner<N, C, S>>, generation: u64, epoch: Instant) -> bool {
        let mut guard = lock(inner);
        let inner = &mut *guard;
        if inner.state != ControllerState::Active || inner.generation != generation {
            debug!(generation, "ignoring stale timer");
            return false;
        }

        let now_ms = millis(epoch.elapsed());
        let rate = inner.tracker.update(now_ms);
        inner.renderer.update(rate);
        inner.ticks += 1;
        true
    }

    fn spawn_pump(
        &self,
        mut rx: mpsc::UnboundedReceiver<NetworkEvent<N::Id>>,
        registration: u64,
    ) -> JoinHandle<()> {
        let weak: Weak<Mutex<Inner<N, C, S>>> = Arc::downgrade(&self.inner);
        self.runtime.spawn(async move {
            while let Some(event) = rx.recv().await {
                let inner = match weak.upgrade() {
                    Some(inner) => inner,
                    None => return,
                };
                let mut inner = lock(&inner);
                // stop 之后才到达的事件不再落表
                if inner.registration != Some(registration) {
                    return;
                }
                debug!(?event, "network event");
                inner.tracker.apply(event);
            }
        })
    }
}

/// 毫秒数，超出 u64 时饱和
fn millis(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CounterError;
    use crate::modules::glyph::Glyph;
    use crate::modules::network::Counters;

    #[derive(Default)]
    struct NullSource {
        registered: bool,
        registrations: usize,
    }

    impl NetworkSource for NullSource {
        type Id = u32;

        fn register(&mut self, _events: mpsc::UnboundedSender<NetworkEvent<u32>>) {
            self.registered = true;
            self.registrations += 1;
        }

        fn unregister(&mut self) {
            self.registered = false;
        }
    }

    struct NoCounters;

    impl CounterSource for NoCounters {
        fn read_counters(&self, _iface: &str) -> std::result::Result<Counters, CounterError> {
            Ok(Counters::default())
        }
    }

    #[derive(Default)]
    struct CountingSink {
        shows: usize,
        dismisses: usize,
    }

    impl DisplaySink for CountingSink {
        fn show(&mut self, _title: &str, _glyph: &Glyph, _ongoing: bool) -> Result<()> {
            self.shows += 1;
            Ok(())
        }

        fn dismiss(&mut self) -> Result<()> {
            self.dismisses += 1;
            Ok(())
        }
    }

    type TestController = IndicatorController<NullSource, NoCounters, CountingSink>;

    fn controller() -> TestController {
        IndicatorController::new(
            NullSource::default(),
            NoCounters,
            CountingSink::default(),
            Duration::from_secs(2),
        )
        .unwrap()
    }

    fn shows(controller: &TestController) -> usize {
        lock(&controller.inner).renderer.sink().shows
    }

    #[test]
    fn test_interval_below_minimum_is_rejected() {
        let result = IndicatorController::new(
            NullSource::default(),
            NoCounters,
            CountingSink::default(),
            Duration::from_millis(999),
        );
        assert!(matches!(
            result,
            Err(IndicatorError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_millis_saturates() {
        assert_eq!(millis(Duration::from_millis(2500)), 2500);
        assert_eq!(millis(Duration::from_secs(u64::MAX)), u64::MAX);
    }

    #[test]
    fn test_new_outside_runtime_is_rejected() {
        let result = IndicatorController::new(
            NullSource::default(),
            NoCounters,
            CountingSink::default(),
            Duration::from_secs(2),
        );
        assert!(matches!(result, Err(IndicatorError::Runtime(_))));
    }

    #[test]
    fn test_start_and_stop_from_plain_thread() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();
        let controller = runtime.block_on(async { controller() });

        // 控制器创建之后，不在运行时内的线程也可以驱动它
        std::thread::spawn({
            let controller = controller.clone();
            move || {
                controller.start();
                assert_eq!(controller.state(), ControllerState::Active);
                controller.pause();
                controller.stop();
            }
        })
        .join()
        .unwrap();

        assert_eq!(controller.state(), ControllerState::Stopped);
        assert_eq!(shows(&controller), 1);
        assert_eq!(lock(&controller.inner).renderer.sink().dismisses, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_registers_and_flashes_zero_once() {
        let controller = controller();
        assert_eq!(controller.state(), ControllerState::Stopped);

        controller.start();
        assert_eq!(controller.state(), ControllerState::Active);
        assert!(controller.is_tracking());
        assert_eq!(shows(&controller), 1);

        // 再次 start 只重新武装定时器
        controller.start();
        assert_eq!(shows(&controller), 1);
        assert_eq!(lock(&controller.inner).source.registrations, 1);

        controller.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_rearms_from_now() {
        let controller = controller();
        controller.start();

        tokio::time::sleep(Duration::from_millis(1500)).await;
        controller.start();
        // 原定 2.0s 的触发已作废，下一次在 3.5s
        tokio::time::sleep(Duration::from_millis(1000)).await;
        assert_eq!(controller.ticks(), 0);
        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert_eq!(controller.ticks(), 1);

        controller.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_timer_is_ignored() {
        let controller = controller();
        controller.start();
        let generation = lock(&controller.inner).generation;

        assert!(TestController::fire(&controller.inner, generation, controller.epoch));
        assert_eq!(controller.ticks(), 1);

        controller.pause();
        assert!(!TestController::fire(&controller.inner, generation, controller.epoch));
        let paused_generation = lock(&controller.inner).generation;
        assert!(!TestController::fire(&controller.inner, paused_generation, controller.epoch));
        assert_eq!(controller.ticks(), 1);

        controller.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_keeps_registration_and_content() {
        let controller = controller();
        controller.start();
        controller.pause();

        assert_eq!(controller.state(), ControllerState::Paused);
        assert!(controller.is_tracking());
        assert!(lock(&controller.inner).renderer.is_visible());

        // 恢复时不会闪零
        controller.start();
        assert_eq!(shows(&controller), 1);
        controller.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_unregisters_and_hides() {
        let controller = controller();
        controller.start();
        controller.stop();

        assert_eq!(controller.state(), ControllerState::Stopped);
        assert!(!controller.is_tracking());
        let inner = lock(&controller.inner);
        assert!(!inner.source.registered);
        assert!(!inner.renderer.is_visible());
        assert_eq!(inner.renderer.sink().dismisses, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_state_mapping() {
        let controller = controller();

        controller.apply_run_state(RunState::default());
        assert_eq!(controller.state(), ControllerState::Active);

        controller.apply_run_state(RunState {
            screen_on: false,
            power_save: false,
        });
        assert_eq!(controller.state(), ControllerState::Paused);
        assert!(controller.is_tracking());

        controller.apply_run_state(RunState {
            screen_on: true,
            power_save: true,
        });
        assert_eq!(controller.state(), ControllerState::Stopped);
        assert!(!controller.is_tracking());
        assert_eq!(lock(&controller.inner).renderer.sink().dismisses, 1);

        // 从 Stopped 恢复：重新注册并显示零速率
        controller.apply_run_state(RunState::default());
        assert_eq!(controller.state(), ControllerState::Active);
        assert_eq!(lock(&controller.inner).source.registrations, 2);
        assert_eq!(shows(&controller), 2);
        controller.stop();
    }
}
