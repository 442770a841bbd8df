//! 屏幕 / 省电状态 → 运行、暂停或停止
//!
//! 息屏只是"暂时看不见"，暂停计时即可；省电模式则明确要求隐藏并停止跟踪。

use std::future::Future;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, warn};
use zbus::dbus_proxy;
use zbus::Connection;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunDecision {
    Run,
    Pause,
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunState {
    pub screen_on: bool,
    pub power_save: bool,
}

impl Default for RunState {
    fn default() -> Self {
        Self {
            screen_on: true,
            power_save: false,
        }
    }
}

impl RunState {
    pub fn should_run(&self) -> bool {
        self.screen_on && !self.power_save
    }

    pub fn decision(&self) -> RunDecision {
        decide(self.screen_on, self.power_save)
    }
}

pub fn decide(screen_on: bool, power_save: bool) -> RunDecision {
    if power_save {
        RunDecision::Stop
    } else if !screen_on {
        RunDecision::Pause
    } else {
        RunDecision::Run
    }
}

#[dbus_proxy(
    interface = "org.freedesktop.ScreenSaver",
    default_service = "org.freedesktop.ScreenSaver",
    default_path = "/org/freedesktop/ScreenSaver"
)]
trait ScreenSaver {
    /// 屏保是否激活（激活视为息屏）
    fn get_active(&self) -> zbus::Result<bool>;
}

#[dbus_proxy(
    interface = "net.hadess.PowerProfiles",
    default_service = "net.hadess.PowerProfiles",
    default_path = "/net/hadess/PowerProfiles"
)]
trait PowerProfiles {
    /// "power-saver" / "balanced" / "performance"
    #[dbus_proxy(property)]
    fn active_profile(&self) -> zbus::Result<String>;
}

/// 轮询 D-Bus 上的屏保和电源配置，状态变化时推送
pub struct RunStateWatcher {
    session: Option<Connection>,
    system: Option<Connection>,
}

impl RunStateWatcher {
    /// 连接失败的总线按"亮屏、未省电"处理
    pub async fn connect() -> Self {
        let session = match Connection::session().await {
            Ok(connection) => Some(connection),
            Err(err) => {
                warn!(%err, "no session bus, assuming screen is on");
                None
            }
        };
        let system = match Connection::system().await {
            Ok(connection) => Some(connection),
            Err(err) => {
                warn!(%err, "no system bus, assuming power save is off");
                None
            }
        };
        Self { session, system }
    }

    async fn screen_on(&self) -> zbus::Result<bool> {
        match &self.session {
            Some(connection) => {
                let screensaver = ScreenSaverProxy::new(connection).await?;
                Ok(!screensaver.get_active().await?)
            }
            None => Ok(true),
        }
    }

    async fn power_save(&self) -> zbus::Result<bool> {
        match &self.system {
            Some(connection) => {
                let profiles = PowerProfilesProxy::new(connection).await?;
                Ok(profiles.active_profile().await? == "power-saver")
            }
            None => Ok(false),
        }
    }

    pub async fn query(&self) -> RunState {
        let defaults = RunState::default();
        let screen_on = self.screen_on().await.unwrap_or_else(|err| {
            debug!(%err, "screensaver state unavailable");
            defaults.screen_on
        });
        let power_save = self.power_save().await.unwrap_or_else(|err| {
            debug!(%err, "power profile unavailable");
            defaults.power_save
        });
        RunState {
            screen_on,
            power_save,
        }
    }

    /// 每隔 `poll` 查询一次，只在变化时发送；接收端关闭后退出
    pub async fn watch(self, last: RunState, poll: Duration, tx: mpsc::UnboundedSender<RunState>) {
        forward_changes(last, poll, tx, || self.query()).await
    }
}

/// 按 `poll` 周期调用 `query`，与上次发送的状态不同时才推送
pub async fn forward_changes<F, Fut>(
    mut last: RunState,
    poll: Duration,
    tx: mpsc::UnboundedSender<RunState>,
    mut query: F,
) where
    F: FnMut() -> Fut,
    Fut: Future<Output = RunState>,
{
    let mut ticker = tokio::time::interval(poll);
    // 第一次 tick 立即返回，初始状态已由调用方处理
    ticker.tick().await;
    loop {
        ticker.tick().await;
        let state = query().await;
        if state == last {
            continue;
        }
        debug!(?state, "run state changed");
        if tx.send(state).is_err() {
            return;
        }
        last = state;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decision_table() {
        assert_eq!(decide(true, false), RunDecision::Run);
        assert_eq!(decide(false, false), RunDecision::Pause);
        assert_eq!(decide(true, true), RunDecision::Stop);
        // 息屏且省电：省电优先，隐藏
        assert_eq!(decide(false, true), RunDecision::Stop);
    }

    #[test]
    fn test_should_run() {
        assert!(RunState::default().should_run());
        let off = RunState {
            screen_on: false,
            power_save: false,
        };
        assert!(!off.should_run());
        assert_eq!(off.decision(), RunDecision::Pause);
    }

    #[tokio::test(start_paused = true)]
    async fn test_only_changes_are_forwarded() {
        use std::collections::VecDeque;
        use std::sync::{Arc, Mutex};

        let off = RunState {
            screen_on: false,
            power_save: false,
        };
        let on = RunState::default();
        let script = Arc::new(Mutex::new(VecDeque::from(vec![on, on, off, off, off, on])));

        let (tx, mut rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(forward_changes(on, Duration::from_secs(5), tx, move || {
            let script = Arc::clone(&script);
            async move {
                let next = script.lock().unwrap().pop_front();
                // 脚本用完后保持最后的状态
                next.unwrap_or(on)
            }
        }));

        assert_eq!(rx.recv().await, Some(off));
        assert_eq!(rx.recv().await, Some(on));
        let quiet = tokio::time::timeout(Duration::from_secs(60), rx.recv()).await;
        assert!(quiet.is_err());

        task.abort();
    }

    #[tokio::test]
    async fn test_watcher_without_buses_reports_defaults() {
        let watcher = RunStateWatcher {
            session: None,
            system: None,
        };
        assert_eq!(watcher.query().await, RunState::default());
    }
}
