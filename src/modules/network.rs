use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use tokio::sync::mpsc;

use super::rate::AggregateRate;
use super::slots::InterfaceSlotTable;
use crate::error::CounterError;

pub const DEFAULT_SYSFS_ROOT: &str = "/sys/class/net";

/// 网络身份：宿主网络栈给出的不透明句柄，仅用作键
pub trait Identity: Eq + Clone + fmt::Debug + Send + 'static {}

impl<T> Identity for T where T: Eq + Clone + fmt::Debug + Send + 'static {}

/// 网卡累计字节数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Counters {
    pub tx_bytes: u64,
    pub rx_bytes: u64,
}

/// 计数器来源，读取失败表示网卡已消失
pub trait CounterSource {
    fn read_counters(&self, iface: &str) -> Result<Counters, CounterError>;
}

/// 从 /sys/class/net/<iface>/statistics 读取计数器
#[derive(Debug, Clone)]
pub struct SysfsCounters {
    root: PathBuf,
}

impl SysfsCounters {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn read_stat(&self, iface: &str, stat: &str) -> Result<u64, CounterError> {
        let path = self.root.join(iface).join("statistics").join(stat);
        read_u64(&path)
    }
}

impl Default for SysfsCounters {
    fn default() -> Self {
        Self::new(DEFAULT_SYSFS_ROOT)
    }
}

impl CounterSource for SysfsCounters {
    fn read_counters(&self, iface: &str) -> Result<Counters, CounterError> {
        Ok(Counters {
            tx_bytes: self.read_stat(iface, "tx_bytes")?,
            rx_bytes: self.read_stat(iface, "rx_bytes")?,
        })
    }
}

pub(crate) fn read_u64(path: &Path) -> Result<u64, CounterError> {
    let text = fs::read_to_string(path).map_err(|source| CounterError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    text.trim().parse::<u64>().map_err(|_| CounterError::Parse {
        path: path.to_path_buf(),
        value: text.trim().to_string(),
    })
}

/// 网络变化事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkEvent<Id> {
    /// 新出现或属性变化；`iface` 为 None 表示网卡名无法解析
    Changed { identity: Id, iface: Option<String> },
    Lost(Id),
}

/// 网络变化来源。注册后通过 `events` 推送事件，注销后停止推送。
pub trait NetworkSource: Send + 'static {
    type Id: Identity;

    fn register(&mut self, events: mpsc::UnboundedSender<NetworkEvent<Self::Id>>);
    fn unregister(&mut self);
}

/// 每个 tick 驱动一次槽位表，把各网卡速率汇总为一个总速率
pub struct ThroughputTracker<Id, C> {
    table: InterfaceSlotTable<Id>,
    counters: C,
    pub rate: AggregateRate,
}

impl<Id: Identity, C: CounterSource> ThroughputTracker<Id, C> {
    pub fn new(counters: C) -> Self {
        Self {
            table: InterfaceSlotTable::new(),
            counters,
            rate: AggregateRate::ZERO,
        }
    }

    pub fn apply(&mut self, event: NetworkEvent<Id>) {
        match event {
            NetworkEvent::Changed { identity, iface } => {
                self.table.set(identity, iface.as_deref());
            }
            NetworkEvent::Lost(identity) => {
                self.table.set(identity, None);
            }
        }
    }

    pub fn update(&mut self, now_ms: u64) -> AggregateRate {
        self.rate = self.table.sample(now_ms, &self.counters);
        self.rate
    }

    pub fn clear(&mut self) {
        self.table.clear();
        self.rate = AggregateRate::ZERO;
    }

    pub fn table(&self) -> &InterfaceSlotTable<Id> {
        &self.table
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_iface(root: &Path, iface: &str, tx: &str, rx: &str) {
        let stats = root.join(iface).join("statistics");
        fs::create_dir_all(&stats).unwrap();
        fs::write(stats.join("tx_bytes"), tx).unwrap();
        fs::write(stats.join("rx_bytes"), rx).unwrap();
    }

    #[test]
    fn test_sysfs_counters() {
        let dir = TempDir::new().unwrap();
        write_iface(dir.path(), "eth0", "1234\n", "5678\n");

        let counters = SysfsCounters::new(dir.path());
        assert_eq!(
            counters.read_counters("eth0").unwrap(),
            Counters {
                tx_bytes: 1234,
                rx_bytes: 5678
            }
        );
    }

    #[test]
    fn test_sysfs_counters_missing_iface() {
        let dir = TempDir::new().unwrap();
        let counters = SysfsCounters::new(dir.path());
        assert!(matches!(
            counters.read_counters("wlan0"),
            Err(CounterError::Io { .. })
        ));
    }

    #[test]
    fn test_sysfs_counters_garbage() {
        let dir = TempDir::new().unwrap();
        write_iface(dir.path(), "eth0", "lots", "0");
        let counters = SysfsCounters::new(dir.path());
        match counters.read_counters("eth0") {
            Err(CounterError::Parse { value, .. }) => assert_eq!(value, "lots"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_tracker_sums_interfaces() {
        let dir = TempDir::new().unwrap();
        write_iface(dir.path(), "eth0", "0", "0");
        write_iface(dir.path(), "wlan0", "100", "100");

        let mut tracker = ThroughputTracker::new(SysfsCounters::new(dir.path()));
        tracker.apply(NetworkEvent::Changed {
            identity: 2u32,
            iface: Some("eth0".into()),
        });
        tracker.apply(NetworkEvent::Changed {
            identity: 3u32,
            iface: Some("wlan0".into()),
        });

        // 首次采样只建立基线
        assert_eq!(tracker.update(1000), AggregateRate::ZERO);

        write_iface(dir.path(), "eth0", "2000", "4000");
        write_iface(dir.path(), "wlan0", "1100", "2100");
        assert_eq!(tracker.update(3000), AggregateRate::new(1500, 3000));
        assert_eq!(tracker.rate, AggregateRate::new(1500, 3000));
    }

    #[test]
    fn test_tracker_lost_and_clear() {
        let dir = TempDir::new().unwrap();
        write_iface(dir.path(), "eth0", "0", "0");

        let mut tracker = ThroughputTracker::new(SysfsCounters::new(dir.path()));
        tracker.apply(NetworkEvent::Changed {
            identity: 2u32,
            iface: Some("eth0".into()),
        });
        assert_eq!(tracker.table().occupied().count(), 1);

        tracker.apply(NetworkEvent::Lost(2));
        assert_eq!(tracker.table().occupied().count(), 0);

        tracker.apply(NetworkEvent::Changed {
            identity: 2u32,
            iface: Some("eth0".into()),
        });
        tracker.clear();
        assert_eq!(tracker.table().occupied().count(), 0);
        assert_eq!(tracker.rate, AggregateRate::ZERO);
    }
}
