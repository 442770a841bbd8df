//! 通过 sysfs 发现网卡变化
//!
//! 以内核 ifindex 作为网络身份；改名保持 ifindex，不可用的网卡上报为无名，
//! 目录消失则上报丢失。虚拟网卡（VPN 隧道、网桥、veth 等）的流量最终
//! 也会经过物理网卡，默认不计入。

use std::collections::HashMap;
use std::convert::TryFrom;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::network::{read_u64, NetworkEvent, NetworkSource};
use crate::error::{IndicatorError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub ifindex: u32,
    pub name: String,
    pub up: bool,
}

/// operstate 为这些值时视为不可用
const DOWN_STATES: &[&str] = &["down", "lowerlayerdown", "notpresent"];

/// 哪些网卡参与统计
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkFilter {
    /// 以这些前缀开头的网卡不计入
    pub ignore_prefixes: Vec<String>,
    /// 是否计入没有底层设备的虚拟网卡
    pub include_virtual: bool,
}

impl LinkFilter {
    pub fn new(ignore_prefixes: Vec<String>, include_virtual: bool) -> Self {
        Self {
            ignore_prefixes,
            include_virtual,
        }
    }

    fn is_ignored(&self, name: &str) -> bool {
        self.ignore_prefixes
            .iter()
            .any(|prefix| name.starts_with(prefix.as_str()))
    }
}

/// 没有 `device` 链接（tun、wg、veth、网桥）或带 `tun_flags`（tun/tap）的网卡
pub fn is_virtual(dir: &Path) -> bool {
    !dir.join("device").exists() || dir.join("tun_flags").exists()
}

/// 列出 `root` 下符合 `filter` 的网卡，按 ifindex 排序
pub fn scan_links(root: &Path, filter: &LinkFilter) -> Result<Vec<Link>> {
    let root_str = root
        .to_str()
        .ok_or_else(|| IndicatorError::Config(format!("non UTF-8 path {}", root.display())))?;
    let pattern = format!("{}/*/ifindex", glob::Pattern::escape(root_str));
    let paths = glob::glob(&pattern).map_err(|err| IndicatorError::Config(err.to_string()))?;

    let mut links = Vec::new();
    for path in paths.filter_map(|entry| entry.ok()) {
        let dir = match path.parent() {
            Some(dir) => dir,
            None => continue,
        };
        let name = match dir.file_name().and_then(|name| name.to_str()) {
            Some(name) => name.to_string(),
            None => continue,
        };
        if filter.is_ignored(&name) {
            continue;
        }
        if !filter.include_virtual && is_virtual(dir) {
            debug!(iface = %name, "skipping virtual interface");
            continue;
        }
        // 扫描期间消失的网卡直接跳过
        let ifindex = match read_u64(&path) {
            Ok(ifindex) => ifindex,
            Err(err) => {
                debug!(%err, "skipping interface");
                continue;
            }
        };
        let ifindex = match u32::try_from(ifindex) {
            Ok(ifindex) => ifindex,
            Err(_) => {
                debug!(iface = %name, ifindex, "ifindex out of range, skipping interface");
                continue;
            }
        };
        let up = match fs::read_to_string(dir.join("operstate")) {
            Ok(state) => !DOWN_STATES.contains(&state.trim()),
            Err(_) => true,
        };
        links.push(Link { ifindex, name, up });
    }

    links.sort_by_key(|link| link.ifindex);
    Ok(links)
}

/// 与上次的快照比较，生成变化事件并更新快照
pub fn diff_links(known: &mut HashMap<u32, Option<String>>, links: Vec<Link>) -> Vec<NetworkEvent<u32>> {
    let mut events = Vec::new();
    let mut seen = Vec::with_capacity(links.len());

    for link in links {
        seen.push(link.ifindex);
        let iface = if link.up { Some(link.name) } else { None };
        if known.get(&link.ifindex) != Some(&iface) {
            events.push(NetworkEvent::Changed {
                identity: link.ifindex,
                iface: iface.clone(),
            });
            known.insert(link.ifindex, iface);
        }
    }

    let mut lost: Vec<u32> = known
        .keys()
        .filter(|ifindex| !seen.contains(*ifindex))
        .copied()
        .collect();
    lost.sort_unstable();
    for ifindex in lost {
        known.remove(&ifindex);
        events.push(NetworkEvent::Lost(ifindex));
    }

    events
}

/// 注册后在后台定期扫描 sysfs；注销即停止扫描
pub struct SysfsLinks {
    root: PathBuf,
    filter: LinkFilter,
    scan_interval: Duration,
    task: Option<JoinHandle<()>>,
}

impl SysfsLinks {
    pub fn new(root: impl Into<PathBuf>, filter: LinkFilter, scan_interval: Duration) -> Self {
        Self {
            root: root.into(),
            filter,
            scan_interval,
            task: None,
        }
    }
}

impl NetworkSource for SysfsLinks {
    type Id = u32;

    /// # Panics
    ///
    /// 扫描任务通过 `tokio::spawn` 启动，必须在 Tokio 运行时内调用。
    fn register(&mut self, events: mpsc::UnboundedSender<NetworkEvent<u32>>) {
        if let Some(task) = self.task.take() {
            task.abort();
        }

        let root = self.root.clone();
        let filter = self.filter.clone();
        let scan_interval = self.scan_interval;

        self.task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(scan_interval);
            // 每次注册都从空快照开始，首轮扫描会重新上报所有网卡
            let mut known = HashMap::new();
            loop {
                ticker.tick().await;
                let links = match scan_links(&root, &filter) {
                    Ok(links) => links,
                    Err(err) => {
                        warn!(%err, "interface scan failed");
                        continue;
                    }
                };
                for event in diff_links(&mut known, links) {
                    if events.send(event).is_err() {
                        return;
                    }
                }
            }
        }));
    }

    fn unregister(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for SysfsLinks {
    fn drop(&mut self) {
        self.unregister();
    }
}
