//! 固定容量的网卡槽位表
//!
//! 网络身份 → (网卡名, 上次读数)。容量用尽时丢弃新身份，已有槽位不受影响。
//! 空闲槽位按首次适配复用，释放后自然压缩到数组前部。

use tracing::{debug, warn};

use super::network::{CounterSource, Identity};
use super::rate::{is_non_monotonic, sample_rate, AggregateRate, Reading};

pub const SLOT_CAPACITY: usize = 64;

#[derive(Debug, Clone)]
pub struct InterfaceSlot<Id> {
    identity: Option<Id>,
    name: String,
    last: Option<Reading>,
}

impl<Id> Default for InterfaceSlot<Id> {
    fn default() -> Self {
        Self {
            identity: None,
            name: String::new(),
            last: None,
        }
    }
}

impl<Id> InterfaceSlot<Id> {
    pub fn is_occupied(&self) -> bool {
        self.identity.is_some() && !self.name.is_empty()
    }

    pub fn identity(&self) -> Option<&Id> {
        self.identity.as_ref()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// 上次读数；None 表示占用后尚未采样
    pub fn last_reading(&self) -> Option<Reading> {
        self.last
    }

    fn free(&mut self) {
        self.identity = None;
        self.name.clear();
        self.last = None;
    }
}

pub struct InterfaceSlotTable<Id, const N: usize = SLOT_CAPACITY> {
    slots: [InterfaceSlot<Id>; N],
}

impl<Id: Identity, const N: usize> InterfaceSlotTable<Id, N> {
    pub fn new() -> Self {
        Self {
            slots: std::array::from_fn(|_| InterfaceSlot::default()),
        }
    }

    pub fn capacity(&self) -> usize {
        N
    }

    pub fn slot(&self, index: usize) -> Option<&InterfaceSlot<Id>> {
        self.slots.get(index)
    }

    /// 已占用的槽位及其下标
    pub fn occupied(&self) -> impl Iterator<Item = (usize, &InterfaceSlot<Id>)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.is_occupied())
    }

    fn position(&self, identity: &Id) -> Option<usize> {
        self.slots
            .iter()
            .position(|slot| slot.identity.as_ref() == Some(identity))
    }

    fn first_free(&self) -> Option<usize> {
        self.slots.iter().position(|slot| !slot.is_occupied())
    }

    /// 登记或更新一个身份，返回所在槽位下标。
    ///
    /// `iface` 为 None 时释放该身份的槽位。网卡名变化时（例如漫游到另一个
    /// Wi-Fi 产生了新的内核网卡）清空该槽位的计数器，避免把计数跳变当作流量。
    pub fn set(&mut self, identity: Id, iface: Option<&str>) -> Option<usize> {
        let iface = match iface.filter(|name| !name.is_empty()) {
            Some(name) => name,
            None => {
                if let Some(index) = self.position(&identity) {
                    debug!(slot = index, identity = ?identity, "freeing interface slot");
                    self.slots[index].free();
                }
                return None;
            }
        };

        let index = match self.position(&identity).or_else(|| self.first_free()) {
            Some(index) => index,
            None => {
                warn!(
                    capacity = N,
                    identity = ?identity,
                    iface,
                    "interface slot table is full, dropping network"
                );
                return None;
            }
        };

        let slot = &mut self.slots[index];
        if slot.name != iface {
            debug!(slot = index, identity = ?identity, iface, "tracking interface");
            slot.name.clear();
            slot.name.push_str(iface);
            slot.last = None;
        }
        slot.identity = Some(identity);
        Some(index)
    }

    /// 采样所有已占用槽位，返回速率总和。
    ///
    /// 读取失败的槽位被释放；无论是否算出速率，槽位的读数都会更新为本次读数。
    pub fn sample<C: CounterSource>(&mut self, now_ms: u64, source: &C) -> AggregateRate {
        let mut total = AggregateRate::ZERO;

        for (index, slot) in self.slots.iter_mut().enumerate() {
            if !slot.is_occupied() {
                continue;
            }

            let counters = match source.read_counters(&slot.name) {
                Ok(counters) => counters,
                Err(err) => {
                    debug!(slot = index, iface = %slot.name, %err, "counter read failed, freeing slot");
                    slot.free();
                    continue;
                }
            };

            let reading = Reading {
                time_ms: now_ms,
                tx_bytes: counters.tx_bytes,
                rx_bytes: counters.rx_bytes,
            };

            if let Some(prev) = slot.last {
                if is_non_monotonic(&prev, &reading) {
                    debug!(slot = index, iface = %slot.name, "non-monotonic sample, reporting zero");
                }
                total += sample_rate(&prev, &reading);
            }
            slot.last = Some(reading);
        }

        total
    }

    pub fn clear(&mut self) {
        for slot in self.slots.iter_mut() {
            slot.free();
        }
    }
}

impl<Id: Identity, const N: usize> Default for InterfaceSlotTable<Id, N> {
    fn default() -> Self {
        Self::new()
    }
}
