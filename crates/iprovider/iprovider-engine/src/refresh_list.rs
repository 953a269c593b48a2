//! Refresh-items dual-list (§4.12): item requests are pushed in from the
//! connection-accept path (a different call site than the tick loop that
//! drains them), so it uses the same mutex-protected swap design as
//! [`perfcore_stats::TimeRecordQueue`].

use std::sync::Mutex;

#[derive(Debug, Clone, Copy)]
pub struct ItemInfo {
    pub stream_id: u32,
    pub snapshot: bool,
}

pub struct RefreshItemsList {
    inner: Mutex<Inner>,
}

struct Inner {
    write: Vec<ItemInfo>,
    read: Vec<ItemInfo>,
}

impl Default for RefreshItemsList {
    fn default() -> Self {
        Self::new()
    }
}

impl RefreshItemsList {
    pub fn new() -> Self {
        Self { inner: Mutex::new(Inner { write: Vec::new(), read: Vec::new() }) }
    }

    pub fn push(&self, item: ItemInfo) {
        self.inner.lock().unwrap().write.push(item);
    }

    /// Atomically swaps read/write roles and returns everything queued
    /// since the last drain, for the worker to send refreshes for and
    /// then move onto the updates list.
    pub fn swap_and_drain(&self) -> Vec<ItemInfo> {
        let mut inner = self.inner.lock().unwrap();
        inner.read.clear();
        std::mem::swap(&mut inner.write, &mut inner.read);
        std::mem::take(&mut inner.read)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn swap_and_drain_yields_pushed_items_exactly_once() {
        let list = RefreshItemsList::new();
        list.push(ItemInfo { stream_id: 1, snapshot: false });
        list.push(ItemInfo { stream_id: 2, snapshot: true });
        let drained = list.swap_and_drain();
        assert_eq!(drained.len(), 2);
        assert!(list.swap_and_drain().is_empty());
    }
}
