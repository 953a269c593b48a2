//! Item state registry (§4.6): one record per requested item, indexed by
//! `stream_id - start` for O(1) resolve, plus the FIFO/rotating queues that
//! drive the consumer and provider workers.

use std::collections::VecDeque;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ItemRegistryError {
    #[error("stream_id {0} has no registered record")]
    UnknownStream(u32),
    #[error("stream {0} received a final status while WAITING_FOR_REFRESH")]
    UnexpectedClose(u32),
    #[error("stream {0} is already in HAS_REFRESH and cannot move back")]
    RefreshIsOneWay(u32),
}

/// One-way lifecycle: a record only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemState {
    NotRequested,
    WaitingForRefresh,
    HasRefresh,
}

#[derive(Debug, Clone)]
pub struct ItemRecord {
    pub stream_id: u32,
    pub domain: String,
    pub name: String,
    pub state: ItemState,
    pub is_post: bool,
    pub is_generic: bool,
    /// Only items with this flag are eligible to carry a latency stamp.
    pub is_latency: bool,
}

impl ItemRecord {
    pub fn new(stream_id: u32, domain: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            stream_id,
            domain: domain.into(),
            name: name.into(),
            state: ItemState::NotRequested,
            is_post: false,
            is_generic: false,
            is_latency: false,
        }
    }
}

/// Records indexed by `stream_id - start`, plus the request/post/generic
/// queues the worker drains from.
pub struct ItemRegistry {
    start: u32,
    records: Vec<ItemRecord>,
    request_queue: VecDeque<u32>,
    post_queue: VecDeque<u32>,
    generic_queue: VecDeque<u32>,
}

impl ItemRegistry {
    pub fn new(start: u32, records: Vec<ItemRecord>) -> Self {
        Self {
            start,
            records,
            request_queue: VecDeque::new(),
            post_queue: VecDeque::new(),
            generic_queue: VecDeque::new(),
        }
    }

    fn index(&self, stream_id: u32) -> Result<usize, ItemRegistryError> {
        let idx = stream_id
            .checked_sub(self.start)
            .map(|i| i as usize)
            .filter(|&i| i < self.records.len())
            .ok_or(ItemRegistryError::UnknownStream(stream_id))?;
        Ok(idx)
    }

    /// O(1) lookup by stream id.
    pub fn resolve(&self, stream_id: u32) -> Result<&ItemRecord, ItemRegistryError> {
        let idx = self.index(stream_id)?;
        Ok(&self.records[idx])
    }

    fn resolve_mut(&mut self, stream_id: u32) -> Result<&mut ItemRecord, ItemRegistryError> {
        let idx = self.index(stream_id)?;
        Ok(&mut self.records[idx])
    }

    pub fn add_to_request_queue(&mut self, stream_id: u32) -> Result<(), ItemRegistryError> {
        self.resolve(stream_id)?;
        self.request_queue.push_back(stream_id);
        Ok(())
    }

    pub fn pop_from_request_queue(&mut self) -> Option<u32> {
        self.request_queue.pop_front()
    }

    pub fn move_to_awaiting_refresh(&mut self, stream_id: u32) -> Result<(), ItemRegistryError> {
        let rec = self.resolve_mut(stream_id)?;
        rec.state = ItemState::WaitingForRefresh;
        Ok(())
    }

    /// Moves a record into `HasRefresh`. `HasRefresh` is terminal for this
    /// transition: once set it cannot be moved back to
    /// `WaitingForRefresh`. If the item is flagged for posting and/or
    /// generic messages, it is also enqueued into the matching rotating
    /// queue so the worker starts cycling it immediately.
    pub fn move_to_refresh_complete(&mut self, stream_id: u32) -> Result<(), ItemRegistryError> {
        let rec = self.resolve_mut(stream_id)?;
        if rec.state == ItemState::HasRefresh {
            return Err(ItemRegistryError::RefreshIsOneWay(stream_id));
        }
        rec.state = ItemState::HasRefresh;
        let (is_post, is_generic) = (rec.is_post, rec.is_generic);
        if is_post {
            self.post_queue.push_back(stream_id);
        }
        if is_generic {
            self.generic_queue.push_back(stream_id);
        }
        Ok(())
    }

    /// Reports `UnexpectedClose` if `stream_id` was `WaitingForRefresh`
    /// when a final status arrived — used by the session layer on receipt
    /// of a terminal stream state.
    pub fn on_final_status(&self, stream_id: u32) -> Result<(), ItemRegistryError> {
        let rec = self.resolve(stream_id)?;
        if rec.state == ItemState::WaitingForRefresh {
            return Err(ItemRegistryError::UnexpectedClose(stream_id));
        }
        Ok(())
    }

    pub fn count_in_refresh_complete(&self) -> usize {
        self.records.iter().filter(|r| r.state == ItemState::HasRefresh).count()
    }

    pub fn pop_post_rotation(&mut self) -> Option<u32> {
        let id = self.post_queue.pop_front()?;
        self.post_queue.push_back(id);
        Some(id)
    }

    pub fn pop_generic_rotation(&mut self) -> Option<u32> {
        let id = self.generic_queue.pop_front()?;
        self.generic_queue.push_back(id);
        Some(id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> ItemRegistry {
        let mut a = ItemRecord::new(100, "MarketPrice", "ITEM_A");
        a.is_post = true;
        let b = ItemRecord::new(101, "MarketPrice", "ITEM_B");
        ItemRegistry::new(100, vec![a, b])
    }

    #[test]
    fn resolve_is_indexed_by_stream_id_minus_start() {
        let r = registry();
        assert_eq!(r.resolve(101).unwrap().name, "ITEM_B");
    }

    #[test]
    fn resolve_unknown_stream_errors() {
        let r = registry();
        assert_eq!(r.resolve(999), Err(ItemRegistryError::UnknownStream(999)));
    }

    #[test]
    fn request_queue_is_fifo() {
        let mut r = registry();
        r.add_to_request_queue(100).unwrap();
        r.add_to_request_queue(101).unwrap();
        assert_eq!(r.pop_from_request_queue(), Some(100));
        assert_eq!(r.pop_from_request_queue(), Some(101));
        assert_eq!(r.pop_from_request_queue(), None);
    }

    #[test]
    fn refresh_complete_enqueues_post_items_only() {
        let mut r = registry();
        r.move_to_awaiting_refresh(100).unwrap();
        r.move_to_refresh_complete(100).unwrap();
        assert_eq!(r.pop_post_rotation(), Some(100));

        r.move_to_awaiting_refresh(101).unwrap();
        r.move_to_refresh_complete(101).unwrap();
        assert_eq!(r.pop_generic_rotation(), None);
    }

    #[test]
    fn has_refresh_is_one_way() {
        let mut r = registry();
        r.move_to_refresh_complete(100).unwrap();
        assert_eq!(
            r.move_to_refresh_complete(100),
            Err(ItemRegistryError::RefreshIsOneWay(100))
        );
    }

    #[test]
    fn final_status_while_waiting_is_unexpected_close() {
        let mut r = registry();
        r.move_to_awaiting_refresh(100).unwrap();
        assert_eq!(
            r.on_final_status(100),
            Err(ItemRegistryError::UnexpectedClose(100))
        );
    }

    #[test]
    fn final_status_after_refresh_complete_is_fine() {
        let mut r = registry();
        r.move_to_refresh_complete(100).unwrap();
        assert!(r.on_final_status(100).is_ok());
    }

    #[test]
    fn count_in_refresh_complete_tracks_transitions() {
        let mut r = registry();
        assert_eq!(r.count_in_refresh_complete(), 0);
        r.move_to_refresh_complete(100).unwrap();
        assert_eq!(r.count_in_refresh_complete(), 1);
    }

    #[test]
    fn post_rotation_cycles_without_dropping() {
        let mut r = registry();
        r.move_to_refresh_complete(100).unwrap();
        assert_eq!(r.pop_post_rotation(), Some(100));
        assert_eq!(r.pop_post_rotation(), Some(100));
    }
}
