//! Item template pool (§4.5): refresh/update/post/generic templates per
//! domain, with per-stream rotating iterators.

use std::collections::HashMap;

/// One encodable message shape, pre-sized so the buffer allocator never
/// needs to probe the encoder to learn how much space to reserve.
#[derive(Debug, Clone)]
pub struct Template {
    pub name: String,
    pub estimated_encoded_len: usize,
    pub market_by_order: Option<MarketByOrderMeta>,
}

impl Template {
    pub fn new(name: impl Into<String>, estimated_encoded_len: usize) -> Self {
        Self { name: name.into(), estimated_encoded_len, market_by_order: None }
    }

    pub fn with_market_by_order(mut self, meta: MarketByOrderMeta) -> Self {
        self.market_by_order = Some(meta);
        self
    }
}

/// Per-template market-by-order rotation state (§3 supplement, from
/// `itemEncoder.c`): selects a deterministic but varying `orderId` for
/// each repetition of this template.
#[derive(Debug, Clone, Copy)]
pub struct MarketByOrderMeta {
    pub base_order_id: u64,
    pub order_count: u64,
}

impl MarketByOrderMeta {
    pub fn new(base_order_id: u64, order_count: u64) -> Self {
        Self { base_order_id, order_count }
    }

    /// `orderId = base_order_id + (rotation_count * order_count) + slot`.
    pub fn order_id_for(&self, rotation_count: u64, slot: usize) -> u64 {
        self.base_order_id + rotation_count * self.order_count + slot as u64
    }
}

/// One domain's cached templates: a single refresh template plus rotating
/// pools of update/post/generic templates.
#[derive(Debug, Clone, Default)]
struct DomainTemplates {
    refresh: Option<Template>,
    updates: Vec<Template>,
    posts: Vec<Template>,
    generics: Vec<Template>,
}

/// Read-only after load, shared by every worker thread — templates never
/// change for the lifetime of the run.
#[derive(Debug, Clone, Default)]
pub struct TemplatePool {
    domains: HashMap<String, DomainTemplates>,
}

/// An opaque per-stream cursor into one domain's update/post/generic
/// template vectors, advanced independently of every other stream's.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateIterator {
    update_idx: usize,
    post_idx: usize,
    generic_idx: usize,
}

impl TemplatePool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_refresh(&mut self, domain: &str, template: Template) {
        self.domains.entry(domain.to_string()).or_default().refresh = Some(template);
    }

    pub fn add_update(&mut self, domain: &str, template: Template) {
        self.domains.entry(domain.to_string()).or_default().updates.push(template);
    }

    pub fn add_post(&mut self, domain: &str, template: Template) {
        self.domains.entry(domain.to_string()).or_default().posts.push(template);
    }

    pub fn add_generic(&mut self, domain: &str, template: Template) {
        self.domains.entry(domain.to_string()).or_default().generics.push(template);
    }

    pub fn refresh(&self, domain: &str) -> Option<&Template> {
        self.domains.get(domain).and_then(|d| d.refresh.as_ref())
    }

    /// Returns the next update template for `domain`, advancing `iter`'s
    /// update cursor with wraparound.
    pub fn next_update<'a>(&'a self, domain: &str, iter: &mut TemplateIterator) -> Option<&'a Template> {
        let d = self.domains.get(domain)?;
        if d.updates.is_empty() {
            return None;
        }
        let t = &d.updates[iter.update_idx % d.updates.len()];
        iter.update_idx = (iter.update_idx + 1) % d.updates.len();
        Some(t)
    }

    pub fn next_post<'a>(&'a self, domain: &str, iter: &mut TemplateIterator) -> Option<&'a Template> {
        let d = self.domains.get(domain)?;
        if d.posts.is_empty() {
            return None;
        }
        let t = &d.posts[iter.post_idx % d.posts.len()];
        iter.post_idx = (iter.post_idx + 1) % d.posts.len();
        Some(t)
    }

    pub fn next_generic<'a>(&'a self, domain: &str, iter: &mut TemplateIterator) -> Option<&'a Template> {
        let d = self.domains.get(domain)?;
        if d.generics.is_empty() {
            return None;
        }
        let t = &d.generics[iter.generic_idx % d.generics.len()];
        iter.generic_idx = (iter.generic_idx + 1) % d.generics.len();
        Some(t)
    }

    pub fn has_domain(&self, domain: &str) -> bool {
        self.domains.contains_key(domain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool() -> TemplatePool {
        let mut p = TemplatePool::new();
        p.set_refresh("MarketPrice", Template::new("refresh", 128));
        p.add_update("MarketPrice", Template::new("update-0", 64));
        p.add_update("MarketPrice", Template::new("update-1", 72));
        p
    }

    #[test]
    fn next_update_rotates_and_wraps() {
        let p = pool();
        let mut iter = TemplateIterator::default();
        assert_eq!(p.next_update("MarketPrice", &mut iter).unwrap().name, "update-0");
        assert_eq!(p.next_update("MarketPrice", &mut iter).unwrap().name, "update-1");
        assert_eq!(p.next_update("MarketPrice", &mut iter).unwrap().name, "update-0");
    }

    #[test]
    fn iterators_are_independent_per_stream() {
        let p = pool();
        let mut a = TemplateIterator::default();
        let mut b = TemplateIterator::default();
        p.next_update("MarketPrice", &mut a);
        assert_eq!(p.next_update("MarketPrice", &mut b).unwrap().name, "update-0");
    }

    #[test]
    fn missing_category_returns_none() {
        let p = pool();
        let mut iter = TemplateIterator::default();
        assert!(p.next_post("MarketPrice", &mut iter).is_none());
    }

    #[test]
    fn missing_domain_returns_none() {
        let p = pool();
        let mut iter = TemplateIterator::default();
        assert!(p.next_update("MarketByOrder", &mut iter).is_none());
        assert!(p.refresh("MarketByOrder").is_none());
    }

    #[test]
    fn market_by_order_id_advances_by_order_count_per_rotation() {
        let meta = MarketByOrderMeta::new(1000, 5);
        assert_eq!(meta.order_id_for(0, 0), 1000);
        assert_eq!(meta.order_id_for(0, 4), 1004);
        assert_eq!(meta.order_id_for(1, 0), 1005);
        assert_eq!(meta.order_id_for(2, 3), 1013);
    }
}
