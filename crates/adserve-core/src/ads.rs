//! Bid-based ad selection

use std::sync::Arc;

use crate::line_items::LineItemStore;
use crate::types::{Ad, LineItem};

/// Picks winning ads among the active line items of a placement
#[derive(Debug, Clone)]
pub struct AdSelector {
    store: Arc<LineItemStore>,
    serve_base_url: Option<String>,
}

impl AdSelector {
    pub fn new(store: Arc<LineItemStore>, serve_base_url: Option<String>) -> Self {
        let serve_base_url = serve_base_url
            .map(|url| url.trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty());
        Self {
            store,
            serve_base_url,
        }
    }

    /// Top `limit` matching line items by descending bid.
    ///
    /// Equal bids keep creation order.
    pub fn winning_ads(
        &self,
        placement: &str,
        category: Option<&str>,
        keyword: Option<&str>,
        limit: usize,
    ) -> Vec<Ad> {
        let mut items = self.store.find_matching(placement, category, keyword);
        items.sort_by(|a, b| b.bid.total_cmp(&a.bid));
        items.truncate(limit);

        items.into_iter().map(|item| self.to_ad(item)).collect()
    }

    fn to_ad(&self, item: LineItem) -> Ad {
        let serve_url = match &self.serve_base_url {
            Some(base) => format!("{}/{}", base, item.id),
            None => String::new(),
        };

        Ad {
            id: item.id,
            name: item.name,
            advertiser_id: item.advertiser_id,
            bid: item.bid,
            placement: item.placement,
            serve_url,
        }
    }
}
