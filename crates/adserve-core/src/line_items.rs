//! In-memory line-item store
//!
//! A read/write lock around a map. Handlers share one store through `Arc`.

use std::collections::HashMap;

use chrono::Utc;
use parking_lot::RwLock;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::types::{LineItem, LineItemCreate, LineItemStatus};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("line item not found: {0}")]
    NotFound(String),
}

/// Rejected `LineItemCreate` payload
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("'{0}' must not be empty")]
    Empty(&'static str),
    #[error("'bid' must be a positive number")]
    InvalidBid,
    #[error("'budget' must be a non-negative number")]
    InvalidBudget,
}

impl LineItemCreate {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::Empty("name"));
        }
        if self.advertiser_id.trim().is_empty() {
            return Err(ValidationError::Empty("advertiser_id"));
        }
        if self.placement.trim().is_empty() {
            return Err(ValidationError::Empty("placement"));
        }
        if !self.bid.is_finite() || self.bid <= 0.0 {
            return Err(ValidationError::InvalidBid);
        }
        if !self.budget.is_finite() || self.budget < 0.0 {
            return Err(ValidationError::InvalidBudget);
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct LineItemStore {
    items: RwLock<HashMap<String, LineItem>>,
}

impl LineItemStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&self, item: LineItemCreate) -> LineItem {
        let now = Utc::now();
        let line_item = LineItem {
            id: format!("li_{}", Uuid::new_v4()),
            name: item.name,
            advertiser_id: item.advertiser_id,
            bid: item.bid,
            budget: item.budget,
            placement: item.placement,
            categories: item.categories,
            keywords: item.keywords,
            status: LineItemStatus::Active,
            created_at: now,
            updated_at: now,
        };

        self.items
            .write()
            .insert(line_item.id.clone(), line_item.clone());

        info!(
            id = %line_item.id,
            name = %line_item.name,
            advertiser_id = %line_item.advertiser_id,
            placement = %line_item.placement,
            "Line item created"
        );

        line_item
    }

    pub fn get(&self, id: &str) -> Result<LineItem, StoreError> {
        self.items
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    /// All line items, optionally filtered by advertiser and placement.
    ///
    /// Ordered by creation time so repeated listings are stable.
    pub fn list(&self, advertiser_id: Option<&str>, placement: Option<&str>) -> Vec<LineItem> {
        let guard = self.items.read();
        let mut result: Vec<LineItem> = guard
            .values()
            .filter(|item| advertiser_id.map_or(true, |id| item.advertiser_id == id))
            .filter(|item| placement.map_or(true, |p| item.placement == p))
            .cloned()
            .collect();
        drop(guard);

        sort_by_creation(&mut result);
        result
    }

    /// Active line items for `placement`, narrowed by category and keyword when given
    pub fn find_matching(
        &self,
        placement: &str,
        category: Option<&str>,
        keyword: Option<&str>,
    ) -> Vec<LineItem> {
        let mut items = self
            .items
            .read()
            .values()
            .filter(|item| item.placement == placement && item.status == LineItemStatus::Active)
            .filter(|item| category.map_or(true, |c| item.categories.iter().any(|v| v == c)))
            .filter(|item| keyword.map_or(true, |k| item.keywords.iter().any(|v| v == k)))
            .cloned()
            .collect::<Vec<_>>();
        sort_by_creation(&mut items);
        items
    }

    /// Change the status of an existing line item
    #[cfg(test)]
    pub(crate) fn set_status(
        &self,
        id: &str,
        status: LineItemStatus,
    ) -> Result<LineItem, StoreError> {
        let mut guard = self.items.write();
        let item = guard
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        item.status = status;
        item.updated_at = Utc::now();
        Ok(item.clone())
    }

    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }
}

fn sort_by_creation(items: &mut [LineItem]) {
    items.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
}
