//! State for one collection view: items, loading flag, error and filter.

use serde::{Deserialize, Serialize};

use crate::client::{Page, PreconditionError};
use crate::model::{ListFilter, ListItem};
use crate::AppError;

/// Issued by [`ListStore::begin_load`] and handed back with the response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LoadTicket(pub u64);

#[derive(Debug, Clone)]
pub struct ListStore<T> {
    items: Vec<T>,
    total: Option<u64>,
    error: Option<AppError>,
    filter: ListFilter,
    last_ticket: u64,
    /// Tickets at or below this were issued before the last reset.
    reset_at: u64,
    in_flight: u32,
}

impl<T> Default for ListStore<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            total: None,
            error: None,
            filter: ListFilter::default(),
            last_ticket: 0,
            reset_at: 0,
            in_flight: 0,
        }
    }
}

impl<T: ListItem> ListStore<T> {
    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn total(&self) -> Option<u64> {
        self.total
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight > 0
    }

    pub fn error(&self) -> Option<&AppError> {
        self.error.as_ref()
    }

    pub fn filter(&self) -> &ListFilter {
        &self.filter
    }

    /// Returns `true` when the filter actually changed, i.e. a load is due.
    pub fn set_filter(&mut self, filter: ListFilter) -> bool {
        let filter = filter.normalized();
        if filter == self.filter {
            return false;
        }
        self.filter = filter;
        true
    }

    /// Marks a load as started. A list cannot be fetched without an embassy.
    pub fn begin_load(&mut self) -> Result<LoadTicket, PreconditionError> {
        if self.filter.embassy_id.is_none() {
            let error = PreconditionError::MissingEmbassy;
            self.error = Some(AppError::new(crate::ErrorKind::Precondition, error.to_string()));
            return Err(error);
        }

        self.last_ticket += 1;
        self.in_flight += 1;
        self.error = None;
        Ok(LoadTicket(self.last_ticket))
    }

    /// Applies a response. Responses are applied in arrival order, so the
    /// last one to resolve wins even if an older request is slow. Responses
    /// to loads started before [`reset`](Self::reset) are dropped.
    pub fn finish_load(&mut self, ticket: LoadTicket, result: Result<Page<T>, AppError>) {
        if ticket.0 <= self.reset_at {
            tracing::debug!(ticket = ticket.0, "dropping list response from before reset");
            return;
        }
        self.in_flight = self.in_flight.saturating_sub(1);

        if ticket.0 < self.last_ticket {
            tracing::warn!(
                ticket = ticket.0,
                newest = self.last_ticket,
                "applying out-of-order list response"
            );
        }

        match result {
            Ok(page) => {
                tracing::debug!(ticket = ticket.0, count = page.items.len(), "list loaded");
                self.items = page.items;
                self.total = page.total;
                self.error = None;
            }
            Err(error) => {
                tracing::warn!(ticket = ticket.0, error = %error, "list load failed");
                self.error = Some(error);
            }
        }
    }

    /// Drops a committed deletion from local state.
    pub fn remove(&mut self, id: &str) -> Option<T> {
        let index = self.items.iter().position(|item| item.key() == Some(id))?;
        if let Some(total) = self.total.as_mut() {
            *total = total.saturating_sub(1);
        }
        Some(self.items.remove(index))
    }

    pub fn find(&self, id: &str) -> Option<&T> {
        self.items.iter().find(|item| item.key() == Some(id))
    }

    /// Back to the initial, empty state. Tickets keep counting, and every
    /// load still in flight is orphaned.
    pub fn reset(&mut self) {
        self.reset_at = self.last_ticket;
        self.items.clear();
        self.total = None;
        self.error = None;
        self.filter = ListFilter::default();
        self.in_flight = 0;
    }
}
