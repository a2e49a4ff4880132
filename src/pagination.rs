//! Caller-side accumulation of paged listings.
//!
//! Stops when the accumulated count reaches the server total, or on the
//! first empty page whatever the total says. Without a total, a short page
//! is the last one.

use std::future::Future;

use tracing::debug;

use crate::error::Result;
use crate::models::{Filters, Page, PageRequest};

#[derive(Debug, Clone)]
pub struct Pager {
    page_size: u32,
    filters: Filters,
    accumulated: u32,
    total: Option<u32>,
    done: bool,
}

impl Pager {
    pub fn new(page_size: u32, filters: Filters) -> Self {
        Self {
            page_size: page_size.max(1),
            filters,
            accumulated: 0,
            total: None,
            done: false,
        }
    }

    /// The next window to ask for, or `None` once the listing is complete.
    pub fn next_request(&self) -> Option<PageRequest> {
        if self.done {
            return None;
        }
        Some(PageRequest::new(self.accumulated, self.page_size).with_filters(self.filters.clone()))
    }

    pub fn absorb<T>(&mut self, page: &Page<T>) {
        let received = u32::try_from(page.items.len()).unwrap_or(u32::MAX);
        self.accumulated = self.accumulated.saturating_add(received);
        if page.total_count.is_some() {
            self.total = page.total_count;
        }

        self.done = received == 0
            || match self.total {
                Some(total) => self.accumulated >= total,
                None => received < self.page_size,
            };
    }

    pub fn accumulated(&self) -> u32 {
        self.accumulated
    }

    pub fn total(&self) -> Option<u32> {
        self.total
    }

    pub fn has_more(&self) -> bool {
        !self.done
    }
}

/// Drains a paged listing into one vector, in server order.
pub async fn collect_all<T, F, Fut>(page_size: u32, filters: Filters, mut fetch: F) -> Result<Vec<T>>
where
    F: FnMut(PageRequest) -> Fut,
    Fut: Future<Output = Result<Page<T>>>,
{
    let mut pager = Pager::new(page_size, filters);
    let mut items = Vec::new();

    while let Some(request) = pager.next_request() {
        let page = fetch(request).await?;
        pager.absorb(&page);
        items.extend(page.items);
    }

    debug!("Collected {} items (total {:?})", items.len(), pager.total());
    Ok(items)
}
