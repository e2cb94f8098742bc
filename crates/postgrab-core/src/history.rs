use std::vec;

use crate::{
    context::OpContext,
    domain::{ContainerRef, ItemId, RemoteMessage},
    ports::MessageSource,
    Result,
};

/// Walks a container's history newest-first, one page in memory at a time.
///
/// The walk ends on an empty page, on a page whose oldest id does not move past the
/// previous cursor, or once `limit` messages have been yielded.
pub struct HistoryCursor<'a> {
    source: &'a dyn MessageSource,
    container: ContainerRef,
    page_size: usize,
    limit: Option<usize>,
    page: vec::IntoIter<RemoteMessage>,
    before: Option<ItemId>,
    yielded: usize,
    pages: usize,
    exhausted: bool,
}

impl<'a> HistoryCursor<'a> {
    pub fn new(source: &'a dyn MessageSource, container: ContainerRef, page_size: usize) -> Self {
        Self {
            source,
            container,
            page_size: page_size.max(1),
            limit: None,
            page: Vec::new().into_iter(),
            before: None,
            yielded: 0,
            pages: 0,
            exhausted: false,
        }
    }

    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    pub fn yielded(&self) -> usize {
        self.yielded
    }

    pub async fn next(&mut self, ctx: &OpContext) -> Result<Option<RemoteMessage>> {
        loop {
            if self.limit.is_some_and(|limit| self.yielded >= limit) {
                tracing::debug!(container = %self.container, limit = ?self.limit, "history cap reached");
                return Ok(None);
            }
            if let Some(msg) = self.page.next() {
                self.yielded += 1;
                return Ok(Some(msg));
            }
            if self.exhausted {
                return Ok(None);
            }

            ctx.ensure_active()?;
            let page = ctx
                .guard(
                    self.source
                        .history_page(&self.container, self.before, self.page_size),
                )
                .await?;
            self.pages += 1;

            let Some(oldest) = page.iter().map(|m| m.id).min() else {
                tracing::debug!(container = %self.container, pages = self.pages, "history exhausted");
                self.exhausted = true;
                return Ok(None);
            };
            if self.before.is_some_and(|before| oldest >= before) {
                tracing::warn!(
                    container = %self.container,
                    oldest = %oldest,
                    "history page did not advance; stopping"
                );
                self.exhausted = true;
                return Ok(None);
            }
            self.before = Some(oldest);
            self.page = page.into_iter();
        }
    }
}
