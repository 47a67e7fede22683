//! Cursor-based pagination.
//!
//! [`Paginator`] is an [`Iterator`] of pages. Each page is fetched lazily
//! with a caller-supplied closure that receives the cursor of the last item
//! seen, so every page goes through the request executor and gets its own
//! retry budget.

use std::marker::PhantomData;

use tracing::debug;

use crate::Result;

/// Page size used when fetching all transactions.
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// An item that can be used to continue a listing after itself.
pub trait Cursor {
    /// The value passed as the continuation cursor for the next page.
    fn cursor(&self) -> &str;
}

/// Lazily walks a cursor-paginated listing.
///
/// Iteration stops after an empty page, after a page shorter than the page
/// size, after the first error, or once `max_pages` pages were fetched.
///
/// # Example
///
/// ```no_run
/// # fn example(client: monzo_rs::MonzoClient) -> monzo_rs::Result<()> {
/// use monzo_rs::models::{AccountId, TransactionsQuery};
///
/// let account = AccountId::new("acc_00009237aqC8c5umZmrRdh");
/// let pages = client
///     .transactions()
///     .pages(&account, TransactionsQuery::default())
///     .max_pages(5);
///
/// for page in pages {
///     println!("fetched {} transactions", page?.len());
/// }
/// # Ok(())
/// # }
/// ```
pub struct Paginator<T, F> {
    fetch: F,
    cursor: Option<String>,
    done: bool,
    pages_fetched: usize,
    max_pages: Option<usize>,
    page_size: usize,
    _marker: PhantomData<T>,
}

impl<T, F> Paginator<T, F>
where
    T: Cursor,
    F: FnMut(Option<&str>) -> Result<Vec<T>>,
{
    /// Create a paginator. `fetch` is called with `None` for the first page.
    pub fn new(page_size: usize, fetch: F) -> Self {
        Self {
            fetch,
            cursor: None,
            done: false,
            pages_fetched: 0,
            max_pages: None,
            page_size,
            _marker: PhantomData,
        }
    }

    /// Stop after `max_pages` pages.
    pub fn max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = Some(max_pages);
        self
    }

    /// Number of pages fetched so far.
    pub fn pages_fetched(&self) -> usize {
        self.pages_fetched
    }

    /// Fetch every remaining page and concatenate the items.
    pub fn collect_all(self) -> Result<Vec<T>> {
        let mut items = Vec::new();
        for page in self {
            items.extend(page?);
        }
        Ok(items)
    }
}

impl<T, F> Iterator for Paginator<T, F>
where
    T: Cursor,
    F: FnMut(Option<&str>) -> Result<Vec<T>>,
{
    type Item = Result<Vec<T>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if self.max_pages.is_some_and(|max| self.pages_fetched >= max) {
            debug!(pages = self.pages_fetched, "page limit reached");
            self.done = true;
            return None;
        }

        let page = match (self.fetch)(self.cursor.as_deref()) {
            Ok(page) => page,
            Err(err) => {
                self.done = true;
                return Some(Err(err));
            }
        };
        self.pages_fetched += 1;

        if page.is_empty() {
            self.done = true;
            return None;
        }
        if page.len() < self.page_size {
            self.done = true;
        } else {
            self.cursor = page.last().map(|item| item.cursor().to_string());
        }

        debug!(
            page = self.pages_fetched,
            items = page.len(),
            more = !self.done,
            "fetched page"
        );
        Some(Ok(page))
    }
}

impl<T, F> std::fmt::Debug for Paginator<T, F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Paginator")
            .field("cursor", &self.cursor)
            .field("done", &self.done)
            .field("pages_fetched", &self.pages_fetched)
            .field("max_pages", &self.max_pages)
            .field("page_size", &self.page_size)
            .finish()
    }
}
