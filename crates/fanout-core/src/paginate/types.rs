//! Page request/response types and the paginator's position.

/// Request parameters handed to the fetch function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageOptions {
    pub limit: u32,
    pub offset: u64,
    pub cursor: Option<String>,
}

impl Default for PageOptions {
    fn default() -> Self {
        Self {
            limit: 10,
            offset: 0,
            cursor: None,
        }
    }
}

/// One page returned by the fetch function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageResult<T> {
    pub items: Vec<T>,
    /// Continuation token; empty strings are treated as absent.
    pub next_cursor: Option<String>,
    pub has_more: bool,
    /// Total item count, when the source reports one.
    pub total: Option<u64>,
}

impl<T> PageResult<T> {
    pub fn new(items: Vec<T>, has_more: bool) -> Self {
        Self {
            items,
            next_cursor: None,
            has_more,
            total: None,
        }
    }

    pub fn with_next_cursor(mut self, cursor: impl Into<String>) -> Self {
        self.next_cursor = Some(cursor.into());
        self
    }

    pub fn with_total(mut self, total: u64) -> Self {
        self.total = Some(total);
        self
    }
}

/// Caller-facing view of where a listing stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageInfo {
    /// Pages fetched so far (1-based number of the current page).
    pub page_number: u32,
    pub items_per_page: u32,
    /// 0 when the source never reported a total.
    pub total_items: u64,
    /// `ceil(total_items / items_per_page)`, or 0 when either is unknown.
    pub total_pages: u64,
    pub has_next: bool,
}

impl PageInfo {
    pub fn new(page_number: u32, items_per_page: u32, total_items: Option<u64>, has_next: bool) -> Self {
        let total_items = total_items.unwrap_or(0);
        let per_page = u64::from(items_per_page);
        let total_pages = if total_items > 0 && per_page > 0 {
            total_items.div_ceil(per_page)
        } else {
            0
        };
        Self {
            page_number,
            items_per_page,
            total_items,
            total_pages,
            has_next,
        }
    }
}

/// Position of a listing. Mutated only by its paginator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageState {
    /// Cursor mode when set; `offset` stays 0 in that mode.
    pub cursor: Option<String>,
    pub offset: u64,
    pub limit: u32,
    /// Successful non-empty fetches so far.
    pub page_number: u32,
    /// Total reported by the first page that carried one.
    pub total_known: Option<u64>,
    /// Items delivered so far.
    pub seen: u64,
    pub has_more: bool,
}

impl PageState {
    pub fn new(options: &PageOptions) -> Self {
        let cursor = options.cursor.clone().filter(|c| !c.is_empty());
        Self {
            offset: if cursor.is_some() { 0 } else { options.offset },
            cursor,
            limit: options.limit.max(1),
            page_number: 0,
            total_known: None,
            seen: 0,
            has_more: true,
        }
    }

    /// Options for the next request.
    pub fn options(&self) -> PageOptions {
        PageOptions {
            limit: self.limit,
            offset: self.offset,
            cursor: self.cursor.clone(),
        }
    }

    /// Move past a successfully fetched page.
    ///
    /// A non-empty next cursor switches to (or stays in) cursor mode and resets
    /// the offset. Without one, offset mode advances by `limit`; cursor mode
    /// has nothing to continue from and ends the listing.
    pub fn advance<T>(&mut self, page: &PageResult<T>) {
        if page.items.is_empty() {
            self.has_more = false;
            return;
        }
        self.page_number += 1;
        self.seen += page.items.len() as u64;
        if self.total_known.is_none() {
            self.total_known = page.total;
        }
        match page.next_cursor.as_deref().filter(|c| !c.is_empty()) {
            Some(next) => {
                self.cursor = Some(next.to_string());
                self.offset = 0;
                self.has_more = page.has_more;
            }
            None if self.cursor.is_some() => {
                self.has_more = false;
            }
            None => {
                self.offset += u64::from(self.limit);
                self.has_more = page.has_more;
            }
        }
    }

    pub fn info(&self) -> PageInfo {
        PageInfo::new(self.page_number, self.limit, self.total_known, self.has_more)
    }
}
