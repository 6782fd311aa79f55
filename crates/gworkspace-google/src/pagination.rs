//! Page-token-following iteration.
//!
//! Google list endpoints return a page of items plus an opaque
//! `nextPageToken`. [`Paginated`] turns such an endpoint into a lazy iterator:
//! a page is only requested once the previous one has been drained, so a
//! consumer that stops early never triggers further requests.

use std::collections::VecDeque;

use serde::Deserialize;

use crate::error::ProviderResult;

/// One page of a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    /// Items in the order the server returned them.
    pub items: Vec<T>,
    /// Cursor for the next page; `None` or empty on the last page.
    pub next_page_token: Option<String>,
}

impl<T> Page<T> {
    /// Creates a page.
    pub fn new(items: Vec<T>, next_page_token: Option<String>) -> Self {
        Self {
            items,
            next_page_token,
        }
    }

    /// Creates a final page.
    pub fn last(items: Vec<T>) -> Self {
        Self::new(items, None)
    }

    /// Returns the cursor for the next page, treating `""` as absent.
    pub fn next_token(&self) -> Option<&str> {
        self.next_page_token.as_deref().filter(|t| !t.is_empty())
    }
}

/// Wire shape shared by list endpoints whose item array is called `items`
/// (Calendar) or `files` (Drive).
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ListResponse<T> {
    #[serde(default = "Vec::new", alias = "files")]
    pub items: Vec<T>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

impl<T> From<ListResponse<T>> for Page<T> {
    fn from(response: ListResponse<T>) -> Self {
        Page::new(response.items, response.next_page_token)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Cursor {
    Start,
    Next(String),
    Done,
}

/// Lazy iterator over every item of a paginated listing.
///
/// `fetch` receives the page token (`None` for the first request). Items are
/// yielded in page order. Once a page arrives without a token, or a request
/// fails, the iterator is exhausted. Not restartable: build a new one to
/// re-issue the first request.
pub struct Paginated<T, F> {
    fetch: F,
    buffer: VecDeque<T>,
    cursor: Cursor,
    pages_fetched: usize,
}

impl<T, F> Paginated<T, F>
where
    F: FnMut(Option<&str>) -> ProviderResult<Page<T>>,
{
    /// Creates an iterator; no request is issued until the first `next`.
    pub fn new(fetch: F) -> Self {
        Self {
            fetch,
            buffer: VecDeque::new(),
            cursor: Cursor::Start,
            pages_fetched: 0,
        }
    }

    /// Number of page requests issued so far.
    pub fn pages_fetched(&self) -> usize {
        self.pages_fetched
    }
}

impl<T, F> Iterator for Paginated<T, F>
where
    F: FnMut(Option<&str>) -> ProviderResult<Page<T>>,
{
    type Item = ProviderResult<T>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(item) = self.buffer.pop_front() {
                return Some(Ok(item));
            }

            let token = match self.cursor {
                Cursor::Done => return None,
                Cursor::Start => None,
                Cursor::Next(ref token) => Some(token.as_str()),
            };

            self.pages_fetched += 1;
            match (self.fetch)(token) {
                Ok(page) => {
                    self.cursor = match page.next_token() {
                        Some(next) => Cursor::Next(next.to_string()),
                        None => Cursor::Done,
                    };
                    self.buffer.extend(page.items);
                }
                Err(e) => {
                    self.cursor = Cursor::Done;
                    return Some(Err(e));
                }
            }
        }
    }
}
