//! Cursor-driven pagination for ZAPI `*-iter` calls.

use std::future::Future;

use tracing::trace;

use crate::error::{ApiError, ApiResult};

/// One page of an iterating call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page<T> {
    /// Records carried by this page
    pub records: Vec<T>,
    /// Cursor for the next page; empty when the listing is complete
    pub next_tag: String,
}

impl<T> Page<T> {
    pub fn new(records: Vec<T>, next_tag: impl Into<String>) -> Self {
        Self {
            records,
            next_tag: next_tag.into(),
        }
    }

    pub fn last(records: Vec<T>) -> Self {
        Self::new(records, String::new())
    }
}

/// Drive `fetch` from an empty cursor until a page comes back with an empty one.
///
/// Records are returned in page order. Any failed page fails the whole
/// listing. More than `max_pages` pages is reported as
/// [`ApiError::PaginationLimit`], which protects against a backend that keeps
/// handing out cursors.
pub async fn paginate<T, F, Fut>(mut fetch: F, max_pages: usize) -> ApiResult<Vec<T>>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = ApiResult<Page<T>>>,
{
    let mut records = Vec::new();
    let mut tag = String::new();

    for page_no in 1..=max_pages {
        let page = fetch(tag).await?;
        trace!(
            target: "netapp_exporter::api",
            page = page_no,
            records = page.records.len(),
            more = !page.next_tag.is_empty(),
            "Fetched page"
        );

        records.extend(page.records);
        if page.next_tag.is_empty() {
            return Ok(records);
        }
        tag = page.next_tag;
    }

    Err(ApiError::PaginationLimit { max_pages })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::VecDeque;

    /// Replays canned pages and records the cursor each request was made with.
    struct Script {
        pages: VecDeque<ApiResult<Page<&'static str>>>,
        seen_tags: Vec<String>,
    }

    impl Script {
        fn new(pages: Vec<ApiResult<Page<&'static str>>>) -> Self {
            Self {
                pages: pages.into(),
                seen_tags: Vec::new(),
            }
        }

        fn next(&mut self, tag: String) -> ApiResult<Page<&'static str>> {
            self.seen_tags.push(tag);
            self.pages.pop_front().expect("unexpected page request")
        }
    }

    #[tokio::test]
    async fn test_accumulates_pages_in_order() {
        let mut script = Script::new(vec![
            Ok(Page::new(vec!["A", "B"], "x")),
            Ok(Page::last(vec!["C"])),
        ]);

        let records = paginate(|tag| std::future::ready(script.next(tag)), 100)
            .await
            .unwrap();

        assert_eq!(records, vec!["A", "B", "C"]);
        assert_eq!(script.seen_tags, vec!["".to_string(), "x".to_string()]);
    }

    #[tokio::test]
    async fn test_single_empty_page() {
        let mut script = Script::new(vec![Ok(Page::last(vec![]))]);

        let records = paginate(|tag| std::future::ready(script.next(tag)), 100)
            .await
            .unwrap();

        assert!(records.is_empty());
        assert_eq!(script.seen_tags.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_page_fails_listing() {
        let failure = ApiError::transport("quota-report-iter", "connection reset");
        let mut script = Script::new(vec![
            Ok(Page::new(vec!["A", "B"], "x")),
            Err(failure.clone()),
        ]);

        let result = paginate(|tag| std::future::ready(script.next(tag)), 100).await;

        assert_eq!(result, Err(failure));
        assert_eq!(script.seen_tags.len(), 2);
    }

    #[tokio::test]
    async fn test_cycling_cursor_hits_page_limit() {
        let mut requests = 0usize;

        let result: ApiResult<Vec<u32>> = paginate(
            |_tag| {
                requests += 1;
                std::future::ready(Ok(Page::new(vec![1], "same")))
            },
            5,
        )
        .await;

        assert_eq!(result, Err(ApiError::PaginationLimit { max_pages: 5 }));
        assert_eq!(requests, 5);
    }
}
