use std::future::Future;

use serde_json::Value;
use tracing::{debug, warn};

use crate::github::GitHubError;

/// Hard stop for a single connection. GitHub pages are 100 nodes, so this
/// allows 10k nodes per connection before giving up.
const MAX_PAGES_PER_CONNECTION: u32 = 100;

/// One page of a Relay-style connection.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub nodes: Vec<T>,
    pub end_cursor: Option<String>,
    pub has_next_page: bool,
}

impl Page<Value> {
    /// Parses a `{pageInfo, nodes|edges}` connection object. Returns `None`
    /// when the value is not a well-formed connection, which callers treat
    /// as end-of-pagination for that connection.
    pub fn from_connection(connection: &Value) -> Option<Page<Value>> {
        let page_info = connection.get("pageInfo")?;
        let has_next_page = page_info.get("hasNextPage")?.as_bool()?;
        let end_cursor = page_info
            .get("endCursor")
            .and_then(Value::as_str)
            .map(str::to_owned);

        let nodes = if let Some(nodes) = connection.get("nodes").and_then(Value::as_array) {
            nodes.iter().filter(|node| !node.is_null()).cloned().collect()
        } else if let Some(edges) = connection.get("edges").and_then(Value::as_array) {
            edges
                .iter()
                .filter_map(|edge| edge.get("node"))
                .filter(|node| !node.is_null())
                .cloned()
                .collect()
        } else {
            return None;
        };

        Some(Page {
            nodes,
            end_cursor,
            has_next_page,
        })
    }
}

/// Walks a cursor-based connection until the server reports no further
/// pages, accumulating every node.
///
/// `fetch_page` receives the previous page's cursor (`None` on the first
/// call). Returning `Ok(None)` signals that the response no longer carries a
/// usable connection; the walk stops and the nodes collected so far are
/// returned. `Err` propagates, so the caller's closure decides whether a
/// transport failure aborts the walk or degrades it to a partial result.
pub async fn walk_connection<T, F, Fut>(mut fetch_page: F) -> Result<Vec<T>, GitHubError>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<Option<Page<T>>, GitHubError>>,
{
    let mut nodes = Vec::new();
    let mut cursor: Option<String> = None;
    let mut pages = 0u32;

    loop {
        let page = match fetch_page(cursor.take()).await? {
            Some(page) => page,
            None => {
                debug!("Connection ended early after {} pages", pages);
                break;
            }
        };

        pages += 1;
        nodes.extend(page.nodes);

        if !page.has_next_page {
            break;
        }
        if pages >= MAX_PAGES_PER_CONNECTION {
            warn!(
                "Stopping after {} pages with more available, keeping {} nodes",
                pages,
                nodes.len()
            );
            break;
        }
        match page.end_cursor {
            Some(next) => cursor = Some(next),
            None => {
                // hasNextPage without a cursor would refetch the first page forever
                warn!("Server reported another page but no cursor, stopping");
                break;
            }
        }
    }

    Ok(nodes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::cell::Cell;

    #[tokio::test]
    async fn single_page_walk_terminates_after_one_fetch() {
        let calls = Cell::new(0u32);
        let calls_ref = &calls;

        let nodes = walk_connection(|cursor| async move {
            calls_ref.set(calls_ref.get() + 1);
            assert!(cursor.is_none());
            Ok(Some(Page {
                nodes: vec![1, 2, 3],
                end_cursor: Some("cursor-a".to_string()),
                has_next_page: false,
            }))
        })
        .await
        .unwrap();

        assert_eq!(nodes, vec![1, 2, 3]);
        assert_eq!(calls.get(), 1);
    }

    #[tokio::test]
    async fn walk_threads_cursor_through_pages() {
        let nodes = walk_connection(|cursor| async move {
            match cursor.as_deref() {
                None => Ok(Some(Page {
                    nodes: vec![1, 2],
                    end_cursor: Some("page-2".to_string()),
                    has_next_page: true,
                })),
                Some("page-2") => Ok(Some(Page {
                    nodes: vec![3],
                    end_cursor: None,
                    has_next_page: false,
                })),
                Some(other) => panic!("unexpected cursor {other}"),
            }
        })
        .await
        .unwrap();

        assert_eq!(nodes, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn malformed_page_keeps_nodes_collected_so_far() {
        let nodes = walk_connection(|cursor| async move {
            match cursor.as_deref() {
                None => Ok(Some(Page {
                    nodes: vec!["a", "b"],
                    end_cursor: Some("page-2".to_string()),
                    has_next_page: true,
                })),
                Some(_) => Ok(None),
            }
        })
        .await
        .unwrap();

        assert_eq!(nodes, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn missing_cursor_with_more_pages_stops_the_walk() {
        let nodes = walk_connection(|_| async move {
            Ok(Some(Page {
                nodes: vec![1],
                end_cursor: None,
                has_next_page: true,
            }))
        })
        .await
        .unwrap();

        assert_eq!(nodes, vec![1]);
    }

    #[tokio::test]
    async fn transport_error_propagates() {
        let result: Result<Vec<i32>, _> = walk_connection(|_| async move {
            Err(GitHubError::ApiError {
                status: 502,
                message: "bad gateway".to_string(),
            })
        })
        .await;

        assert!(matches!(result, Err(GitHubError::ApiError { status: 502, .. })));
    }

    #[test]
    fn connection_parses_nodes_shape() {
        let page = Page::from_connection(&json!({
            "pageInfo": { "endCursor": "abc", "hasNextPage": true },
            "nodes": [{ "name": "one" }, { "name": "two" }]
        }))
        .unwrap();

        assert_eq!(page.nodes.len(), 2);
        assert_eq!(page.end_cursor.as_deref(), Some("abc"));
        assert!(page.has_next_page);
    }

    #[test]
    fn connection_parses_edges_shape() {
        let page = Page::from_connection(&json!({
            "pageInfo": { "endCursor": null, "hasNextPage": false },
            "edges": [{ "node": { "name": "one" } }, { "node": null }]
        }))
        .unwrap();

        assert_eq!(page.nodes.len(), 1);
        assert!(page.end_cursor.is_none());
        assert!(!page.has_next_page);
    }

    #[test]
    fn connection_without_page_info_is_rejected() {
        assert!(Page::from_connection(&json!({ "nodes": [] })).is_none());
        assert!(Page::from_connection(&json!({
            "pageInfo": { "endCursor": null },
            "nodes": []
        }))
        .is_none());
        assert!(Page::from_connection(&serde_json::Value::Null).is_none());
    }
}
