//! Full traversal of the paginated versions listing.

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use mastertable_shared::{MasterTableError, MemberRecord, ParentId, Result};

use crate::client::{CatalogClient, VersionsPage};

/// Walks `GET /masters/{id}/versions` page by page until the listing ends.
///
/// Pages are requested strictly in increasing order starting at 1 and
/// concatenated as received. A failing page aborts the traversal: callers
/// never see a truncated member list.
pub struct CollectionPager<'a> {
    client: &'a CatalogClient,
    per_page: u32,
}

impl<'a> CollectionPager<'a> {
    pub fn new(client: &'a CatalogClient, per_page: u32) -> Self {
        Self {
            client,
            per_page: per_page.max(1),
        }
    }

    /// Fetch every member of `parent`, in listing order.
    #[instrument(skip_all, fields(parent = %parent, per_page = self.per_page))]
    pub async fn fetch_all(
        &self,
        parent: ParentId,
        cancel: &CancellationToken,
    ) -> Result<Vec<MemberRecord>> {
        let mut records = Vec::new();
        let mut page = 1u32;

        loop {
            if cancel.is_cancelled() {
                debug!(page, "traversal cancelled");
                return Err(MasterTableError::Cancelled);
            }

            let listing = self
                .client
                .fetch_versions_page(parent, page, self.per_page)
                .await
                .map_err(|e| MasterTableError::pagination(page, e))?;

            let last = is_last_page(&listing, page, self.per_page);
            let count = listing.versions.len();
            records.extend(listing.versions.into_iter().map(|v| v.into_record()));
            debug!(page, count, total = records.len(), "versions page received");

            if last {
                break;
            }
            page += 1;
        }

        info!(pages = page, members = records.len(), "listing complete");
        Ok(records)
    }
}

/// A page ends the traversal when it is short or empty, or when the server
/// says it was the final page.
fn is_last_page(listing: &VersionsPage, page: u32, per_page: u32) -> bool {
    let short = listing.versions.len() < per_page as usize;
    let reported_last = listing
        .pagination
        .as_ref()
        .is_some_and(|p| p.pages > 0 && page >= p.pages);
    short || reported_last
}

#[cfg(test)]
mod tests {
    use super::*;
    use mastertable_shared::{ApiConfig, MemberId};
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn versions(start: u64, count: u64) -> Vec<serde_json::Value> {
        (start..start + count)
            .map(|id| json!({"id": id, "title": format!("Release {id}"), "country": "UK"}))
            .collect()
    }

    async fn mount_page(
        server: &MockServer,
        page: u32,
        body: serde_json::Value,
        expected_calls: u64,
    ) {
        Mock::given(method("GET"))
            .and(path("/masters/1/versions"))
            .and(query_param("page", page.to_string()))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .expect(expected_calls)
            .mount(server)
            .await;
    }

    fn client_for(server: &MockServer) -> CatalogClient {
        CatalogClient::new(&ApiConfig::with_base_url(server.uri())).unwrap()
    }

    #[test]
    fn test_is_last_page_rules() {
        let full = VersionsPage {
            versions: serde_json::from_value(json!(versions(1, 3))).unwrap(),
            pagination: None,
        };
        assert!(!is_last_page(&full, 1, 3));
        assert!(is_last_page(&full, 1, 4));
        assert!(is_last_page(&VersionsPage::default(), 1, 3));

        let reported = VersionsPage {
            pagination: Some(crate::client::Pagination {
                page: 2,
                pages: 2,
                items: 6,
            }),
            ..full
        };
        assert!(is_last_page(&reported, 2, 3));
    }

    #[tokio::test]
    async fn test_fetch_all_short_last_page() {
        let server = MockServer::start().await;
        mount_page(&server, 1, json!({"versions": versions(1, 100)}), 1).await;
        mount_page(&server, 2, json!({"versions": versions(101, 100)}), 1).await;
        mount_page(&server, 3, json!({"versions": versions(201, 37)}), 1).await;
        mount_page(&server, 4, json!({"versions": []}), 0).await;

        let client = client_for(&server);
        let records = CollectionPager::new(&client, 100)
            .fetch_all(ParentId(1), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(records.len(), 237);
        let ids: Vec<u64> = records.iter().map(|r| r.id.0).collect();
        assert_eq!(ids, (1..=237).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_fetch_all_exact_multiple_uses_reported_pages() {
        let server = MockServer::start().await;
        let pagination = json!({"page": 1, "pages": 2, "items": 4});
        mount_page(
            &server,
            1,
            json!({"pagination": pagination, "versions": versions(1, 2)}),
            1,
        )
        .await;
        mount_page(
            &server,
            2,
            json!({"pagination": {"page": 2, "pages": 2, "items": 4}, "versions": versions(3, 2)}),
            1,
        )
        .await;
        mount_page(&server, 3, json!({"versions": []}), 0).await;

        let client = client_for(&server);
        let records = CollectionPager::new(&client, 2)
            .fetch_all(ParentId(1), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(records.len(), 4);
    }

    #[tokio::test]
    async fn test_fetch_all_empty_listing() {
        let server = MockServer::start().await;
        mount_page(&server, 1, json!({"versions": []}), 1).await;

        let client = client_for(&server);
        let records = CollectionPager::new(&client, 100)
            .fetch_all(ParentId(1), &CancellationToken::new())
            .await
            .unwrap();

        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_all_aborts_on_failed_page() {
        let server = MockServer::start().await;
        mount_page(&server, 1, json!({"versions": versions(1, 2)}), 1).await;
        Mock::given(method("GET"))
            .and(path("/masters/1/versions"))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(502))
            .expect(1)
            .mount(&server)
            .await;
        mount_page(&server, 3, json!({"versions": versions(5, 1)}), 0).await;

        let client = client_for(&server);
        let err = CollectionPager::new(&client, 2)
            .fetch_all(ParentId(1), &CancellationToken::new())
            .await
            .unwrap_err();

        match err {
            MasterTableError::Pagination { page, message } => {
                assert_eq!(page, 2);
                assert!(message.contains("502"));
            }
            other => panic!("expected Pagination, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_fetch_all_cancelled_before_first_page() {
        let server = MockServer::start().await;
        mount_page(&server, 1, json!({"versions": versions(1, 1)}), 0).await;

        let cancel = CancellationToken::new();
        cancel.cancel();

        let client = client_for(&server);
        let result = CollectionPager::new(&client, 100)
            .fetch_all(ParentId(1), &cancel)
            .await;

        assert!(matches!(result, Err(MasterTableError::Cancelled)));
    }

    #[tokio::test]
    async fn test_fetch_all_keeps_listing_fields() {
        let server = MockServer::start().await;
        mount_page(
            &server,
            1,
            json!({"versions": [{"id": 77, "title": "Live", "country": null}]}),
            1,
        )
        .await;

        let client = client_for(&server);
        let records = CollectionPager::new(&client, 100)
            .fetch_all(ParentId(1), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(records[0].id, MemberId(77));
        assert_eq!(records[0].title, "Live");
        assert_eq!(records[0].subregion, "");
        assert_eq!(records[0].year, None);
    }
}
