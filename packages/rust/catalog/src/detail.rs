//! Best-effort per-member detail lookup.

use std::future::Future;

use tracing::{debug, warn};

use mastertable_shared::{MemberDetail, MemberId};

use crate::client::CatalogClient;

/// Fetches supplementary detail for exactly one member.
///
/// Implementations never fail outward: a transport error, a non-success
/// status, or an unreadable body resolves to [`MemberDetail::default`]
/// (no year, zero tracks) so one bad item cannot abort its batch.
pub trait DetailFetcher: Send + Sync {
    fn fetch_detail(&self, id: MemberId) -> impl Future<Output = MemberDetail> + Send;
}

impl DetailFetcher for CatalogClient {
    async fn fetch_detail(&self, id: MemberId) -> MemberDetail {
        match self.fetch_release(id).await {
            Ok(release) => {
                let detail = MemberDetail {
                    year: release.year(),
                    detail_count: release.track_count(),
                };
                debug!(%id, tracks = detail.detail_count, year = ?detail.year, "detail resolved");
                detail
            }
            Err(e) => {
                warn!(%id, error = %e, "detail fetch failed, using defaults");
                MemberDetail::default()
            }
        }
    }
}
