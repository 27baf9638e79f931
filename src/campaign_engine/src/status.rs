//! Derived campaign status.
//!
//! A campaign-level status is not stored anywhere: pausing, retries, and
//! partial failures interact, so it is computed on demand from the paused
//! flag plus one aggregate query over task rows. Note the fail-visible
//! policy: a single failed task marks the whole campaign `failed` even while
//! other tasks are still in flight.

use anyhow::Context;
use diesel::SqliteConnection;

use crate::gateway::repo::SqliteGateway;
use crate::gateway::{StatusCounts, StoreGateway};
use crate::models::status::CampaignStatus;

/// Derivation over already-fetched inputs; pure and unit-testable.
pub fn derive(is_paused: bool, counts: &StatusCounts) -> CampaignStatus {
    if is_paused {
        return CampaignStatus::Paused;
    }
    if counts.total() == 0 {
        return CampaignStatus::Paused;
    }
    if counts.failed > 0 {
        return CampaignStatus::Failed;
    }
    if counts.pending > 0 || counts.in_progress > 0 {
        return CampaignStatus::InProgress;
    }
    if counts.completed == counts.total() {
        return CampaignStatus::Completed;
    }
    CampaignStatus::Paused
}

/// Compute the derived status for one campaign.
pub fn campaign_status(
    conn: &mut SqliteConnection,
    campaign_id: &str,
) -> anyhow::Result<CampaignStatus> {
    let gateway = SqliteGateway::new();
    let campaign = gateway
        .load_campaign(conn, campaign_id)?
        .with_context(|| format!("campaign not found: {campaign_id}"))?;

    if campaign.is_paused {
        return Ok(CampaignStatus::Paused);
    }

    let counts = gateway.aggregate_status(conn, campaign_id)?;
    Ok(derive(false, &counts))
}
