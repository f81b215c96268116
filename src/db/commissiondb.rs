// db/commissiondb.rs
use async_trait::async_trait;
use sqlx::Row;
use uuid::Uuid;

use super::db::DBClient;
use crate::models::walletmodels::CommissionTier;
use crate::service::error::ServiceError;

const TIER_COLUMNS: &str = r#"
    id,
    version,
    min_amount,
    max_amount,
    rate_bps,
    created_by,
    created_at
"#;

/// One tier of a schedule being appended, before it gets a version number.
#[derive(Debug, Clone, PartialEq)]
pub struct TierSpec {
    pub min_amount: i64,
    pub max_amount: Option<i64>,
    pub rate_bps: i64,
}

#[async_trait]
pub trait CommissionExt {
    /// The highest version's tiers, ordered by min_amount.
    async fn get_active_commission_tiers(&self) -> Result<Vec<CommissionTier>, ServiceError>;

    async fn get_commission_tiers_by_version(
        &self,
        version: i32,
    ) -> Result<Vec<CommissionTier>, ServiceError>;

    /// Full version history, newest first.
    async fn get_commission_tier_history(&self) -> Result<Vec<CommissionTier>, ServiceError>;

    /// Appends a validated schedule as the next version and returns it.
    /// Prior versions are never mutated.
    async fn append_commission_tier_version(
        &self,
        admin_id: Uuid,
        tiers: &[TierSpec],
    ) -> Result<Vec<CommissionTier>, ServiceError>;
}

#[async_trait]
impl CommissionExt for DBClient {
    async fn get_active_commission_tiers(&self) -> Result<Vec<CommissionTier>, ServiceError> {
        let tiers = sqlx::query_as::<_, CommissionTier>(&format!(
            r#"
            SELECT {}
            FROM commission_tiers
            WHERE version = (SELECT MAX(version) FROM commission_tiers)
            ORDER BY min_amount ASC
            "#,
            TIER_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(tiers)
    }

    async fn get_commission_tiers_by_version(
        &self,
        version: i32,
    ) -> Result<Vec<CommissionTier>, ServiceError> {
        let tiers = sqlx::query_as::<_, CommissionTier>(&format!(
            r#"
            SELECT {}
            FROM commission_tiers
            WHERE version = $1
            ORDER BY min_amount ASC
            "#,
            TIER_COLUMNS
        ))
        .bind(version)
        .fetch_all(&self.pool)
        .await?;

        Ok(tiers)
    }

    async fn get_commission_tier_history(&self) -> Result<Vec<CommissionTier>, ServiceError> {
        let tiers = sqlx::query_as::<_, CommissionTier>(&format!(
            r#"
            SELECT {}
            FROM commission_tiers
            ORDER BY version DESC, min_amount ASC
            "#,
            TIER_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(tiers)
    }

    async fn append_commission_tier_version(
        &self,
        admin_id: Uuid,
        tiers: &[TierSpec],
    ) -> Result<Vec<CommissionTier>, ServiceError> {
        let mut tx = self.pool.begin().await?;

        // Concurrent appends racing to the same number are caught by the
        // (version, min_amount) unique constraint
        let next_version = sqlx::query(
            "SELECT COALESCE(MAX(version), 0) + 1 as next_version FROM commission_tiers",
        )
        .fetch_one(&mut *tx)
        .await?
        .get::<i32, _>("next_version");

        let mut created = Vec::with_capacity(tiers.len());
        for tier in tiers {
            let row = sqlx::query_as::<_, CommissionTier>(&format!(
                r#"
                INSERT INTO commission_tiers (version, min_amount, max_amount, rate_bps, created_by)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING {}
                "#,
                TIER_COLUMNS
            ))
            .bind(next_version)
            .bind(tier.min_amount)
            .bind(tier.max_amount)
            .bind(tier.rate_bps)
            .bind(admin_id)
            .fetch_one(&mut *tx)
            .await?;

            created.push(row);
        }

        tx.commit().await?;
        Ok(created)
    }
}
