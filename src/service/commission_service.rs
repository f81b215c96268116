// service/commission_service.rs
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::db::commissiondb::{CommissionExt, TierSpec};
use crate::db::db::DBClient;
use crate::dtos::walletdtos::UpdateCommissionTiersDto;
use crate::models::walletmodels::CommissionTier;
use crate::service::error::ServiceError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommissionBreakdown {
    pub gross_amount: i64, // in kobo
    pub commission: i64,
    pub net_amount: i64,
    pub rate_bps: i64,
    pub version: i32,
}

#[derive(Debug, Clone)]
pub struct CommissionService {
    db_client: Arc<DBClient>,
}

impl CommissionService {
    pub fn new(db_client: Arc<DBClient>) -> Self {
        CommissionService { db_client }
    }

    pub async fn get_active_tiers(&self) -> Result<Vec<CommissionTier>, ServiceError> {
        self.db_client.get_active_commission_tiers().await
    }

    pub async fn get_tier_history(&self) -> Result<Vec<CommissionTier>, ServiceError> {
        self.db_client.get_commission_tier_history().await
    }

    /// Splits a gross amount using the active tier schedule.
    pub async fn calculate_for_amount(
        &self,
        gross_amount: i64,
    ) -> Result<CommissionBreakdown, ServiceError> {
        let tiers = self.db_client.get_active_commission_tiers().await?;
        Self::calculate(gross_amount, &tiers)
    }

    /// Bracket lookup: the whole amount is charged at the rate of the single
    /// tier whose range contains it, not blended across tiers.
    pub fn calculate(
        gross_amount: i64,
        tiers: &[CommissionTier],
    ) -> Result<CommissionBreakdown, ServiceError> {
        if gross_amount < 0 {
            return Err(ServiceError::Validation(
                "Gross amount cannot be negative".to_string(),
            ));
        }
        if tiers.is_empty() {
            return Err(ServiceError::Validation(
                "No commission tiers configured".to_string(),
            ));
        }

        let tier = tiers
            .iter()
            .find(|tier| tier.contains(gross_amount))
            .ok_or_else(|| {
                ServiceError::Validation(format!(
                    "No commission tier covers amount {}",
                    gross_amount
                ))
            })?;

        let commission = gross_amount * tier.rate_bps / 10_000;

        Ok(CommissionBreakdown {
            gross_amount,
            commission,
            net_amount: gross_amount - commission,
            rate_bps: tier.rate_bps,
            version: tier.version,
        })
    }

    /// Appends a new tier schedule version after validating full coverage.
    pub async fn update_tiers(
        &self,
        admin_id: Uuid,
        dto: UpdateCommissionTiersDto,
    ) -> Result<Vec<CommissionTier>, ServiceError> {
        dto.validate()?;
        for tier in &dto.tiers {
            tier.validate()?;
        }

        let specs: Vec<TierSpec> = dto
            .tiers
            .iter()
            .map(|tier| TierSpec {
                min_amount: tier.min_amount,
                max_amount: tier.max_amount,
                rate_bps: tier.rate_bps,
            })
            .collect();

        Self::validate_tiers(&specs)?;

        let created = self
            .db_client
            .append_commission_tier_version(admin_id, &specs)
            .await?;

        tracing::info!(
            "Commission schedule updated to version {} ({} tiers) by admin {}",
            created.first().map(|tier| tier.version).unwrap_or(0),
            created.len(),
            admin_id
        );

        Ok(created)
    }

    /// A valid schedule covers every non-negative amount exactly once:
    /// starts at zero, each tier begins where the previous one ended, and
    /// the last tier is unbounded.
    pub fn validate_tiers(tiers: &[TierSpec]) -> Result<(), ServiceError> {
        if tiers.is_empty() {
            return Err(ServiceError::Validation(
                "Tier schedule cannot be empty".to_string(),
            ));
        }

        if tiers[0].min_amount != 0 {
            return Err(ServiceError::Validation(
                "First tier must start at 0".to_string(),
            ));
        }

        for (index, tier) in tiers.iter().enumerate() {
            if tier.rate_bps < 0 || tier.rate_bps > 10_000 {
                return Err(ServiceError::Validation(format!(
                    "Tier {} rate {} is outside 0..=10000 basis points",
                    index, tier.rate_bps
                )));
            }

            match tier.max_amount {
                Some(max) if max <= tier.min_amount => {
                    return Err(ServiceError::Validation(format!(
                        "Tier {} upper bound {} must exceed lower bound {}",
                        index, max, tier.min_amount
                    )));
                }
                Some(max) => {
                    if let Some(next) = tiers.get(index + 1) {
                        if next.min_amount != max {
                            return Err(ServiceError::Validation(format!(
                                "Tier {} ends at {} but tier {} starts at {}",
                                index,
                                max,
                                index + 1,
                                next.min_amount
                            )));
                        }
                    } else {
                        return Err(ServiceError::Validation(
                            "Last tier must be unbounded".to_string(),
                        ));
                    }
                }
                None => {
                    if index != tiers.len() - 1 {
                        return Err(ServiceError::Validation(
                            "Only the last tier may be unbounded".to_string(),
                        ));
                    }
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tier(version: i32, min: i64, max: Option<i64>, rate_bps: i64) -> CommissionTier {
        CommissionTier {
            id: Uuid::new_v4(),
            version,
            min_amount: min,
            max_amount: max,
            rate_bps,
            created_by: None,
            created_at: None,
        }
    }

    fn default_schedule() -> Vec<CommissionTier> {
        vec![
            tier(1, 0, Some(1000), 2000),
            tier(1, 1000, Some(5000), 1500),
            tier(1, 5000, None, 1000),
        ]
    }

    #[test]
    fn test_bracket_lookup_low_tier() {
        let breakdown = CommissionService::calculate(500, &default_schedule()).unwrap();
        assert_eq!(breakdown.commission, 100);
        assert_eq!(breakdown.net_amount, 400);
        assert_eq!(breakdown.rate_bps, 2000);
    }

    #[test]
    fn test_bracket_lookup_middle_tier() {
        let breakdown = CommissionService::calculate(3000, &default_schedule()).unwrap();
        assert_eq!(breakdown.commission, 450);
        assert_eq!(breakdown.net_amount, 2550);
    }

    #[test]
    fn test_bracket_lookup_open_tier() {
        let breakdown = CommissionService::calculate(6000, &default_schedule()).unwrap();
        assert_eq!(breakdown.commission, 600);
        assert_eq!(breakdown.net_amount, 5400);
    }

    #[test]
    fn test_boundary_amount_falls_in_upper_tier() {
        // Upper bounds are exclusive
        let breakdown = CommissionService::calculate(1000, &default_schedule()).unwrap();
        assert_eq!(breakdown.rate_bps, 1500);
        assert_eq!(breakdown.commission, 150);
    }

    #[test]
    fn test_zero_amount_uses_first_tier() {
        let breakdown = CommissionService::calculate(0, &default_schedule()).unwrap();
        assert_eq!(breakdown.commission, 0);
        assert_eq!(breakdown.net_amount, 0);
    }

    #[test]
    fn test_commission_rounds_down() {
        // 333 * 2000 / 10000 = 66.6, truncated
        let breakdown = CommissionService::calculate(333, &default_schedule()).unwrap();
        assert_eq!(breakdown.commission, 66);
        assert_eq!(breakdown.net_amount, 267);
    }

    #[test]
    fn test_empty_schedule_rejected() {
        assert!(CommissionService::calculate(500, &[]).is_err());
    }

    #[test]
    fn test_negative_amount_rejected() {
        assert!(CommissionService::calculate(-1, &default_schedule()).is_err());
    }

    fn spec(min: i64, max: Option<i64>, rate_bps: i64) -> TierSpec {
        TierSpec {
            min_amount: min,
            max_amount: max,
            rate_bps,
        }
    }

    #[test]
    fn test_validate_accepts_contiguous_schedule() {
        let tiers = vec![
            spec(0, Some(100_000), 2000),
            spec(100_000, Some(500_000), 1500),
            spec(500_000, None, 1000),
        ];
        assert!(CommissionService::validate_tiers(&tiers).is_ok());
    }

    #[test]
    fn test_validate_rejects_gap() {
        let tiers = vec![spec(0, Some(1000), 2000), spec(2000, None, 1000)];
        assert!(CommissionService::validate_tiers(&tiers).is_err());
    }

    #[test]
    fn test_validate_rejects_overlap() {
        let tiers = vec![spec(0, Some(1000), 2000), spec(500, None, 1000)];
        assert!(CommissionService::validate_tiers(&tiers).is_err());
    }

    #[test]
    fn test_validate_rejects_nonzero_start() {
        let tiers = vec![spec(100, None, 1000)];
        assert!(CommissionService::validate_tiers(&tiers).is_err());
    }

    #[test]
    fn test_validate_rejects_bounded_last_tier() {
        let tiers = vec![spec(0, Some(1000), 2000)];
        assert!(CommissionService::validate_tiers(&tiers).is_err());
    }

    #[test]
    fn test_validate_rejects_unbounded_middle_tier() {
        let tiers = vec![spec(0, None, 2000), spec(1000, None, 1000)];
        assert!(CommissionService::validate_tiers(&tiers).is_err());
    }

    #[test]
    fn test_validate_rejects_excessive_rate() {
        let tiers = vec![spec(0, None, 10_001)];
        assert!(CommissionService::validate_tiers(&tiers).is_err());
    }

    #[test]
    fn test_validate_rejects_inverted_bounds() {
        let tiers = vec![spec(0, Some(0), 1000), spec(0, None, 1000)];
        assert!(CommissionService::validate_tiers(&tiers).is_err());
    }
}
