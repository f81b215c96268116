// db/walletdb.rs
use async_trait::async_trait;
use serde_json::Value as JsonValue;
use sqlx::Row;
use uuid::Uuid;

use super::db::DBClient;
use crate::models::walletmodels::*;
use crate::service::error::ServiceError;

const TRANSACTION_COLUMNS: &str = r#"
    id,
    wallet_id,
    user_id,
    transaction_type,
    amount,
    balance_before,
    balance_after,
    status,
    reference,
    external_reference,
    description,
    metadata,
    booking_id,
    created_at,
    updated_at,
    completed_at
"#;

const WALLET_COLUMNS: &str = r#"
    id,
    user_id,
    balance,
    available_balance,
    currency,
    total_credited,
    total_debited,
    created_at,
    updated_at,
    last_transaction_at
"#;

#[async_trait]
pub trait WalletExt {
    async fn get_or_create_wallet(&self, user_id: Uuid) -> Result<Wallet, ServiceError>;
    async fn get_wallet(&self, user_id: Uuid) -> Result<Option<Wallet>, ServiceError>;

    /// Credit a wallet. transaction_type is Credit or Refund; the wallet is
    /// provisioned on first use. Idempotent on reference.
    async fn credit_wallet(
        &self,
        user_id: Uuid,
        amount: i64,
        transaction_type: TransactionType,
        description: String,
        reference: String,
        external_reference: Option<String>,
        metadata: Option<JsonValue>,
        booking_id: Option<Uuid>,
    ) -> Result<WalletTransaction, ServiceError>;

    /// Debit a wallet. transaction_type is Debit or Withdrawal. Fails with
    /// InsufficientFunds when available_balance < amount. Idempotent on
    /// reference.
    async fn debit_wallet(
        &self,
        user_id: Uuid,
        amount: i64,
        transaction_type: TransactionType,
        description: String,
        reference: String,
        metadata: Option<JsonValue>,
        booking_id: Option<Uuid>,
    ) -> Result<WalletTransaction, ServiceError>;

    /// Earmark funds without changing the displayed balance. The hold entry
    /// stays pending while outstanding.
    async fn hold_funds(
        &self,
        user_id: Uuid,
        amount: i64,
        reference: String,
        description: String,
    ) -> Result<WalletTransaction, ServiceError>;

    /// Cancel an outstanding hold and return its amount to the available
    /// balance. Replaying after release returns the prior release entry.
    async fn release_hold(
        &self,
        user_id: Uuid,
        hold_reference: &str,
    ) -> Result<WalletTransaction, ServiceError>;

    /// Consume an outstanding hold into a completed withdrawal debit. The
    /// available balance was already reduced at hold time, so only the
    /// displayed balance moves here.
    async fn convert_hold(
        &self,
        user_id: Uuid,
        hold_reference: &str,
        withdrawal_reference: String,
        description: String,
        metadata: Option<JsonValue>,
    ) -> Result<WalletTransaction, ServiceError>;

    async fn get_transaction_by_reference(
        &self,
        reference: &str,
    ) -> Result<Option<WalletTransaction>, ServiceError>;

    async fn get_wallet_transactions(
        &self,
        user_id: Uuid,
        transaction_type: Option<TransactionType>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<WalletTransaction>, ServiceError>;

    async fn get_wallet_summary(&self, user_id: Uuid) -> Result<WalletSummary, ServiceError>;
}

#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct WalletSummary {
    pub balance: i64,
    pub available_balance: i64,
    pub total_credited: i64,
    pub total_debited: i64,
    pub pending_transactions: i64,
    pub outstanding_holds: i64,
}

#[async_trait]
impl WalletExt for DBClient {
    async fn get_or_create_wallet(&self, user_id: Uuid) -> Result<Wallet, ServiceError> {
        sqlx::query("INSERT INTO wallets (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        let wallet = sqlx::query_as::<_, Wallet>(&format!(
            "SELECT {} FROM wallets WHERE user_id = $1",
            WALLET_COLUMNS
        ))
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(wallet)
    }

    async fn get_wallet(&self, user_id: Uuid) -> Result<Option<Wallet>, ServiceError> {
        let wallet = sqlx::query_as::<_, Wallet>(&format!(
            "SELECT {} FROM wallets WHERE user_id = $1",
            WALLET_COLUMNS
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(wallet)
    }

    async fn credit_wallet(
        &self,
        user_id: Uuid,
        amount: i64,
        transaction_type: TransactionType,
        description: String,
        reference: String,
        external_reference: Option<String>,
        metadata: Option<JsonValue>,
        booking_id: Option<Uuid>,
    ) -> Result<WalletTransaction, ServiceError> {
        let mut tx = self.pool.begin().await?;

        // Wallets are provisioned lazily on first credit
        sqlx::query("INSERT INTO wallets (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        let wallet = sqlx::query(
            "SELECT id, balance, available_balance FROM wallets WHERE user_id = $1 FOR UPDATE",
        )
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

        // Replay check under the row lock
        if let Some(existing) = fetch_by_reference(&mut tx, &reference).await? {
            return Ok(existing);
        }

        let balance_before = wallet.get::<i64, _>("balance");
        let balance_after = balance_before + amount;
        let available_after = wallet.get::<i64, _>("available_balance") + amount;

        sqlx::query(
            r#"
            UPDATE wallets
            SET balance = $2,
                available_balance = $3,
                total_credited = total_credited + $4,
                updated_at = NOW(),
                last_transaction_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(wallet.get::<Uuid, _>("id"))
        .bind(balance_after)
        .bind(available_after)
        .bind(amount)
        .execute(&mut *tx)
        .await?;

        let transaction = sqlx::query_as::<_, WalletTransaction>(&format!(
            r#"
            INSERT INTO wallet_transactions
            (wallet_id, user_id, transaction_type, amount, balance_before, balance_after,
             reference, external_reference, description, metadata, booking_id, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, 'completed'::transaction_status)
            RETURNING {}
            "#,
            TRANSACTION_COLUMNS
        ))
        .bind(wallet.get::<Uuid, _>("id"))
        .bind(user_id)
        .bind(transaction_type)
        .bind(amount)
        .bind(balance_before)
        .bind(balance_after)
        .bind(reference)
        .bind(external_reference)
        .bind(description)
        .bind(metadata)
        .bind(booking_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(transaction)
    }

    async fn debit_wallet(
        &self,
        user_id: Uuid,
        amount: i64,
        transaction_type: TransactionType,
        description: String,
        reference: String,
        metadata: Option<JsonValue>,
        booking_id: Option<Uuid>,
    ) -> Result<WalletTransaction, ServiceError> {
        let mut tx = self.pool.begin().await?;

        let wallet = sqlx::query(
            "SELECT id, balance, available_balance FROM wallets WHERE user_id = $1 FOR UPDATE",
        )
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(ServiceError::WalletNotFound(user_id))?;

        if let Some(existing) = fetch_by_reference(&mut tx, &reference).await? {
            return Ok(existing);
        }

        let available = wallet.get::<i64, _>("available_balance");
        if available < amount {
            return Err(ServiceError::InsufficientFunds {
                required: amount,
                available,
            });
        }

        let balance_before = wallet.get::<i64, _>("balance");
        let balance_after = balance_before - amount;
        let available_after = available - amount;

        sqlx::query(
            r#"
            UPDATE wallets
            SET balance = $2,
                available_balance = $3,
                total_debited = total_debited + $4,
                updated_at = NOW(),
                last_transaction_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(wallet.get::<Uuid, _>("id"))
        .bind(balance_after)
        .bind(available_after)
        .bind(amount)
        .execute(&mut *tx)
        .await?;

        let transaction = sqlx::query_as::<_, WalletTransaction>(&format!(
            r#"
            INSERT INTO wallet_transactions
            (wallet_id, user_id, transaction_type, amount, balance_before, balance_after,
             reference, description, metadata, booking_id, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, 'completed'::transaction_status)
            RETURNING {}
            "#,
            TRANSACTION_COLUMNS
        ))
        .bind(wallet.get::<Uuid, _>("id"))
        .bind(user_id)
        .bind(transaction_type)
        .bind(amount)
        .bind(balance_before)
        .bind(balance_after)
        .bind(reference)
        .bind(description)
        .bind(metadata)
        .bind(booking_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(transaction)
    }

    async fn hold_funds(
        &self,
        user_id: Uuid,
        amount: i64,
        reference: String,
        description: String,
    ) -> Result<WalletTransaction, ServiceError> {
        let mut tx = self.pool.begin().await?;

        let wallet = sqlx::query(
            "SELECT id, balance, available_balance FROM wallets WHERE user_id = $1 FOR UPDATE",
        )
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(ServiceError::WalletNotFound(user_id))?;

        if let Some(existing) = fetch_by_reference(&mut tx, &reference).await? {
            return Ok(existing);
        }

        let available = wallet.get::<i64, _>("available_balance");
        if available < amount {
            return Err(ServiceError::InsufficientFunds {
                required: amount,
                available,
            });
        }

        // The displayed balance is untouched; only available moves
        sqlx::query(
            "UPDATE wallets SET available_balance = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(wallet.get::<Uuid, _>("id"))
        .bind(available - amount)
        .execute(&mut *tx)
        .await?;

        let balance = wallet.get::<i64, _>("balance");
        let transaction = sqlx::query_as::<_, WalletTransaction>(&format!(
            r#"
            INSERT INTO wallet_transactions
            (wallet_id, user_id, transaction_type, amount, balance_before, balance_after,
             reference, description, status)
            VALUES ($1, $2, 'hold'::transaction_type, $3, $4, $4, $5, $6, 'pending'::transaction_status)
            RETURNING {}
            "#,
            TRANSACTION_COLUMNS
        ))
        .bind(wallet.get::<Uuid, _>("id"))
        .bind(user_id)
        .bind(amount)
        .bind(balance)
        .bind(reference)
        .bind(description)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(transaction)
    }

    async fn release_hold(
        &self,
        user_id: Uuid,
        hold_reference: &str,
    ) -> Result<WalletTransaction, ServiceError> {
        let mut tx = self.pool.begin().await?;

        let wallet = sqlx::query(
            "SELECT id, balance, available_balance FROM wallets WHERE user_id = $1 FOR UPDATE",
        )
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(ServiceError::WalletNotFound(user_id))?;

        let release_reference = format!("rel_{}", hold_reference);
        if let Some(existing) = fetch_by_reference(&mut tx, &release_reference).await? {
            return Ok(existing);
        }

        let hold = fetch_by_reference(&mut tx, hold_reference)
            .await?
            .ok_or_else(|| ServiceError::HoldNotFound(hold_reference.to_string()))?;

        if hold.wallet_id != wallet.get::<Uuid, _>("id")
            || hold.transaction_type != TransactionType::Hold
            || hold.status != TransactionStatus::Pending
        {
            return Err(ServiceError::HoldNotFound(hold_reference.to_string()));
        }

        sqlx::query(
            "UPDATE wallet_transactions SET status = 'cancelled'::transaction_status, updated_at = NOW() WHERE id = $1",
        )
        .bind(hold.id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "UPDATE wallets SET available_balance = available_balance + $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(wallet.get::<Uuid, _>("id"))
        .bind(hold.amount)
        .execute(&mut *tx)
        .await?;

        let balance = wallet.get::<i64, _>("balance");
        let transaction = sqlx::query_as::<_, WalletTransaction>(&format!(
            r#"
            INSERT INTO wallet_transactions
            (wallet_id, user_id, transaction_type, amount, balance_before, balance_after,
             reference, description, status)
            VALUES ($1, $2, 'release'::transaction_type, $3, $4, $4, $5, $6, 'completed'::transaction_status)
            RETURNING {}
            "#,
            TRANSACTION_COLUMNS
        ))
        .bind(wallet.get::<Uuid, _>("id"))
        .bind(user_id)
        .bind(hold.amount)
        .bind(balance)
        .bind(release_reference)
        .bind(format!("Release of hold {}", hold_reference))
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(transaction)
    }

    async fn convert_hold(
        &self,
        user_id: Uuid,
        hold_reference: &str,
        withdrawal_reference: String,
        description: String,
        metadata: Option<JsonValue>,
    ) -> Result<WalletTransaction, ServiceError> {
        let mut tx = self.pool.begin().await?;

        let wallet = sqlx::query(
            "SELECT id, balance, available_balance FROM wallets WHERE user_id = $1 FOR UPDATE",
        )
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(ServiceError::WalletNotFound(user_id))?;

        if let Some(existing) = fetch_by_reference(&mut tx, &withdrawal_reference).await? {
            return Ok(existing);
        }

        let hold = fetch_by_reference(&mut tx, hold_reference)
            .await?
            .ok_or_else(|| ServiceError::HoldNotFound(hold_reference.to_string()))?;

        if hold.wallet_id != wallet.get::<Uuid, _>("id")
            || hold.transaction_type != TransactionType::Hold
            || hold.status != TransactionStatus::Pending
        {
            return Err(ServiceError::HoldNotFound(hold_reference.to_string()));
        }

        // Consumed, not released
        sqlx::query(
            "UPDATE wallet_transactions SET status = 'completed'::transaction_status, completed_at = NOW(), updated_at = NOW() WHERE id = $1",
        )
        .bind(hold.id)
        .execute(&mut *tx)
        .await?;

        let balance_before = wallet.get::<i64, _>("balance");
        let balance_after = balance_before - hold.amount;

        // available_balance was already reduced when the hold was placed
        sqlx::query(
            r#"
            UPDATE wallets
            SET balance = $2,
                total_debited = total_debited + $3,
                updated_at = NOW(),
                last_transaction_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(wallet.get::<Uuid, _>("id"))
        .bind(balance_after)
        .bind(hold.amount)
        .execute(&mut *tx)
        .await?;

        let transaction = sqlx::query_as::<_, WalletTransaction>(&format!(
            r#"
            INSERT INTO wallet_transactions
            (wallet_id, user_id, transaction_type, amount, balance_before, balance_after,
             reference, description, metadata, status, completed_at)
            VALUES ($1, $2, 'withdrawal'::transaction_type, $3, $4, $5, $6, $7, $8, 'completed'::transaction_status, NOW())
            RETURNING {}
            "#,
            TRANSACTION_COLUMNS
        ))
        .bind(wallet.get::<Uuid, _>("id"))
        .bind(user_id)
        .bind(hold.amount)
        .bind(balance_before)
        .bind(balance_after)
        .bind(withdrawal_reference)
        .bind(description)
        .bind(metadata)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(transaction)
    }

    async fn get_transaction_by_reference(
        &self,
        reference: &str,
    ) -> Result<Option<WalletTransaction>, ServiceError> {
        let transaction = sqlx::query_as::<_, WalletTransaction>(&format!(
            "SELECT {} FROM wallet_transactions WHERE reference = $1",
            TRANSACTION_COLUMNS
        ))
        .bind(reference)
        .fetch_optional(&self.pool)
        .await?;

        Ok(transaction)
    }

    async fn get_wallet_transactions(
        &self,
        user_id: Uuid,
        transaction_type: Option<TransactionType>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<WalletTransaction>, ServiceError> {
        let transactions = match transaction_type {
            Some(tx_type) => {
                sqlx::query_as::<_, WalletTransaction>(&format!(
                    r#"
                    SELECT {}
                    FROM wallet_transactions
                    WHERE user_id = $1 AND transaction_type = $2
                    ORDER BY created_at DESC
                    LIMIT $3 OFFSET $4
                    "#,
                    TRANSACTION_COLUMNS
                ))
                .bind(user_id)
                .bind(tx_type)
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, WalletTransaction>(&format!(
                    r#"
                    SELECT {}
                    FROM wallet_transactions
                    WHERE user_id = $1
                    ORDER BY created_at DESC
                    LIMIT $2 OFFSET $3
                    "#,
                    TRANSACTION_COLUMNS
                ))
                .bind(user_id)
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(transactions)
    }

    async fn get_wallet_summary(&self, user_id: Uuid) -> Result<WalletSummary, ServiceError> {
        let wallet = sqlx::query(
            "SELECT balance, available_balance, total_credited, total_debited FROM wallets WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(ServiceError::WalletNotFound(user_id))?;

        let pending_count = sqlx::query(
            "SELECT COUNT(*) as count FROM wallet_transactions WHERE user_id = $1 AND status = 'pending'",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        let outstanding_holds = sqlx::query(
            r#"
            SELECT COALESCE(SUM(amount), 0)::BIGINT as total
            FROM wallet_transactions
            WHERE user_id = $1
            AND transaction_type = 'hold'
            AND status = 'pending'
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(WalletSummary {
            balance: wallet.get::<i64, _>("balance"),
            available_balance: wallet.get::<i64, _>("available_balance"),
            total_credited: wallet.get::<i64, _>("total_credited"),
            total_debited: wallet.get::<i64, _>("total_debited"),
            pending_transactions: pending_count.get::<i64, _>("count"),
            outstanding_holds: outstanding_holds.get::<i64, _>("total"),
        })
    }
}

async fn fetch_by_reference(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    reference: &str,
) -> Result<Option<WalletTransaction>, sqlx::Error> {
    sqlx::query_as::<_, WalletTransaction>(&format!(
        "SELECT {} FROM wallet_transactions WHERE reference = $1",
        TRANSACTION_COLUMNS
    ))
    .bind(reference)
    .fetch_optional(&mut **tx)
    .await
}
