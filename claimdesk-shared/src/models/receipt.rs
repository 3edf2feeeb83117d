/// Receipt metadata
///
/// The file itself lives in the API's upload directory; this row records
/// where it is served from. A claim keeps at most one receipt, and every row
/// owns its own file.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Receipt {
    pub id: Uuid,
    pub claim_id: Uuid,

    /// Name of the file as uploaded by the user
    pub filename: String,

    /// Public URL under `/uploads/receipts/`
    pub file_url: String,

    pub file_size: i64,
    pub mime_type: String,
    pub created_at: DateTime<Utc>,
}

/// Input for recording an uploaded receipt
#[derive(Debug, Clone)]
pub struct NewReceipt {
    pub filename: String,
    pub file_url: String,
    pub file_size: i64,
    pub mime_type: String,
}

impl Receipt {
    /// Deletes the receipts of a claim, returning their file URLs
    pub async fn delete_for_claim(
        conn: &mut PgConnection,
        claim_id: Uuid,
    ) -> Result<Vec<String>, sqlx::Error> {
        let rows: Vec<(String,)> =
            sqlx::query_as("DELETE FROM receipts WHERE claim_id = $1 RETURNING file_url")
                .bind(claim_id)
                .fetch_all(conn)
                .await?;

        Ok(rows.into_iter().map(|(url,)| url).collect())
    }

    /// Replaces any existing receipt of the claim with `data`
    ///
    /// Returns the new row and the URLs of the rows it replaced so the caller
    /// can delete their files.
    pub async fn replace_for_claim(
        conn: &mut PgConnection,
        claim_id: Uuid,
        data: NewReceipt,
    ) -> Result<(Self, Vec<String>), sqlx::Error> {
        let replaced = Self::delete_for_claim(&mut *conn, claim_id).await?;

        let receipt = sqlx::query_as::<_, Receipt>(
            r#"
            INSERT INTO receipts (claim_id, filename, file_url, file_size, mime_type)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, claim_id, filename, file_url, file_size, mime_type, created_at
            "#,
        )
        .bind(claim_id)
        .bind(data.filename)
        .bind(data.file_url)
        .bind(data.file_size)
        .bind(data.mime_type)
        .fetch_one(&mut *conn)
        .await?;

        Ok((receipt, replaced))
    }

    pub async fn list_for_claim(pool: &PgPool, claim_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Receipt>(
            r#"
            SELECT id, claim_id, filename, file_url, file_size, mime_type, created_at
            FROM receipts
            WHERE claim_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(claim_id)
        .fetch_all(pool)
        .await
    }
}
