use sqlx::PgPool;
use uuid::Uuid;

use crate::models::UserTotpSecret;

#[derive(Clone)]
pub struct TotpSecretRepository {
    pool: PgPool,
}

impl TotpSecretRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// ユーザーIDでTOTPシークレットを検索
    pub async fn find_by_user_id(
        &self,
        user_id: Uuid,
    ) -> Result<Option<UserTotpSecret>, sqlx::Error> {
        sqlx::query_as::<_, UserTotpSecret>(
            r#"
            SELECT user_id, secret_encrypted, confirmed, created_at, updated_at
            FROM user_totp_secrets
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
    }

    /// TOTPシークレットを保存（既存があれば上書き）
    ///
    /// # Note
    /// 再登録は常に last-write-wins。旧シークレットは即時無効になり、
    /// confirmed は false に戻る（再確認が必要）
    pub async fn upsert(
        &self,
        user_id: Uuid,
        secret_encrypted: &[u8],
    ) -> Result<UserTotpSecret, sqlx::Error> {
        sqlx::query_as::<_, UserTotpSecret>(
            r#"
            INSERT INTO user_totp_secrets (user_id, secret_encrypted)
            VALUES ($1, $2)
            ON CONFLICT (user_id) DO UPDATE
            SET secret_encrypted = EXCLUDED.secret_encrypted,
                confirmed = false,
                updated_at = NOW()
            RETURNING user_id, secret_encrypted, confirmed, created_at, updated_at
            "#,
        )
        .bind(user_id)
        .bind(secret_encrypted)
        .fetch_one(&self.pool)
        .await
    }

    /// 初回コード検証の成功を記録し、登録を有効化
    pub async fn confirm(&self, user_id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE user_totp_secrets
            SET confirmed = true, updated_at = NOW()
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// TOTPシークレットを削除
    ///
    /// アカウント削除時に明示的に呼び出す（自動では消えない）
    pub async fn delete(&self, user_id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            DELETE FROM user_totp_secrets
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
