use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppError;

/// IDプロバイダーが解決したユーザー情報
#[derive(Debug, Clone, Deserialize)]
pub struct IdentityUser {
    pub id: Uuid,
    pub email: Option<String>,
}

/// IDプロバイダー (GoTrue互換 Auth API) クライアント
///
/// セッション発行・パスワード認証はプロバイダー側の責務。
/// このクライアントはトークンからのユーザー解決と
/// 管理APIによるアカウント削除のみを扱う
#[derive(Clone)]
pub struct IdentityClient {
    client: reqwest::Client,
    base_url: String,
    service_role_key: String,
}

impl IdentityClient {
    /// 新しい IdentityClient を作成
    pub fn new(base_url: String, service_role_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
            service_role_key,
        }
    }

    /// アクセストークンからユーザーを解決
    ///
    /// 解決できない場合（プロバイダーのエラー・タイムアウト含む）は
    /// すべて無効トークンとして扱う
    pub async fn resolve_user(&self, access_token: &str) -> Result<IdentityUser, AppError> {
        let url = format!("{}/auth/v1/user", self.base_url);

        let response = self
            .client
            .get(&url)
            .header("apikey", &self.service_role_key)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(error = ?e, "IDプロバイダーへの問い合わせに失敗");
                AppError::TokenInvalid
            })?;

        if !response.status().is_success() {
            tracing::warn!(status = %response.status(), "トークン解決が拒否された");
            return Err(AppError::TokenInvalid);
        }

        let user: IdentityUser = response.json().await.map_err(|e| {
            tracing::warn!(error = ?e, "IDプロバイダーレスポンスのパースエラー");
            AppError::TokenInvalid
        })?;

        tracing::debug!(user_id = %user.id, "トークン解決成功");
        Ok(user)
    }

    /// ユーザーを完全に削除（取り消し不可）
    ///
    /// 管理APIに委譲する。失敗しても自動リトライはしない
    /// （プロバイダー側の冪等性保証がないため）
    pub async fn delete_user(&self, user_id: Uuid) -> Result<(), AppError> {
        let url = format!("{}/auth/v1/admin/users/{}", self.base_url, user_id);

        let response = self
            .client
            .delete(&url)
            .header("apikey", &self.service_role_key)
            .bearer_auth(&self.service_role_key)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = ?e, "IDプロバイダーへの接続に失敗");
                AppError::DeletionFailed("IDプロバイダーへの接続に失敗しました".to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "アカウント削除API呼び出し失敗");
            return Err(AppError::DeletionFailed(format!(
                "IDプロバイダーがステータス {} を返却しました",
                status
            )));
        }

        tracing::info!(user_id = %user_id, "IDプロバイダー側のアカウント削除完了");
        Ok(())
    }
}
