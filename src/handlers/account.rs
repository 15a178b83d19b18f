use axum::{
    Json,
    extract::State,
    http::{HeaderMap, header},
};
use serde::Serialize;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct DeleteAccountResponse {
    pub message: String,
}

/// POST /api/account/delete
///
/// 自分自身のアカウントを完全に削除する（取り消し不可）
///
/// # Security
/// - Bearer トークンで認可された本人のみ
/// - 削除対象は必ずトークンから解決したユーザー。
///   リクエストボディ・パラメータから対象IDは一切受け取らない
pub async fn delete_account(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<DeleteAccountResponse>, AppError> {
    let authorization = match headers.get(header::AUTHORIZATION) {
        Some(value) => Some(
            value
                .to_str()
                .map_err(|_| AppError::AuthHeaderMalformed)?,
        ),
        None => None,
    };

    let caller = state.authorizer.authorize(authorization).await?;

    // プロバイダーの確認をもって削除確定。自動リトライはしない
    state.identity_client.delete_user(caller.id).await?;

    // 残ったTOTPシークレットを掃除する。
    // 削除自体は既に確定しているため、失敗しても応答は成功のまま
    if let Err(e) = state.totp_secret_repo.delete(caller.id).await {
        tracing::warn!(error = ?e, user_id = %caller.id, "TOTPシークレットの削除に失敗");
    }

    tracing::info!(user_id = %caller.id, "アカウント削除完了");

    Ok(Json(DeleteAccountResponse {
        message: "アカウントを削除しました".to_string(),
    }))
}
