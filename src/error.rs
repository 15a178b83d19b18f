use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("ユーザーIDが指定されていません")]
    IdentityMissing,

    #[error("認証コードの形式が不正です")]
    MfaCodeMalformed,

    #[error("二要素認証が登録されていません")]
    MfaNotEnrolled,

    #[error("認証コードが無効です")]
    MfaCodeInvalid,

    #[error("Authorization ヘッダーがありません")]
    AuthHeaderMissing,

    #[error("Authorization ヘッダーの形式が不正です")]
    AuthHeaderMalformed,

    #[error("トークンがありません")]
    TokenMissing,

    #[error("トークンが無効です")]
    TokenInvalid,

    #[error("保存されたシークレットが不正です")]
    TotpSecretInvalid,

    #[error("乱数源が利用できません")]
    EntropyUnavailable,

    #[error("アカウント削除に失敗しました: {0}")]
    DeletionFailed(String),

    #[error("データベースエラー")]
    Database(#[from] sqlx::Error),

    #[error("内部エラー")]
    Internal(#[from] anyhow::Error),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::IdentityMissing => (
                StatusCode::BAD_REQUEST,
                "ユーザーIDが指定されていません".to_string(),
            ),
            Self::MfaCodeMalformed => (
                StatusCode::BAD_REQUEST,
                "認証コードは6桁の数字で入力してください".to_string(),
            ),
            // 登録有無の漏洩防止のためコード不一致と同じメッセージを返す
            Self::MfaNotEnrolled | Self::MfaCodeInvalid => (
                StatusCode::UNAUTHORIZED,
                "認証コードが正しくありません".to_string(),
            ),
            // 認可失敗の内訳は呼び出し元に区別させない
            Self::AuthHeaderMissing
            | Self::AuthHeaderMalformed
            | Self::TokenMissing
            | Self::TokenInvalid => (StatusCode::UNAUTHORIZED, "認証に失敗しました".to_string()),
            Self::TotpSecretInvalid => {
                tracing::error!("保存されたTOTPシークレットの読み取りに失敗");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "内部エラーが発生しました".to_string(),
                )
            }
            Self::EntropyUnavailable => {
                tracing::error!("乱数源が利用できない");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "内部エラーが発生しました".to_string(),
                )
            }
            Self::DeletionFailed(msg) => {
                tracing::error!(reason = %msg, "アカウント削除エラー");
                (StatusCode::INTERNAL_SERVER_ERROR, msg.clone())
            }
            Self::Database(e) => {
                tracing::error!(error = ?e, "データベースエラー");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "内部エラーが発生しました".to_string(),
                )
            }
            Self::Internal(e) => {
                tracing::error!(error = ?e, "内部エラー");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "内部エラーが発生しました".to_string(),
                )
            }
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn test_not_enrolled_and_invalid_code_share_response() {
        // 登録有無が応答から判別できないこと
        let r1 = AppError::MfaNotEnrolled.into_response();
        let r2 = AppError::MfaCodeInvalid.into_response();
        assert_eq!(r1.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(r2.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_authorization_failures_are_unauthorized() {
        for err in [
            AppError::AuthHeaderMissing,
            AppError::AuthHeaderMalformed,
            AppError::TokenMissing,
            AppError::TokenInvalid,
        ] {
            assert_eq!(err.into_response().status(), StatusCode::UNAUTHORIZED);
        }
    }

    #[test]
    fn test_caller_input_errors_are_bad_request() {
        assert_eq!(
            AppError::IdentityMissing.into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::MfaCodeMalformed.into_response().status(),
            StatusCode::BAD_REQUEST
        );
    }
}
