use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::services::TotpService;
use crate::services::totp;
use crate::state::AppState;

/// POST /api/mfa のリクエストボディ
///
/// `code` の有無で登録と検証を切り替える。
/// 未知のフィールドは境界で拒否する
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MfaRequest {
    pub user_id: Option<Uuid>,
    pub code: Option<String>,
}

/// 検証済みの操作。ハンドラー内部はこの型だけを扱う
#[derive(Debug)]
enum MfaOperation {
    Enroll { user_id: Uuid },
    Verify { user_id: Uuid, code: String },
}

impl MfaRequest {
    /// ワイヤ形式を操作に変換（バリデーション込み）
    fn into_operation(self) -> Result<MfaOperation, AppError> {
        let user_id = self.user_id.ok_or(AppError::IdentityMissing)?;

        match self.code {
            None => Ok(MfaOperation::Enroll { user_id }),
            Some(code) => {
                validate_totp_code(&code)?;
                Ok(MfaOperation::Verify { user_id, code })
            }
        }
    }
}

#[derive(Debug, Serialize)]
pub struct EnrollResponse {
    pub secret: String,
    pub otpauth: String,
    pub qr_code: String,
}

#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub success: bool,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum MfaResponse {
    Enrolled(EnrollResponse),
    Verified(VerifyResponse),
}

/// POST /api/mfa
///
/// 二要素認証（TOTP）の登録と検証。
/// `code` なし: シークレットを発行し、プロビジョニングURIとQRコードを返す。
/// `code` あり: 保存済みシークレットと照合する
///
/// # Security
/// - シークレット平文・コードはログ出力禁止
pub async fn enroll_or_verify(
    State(state): State<AppState>,
    Json(request): Json<MfaRequest>,
) -> Result<Json<MfaResponse>, AppError> {
    match request.into_operation()? {
        MfaOperation::Enroll { user_id } => {
            let response = enroll(&state, user_id).await?;
            Ok(Json(MfaResponse::Enrolled(response)))
        }
        MfaOperation::Verify { user_id, code } => {
            let response = verify(&state, user_id, &code).await?;
            Ok(Json(MfaResponse::Verified(response)))
        }
    }
}

/// シークレットを発行して保存し、プロビジョニング情報を返す
async fn enroll(state: &AppState, user_id: Uuid) -> Result<EnrollResponse, AppError> {
    let secret = TotpService::generate_secret()?;

    // 暗号化してDB保存。再登録は常に上書きで、旧シークレットは即時無効
    let encrypted = state.totp_service.encrypt_secret(&secret)?;
    state.totp_secret_repo.upsert(user_id, &encrypted).await?;

    // アカウントラベルはユーザーID
    let label = user_id.to_string();
    let otpauth = state.totp_service.provisioning_uri(&label, &secret)?;
    let qr_code = state.totp_service.generate_qr_code(&label, &secret)?;

    tracing::info!(user_id = %user_id, "TOTP登録開始（シークレット発行）");

    Ok(EnrollResponse {
        secret,
        otpauth,
        qr_code: format!("data:image/png;base64,{}", qr_code),
    })
}

/// 保存済みシークレットに対してコードを検証する
async fn verify(state: &AppState, user_id: Uuid, code: &str) -> Result<VerifyResponse, AppError> {
    let record = state
        .totp_secret_repo
        .find_by_user_id(user_id)
        .await?
        .ok_or(AppError::MfaNotEnrolled)?;

    let secret = state.totp_service.decrypt_secret(&record.secret_encrypted)?;

    let now = totp::unix_now()?;
    if !state.totp_service.verify_code(&secret, code, now)? {
        return Err(AppError::MfaCodeInvalid);
    }

    // 初回の検証成功で登録を有効化する
    if !record.confirmed {
        state.totp_secret_repo.confirm(user_id).await?;
        tracing::info!(user_id = %user_id, "TOTP登録確認完了（有効化）");
    }

    Ok(VerifyResponse { success: true })
}

/// TOTPコードバリデーション
fn validate_totp_code(code: &str) -> Result<(), AppError> {
    if code.len() != 6 || !code.chars().all(|c| c.is_ascii_digit()) {
        return Err(AppError::MfaCodeMalformed);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(value: serde_json::Value) -> Result<MfaRequest, serde_json::Error> {
        serde_json::from_value(value)
    }

    #[test]
    fn test_missing_user_id() {
        let req = request(json!({})).unwrap();
        let result = req.into_operation();
        assert!(matches!(result, Err(AppError::IdentityMissing)));
    }

    #[test]
    fn test_missing_user_id_with_code() {
        let req = request(json!({ "code": "123456" })).unwrap();
        let result = req.into_operation();
        assert!(matches!(result, Err(AppError::IdentityMissing)));
    }

    #[test]
    fn test_enroll_operation() {
        let req = request(json!({ "user_id": Uuid::new_v4() })).unwrap();
        assert!(matches!(
            req.into_operation(),
            Ok(MfaOperation::Enroll { .. })
        ));
    }

    #[test]
    fn test_verify_operation() {
        let req = request(json!({ "user_id": Uuid::new_v4(), "code": "012345" })).unwrap();
        // 先頭ゼロのコードも6桁として受理される
        match req.into_operation() {
            Ok(MfaOperation::Verify { code, .. }) => assert_eq!(code, "012345"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_malformed_code() {
        for code in ["", "12345", "1234567", "12345a"] {
            let req = request(json!({ "user_id": Uuid::new_v4(), "code": code })).unwrap();
            assert!(matches!(
                req.into_operation(),
                Err(AppError::MfaCodeMalformed)
            ));
        }
    }

    #[test]
    fn test_unknown_fields_rejected() {
        // 想定外の形のボディは境界で拒否する
        let result = request(json!({ "user_id": Uuid::new_v4(), "token": "123456" }));
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_valid_code() {
        assert!(validate_totp_code("123456").is_ok());
        assert!(validate_totp_code("000000").is_ok());
    }
}
