use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// ユーザーの二要素認証（TOTP）シークレット
///
/// シークレットは AES-256-GCM で暗号化されて保存される。
/// 平文シークレットはログ・レスポンスに出力禁止（登録時の返却を除く）
///
/// 登録状態は行の有無と confirmed で表現する:
/// - 行なし: 未登録
/// - `confirmed = false`: シークレット発行済み・確認待ち
/// - `confirmed = true`: 初回コード検証済み・有効
#[derive(Debug, FromRow, Serialize)]
pub struct UserTotpSecret {
    pub user_id: Uuid,
    #[serde(skip)]
    pub secret_encrypted: Vec<u8>,
    pub confirmed: bool,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}
