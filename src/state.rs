use std::sync::Arc;

use secrecy::ExposeSecret;
use sqlx::PgPool;

use crate::config::Config;
use crate::error::AppError;
use crate::repositories::TotpSecretRepository;
use crate::services::{BearerAuthorizer, IdentityClient, TotpService};

/// アプリケーション共有状態
///
/// axum の State として全ハンドラーで共有される。
/// Clone は必須（axum が内部で clone するため）。
/// グローバルは持たず、依存はすべてここで明示的に構築して注入する
#[derive(Clone)]
pub struct AppState {
    /// PostgreSQL コネクションプール
    pub db_pool: PgPool,
    /// アプリケーション設定（Arc で共有）
    pub config: Arc<Config>,
    /// TOTPシークレットリポジトリ
    pub totp_secret_repo: TotpSecretRepository,
    /// TOTPサービス
    pub totp_service: TotpService,
    /// IDプロバイダークライアント
    pub identity_client: IdentityClient,
    /// Bearer トークン認可ゲート
    pub authorizer: BearerAuthorizer,
}

impl AppState {
    /// 新しい AppState を作成
    pub fn new(
        db_pool: PgPool,
        identity_client: IdentityClient,
        config: Config,
    ) -> Result<Self, AppError> {
        let config = Arc::new(config);
        let totp_secret_repo = TotpSecretRepository::new(db_pool.clone());
        let totp_service = TotpService::new(
            config.totp_issuer.clone(),
            config.encryption_key.expose_secret(),
        )?;
        let authorizer = BearerAuthorizer::new(identity_client.clone());

        Ok(Self {
            db_pool,
            config,
            totp_secret_repo,
            totp_service,
            identity_client,
            authorizer,
        })
    }
}
