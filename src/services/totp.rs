use aes_gcm::{
    Aes256Gcm, KeyInit, Nonce,
    aead::{Aead, OsRng},
};
use data_encoding::BASE32;
use rand::RngCore;
use totp_rs::{Algorithm, TOTP};

use crate::error::AppError;

/// シークレット長（バイト）。160ビット
const SECRET_LEN: usize = 20;
/// コード桁数
const DIGITS: usize = 6;
/// タイムステップ（秒）
const STEP_SECS: u64 = 30;
/// 許容する時刻ずれ（ステップ数）。ここが唯一のウィンドウ幅の決定箇所
const SKEW_STEPS: u8 = 1;

/// TOTP (Time-based One-Time Password) サービス
///
/// # Security
/// - シークレットはAES-256-GCMで暗号化してDB保存
/// - シークレット平文・コードはログに出力しない
#[derive(Clone)]
pub struct TotpService {
    issuer: String,
    encryption_key: [u8; 32],
}

impl TotpService {
    /// 新しい TotpService を作成
    ///
    /// # Arguments
    /// * `issuer` - TOTP発行者名（アプリ名）
    /// * `encryption_key_base64` - Base64エンコードされた32バイトの暗号化キー
    pub fn new(issuer: String, encryption_key_base64: &str) -> Result<Self, AppError> {
        use base64::{Engine as _, engine::general_purpose::STANDARD};

        let key_bytes = STANDARD.decode(encryption_key_base64).map_err(|e| {
            tracing::error!(error = ?e, "TOTP暗号化キーのBase64デコードエラー");
            AppError::Internal(anyhow::anyhow!("invalid encryption key format"))
        })?;

        if key_bytes.len() != 32 {
            tracing::error!(
                expected = 32,
                actual = key_bytes.len(),
                "TOTP暗号化キーの長さが不正"
            );
            return Err(AppError::Internal(anyhow::anyhow!(
                "encryption key must be 32 bytes"
            )));
        }

        let mut encryption_key = [0u8; 32];
        encryption_key.copy_from_slice(&key_bytes);

        Ok(Self {
            issuer,
            encryption_key,
        })
    }

    /// 160ビットのランダムシークレットを生成し、Base32でエンコード
    ///
    /// OSの乱数源から直接読み取る。読み取れない場合はエラー
    pub fn generate_secret() -> Result<String, AppError> {
        let mut bytes = [0u8; SECRET_LEN];
        rand::rngs::OsRng.try_fill_bytes(&mut bytes).map_err(|e| {
            tracing::error!(error = ?e, "乱数源の読み取りに失敗");
            AppError::EntropyUnavailable
        })?;
        Ok(BASE32.encode(&bytes))
    }

    /// 指定時刻のTOTPコードを計算
    ///
    /// `floor(timestamp / 30)` をカウンタとした HMAC-SHA1 を
    /// 動的トランケーションで6桁に落とす（先頭ゼロ保持）
    pub fn compute_code(&self, secret: &str, timestamp: u64) -> Result<String, AppError> {
        Ok(self.build_totp(None, secret)?.generate(timestamp))
    }

    /// TOTPコードを検証
    ///
    /// 現在ステップと前後1ステップ（±30秒）のコードと照合する。
    /// どのステップで一致したかが応答時間から漏れないよう、
    /// 3候補すべてを比較してから結果を返す
    ///
    /// # Note
    /// 6桁の数字以外はエラーにせず不一致として扱う
    pub fn verify_code(&self, secret: &str, code: &str, now: u64) -> Result<bool, AppError> {
        if code.len() != DIGITS || !code.chars().all(|c| c.is_ascii_digit()) {
            return Ok(false);
        }

        let totp = self.build_totp(None, secret)?;

        let mut matched = false;
        for t in [now.saturating_sub(STEP_SECS), now, now + STEP_SECS] {
            if totp.generate(t) == code {
                matched = true;
            }
        }

        Ok(matched)
    }

    /// otpauth:// 形式のプロビジョニングURIを生成
    ///
    /// 発行者・アカウントラベル・シークレットに加えて
    /// アルゴリズム/桁数/周期の宣言を含む正規形。認証アプリ登録用
    pub fn provisioning_uri(&self, account_label: &str, secret: &str) -> Result<String, AppError> {
        // シークレットの妥当性をここで検証しておく
        self.build_totp(Some(account_label), secret)?;

        Ok(format!(
            "otpauth://totp/{issuer}:{label}?secret={secret}&issuer={issuer}&algorithm=SHA1&digits={DIGITS}&period={STEP_SECS}",
            issuer = urlencoding::encode(&self.issuer),
            label = urlencoding::encode(account_label),
        ))
    }

    /// QRコードを生成（PNG形式、Base64エンコード）
    ///
    /// # Arguments
    /// * `account_label` - アカウント識別子（ユーザーID）
    /// * `secret` - Base32エンコードされたシークレット
    pub fn generate_qr_code(&self, account_label: &str, secret: &str) -> Result<String, AppError> {
        let totp = self.build_totp(Some(account_label), secret)?;

        let qr_code = totp.get_qr_base64().map_err(|e| {
            tracing::error!(error = %e, "QRコード生成エラー");
            AppError::Internal(anyhow::anyhow!("qr code generation error"))
        })?;

        Ok(qr_code)
    }

    /// シークレットをAES-256-GCMで暗号化
    ///
    /// # Returns
    /// 96ビットnonce (12バイト) + 暗号文
    pub fn encrypt_secret(&self, secret: &str) -> Result<Vec<u8>, AppError> {
        let cipher = Aes256Gcm::new_from_slice(&self.encryption_key).map_err(|e| {
            tracing::error!(error = ?e, "AES-GCM暗号化器の初期化エラー");
            AppError::Internal(anyhow::anyhow!("cipher initialization error"))
        })?;

        let mut nonce_bytes = [0u8; 12];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher.encrypt(nonce, secret.as_bytes()).map_err(|e| {
            tracing::error!(error = ?e, "シークレット暗号化エラー");
            AppError::Internal(anyhow::anyhow!("encryption error"))
        })?;

        let mut result = Vec::with_capacity(12 + ciphertext.len());
        result.extend_from_slice(&nonce_bytes);
        result.extend_from_slice(&ciphertext);

        Ok(result)
    }

    /// 暗号化されたシークレットを復号
    pub fn decrypt_secret(&self, encrypted: &[u8]) -> Result<String, AppError> {
        if encrypted.len() < 12 {
            tracing::error!(len = encrypted.len(), "暗号化データが短すぎる");
            return Err(AppError::TotpSecretInvalid);
        }

        let cipher = Aes256Gcm::new_from_slice(&self.encryption_key).map_err(|e| {
            tracing::error!(error = ?e, "AES-GCM暗号化器の初期化エラー");
            AppError::Internal(anyhow::anyhow!("cipher initialization error"))
        })?;

        let (nonce_bytes, ciphertext) = encrypted.split_at(12);
        let nonce = Nonce::from_slice(nonce_bytes);

        let plaintext = cipher.decrypt(nonce, ciphertext).map_err(|e| {
            tracing::error!(error = ?e, "シークレット復号エラー");
            AppError::TotpSecretInvalid
        })?;

        String::from_utf8(plaintext).map_err(|e| {
            tracing::error!(error = ?e, "復号データのUTF-8変換エラー");
            AppError::TotpSecretInvalid
        })
    }

    /// TOTP オブジェクトを作成
    ///
    /// `account_label` が指定された場合は発行者付き（URI/QR生成用）、
    /// 指定されない場合は検証用
    fn build_totp(&self, account_label: Option<&str>, secret: &str) -> Result<TOTP, AppError> {
        let secret_bytes = BASE32.decode(secret.as_bytes()).map_err(|e| {
            tracing::error!(error = ?e, "シークレットのBase32デコードエラー");
            AppError::TotpSecretInvalid
        })?;

        let (issuer, label) = match account_label {
            Some(label) => (Some(self.issuer.clone()), label.to_string()),
            None => (None, String::new()),
        };

        TOTP::new(
            Algorithm::SHA1,
            DIGITS,
            SKEW_STEPS,
            STEP_SECS,
            secret_bytes,
            issuer,
            label,
        )
        .map_err(|e| {
            tracing::error!(error = %e, "TOTP作成エラー");
            AppError::TotpSecretInvalid
        })
    }
}

/// 現在のUNIX時刻（秒）
pub fn unix_now() -> Result<u64, AppError> {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .map_err(|e| {
            tracing::error!(error = ?e, "システム時刻取得エラー");
            AppError::Internal(anyhow::anyhow!("system time error"))
        })
}
