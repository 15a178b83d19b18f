use crate::error::AppError;
use crate::services::identity::{IdentityClient, IdentityUser};

/// Bearer トークン認可ゲート
///
/// Authorization ヘッダーからトークンを取り出し、
/// IDプロバイダーで呼び出し元ユーザーを解決する。
/// 状態を一切変更しない純粋なゲートで、特権操作は必ずここを通る
#[derive(Clone)]
pub struct BearerAuthorizer {
    identity: IdentityClient,
}

impl BearerAuthorizer {
    pub fn new(identity: IdentityClient) -> Self {
        Self { identity }
    }

    /// Authorization ヘッダーから呼び出し元ユーザーを解決
    pub async fn authorize(&self, authorization: Option<&str>) -> Result<IdentityUser, AppError> {
        let token = extract_bearer_token(authorization)?;
        self.identity.resolve_user(token).await
    }
}

/// `Bearer <token>` 形式のヘッダーからトークン部分を取り出す
///
/// ヘッダーなし・スキーム不一致・トークン空をそれぞれ区別してエラーにする
pub fn extract_bearer_token(authorization: Option<&str>) -> Result<&str, AppError> {
    let value = authorization.ok_or(AppError::AuthHeaderMissing)?;

    let (scheme, token) = value
        .split_once(' ')
        .ok_or(AppError::AuthHeaderMalformed)?;

    if scheme != "Bearer" {
        return Err(AppError::AuthHeaderMalformed);
    }

    let token = token.trim();
    if token.is_empty() {
        return Err(AppError::TokenMissing);
    }

    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_header() {
        let result = extract_bearer_token(None);
        assert!(matches!(result, Err(AppError::AuthHeaderMissing)));
    }

    #[test]
    fn test_header_without_space() {
        let result = extract_bearer_token(Some("Bearer"));
        assert!(matches!(result, Err(AppError::AuthHeaderMalformed)));
    }

    #[test]
    fn test_wrong_scheme() {
        let result = extract_bearer_token(Some("Basic dXNlcjpwYXNz"));
        assert!(matches!(result, Err(AppError::AuthHeaderMalformed)));

        // スキームは大文字小文字を区別する
        let result = extract_bearer_token(Some("bearer abc"));
        assert!(matches!(result, Err(AppError::AuthHeaderMalformed)));
    }

    #[test]
    fn test_empty_token() {
        let result = extract_bearer_token(Some("Bearer "));
        assert!(matches!(result, Err(AppError::TokenMissing)));

        let result = extract_bearer_token(Some("Bearer   "));
        assert!(matches!(result, Err(AppError::TokenMissing)));
    }

    #[test]
    fn test_valid_header() {
        let token = extract_bearer_token(Some("Bearer abc.def.ghi")).unwrap();
        assert_eq!(token, "abc.def.ghi");
    }
}
