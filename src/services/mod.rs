pub mod authorizer;
pub mod identity;
pub mod totp;

pub use authorizer::BearerAuthorizer;
pub use identity::IdentityClient;
pub use totp::TotpService;
