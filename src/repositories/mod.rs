pub mod totp_secret;

pub use totp_secret::TotpSecretRepository;
