pub mod account;
pub mod health;
pub mod mfa;

pub use account::delete_account;
pub use health::health_check;
pub use mfa::enroll_or_verify;
