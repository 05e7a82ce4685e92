//! Outbound-request guarding and credential protection.

mod url_guard;
mod vault;

pub use url_guard::{GuardPolicy, UrlGuard};
pub use vault::{CredentialVault, VaultError};
