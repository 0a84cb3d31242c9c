//! Authentication module
//!
//! Bearer credentials live in a shared `CredentialStore`; the
//! `TokenRefresher` trait is the credential-refresh side effect invoked
//! when the remote answers 401. `OAuth2Refresher` implements the
//! refresh-token grant, `NoRefresh` covers static tokens.

mod credentials;

pub use credentials::{CredentialStore, Credentials, NoRefresh, OAuth2Refresher, TokenRefresher};
