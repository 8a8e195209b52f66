//! # Identity Module
//!
//! Where signer public keys come from. Two sources exist and a deployment
//! uses exactly one of them:
//!
//! 1. **Directory** — the request names an identity (`zenflows-id`) and
//!    the key is fetched from the identity directory.
//! 2. **DID** — the request carries the key itself (`did-pk`) and a DID
//!    resolver must recognise it.
//!
//! Both are modelled as async traits so the authenticator can be driven by
//! in-process fakes in tests.

pub mod did;
pub mod directory;

pub use did::{DidResolver, HttpDidResolver};
pub use directory::{KeyDirectory, ZenflowsDirectory};

use thiserror::Error;

/// Errors that can occur while resolving or checking a signer identity.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdentityError {
    #[error("identity service unreachable: {0}")]
    Transport(String),

    #[error("identity service answered with status {0}")]
    Status(u16),

    #[error("malformed identity service response: {0}")]
    Malformed(String),

    #[error("no public key for identity: {0}")]
    UnknownIdentity(String),

    #[error("request carries no {0}")]
    MissingReference(&'static str),
}

#[cfg(test)]
pub(crate) mod test_support {
    use axum::Router;

    /// Serve `router` on an ephemeral localhost port and return its base URL.
    pub async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind ephemeral port");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            axum::serve(listener, router).await.expect("test server");
        });
        format!("http://{addr}")
    }
}
