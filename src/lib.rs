//! Bearer-token authorization for RADAR-base web services
//!
//! This crate validates JWT bearer tokens against JWKS endpoints or
//! static key material and evaluates declarative permission
//! requirements over the validated claims. A protected operation
//! declares an [`authz::AuthorizationRequirement`]; the framework
//! adapter extracts the request's [`authz::EntityDetails`] from its own
//! routing mechanism; and a [`RequestAuthorizer`] runs the pipeline:
//! extract the bearer token, validate it, evaluate the requirement, and
//! attach the validated [`RadarToken`] to the request on success.
//!
//! ```no_run
//! use radar_auth::{AuthConfig, RequestAuthorizer};
//!
//! # fn main() -> Result<(), radar_auth::error::ConfigurationError> {
//! let config = AuthConfig::builder("https://mp.example.org", "res_MyService")
//!     .issuer("ManagementPortal")
//!     .build()?;
//!
//! let authorizer = RequestAuthorizer::from_config(&config)?;
//! authorizer.validator().registry().spawn_initial_refresh();
//! # Ok(())
//! # }
//! ```
//!
//! # Feature flags
//!
//! When using this crate and the `reqwest` feature to fetch keys from
//! remote JWKS endpoints, this crate does not automatically enable TLS
//! support in `reqwest` itself. If your application already uses
//! `reqwest` with some TLS settings (native/OpenSSL/rustls), then this
//! crate will use those settings automatically. However, if the only
//! reason you are using `reqwest` is transitively through this crate,
//! you may need to enable the `default-tls` or `rustls-tls` feature to
//! enable support for calling out to an HTTPS endpoint.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(
    missing_docs,
    unused_import_braces,
    unused_imports,
    unused_qualifications
)]
#![deny(
    missing_debug_implementations,
    trivial_casts,
    trivial_numeric_casts,
    unsafe_code,
    unused_must_use
)]

mod authorizer;
pub mod authz;
mod config;
pub mod error;
pub mod extract;
mod jwks;
mod registry;
mod source;
mod token;
mod validator;
mod verifier;

pub use authorizer::{token_from_extensions, AuthError, RequestAuthorizer, TOKEN_KEY};
pub use config::{AuthConfig, AuthConfigBuilder};
pub use jwks::KeySetDocument;
pub use registry::VerifierRegistry;
#[cfg(feature = "reqwest")]
#[cfg_attr(docsrs, doc(cfg(feature = "reqwest")))]
pub use source::HttpJwksFetcher;
pub use source::JwksFetcher;
pub use token::{RadarToken, RoleAuthority};
pub use validator::TokenValidator;
pub use verifier::TokenVerifier;
