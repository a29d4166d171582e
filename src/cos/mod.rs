//! COS client core
//!
//! Request signing, the attempt loop, the HTTP executor and the object
//! operations of a [`Bucket`]. Write operations live in [`crate::upload`].

pub mod attempt;
pub mod client;
pub mod credentials;
pub mod error;
pub mod executor;
pub mod objects;
pub mod region;
pub mod request;
pub mod signer;
pub mod types;

pub use attempt::{Attempt, AttemptStrategy};
pub use client::{derive_endpoint, derive_host, Bucket, Client};
pub use credentials::{Credentials, CredentialsError};
pub use error::{CosError, ServiceError};
pub use executor::CosResponse;
pub use objects::{ObjectReader, MAX_DELETE_OBJECTS};
pub use region::Region;
pub use request::{Headers, Params, PendingRequest, SignMode, SignedRequest};
pub use signer::{SignTime, SignatureParts};
pub use types::{CommonPrefix, CopyObjectResult, Delete, Key, ListResp, Object, Owner, Part};
