//! schedsync-store: durable object storage for the synced artifact
//!
//! A small `ObjectStore` trait (get / head / put) with an S3 backend for
//! production and a directory backend for tests and local mirrors.

pub mod backend;
pub mod layout;
pub mod local;
pub mod object;
pub mod s3;

pub use backend::{StoreBackend, open_store};
pub use layout::ObjectLayout;
pub use local::LocalStore;
pub use object::{ObjectInfo, ObjectStore, Precondition, PutOptions, StoreError, StoredObject};
pub use s3::{S3Settings, S3Store};
