pub mod blob;
pub mod credentials;
pub mod db;

pub use blob::FsBlobStore;
pub use credentials::Argon2Credentials;
pub use db::DbAdapter;
