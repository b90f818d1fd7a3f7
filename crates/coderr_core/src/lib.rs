pub mod domain;
pub mod error;
pub mod filters;
pub mod lifecycle;
pub mod memory;
pub mod policy;
pub mod ports;
pub mod service;

pub use domain::{
    Identity, Listing, Offer, OfferDetail, OfferListing, OfferType, Order, OrderStatus, Page,
    PlatformSummary, Profile, ProfileKind, Review,
};
pub use error::{DomainError, DomainResult, ValidationErrors};
pub use policy::{decide, Action, Actor, Decision, Target};
pub use ports::{
    BlobStore, CredentialVerifier, LoginIdentifier, PortError, PortResult, RecordStore,
    SessionStore,
};
pub use service::{Marketplace, MarketplaceSettings};
