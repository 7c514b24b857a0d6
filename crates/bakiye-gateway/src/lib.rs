//! # bakiye-gateway: Card Payment Gateways
//!
//! Adapters for the two card-payment providers that fund dealer top-ups.
//!
//! ## Module Structure
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         bakiye-gateway                                  │
//! │                                                                         │
//! │  ┌───────────────┐   ┌────────────────────┐   ┌────────────────────┐   │
//! │  │ registry.rs   │──►│ adapter.rs         │◄──│ token_gateway.rs   │   │
//! │  │ provider →    │   │ PaymentGateway-    │   │ provider A         │   │
//! │  │ adapter       │   │ Adapter trait      │   ├────────────────────┤   │
//! │  └───────────────┘   └─────────┬──────────┘◄──│ form_gateway.rs    │   │
//! │                                │              │ provider B         │   │
//! │                      ┌─────────┴──────────┐   └────────────────────┘   │
//! │                      │ signer.rs          │                            │
//! │                      │ keyed hash over    │   config.rs  error.rs      │
//! │                      │ ordered fields     │                            │
//! │                      └────────────────────┘                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Nothing here touches the database. Callers own intent state and decide
//! what an `Unavailable` or `Rejected` answer means for it.

pub mod adapter;
pub mod config;
pub mod error;
pub mod form_gateway;
pub mod registry;
pub mod signer;
pub mod token_gateway;

pub use adapter::{
    BuyerInfo, CreatedPayment, GatewayNotification, NotificationFields, PaymentGatewayAdapter, PaymentRequest,
    PresentationPayload,
};
pub use config::{GatewayConfig, ProviderAConfig, ProviderBConfig};
pub use error::{GatewayError, GatewayResult};
pub use form_gateway::FormGateway;
pub use registry::GatewayRegistry;
pub use signer::{ConcatHmacSha256, JoinedHmacSha512, RequestSigner};
pub use token_gateway::TokenGateway;
