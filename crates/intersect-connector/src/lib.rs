//! # Intersect Connector — the write connector capability interface
//!
//! The pipeline's adapter boundary (`spec.md` §4.G): a capability set
//! every external write target implements, plus in-memory mock
//! connectors for calendar, email, and finance writes used in tests and
//! local development. Real provider connectors are an external
//! collaborator — this crate only defines and exercises the contract.

#![forbid(unsafe_code)]

pub mod connector;
pub mod envelope;
pub mod errors;
pub mod mock;

pub use connector::{validate_envelope, ProviderInfo, WriteConnector, WriteReceipt, WriteRequest};
pub use envelope::ExecutionEnvelope;
pub use errors::{ConnectorError, ConnectorResult};
pub use mock::{MockCalendarConnector, MockEmailConnector, MockFinanceConnector};
