//! # ibpp-testing
//!
//! Test infrastructure for Firebird/InterBase driver development.
//!
//! This crate provides an in-memory server that implements the driver's
//! `Transport` trait, so client code can be exercised without a Firebird
//! installation or the native client library.
//!
//! ## Features
//!
//! - Mock transport with scripted statements, blobs, arrays and users
//! - Event posting from the test, delivered like server notifications
//! - One-shot failure injection per transport call
//! - Call log and leak counters for teardown checks
//! - Employee database fixture
//!
//! ## Mock Transport Example
//!
//! ```rust,ignore
//! use ibpp_client::Client;
//! use ibpp_testing::fixtures::{self, EmployeeFixture};
//!
//! #[test]
//! fn test_with_mock_transport() {
//!     let (fixture, transport) = EmployeeFixture::build();
//!     let mut client = Client::new(transport);
//!     let db = client.add_database(fixtures::employee_config());
//!     client.database(db).unwrap().connect().unwrap();
//!
//!     fixture.server.post_event("new_order", 1);
//!     assert_eq!(fixture.server.open_counts().attachments, 1);
//! }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod fixtures;
pub mod mock_transport;

pub use fixtures::EmployeeFixture;
pub use mock_transport::{
    codes, Execution, MockCatalogue, MockDatabase, MockHandle, MockStatement, MockTransport,
    OpenCounts, ServiceRequest,
};
