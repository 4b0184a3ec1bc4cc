//! # ibpp-protocol
//!
//! Wire-level building blocks for the Firebird/InterBase attachment protocol.
//!
//! The driver never talks to a socket directly. Every call it makes through a
//! transport consumes one of the tag-length-value buffers defined here and
//! hands back a [`StatusVector`], sometimes accompanied by a [`ResultBlock`].
//!
//! ## Contents
//!
//! - [`ParamBlock`]: growable DPB/TPB/SPB builders
//! - [`ResultBlock`]: tag lookup over information responses
//! - [`StatusVector`]: error/warning vector with cached rendering
//! - [`EventBlock`]: event name and counter buffers
//! - [`SqlType`], [`BlrType`]: closed sets of wire data types
//!
//! ## Design Philosophy
//!
//! This crate is IO-agnostic. It contains no transport logic and no resource
//! bookkeeping; higher-level crates build the session graph on top of it.
//!
//! ## Example
//!
//! ```rust
//! use ibpp_protocol::{Dpb, ParamBlock, tags::dpb};
//!
//! let mut block = ParamBlock::<Dpb>::new();
//! block.insert_str(dpb::USER_NAME, "SYSDBA").unwrap();
//! block.insert_str(dpb::PASSWORD, "masterkey").unwrap();
//!
//! assert_eq!(block.as_bytes()[0], dpb::VERSION1);
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod array_desc;
pub mod codec;
pub mod error;
pub mod event_block;
pub mod info;
pub mod param_block;
pub mod quad;
pub mod result_block;
pub mod status;
pub mod tags;
pub mod types;
pub mod version;

pub use array_desc::{ArrayBound, ArrayDesc, MAX_ARRAY_DIMENSIONS};
pub use codec::vax_integer;
pub use error::ProtocolError;
pub use event_block::{EventBlock, EventEntry, MAX_EVENT_BUFFER, MAX_EVENT_NAME_LEN};
pub use param_block::{BlockKind, Dpb, LengthPrefix, ParamBlock, Spb, Tpb, BUFFER_INCREMENT};
pub use quad::Quad;
pub use result_block::{ResultBlock, ResultBlockBuilder};
pub use status::{StatusInterpreter, StatusVector, STATUS_LEN};
pub use types::{BlrType, SqlType, StatementType};
pub use version::{Dialect, OdsVersion};
