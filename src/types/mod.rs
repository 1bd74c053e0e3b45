//! Data types for XBee entities.
//!
//! This module contains the value types used throughout the library:
//! - 64-bit and 16-bit network addresses
//! - AT command identifiers
//! - Command, delivery and discovery status codes

pub mod address;
pub mod command;
pub mod status;

pub use address::{Address16, Address64};
pub use command::AtCommand;
pub use status::{CommandStatus, DeliveryStatus, DiscoveryStatus, ReceiveOptions};
