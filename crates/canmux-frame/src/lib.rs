//! CAN frame and filter value types for canmux.
//!
//! This is the leaf layer. Every other crate in the workspace moves
//! [`CanFrame`] values around and matches them with [`Filter`] predicates.
//! The crate also defines the fixed 24-byte capture record used to store
//! and replay traffic:
//! - A 2-byte magic number ("CM") for stream synchronization
//! - One flags byte and one DLC byte
//! - A 4-byte little-endian identifier, 8 data bytes, 8-byte timestamp

pub mod codec;
pub mod error;
pub mod filter;
pub mod frame;
pub mod reader;
pub mod writer;

pub use codec::{decode_frame, encode_frame, RECORD_SIZE};
pub use error::{FrameError, Result};
pub use filter::Filter;
pub use frame::{CanFrame, CRC_OFFSET, COUNTER_OFFSET, EXTENDED_ID_MAX, MAX_DLC, STANDARD_ID_MAX};
pub use reader::FrameReader;
pub use writer::FrameWriter;
