//! RDS (Radio Data System) decode chain: demodulation of the 57 kHz
//! subcarrier down to a symbol stream, clock recovery and differential
//! decoding into bits, (26,16) shortened cyclic error-correction and
//! 104-bit group synchronization, and finally dispatch of each group's
//! payload into the long-lived [`state::RdsState`].
//!
//! Mirrors `hvylya::filters::fm`'s `RdsDemodulator` -> `RdsBitsDecoder` ->
//! `RdsGroupsDecoder` -> message-decoding pipeline, one stage per module
//! here.

pub mod bits_decoder;
pub mod demodulator;
pub mod ecc;
pub mod groups_decoder;
pub mod messages_decoder;
pub mod state;

pub use bits_decoder::RdsBitsDecoder;
pub use demodulator::RdsDemodulator;
pub use ecc::{decode_rds_block, encode_rds_block, is_rds_block_valid, RdsDecodingStatus};
pub use groups_decoder::{RdsDecodingStats, RdsGroupsDecoder};
pub use messages_decoder::decode_group;
pub use state::{RdsGroup, RdsState};
