//! Protocol module containing message types, the binary codec, and the
//! correlation token counter.

pub mod codec;
pub mod messages;
pub mod token;

pub use codec::{decode_message, encode_message, ProtocolError};
pub use messages::*;
pub use token::TokenCounter;
