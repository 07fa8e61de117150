//! Wire value model and frame codec for the tether protocol.
//!
//! Every message on a tether connection is one self-delimiting frame: a
//! tagged binary rendering of a [`Value`]. The codec is incremental — a
//! frame split across several socket reads decodes once the missing bytes
//! arrive, and a [`FrameBuffer`] carries the undecoded tail between reads.

mod codec;
mod value;

pub use codec::{
    DecodeError, FrameBuffer, MAX_PAYLOAD_BYTES, decode, decode_all, encode, encode_into,
};
pub use value::{Fields, Value};
