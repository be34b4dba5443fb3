pub mod codec;

pub use codec::{EncodeFormat, decode, encode};
