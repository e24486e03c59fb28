mod headers;
mod nonce;
mod peer;

pub use headers::*;
pub use nonce::*;
pub use peer::*;

#[cfg(test)]
pub(crate) use headers::tests::{headers as test_headers, NETHASH as TEST_NETHASH};
