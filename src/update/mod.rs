mod channel;
mod request;
mod rules;

pub use channel::*;
pub use request::*;
pub use rules::*;

#[cfg(test)]
pub(crate) use request::tests::peer_data;
#[cfg(test)]
pub(crate) use rules::tests::RecordingChannel;
