mod events;
mod frame;
mod options;
mod socket;

pub use events::*;
pub use frame::*;
pub use options::*;
pub use socket::*;
