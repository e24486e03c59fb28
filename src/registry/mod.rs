mod connect;
mod connections;

pub use connect::*;
pub use connections::*;
