mod pool;
mod priority;

pub use pool::*;
pub use priority::*;
