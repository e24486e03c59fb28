mod asymmetric;

pub use asymmetric::*;
