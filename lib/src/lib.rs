pub mod identifiers;

pub mod mls;
pub mod util;
