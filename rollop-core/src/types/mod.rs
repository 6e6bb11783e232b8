mod primitives;
mod status;

pub use primitives::*;
pub use status::*;
