mod store;
mod stored_group;

pub use store::*;
pub use stored_group::*;
