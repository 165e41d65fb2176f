mod cancel;
mod group_ref;
mod layer_mask;
mod type_utils;

pub use cancel::{CancelCheck, NeverCancel};
pub(crate) use cancel::PollGate;
pub use group_ref::*;
pub use layer_mask::*;
pub use type_utils::*;
