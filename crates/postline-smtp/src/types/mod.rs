//! Core SMTP types.

mod address;
mod reply;
mod step;

pub use address::Address;
pub use reply::{Reply, ReplyClass, ReplyCode};
pub use step::Step;
