mod common;
mod event;
mod event_registration;
mod member;

pub use common::*;
pub use event::*;
pub use event_registration::*;
pub use member::*;
