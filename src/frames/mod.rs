//! Frame addressing: ids, per-source frame lists, selection and pixel lookup.

pub mod address;
pub mod index;
pub mod resolver;
pub mod selection;

pub use address::FrameAddress;
pub use index::{build, FrameDescriptor};
pub use resolver::resolve;
pub use selection::{FrameRef, FrameSelection};
