pub mod aggregate;
pub mod filter;
pub mod recompute;
pub mod views;

pub use recompute::{recompute, ViewKind, ViewPayload, ViewRequest};
