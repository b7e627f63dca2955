pub mod cancel;
pub mod serde_ms;
