pub mod cursor;
pub mod interface;
pub mod port;
pub mod range;
