#![doc = include_str!("RUSTDOC.md")]

pub mod identity;
pub mod shop;
pub mod store;
pub mod util;
