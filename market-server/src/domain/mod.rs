pub mod cart;
pub mod error;
pub mod product;
pub mod user;
