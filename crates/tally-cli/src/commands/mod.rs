pub mod demo;
pub mod info;
