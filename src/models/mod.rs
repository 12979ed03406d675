pub mod api;
pub mod image;
pub mod product;
pub mod task;
