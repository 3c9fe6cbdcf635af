pub mod apply;
pub mod resource;
pub mod upload;
