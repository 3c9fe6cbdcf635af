pub mod field_model;
pub mod label;
pub mod locate;
pub mod registry;
pub mod scanner;
pub mod selector;
