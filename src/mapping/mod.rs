pub mod assignment;
pub mod collaborator;
