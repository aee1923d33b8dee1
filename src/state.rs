pub mod registry;
pub mod sessions;
