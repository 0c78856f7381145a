pub mod arena;
pub mod model;
