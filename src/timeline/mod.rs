pub mod arena;
pub mod timeline;
