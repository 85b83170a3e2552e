//! 目录聚合模块

pub mod builder;

pub use builder::{CatalogBuilder, load_static_catalog, project, render_catalog, write_catalog};
