//! 元数据增强模块
//!
//! 外部模型中心候选值的获取，以及三方候选值的确定性合并。

pub mod hub;
pub mod merge;

pub use hub::{HubClient, HubModelInfo, HuggingFaceClient, fetch_hub_candidates, hub_candidates};
pub use merge::{EnrichmentEngine, RegistryInput, license_link_for};
