//! ModelCar Catalog - 模型元数据抽取与目录生成
//!
//! 从 ModelCar 容器镜像中抽取模型卡，结合镜像元数据与 Hugging Face
//! 信息合并出带来源标记的元数据记录，并聚合为模型目录。

pub mod catalog;
pub mod config;
pub mod enrichment;
pub mod error;
pub mod extraction;
pub mod migration;
pub mod models;
pub mod observability;
pub mod pipeline;
pub mod registry;
