//! 模型卡抽取模块
//!
//! 层定位 → 归档解码 → markdown 隔离 → 字段抽取与校验。

pub mod archive;
pub mod dates;
pub mod fields;
pub mod layer;
pub mod validation;

pub use archive::{ExtractionOutcome, MarkdownExtractor, ModelCardDocument};
pub use dates::DateParser;
pub use fields::{FieldExtractor, ModelCardFields};
pub use layer::{fetch_modelcard_layer, locate_modelcard_layer};
pub use validation::FieldValidator;
