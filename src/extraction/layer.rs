//! Layer locator

use crate::error::Result;
use crate::registry::{BlobDescriptor, ImageSource, ResolvedImage};

pub const LAYER_TYPE_ANNOTATION: &str = "layer.type";
pub const MODELCARD_LAYER_TYPE: &str = "modelcard";

/// Whether a descriptor is annotated as carrying the model card.
///
/// Accepts the bare `layer.type` key and namespaced variants such as
/// `io.redhat.modelcar.layer.type`.
pub fn is_modelcard_layer(descriptor: &BlobDescriptor) -> bool {
    descriptor.annotations.iter().any(|(key, value)| {
        (key == LAYER_TYPE_ANNOTATION || key.ends_with(&format!(".{}", LAYER_TYPE_ANNOTATION)))
            && value.trim() == MODELCARD_LAYER_TYPE
    })
}

/// First modelcard-annotated descriptor, in manifest order.
pub fn locate_modelcard_layer(layers: &[BlobDescriptor]) -> Option<&BlobDescriptor> {
    layers.iter().find(|descriptor| is_modelcard_layer(descriptor))
}

/// A located modelcard layer and its bytes.
#[derive(Debug, Clone)]
pub struct ModelCardLayer {
    pub descriptor: BlobDescriptor,
    pub bytes: Vec<u8>,
}

/// Locate the modelcard layer and fetch it.
///
/// `Ok(None)` means the image has no such layer; fetch errors are returned to
/// the caller.
pub async fn fetch_modelcard_layer(
    source: &dyn ImageSource,
    image: &ResolvedImage,
) -> Result<Option<ModelCardLayer>> {
    let Some(descriptor) = locate_modelcard_layer(&image.layers) else {
        tracing::debug!(reference = %image.reference, "no modelcard layer");
        return Ok(None);
    };

    let bytes = source.fetch_blob(image, descriptor).await?;
    Ok(Some(ModelCardLayer {
        descriptor: descriptor.clone(),
        bytes,
    }))
}
