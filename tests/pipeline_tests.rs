// End-to-end tests for the catalog pipeline
//
// Tests cover:
// - OCI layout images with and without a modelcard layer
// - Batch isolation of an unresolvable reference
// - Catalog generation from the written records
// - Reading records persisted in the legacy shape

use modelcar_catalog::catalog::CatalogBuilder;
use modelcar_catalog::config::config::AppConfig;
use modelcar_catalog::models::{
    ExtractedMetadata, MetadataField, ModelEntry, ModelsCatalog, Source,
};
use modelcar_catalog::pipeline::{ModelCardStatus, PipelineContext, run_batch};
use modelcar_catalog::registry::OciLayoutSource;
use serde_json::{Value, json};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;

const LAYER_TAR: &str = "application/vnd.oci.image.layer.v1.tar";
const LAYER_GZIP: &str = "application/vnd.oci.image.layer.v1.tar+gzip";

const GRANITE_CARD: &str = r#"---
license: apache-2.0
language:
  - en
tags:
  - granite
pipeline_tag: text-generation
---
# Model Card for granite-3.1-8b-instruct

Granite 3.1 8B Instruct is a long-context instruction model.

**Provider:** IBM
**Release Date:** 12/18/2024

## Validated on

- RHOAI 2.16
- RHELAI 1.4
"#;

// ============ Fixtures ============

fn blob(dir: &Path, media_type: &str, bytes: &[u8]) -> Value {
    let hex = format!("{:x}", Sha256::digest(bytes));
    std::fs::write(dir.join("blobs/sha256").join(&hex), bytes).unwrap();
    json!({ "mediaType": media_type, "digest": format!("sha256:{hex}"), "size": bytes.len() })
}

/// Writes a single-image OCI layout under `<root>/<repository>`.
fn write_image(root: &Path, repository: &str, tag: &str, layers: Vec<Value>, created: &str) {
    let dir = root.join(repository);
    std::fs::create_dir_all(dir.join("blobs/sha256")).unwrap();
    std::fs::write(dir.join("oci-layout"), r#"{"imageLayoutVersion":"1.0.0"}"#).unwrap();

    let config = json!({
        "created": created,
        "config": { "Labels": { "org.opencontainers.image.vendor": "Red Hat" } }
    });
    let config = blob(&dir, "application/vnd.oci.image.config.v1+json", config.to_string().as_bytes());
    let manifest = json!({
        "schemaVersion": 2,
        "config": config,
        "layers": layers,
    });
    let mut manifest = blob(
        &dir,
        "application/vnd.oci.image.manifest.v1+json",
        manifest.to_string().as_bytes(),
    );
    manifest["annotations"] = json!({ "org.opencontainers.image.ref.name": tag });
    let index = json!({ "schemaVersion": 2, "manifests": [manifest] });
    std::fs::write(dir.join("index.json"), index.to_string()).unwrap();
}

fn layer_dir(root: &Path, repository: &str) -> PathBuf {
    let dir = root.join(repository);
    std::fs::create_dir_all(dir.join("blobs/sha256")).unwrap();
    dir
}

fn modelcard_tar(files: &[(&str, &str)]) -> Vec<u8> {
    let mut builder = tar::Builder::new(Vec::new());
    for (name, content) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, name, content.as_bytes())
            .unwrap();
    }
    builder.into_inner().unwrap()
}

fn gzip(bytes: &[u8]) -> Vec<u8> {
    use std::io::Write;
    let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(bytes).unwrap();
    encoder.finish().unwrap()
}

fn modelcard_layer(dir: &Path, media_type: &str, bytes: &[u8]) -> Value {
    let mut layer = blob(dir, media_type, bytes);
    layer["annotations"] = json!({ "io.opendatahub.modelcar.layer.type": "modelcard" });
    layer
}

fn context(images: &Path, output: &Path) -> Arc<PipelineContext> {
    let mut config = AppConfig::offline();
    config.pipeline.output_dir = output.to_path_buf();
    Arc::new(PipelineContext::new(
        &config,
        Arc::new(OciLayoutSource::new(images)),
        None,
    ))
}

// ============ Pipeline Tests ============

#[tokio::test]
async fn test_batch_end_to_end() {
    let images = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();

    let granite = layer_dir(images.path(), "rhelai1/modelcar-granite-3.1-8b-instruct");
    let card = modelcard_layer(
        &granite,
        LAYER_GZIP,
        &gzip(&modelcard_tar(&[("models/README.md", GRANITE_CARD)])),
    );
    let weights = blob(&granite, LAYER_TAR, &modelcard_tar(&[("models/config.json", "{}")]));
    write_image(
        images.path(),
        "rhelai1/modelcar-granite-3.1-8b-instruct",
        "1.5",
        vec![weights, card],
        "2025-01-10T12:00:00Z",
    );
    write_image(
        images.path(),
        "rhelai1/modelcar-phi-4",
        "1.5",
        Vec::new(),
        "2025-02-01T00:00:00Z",
    );

    let ctx = context(images.path(), output.path());
    let entries = vec![
        ModelEntry::oci("oci://registry.redhat.io/rhelai1/modelcar-granite-3.1-8b-instruct:1.5")
            .with_labels(&["featured"]),
        ModelEntry::oci("registry.redhat.io/rhelai1/modelcar-missing:1.0"),
        ModelEntry::oci("registry.redhat.io/rhelai1/modelcar-phi-4:1.5"),
    ];
    let report = run_batch(Arc::clone(&ctx), entries, 2).await;

    assert_eq!(report.succeeded().count(), 2);
    let failures: Vec<_> = report.failed().collect();
    assert_eq!(failures.len(), 1);
    assert_eq!(
        failures[0].reference(),
        "registry.redhat.io/rhelai1/modelcar-missing:1.0"
    );
    assert!(report.fatal().is_none());

    let granite = report.outcomes[0].result.as_ref().unwrap();
    assert_eq!(
        granite.modelcard,
        ModelCardStatus::Found {
            filename: "models/README.md".into()
        }
    );
    let record = &granite.record;
    assert_eq!(record.metadata.name.as_deref(), Some("granite-3.1-8b-instruct"));
    assert_eq!(record.source_of(MetadataField::Name), Source::Modelcard);
    assert_eq!(record.metadata.provider.as_deref(), Some("IBM"));
    assert_eq!(record.metadata.license.as_deref(), Some("apache-2.0"));
    assert_eq!(record.source_of(MetadataField::LicenseLink), Source::Generated);
    assert_eq!(record.metadata.validated_on, vec!["RHOAI 2.16", "RHELAI 1.4"]);
    assert_eq!(record.metadata.create_time_since_epoch, Some(1734480000));
    assert!(record.metadata.tags.contains(&"granite".to_string()));
    assert!(record.metadata.tags.contains(&"featured".to_string()));
    assert_eq!(
        record.metadata.artifacts[0].uri,
        "oci://registry.redhat.io/rhelai1/modelcar-granite-3.1-8b-instruct:1.5"
    );

    let phi = report.outcomes[2].result.as_ref().unwrap();
    assert_eq!(phi.modelcard, ModelCardStatus::NoLayer);
    assert_eq!(phi.record.metadata.name.as_deref(), Some("phi-4"));
    assert_eq!(phi.record.source_of(MetadataField::Name), Source::Registry);
    assert_eq!(phi.record.metadata.provider.as_deref(), Some("Red Hat"));
    assert_eq!(phi.record.source_of(MetadataField::Readme), Source::None);

    let written = std::fs::read_to_string(&phi.path).unwrap();
    let reread: ExtractedMetadata = serde_yaml::from_str(&written).unwrap();
    assert_eq!(reread, phi.record.metadata);

    // 目录在全部记录写出之后生成
    let catalog_path = output.path().join("catalog/models-catalog.yaml");
    let builder = CatalogBuilder::new("Red Hat", ctx.normalizer.clone());
    let catalog = builder
        .run(output.path(), &[], &catalog_path)
        .await
        .unwrap();
    let names: Vec<_> = catalog.models.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, vec!["granite-3.1-8b-instruct", "phi-4"]);

    let rendered = std::fs::read_to_string(&catalog_path).unwrap();
    assert!(rendered.contains("string_value: \"RHOAI 2.16, RHELAI 1.4\""));
    assert!(rendered.contains("createTimeSinceEpoch: '1734480000'"));
    let reparsed: ModelsCatalog = serde_yaml::from_str(&rendered).unwrap();
    assert_eq!(reparsed, catalog);
}

#[tokio::test]
async fn test_rerun_over_legacy_record() {
    let images = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write_image(
        images.path(),
        "rh/modelcar-mistral-7b",
        "2",
        Vec::new(),
        "2024-09-01T00:00:00Z",
    );
    let uri = "quay.io/rh/modelcar-mistral-7b:2";
    let ctx = context(images.path(), output.path());

    // legacy 形态的已有记录：制品为纯字符串
    let path = ctx.layout.metadata_path(&ModelEntry::oci(uri).key());
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(
        &path,
        "name: mistral\ncreateTimeSinceEpoch: \"1725148800\"\nartifacts:\n  - oci://quay.io/rh/modelcar-mistral-7b:2\n",
    )
    .unwrap();

    let report = run_batch(Arc::clone(&ctx), vec![ModelEntry::oci(uri)], 1).await;
    assert!(report.fatal().is_none());
    let processed = report.outcomes[0].result.as_ref().unwrap();
    assert_eq!(processed.record.metadata.name.as_deref(), Some("mistral-7b"));
    assert_eq!(processed.record.metadata.create_time_since_epoch, Some(1725148800));

    let reread: ExtractedMetadata =
        serde_yaml::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(reread.artifacts.len(), 1);
    assert_eq!(reread.artifacts[0].uri, "oci://quay.io/rh/modelcar-mistral-7b:2");
}

#[tokio::test]
async fn test_unrecognised_prior_record_aborts_catalog() {
    let images = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    let ctx = context(images.path(), output.path());

    let path = ctx.layout.metadata_path(&ModelEntry::hf("org/broken").key());
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, "name: broken\ncreateTimeSinceEpoch: \"soon\"\n").unwrap();

    let report = run_batch(Arc::clone(&ctx), vec![ModelEntry::hf("org/broken")], 1).await;
    assert!(report.fatal().is_some());

    let builder = CatalogBuilder::new("Red Hat", ctx.normalizer.clone());
    let result = builder
        .run(output.path(), &[], &output.path().join("catalog.yaml"))
        .await;
    assert!(result.is_err());
    assert!(!output.path().join("catalog.yaml").exists());
}
