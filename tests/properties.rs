// Property-based tests for the merge engine and record normalization
//
// Tests cover:
// - Per-field priority modelcard > huggingface > registry over arbitrary candidate triples
// - Tag union: order-preserving dedupe of every contribution, no duplicates
// - A serialized canonical record normalizes back to itself

use modelcar_catalog::enrichment::{EnrichmentEngine, RegistryInput};
use modelcar_catalog::migration::SchemaNormalizer;
use modelcar_catalog::models::{
    CandidateField, CandidateSet, CustomProperty, ExtractedMetadata, MetadataField, OciArtifact,
    Source,
};
use proptest::prelude::*;
use std::collections::HashSet;

// ============ Strategies ============

fn arb_text(source: Source) -> impl Strategy<Value = Option<CandidateField<String>>> {
    prop::option::of("[a-z]{1,8}".prop_map(move |v| CandidateField::new(v, source)))
}

/// 小字母表，保证不同来源之间经常出现重复
fn arb_list(source: Source) -> impl Strategy<Value = Option<CandidateField<Vec<String>>>> {
    prop::option::of(
        prop::collection::vec("[a-c]{1,2}", 1..5).prop_map(move |v| CandidateField::new(v, source)),
    )
}

fn arb_time(source: Source) -> impl Strategy<Value = Option<CandidateField<i64>>> {
    prop::option::of(any::<i64>().prop_map(move |v| CandidateField::new(v, source)))
}

fn arb_candidates(source: Source) -> impl Strategy<Value = CandidateSet> {
    let scalars = (
        arb_text(source),
        arb_text(source),
        arb_text(source),
        arb_text(source),
        arb_text(source),
        arb_text(source),
    );
    let rest = (
        arb_list(source),
        arb_list(source),
        arb_list(source),
        arb_list(source),
        arb_time(source),
        arb_time(source),
    );
    (scalars, rest).prop_map(
        |(
            (name, provider, description, readme, license, license_link),
            (language, tags, tasks, validated_on, create_time, last_update_time),
        )| CandidateSet {
            name,
            provider,
            description,
            readme,
            license,
            license_link,
            language,
            tags,
            tasks,
            validated_on,
            create_time,
            last_update_time,
        },
    )
}

fn arb_registry() -> impl Strategy<Value = RegistryInput> {
    (
        arb_candidates(Source::Registry),
        prop::collection::vec("[a-c]{1,2}", 0..4),
    )
        .prop_map(|(candidates, labels)| RegistryInput {
            candidates,
            labels,
            ..RegistryInput::default()
        })
}

fn arb_string() -> impl Strategy<Value = String> {
    "[A-Za-z0-9 ._:/#-]{0,24}"
}

fn arb_artifact() -> impl Strategy<Value = OciArtifact> {
    (
        "oci://[a-z.]{1,12}/[a-z-]{1,12}:[0-9.]{1,4}",
        prop::option::of(any::<i64>()),
        prop::option::of(any::<i64>()),
        prop::collection::btree_map("[a-z_]{1,10}", arb_string(), 0..3),
    )
        .prop_map(|(uri, created, updated, properties)| OciArtifact {
            uri,
            create_time_since_epoch: created,
            last_update_time_since_epoch: updated,
            custom_properties: properties
                .into_iter()
                .map(|(key, value)| (key, CustomProperty::string(&value)))
                .collect(),
        })
}

fn arb_metadata() -> impl Strategy<Value = ExtractedMetadata> {
    let scalars = (
        prop::option::of(arb_string()),
        prop::option::of(arb_string()),
        prop::option::of(arb_string()),
        prop::option::of(arb_string()),
        prop::option::of(arb_string()),
        prop::option::of(arb_string()),
    );
    let rest = (
        prop::collection::vec(arb_string(), 0..3),
        prop::collection::vec(arb_string(), 0..3),
        prop::collection::vec(arb_string(), 0..3),
        prop::collection::vec(arb_string(), 0..3),
        prop::option::of(any::<i64>()),
        prop::option::of(any::<i64>()),
        prop::collection::vec(arb_artifact(), 0..3),
    );
    (scalars, rest).prop_map(
        |(
            (name, provider, description, readme, license, license_link),
            (language, tags, tasks, validated_on, created, updated, artifacts),
        )| ExtractedMetadata {
            name,
            provider,
            description,
            readme,
            language,
            license,
            license_link,
            tags,
            tasks,
            validated_on,
            create_time_since_epoch: created,
            last_update_time_since_epoch: updated,
            artifacts,
        },
    )
}

// ============ Helpers ============

/// 按层级取第一个候选值
fn first_present<T: Clone>(tiers: [&Option<CandidateField<T>>; 3]) -> Option<(T, Source)> {
    let order = [Source::Modelcard, Source::Huggingface, Source::Registry];
    tiers
        .into_iter()
        .zip(order)
        .find_map(|(field, source)| field.as_ref().map(|f| (f.value.clone(), source)))
}

fn tiers<'a, T>(
    card: &'a CandidateSet,
    hub: &'a CandidateSet,
    registry: &'a RegistryInput,
    get: fn(&CandidateSet) -> &Option<CandidateField<T>>,
) -> [&'a Option<CandidateField<T>>; 3] {
    [get(card), get(hub), get(&registry.candidates)]
}

// ============ Properties ============

proptest! {
    /// 每个标量、列表和时间戳字段都取优先级最高的来源
    #[test]
    fn merge_respects_source_priority(
        card in arb_candidates(Source::Modelcard),
        hub in arb_candidates(Source::Huggingface),
        registry in arb_registry(),
    ) {
        let record = EnrichmentEngine::new().merge(&card, &hub, &registry);
        let metadata = &record.metadata;

        let scalars: [(MetadataField, fn(&CandidateSet) -> &Option<CandidateField<String>>, &Option<String>); 6] = [
            (MetadataField::Name, |s| &s.name, &metadata.name),
            (MetadataField::Provider, |s| &s.provider, &metadata.provider),
            (MetadataField::Description, |s| &s.description, &metadata.description),
            (MetadataField::Readme, |s| &s.readme, &metadata.readme),
            (MetadataField::License, |s| &s.license, &metadata.license),
            (MetadataField::LicenseLink, |s| &s.license_link, &metadata.license_link),
        ];
        for (field, get, actual) in scalars {
            match first_present(tiers(&card, &hub, &registry, get)) {
                Some((value, source)) => {
                    prop_assert_eq!(actual.as_deref(), Some(value.as_str()), "{:?}", field);
                    prop_assert_eq!(record.source_of(field), source, "{:?}", field);
                }
                // 没有任何来源时只允许生成默认值
                None => prop_assert!(
                    matches!(record.source_of(field), Source::None | Source::Generated),
                    "{:?}", field
                ),
            }
        }

        let lists: [(MetadataField, fn(&CandidateSet) -> &Option<CandidateField<Vec<String>>>, &Vec<String>); 3] = [
            (MetadataField::Language, |s| &s.language, &metadata.language),
            (MetadataField::Tasks, |s| &s.tasks, &metadata.tasks),
            (MetadataField::ValidatedOn, |s| &s.validated_on, &metadata.validated_on),
        ];
        for (field, get, actual) in lists {
            let (expected, source) = first_present(tiers(&card, &hub, &registry, get))
                .unwrap_or((Vec::new(), Source::None));
            prop_assert_eq!(actual, &expected, "{:?}", field);
            prop_assert_eq!(record.source_of(field), source, "{:?}", field);
        }

        let timestamps: [(MetadataField, fn(&CandidateSet) -> &Option<CandidateField<i64>>, Option<i64>); 2] = [
            (MetadataField::CreateTime, |s| &s.create_time, metadata.create_time_since_epoch),
            (MetadataField::LastUpdateTime, |s| &s.last_update_time, metadata.last_update_time_since_epoch),
        ];
        for (field, get, actual) in timestamps {
            let expected = first_present(tiers(&card, &hub, &registry, get));
            prop_assert_eq!(actual, expected.map(|(v, _)| v), "{:?}", field);
            prop_assert_eq!(
                record.source_of(field),
                expected.map(|(_, s)| s).unwrap_or(Source::None),
                "{:?}", field
            );
        }
    }

    /// 标签是全部贡献按顺序拼接后的去重结果
    #[test]
    fn tags_are_ordered_union_without_duplicates(
        card in arb_candidates(Source::Modelcard),
        hub in arb_candidates(Source::Huggingface),
        registry in arb_registry(),
    ) {
        let record = EnrichmentEngine::new().merge(&card, &hub, &registry);

        let mut seen = HashSet::new();
        let expected: Vec<String> = [&card.tags, &hub.tags, &registry.candidates.tags]
            .into_iter()
            .flat_map(|tags| tags.iter().flat_map(|t| t.value.clone()))
            .chain(registry.labels.iter().cloned())
            .filter(|tag| seen.insert(tag.clone()))
            .collect();
        prop_assert_eq!(&record.metadata.tags, &expected);

        let unique: HashSet<_> = record.metadata.tags.iter().collect();
        prop_assert_eq!(unique.len(), record.metadata.tags.len());
    }

    /// 写出的规范记录重新规范化后不变
    #[test]
    fn canonical_record_normalizes_to_itself(metadata in arb_metadata()) {
        let text = serde_yaml::to_string(&metadata).unwrap();
        let normalized = SchemaNormalizer::default().normalize(&text).unwrap();
        prop_assert_eq!(normalized, metadata);
    }
}
