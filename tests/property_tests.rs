//! Property-based tests for the container reader.

mod common;

use proptest::prelude::*;

use avrocat::{AvroValue, ContainerFileReader, ErrorKind, ReaderConfig};

use common::ContainerBuilder;

const EVENT_SCHEMA: &str = r#"{
    "type": "record",
    "name": "Event",
    "fields": [
        {"name": "seq", "type": "long"},
        {"name": "label", "type": "string"},
        {"name": "score", "type": ["null", "double"]},
        {"name": "attrs", "type": {"type": "map", "values": "int"}}
    ]
}"#;

// ============================================================================
// Generators
// ============================================================================

fn arb_event() -> impl Strategy<Value = AvroValue> {
    (
        any::<i64>(),
        "[a-z0-9 \\t\u{e9}\u{4e2d}]{0,12}",
        prop::option::of(-1.0e9f64..1.0e9),
        prop::collection::vec(("[a-z]{1,4}", any::<i32>()), 0..4),
    )
        .prop_map(|(seq, label, score, attrs)| {
            let score = match score {
                Some(s) => AvroValue::Union(1, Box::new(AvroValue::Double(s))),
                None => AvroValue::Union(0, Box::new(AvroValue::Null)),
            };
            AvroValue::Record(vec![
                ("seq".to_string(), AvroValue::Long(seq)),
                ("label".to_string(), AvroValue::String(label)),
                ("score".to_string(), score),
                (
                    "attrs".to_string(),
                    AvroValue::Map(
                        attrs
                            .into_iter()
                            .map(|(k, v)| (k, AvroValue::Int(v)))
                            .collect(),
                    ),
                ),
            ])
        })
}

/// Records split into blocks, empty blocks included.
fn arb_blocks() -> impl Strategy<Value = Vec<Vec<AvroValue>>> {
    prop::collection::vec(prop::collection::vec(arb_event(), 0..8), 0..6)
}

fn build(blocks: &[Vec<AvroValue>]) -> ContainerBuilder {
    blocks
        .iter()
        .fold(ContainerBuilder::new(EVENT_SCHEMA), |builder, block| {
            builder.block(block)
        })
}

fn reader(bytes: &[u8]) -> ContainerFileReader<&[u8]> {
    let config = ReaderConfig::new().with_max_block_size(1 << 16);
    ContainerFileReader::from_reader(bytes, config).expect("valid header")
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Every written record is read back, equal and in order.
    #[test]
    fn prop_round_trip(blocks in arb_blocks()) {
        let bytes = build(&blocks).build();
        let expected: Vec<AvroValue> = blocks.iter().flatten().cloned().collect();

        let mut reader = reader(&bytes);
        let actual: Vec<AvroValue> = reader
            .by_ref()
            .collect::<Result<_, _>>()
            .map_err(|e| TestCaseError::fail(e.to_string()))?;

        prop_assert_eq!(actual, expected);
        prop_assert_eq!(reader.blocks_read(), blocks.len());
    }

    /// Cutting the file inside a block yields the preceding blocks' records
    /// followed by exactly one format error, never a short record.
    #[test]
    fn prop_truncation_is_format_error(
        blocks in prop::collection::vec(prop::collection::vec(arb_event(), 1..5), 1..4),
        cut_seed in any::<prop::sample::Index>(),
    ) {
        let (bytes, layout) = build(&blocks).build_with_layout();
        let first_block_start = layout[0].start;
        let cut = first_block_start + cut_seed.index(bytes.len() - first_block_start);

        let results: Vec<_> = reader(&bytes[..cut]).collect();
        let at_boundary = cut == first_block_start || layout.iter().any(|b| b.end == cut);
        let complete_blocks = layout.iter().take_while(|b| b.end <= cut).count();
        let expected_ok: usize = blocks[..complete_blocks].iter().map(Vec::len).sum();

        let ok = results.iter().filter(|r| r.is_ok()).count();
        prop_assert_eq!(ok, expected_ok);

        if at_boundary {
            prop_assert_eq!(results.len(), expected_ok);
        } else {
            prop_assert_eq!(results.len(), expected_ok + 1);
            let err = results.last().unwrap().as_ref().unwrap_err();
            prop_assert_eq!(err.kind(), ErrorKind::Format);
        }
    }

    /// Arbitrary bytes after a valid header never panic, and iteration ends.
    #[test]
    fn prop_garbage_blocks_terminate(garbage in prop::collection::vec(any::<u8>(), 0..256)) {
        let mut bytes = ContainerBuilder::new(EVENT_SCHEMA).build();
        bytes.extend_from_slice(&garbage);

        let mut errors = 0;
        for result in reader(&bytes) {
            if let Err(e) = result {
                prop_assert_eq!(e.kind(), ErrorKind::Format);
                errors += 1;
            }
        }
        prop_assert!(errors <= 1);
    }
}
