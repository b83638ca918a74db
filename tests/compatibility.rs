use test_case::test_case;
use zetasketch_hll::{
    fingerprint, Aggregator, Fingerprint, HllConfig, HyperLogLogPlusPlus, SketchError,
};

/// Sparse sketch of precisions (10, 15) holding "foo", "bar", "foo", "baz"
const SPARSE_FOO_BAR_BAZ: [u8; 24] = [
    8, 112, 16, 4, 24, 2, 130, 7, 15, 16, 3, 24, 10, 32, 15, 50, 7, 241, 30, 222, 40, 143, 137, 1,
];

/// Empty sketch of precision 10 without sparse representation
const EMPTY_P10: [u8; 11] = [8, 112, 16, 0, 24, 2, 130, 7, 2, 24, 10];

fn sketch_of(p: u8, pp: u8, values: impl Iterator<Item = u64>) -> HyperLogLogPlusPlus {
    let mut sketch = HyperLogLogPlusPlus::new(p, pp).unwrap();
    for v in values {
        sketch.insert(&v).unwrap();
    }
    sketch
}

#[test]
fn test_fingerprint_vectors() {
    assert_eq!(fingerprint(b"").unwrap(), 0x23ad7c904aa665e3);
    assert_eq!("foo".fingerprint().unwrap(), 0xd0bcbfe261b36504);
    assert_eq!("Z\u{00fc}rich".fingerprint().unwrap(), 0x27efc00f7d2ce548);
    assert_eq!(0u64.fingerprint().unwrap(), 0x853a22bd6e14a48f);
    assert_eq!(0u32.fingerprint().unwrap(), 0x905df40cd02611cb);
}

#[test]
fn test_sparse_golden_bytes() {
    let mut sketch = HyperLogLogPlusPlus::new(10, 15).unwrap();
    for v in ["foo", "bar", "foo", "baz"] {
        sketch.insert(v).unwrap();
    }
    assert_eq!(sketch.estimate(), 3);
    assert_eq!(sketch.to_bytes().unwrap(), SPARSE_FOO_BAR_BAZ);

    let restored = HyperLogLogPlusPlus::from_bytes(&SPARSE_FOO_BAR_BAZ).unwrap();
    assert!(restored.is_sparse());
    assert_eq!(restored.estimate(), 3);
    assert_eq!(restored.num_values(), 4);
    assert_eq!(restored.to_bytes().unwrap(), SPARSE_FOO_BAR_BAZ);
}

#[test]
fn test_empty_golden_bytes() {
    let sketch = HyperLogLogPlusPlus::new(10, 0).unwrap();
    assert_eq!(sketch.to_bytes().unwrap(), EMPTY_P10);

    let restored = HyperLogLogPlusPlus::from_bytes(&EMPTY_P10).unwrap();
    assert!(restored.is_empty());
    assert_eq!(restored.precision(), 10);
    assert_eq!(restored.sparse_precision(), 0);
}

#[test]
fn test_empty_with_values_and_extension_first() {
    // extension, type, num values, encoding version
    let bytes = [130, 7, 2, 24, 10, 8, 112, 16, 4, 24, 2];
    let sketch = HyperLogLogPlusPlus::from_bytes(&bytes).unwrap();
    assert!(sketch.is_empty());
    assert_eq!(sketch.num_values(), 4);
    assert_eq!(sketch.estimate(), 0);
}

#[test]
fn test_missing_precision_is_rejected() {
    // sparse size and sparse precision only
    let bytes = [130, 7, 4, 16, 0, 32, 10, 8, 112, 16, 4, 24, 2];
    assert!(matches!(
        HyperLogLogPlusPlus::from_bytes(&bytes),
        Err(SketchError::MissingField("precision_or_num_buckets"))
    ));
}

#[test]
fn test_dense_with_duplicates() {
    let mut sketch = sketch_of(15, 0, (0..1_000).chain(500..1_000));
    assert_eq!(sketch.estimate(), 1_003);
    assert_eq!(sketch.num_values(), 1_500);

    let bytes = sketch.to_bytes().unwrap();
    assert_eq!(bytes.len(), 32_786);
    let restored = HyperLogLogPlusPlus::from_bytes(&bytes).unwrap();
    assert!(restored.is_dense());
    assert_eq!(restored.estimate(), 1_003);
    assert_eq!(restored.num_values(), 1_500);

    let other = sketch_of(15, 0, 800..1_200);
    assert_eq!(other.estimate(), 400);
    sketch.merge(&other);
    assert_eq!(sketch.estimate(), 1_207);
    assert_eq!(sketch.num_values(), 1_900);
}

#[test]
fn test_sparse_with_duplicates() {
    let mut sketch = sketch_of(15, 20, (0..1_000).chain(500..1_000));
    assert!(sketch.is_sparse());
    assert_eq!(sketch.estimate(), 1_000);

    let other = sketch_of(15, 20, 800..1_200);
    assert_eq!(other.estimate(), 400);
    sketch.merge(&other);
    assert_eq!(sketch.estimate(), 1_201);
    assert_eq!(sketch.num_values(), 1_900);
}

#[test]
fn test_p12_pp17_scenario() {
    // regression value computed by this implementation
    let sketch = sketch_of(12, 17, 0..800);
    assert!(sketch.is_sparse());
    assert_eq!(sketch.estimate(), 802);
}

#[test]
fn test_promotion_boundary() {
    let mut sketch = sketch_of(10, 15, 0..768);
    assert!(sketch.is_sparse());
    assert_eq!(sketch.estimate(), 771);

    sketch.insert(&768u64).unwrap();
    assert!(sketch.is_dense());
    assert_eq!(sketch.estimate(), 797);
}

#[test]
fn test_strings_p10_pp10() {
    let mut sketch = HllConfig::new(10).with_sparse_precision(10).build().unwrap();
    for v in ["foo", "bar", "foo", "baz"] {
        sketch.add(v).unwrap();
    }
    for i in 0..400 {
        sketch.add(&format!("{:04}", i)).unwrap();
    }
    assert_eq!(sketch.result(), 406);
    assert_eq!(sketch.num_values(), 404);

    let restored = HyperLogLogPlusPlus::from_bytes(&sketch.to_bytes().unwrap()).unwrap();
    assert_eq!(restored.result(), 406);
}

// Regression values computed by this implementation, not taken from a published table.
#[test_case(10 => (100_071, 203_048))]
#[test_case(11 => (101_681, 205_926))]
#[test_case(12 => (99_885, 200_177))]
#[test_case(13 => (99_106, 200_379))]
#[test_case(14 => (98_683, 199_583))]
#[test_case(15 => (99_646, 200_146))]
#[test_case(16 => (100_010, 200_119))]
#[test_case(17 => (100_024, 200_789))]
#[test_case(18 => (100_145, 200_376))]
#[test_case(20 => (100_027, 200_174))]
#[test_case(24 => (100_033, 200_027))]
fn test_dense_estimates(precision: u8) -> (u64, u64) {
    let mut sketch = HyperLogLogPlusPlus::new(precision, 0).unwrap();
    sketch.insert_hashes((0..100_000u64).map(|v| v.fingerprint().unwrap()));
    let first = sketch.estimate();
    sketch.insert_hashes((100_000..200_000u64).map(|v| v.fingerprint().unwrap()));
    (first, sketch.estimate())
}

#[test]
fn test_merge_serialized_sketches() {
    let shards: Vec<Vec<u8>> = (0..4u64)
        .map(|shard| {
            let sketch = sketch_of(14, 19, (shard * 2_000)..((shard + 1) * 2_000));
            sketch.serialize_to_bytes().unwrap()
        })
        .collect();

    let mut merged = HyperLogLogPlusPlus::new(14, 19).unwrap();
    for bytes in &shards {
        merged.merge_bytes(bytes).unwrap();
    }

    let direct = sketch_of(14, 19, 0..8_000);
    assert!(direct.is_sparse());
    assert_eq!(merged.num_values(), 8_000);
    assert_eq!(merged.to_bytes().unwrap(), direct.to_bytes().unwrap());
}

#[test_case(&[]; "empty message")]
#[test_case(&[8, 112, 16, 4, 24, 3, 130, 7, 2, 24, 10]; "encoding version 3")]
#[test_case(&[8, 112, 16, 4, 24, 2]; "missing state")]
#[test_case(&[8, 112, 16, 4, 24, 2, 130, 7, 4, 24, 10, 32, 9]; "sparse precision below precision")]
#[test_case(&[8, 112, 16, 4, 24, 2, 130, 7, 7, 24, 10, 32, 15, 50, 1, 0]; "invalid sparse code")]
#[test_case(&[8, 112, 16, 4, 24, 2, 130, 7, 9, 16, 5, 24, 10, 32, 15, 50, 1, 1]; "sparse size mismatch")]
#[test_case(&[8, 112, 16, 127, 24, 2, 130, 7, 2, 24]; "truncated")]
fn test_decode_errors(bytes: &[u8]) {
    assert!(HyperLogLogPlusPlus::from_bytes(bytes).is_err());
}
