#![no_main]

use libfuzzer_sys::fuzz_target;
use zetasketch_hll::HyperLogLogPlusPlus;

fuzz_target!(|data: &[u8]| {
    if let Ok(mut sketch) = serde_json::from_slice::<HyperLogLogPlusPlus>(data) {
        // json carries the wire bytes, which decode to the same sketch
        let bytes: Vec<u8> = serde_json::from_slice(data).unwrap();
        let decoded = HyperLogLogPlusPlus::from_bytes(&bytes).unwrap();
        assert_eq!(decoded.estimate(), sketch.estimate());

        let json = serde_json::to_vec(&sketch).unwrap();
        let restored: HyperLogLogPlusPlus = serde_json::from_slice(&json).unwrap();
        assert_eq!(restored.num_values(), sketch.num_values());

        sketch.insert(&1u64).unwrap();
        assert!(sketch.estimate() > 0);
    }
});
