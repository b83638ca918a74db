#![no_main]

use libfuzzer_sys::fuzz_target;
use zetasketch_hll::HyperLogLogPlusPlus;

fuzz_target!(|data: &[u8]| {
    if let Ok(mut sketch) = HyperLogLogPlusPlus::from_bytes(data) {
        let bytes = sketch.to_bytes().unwrap();
        let restored = HyperLogLogPlusPlus::from_bytes(&bytes).unwrap();
        assert_eq!(restored.estimate(), sketch.estimate());

        sketch.insert_hash(1);
        assert!(sketch.estimate() > 0);
    }
});
