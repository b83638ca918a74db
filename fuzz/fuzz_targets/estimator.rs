#![no_main]

use libfuzzer_sys::fuzz_target;
use wyhash::wyhash;
use zetasketch_hll::HyperLogLogPlusPlus;

fuzz_target!(|data: &[u8]| {
    if data.is_empty() {
        return;
    }

    let split_index = wyhash(data, 0) as usize % data.len();
    let (first_half, second_half) = data.split_at(split_index);

    let mut sketch1 = HyperLogLogPlusPlus::new(10, 15).unwrap();
    for chunk in first_half.chunks(4) {
        sketch1.insert(chunk).unwrap();
        assert!(sketch1.estimate() > 0);
        assert!(sketch1.size_of() > 0);
    }

    let mut sketch2 = HyperLogLogPlusPlus::new(12, 0).unwrap();
    for chunk in second_half.chunks(4) {
        sketch2.insert(chunk).unwrap();
        assert!(sketch2.estimate() > 0);
        assert!(sketch2.size_of() > 0);
    }

    let sketch2_bytes = sketch2.to_bytes().unwrap();
    sketch1.merge(&sketch2);
    assert_eq!(sketch2.to_bytes().unwrap(), sketch2_bytes);

    let restored = HyperLogLogPlusPlus::from_bytes(&sketch1.to_bytes().unwrap()).unwrap();
    assert_eq!(restored.estimate(), sketch1.estimate());
    assert_eq!(restored.num_values(), sketch1.num_values());
});
