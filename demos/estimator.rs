use zetasketch_hll::{Aggregator, HllConfig, HyperLogLogPlusPlus};

fn main() -> zetasketch_hll::Result<()> {
    let mut sketch1 = HllConfig::new(12).build()?;
    for i in 0..10u64 {
        sketch1.insert(&i)?;
    }
    println!("sketch1 = {:?}", sketch1);

    let mut sketch2 = HllConfig::new(12).build()?;
    for i in 10..15u64 {
        sketch2.insert(&i)?;
    }
    println!("sketch2 = {:?}", sketch2);

    // sketches travel between processes as zetasketch compatible bytes
    let bytes = sketch2.serialize_to_bytes()?;
    println!("sketch2 serialized into {} bytes", bytes.len());
    sketch1.merge_bytes(&bytes)?;
    println!("merged estimate = {}", sketch1.result());

    let restored = HyperLogLogPlusPlus::from_bytes(&sketch1.to_bytes()?)?;
    println!("restored = {:?}", restored);
    Ok(())
}
