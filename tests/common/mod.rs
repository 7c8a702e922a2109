use std::fs::File;
use std::io::Error;
use std::path::Path;

pub fn generate_csv(path: &Path, rows: usize) -> Result<(), Error> {
    let file = File::create(path)?;
    let mut wtr = csv::WriterBuilder::new().from_writer(file);

    wtr.write_record(["tx_id", "buyer_id", "seller_id", "rating"])?;

    for i in 1..=rows {
        let rating = (i % 5 + 1).to_string();
        wtr.write_record([
            format!("tx-{i}"),
            format!("buyer-{}", i % 7),
            "seller-1".to_string(),
            rating,
        ])?;
    }

    wtr.flush()?;
    Ok(())
}

pub fn generate_large_csv(path: &Path, size_mb: usize) -> Result<(), Error> {
    use rand::Rng;

    let file = File::create(path)?;
    let mut wtr = csv::WriterBuilder::new().from_writer(file);
    wtr.write_record(["tx_id", "buyer_id", "seller_id", "rating"])?;

    let target_size = (size_mb * 1024 * 1024) as u64;
    let mut rng = rand::thread_rng();
    let mut tx_id = 1u64;

    // Check size every 5000 rows to avoid syscall overhead
    loop {
        for _ in 0..5000 {
            let buyer = rng.gen_range(1..=200);
            let seller = rng.gen_range(1..=50);
            let rating = rng.gen_range(1..=5);
            wtr.write_record([
                format!("tx-{tx_id}"),
                format!("buyer-{buyer}"),
                format!("seller-{seller}"),
                rating.to_string(),
            ])?;
            tx_id += 1;
        }
        wtr.flush()?; // Flush to ensure file size is updated
        if std::fs::metadata(path)?.len() >= target_size {
            break;
        }
    }
    Ok(())
}
