#![no_main]

use std::io::Write;

use libfuzzer_sys::fuzz_target;

use lazycsv::LazyCsvBuilder;

fuzz_target!(|data: &[u8]| {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(data).unwrap();
    file.flush().unwrap();

    let csv = match LazyCsvBuilder::new().open(file.path()) {
        Ok(csv) => csv,
        Err(_) => return,
    };

    for row in 0..csv.rows() as i64 {
        for col in 0..csv.cols() as i64 {
            let _ = csv.cell(row, col);
        }
    }
});
