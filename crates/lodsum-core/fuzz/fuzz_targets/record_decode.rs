#![no_main]
use libfuzzer_sys::fuzz_target;
use lodsum_core::record::{Field, RecordReader, RecordShape};

const HEADER: RecordShape = RecordShape::new("header", &[Field::unsigned(4), Field::unsigned(5)]);
const ENTITY: RecordShape = RecordShape::new("entity", &[Field::unsigned(5)]);

// Header-plus-payload walk: must end cleanly or with a typed error, never panic.
fuzz_target!(|data: &[u8]| {
    let mut rdr = RecordReader::new(data);
    while let Ok(Some(h)) = rdr.next_record(&HEADER) {
        if rdr.skip_records(&ENTITY, h.get(1) as u64).is_err() {
            break;
        }
    }
});
