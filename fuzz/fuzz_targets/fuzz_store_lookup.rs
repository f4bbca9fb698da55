#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use srcdb::index::{SourceReader, SourceWriter, SourceFile};

#[derive(Arbitrary, Debug)]
struct Input {
    files: Vec<(u64, String, Vec<u8>)>,
    lookups: Vec<(u64, String)>,
}

fuzz_target!(|input: Input| {
    let Ok(dir) = tempfile::TempDir::new() else {
        return;
    };
    let mut writer = SourceWriter::create(dir.path()).unwrap();
    let mut written = Vec::new();
    for (id, path, source) in input.files.into_iter().take(64) {
        let file = SourceFile::new(id, "fuzz", &format!("/{path}"), source);
        // Rejected writes must not disturb accepted ones
        if writer.write(&file).is_ok() {
            written.push(file);
        }
    }
    writer.close().unwrap();

    let reader = SourceReader::open(dir.path()).unwrap();
    for file in &written {
        assert_eq!(reader.query_source_by_id(file.id).unwrap().as_ref(), Some(file));
        assert_eq!(reader.query_source_by_path("fuzz", &file.path).unwrap().as_ref(), Some(file));
    }
    for (id, path) in input.lookups.iter().take(64) {
        let _ = reader.query_source_by_id(*id).unwrap();
        let _ = reader.query_source_by_path("fuzz", path).unwrap();
        let _ = reader.list_directory("fuzz", path);
    }
});
