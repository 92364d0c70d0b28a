fn main() {
    println!("Run `cargo test -p aws-compat` to execute aws CLI compatibility tests.");
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use serde::Deserialize;
    use vaultpush_protocol::{
        ByteRange, CompleteUploadResponse, InitiateUploadResponse, UploadPartResponse,
    };

    /// Returns the path to the fixtures directory.
    fn fixtures_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures")
    }

    /// Loads a fixture JSON file and returns it as a `serde_json::Value`.
    fn load_fixture(name: &str) -> serde_json::Value {
        let path = fixtures_dir().join(name);
        let data = fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("failed to read fixture {}: {e}", path.display()));
        serde_json::from_str(&data)
            .unwrap_or_else(|e| panic!("failed to parse fixture {}: {e}", path.display()))
    }

    /// Deserializes a fixture, re-serializes it and compares the JSON values.
    fn roundtrip_test<T>(name: &str) -> T
    where
        T: serde::de::DeserializeOwned + serde::Serialize,
    {
        let fixture = load_fixture(name);
        let parsed: T = serde_json::from_value(fixture.clone())
            .unwrap_or_else(|e| panic!("failed to deserialize {name}: {e}"));
        let reserialized = serde_json::to_value(&parsed)
            .unwrap_or_else(|e| panic!("failed to re-serialize {name}: {e}"));
        assert_eq!(
            fixture, reserialized,
            "roundtrip mismatch for {name}:\n  aws:  {fixture}\n  Rust: {reserialized}"
        );
        parsed
    }

    // --- aws glacier output ---

    #[test]
    fn fixture_initiate_multipart_upload() {
        let resp: InitiateUploadResponse = roundtrip_test("initiate_multipart_upload.json");
        assert!(resp.upload_id.starts_with("19gaRez"));
        assert!(resp.location.ends_with(&resp.upload_id));
    }

    #[test]
    fn fixture_upload_multipart_part() {
        let resp: UploadPartResponse = roundtrip_test("upload_multipart_part.json");
        let checksum = resp.checksum.unwrap();
        assert_eq!(checksum.len(), 64);
    }

    #[test]
    fn fixture_upload_multipart_part_without_checksum() {
        let resp: UploadPartResponse = roundtrip_test("upload_multipart_part_empty.json");
        assert!(resp.checksum.is_none());
    }

    #[test]
    fn fixture_complete_multipart_upload() {
        let resp: CompleteUploadResponse = roundtrip_test("complete_multipart_upload.json");
        assert!(resp.archive_id.starts_with("kKB7ymWJ"));
        assert!(resp.location.ends_with(&resp.archive_id));
        assert_eq!(resp.checksum.len(), 64);
    }

    #[test]
    fn complete_output_requires_archive_id() {
        let result = serde_json::from_str::<CompleteUploadResponse>(r#"{"checksum": "00"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn range_argument_format() {
        let range = ByteRange::new(4_194_304, 5_242_879, 5_242_880);
        assert_eq!(range.to_string(), "bytes 4194304-5242879/5242880");
    }

    // --- Tree hash reference values ---

    #[derive(Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct TreeHashCase {
        size: u64,
        tree_hash: String,
    }

    #[derive(Deserialize)]
    struct TreeHashFixture {
        cases: Vec<TreeHashCase>,
    }

    #[test]
    fn fixture_tree_hashes() {
        let fixture: TreeHashFixture = serde_json::from_value(load_fixture("tree_hashes.json"))
            .expect("tree_hashes.json shape");
        assert!(!fixture.cases.is_empty());

        for case in fixture.cases {
            let data: Vec<u8> = (0..case.size).map(|i| (i * 7 % 256) as u8).collect();
            assert_eq!(
                vaultpush_transfer::tree_hash_bytes(&data),
                case.tree_hash,
                "tree hash mismatch for {} bytes",
                case.size
            );
        }
    }
}
