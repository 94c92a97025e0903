//! Store a JSON document through a scripted filecoin-pin and read it back
//! through a mock gateway serving the bytes the script received.

#![cfg(unix)]

use std::fs::Permissions;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use filecoin_pin_provider::{
    FilecoinPinProvider, ProviderConfig, RetrievalConfig, StorageProviderTrait,
};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const CID: &str = "bafkreihdwdcefgh4dqkjv67uzcmw7ojee6xedzdetojuzjevtenxquvyku";

fn write_mock_cli(dir: &Path) -> PathBuf {
    let captured = dir.join("captured");
    let script = format!(
        "#!/bin/sh\n\
         if [ \"$1\" = \"--version\" ]; then\n  echo 'filecoin-pin 0.9.0'\n  exit 0\nfi\n\
         cp \"$2\" '{}'\n\
         echo '│  Root CID: {CID}'\n",
        captured.display()
    );
    let executable = dir.join("filecoin-pin");
    std::fs::write(&executable, script).unwrap();
    std::fs::set_permissions(&executable, Permissions::from_mode(0o755)).unwrap();
    executable
}

#[tokio::test]
async fn test_upload_json_then_get_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let gateway = MockServer::start().await;

    let config = ProviderConfig {
        executable_path: write_mock_cli(dir.path()),
        retrieval: RetrievalConfig {
            gateways: vec![gateway.uri()],
            ..Default::default()
        },
        ..Default::default()
    };
    let provider = FilecoinPinProvider::new(config).await.unwrap();

    let cid = provider
        .upload_json(&serde_json::json!({"a": 1}), None)
        .await
        .expect("upload should succeed");
    assert_eq!(cid, CID);

    let stored = std::fs::read(dir.path().join("captured")).unwrap();
    Mock::given(method("GET"))
        .and(path(format!("/ipfs/{CID}")))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/json")
                .set_body_bytes(stored),
        )
        .expect(1)
        .mount(&gateway)
        .await;

    let content = provider.get(&format!("ipfs://{cid}")).await.unwrap();
    let parsed: serde_json::Value = serde_json::from_slice(&content.data).unwrap();

    assert_eq!(parsed, serde_json::json!({"a": 1}));
    assert_eq!(
        content.metadata.content_type.as_deref(),
        Some("application/json")
    );
    assert!(provider.verify(&format!("ipfs://{cid}"), &cid));
}
