use registrar_storage::conformance::run_conformance_suite;
use registrar_storage::MemoryApprovalService;

#[tokio::test]
async fn memory_service_passes_conformance_suite() {
    let report =
        run_conformance_suite(|records| async move { MemoryApprovalService::new(records) }).await;
    assert!(report.total > 0);
    assert_eq!(report.failed, 0, "{report}");
}

#[tokio::test]
async fn file_backed_service_passes_conformance_suite() {
    let dir = tempfile::tempdir().unwrap();
    let counter = std::sync::atomic::AtomicUsize::new(0);
    let report = run_conformance_suite(|records| {
        let n = counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        let path = dir.path().join(format!("records-{n}.json"));
        async move {
            std::fs::write(&path, serde_json::to_string(&records).unwrap()).unwrap();
            MemoryApprovalService::open(&path).await.unwrap()
        }
    })
    .await;
    assert_eq!(report.failed, 0, "{report}");
}
