mod common;

use common::{orchestrator, Backend};
use data_seeder::core::exporter::{ACCOUNTS_FILE, BUNDLE_FILE, CUSTOMERS_FILE, JOINED_FILE};
use data_seeder::LocalStorage;
use std::io::Read;
use tempfile::TempDir;

#[tokio::test]
async fn test_exports_match_generated_dataset() {
    let backend = Backend::new();
    let orchestrator = orchestrator(&backend);
    let run = orchestrator.generate_full_dataset(6, 1, 3).await.unwrap();

    let bundle = orchestrator.exporter().export_all().await.unwrap();

    let customer_lines: Vec<&str> = bundle.customers_csv.lines().collect();
    assert_eq!(customer_lines[0], "id,name,email,phone");
    assert_eq!(customer_lines.len(), 1 + 6);

    let account_lines: Vec<&str> = bundle.accounts_csv.lines().collect();
    assert_eq!(account_lines[0], "id,accountNumber,accountType,balance,customerId");
    assert_eq!(account_lines.len(), 1 + run.summary.accounts_generated);

    // Every account has a live customer, so the join keeps all of them
    let mut reader = csv::Reader::from_reader(bundle.joined_csv.as_bytes());
    let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
    assert_eq!(rows.len(), run.summary.accounts_generated);
    for row in &rows {
        let customer = run
            .customers
            .iter()
            .find(|c| c.id.to_string() == row[0])
            .unwrap();
        assert_eq!(&row[2], customer.email);
        let balance = &row[7];
        assert_eq!(balance.split('.').nth(1).map(str::len), Some(2));
    }
}

#[tokio::test]
async fn test_single_views_and_statistics() {
    let backend = Backend::new();
    let orchestrator = orchestrator(&backend);
    orchestrator.generate_full_dataset(4, 2, 2).await.unwrap();
    let exporter = orchestrator.exporter();

    let customers = exporter.export_customers_csv().await.unwrap();
    let accounts = exporter.export_accounts_csv().await.unwrap();
    let joined = exporter.export_joined_csv().await.unwrap();
    assert_eq!(customers.lines().count(), 5);
    assert_eq!(accounts.lines().count(), 9);
    assert_eq!(joined.lines().count(), 9);

    let stats = exporter.statistics().await.unwrap();
    assert_eq!(stats.total_customers, 4);
    assert_eq!(stats.total_accounts, 8);
    assert_eq!(stats.unique_emails, 4);
    assert_eq!(stats.unique_account_numbers, 8);
    assert_eq!(stats.customer_service_circuit, "CLOSED");
    assert_eq!(stats.account_service_circuit, "CLOSED");

    let json = serde_json::to_value(&stats).unwrap();
    assert!(json.get("uniqueAccountNumbers").is_some());
    assert!(json.get("lastGenerated").is_some());
}

#[tokio::test]
async fn test_empty_services_export_headers_only() {
    let backend = Backend::new();
    let exporter = orchestrator(&backend).exporter();

    let bundle = exporter.export_all().await.unwrap();

    assert_eq!(bundle.customers_csv, "id,name,email,phone\n");
    assert_eq!(bundle.joined_csv.lines().count(), 1);
}

#[tokio::test]
async fn test_write_bundle_as_files_and_zip() {
    let backend = Backend::new();
    let orchestrator = orchestrator(&backend);
    orchestrator.generate_full_dataset(3, 1, 1).await.unwrap();
    let exporter = orchestrator.exporter();
    let bundle = exporter.export_all().await.unwrap();

    let temp_dir = TempDir::new().unwrap();
    let storage = LocalStorage::new(temp_dir.path());

    let files = exporter.write_bundle(&storage, &bundle, false).await.unwrap();
    assert_eq!(files, vec![CUSTOMERS_FILE, ACCOUNTS_FILE, JOINED_FILE]);
    let written = std::fs::read_to_string(temp_dir.path().join(JOINED_FILE)).unwrap();
    assert_eq!(written, bundle.joined_csv);

    let files = exporter.write_bundle(&storage, &bundle, true).await.unwrap();
    assert_eq!(files, vec![BUNDLE_FILE]);

    let zip_data = std::fs::read(temp_dir.path().join(BUNDLE_FILE)).unwrap();
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(zip_data)).unwrap();
    assert_eq!(archive.len(), 3);

    let mut customers = String::new();
    archive
        .by_name(CUSTOMERS_FILE)
        .unwrap()
        .read_to_string(&mut customers)
        .unwrap();
    assert_eq!(customers, bundle.customers_csv);
}
