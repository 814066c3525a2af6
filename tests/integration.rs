mod common;

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

use common::{config_toml, header, stock_report, write_xlsx, Cell};

fn stockbot_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("stockbot");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();
    let data_dir = root.join("data");
    fs::create_dir_all(&data_dir).unwrap();

    let catalog = data_dir.join("SALES_Stock_report.xlsx");
    write_xlsx(&catalog, &stock_report());

    let config_path = config_dir.join("stockbot.toml");
    fs::write(&config_path, config_toml(&catalog, 7331)).unwrap();

    (tmp, config_path)
}

fn run_stockbot(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    run_stockbot_with_env(config_path, args, &[])
}

fn run_stockbot_with_env(
    config_path: &Path,
    args: &[&str],
    env: &[(&str, &str)],
) -> (String, String, bool) {
    let binary = stockbot_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .env_remove("STOCKBOT_CATALOG_PATH")
        .envs(env.iter().copied())
        .output()
        .unwrap_or_else(|e| panic!("Failed to run stockbot binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

#[test]
fn test_check_reports_counts() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_stockbot(&config_path, &["check"]);
    assert!(success, "check failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("records:      16"), "stdout: {}", stdout);
    assert!(stdout.contains("in stock:     15"), "stdout: {}", stdout);
    assert!(stdout.contains("skipped rows: 1"), "stdout: {}", stdout);
    assert!(stdout.contains("lemmatizer:   russian"), "stdout: {}", stdout);
}

#[test]
fn test_search_by_inflected_name() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_stockbot(&config_path, &["search", "болты"]);
    assert!(success, "search failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("1 result(s), page 1/1"), "stdout: {}", stdout);
    assert!(stdout.contains("📦 Артикул: 100234"));
    assert!(stdout.contains("🔢 В наличии: 25 шт."));
    assert!(stdout.contains("📥 В резерве: 5 шт."));
    // out of stock
    assert!(!stdout.contains("100235"));
}

#[test]
fn test_search_multiple_codes() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, _, success) = run_stockbot(&config_path, &["search", "100234, 200100;a-77"]);
    assert!(success);
    assert!(stdout.contains("3 result(s)"), "stdout: {}", stdout);
    let first = stdout.find("100234").unwrap();
    let second = stdout.find("A-77").unwrap();
    let third = stdout.find("200100").unwrap();
    assert!(first < second && second < third, "catalog order expected");
}

#[test]
fn test_quantities_round_half_up() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, _, success) = run_stockbot(&config_path, &["search", "гайка"]);
    assert!(success);
    assert!(stdout.contains("🔢 В наличии: 13 шт."), "stdout: {}", stdout);
    assert!(stdout.contains("📥 В резерве: 0 шт."));
}

#[test]
fn test_search_pages() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, _, success) = run_stockbot(&config_path, &["search", "винты"]);
    assert!(success);
    assert!(stdout.contains("12 result(s), page 1/2"), "stdout: {}", stdout);
    assert_eq!(stdout.matches("📦 Артикул:").count(), 10);

    let (stdout, _, success) =
        run_stockbot(&config_path, &["search", "винты", "--page", "2"]);
    assert!(success);
    assert!(stdout.contains("page 2/2"), "stdout: {}", stdout);
    assert_eq!(stdout.matches("📦 Артикул:").count(), 2);
    assert!(stdout.contains("V012"));

    // past the end is clamped to the last page
    let (stdout, _, _) = run_stockbot(&config_path, &["search", "винты", "--page", "9"]);
    assert!(stdout.contains("page 2/2"));
}

#[test]
fn test_search_modes() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, _, success) =
        run_stockbot(&config_path, &["search", "гайка", "--mode", "code"]);
    assert!(success);
    assert!(stdout.contains("No results."));

    let (stdout, _, success) =
        run_stockbot(&config_path, &["search", "100234", "--mode", "name"]);
    assert!(success);
    assert!(stdout.contains("No results."));

    let (_, stderr, success) =
        run_stockbot(&config_path, &["search", "гайка", "--mode", "fuzzy"]);
    assert!(!success);
    assert!(stderr.contains("Unknown search mode"));
}

#[test]
fn test_search_nothing_found() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, _, success) = run_stockbot(&config_path, &["search", "кувалда"]);
    assert!(success);
    assert!(stdout.contains("No results."));
}

#[test]
fn test_missing_column_fails_check() {
    let (tmp, config_path) = setup_test_env();
    let catalog = tmp.path().join("data").join("SALES_Stock_report.xlsx");
    write_xlsx(
        &catalog,
        &[
            vec![
                Cell::Text("Материал"),
                Cell::Text("Наименование"),
                Cell::Text("В наличии"),
            ],
            vec![Cell::Text("X1"), Cell::Text("Шуруп"), Cell::Number(1.0)],
        ],
    );

    let (_, stderr, success) = run_stockbot(&config_path, &["check"]);
    assert!(!success);
    assert!(stderr.contains("в резерве"), "stderr: {}", stderr);
}

#[test]
fn test_invalid_quantity_fails_check() {
    let (tmp, config_path) = setup_test_env();
    let catalog = tmp.path().join("data").join("SALES_Stock_report.xlsx");
    write_xlsx(
        &catalog,
        &[
            header(),
            vec![
                Cell::Text("X1"),
                Cell::Text("Шуруп"),
                Cell::Text("много"),
                Cell::Number(0.0),
            ],
        ],
    );

    let (_, stderr, success) = run_stockbot(&config_path, &["check"]);
    assert!(!success);
    assert!(stderr.contains("много"), "stderr: {}", stderr);
}

#[test]
fn test_missing_catalog_file() {
    let tmp = TempDir::new().unwrap();
    let config_path = tmp.path().join("stockbot.toml");
    fs::write(&config_path, config_toml(&tmp.path().join("absent.xlsx"), 7331)).unwrap();

    let (_, stderr, success) = run_stockbot(&config_path, &["check"]);
    assert!(!success);
    assert!(stderr.contains("cannot read"), "stderr: {}", stderr);
}

#[test]
fn test_catalog_path_env_override() {
    let (tmp, _) = setup_test_env();
    let config_path = tmp.path().join("other.toml");
    fs::write(&config_path, config_toml(&tmp.path().join("absent.xlsx"), 7331)).unwrap();
    let real = tmp.path().join("data").join("SALES_Stock_report.xlsx");

    let (stdout, stderr, success) = run_stockbot_with_env(
        &config_path,
        &["check"],
        &[("STOCKBOT_CATALOG_PATH", real.to_str().unwrap())],
    );
    assert!(success, "check failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("records:      16"));
}

#[test]
fn test_missing_config_fails() {
    let tmp = TempDir::new().unwrap();
    let (_, stderr, success) = run_stockbot(&tmp.path().join("nope.toml"), &["check"]);
    assert!(!success);
    assert!(stderr.contains("Failed to read config file"));
}

#[test]
fn test_invalid_page_size_rejected() {
    let (tmp, _) = setup_test_env();
    let config_path = tmp.path().join("bad.toml");
    fs::write(
        &config_path,
        "[catalog]\npath = \"stock.xlsx\"\n\n[pagination]\npage_size = 0\n",
    )
    .unwrap();

    let (_, stderr, success) = run_stockbot(&config_path, &["check"]);
    assert!(!success);
    assert!(stderr.contains("page_size"));
}
