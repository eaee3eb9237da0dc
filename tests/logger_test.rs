// tests/logger_test.rs
use release_pilot::config::LoggingConfig;
use release_pilot::logger::ReleaseLogger;
use std::fs::{self, FileTimes};
use std::path::Path;
use std::time::{Duration, SystemTime};

fn file_config(path: &Path, max_size_mb: u64, max_backups: u32, compress: bool) -> LoggingConfig {
    LoggingConfig {
        level: "debug".to_string(),
        output_path: path.display().to_string(),
        max_size_mb,
        max_backups,
        max_age_days: 7,
        compress,
    }
}

fn archives_of(dir: &Path, base: &str) -> Vec<String> {
    let prefix = format!("{}.", base);
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|name| name.starts_with(&prefix))
        .collect();
    names.sort();
    names
}

#[test]
fn test_entries_land_in_file_above_threshold_only() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("release.log");
    let mut config = file_config(&path, 100, 3, false);
    config.level = "warn".to_string();

    let logger = ReleaseLogger::new(config, "run-1").unwrap();
    logger.debug("dropped", None);
    logger.info("dropped", None);
    logger.error("disk on fire", Some("io error"), None);

    let content = fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 1);
    assert!(lines[0].contains("[ERROR]"));
    assert!(lines[0].contains("[Release:run-1]"));
    assert!(lines[0].contains("| Error: io error"));
}

#[test]
fn test_oversized_write_triggers_exactly_one_rotation() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("release.log");
    let logger = ReleaseLogger::new(file_config(&path, 1, 5, false), "run-2").unwrap();

    // Two ~600 KiB entries against a 1 MiB cap: the second write rotates
    let big = "x".repeat(600 * 1024);
    logger.info(&big, None);
    assert!(archives_of(dir.path(), "release.log").is_empty());

    logger.info(&big, None);
    let archives = archives_of(dir.path(), "release.log");
    assert_eq!(archives.len(), 1);

    // The active file holds only the entry written after rotation
    let active = fs::metadata(&path).unwrap().len();
    assert!(active > 600 * 1024);
    assert!(active < 700 * 1024);
}

#[test]
fn test_rotated_archives_are_compressed() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("release.log");
    let logger = ReleaseLogger::new(file_config(&path, 1, 5, true), "run-3").unwrap();

    let big = "x".repeat(700 * 1024);
    logger.info(&big, None);
    logger.info(&big, None);

    let archives = archives_of(dir.path(), "release.log");
    assert_eq!(archives.len(), 1);
    assert!(archives[0].ends_with(".gz"));
    // The uncompressed archive is gone
    let raw = archives[0].trim_end_matches(".gz");
    assert!(!dir.path().join(raw).exists());
}

#[test]
fn test_excess_backups_are_trimmed() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("release.log");
    let logger = ReleaseLogger::new(file_config(&path, 1, 1, false), "run-4").unwrap();

    // Every oversized entry forces its own rotation
    let huge = "x".repeat(1100 * 1024);
    for _ in 0..3 {
        logger.info(&huge, None);
        // Rotation suffix has millisecond resolution; keep names distinct
        std::thread::sleep(Duration::from_millis(5));
    }

    let archives = archives_of(dir.path(), "release.log");
    assert_eq!(archives.len(), 1);
}

#[test]
fn test_failed_rotation_does_not_end_file_logging() {
    let dir = tempfile::tempdir().unwrap();
    let logs = dir.path().join("logs");
    let path = logs.join("release.log");
    let logger = ReleaseLogger::new(file_config(&path, 1, 5, false), "run-6").unwrap();

    let big = "x".repeat(700 * 1024);
    logger.info(&big, None);

    // Pull the directory out from under the next rotation's rename
    fs::remove_dir_all(&logs).unwrap();
    logger.info(&big, None);

    // The handle was reopened (recreating the directory) and the entry landed
    let content = fs::read_to_string(&path).unwrap();
    assert!(content.contains("[Release:run-6]"));

    logger.info("after recovery", None);
    let content = fs::read_to_string(&path).unwrap();
    assert!(content.contains("after recovery"));
}

#[test]
fn test_stale_archives_are_removed_by_age() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("release.log");

    // Plant an archive and age its mtime past the 7 day cap
    let stale = dir.path().join("release.log.20200101-000000000");
    fs::write(&stale, "old data").unwrap();
    let old = SystemTime::now() - Duration::from_secs(10 * 24 * 3600);
    let file = fs::File::options().write(true).open(&stale).unwrap();
    file.set_times(FileTimes::new().set_modified(old)).unwrap();
    drop(file);

    let logger = ReleaseLogger::new(file_config(&path, 1, 5, false), "run-5").unwrap();
    let big = "x".repeat(700 * 1024);
    logger.info(&big, None);
    logger.info(&big, None);

    assert!(!stale.exists());
    // The fresh rotation's archive survived
    assert_eq!(archives_of(dir.path(), "release.log").len(), 1);
}
