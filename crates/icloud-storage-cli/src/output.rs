use icloud_storage_core::domain::{ChannelEvent, FileEntry};

/// Output format selector
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutputFormat {
    Human,
    Json,
}

/// Trait for formatting CLI output
pub trait OutputFormatter {
    fn success(&self, message: &str);
    fn error(&self, message: &str);
    fn info(&self, message: &str);
    fn listing(&self, files: &[FileEntry]);
    fn event(&self, event: &ChannelEvent);
}

/// Human-readable output formatter with checkmarks and indentation
pub struct HumanFormatter;

impl OutputFormatter for HumanFormatter {
    fn success(&self, message: &str) {
        println!("\u{2713} {}", message);
    }
    fn error(&self, message: &str) {
        eprintln!("\u{2717} Error: {}", message);
    }
    fn info(&self, message: &str) {
        println!("  {}", message);
    }
    fn listing(&self, files: &[FileEntry]) {
        if files.is_empty() {
            println!("  (no files)");
        }
        for file in files {
            println!("  {}", describe(file));
        }
    }
    fn event(&self, event: &ChannelEvent) {
        match event {
            ChannelEvent::Progress(p) => println!("  {:>5.1}%", p.percent()),
            ChannelEvent::Listing(files) => {
                println!("  listing changed ({} files)", files.len());
                self.listing(files);
            }
            ChannelEvent::Error(e) => self.error(&e.to_string()),
            ChannelEvent::EndOfStream => self.success("Done"),
        }
    }
}

/// JSON output formatter, one document per line
pub struct JsonFormatter;

impl OutputFormatter for JsonFormatter {
    fn success(&self, message: &str) {
        println!(
            "{}",
            serde_json::json!({"success": true, "message": message})
        );
    }
    fn error(&self, message: &str) {
        eprintln!(
            "{}",
            serde_json::json!({"success": false, "error": message})
        );
    }
    fn info(&self, _message: &str) {}
    fn listing(&self, files: &[FileEntry]) {
        println!("{}", serde_json::json!({ "files": files }));
    }
    fn event(&self, event: &ChannelEvent) {
        println!("{}", event.to_json());
    }
}

pub fn get_formatter(format: OutputFormat) -> Box<dyn OutputFormatter> {
    match format {
        OutputFormat::Json => Box::new(JsonFormatter),
        OutputFormat::Human => Box::new(HumanFormatter),
    }
}

/// One-line summary of a file entry
pub fn describe(file: &FileEntry) -> String {
    let size = file
        .size_in_bytes
        .map(format_bytes)
        .unwrap_or_else(|| "-".to_string());
    let mut flags = vec![file.download_status.to_string()];
    if file.is_uploading {
        flags.push("uploading".into());
    }
    if file.is_downloading {
        flags.push("downloading".into());
    }
    if file.has_unresolved_conflicts {
        flags.push("conflict".into());
    }
    format!("{:<40} {:>10}  [{}]", file.relative_path, size, flags.join(", "))
}

/// Format byte count as human-readable string
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

#[cfg(test)]
mod tests {
    use icloud_storage_core::domain::DownloadStatus;

    use super::*;

    fn entry(path: &str) -> FileEntry {
        FileEntry {
            relative_path: path.to_string(),
            size_in_bytes: Some(2048),
            creation_time: None,
            content_change_time: None,
            has_unresolved_conflicts: false,
            download_status: DownloadStatus::Current,
            is_downloading: false,
            is_uploaded: true,
            is_uploading: false,
        }
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(1023), "1023 B");
        assert_eq!(format_bytes(2048), "2.00 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.00 MB");
    }

    #[test]
    fn test_describe_lists_status_flags() {
        let mut file = entry("docs/a.txt");
        file.is_uploading = true;
        file.has_unresolved_conflicts = true;

        let line = describe(&file);
        assert!(line.starts_with("docs/a.txt"));
        assert!(line.contains("2.00 KB"));
        assert!(line.contains("[current, uploading, conflict]"));
    }

    #[test]
    fn test_describe_without_size() {
        let mut file = entry("a.txt");
        file.size_in_bytes = None;
        assert!(describe(&file).contains(" - "));
    }
}
