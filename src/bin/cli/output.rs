//! Output formatting for CLI operations.

use serde_json::json;
use zipup::{EditResult, FormatKind, PasswordState, SearchHit, Timestamp, VirtualFolderView};

/// Summary printed by `zipup info`
pub struct ArchiveInfo {
    pub path: String,
    pub format: FormatKind,
    pub obfuscated: bool,
    pub entry_count: usize,
    pub directory_count: usize,
    pub total_size: u64,
    pub archive_size: u64,
    pub password: PasswordState,
    pub comment: String,
}

/// Trait for output formatting
pub trait OutputFormatter {
    /// Formats one virtual folder
    fn format_view(&self, view: &VirtualFolderView) -> String;

    /// Formats search results
    fn format_search(&self, hits: &[SearchHit]) -> String;

    /// Formats archive information
    fn format_info(&self, info: &ArchiveInfo) -> String;

    /// Formats the outcome of a mutation
    fn format_edit_result(&self, action: &str, result: &EditResult) -> String;

    /// Formats an extraction count
    fn format_extract_result(&self, count: usize, dest: &str) -> String;

    /// Formats the archive comment
    fn format_comment(&self, comment: &str) -> String;
}

/// Human-readable output formatter
pub struct HumanFormatter;

impl OutputFormatter for HumanFormatter {
    fn format_view(&self, view: &VirtualFolderView) -> String {
        let mut output = String::new();
        let location = if view.is_root() {
            "/"
        } else {
            view.current_prefix.as_str()
        };
        output.push_str(&format!("Folder: {location}\n"));
        output.push_str(&format!("{:>12} {:>19} {}\n", "Size", "Modified", "Name"));
        output.push_str(&"-".repeat(70));
        output.push('\n');

        for row in &view.rows {
            output.push_str(&format!(
                "{:>12} {:>19} {}\n",
                row.size_label,
                format_modified(row.modified),
                row.display_name
            ));
        }

        output.push_str(&"-".repeat(70));
        output.push('\n');
        output.push_str(&format!(
            "{} folders, {} files\n",
            view.folders().count(),
            view.files().count()
        ));
        output
    }

    fn format_search(&self, hits: &[SearchHit]) -> String {
        if hits.is_empty() {
            return "No matching entries\n".to_string();
        }
        let mut output = String::new();
        for hit in hits {
            output.push_str(&format!(
                "{:>12} {:>19} {}\n",
                zipup::format_size(hit.size),
                format_modified(hit.modified),
                hit.display_name
            ));
        }
        output.push_str(&format!("{} matches\n", hits.len()));
        output
    }

    fn format_info(&self, info: &ArchiveInfo) -> String {
        let mut output = String::new();

        output.push_str("Archive Information:\n");
        output.push_str(&"-".repeat(40));
        output.push('\n');
        output.push_str(&format!("  Path:           {}\n", info.path));
        output.push_str(&format!(
            "  Format:         {}{}\n",
            info.format,
            if info.obfuscated { " (obfuscated)" } else { "" }
        ));
        output.push_str(&format!("  Entries:        {}\n", info.entry_count));
        output.push_str(&format!("  Folders:        {}\n", info.directory_count));
        output.push_str(&format!(
            "  Total size:     {}\n",
            zipup::format_size(info.total_size)
        ));
        output.push_str(&format!(
            "  Archive size:   {}\n",
            zipup::format_size(info.archive_size)
        ));
        if info.password.has_password {
            output.push_str(&format!("  Encrypted:      Yes ({})\n", info.password.scheme));
        } else {
            output.push_str("  Encrypted:      No\n");
        }
        if !info.comment.is_empty() {
            output.push_str(&format!("  Comment:        {}\n", info.comment));
        }

        output
    }

    fn format_edit_result(&self, action: &str, result: &EditResult) -> String {
        let mut output = format!("{action}: ");
        let mut parts = Vec::new();
        if result.entries_added > 0 {
            parts.push(format!("{} added", result.entries_added));
        }
        if result.entries_deleted > 0 {
            parts.push(format!("{} deleted", result.entries_deleted));
        }
        if result.entries_renamed > 0 {
            parts.push(format!("{} renamed", result.entries_renamed));
        }
        parts.push(format!("{} entries total", result.total_entries()));
        output.push_str(&parts.join(", "));
        output.push('\n');
        for warning in &result.warnings {
            output.push_str(&format!("warning: {warning}\n"));
        }
        output
    }

    fn format_extract_result(&self, count: usize, dest: &str) -> String {
        format!("Extracted {count} entries to {dest}\n")
    }

    fn format_comment(&self, comment: &str) -> String {
        if comment.is_empty() {
            "(no comment)\n".to_string()
        } else {
            format!("{comment}\n")
        }
    }
}

/// JSON output formatter
pub struct JsonFormatter;

impl OutputFormatter for JsonFormatter {
    fn format_view(&self, view: &VirtualFolderView) -> String {
        let rows: Vec<_> = view
            .rows
            .iter()
            .map(|r| {
                json!({
                    "name": r.display_name,
                    "size": r.size,
                    "modified": r.modified.map(|t| t.as_unix_secs()),
                    "is_directory": r.is_directory,
                })
            })
            .collect();
        let obj = json!({
            "prefix": view.current_prefix,
            "rows": rows,
        });

        serde_json::to_string_pretty(&obj).unwrap_or_else(|_| "{}".to_string())
    }

    fn format_search(&self, hits: &[SearchHit]) -> String {
        let items: Vec<_> = hits
            .iter()
            .map(|h| {
                json!({
                    "path": h.path,
                    "name": h.display_name,
                    "size": h.size,
                    "modified": h.modified.map(|t| t.as_unix_secs()),
                })
            })
            .collect();

        serde_json::to_string_pretty(&items).unwrap_or_else(|_| "[]".to_string())
    }

    fn format_info(&self, info: &ArchiveInfo) -> String {
        let obj = json!({
            "path": info.path,
            "format": info.format.name(),
            "obfuscated": info.obfuscated,
            "entry_count": info.entry_count,
            "directory_count": info.directory_count,
            "total_size": info.total_size,
            "archive_size": info.archive_size,
            "has_password": info.password.has_password,
            "cipher_scheme": info.password.scheme.name(),
            "comment": info.comment,
        });

        serde_json::to_string_pretty(&obj).unwrap_or_else(|_| "{}".to_string())
    }

    fn format_edit_result(&self, action: &str, result: &EditResult) -> String {
        let obj = json!({
            "action": action,
            "entries_kept": result.entries_kept,
            "entries_added": result.entries_added,
            "entries_deleted": result.entries_deleted,
            "entries_renamed": result.entries_renamed,
            "total_bytes": result.total_bytes,
            "archive_bytes": result.archive_bytes,
            "warnings": result.warnings,
        });

        serde_json::to_string_pretty(&obj).unwrap_or_else(|_| "{}".to_string())
    }

    fn format_extract_result(&self, count: usize, dest: &str) -> String {
        let obj = json!({
            "entries_extracted": count,
            "destination": dest,
        });

        serde_json::to_string_pretty(&obj).unwrap_or_else(|_| "{}".to_string())
    }

    fn format_comment(&self, comment: &str) -> String {
        json!({ "comment": comment }).to_string()
    }
}

/// Creates the appropriate formatter based on output format
pub fn create_formatter(format: super::OutputFormat) -> Box<dyn OutputFormatter> {
    match format {
        super::OutputFormat::Human => Box::new(HumanFormatter),
        super::OutputFormat::Json => Box::new(JsonFormatter),
    }
}

fn format_modified(modified: Option<Timestamp>) -> String {
    modified
        .map(|t| t.to_string())
        .unwrap_or_else(|| "-".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use zipup::{DirectoryProjector, Entry};

    fn view() -> VirtualFolderView {
        let entries = [Entry {
            path: "docs/a.txt".to_string(),
            is_directory: false,
            size: 2048,
            modified: Some(Timestamp::from_unix_secs(0)),
            is_encrypted: false,
        }];
        DirectoryProjector::project(&entries, "docs/")
    }

    #[test]
    fn test_human_view() {
        let text = HumanFormatter.format_view(&view());
        assert!(text.contains("Folder: docs/"));
        assert!(text.contains("2.0 KB"));
        assert!(text.contains("1970-01-01 00:00:00 a.txt"));
        assert!(text.contains("0 folders, 1 files"));
    }

    #[test]
    fn test_json_view() {
        let text = JsonFormatter.format_view(&view());
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["prefix"], "docs/");
        assert_eq!(value["rows"][0]["name"], "..");
        assert_eq!(value["rows"][1]["size"], 2048);
    }
}
