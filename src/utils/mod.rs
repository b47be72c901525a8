use anyhow::Result;
use url::Url;

use crate::command::ToolChoice;

/// Check that a string is an absolute http(s) URL
pub fn validate_url(url: &str) -> Result<Url> {
    let parsed = Url::parse(url)
        .map_err(|_| anyhow::anyhow!("Invalid URL format: {}", url))?;

    if !matches!(parsed.scheme(), "http" | "https") {
        anyhow::bail!("URL must use HTTP or HTTPS protocol");
    }

    Ok(parsed)
}

/// Format file size in human-readable format
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    const THRESHOLD: f64 = 1024.0;

    if bytes == 0 {
        return "0 B".to_string();
    }

    let bytes_f = bytes as f64;
    let unit_index = (bytes_f.log10() / THRESHOLD.log10()).floor() as usize;
    let unit_index = unit_index.min(UNITS.len() - 1);

    let size = bytes_f / THRESHOLD.powi(unit_index as i32);

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.1} {}", size, UNITS[unit_index])
    }
}

/// Extract domain from URL for display purposes
pub fn extract_domain(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()?
        .host_str()
        .map(|host| host.strip_prefix("www.").unwrap_or(host).to_string())
}

/// Base name for a transcript: the detected display name, else "transcript"
pub fn default_transcript_name(display_name: Option<&str>) -> String {
    display_name
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(|name| name.strip_suffix(".vtt").unwrap_or(name).to_string())
        .unwrap_or_else(|| "transcript".to_string())
}

/// Check whether the selected download tool is on PATH
pub async fn check_tool_available(tool: ToolChoice) -> bool {
    check_command_available(tool.binary()).await
}

/// Check if a command is available in PATH
async fn check_command_available(command: &str) -> bool {
    use tokio::process::Command;

    Command::new(command)
        .arg("--version")
        .output()
        .await
        .map(|output| output.status.success())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_file_size() {
        assert_eq!(format_file_size(0), "0 B");
        assert_eq!(format_file_size(512), "512 B");
        assert_eq!(format_file_size(1024), "1.0 KB");
        assert_eq!(format_file_size(1536), "1.5 KB");
    }

    #[test]
    fn test_extract_domain() {
        assert_eq!(
            extract_domain("https://contoso-my.sharepoint.com/personal/ada"),
            Some("contoso-my.sharepoint.com".to_string())
        );
        assert_eq!(extract_domain("https://www.example.com/x"), Some("example.com".to_string()));
        assert_eq!(extract_domain("invalid-url"), None);
    }

    #[test]
    fn test_validate_url() {
        assert!(validate_url("https://example.com").is_ok());
        assert!(validate_url("ftp://example.com").is_err());
        assert!(validate_url("not-a-url").is_err());
    }

    #[test]
    fn test_default_transcript_name() {
        assert_eq!(default_transcript_name(Some("Weekly Sync.vtt")), "Weekly Sync");
        assert_eq!(default_transcript_name(Some("  ")), "transcript");
        assert_eq!(default_transcript_name(None), "transcript");
    }

    #[tokio::test]
    async fn test_missing_command_is_unavailable() {
        assert!(!check_command_available("tgrab-definitely-not-installed").await);
    }
}
