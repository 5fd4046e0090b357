//! Example configuration files written when no usable configuration exists.

use crate::config::{SystemConfig, TargetConfig};

use std::path::{Path, PathBuf};

/// Sample system settings.
pub fn example_system() -> SystemConfig {
    SystemConfig {
        email_from: "monitor@example.com".to_string(),
        smtp_host: "smtp.example.com".to_string(),
        smtp_port: 25,
        smtp_login: "monitor@example.com".to_string(),
        smtp_password: "change-me".to_string(),
        send_to: vec!["ops@example.com".to_string(), "oncall@example.com".to_string()],
        digest_to: vec!["ops@example.com".to_string(), "lead@example.com".to_string()],
        timeout_secs: 10,
        skip_errors_count: 2,
        check_interval_secs: 0,
    }
}

/// Sample targets covering the substring check, a multi-line description
/// and a redirect status check.
pub fn example_targets() -> Vec<TargetConfig> {
    vec![
        TargetConfig {
            contains: "Example Domain".to_string(),
            timeout_secs: 72,
            check_interval_secs: 48 * 3600 + 5 * 60,
            skip_errors_count: Some(5),
            send_to: vec!["web@example.com".to_string()],
            digest_to: vec!["web@example.com".to_string(), "boss@example.com".to_string()],
            description: "Short description".to_string(),
            ..TargetConfig::new("http://example.com")
        },
        TargetConfig {
            contains: "Example".to_string(),
            description: "Long text description\nwith newlines\nhttp://status.example.org\n"
                .to_string(),
            ..TargetConfig::new("https://example.org")
        },
        TargetConfig {
            status_code: 301,
            description: "Check redirect code".to_string(),
            ..TargetConfig::new("http://example.net")
        },
    ]
}

/// `system.yml` becomes `system.example.yml`.
pub fn example_path(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "config".to_string());
    path.with_file_name(format!("{}.example.yml", stem))
}

/// Write example files next to the configured system and targets paths.
///
/// Returns the paths written.
pub fn write_templates(
    system_path: &Path,
    targets_path: &Path,
) -> Result<Vec<PathBuf>, Box<dyn std::error::Error + Send + Sync>> {
    let system_out = example_path(system_path);
    std::fs::write(&system_out, serde_yaml::to_string(&example_system())?)?;

    let targets_out = example_path(targets_path);
    std::fs::write(&targets_out, serde_yaml::to_string(&example_targets())?)?;

    tracing::info!(
        "Wrote configuration templates {} and {}",
        system_out.display(),
        targets_out.display()
    );

    Ok(vec![system_out, targets_out])
}
