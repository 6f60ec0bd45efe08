//! Web server command.

use console::style;

use crate::config::Settings;

const DEFAULT_PORT: u16 = 8000;

/// Start the web server.
pub async fn cmd_serve(settings: &Settings) -> anyhow::Result<()> {
    println!(
        "{} Starting Legalyzer server at http://{}",
        style("→").cyan(),
        settings.bind
    );
    println!(
        "  Uploads: {}  Exports: {}",
        settings.storage_dir.display(),
        settings.exports_dir.display()
    );
    println!(
        "  Max concurrent analyses: {}  Retention: {}h",
        settings.max_concurrent_analyses,
        settings.cache_retention.as_secs() / 3600
    );
    println!("  Press Ctrl+C to stop");

    crate::server::serve(settings).await
}

/// Normalize a bind address that can be:
/// - Just a port: "8080" -> 127.0.0.1:8080
/// - Just a host: "0.0.0.0" -> 0.0.0.0:8000
/// - Host and port: "0.0.0.0:8080" -> unchanged
pub fn normalize_bind(bind: &str) -> String {
    if let Ok(port) = bind.parse::<u16>() {
        return format!("127.0.0.1:{}", port);
    }

    if let Some((host, port_str)) = bind.rsplit_once(':') {
        if port_str.parse::<u16>().is_ok() && !host.is_empty() {
            return bind.to_string();
        }
    }

    format!("{}:{}", bind, DEFAULT_PORT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_bind() {
        assert_eq!(normalize_bind("8080"), "127.0.0.1:8080");
        assert_eq!(normalize_bind("0.0.0.0"), "0.0.0.0:8000");
        assert_eq!(normalize_bind("localhost:9000"), "localhost:9000");
    }
}
