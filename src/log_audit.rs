// Log audit: scans every Rust source file for tracing calls that mention
// share secrets, client identifiers or record contents. Only opaque ids
// (token id, patient id) may reach the logs.

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;

    /// Fragments that MUST NOT appear in tracing macro arguments.
    const FORBIDDEN_PATTERNS: &[&str] = &[
        // Share secrets
        "raw_token",
        "token_hash",
        "issued.token",
        "share_url",
        "qr_svg",
        // Client identifiers, raw or hashed
        "user_agent",
        "ip_addr",
        "client.ip",
        "ip_hash",
        "X-Forwarded-For",
        // Record contents
        "record.title",
        "record.summary",
        "records[",
        "title =",
        "summary =",
    ];

    /// Files allowed to contain the patterns in tracing-looking text.
    const ALLOWLIST: &[&str] = &["log_audit.rs"];

    #[test]
    fn no_secrets_in_tracing_calls() {
        let src_dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("src");
        assert!(src_dir.exists(), "Source directory not found: {}", src_dir.display());

        let mut violations = Vec::new();
        scan_directory(&src_dir, &mut violations);

        if !violations.is_empty() {
            let report = violations
                .iter()
                .map(|(file, line_num, line, pattern)| {
                    format!("  {}:{}: found '{}' in: {}", file, line_num, pattern, line.trim())
                })
                .collect::<Vec<_>>()
                .join("\n");
            panic!(
                "LOG AUDIT FAILED: {} violation(s) found in tracing calls:\n{}\n\n\
                 Fix: log opaque ids only.",
                violations.len(),
                report
            );
        }
    }

    #[test]
    fn scanner_detects_known_violation() {
        let line = r#"tracing::info!(token = %issued.raw_token, "issued");"#;
        assert!(FORBIDDEN_PATTERNS.iter().any(|p| line.contains(p)));
    }

    #[test]
    fn scanner_passes_clean_tracing() {
        let line = r#"tracing::info!(token_id = %record.id, revoked, "Share token issued");"#;
        assert!(!FORBIDDEN_PATTERNS.iter().any(|p| line.contains(p)));
    }

    #[test]
    fn multi_line_calls_are_collected() {
        let source = "fn f() {\n    tracing::warn!(\n        agent = %client.user_agent,\n        \"seen\"\n    );\n}\n";
        let calls = tracing_calls(source);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, 2);
        assert!(calls[0].1.contains("user_agent"));
    }

    fn scan_directory(dir: &Path, violations: &mut Vec<(String, usize, String, String)>) {
        let entries = match fs::read_dir(dir) {
            Ok(e) => e,
            Err(_) => return,
        };

        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                scan_directory(&path, violations);
            } else if path.extension().is_some_and(|ext| ext == "rs") {
                scan_file(&path, violations);
            }
        }
    }

    fn scan_file(path: &Path, violations: &mut Vec<(String, usize, String, String)>) {
        let filename = path.file_name().unwrap_or_default().to_string_lossy();
        if ALLOWLIST.iter().any(|a| filename.contains(a)) {
            return;
        }

        let content = match fs::read_to_string(path) {
            Ok(c) => c,
            Err(_) => return,
        };

        let relative_path = path
            .strip_prefix(Path::new(env!("CARGO_MANIFEST_DIR")).join("src"))
            .unwrap_or(path)
            .display()
            .to_string();

        for (line_num, call) in tracing_calls(&content) {
            for pattern in FORBIDDEN_PATTERNS {
                if call.contains(pattern) {
                    violations.push((
                        relative_path.clone(),
                        line_num,
                        call.clone(),
                        pattern.to_string(),
                    ));
                }
            }
        }
    }

    /// Full text of every tracing macro call, with its 1-indexed start line.
    fn tracing_calls(content: &str) -> Vec<(usize, String)> {
        let lines: Vec<&str> = content.lines().collect();
        let mut calls = Vec::new();
        let mut i = 0;
        while i < lines.len() {
            let trimmed = lines[i].trim();
            let is_tracing = ["info!", "warn!", "error!", "debug!", "trace!"]
                .iter()
                .any(|m| trimmed.starts_with(&format!("tracing::{m}")));
            if !is_tracing {
                i += 1;
                continue;
            }

            let mut call = String::from(trimmed);
            let mut depth = paren_delta(trimmed);
            let mut j = i + 1;
            while depth > 0 && j < lines.len() {
                let next = lines[j].trim();
                call.push(' ');
                call.push_str(next);
                depth += paren_delta(next);
                j += 1;
            }

            calls.push((i + 1, call));
            i = j;
        }
        calls
    }

    fn paren_delta(text: &str) -> i32 {
        text.chars().fold(0, |depth, ch| match ch {
            '(' => depth + 1,
            ')' => depth - 1,
            _ => depth,
        })
    }
}
