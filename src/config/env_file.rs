use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

/// Set `key` in a `.env` file, replacing an existing assignment or appending a
/// new one. Every other line is kept as is. The file is created if missing.
///
/// The new content goes to a sibling file first and is renamed over the
/// original, so the file is never left half written.
pub fn update_env_file(path: &Path, key: &str, value: &str) -> std::io::Result<()> {
    let (content, permissions) = match fs::read_to_string(path) {
        Ok(content) => (content, Some(fs::metadata(path)?.permissions())),
        Err(err) if err.kind() == ErrorKind::NotFound => (String::new(), None),
        Err(err) => return Err(err),
    };

    let temp = temp_path(path);
    let written = (|| -> std::io::Result<()> {
        let mut file = fs::File::create(&temp)?;
        file.write_all(set_key(&content, key, value).as_bytes())?;
        file.sync_all()?;
        if let Some(permissions) = permissions {
            fs::set_permissions(&temp, permissions)?;
        }
        fs::rename(&temp, path)
    })();

    if written.is_err() {
        let _ = fs::remove_file(&temp);
    }
    written
}

fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| ".env".to_string());
    path.with_file_name(format!(".{name}.tmp"))
}

fn set_key(content: &str, key: &str, value: &str) -> String {
    let assignment = format!("{key}={value}");
    let prefix = format!("{key}=");

    let mut updated = false;
    let mut lines = Vec::new();
    for line in content.lines() {
        let bare = line.trim_start().strip_prefix("export ").unwrap_or(line.trim_start());
        if !updated && bare.starts_with(&prefix) {
            lines.push(assignment.clone());
            updated = true;
        } else {
            lines.push(line.to_string());
        }
    }

    if !updated {
        lines.push(assignment);
    }

    let newline = if content.contains("\r\n") { "\r\n" } else { "\n" };
    let mut output = lines.join(newline);
    output.push_str(newline);
    output
}
