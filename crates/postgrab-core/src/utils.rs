use std::{
    path::Path,
    sync::atomic::{AtomicUsize, Ordering},
    time::Duration,
};

use chrono::Utc;

static FILE_COUNTER: AtomicUsize = AtomicUsize::new(1);

// ============== Human-readable formatting ==============

/// `1536` -> `"1.50 KiB"`.
pub fn human_bytes(bytes: u64) -> String {
    const UNITS: [&str; 6] = ["B", "KiB", "MiB", "GiB", "TiB", "PiB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64;
    let mut unit = 0usize;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.2} {}", UNITS[unit])
}

pub fn human_duration(d: Duration) -> String {
    let seconds = d.as_secs();
    let hours = seconds / 3600;
    let mins = (seconds % 3600) / 60;
    let secs = seconds % 60;
    if hours > 0 {
        return format!("{hours}h {mins}m {secs}s");
    }
    if mins > 0 {
        return format!("{mins}m {secs}s");
    }
    format!("{secs}s")
}

// ============== File names ==============

fn sanitize_filename(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() || matches!(ch, '.' | '_' | '-') {
            out.push(ch);
        } else {
            out.push('_');
        }
    }
    out.trim_matches('.').to_string()
}

/// Unique local file name: `<stem>_<ts>_<n>.<ext>`.
///
/// `preferred` is the remote file name when known; its extension wins over
/// `fallback_ext`.
pub fn unique_file_name(stem: &str, preferred: Option<&str>, fallback_ext: &str) -> String {
    let ts = Utc::now().timestamp_millis();
    let n = FILE_COUNTER.fetch_add(1, Ordering::SeqCst);

    let ext = preferred
        .map(sanitize_filename)
        .and_then(|name| {
            Path::new(&name)
                .extension()
                .map(|e| e.to_string_lossy().to_string())
        })
        .filter(|e| !e.is_empty())
        .unwrap_or_else(|| fallback_ext.to_string());

    let stem = sanitize_filename(stem);
    let stem = if stem.is_empty() { "item".to_string() } else { stem };
    format!("{stem}_{ts}_{n}.{ext}")
}
