//! Incremental generation of derived text artifacts.
//!
//! Two artifacts are produced per build: a version module derived from
//! the `VERSION` file plus a best-effort source-control revision lookup,
//! and a configuration module derived from the project's property source.
//! Both are regenerated only when stale, and written atomically so a
//! crash mid-write never leaves a truncated file.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::error::{Error, Result};
use crate::layout::Layout;
use crate::util::fs::write_atomic;

/// Marker comment prefixed to every generated artifact.
pub const GENERATED_MARKER: &str = "# generated by gantry";

fn mtime(path: &Path) -> std::io::Result<SystemTime> {
    fs::metadata(path)?.modified()
}

/// Staleness rule: regenerate iff the target is missing or some
/// prerequisite's modification time strictly exceeds the target's.
/// Any stat failure counts as stale.
fn must_generate(target: &Path, prerequisites: &[PathBuf]) -> bool {
    let target_mtime = match mtime(target) {
        Ok(t) => t,
        Err(_) => return true,
    };
    for prereq in prerequisites {
        match mtime(prereq) {
            Ok(t) if t > target_mtime => return true,
            Ok(_) => {}
            Err(_) => return true,
        }
    }
    false
}

/// Regenerate `target` from `prerequisites` when stale.
///
/// Returns whether `produce` ran. `produce` must write the target itself;
/// generation is expected to be deterministic given identical
/// prerequisite contents.
pub fn ensure<F>(target: &Path, prerequisites: &[PathBuf], produce: F) -> Result<bool>
where
    F: FnOnce() -> Result<()>,
{
    if !must_generate(target, prerequisites) {
        tracing::debug!("{} is up to date", target.display());
        return Ok(false);
    }
    tracing::info!("generating {}", target.display());
    produce()?;
    Ok(true)
}

/// Parse a `key=value` property source.
///
/// Blank lines and `#`/`!` comments are skipped; `:` is accepted as a
/// separator; keys and values are trimmed.
pub fn parse_properties(contents: &str) -> BTreeMap<String, String> {
    let mut props = BTreeMap::new();
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
            continue;
        }
        let (key, value) = match line.split_once(['=', ':']) {
            Some((k, v)) => (k.trim(), v.trim()),
            None => (line, ""),
        };
        if !key.is_empty() {
            props.insert(key.to_string(), value.to_string());
        }
    }
    props
}

/// Render a string as an unambiguous single-quoted literal.
fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            _ => out.push(c),
        }
    }
    out.push('\'');
    out
}

fn read_prerequisite(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|source| Error::MissingPrerequisite {
        path: path.to_path_buf(),
        source,
    })
}

/// Best-effort source-control revision lookup.
///
/// A cached revision file takes precedence, so trees exported without
/// repository metadata still carry the revision they were cut from.
/// Failure is tolerated and renders as the absent sentinel.
fn lookup_revision(layout: &Layout) -> Option<String> {
    let cache = layout.revision_cache();
    if let Ok(cached) = fs::read_to_string(&cache) {
        let cached = cached.trim();
        if !cached.is_empty() {
            return Some(cached.to_string());
        }
    }

    match git2::Repository::discover(layout.root()) {
        Ok(repo) => match repo.head().and_then(|h| h.peel_to_commit()) {
            Ok(commit) => Some(commit.id().to_string()),
            Err(err) => {
                tracing::debug!("revision lookup failed: {err}");
                None
            }
        },
        Err(err) => {
            tracing::debug!("no repository found: {err}");
            None
        }
    }
}

/// Regenerate the version artifact when `VERSION` is newer.
///
/// The artifact carries the literal version string and either the
/// revision literal or the explicit `None` sentinel; revision lookup
/// failure never fails generation.
pub fn write_version(layout: &Layout) -> Result<bool> {
    let target = layout.version_artifact();
    let prereq = layout.version_file();

    ensure(&target, std::slice::from_ref(&prereq), || {
        let version = read_prerequisite(&prereq)?;
        let version = version.trim();
        let revision = match lookup_revision(layout) {
            Some(rev) => quote(&rev),
            None => "None".to_string(),
        };
        let contents = format!(
            "{GENERATED_MARKER}\nversion = {}\nrevision = {revision}\n",
            quote(version)
        );
        write_atomic(&target, &contents)?;
        Ok(())
    })
}

/// Regenerate the configuration artifact when the property source is
/// newer.
///
/// Keys are emitted in sorted order, one assignment per line, so the
/// output is byte-reproducible and diffs stay stable.
pub fn write_config(layout: &Layout) -> Result<bool> {
    let target = layout.config_artifact();
    let prereq = layout.properties_file();

    ensure(&target, std::slice::from_ref(&prereq), || {
        let props = parse_properties(&read_prerequisite(&prereq)?);
        let mut contents = String::from(GENERATED_MARKER);
        contents.push('\n');
        for (key, value) in &props {
            contents.push_str(&format!("{key} = {}\n", quote(value)));
        }
        write_atomic(&target, &contents)?;
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    fn backdate(path: &Path, secs: u64) {
        let file = fs::File::options().write(true).open(path).unwrap();
        file.set_modified(SystemTime::now() - Duration::from_secs(secs))
            .unwrap();
    }

    fn project(version: &str, properties: &str) -> (TempDir, Layout) {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("VERSION"), version).unwrap();
        fs::write(tmp.path().join("bridge.properties"), properties).unwrap();
        let layout = Layout::discover(tmp.path()).unwrap();
        (tmp, layout)
    }

    fn unquote(literal: &str) -> String {
        let inner = literal
            .strip_prefix('\'')
            .and_then(|s| s.strip_suffix('\''))
            .unwrap();
        inner.replace("\\'", "'").replace("\\\\", "\\")
    }

    #[test]
    fn test_ensure_regenerates_only_when_stale() {
        let tmp = TempDir::new().unwrap();
        let prereq = tmp.path().join("input");
        let target = tmp.path().join("output");
        fs::write(&prereq, "data").unwrap();

        let prereqs = vec![prereq.clone()];

        // Missing target: generate
        let ran = ensure(&target, &prereqs, || {
            fs::write(&target, "gen").unwrap();
            Ok(())
        })
        .unwrap();
        assert!(ran);

        // Fresh target: no-op
        let ran = ensure(&target, &prereqs, || panic!("should not regenerate")).unwrap();
        assert!(!ran);

        // Stale target: generate again
        backdate(&target, 60);
        let ran = ensure(&target, &prereqs, || Ok(())).unwrap();
        assert!(ran);
    }

    #[test]
    fn test_ensure_treats_unreadable_prerequisite_as_stale() {
        let tmp = TempDir::new().unwrap();
        let target = tmp.path().join("output");
        fs::write(&target, "gen").unwrap();

        let ran = ensure(&target, &[tmp.path().join("absent")], || Ok(())).unwrap();
        assert!(ran);
    }

    #[test]
    fn test_write_version_without_repository_uses_sentinel() {
        let (_tmp, layout) = project("1.2.0\n", "");

        assert!(write_version(&layout).unwrap());
        let contents = fs::read_to_string(layout.version_artifact()).unwrap();

        assert!(contents.starts_with(GENERATED_MARKER));
        assert!(contents.contains("version = '1.2.0'"));
        assert!(contents.contains("revision = None"));
    }

    #[test]
    fn test_write_version_prefers_cached_revision() {
        let (tmp, layout) = project("1.2.0\n", "");
        fs::write(tmp.path().join(".revision"), "abc123\n").unwrap();

        write_version(&layout).unwrap();
        let contents = fs::read_to_string(layout.version_artifact()).unwrap();
        assert!(contents.contains("revision = 'abc123'"));
    }

    #[test]
    fn test_write_version_missing_version_file_is_fatal() {
        let (tmp, layout) = project("1.2.0\n", "");
        fs::remove_file(tmp.path().join("VERSION")).unwrap();

        let err = write_version(&layout).unwrap_err();
        assert!(matches!(err, Error::MissingPrerequisite { .. }));
    }

    #[test]
    fn test_write_config_sorts_keys_and_round_trips() {
        let props = "zeta = last\nalpha=first\n# comment\n\nmid: it's quoted\n";
        let (_tmp, layout) = project("1.0\n", props);

        assert!(write_config(&layout).unwrap());
        let contents = fs::read_to_string(layout.config_artifact()).unwrap();

        let mut lines = contents.lines();
        assert_eq!(lines.next(), Some(GENERATED_MARKER));

        // Keys in sorted order
        let keys: Vec<&str> = contents
            .lines()
            .skip(1)
            .map(|l| l.split(" = ").next().unwrap())
            .collect();
        assert_eq!(keys, vec!["alpha", "mid", "zeta"]);

        // Parsing the emitted assignments reconstructs the mapping
        let mut reparsed = BTreeMap::new();
        for line in contents.lines().skip(1) {
            let (key, literal) = line.split_once(" = ").unwrap();
            reparsed.insert(key.to_string(), unquote(literal));
        }
        assert_eq!(reparsed, parse_properties(props));
        assert_eq!(reparsed["mid"], "it's quoted");
    }

    #[test]
    fn test_write_config_is_idempotent() {
        let (_tmp, layout) = project("1.0\n", "a=1\n");

        assert!(write_config(&layout).unwrap());
        let first = fs::read_to_string(layout.config_artifact()).unwrap();

        // Unchanged prerequisites: exactly one generation, then a no-op
        assert!(!write_config(&layout).unwrap());
        assert_eq!(fs::read_to_string(layout.config_artifact()).unwrap(), first);
    }
}
