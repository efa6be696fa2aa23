//! Project reference parsing.
//!
//! Accepted forms:
//! - `owner/repo`
//! - `https://github.com/owner/repo` and `http://...`, with or without `.git`
//! - `git@github.com:owner/repo`, with or without `.git`

use crate::models::ProjectId;

/// Parse a user-supplied reference into an owner/repository pair.
///
/// Returns `None` for anything that does not name exactly one repository.
pub fn parse_project_reference(reference: &str) -> Option<ProjectId> {
    let reference = reference.trim();

    let rest = reference
        .strip_prefix("git@github.com:")
        .or_else(|| reference.strip_prefix("https://github.com/"))
        .or_else(|| reference.strip_prefix("http://github.com/"));

    let path = match rest {
        Some(rest) => rest.trim_end_matches('/'),
        // Bare owner/repo, but not some other URL
        None if !reference.contains(':') => reference,
        None => return None,
    };
    let path = path.strip_suffix(".git").unwrap_or(path);

    let mut parts = path.split('/');
    let owner = parts.next()?;
    let repository = parts.next()?;
    if parts.next().is_some() || !is_valid_segment(owner) || !is_valid_segment(repository) {
        return None;
    }

    Some(ProjectId::new(owner, repository))
}

fn is_valid_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment != "."
        && segment != ".."
        && segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}
