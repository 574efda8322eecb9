//! Resource naming.
//!
//! Instance and disk names in a workflow definition are workflow-local. The
//! resource that actually exists in the project is named
//! `{name}-{workflow}-{suffix}`, truncated to fit compute name limits.

/// Longest `{name}-{workflow}` prefix kept before the suffix is appended.
const MAX_PREFIX_LEN: usize = 57;

/// Compute resource names are limited to 63 characters.
const MAX_NAME_LEN: usize = 63;

const SUFFIX_LEN: usize = 5;

/// Resolve a workflow-local name to the name of the real resource.
pub fn resolve_name(name: &str, workflow: &str, suffix: &str) -> String {
  // Lowercasing can lengthen a string, so it happens before truncation.
  let mut prefix = format!("{}-{}", name, workflow).to_lowercase();
  truncate(&mut prefix, MAX_PREFIX_LEN);

  let mut resolved = format!("{}-{}", prefix, suffix.to_lowercase());
  truncate(&mut resolved, MAX_NAME_LEN);
  resolved
}

/// Generate a per-run suffix: five lowercase alphanumeric characters.
pub fn random_suffix() -> String {
  uuid::Uuid::new_v4()
    .simple()
    .to_string()
    .chars()
    .take(SUFFIX_LEN)
    .collect()
}

fn truncate(s: &mut String, max: usize) {
  if s.len() <= max {
    return;
  }
  let mut end = max;
  while !s.is_char_boundary(end) {
    end -= 1;
  }
  s.truncate(end);
}
