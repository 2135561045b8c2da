//! Repository URL normalization and registry keys

use crate::error::ValidationError;

/// Canonical form used to recognise equivalent repository URLs.
///
/// Ignores surrounding whitespace, path separator style, trailing slashes, a
/// trailing `.git` and case.
pub fn normalize_url(url: &str) -> Result<String, ValidationError> {
    let mut normalized = url.trim().replace('\\', "/").to_lowercase();

    loop {
        let before = normalized.len();
        while normalized.ends_with('/') {
            normalized.pop();
        }
        if let Some(stripped) = normalized.strip_suffix(".git") {
            normalized = stripped.to_string();
        }
        if normalized.len() == before {
            break;
        }
    }

    if normalized.is_empty() {
        return Err(ValidationError::Empty("repository URL".to_string()));
    }
    Ok(normalized)
}

/// Identity of one indexable unit: a normalized URL plus a branch
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepoKey {
    pub url: String,
    pub branch: String,
}

impl RepoKey {
    pub fn new(url: &str, branch: &str) -> Result<Self, ValidationError> {
        let branch = branch.trim();
        if branch.is_empty() {
            return Err(ValidationError::Empty("branch".to_string()));
        }
        Ok(Self {
            url: normalize_url(url)?,
            branch: branch.to_string(),
        })
    }
}

impl std::fmt::Display for RepoKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.url, self.branch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equivalent_urls_normalize_equal() {
        let expected = "https://github.com/acme/payments";
        for url in [
            "https://github.com/acme/payments",
            "https://github.com/acme/payments/",
            "https://github.com/acme/payments.git",
            "https://github.com/acme/payments.git/",
            "HTTPS://GitHub.com/Acme/Payments",
            "  https://github.com/acme/payments//  ",
            "https:\\\\github.com\\acme\\payments",
        ] {
            assert_eq!(normalize_url(url).unwrap(), expected, "input {:?}", url);
        }
    }

    #[test]
    fn test_git_inside_name_kept() {
        assert_eq!(
            normalize_url("https://host/acme/gitops").unwrap(),
            "https://host/acme/gitops"
        );
        assert_eq!(
            normalize_url("https://host/acme/repo.github").unwrap(),
            "https://host/acme/repo.github"
        );
    }

    #[test]
    fn test_empty_url_rejected() {
        assert!(normalize_url("").is_err());
        assert!(normalize_url("   ").is_err());
        assert!(normalize_url("/").is_err());
    }

    #[test]
    fn test_repo_key() {
        let a = RepoKey::new("https://x/y.git", "main").unwrap();
        let b = RepoKey::new("https://X/Y/", " main ").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "https://x/y#main");

        let dev = RepoKey::new("https://x/y", "dev").unwrap();
        assert_ne!(a, dev);

        assert!(matches!(
            RepoKey::new("https://x/y", ""),
            Err(ValidationError::Empty(_))
        ));
    }
}
