use crate::error::{Result, ScanError};

/// Case-insensitive substring test of one keyword against a handle and a
/// display name. No normalization beyond lowercasing is applied.
pub fn matches(keyword: &str, handle: &str, display_name: &str) -> bool {
    let needle = keyword.to_lowercase();
    handle.to_lowercase().contains(&needle) || display_name.to_lowercase().contains(&needle)
}

/// The keyword set of a search, with the lowercased form of each keyword
/// computed once up front.
#[derive(Debug, Clone)]
pub struct KeywordMatcher {
    keywords: Vec<(String, String)>,
}

impl KeywordMatcher {
    pub fn new<I, S>(keywords: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keywords: Vec<(String, String)> = keywords
            .into_iter()
            .map(|k| k.as_ref().trim().to_string())
            .filter(|k| !k.is_empty())
            .map(|k| {
                let lowered = k.to_lowercase();
                (k, lowered)
            })
            .collect();

        if keywords.is_empty() {
            return Err(ScanError::InvalidConfig(
                "at least one non-blank keyword is required".to_string(),
            ));
        }

        Ok(Self { keywords })
    }

    pub fn keywords(&self) -> impl Iterator<Item = &str> {
        self.keywords.iter().map(|(original, _)| original.as_str())
    }

    pub fn len(&self) -> usize {
        self.keywords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty()
    }

    /// Keywords (in configured order) found in either field.
    pub fn matching<'a>(&'a self, handle: &str, display_name: &str) -> Vec<&'a str> {
        let handle = handle.to_lowercase();
        let display_name = display_name.to_lowercase();
        self.keywords
            .iter()
            .filter(|(_, lowered)| handle.contains(lowered) || display_name.contains(lowered))
            .map(|(original, _)| original.as_str())
            .collect()
    }
}
