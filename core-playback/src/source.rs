//! Source URL helpers and the per-source bookkeeping of the adapter.

use bridge_traits::SourceId;
use url::{ParseError, Position, Url};

const FALLBACK_EXTENSIONS: [&str; 2] = [".mp4", ".mov"];

/// Stand-in origin for relative source URLs; stripped again on output.
const RELATIVE_BASE: &str = "http://relative.invalid/";

/// A source URL, absolute or relative to the page.
struct SourceUrl {
    url: Url,
    relative: bool,
}

impl SourceUrl {
    fn parse(raw: &str) -> Option<Self> {
        match Url::parse(raw) {
            Ok(url) => Some(Self {
                url,
                relative: false,
            }),
            Err(ParseError::RelativeUrlWithoutBase) => {
                let base = Url::parse(RELATIVE_BASE).ok()?;
                let url = Url::options().base_url(Some(&base)).parse(raw).ok()?;
                Some(Self {
                    url,
                    relative: true,
                })
            }
            Err(_) => None,
        }
    }

    /// The path with the fallback extension of its last segment removed.
    fn fallback_stem(&self) -> Option<&str> {
        let path = self.url.path();
        let file = self.url.path_segments()?.next_back()?;
        let split = path.len().checked_sub(4)?;
        if file.len() < 4 || !path.is_char_boundary(split) {
            return None;
        }
        let (stem, extension) = path.split_at(split);
        FALLBACK_EXTENSIONS
            .iter()
            .any(|candidate| extension.eq_ignore_ascii_case(candidate))
            .then_some(stem)
    }

    fn into_string(self) -> String {
        if self.relative {
            self.url[Position::BeforePath..].to_string()
        } else {
            self.url.into()
        }
    }
}

/// Returns `true` for `.mp4`/`.mov` URLs, which may have a `.webm` sibling.
pub fn is_fallback_candidate(url: &str) -> bool {
    SourceUrl::parse(url).is_some_and(|parsed| parsed.fallback_stem().is_some())
}

/// The `.webm` sibling of an `.mp4`/`.mov` URL, query and fragment kept.
pub fn webm_sibling(url: &str) -> Option<String> {
    let mut parsed = SourceUrl::parse(url)?;
    let path = format!("{}.webm", parsed.fallback_stem()?);
    // `set_path` keeps existing percent-escapes as they are.
    parsed.url.set_path(&path);
    Some(parsed.into_string())
}

/// Sets `param=nonce` on the URL's query string, replacing any previous
/// value of `param` and keeping the fragment. Unparseable URLs come back
/// unchanged.
pub fn cache_busted(url: &str, param: &str, nonce: u64) -> String {
    let Some(mut parsed) = SourceUrl::parse(url) else {
        return url.to_string();
    };

    let kept: Vec<(String, String)> = parsed
        .url
        .query_pairs()
        .into_owned()
        .filter(|(name, _)| name != param)
        .collect();
    parsed
        .url
        .query_pairs_mut()
        .clear()
        .extend_pairs(kept)
        .append_pair(param, &nonce.to_string());

    parsed.into_string()
}

/// The source currently assigned to the element.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveSource {
    pub id: SourceId,
    /// URL passed to `load_source`.
    pub original_url: String,
    /// URL the element currently plays (cache-busted or format-swapped).
    pub current_url: String,
    pub format_swap_attempted: bool,
}

impl ActiveSource {
    pub fn new(id: SourceId, url: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            id,
            original_url: url.clone(),
            current_url: url,
            format_swap_attempted: false,
        }
    }
}
