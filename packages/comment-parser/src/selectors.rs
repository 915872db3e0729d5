//! Ordered fallback strategies for reading one comment thread element.
//!
//! Feed markup differs between page variants, so each field is located through
//! a prioritized list of CSS locators. The chain picks the first strategy whose
//! text locator yields non-blank text; author, likes and timestamp are then
//! looked up independently and default to empty/zero when nothing matches.

use crate::error::SessionResult;

/// Read access to elements of a rendered page.
///
/// A locator that matches nothing is `Ok(None)`, never an error. Errors are
/// reserved for session faults.
pub trait ElementQuery {
    type Element;

    /// First descendant of `parent` matching `locator`.
    fn find_child(
        &mut self,
        parent: &Self::Element,
        locator: &str,
    ) -> SessionResult<Option<Self::Element>>;

    /// Rendered text of an element.
    fn text(&mut self, element: &Self::Element) -> SessionResult<String>;

    /// Attribute value, `None` when the attribute is absent.
    fn attribute(&mut self, element: &Self::Element, name: &str) -> SessionResult<Option<String>>;

    /// Trimmed text of the first descendant matching `locator`.
    fn child_text(
        &mut self,
        parent: &Self::Element,
        locator: &str,
    ) -> SessionResult<Option<String>> {
        match self.find_child(parent, locator)? {
            Some(child) => Ok(Some(self.text(&child)?.trim().to_string())),
            None => Ok(None),
        }
    }
}

/// One interpretation of a thread element's markup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorStrategy {
    pub text: String,
    pub author: Vec<String>,
    pub likes: Vec<String>,
}

impl SelectorStrategy {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            author: Vec::new(),
            likes: Vec::new(),
        }
    }

    pub fn with_author(mut self, locator: impl Into<String>) -> Self {
        self.author.push(locator.into());
        self
    }

    pub fn with_likes(mut self, locator: impl Into<String>) -> Self {
        self.likes.push(locator.into());
        self
    }
}

/// Fields read from one thread element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadComment {
    /// Native `id` attribute of the thread element, if it has one.
    pub native_id: Option<String>,
    pub text: String,
    pub author: String,
    /// Relative timestamp text as rendered ("2 days ago").
    pub published: String,
    pub likes: u64,
    /// Index of the strategy that matched.
    pub strategy: usize,
}

/// Prioritized list of strategies plus the shared timestamp locators.
#[derive(Debug, Clone)]
pub struct SelectorChain {
    strategies: Vec<SelectorStrategy>,
    published: Vec<String>,
}

impl SelectorChain {
    pub fn new(strategies: Vec<SelectorStrategy>) -> Self {
        Self {
            strategies,
            published: Vec::new(),
        }
    }

    pub fn with_published(mut self, locator: impl Into<String>) -> Self {
        self.published.push(locator.into());
        self
    }

    /// Locators for the YouTube comment thread renderer variants.
    pub fn youtube() -> Self {
        Self::new(vec![
            SelectorStrategy::new("yt-attributed-string#content-text")
                .with_author("yt-formatted-string#author-text")
                .with_likes("span#vote-count-middle"),
            SelectorStrategy::new("#content-text")
                .with_author("#author-text span")
                .with_likes("#vote-count-middle"),
            SelectorStrategy::new("yt-formatted-string.ytd-comment-renderer")
                .with_author("#author-text")
                .with_likes("#vote-count-middle"),
        ])
        .with_published("a.yt-simple-endpoint.style-scope.yt-formatted-string")
        .with_published("yt-formatted-string.published-time-text a")
        .with_published(".published-time-text a")
        .with_published("a#published-time-text")
    }

    /// Read a thread element.
    ///
    /// Returns `Ok(None)` when no strategy yields non-blank text; the element
    /// should be skipped.
    pub fn extract<Q: ElementQuery>(
        &self,
        page: &mut Q,
        element: &Q::Element,
    ) -> SessionResult<Option<ThreadComment>> {
        for (index, strategy) in self.strategies.iter().enumerate() {
            let text = match page.child_text(element, &strategy.text)? {
                Some(text) if !text.is_empty() => text,
                _ => continue,
            };

            let native_id = page
                .attribute(element, "id")?
                .map(|id| id.trim().to_string())
                .filter(|id| !id.is_empty());
            let author = first_text(page, element, &strategy.author)?.unwrap_or_default();
            let likes = first_text(page, element, &strategy.likes)?
                .map(|raw| parse_likes(&raw))
                .unwrap_or(0);
            let published = first_text(page, element, &self.published)?.unwrap_or_default();

            return Ok(Some(ThreadComment {
                native_id,
                text,
                author,
                published,
                likes,
                strategy: index,
            }));
        }
        Ok(None)
    }
}

/// First non-blank text among `locators`.
fn first_text<Q: ElementQuery>(
    page: &mut Q,
    element: &Q::Element,
    locators: &[String],
) -> SessionResult<Option<String>> {
    for locator in locators {
        if let Some(text) = page.child_text(element, locator)? {
            if !text.is_empty() {
                return Ok(Some(text));
            }
        }
    }
    Ok(None)
}

/// Like-count text to a number. Thousands separators (`,` and `.`) are
/// stripped; anything still unparsable counts as zero.
pub fn parse_likes(raw: &str) -> u64 {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| *c != ',' && *c != '.')
        .collect();
    cleaned.parse().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    /// Element = index into `elements`; each element maps locator -> text.
    struct FakePage {
        elements: Vec<(Option<String>, HashMap<String, String>)>,
    }

    impl FakePage {
        fn one(id: Option<&str>, fields: &[(&str, &str)]) -> Self {
            Self {
                elements: vec![(
                    id.map(String::from),
                    fields
                        .iter()
                        .map(|(k, v)| (k.to_string(), v.to_string()))
                        .collect(),
                )],
            }
        }
    }

    impl ElementQuery for FakePage {
        type Element = (usize, Option<String>);

        fn find_child(
            &mut self,
            parent: &Self::Element,
            locator: &str,
        ) -> SessionResult<Option<Self::Element>> {
            let fields = &self.elements[parent.0].1;
            Ok(fields
                .contains_key(locator)
                .then(|| (parent.0, Some(locator.to_string()))))
        }

        fn text(&mut self, element: &Self::Element) -> SessionResult<String> {
            let locator = element.1.as_deref().unwrap_or_default();
            Ok(self.elements[element.0]
                .1
                .get(locator)
                .cloned()
                .unwrap_or_default())
        }

        fn attribute(
            &mut self,
            element: &Self::Element,
            name: &str,
        ) -> SessionResult<Option<String>> {
            assert_eq!(name, "id");
            Ok(self.elements[element.0].0.clone())
        }
    }

    #[test]
    fn test_first_strategy_wins() {
        let mut page = FakePage::one(
            Some("abc"),
            &[
                ("yt-attributed-string#content-text", " Great video "),
                ("#content-text", "other"),
                ("yt-formatted-string#author-text", "@alice"),
                ("span#vote-count-middle", "1,204"),
                ("a#published-time-text", "2 days ago"),
            ],
        );
        let chain = SelectorChain::youtube();
        let comment = chain.extract(&mut page, &(0, None)).unwrap().unwrap();

        assert_eq!(comment.native_id.as_deref(), Some("abc"));
        assert_eq!(comment.text, "Great video");
        assert_eq!(comment.author, "@alice");
        assert_eq!(comment.likes, 1204);
        assert_eq!(comment.published, "2 days ago");
        assert_eq!(comment.strategy, 0);
    }

    #[test]
    fn test_whitespace_text_falls_through() {
        let mut page = FakePage::one(
            None,
            &[
                ("yt-attributed-string#content-text", "   "),
                ("#content-text", "second variant"),
                ("#author-text span", "bob"),
            ],
        );
        let comment = SelectorChain::youtube()
            .extract(&mut page, &(0, None))
            .unwrap()
            .unwrap();

        assert_eq!(comment.text, "second variant");
        assert_eq!(comment.strategy, 1);
        assert_eq!(comment.author, "bob");
        assert_eq!(comment.likes, 0);
        assert_eq!(comment.published, "");
        assert_eq!(comment.native_id, None);
    }

    #[test]
    fn test_no_matching_strategy_skips_element() {
        let mut page = FakePage::one(
            Some("x"),
            &[
                ("yt-attributed-string#content-text", ""),
                ("#content-text", "\n\t"),
                ("#author-text", "carol"),
            ],
        );
        let result = SelectorChain::youtube().extract(&mut page, &(0, None)).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_author_candidates_tried_in_order() {
        let strategy = SelectorStrategy::new(".text")
            .with_author(".missing")
            .with_author(".blank")
            .with_author(".name");
        let mut page = FakePage::one(
            None,
            &[(".text", "hi"), (".blank", " "), (".name", "dave")],
        );
        let comment = SelectorChain::new(vec![strategy])
            .extract(&mut page, &(0, None))
            .unwrap()
            .unwrap();
        assert_eq!(comment.author, "dave");
    }

    #[test]
    fn test_parse_likes() {
        assert_eq!(parse_likes("42"), 42);
        assert_eq!(parse_likes("1,234"), 1234);
        assert_eq!(parse_likes("1.234.567"), 1234567);
        assert_eq!(parse_likes(""), 0);
        assert_eq!(parse_likes("  "), 0);
        assert_eq!(parse_likes("1.2K"), 0);
    }
}
