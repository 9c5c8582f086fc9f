use std::fmt;

use crate::error::{Error, ErrorKind};

/// The closed set of supported WebDriver element-lookup strategies.
///
/// Parsed from the configured locator-kind string by uppercasing after
/// trimming and replacing spaces with underscores, e.g. `"link text"` and
/// `"LINK_TEXT"` both normalize to [`LocatorKind::LinkText`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocatorKind {
    Id,
    XPath,
    LinkText,
    PartialLinkText,
    Name,
    TagName,
    ClassName,
    CssSelector,
}

impl LocatorKind {
    pub fn parse(locator_type: &str) -> Result<Self, Error> {
        let normalized = locator_type.trim().replace(' ', "_").to_uppercase();
        match normalized.as_str() {
            "ID" => Ok(Self::Id),
            "XPATH" => Ok(Self::XPath),
            "LINK_TEXT" => Ok(Self::LinkText),
            "PARTIAL_LINK_TEXT" => Ok(Self::PartialLinkText),
            "NAME" => Ok(Self::Name),
            "TAG_NAME" => Ok(Self::TagName),
            "CLASS_NAME" => Ok(Self::ClassName),
            "CSS_SELECTOR" => Ok(Self::CssSelector),
            other => Err(Error::new(
                ErrorKind::PageModel,
                format!("unsupported locator type '{other}'"),
            )),
        }
    }
}

impl fmt::Display for LocatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Id => "id",
            Self::XPath => "xpath",
            Self::LinkText => "link_text",
            Self::PartialLinkText => "partial_link_text",
            Self::Name => "name",
            Self::TagName => "tag_name",
            Self::ClassName => "class_name",
            Self::CssSelector => "css_selector",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_closed_set() {
        assert_eq!(LocatorKind::parse("id").unwrap(), LocatorKind::Id);
        assert_eq!(LocatorKind::parse("Link Text").unwrap(), LocatorKind::LinkText);
        assert_eq!(
            LocatorKind::parse("  css selector  ").unwrap(),
            LocatorKind::CssSelector
        );
        assert_eq!(LocatorKind::parse("XPATH").unwrap(), LocatorKind::XPath);
    }

    #[test]
    fn rejects_unknown_kind() {
        assert!(LocatorKind::parse("regex").is_err());
    }
}
