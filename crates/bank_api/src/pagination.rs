use api_types::{Envelope, PageLinks};
use reqwest::Url;

const AFTER_PARAM: &str = "page[after]";
const BEFORE_PARAM: &str = "page[before]";

/// Opaque pagination token, extracted from `links.next`/`links.prev`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Cursor {
    After(String),
    Before(String),
}

impl Cursor {
    pub(crate) fn query_pair(&self) -> (String, String) {
        match self {
            Self::After(value) => (AFTER_PARAM.to_string(), value.clone()),
            Self::Before(value) => (BEFORE_PARAM.to_string(), value.clone()),
        }
    }
}

/// One page of a list endpoint plus its forward/backward cursors.
#[derive(Clone, Debug)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next: Option<Cursor>,
    pub prev: Option<Cursor>,
}

impl<T> Page<T> {
    pub(crate) fn from_envelope(envelope: Envelope<Vec<T>>) -> Self {
        let (next, prev) = match &envelope.links {
            Some(links) => cursors_from_links(links),
            None => (None, None),
        };
        Self {
            items: envelope.data,
            next,
            prev,
        }
    }

    pub fn has_next(&self) -> bool {
        self.next.is_some()
    }
}

fn cursors_from_links(links: &PageLinks) -> (Option<Cursor>, Option<Cursor>) {
    let next = links
        .next
        .as_deref()
        .and_then(|url| query_value(url, AFTER_PARAM))
        .map(Cursor::After);
    let prev = links
        .prev
        .as_deref()
        .and_then(|url| query_value(url, BEFORE_PARAM))
        .map(Cursor::Before);
    (next, prev)
}

fn query_value(url: &str, param: &str) -> Option<String> {
    let url = Url::parse(url).ok()?;
    url.query_pairs()
        .find(|(key, _)| key == param)
        .map(|(_, value)| value.into_owned())
}
