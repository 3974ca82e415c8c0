mod syndication;
mod wire;

use html_escape::decode_html_entities;

use crate::app::DecodeError;
use crate::domain::{Article, Cursor, Page, PageWindow};

use wire::{WireArticle, WireEnvelope};

/// Turns raw response bodies into pages.
///
/// Stateless: safe to clone and call from any number of tasks at once.
#[derive(Clone, Default)]
pub struct Decoder;

impl Decoder {
    pub fn new() -> Self {
        Self
    }

    /// Decode a response body fetched for `section`.
    ///
    /// JSON bodies are either an envelope carrying `items` and a
    /// `nextCursor`, or a bare array treated as the final page. Bodies
    /// starting with `<` are parsed as RSS/Atom and are always final.
    pub fn decode(&self, raw: &[u8], section: &str) -> Result<Page, DecodeError> {
        self.decode_at(raw, section, PageWindow::default())
    }

    /// Decode a body that was requested for `window`.
    ///
    /// Ordinals without an explicit position count from the window's
    /// offset unless the envelope names its own. A bare array that fills a
    /// window with a limit gets a cursor pointing just past it.
    pub fn decode_at(
        &self,
        raw: &[u8],
        section: &str,
        window: PageWindow,
    ) -> Result<Page, DecodeError> {
        match raw.iter().find(|b| !b.is_ascii_whitespace()) {
            Some(b'{') | Some(b'[') => self.decode_json(raw, section, window),
            Some(b'<') => syndication::decode(raw, section),
            Some(_) => Err(DecodeError::Malformed(
                "body is neither JSON nor a syndication feed".into(),
            )),
            None => Err(DecodeError::Malformed("empty body".into())),
        }
    }

    fn decode_json(
        &self,
        raw: &[u8],
        section: &str,
        window: PageWindow,
    ) -> Result<Page, DecodeError> {
        let value: serde_json::Value =
            serde_json::from_slice(raw).map_err(|e| DecodeError::Malformed(e.to_string()))?;

        let (items, next_cursor, offset) = if value.is_array() {
            let items: Vec<WireArticle> = serde_json::from_value(value)
                .map_err(|e| DecodeError::SchemaMismatch(e.to_string()))?;
            let next = next_offset(window, items.len())?;
            (items, next, window.offset)
        } else {
            let envelope: WireEnvelope = serde_json::from_value(value)
                .map_err(|e| DecodeError::SchemaMismatch(e.to_string()))?;
            let next = envelope.next_cursor.map(|c| c.into_text());
            (envelope.items, next, envelope.offset.unwrap_or(window.offset))
        };

        let articles = items
            .into_iter()
            .enumerate()
            .map(|(index, item)| {
                let fallback = u64::try_from(index)
                    .ok()
                    .and_then(|index| offset.checked_add(index));
                article_from_wire(item, section, fallback)
                    .map_err(|e| DecodeError::SchemaMismatch(format!("item {index}: {e}")))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let next_cursor = next_cursor.filter(|c| !c.is_empty()).map(Cursor::new);

        Ok(Page::new(section, articles, next_cursor))
    }
}

/// Offset of the page after a bare array of `len` articles, if one may exist.
fn next_offset(window: PageWindow, len: usize) -> Result<Option<String>, DecodeError> {
    let Some(limit) = window.limit.filter(|&limit| limit > 0) else {
        return Ok(None);
    };
    if len < limit as usize {
        return Ok(None);
    }

    u64::try_from(len)
        .ok()
        .and_then(|len| window.offset.checked_add(len))
        .map(|next| Some(next.to_string()))
        .ok_or_else(|| DecodeError::SchemaMismatch("offset out of range".into()))
}

fn article_from_wire(
    item: WireArticle,
    section: &str,
    fallback_ordinal: Option<u64>,
) -> Result<Article, &'static str> {
    let id = item
        .id
        .map(|id| id.into_text())
        .filter(|id| !id.is_empty())
        .ok_or("missing id")?;
    let title = item.title.ok_or("missing title")?;

    let mut article = Article::new(
        id,
        decode_html_entities(&title).to_string(),
        item.category
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| section.to_string()),
        match item.position {
            Some(position) => position,
            None => fallback_ordinal.ok_or("offset out of range")?,
        },
    );
    article.summary = item
        .summary
        .map(|s| decode_html_entities(&s).to_string())
        .unwrap_or_default();
    article.thumbnail_url = item.image_url.filter(|u| !u.is_empty());
    article.published_at = item.publish_time.and_then(|t| t.as_timestamp());
    article.read_count = item.read_count.and_then(|c| c.as_count());

    Ok(article)
}
