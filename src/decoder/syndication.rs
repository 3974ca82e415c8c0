//! RSS/Atom bodies, for sections backed by a plain syndication feed.

use feed_rs::model::Entry;
use feed_rs::parser;
use html_escape::decode_html_entities;

use crate::app::DecodeError;
use crate::domain::{Article, Page};

pub(super) fn decode(raw: &[u8], section: &str) -> Result<Page, DecodeError> {
    let feed = parser::parse(raw).map_err(|e| DecodeError::Malformed(e.to_string()))?;

    let articles = feed
        .entries
        .into_iter()
        .enumerate()
        .map(|(index, entry)| article_from_entry(entry, section, index as u64))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Page::new(section, articles, None))
}

fn article_from_entry(entry: Entry, section: &str, ordinal: u64) -> Result<Article, DecodeError> {
    let link = entry.links.first().map(|l| l.href.clone());
    let id = if entry.id.is_empty() {
        link.ok_or_else(|| DecodeError::SchemaMismatch(format!("entry {ordinal}: missing id")))?
    } else {
        entry.id
    };

    let title = entry
        .title
        .map(|t| decode_html_entities(&t.content).to_string())
        .ok_or_else(|| DecodeError::SchemaMismatch(format!("entry {ordinal}: missing title")))?;

    let thumbnail_url = entry.media.iter().find_map(|media| {
        media
            .thumbnails
            .first()
            .map(|thumb| thumb.image.uri.clone())
            .or_else(|| {
                media
                    .content
                    .iter()
                    .find_map(|c| c.url.as_ref().map(|u| u.to_string()))
            })
    });

    let mut article = Article::new(id, title, section, ordinal);
    article.summary = entry
        .summary
        .map(|s| decode_html_entities(&s.content).to_string())
        .unwrap_or_default();
    article.thumbnail_url = thumbnail_url;
    article.published_at = entry.published.or(entry.updated);

    Ok(article)
}
