use url::Url;

use crate::app::Result;
use crate::config::{EndpointConfig, Paging};
use crate::domain::{Cursor, PageWindow};

/// Builds page URLs for a section. The only place a cursor is spliced into
/// a request.
#[derive(Debug, Clone)]
pub struct FeedEndpoint {
    base: Url,
    page_size: u32,
    paging: Paging,
    section_param: String,
    cursor_param: String,
    offset_param: String,
    limit_param: String,
}

impl FeedEndpoint {
    pub fn new(config: &EndpointConfig) -> Result<Self> {
        let mut root = config.base_url.clone();
        if !root.ends_with('/') {
            root.push('/');
        }
        let base = Url::parse(&root)?.join(config.path.trim_start_matches('/'))?;

        Ok(Self {
            base,
            page_size: config.page_size,
            paging: config.paging,
            section_param: config.section_param.clone(),
            cursor_param: config.cursor_param.clone(),
            offset_param: config.offset_param.clone(),
            limit_param: config.limit_param.clone(),
        })
    }

    pub fn page_url(&self, section: &str, cursor: Option<&Cursor>) -> String {
        let mut url = self.base.clone();
        {
            let mut query = url.query_pairs_mut();
            query.append_pair(&self.section_param, section);
            query.append_pair(&self.limit_param, &self.page_size.to_string());
            match self.paging {
                Paging::Cursor => {
                    if let Some(cursor) = cursor {
                        query.append_pair(&self.cursor_param, cursor.as_str());
                    }
                }
                Paging::Offset => {
                    let offset = cursor.map_or("0", |c| c.as_str());
                    query.append_pair(&self.offset_param, offset);
                }
            }
        }
        url.into()
    }

    /// The window a request for the page at `cursor` covers. Cursor paging
    /// knows nothing about positions up front.
    pub fn window(&self, cursor: Option<&Cursor>) -> PageWindow {
        match self.paging {
            Paging::Cursor => PageWindow::default(),
            Paging::Offset => PageWindow {
                offset: cursor.and_then(|c| c.as_str().parse().ok()).unwrap_or(0),
                limit: Some(self.page_size),
            },
        }
    }
}
