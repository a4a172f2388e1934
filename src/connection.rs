use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use uuid::Uuid;

use crate::error::CursorError;

/// Relay-style connection page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection<T> {
    pub edges: Vec<Edge<T>>,
    pub page_info: PageInfo,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge<T> {
    pub node: T,
    pub cursor: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageInfo {
    pub start_cursor: Option<String>,
    pub end_cursor: Option<String>,
    pub has_previous_page: bool,
    pub has_next_page: bool,
}

/// Encodes an account id as an opaque cursor: base64 over the hyphenated
/// uuid string.
pub fn encode_cursor(id: Uuid) -> String {
    STANDARD.encode(id.to_string())
}

pub fn decode_cursor(cursor: &str) -> Result<Uuid, CursorError> {
    let bytes = STANDARD.decode(cursor)?;
    let id = std::str::from_utf8(&bytes)?;
    Ok(Uuid::parse_str(id)?)
}

impl<T> Connection<T> {
    /// Builds a page from nodes already positioned after the requested
    /// cursor, taking at most `first` of them.
    pub fn paginate<I, F>(nodes: I, first: usize, after_cursor: bool, cursor_of: F) -> Self
    where
        I: IntoIterator<Item = T>,
        F: Fn(&T) -> String,
    {
        let edges = nodes
            .into_iter()
            .take(first)
            .map(|node| {
                let cursor = cursor_of(&node);
                Edge { node, cursor }
            })
            .collect::<Vec<_>>();
        let page_info = PageInfo {
            start_cursor: edges.first().map(|edge| edge.cursor.clone()),
            end_cursor: edges.last().map(|edge| edge.cursor.clone()),
            has_previous_page: after_cursor,
            has_next_page: edges.len() >= first,
        };
        Self { edges, page_info }
    }
}
