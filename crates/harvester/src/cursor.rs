use normalizer::RecordKind;
use tracing::warn;

/// Where the next page request starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Position {
    /// REST `page` parameter, 1-based.
    Page(u32),
    /// GraphQL `after` token; `None` for the first page.
    After(Option<String>),
}

/// What a successfully parsed page says about the next one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageMarker {
    /// Number of raw items on the page before any filtering.
    Counted { raw_items: usize },
    Continuation {
        has_next_page: bool,
        end_cursor: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cursor {
    position: Position,
    exhausted: bool,
}

impl Cursor {
    pub fn page_number() -> Self {
        Self {
            position: Position::Page(1),
            exhausted: false,
        }
    }

    pub fn opaque() -> Self {
        Self {
            position: Position::After(None),
            exhausted: false,
        }
    }

    pub fn position(&self) -> &Position {
        &self.position
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Moves past the page that produced `marker`. Only called after a page
    /// was fetched and parsed, so a retried page keeps its position.
    pub fn advance(&mut self, marker: PageMarker) {
        if self.exhausted {
            return;
        }
        match (&self.position, marker) {
            (Position::Page(_), PageMarker::Counted { raw_items: 0 }) => {
                self.exhausted = true;
            }
            (Position::Page(page), PageMarker::Counted { .. }) => {
                self.position = Position::Page(page.saturating_add(1));
            }
            (
                Position::After(_),
                PageMarker::Continuation {
                    has_next_page: true,
                    end_cursor: Some(token),
                },
            ) => {
                self.position = Position::After(Some(token));
            }
            (
                Position::After(_),
                PageMarker::Continuation {
                    has_next_page: true,
                    end_cursor: None,
                },
            ) => {
                warn!("server reported more pages without an end cursor; stopping");
                self.exhausted = true;
            }
            (Position::After(_), PageMarker::Continuation { .. }) => {
                self.exhausted = true;
            }
            (position, marker) => {
                warn!(?position, ?marker, "page marker does not match cursor style");
                self.exhausted = true;
            }
        }
    }

    /// Short form for log fields.
    pub fn describe(&self) -> String {
        match &self.position {
            Position::Page(page) => format!("page={page}"),
            Position::After(None) => "after=start".to_string(),
            Position::After(Some(token)) => format!("after={token}"),
        }
    }
}

/// Progress of one resource stream. Owned by its fetcher and never shared.
#[derive(Debug, Clone)]
pub struct StreamState {
    pub kind: RecordKind,
    pub cursor: Cursor,
    pub items_fetched: usize,
}

impl StreamState {
    pub fn new(kind: RecordKind, cursor: Cursor) -> Self {
        Self {
            kind,
            cursor,
            items_fetched: 0,
        }
    }

    pub fn has_more(&self) -> bool {
        !self.cursor.is_exhausted()
    }
}
