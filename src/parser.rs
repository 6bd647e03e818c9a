//! Character page parsing: table rows → raw dungeon-run fields.
//!
//! A data row holds a boss link naming the dungeon and at least two numeric
//! cells; the second numeric cell reads like `29:59 +18` (clear time and
//! keystone level, either may be missing).

use nom::{
    bytes::complete::{tag, take_while_m_n},
    character::complete::digit1,
    combinator::recognize,
    sequence::{preceded, tuple},
    IResult,
};
use scraper::{ElementRef, Html, Selector};
use std::sync::OnceLock;
use thiserror::Error;

use crate::models::RawRun;

/// A row that looked like a data row but couldn't be read
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RowParseError {
    #[error("dungeon cell is empty")]
    EmptyDungeon,

    #[error("keystone level '+{0}' is out of range")]
    LevelOutOfRange(String),
}

/// Result of parsing one page
#[derive(Debug, Default, Clone)]
pub struct ParsedPage {
    pub runs: Vec<RawRun>,
    /// `<tr role="row">` elements seen, data or not
    pub rows_seen: usize,
    pub malformed: Vec<RowParseError>,
}

struct Selectors {
    row: Selector,
    dungeon: Selector,
    number: Selector,
}

fn selectors() -> &'static Selectors {
    static SELECTORS: OnceLock<Selectors> = OnceLock::new();
    SELECTORS.get_or_init(|| Selectors {
        row: static_selector(r#"tr[role="row"]"#),
        dungeon: static_selector("a.Boss.zone-boss-cell"),
        number: static_selector("td.verbose.main-table-number.kills-cell"),
    })
}

fn static_selector(css: &'static str) -> Selector {
    Selector::parse(css).unwrap_or_else(|e| panic!("invalid built-in selector {css}: {e:?}"))
}

/// Parse every row of a page, skipping non-data rows and logging malformed ones.
/// `rows_seen` is the fetcher's success signal.
pub fn parse_page(markup: &str) -> ParsedPage {
    let document = Html::parse_document(markup);
    let mut page = ParsedPage::default();

    for row in document.select(&selectors().row) {
        page.rows_seen += 1;
        match parse_row(row) {
            Ok(Some(run)) => page.runs.push(run),
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(row = page.rows_seen, error = %e, "Skipping malformed row");
                page.malformed.push(e);
            }
        }
    }

    tracing::debug!(
        rows = page.rows_seen,
        runs = page.runs.len(),
        malformed = page.malformed.len(),
        "Parsed page"
    );
    page
}

/// `Ok(None)` for header/filler rows, `Err` for a data row that can't be read
pub fn parse_row(row: ElementRef<'_>) -> Result<Option<RawRun>, RowParseError> {
    let sel = selectors();

    let Some(link) = row.select(&sel.dungeon).next() else {
        return Ok(None);
    };
    let cells: Vec<ElementRef> = row.select(&sel.number).collect();
    if cells.len() < 2 {
        return Ok(None);
    }

    let dungeon_raw = link.text().collect::<String>().trim().to_string();
    if dungeon_raw.is_empty() {
        return Err(RowParseError::EmptyDungeon);
    }

    let time_text: String = cells[1].text().map(str::trim).collect();
    let keystone_level = match find_first(&time_text, keystone) {
        Some(digits) => Some(
            digits
                .parse::<u32>()
                .map_err(|_| RowParseError::LevelOutOfRange(digits.to_string()))?,
        ),
        None => None,
    };

    Ok(Some(RawRun {
        dungeon_raw,
        clear_time_text: find_first(&time_text, clear_time).map(str::to_string),
        keystone_level,
    }))
}

fn is_digit(c: char) -> bool {
    c.is_ascii_digit()
}

/// `M:SS` or `MM:SS`
fn clear_time(input: &str) -> IResult<&str, &str> {
    recognize(tuple((
        take_while_m_n(1, 2, is_digit),
        tag(":"),
        take_while_m_n(2, 2, is_digit),
    )))(input)
}

/// `+<digits>`, yielding the digits
fn keystone(input: &str) -> IResult<&str, &str> {
    preceded(tag("+"), digit1)(input)
}

/// Leftmost match of `parser` anywhere in `text`
fn find_first<'a, O>(
    text: &'a str,
    mut parser: impl FnMut(&'a str) -> IResult<&'a str, O>,
) -> Option<O> {
    text.char_indices()
        .find_map(|(i, _)| parser(&text[i..]).ok().map(|(_, out)| out))
}
