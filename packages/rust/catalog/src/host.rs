//! Host-page collaborators: which parent is on screen, and the year the
//! page itself displays for it.

use regex::Regex;
use scraper::{Html, Selector};

use mastertable_shared::ParentId;

/// Extract the parent id from a bare id, a site path, or a full page URL
/// (`https://www.discogs.com/master/1234-Artist-Title`).
pub fn parent_id_from_location(location: &str) -> Option<ParentId> {
    let location = location.trim();
    if let Ok(id) = location.parse::<ParentId>() {
        return Some(id);
    }

    let pattern = Regex::new(r"/master/(\d+)").ok()?;
    let caps = pattern.captures(location)?;
    caps.get(1)?.as_str().parse().ok()
}

/// Read the parent's display year from a saved master page.
///
/// Looks at the profile table row headed "Year" or "Released" first, then
/// falls back to the first `<time datetime>` element.
pub fn display_year_from_html(html: &str) -> Option<String> {
    let doc = Html::parse_document(html);
    profile_year(&doc).or_else(|| time_year(&doc))
}

fn profile_year(doc: &Html) -> Option<String> {
    let row_sel = Selector::parse("tr").ok()?;
    let th_sel = Selector::parse("th").ok()?;
    let td_sel = Selector::parse("td").ok()?;

    doc.select(&row_sel).find_map(|row| {
        let header = row.select(&th_sel).next()?.text().collect::<String>();
        let header = header.trim().to_lowercase();
        if !(header.starts_with("year") || header.starts_with("released")) {
            return None;
        }
        let value = row.select(&td_sel).next()?.text().collect::<String>();
        first_year(&value)
    })
}

fn time_year(doc: &Html) -> Option<String> {
    let time_sel = Selector::parse("time[datetime]").ok()?;
    doc.select(&time_sel)
        .find_map(|el| el.value().attr("datetime").and_then(first_year))
}

fn first_year(text: &str) -> Option<String> {
    let pattern = Regex::new(r"\b(\d{4})\b").ok()?;
    pattern
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}
