use crate::models::RawListingRow;
use anyhow::Result;
// `::` disambiguates the scraper crate from this `scraper` module.
use ::scraper::{ElementRef, Html, Selector};
use tracing::warn;

// ── Listing page ──────────────────────────────────────────────────────────────

/// What one listing page yielded: the rows that carried all required markup,
/// and how many data rows were dropped for missing some of it.
#[derive(Debug, Default, PartialEq)]
pub struct ListingPage {
    pub rows: Vec<RawListingRow>,
    pub skipped: usize,
}

/// Project the price table of a listing page into raw rows.
///
/// A data row must provide all four markers: a `<b>` brand and a station
/// text node after `<br>` in the first cell, a `<b>` price and a `<small>`
/// date in the second. Rows missing any of them are skipped and counted —
/// the markup is heterogeneous and partial rows are expected, not errors.
pub fn parse_listing_page(html: &str) -> Result<ListingPage> {
    let doc = Html::parse_document(html);

    let table_sel = Selector::parse("table#price_table")
        .map_err(|e| anyhow::anyhow!("table selector: {:?}", e))?;
    let tr_sel = Selector::parse("tr")
        .map_err(|e| anyhow::anyhow!("tr selector: {:?}", e))?;
    let td_sel = Selector::parse("td")
        .map_err(|e| anyhow::anyhow!("td selector: {:?}", e))?;
    let b_sel = Selector::parse("b")
        .map_err(|e| anyhow::anyhow!("b selector: {:?}", e))?;
    let small_sel = Selector::parse("small")
        .map_err(|e| anyhow::anyhow!("small selector: {:?}", e))?;

    let Some(table) = doc.select(&table_sel).next() else {
        warn!("No price table found in listing page");
        return Ok(ListingPage::default());
    };

    let mut page = ListingPage::default();

    // First row is the header.
    for tr in table.select(&tr_sel).skip(1) {
        let cells: Vec<ElementRef> = tr.select(&td_sel).collect();
        if cells.len() < 2 {
            continue;
        }

        let brand = first_bold_text(&cells[0], &b_sel);
        let station = text_after_br(&cells[0]);
        let raw_price = first_bold_text(&cells[1], &b_sel);
        let raw_date = cells[1]
            .select(&small_sel)
            .next()
            .map(collapse_text)
            .filter(|s| !s.is_empty());

        match (brand, station, raw_price, raw_date) {
            (Some(brand), Some(station), Some(raw_price), Some(raw_date)) => {
                page.rows.push(RawListingRow {
                    brand,
                    station,
                    raw_price,
                    raw_date,
                });
            }
            _ => page.skipped += 1,
        }
    }

    Ok(page)
}

fn collapse_text(el: ElementRef) -> String {
    el.text().collect::<String>().trim().to_string()
}

fn first_bold_text(td: &ElementRef, b_sel: &Selector) -> Option<String> {
    td.select(b_sel)
        .next()
        .map(collapse_text)
        .filter(|s| !s.is_empty())
}

/// The station name sits in the text node right after the `<br>` that
/// follows the brand marker.
fn text_after_br(td: &ElementRef) -> Option<String> {
    let br = td
        .children()
        .find(|n| n.value().as_element().is_some_and(|e| e.name() == "br"))?;
    let text = br.next_sibling()?.value().as_text()?;
    let text = text.trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = r#"
        <html><body>
        <table id="price_table">
          <tr><th>Station</th><th>Pris</th></tr>
          <tr>
            <td><b>Shell</b><br>  Shell Lindholmen </td>
            <td><b>15,49 kr</b><br><small>5/6</small></td>
          </tr>
          <tr>
            <td><b>Preem</b><br>Preem Backaplan</td>
            <td><b>15,99 kr</b><br><small>5/6</small></td>
          </tr>
          <tr>
            <td><b>Circle K</b><br>Circle K Hisingen</td>
            <td><b>16,09 kr</b></td>
          </tr>
          <tr>
            <td><b>OKQ8</b></td>
            <td><b>15,79 kr</b><br><small>4/6</small></td>
          </tr>
          <tr><td>notices only</td></tr>
        </table>
        </body></html>
    "#;

    #[test]
    fn extracts_complete_rows_and_counts_partial_ones() {
        let page = parse_listing_page(LISTING).unwrap();

        assert_eq!(page.rows.len(), 2);
        assert_eq!(
            page.rows[0],
            RawListingRow {
                brand: "Shell".into(),
                station: "Shell Lindholmen".into(),
                raw_price: "15,49 kr".into(),
                raw_date: "5/6".into(),
            }
        );
        assert_eq!(page.rows[1].brand, "Preem");
        assert_eq!(page.rows[1].raw_date, "5/6");

        // Circle K row lacks <small>, OKQ8 row lacks <br> + station text.
        assert_eq!(page.skipped, 2);
    }

    #[test]
    fn station_name_is_trimmed() {
        let page = parse_listing_page(LISTING).unwrap();
        assert_eq!(page.rows[0].station, "Shell Lindholmen");
    }

    #[test]
    fn missing_table_yields_empty_page() {
        let page = parse_listing_page("<html><body><p>maintenance</p></body></html>").unwrap();
        assert!(page.rows.is_empty());
        assert_eq!(page.skipped, 0);
    }

    #[test]
    fn extraction_is_restartable() {
        let a = parse_listing_page(LISTING).unwrap();
        let b = parse_listing_page(LISTING).unwrap();
        assert_eq!(a, b);
    }
}
