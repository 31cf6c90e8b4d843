use ifp_core::{Diagnostic, FuelType, RawRow, StateSlug, UNKNOWN_CITY};
use scraper::{ElementRef, Html, Selector};

use crate::{AdapterError, Extraction, PageAdapter};

pub(crate) const SOURCE_ID: &str = "goodreturns";
const BASE_URL: &str = "https://www.goodreturns.in";

const TITLE: &str = "title";
const TABLE_CONTAINER: &str = "div.gd-fuel-table-data";
const PRICE_TABLE: &str = "table.gd-fuel-table-list";
const TABLE_BODY: &str = "tbody";
const ROW: &str = "tr";
const CELL: &str = "td";
const LINK: &str = "a";

/// Adapter for goodreturns.in state price pages.
#[derive(Debug)]
pub struct GoodReturnsAdapter {
    title: Selector,
    container: Selector,
    table: Selector,
    body: Selector,
    row: Selector,
    cell: Selector,
    link: Selector,
}

fn compile(selector: &str) -> Result<Selector, AdapterError> {
    Selector::parse(selector).map_err(|e| AdapterError::Selector {
        selector: selector.to_string(),
        message: e.to_string(),
    })
}

/// Concatenates the element's text fragments, each trimmed.
fn stripped_text(element: ElementRef<'_>) -> String {
    element.text().map(str::trim).collect()
}

fn non_empty(text: String) -> Option<String> {
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

impl GoodReturnsAdapter {
    pub fn new() -> Result<Self, AdapterError> {
        Ok(Self {
            title: compile(TITLE)?,
            container: compile(TABLE_CONTAINER)?,
            table: compile(PRICE_TABLE)?,
            body: compile(TABLE_BODY)?,
            row: compile(ROW)?,
            cell: compile(CELL)?,
            link: compile(LINK)?,
        })
    }

    fn city_text(&self, cell: ElementRef<'_>) -> String {
        cell.select(&self.link)
            .next()
            .and_then(|link| non_empty(stripped_text(link)))
            .or_else(|| non_empty(stripped_text(cell)))
            .unwrap_or_else(|| UNKNOWN_CITY.to_string())
    }

    fn body_rows<'a>(&self, table: ElementRef<'a>) -> Vec<ElementRef<'a>> {
        table
            .select(&self.body)
            .next()
            .map(|body| body.select(&self.row).collect())
            .unwrap_or_default()
    }
}

impl PageAdapter for GoodReturnsAdapter {
    fn source_id(&self) -> &'static str {
        SOURCE_ID
    }

    fn default_base_url(&self) -> &'static str {
        BASE_URL
    }

    fn page_path(&self, fuel: FuelType, slug: &StateSlug) -> String {
        format!("{fuel}-price-in-{slug}.html")
    }

    fn extract(&self, markup: &str, expected_tokens: &[String], fuel: FuelType) -> Extraction {
        let document = Html::parse_document(markup);

        // Upstream answers unknown or retired slugs with some other page, so the
        // title must name the state before any table is trusted.
        let title = document
            .select(&self.title)
            .next()
            .map(stripped_text)
            .unwrap_or_default();
        if !expected_tokens
            .iter()
            .any(|token| title.contains(token.as_str()))
        {
            return Extraction::rejected(Diagnostic::TitleMismatch {
                fuel,
                expected: expected_tokens.to_vec(),
                actual: title,
            });
        }

        let Some(container) = document.select(&self.container).next() else {
            return Extraction::rejected(Diagnostic::MissingContainer { fuel });
        };

        let tables: Vec<_> = container.select(&self.table).collect();
        if tables.is_empty() {
            return Extraction::rejected(Diagnostic::MissingTables { fuel });
        }

        // Only the first non-empty table loses its leading row. Header rows of
        // later tables are kept and fall to the cell-count check if they use <th>.
        let mut header_skipped = false;
        let mut rows = Vec::new();
        for table in tables {
            let mut table_rows = self.body_rows(table);
            if !header_skipped && !table_rows.is_empty() {
                table_rows.remove(0);
                header_skipped = true;
            }

            for row in table_rows {
                let cells: Vec<_> = row.select(&self.cell).collect();
                if cells.len() < 3 {
                    continue;
                }
                rows.push(RawRow {
                    city_name: self.city_text(cells[0]),
                    today_text: stripped_text(cells[1]),
                    yesterday_text: stripped_text(cells[2]),
                });
            }
        }

        Extraction {
            rows,
            diagnostics: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::{Path, PathBuf};

    fn workspace_root() -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("../..")
            .canonicalize()
            .expect("workspace root")
    }

    fn fixture(slug: &str, fuel: FuelType) -> String {
        let path = workspace_root()
            .join("fixtures/goodreturns")
            .join(format!("{fuel}-price-in-{slug}.html"));
        fs::read_to_string(&path).expect("read fixture")
    }

    fn tokens(slug: &str) -> Vec<String> {
        StateSlug::new(slug).title_tokens()
    }

    fn page(title: &str, body: &str) -> String {
        format!("<html><head><title>{title}</title></head><body>{body}</body></html>")
    }

    fn row(city: &str, today: &str, yesterday: &str) -> RawRow {
        RawRow {
            city_name: city.to_string(),
            today_text: today.to_string(),
            yesterday_text: yesterday.to_string(),
        }
    }

    #[test]
    fn page_path_follows_fuel_and_slug() {
        let adapter = GoodReturnsAdapter::new().unwrap();
        let slug = StateSlug::new("uttar-pradesh-s33");
        assert_eq!(
            adapter.page_path(FuelType::Cng, &slug),
            "cng-price-in-uttar-pradesh-s33.html"
        );
    }

    #[test]
    fn extracts_rows_from_state_fixture() {
        let adapter = GoodReturnsAdapter::new().unwrap();
        let extraction = adapter.extract(
            &fixture("west-bengal-s35", FuelType::Petrol),
            &tokens("west-bengal-s35"),
            FuelType::Petrol,
        );

        assert!(extraction.diagnostics.is_empty());
        assert_eq!(
            extraction.rows,
            vec![
                row("Kolkata", "₹ 105.41", "₹ 105.21"),
                row("Siliguri", "₹ 107.04", "₹ 107.04"),
            ]
        );
    }

    #[test]
    fn title_without_state_tokens_yields_no_rows() {
        let adapter = GoodReturnsAdapter::new().unwrap();
        let extraction = adapter.extract(
            &fixture("west-bengal-s35", FuelType::Diesel),
            &tokens("west-bengal-s35"),
            FuelType::Diesel,
        );

        assert!(extraction.rows.is_empty());
        assert_eq!(
            extraction.diagnostics,
            vec![Diagnostic::TitleMismatch {
                fuel: FuelType::Diesel,
                expected: vec!["West".to_string(), "Bengal".to_string()],
                actual: "Diesel Price in India Today - Goodreturns".to_string(),
            }]
        );
    }

    #[test]
    fn missing_title_is_a_mismatch() {
        let adapter = GoodReturnsAdapter::new().unwrap();
        let extraction = adapter.extract("<html><body></body></html>", &tokens("goa-s11"), FuelType::Petrol);
        assert!(extraction.rows.is_empty());
        assert!(matches!(
            extraction.diagnostics.as_slice(),
            [Diagnostic::TitleMismatch { actual, .. }] if actual.is_empty()
        ));
    }

    #[test]
    fn missing_container_yields_no_rows() {
        let adapter = GoodReturnsAdapter::new().unwrap();
        let extraction = adapter.extract(
            &fixture("west-bengal-s35", FuelType::Cng),
            &tokens("west-bengal-s35"),
            FuelType::Cng,
        );
        assert!(extraction.rows.is_empty());
        assert_eq!(
            extraction.diagnostics,
            vec![Diagnostic::MissingContainer { fuel: FuelType::Cng }]
        );
    }

    #[test]
    fn container_without_tables_yields_no_rows() {
        let adapter = GoodReturnsAdapter::new().unwrap();
        let extraction = adapter.extract(
            &fixture("uttar-pradesh-s33", FuelType::Cng),
            &tokens("uttar-pradesh-s33"),
            FuelType::Cng,
        );
        assert!(extraction.rows.is_empty());
        assert_eq!(
            extraction.diagnostics,
            vec![Diagnostic::MissingTables { fuel: FuelType::Cng }]
        );
    }

    #[test]
    fn rows_keep_table_then_row_order() {
        let adapter = GoodReturnsAdapter::new().unwrap();
        let extraction = adapter.extract(
            &fixture("uttar-pradesh-s33", FuelType::Petrol),
            &tokens("uttar-pradesh-s33"),
            FuelType::Petrol,
        );
        let cities: Vec<_> = extraction.rows.iter().map(|r| r.city_name.as_str()).collect();
        assert_eq!(cities, vec!["Agra", "Aligarh", "Lucknow", "Varanasi"]);
        assert_eq!(extraction.rows[1].yesterday_text, "N/A");
        assert_eq!(extraction.rows[3].today_text, "--");
    }

    #[test]
    fn header_row_is_skipped_only_once_per_page() {
        let adapter = GoodReturnsAdapter::new().unwrap();
        let markup = page(
            "Petrol Price in Goa",
            r#"<div class="gd-fuel-table-data">
                <table class="gd-fuel-table-list"><tbody>
                    <tr><td>City</td><td>Today</td><td>Yesterday</td></tr>
                    <tr><td><a>Margao</a></td><td>96.01</td><td>96.00</td></tr>
                </tbody></table>
                <table class="gd-fuel-table-list"><tbody>
                    <tr><td>City</td><td>Today</td><td>Yesterday</td></tr>
                    <tr><td><a>Panaji</a></td><td>96.10</td><td>96.10</td></tr>
                </tbody></table>
            </div>"#,
        );
        let extraction = adapter.extract(&markup, &tokens("goa-s11"), FuelType::Petrol);
        assert_eq!(
            extraction.rows,
            vec![
                row("Margao", "96.01", "96.00"),
                row("City", "Today", "Yesterday"),
                row("Panaji", "96.10", "96.10"),
            ]
        );
    }

    #[test]
    fn empty_first_table_defers_the_header_skip() {
        let adapter = GoodReturnsAdapter::new().unwrap();
        let markup = page(
            "Petrol Price in Goa",
            r#"<div class="gd-fuel-table-data">
                <table class="gd-fuel-table-list"></table>
                <table class="gd-fuel-table-list"><tbody>
                    <tr><td>City</td><td>Today</td><td>Yesterday</td></tr>
                    <tr><td><a>Panaji</a></td><td>96.10</td><td>96.10</td></tr>
                </tbody></table>
            </div>"#,
        );
        let extraction = adapter.extract(&markup, &tokens("goa-s11"), FuelType::Petrol);
        assert_eq!(extraction.rows, vec![row("Panaji", "96.10", "96.10")]);
    }

    #[test]
    fn city_text_falls_back_to_cell_text_then_sentinel() {
        let adapter = GoodReturnsAdapter::new().unwrap();
        let markup = page(
            "Diesel Price in Goa",
            r#"<div class="gd-fuel-table-data">
                <table class="gd-fuel-table-list"><tbody>
                    <tr><td>City</td><td>Today</td><td>Yesterday</td></tr>
                    <tr><td> Vasco da Gama </td><td>88.1</td><td>88.0</td></tr>
                    <tr><td><a href="/x"></a></td><td>88.2</td><td>88.2</td></tr>
                    <tr><td></td><td>88.3</td><td>88.3</td></tr>
                    <tr><td>Mapusa</td><td>88.4</td></tr>
                </tbody></table>
            </div>"#,
        );
        let extraction = adapter.extract(&markup, &tokens("goa-s11"), FuelType::Diesel);
        let cities: Vec<_> = extraction.rows.iter().map(|r| r.city_name.as_str()).collect();
        assert_eq!(cities, vec!["Vasco da Gama", "Unknown City", "Unknown City"]);
    }
}
