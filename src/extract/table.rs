// src/extract/table.rs
//
// Streaming HTML table extraction.
//
// A document is consumed as open/close/text events. Extraction only starts
// once the configured gate element has been entered; inside the gate every
// `<table>` bumps a counter and the selected tables are harvested row by row.
// Consecutive header rows stack up as header tiers; a header row that shows up
// after data rows closes the current group and starts a new one.

use tracing::{debug, trace};

use super::events::{events_from_html, MarkupEvent};
use super::raw_table::{RawRow, TableGroup};
use super::tag_stack::TagStack;
use crate::error::{ParseError, ParseResult};

/// Element that must be entered before tables are counted.
#[derive(Debug, Clone, Copy)]
pub enum Gate {
    /// Tables are counted from the start of the document.
    Document,
    /// An element `tag` whose attribute `attr` equals one of `values`.
    /// A `class` attribute matches on any of its space-separated names.
    Element {
        tag: &'static str,
        attr: &'static str,
        values: &'static [&'static str],
    },
}

impl Gate {
    fn matches(&self, name: &str, attrs: &[(String, String)]) -> bool {
        match self {
            Gate::Document => false,
            Gate::Element { tag, attr, values } => {
                name.eq_ignore_ascii_case(tag)
                    && attrs.iter().any(|(k, v)| {
                        k.eq_ignore_ascii_case(attr)
                            && if k.eq_ignore_ascii_case("class") {
                                v.split_whitespace().any(|c| values.contains(&c))
                            } else {
                                values.contains(&v.as_str())
                            }
                    })
            }
        }
    }
}

/// Which tables to harvest, counted from 1 across the whole document once the
/// gate is active.
#[derive(Debug, Clone, Copy)]
pub enum TableIndex {
    All,
    Nth(usize),
    From(usize),
}

impl TableIndex {
    fn selects(&self, n: usize) -> bool {
        match *self {
            TableIndex::All => true,
            TableIndex::Nth(i) => n == i,
            TableIndex::From(i) => n >= i,
        }
    }
}

/// Text that, found directly under the given tag path, means the source has
/// no data for the query.
#[derive(Debug, Clone, Copy)]
pub struct NoDataMarker {
    pub path: &'static [&'static str],
    pub text: &'static str,
}

#[derive(Debug, Clone, Copy)]
pub struct TableSpec {
    pub gate: Gate,
    pub tables: TableIndex,
    /// Lone-cell rows meaning "nothing found"; dropped silently.
    pub no_data_cells: &'static [&'static str],
    pub no_data_marker: Option<NoDataMarker>,
}

impl TableSpec {
    pub const fn gated(gate: Gate) -> Self {
        Self {
            gate,
            tables: TableIndex::All,
            no_data_cells: &[],
            no_data_marker: None,
        }
    }
}

/// Everything one document yielded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    pub groups: Vec<TableGroup>,
    /// The document carried its own "no data" marker.
    pub no_data: bool,
}

impl Extraction {
    /// All rows of all groups keyed by their group's leaf header.
    pub fn raw_rows(&self) -> ParseResult<Vec<RawRow>> {
        let mut out = Vec::new();
        for group in &self.groups {
            out.extend(group.raw_rows()?);
        }
        Ok(out)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    Gated,
    TrackingTable,
    InHeaderRow,
    InDataRow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CellKind {
    Header,
    Data,
}

#[derive(Debug)]
struct Cell {
    kind: CellKind,
    lines: Vec<String>,
    current: String,
}

impl Cell {
    fn new(kind: CellKind) -> Self {
        Self {
            kind,
            lines: Vec::new(),
            current: String::new(),
        }
    }

    fn line_break(&mut self) {
        self.lines.push(std::mem::take(&mut self.current));
    }

    /// Header cells keep their first line; data cells keep every non-empty
    /// line joined with `\n`.
    fn finish(mut self) -> String {
        self.line_break();
        let mut lines = self
            .lines
            .iter()
            .map(|l| clean_cell_text(l))
            .filter(|l| !l.is_empty());
        match self.kind {
            CellKind::Header => lines.next().unwrap_or_default(),
            CellKind::Data => lines.collect::<Vec<_>>().join("\n"),
        }
    }
}

/// Trim and drop non-breaking spaces.
pub fn clean_cell_text(raw: &str) -> String {
    raw.replace('\u{a0}', "").trim().to_string()
}

/// Explicit state machine over markup events.
pub struct TableExtractor<'a> {
    spec: &'a TableSpec,
    stack: TagStack,
    state: State,
    gate_depth: Option<usize>,
    table_count: usize,
    nested_tables: usize,
    cell: Option<Cell>,
    row: Vec<String>,
    row_has_data_cell: bool,
    group: TableGroup,
    out: Extraction,
}

impl<'a> TableExtractor<'a> {
    pub fn new(spec: &'a TableSpec) -> Self {
        let state = match spec.gate {
            Gate::Document => State::Gated,
            Gate::Element { .. } => State::Idle,
        };
        Self {
            spec,
            stack: TagStack::new(),
            state,
            gate_depth: None,
            table_count: 0,
            nested_tables: 0,
            cell: None,
            row: Vec::new(),
            row_has_data_cell: false,
            group: TableGroup::default(),
            out: Extraction::default(),
        }
    }

    pub fn advance(&mut self, event: &MarkupEvent) -> ParseResult<()> {
        match event {
            MarkupEvent::Open { name, attrs } => {
                let name = name.to_ascii_lowercase();
                self.stack.enter(&name);
                self.on_open(&name, attrs)
            }
            MarkupEvent::Close { name } => {
                let name = name.to_ascii_lowercase();
                let result = self.on_close(&name);
                self.stack.exit(&name);
                if let Some(depth) = self.gate_depth {
                    if self.stack.depth() < depth {
                        trace!(tag = %name, "gate closed");
                        self.gate_depth = None;
                        self.state = State::Idle;
                    }
                }
                result
            }
            MarkupEvent::Text(text) => {
                self.on_text(text);
                Ok(())
            }
        }
    }

    pub fn finish(mut self) -> ParseResult<Extraction> {
        if self.in_table() {
            self.finish_table()?;
        }
        Ok(self.out)
    }

    fn in_table(&self) -> bool {
        matches!(
            self.state,
            State::TrackingTable | State::InHeaderRow | State::InDataRow
        )
    }

    fn on_open(&mut self, name: &str, attrs: &[(String, String)]) -> ParseResult<()> {
        if self.state == State::Idle && self.spec.gate.matches(name, attrs) {
            trace!(tag = %name, "gate entered");
            self.gate_depth = Some(self.stack.depth());
            self.state = State::Gated;
        }

        if self.nested_tables > 0 {
            if name == "table" {
                self.nested_tables += 1;
            }
            return Ok(());
        }

        match (self.state, name) {
            (State::Idle, _) => {}
            (State::Gated, "table") => {
                self.table_count += 1;
                if self.spec.tables.selects(self.table_count) {
                    debug!(table = self.table_count, "harvesting table");
                    self.state = State::TrackingTable;
                }
            }
            (State::Gated, _) => {}
            (_, "table") => self.nested_tables += 1,
            (_, "tr") => {
                if matches!(self.state, State::InHeaderRow | State::InDataRow) {
                    // unclosed previous row
                    self.close_cell();
                    self.finish_row()?;
                }
                self.row.clear();
                self.row_has_data_cell = false;
                self.state = State::InHeaderRow;
            }
            (State::InHeaderRow | State::InDataRow, "th") => {
                self.close_cell();
                self.cell = Some(Cell::new(CellKind::Header));
            }
            (State::InHeaderRow | State::InDataRow, "td") => {
                self.close_cell();
                self.cell = Some(Cell::new(CellKind::Data));
                self.row_has_data_cell = true;
                self.state = State::InDataRow;
            }
            (_, "br") => {
                if let Some(cell) = self.cell.as_mut() {
                    cell.line_break();
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn on_close(&mut self, name: &str) -> ParseResult<()> {
        if self.nested_tables > 0 {
            if name == "table" {
                self.nested_tables -= 1;
            }
            return Ok(());
        }

        match (self.state, name) {
            // A close tag of either cell kind ends whichever cell is open.
            // Upstream pages sometimes close a `th` with `</td>`; treat the
            // stray close as the `th` it stands for.
            (State::InHeaderRow | State::InDataRow, "td" | "th") => {
                self.close_cell();
                Ok(())
            }
            (State::InHeaderRow | State::InDataRow, "tr") => {
                self.close_cell();
                self.state = State::TrackingTable;
                self.finish_row()
            }
            (State::TrackingTable | State::InHeaderRow | State::InDataRow, "table") => {
                self.finish_table()
            }
            _ => Ok(()),
        }
    }

    fn on_text(&mut self, text: &str) {
        if let Some(marker) = self.spec.no_data_marker {
            if self.stack.is_in_sequence(marker.path) && clean_cell_text(text) == marker.text {
                debug!(text = marker.text, "no-data marker found");
                self.out.no_data = true;
            }
        }
        if self.nested_tables > 0 {
            return;
        }
        if let Some(cell) = self.cell.as_mut() {
            cell.current.push_str(text);
        }
    }

    fn close_cell(&mut self) {
        if let Some(cell) = self.cell.take() {
            self.row.push(cell.finish());
        }
    }

    fn finish_row(&mut self) -> ParseResult<()> {
        let row = std::mem::take(&mut self.row);
        let has_data = std::mem::replace(&mut self.row_has_data_cell, false);
        if row.is_empty() {
            return Ok(());
        }

        if !has_data {
            if !self.group.rows.is_empty() {
                trace!(header = ?row, "header reset");
                self.flush_group();
            }
            self.group.headers.push(row);
            return Ok(());
        }

        if row.len() == 1 && (row[0].is_empty() || self.spec.no_data_cells.contains(&row[0].as_str()))
        {
            debug!(cell = %row[0], "dropping no-data row");
            return Ok(());
        }

        if self.group.headers.is_empty() {
            return Err(ParseError::mismatch(
                format!("table #{} data row before any header", self.table_count),
                "a header row",
                row,
            ));
        }
        self.group.rows.push(row);
        Ok(())
    }

    fn finish_table(&mut self) -> ParseResult<()> {
        self.close_cell();
        let result = self.finish_row();
        self.flush_group();
        self.state = if self.gate_depth.is_some() || matches!(self.spec.gate, Gate::Document) {
            State::Gated
        } else {
            State::Idle
        };
        result
    }

    fn flush_group(&mut self) {
        let group = std::mem::take(&mut self.group);
        if !group.is_empty() {
            debug!(
                tiers = group.headers.len(),
                rows = group.rows.len(),
                "table group complete"
            );
            self.out.groups.push(group);
        }
    }
}

/// Run the extractor over an already flattened event stream.
pub fn extract_events<'e, I>(events: I, spec: &TableSpec) -> ParseResult<Extraction>
where
    I: IntoIterator<Item = &'e MarkupEvent>,
{
    let mut extractor = TableExtractor::new(spec);
    for event in events {
        extractor.advance(event)?;
    }
    extractor.finish()
}

/// Parse `body` as HTML and extract the tables `spec` selects.
#[tracing::instrument(level = "debug", skip(body, spec), fields(body_len = body.len()))]
pub fn extract_tables(body: &str, spec: &TableSpec) -> ParseResult<Extraction> {
    let events = events_from_html(body);
    let extraction = extract_events(&events, spec)?;
    debug!(
        groups = extraction.groups.len(),
        no_data = extraction.no_data,
        "extraction finished"
    );
    Ok(extraction)
}

#[cfg(test)]
mod tests {
    use super::*;
    use MarkupEvent as E;

    const BORDERED: TableSpec = TableSpec {
        gate: Gate::Element {
            tag: "table",
            attr: "class",
            values: &["hasBorder"],
        },
        tables: TableIndex::All,
        no_data_cells: &["查無資料"],
        no_data_marker: Some(NoDataMarker {
            path: &["h4", "font"],
            text: "查無符合條件之資料",
        }),
    };

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn header_reset_starts_new_group() -> anyhow::Result<()> {
        let html = r#"
            <table class="hasBorder">
              <tr><th>公司<br>代號</th><th>值</th></tr>
              <tr><td>1101</td><td>1</td></tr>
              <tr><td>1102</td><td>2</td></tr>
              <tr><th>公司<br>代號</th><th>另一值</th></tr>
              <tr><td>2801</td><td>3</td></tr>
            </table>"#;
        let out = extract_tables(html, &BORDERED)?;

        assert_eq!(out.groups.len(), 2);
        assert_eq!(out.groups[0].header(), Some(&strings(&["公司", "值"])[..]));
        assert_eq!(out.groups[0].rows.len(), 2);
        assert_eq!(out.groups[1].header(), Some(&strings(&["公司", "另一值"])[..]));
        assert_eq!(out.groups[1].rows, vec![strings(&["2801", "3"])]);

        let rows = out.raw_rows()?;
        assert_eq!(rows[1].get("值"), Some("2"));
        assert_eq!(rows[2].get("另一值"), Some("3"));
        assert_eq!(rows[2].get("值"), None);
        Ok(())
    }

    #[test]
    fn consecutive_header_rows_become_tiers() -> anyhow::Result<()> {
        let html = r#"
            <table class="hasBorder">
              <tr><th>代號</th><th colspan="2">股利</th></tr>
              <tr><th>現金</th><th>股票</th></tr>
              <tr><td>2330</td><td>1.0</td><td>0</td></tr>
            </table>"#;
        let out = extract_tables(html, &BORDERED)?;
        assert_eq!(out.groups.len(), 1);
        assert_eq!(
            out.groups[0].headers,
            vec![strings(&["代號", "股利"]), strings(&["現金", "股票"])]
        );
        assert_eq!(out.groups[0].rows, vec![strings(&["2330", "1.0", "0"])]);
        Ok(())
    }

    #[test]
    fn tables_outside_gate_are_ignored_and_index_selects() -> anyhow::Result<()> {
        let html = r#"
            <table><tr><th>x</th></tr><tr><td>skip</td></tr></table>
            <div id="main">
              <table><tr><th>menu</th></tr><tr><td>nav</td></tr></table>
              <table><tr><th>日期</th></tr><tr><td>2024/01/02</td></tr></table>
            </div>
            <table><tr><th>after</th></tr><tr><td>skip</td></tr></table>"#;
        let spec = TableSpec {
            gate: Gate::Element {
                tag: "div",
                attr: "id",
                values: &["main"],
            },
            tables: TableIndex::Nth(2),
            no_data_cells: &[],
            no_data_marker: None,
        };
        let out = extract_tables(html, &spec)?;
        assert_eq!(out.groups.len(), 1);
        assert_eq!(out.groups[0].rows, vec![strings(&["2024/01/02"])]);
        Ok(())
    }

    #[test]
    fn line_breaks_fold_into_one_cell() -> anyhow::Result<()> {
        let html = r#"
            <table class="hasBorder">
              <tr><th>備註</th></tr>
              <tr><td>第一行<br>&nbsp;第二行 </td></tr>
            </table>"#;
        let out = extract_tables(html, &BORDERED)?;
        assert_eq!(out.groups[0].rows, vec![strings(&["第一行\n第二行"])]);
        Ok(())
    }

    #[test]
    fn sentinel_only_table_is_empty() -> anyhow::Result<()> {
        let html = r#"
            <table class="hasBorder">
              <tr><th>日期</th><th>事件</th><th>比例</th></tr>
              <tr><td>查無資料</td></tr>
            </table>"#;
        let out = extract_tables(html, &BORDERED)?;
        assert!(out.raw_rows()?.is_empty());
        Ok(())
    }

    #[test]
    fn data_without_header_is_an_error() {
        let html = r#"<table class="hasBorder"><tr><td>1</td><td>2</td></tr></table>"#;
        let err = extract_tables(html, &BORDERED).unwrap_err();
        assert!(matches!(err, ParseError::FormatMismatch { .. }));
    }

    #[test]
    fn width_mismatch_surfaces_on_keying() -> anyhow::Result<()> {
        let html = r#"
            <table class="hasBorder">
              <tr><th>a</th><th>b</th></tr>
              <tr><td>1</td></tr><tr><td>1</td><td>2</td><td>3</td></tr>
            </table>"#;
        let out = extract_tables(html, &BORDERED)?;
        assert!(matches!(
            out.raw_rows(),
            Err(ParseError::FormatMismatch { .. })
        ));
        Ok(())
    }

    #[test]
    fn no_data_marker_is_reported() -> anyhow::Result<()> {
        let html = r#"<h4><font color="red">查無符合條件之資料</font></h4>"#;
        let out = extract_tables(html, &BORDERED)?;
        assert!(out.no_data);
        assert!(out.groups.is_empty());
        Ok(())
    }

    #[test]
    fn stray_td_close_ends_header_cell() -> anyhow::Result<()> {
        let events = vec![
            E::open_with("table", &[("class", "hasBorder")]),
            E::open("tr"),
            E::open("th"),
            E::text("日期"),
            E::close("td"),
            E::open("th"),
            E::text("事件"),
            E::close("th"),
            E::close("tr"),
            E::open("tr"),
            E::open("td"),
            E::text("2024/01/02"),
            E::close("td"),
            E::open("td"),
            E::text("分割"),
            E::close("td"),
            E::close("tr"),
            E::close("table"),
        ];
        let out = extract_events(&events, &BORDERED)?;
        assert_eq!(out.groups[0].header(), Some(&strings(&["日期", "事件"])[..]));
        assert_eq!(out.groups[0].rows, vec![strings(&["2024/01/02", "分割"])]);
        Ok(())
    }

    #[test]
    fn nested_tables_do_not_leak() -> anyhow::Result<()> {
        let html = r#"
            <table class="hasBorder">
              <tr><th>a</th><th>b</th></tr>
              <tr><td>1</td><td><table><tr><td>inner</td></tr><tr><td><table><tr><td>deeper</td></tr></table></td></tr></table>2</td></tr>
            </table>"#;
        let out = extract_tables(html, &BORDERED)?;
        assert_eq!(out.groups.len(), 1);
        assert_eq!(out.groups[0].rows, vec![strings(&["1", "2"])]);
        Ok(())
    }
}
