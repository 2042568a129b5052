//! Table rendering for the default output format
//!
//! Rows keep the order they were added in; commands sort and limit their
//! data before building the table so JSON and YAML see the same rows.
//! Auto-merge blanks a cell that repeats the value right above it, which
//! reads as grouped rows.

use tabled::{builder::Builder, settings::Style};

use crate::cli::printer::Printer;

#[derive(Debug, Clone, PartialEq, Eq)]
enum TableRow {
    Cells(Vec<String>),
    Separator,
}

#[derive(Debug, Clone, Default)]
pub struct Table {
    title: Option<String>,
    headers: Vec<String>,
    rows: Vec<TableRow>,
    /// 1-based column numbers
    merge_columns: Vec<usize>,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    /// Line printed above the table
    pub fn set_title(&mut self, title: &str) {
        self.title = Some(title.to_string());
    }

    pub fn set_header<I, S>(&mut self, headers: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.headers = headers.into_iter().map(Into::into).collect();
    }

    pub fn add_row<I, S>(&mut self, cells: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rows
            .push(TableRow::Cells(cells.into_iter().map(Into::into).collect()));
    }

    /// Horizontal rule between groups of rows
    pub fn add_separator(&mut self) {
        self.rows.push(TableRow::Separator);
    }

    /// Blank repeated values in the given 1-based columns
    pub fn enable_auto_merge_on_columns(&mut self, columns: &[usize]) {
        self.merge_columns = columns.to_vec();
    }

    fn prepared_rows(&self) -> Vec<TableRow> {
        let mut rows = self.rows.clone();
        while matches!(rows.last(), Some(TableRow::Separator)) {
            rows.pop();
        }

        for &col in &self.merge_columns {
            let mut previous: Option<String> = None;
            for row in rows.iter_mut() {
                if let TableRow::Cells(cells) = row {
                    if let Some(value) = cells.get_mut(col.wrapping_sub(1)) {
                        let original = value.clone();
                        if previous.as_deref() == Some(original.as_str()) {
                            value.clear();
                        }
                        previous = Some(original);
                    }
                }
            }
        }
        rows
    }

    /// Render to a string without a trailing newline
    pub fn render(&self) -> String {
        let rows = self.prepared_rows();
        let columns = rows
            .iter()
            .map(|r| match r {
                TableRow::Cells(c) => c.len(),
                TableRow::Separator => 0,
            })
            .chain(std::iter::once(self.headers.len()))
            .max()
            .unwrap_or(0);

        let mut body: Vec<Option<Vec<String>>> = Vec::with_capacity(rows.len());
        for row in &rows {
            match row {
                TableRow::Cells(cells) => {
                    let mut line = cells.clone();
                    line.resize(columns, String::new());
                    body.push(Some(line));
                }
                TableRow::Separator => body.push(None),
            }
        }

        let mut widths = vec![0usize; columns];
        for line in body.iter().flatten().chain(std::iter::once(&self.headers)) {
            for (i, c) in line.iter().enumerate() {
                let w = c
                    .lines()
                    .map(console::measure_text_width)
                    .max()
                    .unwrap_or(0);
                widths[i] = widths[i].max(w);
            }
        }

        let mut builder = Builder::default();
        if !self.headers.is_empty() {
            let mut header = self.headers.clone();
            header.resize(columns, String::new());
            builder.push_record(header);
        }
        for line in body {
            match line {
                Some(cells) => builder.push_record(cells),
                None => builder.push_record(widths.iter().map(|w| "─".repeat(*w))),
            }
        }
        let rendered = builder.build().with(Style::rounded()).to_string();
        match &self.title {
            Some(title) => format!("{}\n{}", console::style(title).bold(), rendered),
            None => rendered,
        }
    }

    pub fn display(&self, p: &Printer) {
        p.outputln(&self.render());
    }
}
