/// Field separator inside a stored table
pub const FIELD_DELIMITER: char = '\t';
/// Row separator inside a stored table
pub const ROW_DELIMITER: char = '\n';

/// Row/column view of a stored table text
///
/// The first line is the header, every following line is a data row. Rows are
/// kept exactly as long as they are in the text: a short row is not padded to
/// the header width.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Table {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    /// Parse tab/newline-delimited text.
    ///
    /// A trailing `\r` on each line is dropped and a final empty line left by
    /// a terminating newline does not count as a row. Blank lines in the middle
    /// are kept, they are data rows with one empty field.
    ///
    /// # Examples
    /// ```
    /// use sheet_search::table::Table;
    ///
    /// let table = Table::parse("Region\tAmount\nEast\t100\n");
    /// assert_eq!(table.header, vec!["Region", "Amount"]);
    /// assert_eq!(table.rows.len(), 1);
    /// ```
    pub fn parse(raw: &str) -> Self {
        let mut lines: Vec<&str> = raw
            .split(ROW_DELIMITER)
            .map(|line| line.strip_suffix('\r').unwrap_or(line))
            .collect();

        if lines.len() > 1 && lines.last().is_some_and(|line| line.is_empty()) {
            lines.pop();
        }

        let mut lines = lines.into_iter();
        let header = match lines.next() {
            Some(line) if !line.is_empty() || raw.contains(ROW_DELIMITER) => split_fields(line),
            _ => Vec::new(),
        };
        let rows = lines.map(split_fields).collect();

        Table { header, rows }
    }

    pub fn has_data_rows(&self) -> bool {
        !self.rows.is_empty()
    }

    /// Serialize back to the stored text form.
    pub fn to_raw(&self) -> String {
        std::iter::once(&self.header)
            .chain(self.rows.iter())
            .map(|fields| fields.join(&FIELD_DELIMITER.to_string()))
            .collect::<Vec<_>>()
            .join(&ROW_DELIMITER.to_string())
    }
}

fn split_fields(line: &str) -> Vec<String> {
    line.split(FIELD_DELIMITER).map(str::to_string).collect()
}
