//! A small column-named table of nullable text cells
//!
//! Scraped fragments arrive with slightly different column sets (each phase has its own year
//! columns), so everything here lines columns up by name rather than by position.

use std::collections::HashMap;
use std::path::Path;

use csv::{Reader, Writer};

use crate::error::{Error, Result};
use crate::html::Cell;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        Table {
            columns,
            rows: Vec::new(),
        }
    }

    /// Uses `header` as column names, blank names become `""` and repeats get `.1`, `.2`...
    pub fn from_header_and_rows(header: Vec<Cell>, rows: Vec<Vec<Cell>>) -> Self {
        let mut columns: Vec<String> = Vec::with_capacity(header.len());
        for name in header {
            let name = name.unwrap_or_default();
            let mut candidate = name.clone();
            let mut repeat = 0;
            while columns.contains(&candidate) {
                repeat += 1;
                candidate = format!("{name}.{repeat}");
            }
            columns.push(candidate);
        }
        let mut table = Table::new(columns);
        for row in rows {
            table.push_row(row);
        }
        table
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True when there is nothing in the table, either no rows or no columns
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty() || self.columns.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column == name)
    }

    fn require_column(&self, name: &str) -> Result<usize> {
        self.column_index(name)
            .ok_or_else(|| Error::MissingColumn(name.to_string()))
    }

    pub fn get(&self, row: usize, column: &str) -> Option<&str> {
        let index = self.column_index(column)?;
        self.rows.get(row)?.get(index)?.as_deref()
    }

    pub fn column(&self, name: &str) -> Result<Vec<Option<&str>>> {
        let index = self.require_column(name)?;
        Ok(self.rows.iter().map(|row| row[index].as_deref()).collect())
    }

    /// Appends a row, padding or truncating it to the table width
    pub fn push_row(&mut self, mut row: Vec<Cell>) {
        row.resize(self.columns.len(), None);
        self.rows.push(row);
    }

    pub fn drop_column(&mut self, name: &str) -> Result<Vec<Cell>> {
        let index = self.require_column(name)?;
        self.columns.remove(index);
        Ok(self.rows.iter_mut().map(|row| row.remove(index)).collect())
    }

    /// Overwrites the column if it exists, otherwise appends it
    pub fn set_column(&mut self, name: &str, values: Vec<Cell>) {
        debug_assert_eq!(values.len(), self.rows.len());
        let index = match self.column_index(name) {
            Some(index) => index,
            None => {
                self.columns.push(name.to_string());
                for row in self.rows.iter_mut() {
                    row.push(None);
                }
                self.columns.len() - 1
            }
        };
        for (row, value) in self.rows.iter_mut().zip(values) {
            row[index] = value;
        }
    }

    pub fn rename(&mut self, renames: &[(&str, &str)]) {
        for column in self.columns.iter_mut() {
            if let Some((_, to)) = renames.iter().find(|(from, _)| *from == column.as_str()) {
                *column = to.to_string();
            }
        }
    }

    /// New table holding only `names`, in that order
    pub fn select(&self, names: &[String]) -> Result<Table> {
        let indices = names
            .iter()
            .map(|name| self.require_column(name))
            .collect::<Result<Vec<_>>>()?;
        Ok(Table {
            columns: names.to_vec(),
            rows: self
                .rows
                .iter()
                .map(|row| indices.iter().map(|&index| row[index].clone()).collect())
                .collect(),
        })
    }

    /// Keeps rows for which `keep` holds on the value of `column`, returns how many were dropped
    pub fn retain_rows<F>(&mut self, column: &str, mut keep: F) -> Result<usize>
    where
        F: FnMut(Option<&str>) -> bool,
    {
        let index = self.require_column(column)?;
        let before = self.rows.len();
        self.rows.retain(|row| keep(row[index].as_deref()));
        Ok(before - self.rows.len())
    }

    /// Stacks tables on top of each other, aligning columns by name
    ///
    /// Columns are ordered by first appearance; cells a table has no column for are `None`.
    pub fn concat(tables: Vec<Table>) -> Table {
        let mut columns: Vec<String> = Vec::new();
        for table in &tables {
            for column in &table.columns {
                if !columns.contains(column) {
                    columns.push(column.clone());
                }
            }
        }
        let mut stacked = Table::new(columns);
        stacked.rows.reserve(tables.iter().map(Table::len).sum());
        for table in tables {
            let targets: Vec<usize> = table
                .columns
                .iter()
                .filter_map(|column| stacked.column_index(column))
                .collect();
            for row in table.rows {
                let mut placed = vec![None; stacked.columns.len()];
                for (value, &target) in row.into_iter().zip(&targets) {
                    placed[target] = value;
                }
                stacked.rows.push(placed);
            }
        }
        stacked
    }

    /// Full outer join on the `on` columns
    ///
    /// Key columns appear once, in the left table's positions. Non-key columns present on both
    /// sides are suffixed `_x` (left) and `_y` (right). Matching rows keep the left table's
    /// order, then right-only rows follow in their own order. A `None` key matches a `None` key.
    /// A suffixed name already in use is numbered (`_x2`, `_y2`...) so names stay unique.
    pub fn outer_join(&self, other: &Table, on: &[&str]) -> Result<Table> {
        let left_keys = on
            .iter()
            .map(|name| self.require_column(name))
            .collect::<Result<Vec<_>>>()?;
        let right_keys = on
            .iter()
            .map(|name| other.require_column(name))
            .collect::<Result<Vec<_>>>()?;
        let right_values: Vec<usize> = (0..other.columns.len())
            .filter(|index| !right_keys.contains(index))
            .collect();

        let is_shared = |name: &String| !on.contains(&name.as_str()) && other.columns.contains(name);
        let mut columns: Vec<String> = Vec::with_capacity(self.columns.len() + right_values.len());
        for name in &self.columns {
            let column = if is_shared(name) {
                let taken = [self.columns.as_slice(), other.columns.as_slice(), columns.as_slice()];
                unused_name(name, "_x", &taken)
            } else {
                name.clone()
            };
            columns.push(column);
        }
        for &index in &right_values {
            let name = &other.columns[index];
            let column = if self.columns.contains(name) {
                let taken = [self.columns.as_slice(), other.columns.as_slice(), columns.as_slice()];
                unused_name(name, "_y", &taken)
            } else {
                name.clone()
            };
            columns.push(column);
        }

        let mut right_by_key: HashMap<Vec<Cell>, Vec<usize>> = HashMap::new();
        for (row_index, row) in other.rows.iter().enumerate() {
            let key = right_keys.iter().map(|&index| row[index].clone()).collect();
            right_by_key.entry(key).or_default().push(row_index);
        }

        let mut joined = Table::new(columns);
        let mut matched = vec![false; other.rows.len()];
        for left in &self.rows {
            let key: Vec<Cell> = left_keys.iter().map(|&index| left[index].clone()).collect();
            match right_by_key.get(&key) {
                Some(partners) => {
                    for &partner in partners {
                        matched[partner] = true;
                        let right = &other.rows[partner];
                        let mut row = left.clone();
                        row.extend(right_values.iter().map(|&index| right[index].clone()));
                        joined.rows.push(row);
                    }
                }
                None => {
                    let mut row = left.clone();
                    row.resize(joined.columns.len(), None);
                    joined.rows.push(row);
                }
            }
        }
        for (right, _) in other.rows.iter().zip(&matched).filter(|(_, seen)| !**seen) {
            let mut row = vec![None; self.columns.len()];
            for (&left_index, &right_index) in left_keys.iter().zip(&right_keys) {
                row[left_index] = right[right_index].clone();
            }
            row.extend(right_values.iter().map(|&index| right[index].clone()));
            joined.rows.push(row);
        }
        Ok(joined)
    }

    /// Writes a header row then one record per row, `None` as an empty field
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let mut writer = Writer::from_path(path)?;
        writer.write_record(&self.columns)?;
        for row in &self.rows {
            writer.write_record(row.iter().map(|cell| cell.as_deref().unwrap_or("")))?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Reads a csv written by [`Table::write_csv`], empty fields come back as `None`
    pub fn read_csv(path: &Path) -> Result<Table> {
        let mut reader = Reader::from_path(path)?;
        let columns = reader.headers()?.iter().map(str::to_string).collect();
        let mut table = Table::new(columns);
        for record in reader.records() {
            let record = record?;
            table.push_row(
                record
                    .iter()
                    .map(|field| Some(field.to_string()).filter(|field| !field.is_empty()))
                    .collect(),
            );
        }
        Ok(table)
    }
}

/// `name` plus `suffix`, numbered from 2 when that is already a column in any of `taken`
fn unused_name(name: &str, suffix: &str, taken: &[&[String]]) -> String {
    let mut candidate = format!("{name}{suffix}");
    let mut bump = 1;
    while taken.iter().any(|columns| columns.contains(&candidate)) {
        bump += 1;
        candidate = format!("{name}{suffix}{bump}");
    }
    candidate
}
