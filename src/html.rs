//! Turns HTML tables into rectangular grids of cell text
//!
//! Spanned cells are repeated into every slot they cover, short rows are padded and a cell with
//! no visible text is `None`, so a grid can be sliced by plain row and column index.

use scraper::{ElementRef, Html, Selector};

pub type Cell = Option<String>;

/// First `<table>` in the document whose id is `id`
pub fn table_by_id<'a>(document: &'a Html, id: &str) -> Option<ElementRef<'a>> {
    let tables = Selector::parse("table").expect("table selector to compile");
    document.select(&tables).find(|table| table.value().id() == Some(id))
}

/// Visible text of an element with runs of whitespace collapsed
pub fn element_text(element: ElementRef) -> String {
    let raw: String = element.text().collect();
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn table_grid(table: ElementRef) -> Vec<Vec<Cell>> {
    let rows = table_rows(table);
    let mut slots: Vec<Vec<Option<Cell>>> = vec![Vec::new(); rows.len()];

    for (row_index, row) in rows.iter().enumerate() {
        let mut column = 0;
        for cell in child_elements(*row, &["td", "th"]) {
            // Skip slots already taken by a rowspan from above
            while matches!(slots[row_index].get(column), Some(Some(_))) {
                column += 1;
            }
            let text = Some(element_text(cell)).filter(|text| !text.is_empty());
            let colspan = span(cell, "colspan");
            let rowspan = span(cell, "rowspan");
            for covered_row in slots.iter_mut().skip(row_index).take(rowspan) {
                for offset in 0..colspan {
                    place(covered_row, column + offset, text.clone());
                }
            }
            column += colspan;
        }
    }

    let width = slots.iter().map(Vec::len).max().unwrap_or(0);
    slots
        .into_iter()
        .map(|row| {
            let mut row: Vec<Cell> = row.into_iter().map(Option::flatten).collect();
            row.resize(width, None);
            row
        })
        .collect()
}

/// `<tr>` elements belonging to this table, ignoring any nested tables
fn table_rows(table: ElementRef) -> Vec<ElementRef> {
    let mut rows = Vec::new();
    for child in child_elements(table, &["tr", "thead", "tbody", "tfoot"]) {
        if child.value().name() == "tr" {
            rows.push(child);
        } else {
            rows.extend(child_elements(child, &["tr"]));
        }
    }
    rows
}

fn child_elements<'a>(
    parent: ElementRef<'a>,
    names: &'static [&'static str],
) -> impl Iterator<Item = ElementRef<'a>> + 'a {
    parent
        .children()
        .filter_map(ElementRef::wrap)
        .filter(move |child| names.contains(&child.value().name()))
}

fn span(cell: ElementRef, attr: &str) -> usize {
    cell.value()
        .attr(attr)
        .and_then(|value| value.trim().parse::<usize>().ok())
        .filter(|&value| value > 0)
        .unwrap_or(1)
}

fn place(row: &mut Vec<Option<Cell>>, column: usize, text: Cell) {
    if row.len() <= column {
        row.resize(column + 1, None);
    }
    row[column] = Some(text);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid_of(html: &str) -> Vec<Vec<Cell>> {
        let document = Html::parse_document(html);
        let table = table_by_id(&document, "t").unwrap();
        table_grid(table)
    }

    fn s(text: &str) -> Cell {
        Some(text.to_string())
    }

    /// colspan and rowspan copy the cell into every position they cover
    #[test]
    fn spans_are_repeated() {
        let grid = grid_of(
            r#"<table id="t">
                <tr><th colspan="2">Allocation</th><th rowspan="2">Options</th></tr>
                <tr><td>2008</td><td>2009</td></tr>
                <tr><td> 10 </td><td></td><td>x</td></tr>
            </table>"#,
        );
        assert_eq!(
            grid,
            vec![
                vec![s("Allocation"), s("Allocation"), s("Options")],
                vec![s("2008"), s("2009"), s("Options")],
                vec![s("10"), None, s("x")],
            ]
        );
    }

    /// Rows shorter than the widest are padded with nulls; inner tables add no rows
    #[test]
    fn short_rows_are_padded_and_nested_tables_ignored() {
        let grid = grid_of(
            r#"<table id="t"><tbody>
                <tr><td>a</td><td>b</td><td>c</td></tr>
                <tr><td><table><tr><td>inner</td></tr></table>Outer
                    text</td></tr>
            </tbody></table>"#,
        );
        assert_eq!(grid.len(), 2);
        assert_eq!(grid[1], vec![s("inner Outer text"), None, None]);
    }

    /// An absent id gives `None` rather than an empty grid
    #[test]
    fn missing_table_is_none() {
        let document = Html::parse_document("<table id='other'></table>");
        assert!(table_by_id(&document, "t").is_none());
    }
}
