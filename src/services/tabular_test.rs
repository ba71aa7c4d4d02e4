use super::*;

#[test]
fn parses_rows_in_order_keyed_by_header() {
    let src = parse_csv("product_name,price\nWidget A,9.99\nWidget B,19.99\n", 10).unwrap();
    assert_eq!(src.columns, vec!["product_name", "price"]);
    assert_eq!(src.len(), 2);
    assert_eq!(src.rows[0]["product_name"], "Widget A");
    assert_eq!(src.rows[1]["price"], "19.99");
}

#[test]
fn quoted_cells_keep_commas_and_whitespace() {
    let src = parse_csv("title\n\"Hello, world\"\n\"  padded  \"\n", 10).unwrap();
    assert_eq!(src.rows[0]["title"], "Hello, world");
    assert_eq!(src.rows[1]["title"], "  padded  ");
}

#[test]
fn ragged_rows_pad_and_truncate() {
    let src = parse_csv("a,b\n1\n2,3,4\n", 10).unwrap();
    assert_eq!(src.rows[0]["a"], "1");
    assert_eq!(src.rows[0]["b"], "");
    assert_eq!(src.rows[1]["b"], "3");
    assert_eq!(src.rows[1].len(), 2);
}

#[test]
fn blank_lines_are_skipped_and_bom_is_stripped() {
    let src = parse_csv("\u{feff}name\nA\n\nB\n", 10).unwrap();
    assert_eq!(src.columns, vec!["name"]);
    assert_eq!(src.len(), 2);
}

#[test]
fn header_only_yields_zero_rows() {
    let src = parse_csv("name,price\n", 10).unwrap();
    assert!(src.is_empty());
}

#[test]
fn empty_input_has_no_header() {
    assert!(matches!(parse_csv("", 10), Err(TabularError::MissingHeader)));
}

#[test]
fn blank_header_cell_is_rejected() {
    assert!(matches!(parse_csv("a,,c\n1,2,3\n", 10), Err(TabularError::EmptyColumn(1))));
}

#[test]
fn row_limit_is_enforced() {
    let err = parse_csv("n\n1\n2\n3\n", 2).unwrap_err();
    assert!(matches!(err, TabularError::TooManyRows { limit: 2 }));
    assert_eq!(parse_csv("n\n1\n2\n", 2).unwrap().len(), 2);
}
