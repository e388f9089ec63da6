//! Conversions between Excel-style `A1` references and 0-based indexes.

/// Sheet size limits of the xlsx format (`XFD1048576`).
pub(crate) const MAX_ROWS: usize = 1_048_576;
pub(crate) const MAX_COLUMNS: usize = 16_384;

/// Converts 0-based row & column indexes to an Excel-style reference in upper case.
pub(crate) fn index_to_reference(row: usize, col: usize) -> String {
    let mut column = col + 1;
    let mut reference = String::new();
    while column > 0 {
        column -= 1;
        reference.insert(0, (b'A' + (column % 26) as u8) as char);
        column /= 26;
    }
    reference.push_str(&(row + 1).to_string());
    reference
}

/// Converts column letters ("A", "AB") to a 0-based column index.
///
/// Columns past `XFD` are rejected.
pub(crate) fn col_to_index(letters: &str) -> Option<usize> {
    if letters.is_empty() {
        return None;
    }
    let mut number = 0usize;
    for letter in letters.bytes() {
        if !letter.is_ascii_uppercase() {
            return None;
        }
        number = number
            .checked_mul(26)?
            .checked_add((letter - b'A' + 1) as usize)
            .filter(|number| *number <= MAX_COLUMNS)?;
    }
    Some(number - 1)
}

/// Converts a 1-based row number string to a 0-based row index.
pub(crate) fn row_to_index(digits: &str) -> Option<usize> {
    digits
        .parse::<usize>()
        .ok()
        .filter(|row| (1..=MAX_ROWS).contains(row))
        .map(|row| row - 1)
}

/// Parses an Excel-style reference ("C12") into 0-based (row, col) indexes.
pub(crate) fn reference_to_index(reference: &str) -> Option<(usize, usize)> {
    let reference = reference.to_ascii_uppercase();
    let split = reference.find(|c: char| c.is_ascii_digit())?;
    let (letters, digits) = reference.split_at(split);
    Some((row_to_index(digits)?, col_to_index(letters)?))
}
