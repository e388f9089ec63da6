use crate::error::RustyCoverError;
use chrono::Duration;
use chrono::NaiveDate;
use std::fmt::Display;

/// What a numeric serial stands for once a date format is applied.
#[derive(Copy, Clone, Debug, PartialEq)]
pub(crate) enum Temporal {
    Date,
    Time,
    DateTime,
}

/// How the raw value of a `<c>` element is interpreted.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub(crate) enum CellType {
    #[default]
    Empty,
    Boolean,
    Number,
    /// Date-formatted number; `is_1904` selects the workbook epoch
    Serial { temporal: Temporal, is_1904: bool },
    /// `t="d"` cells, ISO 8601 text
    IsoDateTime,
    InlineString,
    SharedString,
    Error,
}

impl CellType {
    /// Date and time formats among the built-in `numFmtId` values.
    pub(crate) fn parse_builtin_number_format_id(id: &str, is_1904: bool) -> Option<Self> {
        let temporal = match id {
            "14" | "15" | "16" | "17" => Temporal::Date,
            "18" | "19" | "20" | "21" | "45" | "46" | "47" => Temporal::Time,
            "22" => Temporal::DateTime,
            _ => return None,
        };
        Some(Self::Serial { temporal, is_1904 })
    }

    /// Scans a format code for date (`y`, `d`) and time (`h`, `s`) tokens.
    ///
    /// Quoted literals, bracketed sections and escaped characters are ignored.
    pub(crate) fn parse_custom_number_format(format: &str, is_1904: bool) -> Self {
        let mut escaped = false;
        let mut quoted = false;
        let mut bracketed = false;
        let (mut date, mut time) = (false, false);
        for character in format.chars() {
            if escaped {
                escaped = false;
                continue;
            }
            match character {
                '_' | '\\' => escaped = true,
                '"' if !bracketed => quoted = !quoted,
                '[' if !quoted => bracketed = true,
                ']' if bracketed => bracketed = false,
                _ if quoted || bracketed => (),
                'Y' | 'y' | 'D' | 'd' => date = true,
                'H' | 'h' | 'S' | 's' => time = true,
                _ => (),
            }
        }

        let temporal = match (date, time) {
            (true, true) => Temporal::DateTime,
            (true, false) => Temporal::Date,
            (false, true) => Temporal::Time,
            (false, false) => return Self::Number,
        };
        Self::Serial { temporal, is_1904 }
    }
}

/// A non-empty cell of the register.
#[derive(Clone, Debug)]
pub(crate) struct Cell {
    /// 0-based
    pub(crate) row: usize,
    /// 0-based
    pub(crate) col: usize,
    pub(crate) kind: CellType,
    /// Raw value as stored in the sheet
    pub(crate) value: String,
}

impl Cell {
    /// Text of the cell, or `None` when it is whitespace only.
    pub(crate) fn to_text(&self) -> Option<String> {
        Some(self.to_string()).filter(|text| !text.trim().is_empty())
    }

    fn formatted(&self) -> Result<String, RustyCoverError> {
        let text = match self.kind {
            CellType::Boolean => (if self.value == "1" { "true" } else { "false" }).to_owned(),
            CellType::Number => integral_text(&self.value),
            CellType::Serial { temporal: Temporal::Date, is_1904 } => serial_date(&self.value, is_1904)?,
            CellType::Serial { temporal: Temporal::Time, .. } => serial_time(&self.value)?,
            CellType::Serial { temporal: Temporal::DateTime, is_1904 } => {
                format!("{} {}", serial_date(&self.value, is_1904)?, serial_time(&self.value)?)
            }
            CellType::IsoDateTime => self.value.replace('T', " "),
            _ => self.value.to_owned(),
        };
        Ok(text)
    }
}

impl Display for Cell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // unparsable serials show the stored value
        let text = self.formatted().unwrap_or_else(|_| self.value.to_owned());
        f.write_str(&text)
    }
}

/// Volume numbers are stored as floats; "3.0" reads back as "3".
fn integral_text(value: &str) -> String {
    match value.parse::<f64>() {
        Ok(number) if number.fract() == 0.0 && number.abs() < 1e15 => (number as i64).to_string(),
        _ => value.to_owned(),
    }
}

/// Far beyond any calendar date chrono represents; keeps the cast exact.
const MAX_SERIAL: f64 = 1e12;

/// Serial day number to `YYYY-MM-DD`.
///
/// In the 1900 system serials below 60 precede the phantom 1900-02-29.
fn serial_date(value: &str, is_1904: bool) -> Result<String, RustyCoverError> {
    let serial = value.parse::<f64>()?.trunc();
    let offset = match (is_1904, serial < 60.0) {
        (true, _) => 1462,
        (false, true) => 1,
        (false, false) => 0,
    };
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30).expect("NaiveDate Literal");
    let date = Some(serial)
        .filter(|serial| serial.abs() < MAX_SERIAL)
        .and_then(|serial| Duration::try_days(serial as i64 + offset))
        .and_then(|days| epoch.checked_add_signed(days))
        .ok_or_else(|| RustyCoverError::WithContextError(format!("Date serial '{value}' out of range")))?;
    Ok(date.format("%Y-%m-%d").to_string())
}

/// Fraction of a day to `HH:MM:SS`, with milliseconds when present.
fn serial_time(value: &str) -> Result<String, RustyCoverError> {
    let total = (value.parse::<f64>()?.fract() * 86_400_000f64).round() as i64;
    let (seconds, millis) = (total / 1_000, total % 1_000);
    let (hours, minutes, seconds) = (seconds / 3_600, seconds / 60 % 60, seconds % 60);
    if millis > 0 {
        Ok(format!("{hours:02}:{minutes:02}:{seconds:02}.{millis:03}"))
    } else {
        Ok(format!("{hours:02}:{minutes:02}:{seconds:02}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell(kind: CellType, value: &str) -> Cell {
        Cell { row: 0, col: 0, kind, value: value.to_owned() }
    }

    fn serial(temporal: Temporal) -> CellType {
        CellType::Serial { temporal, is_1904: false }
    }

    #[test]
    fn volume_numbers_lose_trailing_zero() {
        assert_eq!(cell(CellType::Number, "3").to_string(), "3");
        assert_eq!(cell(CellType::Number, "3.0").to_string(), "3");
        assert_eq!(cell(CellType::Number, "3.1").to_string(), "3.1");
        assert_eq!(cell(CellType::Boolean, "1").to_string(), "true");
    }

    #[test]
    fn serials_render_as_dates() {
        assert_eq!(cell(serial(Temporal::Date), "45292").to_string(), "2024-01-01");
        assert_eq!(cell(serial(Temporal::DateTime), "45292.5").to_string(), "2024-01-01 12:00:00");
        assert_eq!(cell(serial(Temporal::Time), "0.25").to_string(), "06:00:00");
        assert_eq!(cell(serial(Temporal::Date), "not a date").to_string(), "not a date");
        let is_1904 = CellType::Serial { temporal: Temporal::Date, is_1904: true };
        assert_eq!(cell(is_1904, "0").to_string(), "1904-01-01");
    }

    #[test]
    fn huge_serials_fall_back_to_stored_value() {
        for value in ["1e20", "-1e20", "1e11", "NaN", "inf"] {
            let date = cell(serial(Temporal::Date), value);
            assert_eq!(date.to_string(), value);
            assert!(serial_date(value, false).is_err());
        }
        assert_eq!(cell(serial(Temporal::DateTime), "1e20").to_string(), "1e20");
    }

    #[test]
    fn whitespace_is_blank() {
        assert_eq!(cell(CellType::InlineString, "  ").to_text(), None);
        assert_eq!(cell(CellType::InlineString, "Том 1").to_text(), Some("Том 1".to_owned()));
    }

    #[test]
    fn format_codes() {
        assert_eq!(CellType::parse_custom_number_format("dd.mm.yyyy", false), serial(Temporal::Date));
        assert_eq!(
            CellType::parse_custom_number_format("hh:mm", true),
            CellType::Serial { temporal: Temporal::Time, is_1904: true }
        );
        assert_eq!(CellType::parse_custom_number_format("\"day\" 0", false), CellType::Number);
        assert_eq!(CellType::parse_custom_number_format("[Red]0.00", false), CellType::Number);
        assert_eq!(CellType::parse_builtin_number_format_id("14", false), Some(serial(Temporal::Date)));
        assert_eq!(CellType::parse_builtin_number_format_id("0", false), None);
    }
}
