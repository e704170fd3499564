use time::{Date, Duration, Month, PrimitiveDateTime, Time};

const SECONDS_PER_DAY: f64 = 86_400.0;
const EXACT_INTEGER_LIMIT: f64 = 1e15;

#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Empty,
    Text(String),
    Number(f64),
    Boolean(bool),
}

impl CellValue {
    /// Empty cells and empty strings both count as null.
    #[must_use]
    pub fn is_null(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Text(text) => text.is_empty(),
            Self::Number(_) | Self::Boolean(_) => false,
        }
    }

    /// Textual form used for type inference and text storage.
    #[must_use]
    pub fn to_text(&self) -> Option<String> {
        match self {
            Self::Empty => None,
            Self::Text(text) if text.is_empty() => None,
            Self::Text(text) => Some(text.clone()),
            Self::Number(number) => Some(format_number(*number)),
            Self::Boolean(flag) => Some(if *flag { "1" } else { "0" }.to_string()),
        }
    }
}

/// Whole numbers print without a fractional part; everything else uses the
/// shortest round-trip form.
#[must_use]
pub fn format_number(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < EXACT_INTEGER_LIMIT {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

/// `"AB12"` -> zero-based `(row, col)` = `(11, 27)`.
#[must_use]
pub(crate) fn reference_to_index(reference: &str) -> Option<(usize, usize)> {
    let split = reference.find(|ch: char| ch.is_ascii_digit())?;
    let (letters, digits) = reference.split_at(split);
    if letters.is_empty() {
        return None;
    }

    let mut col = 0usize;
    for ch in letters.chars() {
        if !ch.is_ascii_alphabetic() {
            return None;
        }
        let digit = (ch.to_ascii_uppercase() as u8 - b'A') as usize + 1;
        col = col.checked_mul(26)?.checked_add(digit)?;
    }

    let row = digits.parse::<usize>().ok()?;
    if row == 0 {
        return None;
    }

    Some((row - 1, col - 1))
}

/// Built-in number format ids that Excel renders as dates or times.
#[must_use]
pub(crate) fn is_builtin_date_format(id: u32) -> bool {
    matches!(id, 14..=22 | 27..=36 | 45..=47 | 50..=58)
}

/// Whether a custom `formatCode` renders numbers as dates or times.
#[must_use]
pub(crate) fn is_date_format_code(code: &str) -> bool {
    let mut in_quotes = false;
    let mut in_brackets = false;
    let mut bracket = String::new();
    let mut chars = code.chars();

    while let Some(ch) = chars.next() {
        if in_quotes {
            in_quotes = ch != '"';
            continue;
        }
        if in_brackets {
            if ch == ']' {
                in_brackets = false;
                let elapsed = bracket.to_ascii_lowercase();
                if !elapsed.is_empty() && elapsed.chars().all(|c| matches!(c, 'h' | 'm' | 's')) {
                    return true;
                }
                bracket.clear();
            } else {
                bracket.push(ch);
            }
            continue;
        }

        match ch {
            '"' => in_quotes = true,
            '[' => in_brackets = true,
            '\\' | '_' | '*' => {
                chars.next();
            }
            'y' | 'Y' | 'd' | 'D' | 'h' | 'H' | 's' | 'S' | 'm' | 'M' => return true,
            _ => {}
        }
    }

    false
}

/// Converts a date serial into `YYYY-MM-DD HH:MM:SS`.
#[must_use]
pub(crate) fn serial_to_datetime_text(serial: f64, is_1904: bool) -> Option<String> {
    if !serial.is_finite() || serial < 0.0 {
        return None;
    }

    let (base, adjusted) = if is_1904 {
        (Date::from_calendar_date(1904, Month::January, 1).ok()?, serial)
    } else {
        // Serial 60 is the nonexistent 1900-02-29; earlier serials shift by one day.
        let adjusted = if serial < 60.0 { serial + 1.0 } else { serial };
        (
            Date::from_calendar_date(1899, Month::December, 30).ok()?,
            adjusted,
        )
    };

    let seconds = (adjusted * SECONDS_PER_DAY).round() as i64;
    let datetime =
        PrimitiveDateTime::new(base, Time::MIDNIGHT).checked_add(Duration::seconds(seconds))?;

    Some(format!(
        "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
        datetime.year(),
        u8::from(datetime.month()),
        datetime.day(),
        datetime.hour(),
        datetime.minute(),
        datetime.second()
    ))
}

#[cfg(test)]
mod tests {
    use super::{
        CellValue, format_number, is_builtin_date_format, is_date_format_code,
        reference_to_index, serial_to_datetime_text,
    };

    #[test]
    fn whole_numbers_render_without_fraction() {
        assert_eq!(format_number(3.0), "3");
        assert_eq!(format_number(-12.0), "-12");
        assert_eq!(format_number(1.5), "1.5");
        assert_eq!(format_number(0.1), "0.1");
    }

    #[test]
    fn text_form_treats_empty_strings_as_null() {
        assert_eq!(CellValue::Text(String::new()).to_text(), None);
        assert!(CellValue::Text(String::new()).is_null());
        assert_eq!(CellValue::Boolean(true).to_text().as_deref(), Some("1"));
        assert_eq!(CellValue::Number(7.0).to_text().as_deref(), Some("7"));
    }

    #[test]
    fn parses_a1_references() {
        assert_eq!(reference_to_index("A1"), Some((0, 0)));
        assert_eq!(reference_to_index("B3"), Some((2, 1)));
        assert_eq!(reference_to_index("AB12"), Some((11, 27)));
        assert_eq!(reference_to_index("12"), None);
        assert_eq!(reference_to_index("A0"), None);
    }

    #[test]
    fn recognizes_date_formats() {
        assert!(is_builtin_date_format(14));
        assert!(!is_builtin_date_format(2));
        assert!(is_date_format_code("yyyy-mm-dd"));
        assert!(is_date_format_code("[h]:mm:ss"));
        assert!(!is_date_format_code("General"));
        assert!(!is_date_format_code("#,##0.00_);[Red](#,##0.00)"));
        assert!(!is_date_format_code("0 \"days\""));
    }

    #[test]
    fn converts_serials_in_both_date_systems() {
        assert_eq!(
            serial_to_datetime_text(45_292.0, false).as_deref(),
            Some("2024-01-01 00:00:00")
        );
        assert_eq!(
            serial_to_datetime_text(1.0, false).as_deref(),
            Some("1900-01-01 00:00:00")
        );
        assert_eq!(
            serial_to_datetime_text(45_292.5, false).as_deref(),
            Some("2024-01-01 12:00:00")
        );
        assert_eq!(
            serial_to_datetime_text(0.0, true).as_deref(),
            Some("1904-01-01 00:00:00")
        );
        assert_eq!(serial_to_datetime_text(-1.0, false), None);
    }
}
