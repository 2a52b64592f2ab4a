//! Lenient price parsing for values typed into the admin form.
//!
//! Prices arrive as JSON numbers or as text in either decimal convention
//! ("4,70", "4.70", "1.234,56", "1,234.56"). Anything that cannot be read as
//! a finite, non-negative number becomes `None` rather than an error.

use super::commands::products::RawPrice;

pub fn normalize_price(input: Option<&RawPrice>) -> Option<f64> {
    let value = match input? {
        RawPrice::Number(value) => Some(*value),
        RawPrice::Text(text) => parse_price_text(text),
    };
    value.filter(|value| value.is_finite() && *value >= 0.0)
}

fn parse_price_text(text: &str) -> Option<f64> {
    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.is_empty() {
        return None;
    }

    // with both separators present, whichever comes last is the decimal mark
    let normalized = match (compact.rfind('.'), compact.rfind(',')) {
        (Some(dot), Some(comma)) if comma < dot => compact.replace(',', ""),
        (Some(_), Some(_)) => compact.replace('.', "").replace(',', "."),
        _ => compact.replace(',', "."),
    };

    normalized.parse::<f64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(value: &str) -> Option<f64> {
        normalize_price(Some(&RawPrice::Text(value.to_string())))
    }

    #[test]
    fn test_missing_and_blank_are_none() {
        assert_eq!(normalize_price(None), None);
        assert_eq!(text(""), None);
        assert_eq!(text("   "), None);
    }

    #[test]
    fn test_both_decimal_conventions() {
        assert_eq!(text("4,70"), Some(4.7));
        assert_eq!(text("4.70"), Some(4.7));
        assert_eq!(text(" 12 "), Some(12.0));
        assert_eq!(text("1.234,56"), Some(1234.56));
        assert_eq!(text("1 234,5"), Some(1234.5));
        assert_eq!(text("1,234.56"), Some(1234.56));
        assert_eq!(text("12,345,678.9"), Some(12345678.9));
        assert_eq!(text("12.345.678,9"), Some(12345678.9));
    }

    #[test]
    fn test_negative_prices_are_none() {
        assert_eq!(text("-4,70"), None);
        assert_eq!(text("-1,234.56"), None);
        assert_eq!(normalize_price(Some(&RawPrice::Number(-0.5))), None);
        assert_eq!(text("0"), Some(0.0));
    }

    #[test]
    fn test_garbage_is_none() {
        assert_eq!(text("abc"), None);
        assert_eq!(text("4,7,0"), None);
        assert_eq!(text("inf"), None);
        assert_eq!(text("NaN"), None);
    }

    #[test]
    fn test_numbers_pass_through() {
        assert_eq!(normalize_price(Some(&RawPrice::Number(4.2))), Some(4.2));
        assert_eq!(normalize_price(Some(&RawPrice::Number(f64::INFINITY))), None);
    }
}
