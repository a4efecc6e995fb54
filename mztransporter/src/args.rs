pub(crate) fn non_negative_float(s: &str) -> Result<f64, String> {
    let value = s.parse::<f64>().map_err(|e| e.to_string())?;
    if !value.is_finite() || value < 0.0 {
        Err(format!("`{s}` is not a finite number greater than or equal to zero"))
    } else {
        Ok(value)
    }
}

pub(crate) fn proportion(s: &str) -> Result<f64, String> {
    let value = s.parse::<f64>().map_err(|e| e.to_string())?;
    if !(0.0..=1.0).contains(&value) {
        Err(format!("`{s}` is not between 0 and 1"))
    } else {
        Ok(value)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_value_parsers() {
        assert_eq!(non_negative_float("0.5"), Ok(0.5));
        assert!(non_negative_float("-0.5").is_err());
        assert!(non_negative_float("inf").is_err());
        assert!(non_negative_float("abc").is_err());
        assert_eq!(proportion("1"), Ok(1.0));
        assert!(proportion("1.5").unwrap_err().contains("between 0 and 1"));
    }
}
