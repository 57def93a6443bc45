//! The filter registry and the built-in filters.
//!
//! A filter takes the current value plus its parse-time literal
//! arguments and returns the next value. Filters never fail: bad input
//! passes through unchanged.

use std::collections::HashMap;
use std::sync::Arc;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::data::Data;

/// The shape of a filter handler.
pub type FilterFn = dyn Fn(Data, &[Data]) -> Data + Send + Sync;

/// Formats timestamp-like values for the `dateformat` filter. Supply
/// an implementation to [`crate::Engine::set_date_formatter`] to
/// replace the built-in UTC formatter. Returning `None` leaves the
/// value unchanged.
pub trait DateFormatter: Send + Sync {
    fn format(&self, value: &Data, pattern: &str) -> Option<String>;
}

/// `^[a-z]\w*$`
pub(crate) fn valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// A plain name-to-handler table. Registration with a taken name
/// overrides silently, built-ins included; lookup misses are the
/// caller's problem (the renderer skips them).
pub(crate) struct FilterRegistry {
    entries: HashMap<String, Arc<FilterFn>>,
}

impl FilterRegistry {
    pub fn builtins() -> FilterRegistry {
        let mut registry = FilterRegistry { entries: HashMap::new() };
        registry.insert("upper", Arc::new(|v, _| Data::String(v.to_string().to_uppercase())));
        registry.insert("lower", Arc::new(|v, _| Data::String(v.to_string().to_lowercase())));
        registry.insert("trim", Arc::new(|v, _| Data::String(v.to_string().trim().to_string())));
        registry.insert("replace", Arc::new(replace));
        registry.insert("json", Arc::new(json));
        registry.insert("urlencode", Arc::new(urlencode));
        registry.insert("numberformat", Arc::new(numberformat));
        registry.insert("dateformat", date_filter(Arc::new(BuiltinDateFormatter)));
        registry
    }

    pub fn insert(&mut self, name: &str, f: Arc<FilterFn>) {
        self.entries.insert(name.to_string(), f);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<FilterFn>> {
        self.entries.get(name)
    }
}

/// Wrap a date formatter as a `dateformat` filter handler.
pub(crate) fn date_filter(formatter: Arc<dyn DateFormatter>) -> Arc<FilterFn> {
    Arc::new(move |value, args| {
        let pattern = match args.first() {
            Some(arg) => arg.to_string(),
            None => return value,
        };
        match formatter.format(&value, &pattern) {
            Some(formatted) => Data::String(formatted),
            None => value,
        }
    })
}

fn replace(value: Data, args: &[Data]) -> Data {
    let (from, to) = match (args.first(), args.get(1)) {
        (Some(from), Some(to)) => (from.to_string(), to.to_string()),
        _ => return value,
    };
    if from.is_empty() {
        return value;
    }
    Data::String(value.to_string().replace(&from, &to))
}

fn json(value: Data, _args: &[Data]) -> Data {
    match serde_json::to_string(&value) {
        Ok(encoded) => Data::String(encoded),
        Err(_) => value,
    }
}

// Keeps A-Z a-z 0-9 - _ . ! ~ * ' ( ) unencoded.
const URLENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

fn urlencode(value: Data, _args: &[Data]) -> Data {
    let s = value.to_string();
    Data::String(utf8_percent_encode(&s, URLENCODE_SET).to_string())
}

/// Fixed decimal places (default 0) with `,` thousands separators.
fn numberformat(value: Data, args: &[Data]) -> Data {
    let n = match &value {
        Data::Number(n) if n.is_finite() => *n,
        Data::String(s) => match s.trim().parse::<f64>() {
            Ok(n) if n.is_finite() => n,
            _ => return value,
        },
        _ => return value,
    };

    let decimals = match args.first() {
        Some(&Data::Number(d)) if d >= 0.0 && d.is_finite() => (d as usize).min(17),
        Some(_) => return value,
        None => 0,
    };

    let formatted = format!("{:.*}", decimals, n.abs());
    let (int_part, frac_part) = match formatted.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (formatted.as_str(), None),
    };

    let mut out = String::new();
    // suppress the sign when rounding leaves only zeros
    if n < 0.0 && formatted.bytes().any(|b| b.is_ascii_digit() && b != b'0') {
        out.push('-');
    }
    let digits = int_part.as_bytes();
    for (i, &b) in digits.iter().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(b as char);
    }
    if let Some(frac) = frac_part {
        out.push('.');
        out.push_str(frac);
    }
    Data::String(out)
}

/// The default `dateformat` backend: interprets the value as epoch
/// milliseconds (numbers, numeric strings, or `YYYY-MM-DD[ T]HH:MM:SS`
/// strings) and renders it in UTC.
///
/// Pattern tokens: `YYYY YY M MM D DD H HH h hh m mm s ss Z A a`;
/// `[bracketed]` spans are copied literally.
struct BuiltinDateFormatter;

impl DateFormatter for BuiltinDateFormatter {
    fn format(&self, value: &Data, pattern: &str) -> Option<String> {
        let millis = epoch_millis(value)?;
        Some(format_utc(millis, pattern))
    }
}

fn epoch_millis(value: &Data) -> Option<i64> {
    let n = match value {
        Data::Number(n) if n.is_finite() => *n,
        Data::String(s) => {
            let s = s.trim();
            match s.parse::<f64>() {
                Ok(n) if n.is_finite() => n,
                _ => return parse_datetime(s),
            }
        }
        _ => return None,
    };
    Some(n.floor() as i64)
}

fn parse_datetime(s: &str) -> Option<i64> {
    let (date, time) = match s.split_once(|c| c == ' ' || c == 'T') {
        Some((date, time)) => (date, Some(time)),
        None => (s, None),
    };

    let mut parts = date.split('-');
    let year: i64 = parts.next()?.parse().ok()?;
    let month: u32 = parts.next()?.parse().ok()?;
    let day: u32 = parts.next()?.parse().ok()?;
    // the year bound keeps the epoch math inside i64
    if parts.next().is_some()
        || !(-9999..=9999).contains(&year)
        || !(1..=12).contains(&month)
        || !(1..=31).contains(&day)
    {
        return None;
    }

    let (hour, minute, second) = match time {
        None => (0, 0, 0),
        Some(time) => {
            let mut parts = time.split(':');
            let hour: u32 = parts.next()?.parse().ok()?;
            let minute: u32 = parts.next()?.parse().ok()?;
            let second: u32 = parts.next()?.parse().ok()?;
            if parts.next().is_some() || hour > 23 || minute > 59 || second > 59 {
                return None;
            }
            (hour, minute, second)
        }
    };

    let seconds = days_from_civil(year, month, day) * 86_400
        + i64::from(hour) * 3600
        + i64::from(minute) * 60
        + i64::from(second);
    Some(seconds * 1000)
}

// Days since 1970-01-01 for a proleptic Gregorian date
// (Howard Hinnant's civil-days algorithm).
fn days_from_civil(year: i64, month: u32, day: u32) -> i64 {
    let y = if month <= 2 { year - 1 } else { year };
    let era = if y >= 0 { y } else { y - 399 } / 400;
    let yoe = y - era * 400;
    let mp = i64::from(if month > 2 { month - 3 } else { month + 9 });
    let doy = (153 * mp + 2) / 5 + i64::from(day) - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    era * 146_097 + doe - 719_468
}

fn civil_from_days(days: i64) -> (i64, u32, u32) {
    let z = days + 719_468;
    let era = if z >= 0 { z } else { z - 146_096 } / 146_097;
    let doe = z - era * 146_097;
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let month = (if mp < 10 { mp + 3 } else { mp - 9 }) as u32;
    let year = yoe + era * 400 + i64::from(month <= 2);
    (year, month, day)
}

fn format_utc(millis: i64, pattern: &str) -> String {
    let days = millis.div_euclid(86_400_000);
    let tod = (millis.rem_euclid(86_400_000) / 1000) as u32;
    let (year, month, day) = civil_from_days(days);
    let hour = tod / 3600;
    let minute = tod / 60 % 60;
    let second = tod % 60;

    let mut out = String::new();
    let mut rest = pattern;
    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix('[') {
            match after.find(']') {
                Some(end) => {
                    out.push_str(&after[..end]);
                    rest = &after[end + 1..];
                }
                None => {
                    out.push_str(after);
                    rest = "";
                }
            }
            continue;
        }

        let token_len = match rest {
            _ if rest.starts_with("YYYY") => {
                out.push_str(&format!("{:04}", year));
                4
            }
            _ if rest.starts_with("YY") => {
                out.push_str(&format!("{:02}", year.rem_euclid(100)));
                2
            }
            _ if rest.starts_with("MM") => {
                out.push_str(&format!("{:02}", month));
                2
            }
            _ if rest.starts_with('M') => {
                out.push_str(&month.to_string());
                1
            }
            _ if rest.starts_with("DD") => {
                out.push_str(&format!("{:02}", day));
                2
            }
            _ if rest.starts_with('D') => {
                out.push_str(&day.to_string());
                1
            }
            _ if rest.starts_with("HH") => {
                out.push_str(&format!("{:02}", hour));
                2
            }
            _ if rest.starts_with('H') => {
                out.push_str(&hour.to_string());
                1
            }
            _ if rest.starts_with("hh") => {
                out.push_str(&format!("{:02}", hour12(hour)));
                2
            }
            _ if rest.starts_with('h') => {
                out.push_str(&hour12(hour).to_string());
                1
            }
            _ if rest.starts_with("mm") => {
                out.push_str(&format!("{:02}", minute));
                2
            }
            _ if rest.starts_with('m') => {
                out.push_str(&minute.to_string());
                1
            }
            _ if rest.starts_with("ss") => {
                out.push_str(&format!("{:02}", second));
                2
            }
            _ if rest.starts_with('s') => {
                out.push_str(&second.to_string());
                1
            }
            _ if rest.starts_with('Z') => {
                out.push_str("+00:00");
                1
            }
            _ if rest.starts_with('A') => {
                out.push_str(if hour < 12 { "AM" } else { "PM" });
                1
            }
            _ if rest.starts_with('a') => {
                out.push_str(if hour < 12 { "am" } else { "pm" });
                1
            }
            _ => {
                let c = rest.chars().next().unwrap_or('\0');
                out.push(c);
                c.len_utf8()
            }
        };
        rest = &rest[token_len..];
    }
    out
}

fn hour12(hour: u32) -> u32 {
    match hour % 12 {
        0 => 12,
        h => h,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply(registry: &FilterRegistry, name: &str, value: Data, args: &[Data]) -> Data {
        let f = registry.get(name).unwrap();
        f(value, args)
    }

    #[test]
    fn name_validation() {
        assert!(valid_name("upper"));
        assert!(valid_name("my_filter2"));
        assert!(!valid_name(""));
        assert!(!valid_name("Upper"));
        assert!(!valid_name("_x"));
        assert!(!valid_name("9lives"));
        assert!(!valid_name("has-dash"));
    }

    #[test]
    fn string_transforms() {
        let r = FilterRegistry::builtins();
        assert_eq!(
            apply(&r, "upper", Data::String("héllo".into()), &[]),
            Data::String("HÉLLO".into())
        );
        assert_eq!(
            apply(&r, "lower", Data::String("MIXED Case".into()), &[]),
            Data::String("mixed case".into())
        );
        assert_eq!(
            apply(&r, "trim", Data::String("  x \n".into()), &[]),
            Data::String("x".into())
        );
        // non-strings are stringified first
        assert_eq!(apply(&r, "upper", Data::Bool(true), &[]), Data::String("TRUE".into()));
    }

    #[test]
    fn replace_filter() {
        let r = FilterRegistry::builtins();
        let args = [Data::String("a".into()), Data::String("o".into())];
        assert_eq!(
            apply(&r, "replace", Data::String("banana".into()), &args),
            Data::String("bonono".into())
        );
        // missing args pass through
        assert_eq!(
            apply(&r, "replace", Data::String("x".into()), &[]),
            Data::String("x".into())
        );
    }

    #[test]
    fn json_filter() {
        let r = FilterRegistry::builtins();
        assert_eq!(
            apply(&r, "json", Data::String("a\"b".into()), &[]),
            Data::String("\"a\\\"b\"".into())
        );
        assert_eq!(
            apply(&r, "json", Data::Vec(vec![Data::Number(1.0), Data::Null]), &[]),
            Data::String("[1,null]".into())
        );
    }

    #[test]
    fn urlencode_filter() {
        let r = FilterRegistry::builtins();
        assert_eq!(
            apply(&r, "urlencode", Data::String("a b&c=d".into()), &[]),
            Data::String("a%20b%26c%3Dd".into())
        );
        assert_eq!(
            apply(&r, "urlencode", Data::String("safe-_.!~*'()".into()), &[]),
            Data::String("safe-_.!~*'()".into())
        );
    }

    #[test]
    fn numberformat_filter() {
        let r = FilterRegistry::builtins();
        assert_eq!(
            apply(&r, "numberformat", Data::Number(1234567.0), &[]),
            Data::String("1,234,567".into())
        );
        assert_eq!(
            apply(&r, "numberformat", Data::Number(1234.5), &[Data::Number(2.0)]),
            Data::String("1,234.50".into())
        );
        assert_eq!(
            apply(&r, "numberformat", Data::Number(-1234.0), &[]),
            Data::String("-1,234".into())
        );
        assert_eq!(
            apply(&r, "numberformat", Data::Number(999.0), &[]),
            Data::String("999".into())
        );
        // non-numeric passes through
        assert_eq!(
            apply(&r, "numberformat", Data::String("n/a".into()), &[]),
            Data::String("n/a".into())
        );
    }

    #[test]
    fn civil_day_conversions() {
        assert_eq!(days_from_civil(1970, 1, 1), 0);
        assert_eq!(days_from_civil(1970, 1, 2), 1);
        assert_eq!(days_from_civil(1969, 12, 31), -1);
        assert_eq!(days_from_civil(2000, 3, 1), 11017);

        for days in [-1000, -1, 0, 1, 10000, 20000] {
            let (y, m, d) = civil_from_days(days);
            assert_eq!(days_from_civil(y, m, d), days);
        }
    }

    #[test]
    fn dateformat_from_epoch_millis() {
        let r = FilterRegistry::builtins();
        let args = [Data::String("YYYY-MM-DD HH:mm:ss".into())];
        assert_eq!(
            apply(&r, "dateformat", Data::Number(0.0), &args),
            Data::String("1970-01-01 00:00:00".into())
        );
        // 2021-03-04T05:06:07Z
        assert_eq!(
            apply(&r, "dateformat", Data::Number(1614834367000.0), &args),
            Data::String("2021-03-04 05:06:07".into())
        );
        // negative: before the epoch
        assert_eq!(
            apply(&r, "dateformat", Data::Number(-1000.0), &args),
            Data::String("1969-12-31 23:59:59".into())
        );
    }

    #[test]
    fn dateformat_from_strings() {
        let r = FilterRegistry::builtins();
        let args = [Data::String("D/M/YYYY".into())];
        assert_eq!(
            apply(&r, "dateformat", Data::String("2021-03-04 05:06:07".into()), &args),
            Data::String("4/3/2021".into())
        );
        assert_eq!(
            apply(&r, "dateformat", Data::String("2021-03-04".into()), &args),
            Data::String("4/3/2021".into())
        );
        // numeric string is epoch millis
        assert_eq!(
            apply(&r, "dateformat", Data::String("0".into()), &args),
            Data::String("1/1/1970".into())
        );
    }

    #[test]
    fn dateformat_tokens() {
        let r = FilterRegistry::builtins();
        let at = Data::String("2021-03-04 15:06:07".into());
        let fmt = |pattern: &str| {
            apply(&r, "dateformat", at.clone(), &[Data::String(pattern.into())])
        };
        assert_eq!(fmt("YY"), Data::String("21".into()));
        assert_eq!(fmt("h:mm A"), Data::String("3:06 PM".into()));
        assert_eq!(fmt("hh a"), Data::String("03 pm".into()));
        assert_eq!(fmt("HH Z"), Data::String("15 +00:00".into()));
        assert_eq!(fmt("[Year] YYYY"), Data::String("Year 2021".into()));
        // unknown characters copy through
        assert_eq!(fmt("YYYY/MM"), Data::String("2021/03".into()));
    }

    #[test]
    fn dateformat_passthrough() {
        let r = FilterRegistry::builtins();
        let args = [Data::String("YYYY".into())];
        assert_eq!(
            apply(&r, "dateformat", Data::String("not a date".into()), &args),
            Data::String("not a date".into())
        );
        assert_eq!(apply(&r, "dateformat", Data::Null, &args), Data::Null);
        // no pattern argument
        assert_eq!(
            apply(&r, "dateformat", Data::Number(0.0), &[]),
            Data::Number(0.0)
        );
    }

    #[test]
    fn dateformat_absurd_years_pass_through() {
        let r = FilterRegistry::builtins();
        let args = [Data::String("YYYY".into())];
        // out-of-range years must not enter the epoch math
        assert_eq!(
            apply(
                &r,
                "dateformat",
                Data::String("999999999999999999-01-01".into()),
                &args
            ),
            Data::String("999999999999999999-01-01".into())
        );
        assert_eq!(
            apply(&r, "dateformat", Data::String("400000000000000-06-15".into()), &args),
            Data::String("400000000000000-06-15".into())
        );
        assert_eq!(
            apply(&r, "dateformat", Data::String("10000-01-01".into()), &args),
            Data::String("10000-01-01".into())
        );
        // huge epoch numbers saturate instead of overflowing
        let out = apply(&r, "dateformat", Data::Number(1.0e300), &args);
        assert!(matches!(out, Data::String(_)));
    }

    #[test]
    fn registration_overrides_silently() {
        let mut r = FilterRegistry::builtins();
        r.insert("upper", Arc::new(|_, _| Data::String("X".into())));
        assert_eq!(
            apply(&r, "upper", Data::String("abc".into()), &[]),
            Data::String("X".into())
        );
        assert!(r.get("nope").is_none());
    }
}
