//! Strict ISO-8601 grammar for `@date` and `@time` payloads.
//!
//! ```text
//! 2023-03-09T14:30:05.123+01:00
//! ─────┬──── ───────┬──── ──┬──
//!      │            │       └── Zone: Z | ±hh[:]mm | ±hh:mm:ss
//!      │            └── Time: hh:mm:ss[.fraction]
//!      └── Date: yyyy-mm-dd (extended years: -yyyy…, +yyyyy…)
//! ```
//!
//! The Unicode minus sign (U+2212) is accepted wherever `-` marks a sign.

use nom::{
    IResult,
    branch::alt,
    bytes::complete::take_while_m_n,
    character::complete::{char, digit1, one_of},
    combinator::{all_consuming, opt, recognize, verify},
    sequence::{pair, tuple},
};

const SIGN_MINUS: &str = "-\u{2212}";
const SIGN_ANY: &str = "+-\u{2212}";

fn is_digit(c: char) -> bool {
    c.is_ascii_digit()
}

/// Two digits whose value lies in `lo..=hi`.
fn two_digits_in(input: &str, lo: u32, hi: u32) -> IResult<&str, &str> {
    verify(take_while_m_n(2, 2, is_digit), |s: &str| {
        s.parse::<u32>().is_ok_and(|v| (lo..=hi).contains(&v))
    })(input)
}

fn year(input: &str) -> IResult<&str, &str> {
    alt((
        take_while_m_n(4, 4, is_digit),
        recognize(pair(one_of(SIGN_MINUS), take_while_m_n(4, usize::MAX, is_digit))),
        recognize(pair(char('+'), take_while_m_n(5, usize::MAX, is_digit))),
    ))(input)
}

fn month(input: &str) -> IResult<&str, &str> {
    two_digits_in(input, 1, 12)
}

fn day(input: &str) -> IResult<&str, &str> {
    two_digits_in(input, 1, 31)
}

fn hour(input: &str) -> IResult<&str, &str> {
    two_digits_in(input, 0, 23)
}

fn min_sec(input: &str) -> IResult<&str, &str> {
    two_digits_in(input, 0, 59)
}

fn date(input: &str) -> IResult<&str, &str> {
    recognize(tuple((year, char('-'), month, char('-'), day)))(input)
}

fn time(input: &str) -> IResult<&str, &str> {
    recognize(tuple((
        hour,
        char(':'),
        min_sec,
        char(':'),
        min_sec,
        opt(pair(char('.'), digit1)),
    )))(input)
}

fn zone(input: &str) -> IResult<&str, &str> {
    alt((
        recognize(one_of("zZ")),
        recognize(tuple((
            one_of(SIGN_ANY),
            hour,
            alt((
                recognize(tuple((char(':'), min_sec, char(':'), min_sec))),
                recognize(pair(opt(char(':')), min_sec)),
            )),
        ))),
    ))(input)
}

/// `true` when the whole input is a plain calendar date.
pub fn is_plain_date(input: &str) -> bool {
    all_consuming(date)(input).is_ok()
}

/// `true` when the whole input is a full date-time with zone.
pub fn is_date_time(input: &str) -> bool {
    all_consuming(tuple((date, char('T'), time, zone)))(input).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_dates() {
        assert!(is_plain_date("2023-03-09"));
        assert!(is_plain_date("-0044-03-15"));
        assert!(is_plain_date("\u{2212}0044-03-15"));
        assert!(is_plain_date("+10000-01-01"));

        assert!(!is_plain_date("2023-13-01"));
        assert!(!is_plain_date("2023-00-01"));
        assert!(!is_plain_date("2023-01-32"));
        assert!(!is_plain_date("12345-01-01"));
        assert!(!is_plain_date("+1000-01-01"));
        assert!(!is_plain_date("2023-03-09T00:00:00Z"));
        assert!(!is_plain_date(""));
    }

    #[test]
    fn test_date_times() {
        assert!(is_date_time("2023-03-09T00:00:00Z"));
        assert!(is_date_time("2023-03-09T23:59:59.123456z"));
        assert!(is_date_time("2023-03-09T10:00:00+01:00"));
        assert!(is_date_time("2023-03-09T10:00:00-0130"));
        assert!(is_date_time("2023-03-09T10:00:00+01:00:30"));

        assert!(!is_date_time("2023-03-09"));
        assert!(!is_date_time("2023-03-09T24:00:00Z"));
        assert!(!is_date_time("2023-03-09T10:60:00Z"));
        assert!(!is_date_time("2023-03-09T10:00:00"));
        assert!(!is_date_time("2023-03-09T10:00:00+01"));
        assert!(!is_date_time("2023-03-09T10:00:00.Z"));
        assert!(!is_date_time("2023-03-09 10:00:00Z"));
    }
}
