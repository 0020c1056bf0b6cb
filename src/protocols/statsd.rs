//! Parser for the statsd line protocol.
//!
//! Valid message formats are:
//!
//! - `<str:metric_name>:<f64:value>|c[|@<f64:rate>]`
//! - `<str:metric_name>:<f64:value>|ms[|@<f64:rate>]`
//! - `<str:metric_name>:<f64:value>|g`
//! - `<str:metric_name>:<f64:value>|s`
//!
//! Multiple samples can be sent in a single datagram separated by
//! newlines. A malformed sample does not invalidate the rest of the
//! datagram: the parser resynchronizes at the next newline and keeps
//! going, so samples preceding and following a bad one are still
//! yielded.

use std::str::FromStr;

use error::Error;
use metric::{MetricType, Sample};

/// Parse one UDP datagram's worth of statsd text into samples.
///
/// Well-formed samples are appended to `out`; malformed ones produce a
/// `Parse` error appended to `errors`. Parsing never aborts early: on
/// a bad sample it skips to the next newline (or end of buffer) and
/// resumes, matching the reference daemon's recovery behavior.
pub fn parse(source: &str, out: &mut Vec<Sample>, errors: &mut Vec<Error>) {
    let mut rest = source;
    while !rest.is_empty() {
        let (line, remainder) = match rest.find('\n') {
            Some(idx) => (&rest[..idx], &rest[idx + 1..]),
            None => (rest, ""),
        };
        rest = remainder;
        if line.is_empty() {
            continue;
        }
        match parse_sample(line) {
            Ok(sample) => out.push(sample),
            Err(e) => errors.push(e),
        }
    }
}

fn parse_sample(line: &str) -> Result<Sample, Error> {
    let colon = line
        .find(':')
        .ok_or_else(|| Error::Parse(format!("no ':' in {:?}", line)))?;
    let name = &line[..colon];
    if name.is_empty() {
        return Err(Error::Parse("empty metric name".to_string()));
    }

    let after_name = &line[colon + 1..];
    let pipe = after_name
        .find('|')
        .ok_or_else(|| Error::Parse(format!("no '|' in {:?}", line)))?;
    let raw_value = &after_name[..pipe];
    let value = f64::from_str(raw_value)
        .map_err(|_| Error::Parse(format!("bad value {:?}", raw_value)))?;

    let after_value = &after_name[pipe + 1..];
    let (kind, after_type) = parse_type_code(after_value)?;

    let (rate, trailer) = match after_type.strip_prefix('|') {
        Some(rest) => {
            if !matches!(kind, MetricType::Counter | MetricType::Timer) {
                return Err(Error::Parse(format!(
                    "sample rate not permitted for {:?}",
                    kind
                )));
            }
            let rate_text = rest
                .strip_prefix('@')
                .ok_or_else(|| Error::Parse(format!("no '@' in {:?}", line)))?;
            let rate = f64::from_str(rate_text)
                .map_err(|_| Error::Parse(format!("bad rate {:?}", rate_text)))?;
            (Some(rate), "")
        }
        None => (None, after_type),
    };

    if !trailer.is_empty() {
        return Err(Error::Parse(format!("trailing garbage {:?}", trailer)));
    }

    Ok(Sample {
        name: name.to_string(),
        value,
        raw_value: raw_value.to_string(),
        kind,
        rate,
    })
}

/// Match the longest prefix drawn from `{c,g,m,s}`, then compare that
/// span for exact equality against the four valid type codes. This
/// two-step match (rather than a simple prefix match) is what rejects
/// ambiguous codes like `cg` or `gc` as parse errors instead of
/// silently matching a prefix of them.
fn parse_type_code(s: &str) -> Result<(MetricType, &str), Error> {
    let span_len = s
        .find(|c: char| !matches!(c, 'c' | 'g' | 'm' | 's'))
        .unwrap_or_else(|| s.len());
    let span = &s[..span_len];
    let kind = match span {
        "c" => MetricType::Counter,
        "ms" => MetricType::Timer,
        "g" => MetricType::Gauge,
        "s" => MetricType::Set,
        other => return Err(Error::Parse(format!("invalid type code {:?}", other))),
    };
    Ok((kind, &s[span_len..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok_samples(line: &str) -> Vec<Sample> {
        let mut out = Vec::new();
        let mut errs = Vec::new();
        parse(line, &mut out, &mut errs);
        assert!(errs.is_empty(), "unexpected errors: {:?}", errs);
        out
    }

    #[test]
    fn counter_basic() {
        let samples = ok_samples("gorets:1|c");
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].name, "gorets");
        assert_eq!(samples[0].value, 1.0);
        assert_eq!(samples[0].kind, MetricType::Counter);
        assert_eq!(samples[0].rate, None);
    }

    #[test]
    fn counter_with_rate() {
        let samples = ok_samples("gorets:1|c|@0.1");
        assert_eq!(samples[0].rate, Some(0.1));
    }

    #[test]
    fn gauge_additive_text() {
        let samples = ok_samples("gaugor:+10|g");
        assert!(samples[0].is_signed_text());
        let samples = ok_samples("gaugor:100|g");
        assert!(!samples[0].is_signed_text());
    }

    #[test]
    fn timer_type_code() {
        let samples = ok_samples("glork:320|ms");
        assert_eq!(samples[0].kind, MetricType::Timer);
    }

    #[test]
    fn set_type_code() {
        let samples = ok_samples("uniques:765|s");
        assert_eq!(samples[0].kind, MetricType::Set);
        assert_eq!(samples[0].raw_value, "765");
    }

    #[test]
    fn ambiguous_type_code_rejected() {
        let mut out = Vec::new();
        let mut errs = Vec::new();
        parse("gorets:1|cg", &mut out, &mut errs);
        assert!(out.is_empty());
        assert_eq!(errs.len(), 1);
    }

    #[test]
    fn rate_on_gauge_rejected() {
        let mut out = Vec::new();
        let mut errs = Vec::new();
        parse("gaugor:1|g|@0.5", &mut out, &mut errs);
        assert!(out.is_empty());
        assert_eq!(errs.len(), 1);
    }

    #[test]
    fn missing_colon_is_error() {
        let mut out = Vec::new();
        let mut errs = Vec::new();
        parse("gorets1|c", &mut out, &mut errs);
        assert!(out.is_empty());
        assert_eq!(errs.len(), 1);
    }

    #[test]
    fn resync_after_bad_sample() {
        let mut out = Vec::new();
        let mut errs = Vec::new();
        parse("gorets:1|c\nbadline\nglork:5|ms", &mut out, &mut errs);
        assert_eq!(out.len(), 2);
        assert_eq!(errs.len(), 1);
        assert_eq!(out[0].name, "gorets");
        assert_eq!(out[1].name, "glork");
    }

    #[test]
    fn empty_datagram_yields_nothing() {
        let mut out = Vec::new();
        let mut errs = Vec::new();
        parse("", &mut out, &mut errs);
        assert!(out.is_empty());
        assert!(errs.is_empty());
    }

    #[test]
    fn multiple_samples_in_one_datagram() {
        let samples = ok_samples("a:1|c\nb:2|c\nc:3|c");
        assert_eq!(samples.len(), 3);
    }

    quickcheck! {
        fn qc_well_formed_counter_never_errors(name: String, value: i32, rate_pct: u8) -> bool {
            if name.is_empty() || name.contains(':') || name.contains('|') || name.contains('\n') {
                return true;
            }
            let rate = 1.0 + (rate_pct as f64) / 10.0;
            let line = format!("{}:{}|c|@{}", name, value, rate);
            let mut out = Vec::new();
            let mut errs = Vec::new();
            parse(&line, &mut out, &mut errs);
            errs.is_empty() && out.len() == 1
        }
    }
}
