//! `Server-Timing` header.
//!
//! [`Timer`] measures the wall-clock time spent in the rest of the chain and
//! reports it as `Server-Timing: app;dur=<duration>`, with the duration
//! written the way Go's `time.Duration` prints itself (`12.4ms`, `1.5s`,
//! `2m3.5s`). Browsers show the entry in their network panel.

use std::time::{Duration, Instant};

use crate::handler::BoxFuture;
use crate::middleware::{Middleware, Next};
use crate::request::Request;

pub const SERVER_TIMING: &str = "Server-Timing";

/// Timing middleware. Has no configuration and no state.
#[derive(Clone, Copy, Debug, Default)]
pub struct Timer;

impl Timer {
    pub fn new() -> Self {
        Self
    }
}

impl Middleware for Timer {
    fn call(&self, req: Request, next: Next) -> BoxFuture {
        Box::pin(async move {
            let start = Instant::now();
            let mut res = next.run(req).await;
            let elapsed = start.elapsed();

            res.append_header(SERVER_TIMING, format!("app;dur={}", format_duration(elapsed)));
            res
        })
    }
}

/// Formats `d` like Go's `time.Duration.String()`.
///
/// Below one second a single unit is used (`ns`, `µs`, `ms`) with up to
/// nine significant fractional digits; from one second up the value is
/// split into `h`, `m` and fractional `s`. Zero is `0s`.
pub fn format_duration(d: Duration) -> String {
    let nanos = d.as_nanos();

    if nanos == 0 {
        return "0s".to_owned();
    }
    if nanos < 1_000 {
        return format!("{nanos}ns");
    }
    if nanos < 1_000_000 {
        return format!("{}µs", fraction(nanos, 3));
    }
    if nanos < 1_000_000_000 {
        return format!("{}ms", fraction(nanos, 6));
    }

    let secs = fraction(nanos % 60_000_000_000, 9);
    let minutes = nanos / 60_000_000_000;
    match (minutes / 60, minutes % 60) {
        (0, 0) => format!("{secs}s"),
        (0, m) => format!("{m}m{secs}s"),
        (h, m) => format!("{h}h{m}m{secs}s"),
    }
}

/// `v / 10^prec` as a decimal, trailing fractional zeros trimmed.
fn fraction(v: u128, prec: u32) -> String {
    let scale = 10_u128.pow(prec);
    let (whole, frac) = (v / scale, v % scale);
    if frac == 0 {
        return whole.to_string();
    }

    let digits = format!("{frac:0width$}", width = prec as usize);
    format!("{whole}.{}", digits.trim_end_matches('0'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_like_go() {
        let cases = [
            (Duration::ZERO, "0s"),
            (Duration::from_nanos(1), "1ns"),
            (Duration::from_nanos(999), "999ns"),
            (Duration::from_nanos(1_000), "1µs"),
            (Duration::from_nanos(1_234), "1.234µs"),
            (Duration::from_nanos(1_100_000), "1.1ms"),
            (Duration::from_micros(12_400), "12.4ms"),
            (Duration::from_nanos(12_345_678), "12.345678ms"),
            (Duration::from_millis(1_500), "1.5s"),
            (Duration::from_secs(59), "59s"),
            (Duration::from_secs(60), "1m0s"),
            (Duration::from_millis(123_500), "2m3.5s"),
            (Duration::from_secs(3_600), "1h0m0s"),
            (Duration::from_nanos(3_723_000_000_001), "1h2m3.000000001s"),
        ];

        for (d, want) in cases {
            assert_eq!(format_duration(d), want, "{d:?}");
        }
    }
}
