//! Calendar/epoch routines, kept independent of any general-purpose
//! calendar crate since the bus needs exact Rata Die day counting to
//! match `fsnav_time_epoch` semantics (Gregorian calendar, no leap
//! seconds) rather than a library's UTC/TAI model.

/// `(year, month, day, hour, minute, second)`, matching the original's
/// `fsnav_time_epoch` field order.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Epoch {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
    pub second: f64,
}

/// Days since the Rata Die epoch (0001-01-01 = day 1), proleptic
/// Gregorian calendar.
pub fn epoch_to_days(e: &Epoch) -> i64 {
    let (y, m) = if e.month <= 2 {
        (e.year as i64 - 1, e.month as i64 + 12)
    } else {
        (e.year as i64, e.month as i64)
    };
    let era = if y >= 0 { y } else { y - 399 } / 400;
    let yoe = (y - era * 400) as i64;
    let doy = (153 * (m - 3) + 2) / 5 + e.day as i64 - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    era * 146097 + doe - 719468 + 719163 // shift so 0001-01-01 == day 1
}

/// Seconds since `e`'s midnight.
pub fn time_of_day_seconds(e: &Epoch) -> f64 {
    e.hour as f64 * 3600.0 + e.minute as f64 * 60.0 + e.second
}

/// Signed seconds between two epochs (`b - a`), ignoring leap seconds,
/// matching the original's plain Gregorian day-count time comparisons.
pub fn epoch_diff_seconds(a: &Epoch, b: &Epoch) -> f64 {
    let days = (epoch_to_days(b) - epoch_to_days(a)) as f64;
    days * 86400.0 + (time_of_day_seconds(b) - time_of_day_seconds(a))
}

const GPS_EPOCH: Epoch = Epoch {
    year: 1980,
    month: 1,
    day: 6,
    hour: 0,
    minute: 0,
    second: 0.0,
};

/// GPS week number and time-of-week seconds for an epoch, counted from
/// the GPS epoch 1980-01-06 00:00:00.
pub fn to_gps_week_tow(e: &Epoch) -> (i64, f64) {
    let total_seconds = epoch_diff_seconds(&GPS_EPOCH, e);
    let week = (total_seconds / 604_800.0).floor() as i64;
    let tow = total_seconds - week as f64 * 604_800.0;
    (week, tow)
}

/// GPS week number and time-of-week seconds back to a Gregorian epoch
/// (leap seconds not included, matching `to_gps_week_tow`'s omission of
/// them). Walks the days from `week`/`sec` one calendar day at a time so
/// month/year rollovers fall out of `epoch_to_days`/`days_in_month`
/// rather than a closed-form civil-calendar formula.
pub fn gps2epoch(week: i64, sec: f64) -> Epoch {
    let total_days_f = week as f64 * 7.0 + sec / 86_400.0;
    let whole_days = total_days_f.floor() as i64;
    let day_seconds = (total_days_f - whole_days as f64) * 86_400.0;

    let mut year = GPS_EPOCH.year;
    let mut month = GPS_EPOCH.month;
    let mut day = GPS_EPOCH.day as i64 + whole_days;

    loop {
        let dim = days_in_month(year, month) as i64;
        if day > dim {
            day -= dim;
            month += 1;
            if month > 12 {
                month = 1;
                year += 1;
            }
        } else if day < 1 {
            month -= 1;
            if month < 1 {
                month = 12;
                year -= 1;
            }
            day += days_in_month(year, month) as i64;
        } else {
            break;
        }
    }

    let hour = (day_seconds / 3600.0).floor() as u32;
    let minute = ((day_seconds - hour as f64 * 3600.0) / 60.0).floor() as u32;
    let second = day_seconds - hour as f64 * 3600.0 - minute as f64 * 60.0;

    Epoch {
        year,
        month,
        day: day as u32,
        hour,
        minute,
        second,
    }
}

fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

fn days_in_month(year: i32, month: u32) -> u32 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 => {
            if is_leap_year(year) {
                29
            } else {
                28
            }
        }
        _ => unreachable!("month out of range"),
    }
}

/// Half-precision-tolerant epoch comparison: `+1` if `a` is later than
/// `b`, `0` if equal within 1/32768 s, `-1` otherwise.
pub fn epochs_compare(a: &Epoch, b: &Epoch) -> i32 {
    const TOLERANCE_SECONDS: f64 = 1.0 / 32768.0;
    let diff = epoch_diff_seconds(b, a);
    if diff.abs() <= TOLERANCE_SECONDS {
        0
    } else if diff > 0.0 {
        1
    } else {
        -1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn epoch_to_days_known_value() {
        // 2000-03-01 is Rata Die day 730546 (proleptic Gregorian)
        let e = Epoch {
            year: 2000,
            month: 3,
            day: 1,
            hour: 0,
            minute: 0,
            second: 0.0,
        };
        assert_eq!(epoch_to_days(&e), 730_546);
    }

    #[test]
    fn gps_epoch_is_week_zero() {
        let e = Epoch {
            year: 1980,
            month: 1,
            day: 6,
            hour: 0,
            minute: 0,
            second: 0.0,
        };
        let (week, tow) = to_gps_week_tow(&e);
        assert_eq!(week, 0);
        assert_relative_eq!(tow, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn one_day_later_advances_tow_by_a_day() {
        let a = Epoch {
            year: 1980,
            month: 1,
            day: 6,
            hour: 0,
            minute: 0,
            second: 0.0,
        };
        let b = Epoch {
            year: 1980,
            month: 1,
            day: 7,
            hour: 0,
            minute: 0,
            second: 0.0,
        };
        assert_relative_eq!(epoch_diff_seconds(&a, &b), 86_400.0, epsilon = 1e-9);
    }

    #[test]
    fn gps2epoch_round_trips_through_to_gps_week_tow() {
        let e = Epoch {
            year: 2024,
            month: 6,
            day: 15,
            hour: 13,
            minute: 45,
            second: 30.5,
        };
        let (week, tow) = to_gps_week_tow(&e);
        let back = gps2epoch(week, tow);
        assert_eq!(back.year, e.year);
        assert_eq!(back.month, e.month);
        assert_eq!(back.day, e.day);
        assert_eq!(back.hour, e.hour);
        assert_eq!(back.minute, e.minute);
        assert_relative_eq!(back.second, e.second, epsilon = 1e-6);
    }

    #[test]
    fn gps2epoch_at_week_zero_matches_gps_epoch() {
        let e = gps2epoch(0, 0.0);
        assert_eq!(e, GPS_EPOCH);
    }

    #[test]
    fn gps2epoch_rolls_over_month_and_year_boundaries() {
        // 1999-12-31 23:59:59.9 plus 0.2s should roll into 2000-01-01
        let (week, tow) = to_gps_week_tow(&Epoch {
            year: 1999,
            month: 12,
            day: 31,
            hour: 23,
            minute: 59,
            second: 59.9,
        });
        let e = gps2epoch(week, tow + 0.2);
        assert_eq!(e.year, 2000);
        assert_eq!(e.month, 1);
        assert_eq!(e.day, 1);
        assert_eq!(e.hour, 0);
        assert_eq!(e.minute, 0);
        assert_relative_eq!(e.second, 0.1, epsilon = 1e-6);
    }

    #[test]
    fn epochs_compare_detects_order_and_tolerance() {
        let a = Epoch {
            year: 2024,
            month: 1,
            day: 1,
            hour: 0,
            minute: 0,
            second: 0.0,
        };
        let b = Epoch {
            year: 2024,
            month: 1,
            day: 1,
            hour: 0,
            minute: 0,
            second: 1.0,
        };
        assert_eq!(epochs_compare(&a, &b), -1);
        assert_eq!(epochs_compare(&b, &a), 1);
        assert_eq!(epochs_compare(&a, &a), 0);

        let almost_equal = Epoch {
            second: 1.0 / 65536.0,
            ..a
        };
        assert_eq!(epochs_compare(&a, &almost_equal), 0);
    }
}
