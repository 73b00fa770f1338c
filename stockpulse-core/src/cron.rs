//! Human-readable phrasing for 5-field cron expressions.
//!
//! This is a display helper, not a validator: anything it does not recognize
//! is echoed back verbatim.

const DAY_NAMES: [&str; 7] = [
    "Sunday",
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
];

const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// Describe `expression` as a recurrence phrase such as "Daily at 7:00 AM".
///
/// Never fails. Unrecognized or malformed input returns the trimmed raw
/// expression, and blank input returns "Not set".
pub fn cron_to_human(expression: &str) -> String {
    let trimmed = expression.trim();
    if trimmed.is_empty() {
        return "Not set".to_string();
    }
    describe(trimmed).unwrap_or_else(|| trimmed.to_string())
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Field {
    Any,
    Step(u32),
    Range(u32, u32),
    Values(Vec<u32>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Days {
    Every,
    Weekdays,
    Weekends,
    OnWeekdays(Vec<u32>),
    WeekdayRange(u32, u32),
    Monthly(Vec<u32>),
    Yearly(u32, Vec<u32>),
}

fn describe(expression: &str) -> Option<String> {
    let parts: Vec<&str> = expression.split_whitespace().collect();
    if parts.len() != 5 {
        return None;
    }

    let minute = parse_field(parts[0], 0, 59, None)?;
    let hour = parse_field(parts[1], 0, 23, None)?;
    let dom = parse_field(parts[2], 1, 31, None)?;
    let month = parse_field(parts[3], 1, 12, Some(&MONTH_NAMES))?;
    let dow = parse_field(parts[4], 0, 7, Some(&DAY_NAMES))?;
    let days = describe_days(&dom, &month, &dow)?;

    match (&minute, &hour) {
        (Field::Any, Field::Any) => Some(format!("Every minute{}", trailing(&days))),
        (Field::Step(1), Field::Any) => Some(format!("Every minute{}", trailing(&days))),
        (Field::Step(n), Field::Any) => Some(format!("Every {} minutes{}", n, trailing(&days))),
        (Field::Values(mins), Field::Any) => {
            let phrase = if mins.as_slice() == [0] {
                "Every hour".to_string()
            } else {
                let listed: Vec<String> = mins.iter().map(|m| m.to_string()).collect();
                let noun = if mins.len() == 1 { "minute" } else { "minutes" };
                format!("Every hour at {} {}", noun, join_words(&listed))
            };
            Some(format!("{}{}", phrase, trailing(&days)))
        }
        (Field::Values(mins), Field::Step(n)) if mins.len() == 1 => {
            let every = if *n == 1 {
                "Every hour".to_string()
            } else {
                format!("Every {} hours", n)
            };
            let at = if mins[0] == 0 {
                String::new()
            } else {
                format!(" at minute {}", mins[0])
            };
            Some(format!("{}{}{}", every, at, trailing(&days)))
        }
        (Field::Values(mins), Field::Range(start, end)) if mins.len() == 1 => Some(format!(
            "Every hour from {} to {}{}",
            clock(*start, mins[0]),
            clock(*end, mins[0]),
            trailing(&days)
        )),
        (Field::Values(mins), Field::Values(hours)) => {
            let times: Vec<String> = hours
                .iter()
                .flat_map(|h| mins.iter().map(move |m| clock(*h, *m)))
                .collect();
            Some(format!("{} at {}", leading(&days), join_words(&times)))
        }
        _ => None,
    }
}

fn parse_field(raw: &str, min: u32, max: u32, names: Option<&[&str]>) -> Option<Field> {
    if raw == "*" || raw == "?" {
        return Some(Field::Any);
    }
    if let Some(step) = raw.strip_prefix("*/") {
        let step: u32 = step.parse().ok()?;
        if step == 0 || step > max {
            return None;
        }
        return Some(Field::Step(step));
    }
    if let Some((start, end)) = raw.split_once('-') {
        let start = parse_value(start, min, max, names)?;
        let end = parse_value(end, min, max, names)?;
        if start > end {
            return None;
        }
        return Some(Field::Range(start, end));
    }

    let mut values = raw
        .split(',')
        .map(|part| parse_value(part, min, max, names))
        .collect::<Option<Vec<u32>>>()?;
    values.sort_unstable();
    values.dedup();
    Some(Field::Values(values))
}

fn parse_value(raw: &str, min: u32, max: u32, names: Option<&[&str]>) -> Option<u32> {
    if let Ok(value) = raw.parse::<u32>() {
        return (min..=max).contains(&value).then_some(value);
    }
    // Three-letter names: SUN..SAT are 0-based, JAN..DEC are 1-based.
    let names = names?;
    let position = names
        .iter()
        .position(|name| name[..3].eq_ignore_ascii_case(raw))?;
    Some(position as u32 + min)
}

fn describe_days(dom: &Field, month: &Field, dow: &Field) -> Option<Days> {
    match (dom, month, dow) {
        (Field::Any, Field::Any, Field::Any) => Some(Days::Every),
        (Field::Any, Field::Any, Field::Values(days)) => {
            let mut days: Vec<u32> = days.iter().map(|d| d % 7).collect();
            days.sort_unstable();
            days.dedup();
            Some(match days.as_slice() {
                [0, 1, 2, 3, 4, 5, 6] => Days::Every,
                [1, 2, 3, 4, 5] => Days::Weekdays,
                [0, 6] => Days::Weekends,
                _ => Days::OnWeekdays(days),
            })
        }
        (Field::Any, Field::Any, Field::Range(start, end)) => Some(match (*start, *end) {
            (1, 5) => Days::Weekdays,
            (0, 6) | (0, 7) | (1, 7) => Days::Every,
            (start, end) => Days::WeekdayRange(start % 7, end % 7),
        }),
        (Field::Values(dates), Field::Any, Field::Any) => Some(Days::Monthly(dates.clone())),
        (Field::Values(dates), Field::Values(months), Field::Any) if months.len() == 1 => {
            Some(Days::Yearly(months[0], dates.clone()))
        }
        _ => None,
    }
}

fn leading(days: &Days) -> String {
    match days {
        Days::Every => "Daily".to_string(),
        Days::Weekdays => "Weekdays".to_string(),
        Days::Weekends => "Weekends".to_string(),
        Days::OnWeekdays(list) => format!("Every {}", day_list(list)),
        Days::WeekdayRange(start, end) => format!(
            "{} through {}",
            DAY_NAMES[*start as usize], DAY_NAMES[*end as usize]
        ),
        Days::Monthly(dates) => format!("Monthly on the {}", ordinal_list(dates)),
        Days::Yearly(month, dates) => format!("Yearly on {}", month_dates(*month, dates)),
    }
}

fn trailing(days: &Days) -> String {
    match days {
        Days::Every => String::new(),
        Days::Weekdays => " on weekdays".to_string(),
        Days::Weekends => " on weekends".to_string(),
        Days::OnWeekdays(list) => format!(" on {}", day_list(list)),
        Days::WeekdayRange(start, end) => format!(
            " from {} through {}",
            DAY_NAMES[*start as usize], DAY_NAMES[*end as usize]
        ),
        Days::Monthly(dates) => format!(" on the {} of the month", ordinal_list(dates)),
        Days::Yearly(month, dates) => format!(" on {}", month_dates(*month, dates)),
    }
}

fn day_list(days: &[u32]) -> String {
    let names: Vec<String> = days
        .iter()
        .map(|d| DAY_NAMES[*d as usize].to_string())
        .collect();
    join_words(&names)
}

fn ordinal_list(dates: &[u32]) -> String {
    let ordinals: Vec<String> = dates.iter().map(|d| ordinal(*d)).collect();
    join_words(&ordinals)
}

fn month_dates(month: u32, dates: &[u32]) -> String {
    let listed: Vec<String> = dates.iter().map(|d| d.to_string()).collect();
    format!("{} {}", MONTH_NAMES[(month - 1) as usize], join_words(&listed))
}

fn clock(hour: u32, minute: u32) -> String {
    let suffix = if hour < 12 { "AM" } else { "PM" };
    let display = match hour % 12 {
        0 => 12,
        h => h,
    };
    format!("{}:{:02} {}", display, minute, suffix)
}

fn ordinal(n: u32) -> String {
    let suffix = match (n % 10, n % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{}{}", n, suffix)
}

fn join_words(items: &[String]) -> String {
    match items {
        [] => String::new(),
        [only] => only.clone(),
        [init @ .., last] => format!("{} and {}", init.join(", "), last),
    }
}
