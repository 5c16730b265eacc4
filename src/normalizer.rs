//! Turns a loosely-typed upstream record into a [`LotteryResult`].
//!
//! Nothing from upstream is trusted as-is: prize tiers are padded or cut to
//! their fixed length, statistic entries are cleaned, and the head table is
//! always rebuilt from the prizes.

use serde_json::{Map, Value};

use crate::error::{Result, XsmbError};
use crate::time::TimeService;
use crate::types::{HeadTable, LoGanItem, LotoHayVeItem, LotteryResult, SENTINEL, Tier};

pub fn normalize(
    record: &Map<String, Value>,
    date: &str,
    time: &TimeService,
) -> Result<LotteryResult> {
    let has_special = record.get(Tier::Special.field()).is_some_and(is_truthy);
    let has_prize7 = record.get(Tier::Seventh.field()).is_some_and(is_truthy);
    if !has_special && !has_prize7 {
        return Err(XsmbError::NoData(date.to_string()));
    }

    let field = |tier: Tier| record.get(tier.field());

    let mut result = LotteryResult {
        date: date.to_string(),
        prize_special: coerce_number(field(Tier::Special)),
        prize1: coerce_number(field(Tier::First)),
        prize2: ensure_array(field(Tier::Second)),
        prize3: ensure_array(field(Tier::Third)),
        prize4: ensure_array(field(Tier::Fourth)),
        prize5: ensure_array(field(Tier::Fifth)),
        prize6: ensure_array(field(Tier::Sixth)),
        prize7: ensure_array(field(Tier::Seventh)),
        lo_gan: clean_lo_gan(record.get("loGan")),
        loto_hay_ve: clean_loto_hay_ve(record.get("lotoHayVe")),
        loto_head: HeadTable::default(),
        is_live: time.is_live_for(date),
        last_updated: time.now_millis(),
    };
    result.loto_head = compute_head_table(result.all_prizes());

    Ok(result)
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Strings are trimmed, numbers stringified; anything else is the sentinel.
fn coerce_number(value: Option<&Value>) -> String {
    let text = match value {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    };

    if text.is_empty() {
        SENTINEL.to_string()
    } else {
        text
    }
}

/// Exactly `N` entries: short input is sentinel-padded, long input truncated.
pub fn ensure_array<const N: usize>(value: Option<&Value>) -> [String; N] {
    let items = match value {
        Some(Value::Array(items)) => items.as_slice(),
        _ => &[],
    };

    std::array::from_fn(|i| coerce_number(items.get(i)))
}

/// Two-digit, zero-padded loto number, or `None` when it is not numeric.
fn clean_loto_number(value: Option<&Value>) -> Option<String> {
    let raw = match value {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        _ => "??".to_string(),
    };

    let padded = format!("{:0>2}", raw);
    if padded.chars().all(|c| c.is_ascii_digit()) {
        Some(padded)
    } else {
        None
    }
}

fn count_or_zero(value: Option<&Value>) -> u32 {
    match value.and_then(Value::as_f64) {
        Some(n) if n.is_finite() && n >= 0.0 => n.min(u32::MAX as f64) as u32,
        _ => 0,
    }
}

pub fn clean_lo_gan(value: Option<&Value>) -> Vec<LoGanItem> {
    let Some(Value::Array(items)) = value else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|item| {
            let number = clean_loto_number(item.get("number"))?;
            Some(LoGanItem {
                number,
                days: count_or_zero(item.get("days")),
            })
        })
        .collect()
}

pub fn clean_loto_hay_ve(value: Option<&Value>) -> Vec<LotoHayVeItem> {
    let Some(Value::Array(items)) = value else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|item| {
            let number = clean_loto_number(item.get("number"))?;
            Some(LotoHayVeItem {
                number,
                count: count_or_zero(item.get("count")),
            })
        })
        .collect()
}

/// Buckets the last two digits of every drawn prize by their leading digit.
pub fn compute_head_table<'a>(prizes: impl IntoIterator<Item = &'a String>) -> HeadTable {
    let mut table = HeadTable::default();

    for prize in prizes {
        if prize == SENTINEL {
            continue;
        }
        let chars: Vec<char> = prize.chars().collect();
        if chars.len() < 2 {
            continue;
        }
        let loto: String = chars[chars.len() - 2..].iter().collect();
        if let Some(head) = chars[chars.len() - 2].to_digit(10) {
            table.push(head as usize, loto);
        }
    }

    table.sort();
    table
}
