use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

/// Placeholder for any number that is not drawn yet or unavailable.
pub const SENTINEL: &str = "...";

pub const PRIZE2_LEN: usize = 2;
pub const PRIZE3_LEN: usize = 6;
pub const PRIZE4_LEN: usize = 4;
pub const PRIZE5_LEN: usize = 6;
pub const PRIZE6_LEN: usize = 3;
pub const PRIZE7_LEN: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Special,
    First,
    Second,
    Third,
    Fourth,
    Fifth,
    Sixth,
    Seventh,
}

impl Tier {
    pub const ALL: [Tier; 8] = [
        Tier::Special,
        Tier::First,
        Tier::Second,
        Tier::Third,
        Tier::Fourth,
        Tier::Fifth,
        Tier::Sixth,
        Tier::Seventh,
    ];

    pub fn size(&self) -> usize {
        match self {
            Tier::Special | Tier::First => 1,
            Tier::Second => PRIZE2_LEN,
            Tier::Third => PRIZE3_LEN,
            Tier::Fourth => PRIZE4_LEN,
            Tier::Fifth => PRIZE5_LEN,
            Tier::Sixth => PRIZE6_LEN,
            Tier::Seventh => PRIZE7_LEN,
        }
    }

    /// Key used by the upstream record.
    pub fn field(&self) -> &'static str {
        match self {
            Tier::Special => "prizeSpecial",
            Tier::First => "prize1",
            Tier::Second => "prize2",
            Tier::Third => "prize3",
            Tier::Fourth => "prize4",
            Tier::Fifth => "prize5",
            Tier::Sixth => "prize6",
            Tier::Seventh => "prize7",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Tier::Special => "Đặc biệt",
            Tier::First => "Giải Nhất",
            Tier::Second => "Giải Nhì",
            Tier::Third => "Giải Ba",
            Tier::Fourth => "Giải Tư",
            Tier::Fifth => "Giải Năm",
            Tier::Sixth => "Giải Sáu",
            Tier::Seventh => "Giải Bảy",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoGanItem {
    pub number: String,
    pub days: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LotoHayVeItem {
    pub number: String,
    pub count: u32,
}

/// Loto pairs bucketed by leading digit. All ten buckets always exist.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeadTable([Vec<String>; 10]);

impl HeadTable {
    pub fn bucket(&self, head: usize) -> &[String] {
        self.0.get(head).map(Vec::as_slice).unwrap_or(&[])
    }

    pub(crate) fn push(&mut self, head: usize, loto: String) {
        if let Some(bucket) = self.0.get_mut(head) {
            bucket.push(loto);
        }
    }

    pub(crate) fn sort(&mut self) {
        for bucket in self.0.iter_mut() {
            bucket.sort();
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &[String])> {
        self.0.iter().enumerate().map(|(head, b)| (head, b.as_slice()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.iter().all(Vec::is_empty)
    }
}

impl Serialize for HeadTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (head, bucket) in self.iter() {
            map.serialize_entry(&head.to_string(), bucket)?;
        }
        map.end()
    }
}

/// One XSMB draw. Never mutated after it is handed out; refreshes build a
/// new record for the same date.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LotteryResult {
    pub date: String,
    pub prize_special: String,
    pub prize1: String,
    pub prize2: [String; PRIZE2_LEN],
    pub prize3: [String; PRIZE3_LEN],
    pub prize4: [String; PRIZE4_LEN],
    pub prize5: [String; PRIZE5_LEN],
    pub prize6: [String; PRIZE6_LEN],
    pub prize7: [String; PRIZE7_LEN],
    pub lo_gan: Vec<LoGanItem>,
    pub loto_hay_ve: Vec<LotoHayVeItem>,
    pub loto_head: HeadTable,
    pub is_live: bool,
    pub last_updated: i64,
}

fn sentinels<const N: usize>() -> [String; N] {
    std::array::from_fn(|_| SENTINEL.to_string())
}

impl LotteryResult {
    /// The all-sentinel record returned when nothing could be acquired.
    pub fn empty(date: &str, now_millis: i64) -> Self {
        Self {
            date: date.to_string(),
            prize_special: SENTINEL.to_string(),
            prize1: SENTINEL.to_string(),
            prize2: sentinels(),
            prize3: sentinels(),
            prize4: sentinels(),
            prize5: sentinels(),
            prize6: sentinels(),
            prize7: sentinels(),
            lo_gan: Vec::new(),
            loto_hay_ve: Vec::new(),
            loto_head: HeadTable::default(),
            is_live: false,
            last_updated: now_millis,
        }
    }

    pub fn tier(&self, tier: Tier) -> &[String] {
        match tier {
            Tier::Special => std::slice::from_ref(&self.prize_special),
            Tier::First => std::slice::from_ref(&self.prize1),
            Tier::Second => &self.prize2,
            Tier::Third => &self.prize3,
            Tier::Fourth => &self.prize4,
            Tier::Fifth => &self.prize5,
            Tier::Sixth => &self.prize6,
            Tier::Seventh => &self.prize7,
        }
    }

    /// Every prize number, special prize first.
    pub fn all_prizes(&self) -> impl Iterator<Item = &String> {
        Tier::ALL.into_iter().flat_map(move |tier| self.tier(tier).iter())
    }

    pub fn has_results(&self) -> bool {
        self.all_prizes().any(|p| p != SENTINEL)
    }
}
