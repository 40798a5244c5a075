use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use refdata_cache::{KeyFields, ObjectKey, TemporalRecord};

/// Timestamp helper: `ts(2024, 3, 15, 12)` is that day at noon UTC.
pub fn ts(year: i32, month: u32, day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, hour, 0, 0)
        .single()
        .expect("valid timestamp")
}

/// Sample fare class rule, keyed by vendor and item number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FareClassRule {
    pub id: Uuid,
    pub vendor: String,
    pub item_no: i64,
    pub fare_class: String,
    pub create_date: DateTime<Utc>,
    pub effective_from: DateTime<Utc>,
    pub discontinue_date: Option<DateTime<Utc>>,
    pub expire_date: Option<DateTime<Utc>>,
    pub inhibited: bool,
}

impl FareClassRule {
    /// A rule created and effective at `created`, with open end dates.
    pub fn new(vendor: &str, item_no: i64, fare_class: &str, created: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            vendor: vendor.to_string(),
            item_no,
            fare_class: fare_class.to_string(),
            create_date: created,
            effective_from: created,
            discontinue_date: None,
            expire_date: None,
            inhibited: false,
        }
    }

    pub fn starting(mut self, from: DateTime<Utc>) -> Self {
        self.effective_from = from;
        self
    }

    pub fn discontinued(mut self, on: DateTime<Utc>) -> Self {
        self.discontinue_date = Some(on);
        self
    }

    pub fn expires(mut self, on: DateTime<Utc>) -> Self {
        self.expire_date = Some(on);
        self
    }

    pub fn inhibit(mut self) -> Self {
        self.inhibited = true;
        self
    }

    pub fn key(&self) -> FareClassKey {
        FareClassKey {
            vendor: self.vendor.clone(),
            item_no: self.item_no,
        }
    }
}

impl TemporalRecord for FareClassRule {
    fn create_date(&self) -> DateTime<Utc> {
        self.create_date
    }

    fn effective_from(&self) -> DateTime<Utc> {
        self.effective_from
    }

    fn discontinue_date(&self) -> Option<DateTime<Utc>> {
        self.discontinue_date
    }

    fn expire_date(&self) -> Option<DateTime<Utc>> {
        self.expire_date
    }

    fn inhibited(&self) -> bool {
        self.inhibited
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FareClassKey {
    pub vendor: String,
    pub item_no: i64,
}

impl FareClassKey {
    pub fn new(vendor: &str, item_no: i64) -> Self {
        Self {
            vendor: vendor.to_string(),
            item_no,
        }
    }
}

impl KeyFields for FareClassKey {
    fn object_key(&self) -> ObjectKey {
        ObjectKey::new()
            .with("VENDOR", self.vendor.clone())
            .with("ITEMNO", self.item_no.to_string())
    }

    fn from_object_key(key: &ObjectKey) -> Option<Self> {
        Some(Self {
            vendor: key.value("VENDOR")?.to_string(),
            item_no: key.value_as("ITEMNO")?,
        })
    }
}

/// Sample tax rule, keyed by nation and tax code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxRule {
    pub id: Uuid,
    pub nation: String,
    pub tax_code: String,
    pub seq_no: i64,
    pub create_date: DateTime<Utc>,
    pub effective_from: DateTime<Utc>,
    pub discontinue_date: Option<DateTime<Utc>>,
    pub expire_date: Option<DateTime<Utc>>,
    pub inhibited: bool,
}

impl TaxRule {
    pub fn new(nation: &str, tax_code: &str, seq_no: i64, created: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            nation: nation.to_string(),
            tax_code: tax_code.to_string(),
            seq_no,
            create_date: created,
            effective_from: created,
            discontinue_date: None,
            expire_date: None,
            inhibited: false,
        }
    }

    pub fn discontinued(mut self, on: DateTime<Utc>) -> Self {
        self.discontinue_date = Some(on);
        self
    }

    pub fn inhibit(mut self) -> Self {
        self.inhibited = true;
        self
    }

    pub fn key(&self) -> TaxKey {
        TaxKey {
            nation: self.nation.clone(),
            tax_code: self.tax_code.clone(),
        }
    }
}

impl TemporalRecord for TaxRule {
    fn create_date(&self) -> DateTime<Utc> {
        self.create_date
    }

    fn effective_from(&self) -> DateTime<Utc> {
        self.effective_from
    }

    fn discontinue_date(&self) -> Option<DateTime<Utc>> {
        self.discontinue_date
    }

    fn expire_date(&self) -> Option<DateTime<Utc>> {
        self.expire_date
    }

    fn inhibited(&self) -> bool {
        self.inhibited
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaxKey {
    pub nation: String,
    pub tax_code: String,
}

impl TaxKey {
    pub fn new(nation: &str, tax_code: &str) -> Self {
        Self {
            nation: nation.to_string(),
            tax_code: tax_code.to_string(),
        }
    }
}

impl KeyFields for TaxKey {
    fn object_key(&self) -> ObjectKey {
        ObjectKey::new()
            .with("NATION", self.nation.clone())
            .with("TAXCODE", self.tax_code.clone())
    }

    fn from_object_key(key: &ObjectKey) -> Option<Self> {
        Some(Self {
            nation: key.value("NATION")?.to_string(),
            tax_code: key.value("TAXCODE")?.to_string(),
        })
    }
}
