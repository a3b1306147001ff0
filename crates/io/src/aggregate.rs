// Typed group-by for movement-level sources.
//
// Emission workbooks and viewer exports list one line per payroll movement;
// normalized tables hold one row per (registration, NSS). Each output field
// has an explicit accumulator: amounts and days are summed, the wage and
// credit terms take the latest movement, the name takes the earliest.
// Undated movements sort after every dated one.

use std::collections::{BTreeMap, HashSet};
use std::fmt::Debug;
use std::ops::AddAssign;

use chrono::NaiveDate;
use confronta_core::{BimonthlyRow, Demographics, MonthlyFees, MonthlyRow, Nss};

// ---------------------------------------------------------------------------
// Accumulators
// ---------------------------------------------------------------------------

/// Movement order within a group: by date, undated movements after every
/// dated one.
fn order_key(date: Option<NaiveDate>) -> (bool, Option<NaiveDate>) {
    (date.is_none(), date)
}

/// Non-missing value of the earliest movement. Ties go to the earlier push.
#[derive(Debug, Clone)]
pub struct First<T> {
    current: Option<(Option<NaiveDate>, T)>,
}

impl<T> Default for First<T> {
    fn default() -> Self {
        Self { current: None }
    }
}

impl<T> First<T> {
    pub fn push(&mut self, date: Option<NaiveDate>, value: Option<T>) {
        let Some(value) = value else {
            return;
        };
        match &self.current {
            Some((current, _)) if order_key(date) >= order_key(*current) => {}
            _ => self.current = Some((date, value)),
        }
    }

    pub fn get(self) -> Option<T> {
        self.current.map(|(_, v)| v)
    }
}

/// Non-missing value of the latest movement, undated movements counting as
/// the latest. Ties go to the later push.
#[derive(Debug, Clone)]
pub struct LastByDate<T> {
    current: Option<(Option<NaiveDate>, T)>,
}

impl<T> Default for LastByDate<T> {
    fn default() -> Self {
        Self { current: None }
    }
}

impl<T> LastByDate<T> {
    pub fn push(&mut self, date: Option<NaiveDate>, value: Option<T>) {
        let Some(value) = value else {
            return;
        };
        match &self.current {
            Some((current, _)) if order_key(date) < order_key(*current) => {}
            _ => self.current = Some((date, value)),
        }
    }

    pub fn get(self) -> Option<T> {
        self.current.map(|(_, v)| v)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Sum<T>(T);

impl<T: AddAssign + Copy> Sum<T> {
    pub fn push(&mut self, value: T) {
        self.0 += value;
    }

    pub fn get(&self) -> T {
        self.0
    }
}

// ---------------------------------------------------------------------------
// Movements
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct MonthlyMovement {
    pub registration: String,
    pub nss: Nss,
    pub name: Option<String>,
    pub national_id: Option<String>,
    pub date: Option<NaiveDate>,
    pub days: i64,
    pub wage: f64,
    pub fees: MonthlyFees,
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BimonthlyMovement {
    pub registration: String,
    pub nss: Nss,
    pub name: Option<String>,
    pub national_id: Option<String>,
    pub date: Option<NaiveDate>,
    pub days: i64,
    pub wage: f64,
    pub retirement: f64,
    pub ceav_pat: f64,
    pub ceav_obr: f64,
    pub total_rcv: f64,
    pub housing_pat: f64,
    pub amortization: f64,
    pub total_inf: f64,
    pub total: f64,
    pub credit_type: Option<String>,
    pub credit_value: Option<f64>,
    pub credit_number: Option<String>,
}

/// Remove movements identical in every field. Returns how many were removed.
pub fn dedup_movements<T: Debug>(movements: &mut Vec<T>) -> usize {
    let before = movements.len();
    let mut seen = HashSet::new();
    movements.retain(|m| seen.insert(format!("{m:?}")));
    before - movements.len()
}

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

#[derive(Default)]
struct MonthlyAccumulator {
    name: First<String>,
    national_id: First<String>,
    days: Sum<i64>,
    wage: LastByDate<f64>,
    fees: MonthlyFees,
    total: Sum<f64>,
}

impl MonthlyAccumulator {
    fn push(&mut self, m: MonthlyMovement) {
        self.name.push(m.date, m.name);
        self.national_id.push(m.date, m.national_id);
        self.days.push(m.days);
        self.wage.push(m.date, Some(m.wage));
        self.fees.add(&m.fees);
        self.total.push(m.total);
    }

    fn finish(self, registration: String, nss: Nss) -> MonthlyRow {
        MonthlyRow {
            registration,
            nss,
            name: self.name.get().unwrap_or_default(),
            demographics: Demographics { national_id: self.national_id.get(), ..Default::default() },
            credit_number: None,
            disability_days: None,
            absence_days: None,
            days: self.days.get(),
            wage: self.wage.get().unwrap_or(0.0),
            fees: self.fees,
            total: self.total.get(),
        }
    }
}

#[derive(Default)]
struct BimonthlyAccumulator {
    name: First<String>,
    national_id: First<String>,
    days: Sum<i64>,
    wage: LastByDate<f64>,
    retirement: Sum<f64>,
    ceav_pat: Sum<f64>,
    ceav_obr: Sum<f64>,
    total_rcv: Sum<f64>,
    housing_pat: Sum<f64>,
    amortization: Sum<f64>,
    total_inf: Sum<f64>,
    total: Sum<f64>,
    credit_type: LastByDate<String>,
    credit_value: LastByDate<f64>,
    credit_number: LastByDate<String>,
}

impl BimonthlyAccumulator {
    fn push(&mut self, m: BimonthlyMovement) {
        self.name.push(m.date, m.name);
        self.national_id.push(m.date, m.national_id);
        self.days.push(m.days);
        self.wage.push(m.date, Some(m.wage));
        self.retirement.push(m.retirement);
        self.ceav_pat.push(m.ceav_pat);
        self.ceav_obr.push(m.ceav_obr);
        self.total_rcv.push(m.total_rcv);
        self.housing_pat.push(m.housing_pat);
        self.amortization.push(m.amortization);
        self.total_inf.push(m.total_inf);
        self.total.push(m.total);
        self.credit_type.push(m.date, m.credit_type);
        self.credit_value.push(m.date, m.credit_value);
        self.credit_number.push(m.date, m.credit_number);
    }

    fn finish(self, registration: String, nss: Nss) -> BimonthlyRow {
        BimonthlyRow {
            registration,
            nss,
            name: self.name.get().unwrap_or_default(),
            demographics: Demographics { national_id: self.national_id.get(), ..Default::default() },
            disability_days: None,
            absence_days: None,
            days: self.days.get(),
            wage: self.wage.get().unwrap_or(0.0),
            credit_number: self.credit_number.get(),
            credit_type: self.credit_type.get(),
            credit_value: self.credit_value.get(),
            retirement: self.retirement.get(),
            ceav_pat: self.ceav_pat.get(),
            ceav_obr: self.ceav_obr.get(),
            total_rcv: self.total_rcv.get(),
            housing_pat: self.housing_pat.get(),
            amortization: self.amortization.get(),
            total_inf: self.total_inf.get(),
            total: self.total.get(),
        }
    }
}

/// One row per (registration, NSS).
pub fn aggregate_monthly(movements: impl IntoIterator<Item = MonthlyMovement>) -> Vec<MonthlyRow> {
    let mut groups: BTreeMap<(String, Nss), MonthlyAccumulator> = BTreeMap::new();
    for m in movements {
        groups.entry((m.registration.clone(), m.nss.clone())).or_default().push(m);
    }
    groups
        .into_iter()
        .map(|((registration, nss), acc)| acc.finish(registration, nss))
        .collect()
}

/// One row per (registration, NSS).
pub fn aggregate_bimonthly(movements: impl IntoIterator<Item = BimonthlyMovement>) -> Vec<BimonthlyRow> {
    let mut groups: BTreeMap<(String, Nss), BimonthlyAccumulator> = BTreeMap::new();
    for m in movements {
        groups.entry((m.registration.clone(), m.nss.clone())).or_default().push(m);
    }
    groups
        .into_iter()
        .map(|((registration, nss), acc)| acc.finish(registration, nss))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(d: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(2024, 6, d)
    }

    fn movement(nss: &str, d: Option<NaiveDate>, days: i64, wage: f64, cf: f64) -> MonthlyMovement {
        MonthlyMovement {
            registration: "Y5412345105".to_string(),
            nss: Nss::parse(nss).unwrap(),
            name: Some("PEREZ ANA".to_string()),
            national_id: None,
            date: d,
            days,
            wage,
            fees: MonthlyFees { cf, ..Default::default() },
            total: cf,
        }
    }

    #[test]
    fn wage_is_last_by_date_amounts_are_summed() {
        let rows = aggregate_monthly(vec![
            movement("1", date(20), 10, 300.0, 5.0),
            movement("1", date(1), 15, 250.0, 7.0),
            movement("1", None, 5, 999.0, 1.0),
        ]);
        assert_eq!(rows.len(), 1);
        let r = &rows[0];
        assert_eq!(r.days, 30);
        assert_eq!(r.wage, 999.0);
        assert_eq!(r.fees.cf, 13.0);
        assert_eq!(r.total, 13.0);
        assert_eq!(r.name, "PEREZ ANA");
    }

    #[test]
    fn undated_movements_fall_back_to_last() {
        let mut acc = LastByDate::default();
        acc.push(None, Some(1.0));
        acc.push(None, Some(2.0));
        assert_eq!(acc.get(), Some(2.0));

        let mut acc = LastByDate::default();
        acc.push(date(3), Some("CF".to_string()));
        acc.push(date(3), None);
        assert_eq!(acc.get().as_deref(), Some("CF"));
    }

    #[test]
    fn undated_movement_wins_the_wage() {
        let rows = aggregate_monthly(vec![movement("1", date(20), 30, 300.0, 1.0), movement("1", None, 0, 999.0, 0.0)]);
        assert_eq!(rows[0].wage, 999.0);

        let mut acc = LastByDate::default();
        acc.push(None, Some("-".to_string()));
        acc.push(date(28), Some("VSM".to_string()));
        assert_eq!(acc.get().as_deref(), Some("-"));
    }

    #[test]
    fn first_skips_missing() {
        let mut acc = First::default();
        acc.push(date(1), None);
        acc.push(date(2), Some("A"));
        acc.push(date(2), Some("B"));
        assert_eq!(acc.get(), Some("A"));
    }

    #[test]
    fn name_comes_from_earliest_movement() {
        let late = MonthlyMovement { name: Some("PEREZ A".to_string()), ..movement("1", date(20), 10, 300.0, 1.0) };
        let undated = MonthlyMovement { name: Some("SIN FECHA".to_string()), ..movement("1", None, 5, 300.0, 1.0) };
        let early = MonthlyMovement { name: Some("PEREZ ANA".to_string()), ..movement("1", date(2), 10, 300.0, 1.0) };
        let rows = aggregate_monthly(vec![late, undated, early]);
        assert_eq!(rows[0].name, "PEREZ ANA");

        let mut acc = First::default();
        acc.push(None, Some("SIN FECHA"));
        acc.push(date(9), Some("PEREZ"));
        assert_eq!(acc.get(), Some("PEREZ"));
    }

    #[test]
    fn groups_by_nss() {
        let rows = aggregate_monthly(vec![
            movement("2", date(1), 30, 100.0, 1.0),
            movement("1", date(1), 30, 100.0, 1.0),
        ]);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].nss.as_str(), "00000000001");
    }

    #[test]
    fn dedup_removes_exact_copies_only() {
        let mut v = vec![
            movement("1", date(1), 30, 100.0, 1.0),
            movement("1", date(1), 30, 100.0, 1.0),
            movement("1", date(2), 30, 100.0, 1.0),
        ];
        assert_eq!(dedup_movements(&mut v), 1);
        assert_eq!(v.len(), 2);
    }
}
