//! Read-only analytic operators over a table selection
//!
//! Every operator takes a filter; pass `|_| true` to cover the whole table.

use serde_json::Value;

use crate::engine::Engine;
use crate::types::{Record, as_number, values_equal};

/// Rows sharing one value of the grouping field
pub type Group = (Value, Vec<Record>);

static NULL: Value = Value::Null;

impl Engine {
    fn field_values<'a>(
        &'a self,
        table: &str,
        field: &'a str,
        filter: impl Fn(&Record) -> bool,
    ) -> impl Iterator<Item = &'a Value> {
        self.rows(table)
            .iter()
            .filter(move |row| filter(row))
            .map(move |row| row.get(field).unwrap_or(&NULL))
    }

    /// Unique values of `field`, in first-seen order; a missing field counts as `null`
    pub fn distinct(
        &self,
        table: &str,
        field: &str,
        filter: impl Fn(&Record) -> bool,
    ) -> Vec<Value> {
        let mut seen: Vec<Value> = Vec::new();
        for value in self.field_values(table, field, filter) {
            if !seen.iter().any(|known| values_equal(known, value)) {
                seen.push(value.clone());
            }
        }
        seen
    }

    /// Sum of `field`; missing, null and non-numeric values count as 0
    pub fn sum(&self, table: &str, field: &str, filter: impl Fn(&Record) -> bool) -> f64 {
        self.field_values(table, field, filter)
            .map(|value| as_number(value).unwrap_or(0.0))
            .sum()
    }

    /// Mean of `field` over the selection, or 0 when nothing is selected
    pub fn average(&self, table: &str, field: &str, filter: impl Fn(&Record) -> bool) -> f64 {
        let (total, count) = self
            .field_values(table, field, filter)
            .fold((0.0, 0usize), |(total, count), value| {
                (total + as_number(value).unwrap_or(0.0), count + 1)
            });
        if count == 0 { 0.0 } else { total / count as f64 }
    }

    /// Smallest numeric value of `field`; `None` when there is none
    pub fn min(&self, table: &str, field: &str, filter: impl Fn(&Record) -> bool) -> Option<f64> {
        self.field_values(table, field, filter)
            .filter_map(as_number)
            .reduce(f64::min)
    }

    /// Largest numeric value of `field`; `None` when there is none
    pub fn max(&self, table: &str, field: &str, filter: impl Fn(&Record) -> bool) -> Option<f64> {
        self.field_values(table, field, filter)
            .filter_map(as_number)
            .reduce(f64::max)
    }

    /// Partition the selection by the value of `field`
    ///
    /// Groups appear in first-seen order and keep rows in table order. Rows
    /// without the field fall into the `null` group.
    pub fn group_by(
        &self,
        table: &str,
        field: &str,
        filter: impl Fn(&Record) -> bool,
    ) -> Vec<Group> {
        let mut groups: Vec<Group> = Vec::new();
        for row in self.rows(table).iter().filter(|row| filter(row)) {
            let key = row.get(field).unwrap_or(&NULL);
            match groups.iter_mut().find(|(existing, _)| values_equal(existing, key)) {
                Some((_, rows)) => rows.push(row.clone()),
                None => groups.push((key.clone(), vec![row.clone()])),
            }
        }
        groups
    }
}
