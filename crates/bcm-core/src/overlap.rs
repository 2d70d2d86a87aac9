//! Date-range overlap queries shared by credit and budget validation.

use chrono::NaiveDate;

use bcm_domain::DateRange;

/// Items whose range overlaps `range`.
pub fn overlapping<'a, T, I, R>(range: DateRange, items: I, range_of: R) -> impl Iterator<Item = &'a T>
where
    T: 'a,
    I: IntoIterator<Item = &'a T>,
    R: Fn(&T) -> DateRange,
{
    items
        .into_iter()
        .filter(move |item| range_of(*item).overlaps(&range))
}

/// Distinct values carried by the items overlapping `range`, in first-seen order.
pub fn values_on_overlap<'a, T, I, V, R, F>(
    range: DateRange,
    items: I,
    range_of: R,
    value_of: F,
) -> Vec<V>
where
    T: 'a,
    I: IntoIterator<Item = &'a T>,
    V: PartialEq,
    R: Fn(&T) -> DateRange,
    F: Fn(&T) -> V,
{
    let mut values = Vec::new();
    for item in overlapping(range, items, range_of) {
        let value = value_of(item);
        if !values.contains(&value) {
            values.push(value);
        }
    }
    values
}

/// Value in force on `date`. When several items cover the date the one that
/// started last wins.
pub fn value_on_date<'a, T, V, R, F>(
    date: NaiveDate,
    items: impl IntoIterator<Item = &'a T>,
    range_of: R,
    value_of: F,
) -> Option<V>
where
    T: 'a,
    R: Fn(&T) -> DateRange,
    F: Fn(&T) -> V,
{
    items
        .into_iter()
        .filter(|item| range_of(*item).contains(date))
        .max_by_key(|item| range_of(*item).start)
        .map(value_of)
}
