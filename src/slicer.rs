use crate::reading::Reading;
use crate::time_range::TimeRange;

/// Keeps the readings strictly inside `range`.
///
/// Lazy: nothing is pulled from `readings` until the result is iterated, and
/// slicing a cloneable iterator twice gives the same output.
pub fn slice<I>(readings: I, range: &TimeRange) -> impl Iterator<Item = Reading> + use<I>
where
    I: IntoIterator<Item = Reading>,
{
    let range = *range;
    readings
        .into_iter()
        .filter(move |reading| range.contains(&reading.timestamp))
}
