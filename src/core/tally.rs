use serde::Serialize;

use crate::core::models::poll::PollOption;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OptionTally {
    pub option_id: String,
    pub text: String,
    pub count: i64,
    pub percentage: u32,
    pub leading: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tally {
    pub total: i64,
    pub options: Vec<OptionTally>,
}

/// Aggregates raw option indexes into per-option counts.
///
/// Indexes without a matching option are skipped, so `total` always equals
/// the sum of the counts. Every option sharing a non-zero maximum is leading.
pub fn tally<I>(options: &[PollOption], option_indexes: I) -> Tally
where
    I: IntoIterator<Item = i32>,
{
    let mut counts = vec![0_i64; options.len()];
    for index in option_indexes {
        if let Some(count) = usize::try_from(index).ok().and_then(|i| counts.get_mut(i)) {
            *count += 1;
        }
    }
    let total: i64 = counts.iter().sum();
    let max = counts.iter().copied().max().unwrap_or(0);
    Tally {
        total,
        options: options
            .iter()
            .zip(counts)
            .map(|(option, count)| OptionTally {
                option_id: option.id.clone(),
                text: option.text.clone(),
                count,
                percentage: percentage(count, total),
                leading: max > 0 && count == max,
            })
            .collect(),
    }
}

fn percentage(count: i64, total: i64) -> u32 {
    if total == 0 {
        return 0;
    }
    (count as f64 / total as f64 * 100.0).round() as u32
}
