pub mod dashboard;
pub mod set_detail;
pub mod sets;

use crate::srs::MAX_LEVEL;

pub(crate) fn level_bar(level: i64) -> String {
    let filled = level.clamp(0, MAX_LEVEL) as usize;
    let empty = MAX_LEVEL as usize - filled;
    format!("{}{}", "█".repeat(filled), "░".repeat(empty))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_bar_fills_by_level() {
        assert_eq!(level_bar(3), "███░░░░░░");
        assert_eq!(level_bar(9), "█████████");
    }

    #[test]
    fn level_bar_clamps_out_of_range() {
        assert_eq!(level_bar(0), "░░░░░░░░░");
        assert_eq!(level_bar(20), "█████████");
    }
}
