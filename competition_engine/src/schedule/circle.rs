//! Circle-method pairing.
//!
//! With K slots (one synthetic bye added when the team count is odd) the
//! first slot stays put while the other K-1 rotate one position per
//! matchday. That yields K-1 matchdays in which every team meets every
//! other team exactly once.

/// Fixtures of a single round-robin cycle, one `Vec` per matchday.
///
/// The first element of each pair hosts. Pairings against the bye are
/// dropped, so with an odd team count one team rests on each matchday.
pub fn circle_pairings<T: Copy>(teams: &[T]) -> Vec<Vec<(T, T)>> {
    if teams.len() < 2 {
        return Vec::new();
    }

    let mut slots: Vec<Option<T>> = teams.iter().copied().map(Some).collect();
    if slots.len() % 2 == 1 {
        slots.push(None);
    }

    let slot_count = slots.len();
    let half = slot_count / 2;
    let fixed = slots[0];
    let mut rotating: Vec<Option<T>> = slots[1..].to_vec();
    let mut matchdays = Vec::with_capacity(slot_count - 1);

    for _ in 0..slot_count - 1 {
        let home = std::iter::once(fixed).chain(rotating[..half - 1].iter().copied());
        let away = rotating[half - 1..].iter().rev().copied();

        let fixtures = home
            .zip(away)
            .filter_map(|(a, b)| Some((a?, b?)))
            .collect();
        matchdays.push(fixtures);

        rotating.rotate_right(1);
    }

    matchdays
}

/// Fixtures produced for `team_count` teams over `cycles` cycles
pub fn fixture_count(team_count: usize, cycles: u8) -> usize {
    team_count * team_count.saturating_sub(1) / 2 * cycles as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_four_teams() {
        let days = circle_pairings(&[1, 2, 3, 4]);
        assert_eq!(days.len(), 3);
        assert_eq!(days[0], vec![(1, 4), (2, 3)]);
        assert!(days.iter().all(|d| d.len() == 2));
    }

    #[test]
    fn test_odd_count_gives_each_team_one_rest() {
        let teams = [1, 2, 3, 4, 5];
        let days = circle_pairings(&teams);
        assert_eq!(days.len(), 5);

        for team in teams {
            let rests = days
                .iter()
                .filter(|d| !d.iter().any(|&(a, b)| a == team || b == team))
                .count();
            assert_eq!(rests, 1, "team {team} should rest once");
        }
    }

    #[test]
    fn test_every_pair_meets_once() {
        let teams: Vec<u32> = (0..10).collect();
        let mut seen = HashSet::new();
        for (a, b) in circle_pairings(&teams).into_iter().flatten() {
            assert!(seen.insert((a.min(b), a.max(b))));
        }
        assert_eq!(seen.len(), fixture_count(10, 1));
    }

    #[test]
    fn test_degenerate_inputs() {
        assert!(circle_pairings::<u8>(&[]).is_empty());
        assert!(circle_pairings(&[7]).is_empty());
        assert_eq!(circle_pairings(&[7, 9]), vec![vec![(7, 9)]]);
    }

    #[test]
    fn test_fixture_count() {
        assert_eq!(fixture_count(4, 1), 6);
        assert_eq!(fixture_count(5, 2), 20);
        assert_eq!(fixture_count(1, 2), 0);
    }
}
