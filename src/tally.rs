//! Instant-runoff tallying.
//!
//! Ballots are sequences of candidate indices, most preferred first. Entries
//! outside `[0, candidates)` (including the unset sentinel) are skipped, so the
//! tally accepts ballots that were never finalized.

/// Resolves a full ranking, winner first, by repeatedly eliminating the
/// candidate with the fewest first choices among those still standing.
///
/// Ties for fewest are broken by eliminating the lowest index. If no ballot
/// names a standing candidate, the standing candidates are ranked in index
/// order. Always returns a permutation of `0..candidates`.
pub fn instant_runoff<B: AsRef<[i32]>>(candidates: usize, ballots: &[B]) -> Vec<usize> {
    if candidates == 0 {
        return Vec::new();
    }
    if ballots.is_empty() {
        return (0..candidates).collect();
    }

    let mut eliminated = vec![false; candidates];
    let mut elimination_order = Vec::with_capacity(candidates);

    while elimination_order.len() + 1 < candidates {
        let counts = first_choices(candidates, ballots, &eliminated);

        if counts.iter().all(|&c| c == 0) {
            break;
        }

        let loser = (0..candidates)
            .filter(|&c| !eliminated[c])
            .min_by_key(|&c| (counts[c], c));
        match loser {
            Some(loser) => {
                eliminated[loser] = true;
                elimination_order.push(loser);
            }
            None => break,
        }
    }

    let mut ranking: Vec<usize> = (0..candidates).filter(|&c| !eliminated[c]).collect();
    ranking.extend(elimination_order.into_iter().rev());
    ranking
}

fn first_choices<B: AsRef<[i32]>>(candidates: usize, ballots: &[B], eliminated: &[bool]) -> Vec<usize> {
    let mut counts = vec![0usize; candidates];
    for ballot in ballots {
        let choice = ballot
            .as_ref()
            .iter()
            .filter_map(|&entry| candidate_index(entry, candidates))
            .find(|&c| !eliminated[c]);
        if let Some(c) = choice {
            counts[c] += 1;
        }
    }
    counts
}

fn candidate_index(entry: i32, candidates: usize) -> Option<usize> {
    if entry < 0 {
        return None;
    }
    let index = entry as usize;
    if index < candidates {
        Some(index)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{thread_rng, Rng};

    fn is_permutation(ranking: &[usize], n: usize) -> bool {
        let mut sorted = ranking.to_vec();
        sorted.sort_unstable();
        sorted == (0..n).collect::<Vec<_>>()
    }

    #[test]
    fn no_candidates() {
        let ballots: Vec<Vec<i32>> = vec![vec![0, 1]];
        assert_eq!(instant_runoff(0, &ballots), Vec::<usize>::new());
    }

    #[test]
    fn no_ballots_is_natural_order() {
        let ballots: Vec<Vec<i32>> = vec![];
        assert_eq!(instant_runoff(1, &ballots), vec![0]);
        assert_eq!(instant_runoff(3, &ballots), vec![0, 1, 2]);
    }

    #[test]
    fn single_candidate_single_ballot() {
        assert_eq!(instant_runoff(1, &[vec![0]]), vec![0]);
    }

    #[test]
    fn unanimous_winner() {
        let ballots = vec![vec![1, 0], vec![1, 0], vec![1, 0]];
        assert_eq!(instant_runoff(2, &ballots), vec![1, 0]);
    }

    #[test]
    fn two_way_tie_eliminates_lowest_index() {
        let ballots = vec![vec![0, 1], vec![1, 0]];
        assert_eq!(instant_runoff(2, &ballots), vec![1, 0]);
    }

    #[test]
    fn three_way_tie() {
        let ballots = vec![vec![0, 1, 2], vec![1, 2, 0], vec![2, 0, 1]];
        assert_eq!(instant_runoff(3, &ballots), vec![1, 2, 0]);
    }

    #[test]
    fn lowest_index_loses_tie_for_fewest() {
        let ballots = vec![
            vec![0, 1, 2],
            vec![0, 1, 2],
            vec![0, 2, 1],
            vec![1, 0, 2],
            vec![1, 2, 0],
            vec![2, 1, 0],
            vec![2, 1, 0],
        ];
        // Round 1: A=3 B=2 C=2, B goes and its ballots split between A and C.
        // Round 2: A=4 C=3, C goes.
        assert_eq!(instant_runoff(3, &ballots), vec![0, 2, 1]);
    }

    #[test]
    fn last_place_transfer_elects_second_choice() {
        let ballots = vec![
            vec![0, 2, 1],
            vec![0, 2, 1],
            vec![1, 2, 0],
            vec![1, 2, 0],
            vec![1, 2, 0],
            vec![2, 0, 1],
            vec![2, 0, 1],
            vec![2, 0, 1],
        ];
        // Round 1: A=2 B=3 C=3, A goes and transfers to C.
        // Round 2: B=3 C=5, B goes.
        assert_eq!(instant_runoff(3, &ballots), vec![2, 1, 0]);
    }

    #[test]
    fn sentinel_entries_are_skipped() {
        let ballots = vec![vec![-1, 1, -1], vec![-1, -1, -1]];
        // Round 1: B=1, A and C at 0, A goes. Round 2: B=1 C=0, C goes.
        assert_eq!(instant_runoff(3, &ballots), vec![1, 2, 0]);
    }

    #[test]
    fn all_ballots_exhausted_is_natural_order() {
        let ballots = vec![vec![-1, -1, -1], vec![7, 9, -3]];
        assert_eq!(instant_runoff(3, &ballots), vec![0, 1, 2]);
    }

    #[test]
    fn out_of_range_entries_are_skipped() {
        let ballots = vec![vec![5, 2, 0, 1]];
        assert_eq!(instant_runoff(3, &ballots), vec![2, 1, 0]);
    }

    #[test]
    fn four_candidates_cascade() {
        let ballots = vec![
            vec![3, 2, 1, 0],
            vec![3, 2, 1, 0],
            vec![2, 1, 0, 3],
            vec![2, 1, 0, 3],
            vec![1, 2, 0, 3],
            vec![0, 1, 2, 3],
        ];
        // Round 1: A=1 B=1 C=2 D=2, A goes and transfers to B.
        // Round 2: B=2 C=2 D=2, B goes and both move to C.
        // Round 3: C=4 D=2, D goes.
        assert_eq!(instant_runoff(4, &ballots), vec![2, 3, 1, 0]);
    }

    #[test]
    fn deterministic() {
        let ballots = vec![vec![2, 0, 1], vec![0, 2, 1], vec![1, -1, -1]];
        let first = instant_runoff(3, &ballots);
        for _ in 0..10 {
            assert_eq!(instant_runoff(3, &ballots), first);
        }
    }

    #[test]
    fn random_ballots_always_yield_permutation() {
        let mut rng = thread_rng();
        for _ in 0..200 {
            let n = rng.gen_range(0..8usize);
            let ballots: Vec<Vec<i32>> = (0..rng.gen_range(0..12))
                .map(|_| {
                    (0..rng.gen_range(0..10))
                        .map(|_| rng.gen_range(-2..10))
                        .collect()
                })
                .collect();
            let ranking = instant_runoff(n, &ballots);
            assert!(is_permutation(&ranking, n), "not a permutation: {:?} for n={}", ranking, n);
        }
    }
}
