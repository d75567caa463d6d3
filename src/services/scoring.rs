use crate::state::session::Participant;

/// Points awarded for any correct answer before the time bonus.
pub const BASE_POINTS: u32 = 1_000;
/// Upper bound on the time bonus; an instant correct answer scores
/// `BASE_POINTS + MAX_TIME_BONUS`.
pub const MAX_TIME_BONUS: u32 = 1_000;

/// Compute the points for one answer.
///
/// Incorrect answers score zero. Correct answers earn the base plus a bonus
/// proportional to the time remaining when the answer arrived, so among two
/// correct answers the faster one never scores less.
pub fn score(correct: bool, latency_ms: u64, time_limit_ms: u64) -> u32 {
    if !correct {
        return 0;
    }

    if time_limit_ms == 0 {
        return BASE_POINTS;
    }

    let remaining = time_limit_ms.saturating_sub(latency_ms);
    let bonus = (u128::from(remaining) * u128::from(MAX_TIME_BONUS) / u128::from(time_limit_ms))
        .min(u128::from(MAX_TIME_BONUS)) as u32;

    BASE_POINTS + bonus
}

/// Order participants into the final ranking.
///
/// Score descending; ties broken by lower accumulated answer latency, then by
/// earlier join. The same rule the persistent leaderboard applies, so live
/// rankings and stored attempts agree.
pub fn rank(participants: &mut Vec<Participant>) {
    participants.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then(a.total_latency_ms.cmp(&b.total_latency_ms))
            .then(a.joined_at.cmp(&b.joined_at))
    });
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, SystemTime};

    use super::*;

    #[test]
    fn incorrect_answers_score_zero() {
        assert_eq!(score(false, 0, 20_000), 0);
        assert_eq!(score(false, 19_999, 20_000), 0);
    }

    #[test]
    fn correct_beats_incorrect_even_at_the_buzzer() {
        assert!(score(true, 20_000, 20_000) > score(false, 1, 20_000));
        assert_eq!(score(true, 20_000, 20_000), BASE_POINTS);
    }

    #[test]
    fn faster_correct_answers_never_score_less() {
        let limit = 20_000;
        let mut previous = u32::MAX;
        for latency in [0, 1, 500, 2_000, 10_000, 19_999, 20_000, 25_000] {
            let points = score(true, latency, limit);
            assert!(points <= previous, "latency {latency} scored {points} > {previous}");
            previous = points;
        }
    }

    #[test]
    fn instant_answer_earns_the_full_bonus() {
        assert_eq!(score(true, 0, 30_000), BASE_POINTS + MAX_TIME_BONUS);
    }

    #[test]
    fn bonus_is_proportional_to_remaining_time() {
        // 2s of a 20s window leaves 90% of the bonus on the table.
        assert_eq!(score(true, 2_000, 20_000), BASE_POINTS + 900);
        assert_eq!(score(true, 10_000, 20_000), BASE_POINTS + 500);
    }

    #[test]
    fn zero_time_limit_still_rewards_correctness() {
        assert_eq!(score(true, 1_234, 0), BASE_POINTS);
    }

    fn participant(name: &str, score: u32, total_latency_ms: u64, joined_at: SystemTime) -> Participant {
        let mut participant = Participant::new(name.into());
        participant.score = score;
        participant.total_latency_ms = total_latency_ms;
        participant.joined_at = joined_at;
        participant
    }

    #[test]
    fn ranking_sorts_by_score_then_latency_then_join_time() {
        let epoch = SystemTime::UNIX_EPOCH;
        let mut participants = vec![
            participant("Slow", 1_500, 9_000, epoch),
            participant("Late", 1_500, 4_000, epoch + Duration::from_secs(2)),
            participant("Early", 1_500, 4_000, epoch + Duration::from_secs(1)),
            participant("Top", 2_100, 12_000, epoch),
            participant("Zero", 0, 0, epoch),
        ];

        rank(&mut participants);

        let order: Vec<&str> = participants
            .iter()
            .map(|participant| participant.name.as_str())
            .collect();
        assert_eq!(order, vec!["Top", "Early", "Late", "Slow", "Zero"]);
    }
}
