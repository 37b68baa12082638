//! String similarity for "did you mean?" repairs

/// Levenshtein distance (case-insensitive)
pub fn edit_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.to_lowercase().chars().collect();
    let b: Vec<char> = b.to_lowercase().chars().collect();

    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    // Two rolling rows instead of the full matrix
    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0usize; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        current[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            current[j + 1] = (previous[j + 1] + 1) // deletion
                .min(current[j] + 1) // insertion
                .min(previous[j] + cost); // substitution
        }
        std::mem::swap(&mut previous, &mut current);
    }

    previous[b.len()]
}

/// Largest edit distance still worth suggesting: half the longer name
pub fn suggestion_distance(a: &str, b: &str) -> usize {
    a.chars().count().max(b.chars().count()) / 2
}

/// Candidate with the smallest edit distance to `target`, among those within
/// [`suggestion_distance`].
///
/// Ties go to the earliest candidate, so results follow registry order.
pub fn closest_match<'a, I>(target: &str, candidates: I) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    candidates
        .into_iter()
        .map(|candidate| (edit_distance(target, candidate), candidate))
        .filter(|(distance, candidate)| *distance <= suggestion_distance(target, candidate))
        .min_by_key(|(distance, _)| *distance)
        .map(|(_, candidate)| candidate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edit_distance_exact_match() {
        assert_eq!(edit_distance("send-email", "send-email"), 0);
        assert_eq!(edit_distance("Send-Email", "send-email"), 0);
    }

    #[test]
    fn test_edit_distance_basic_edits() {
        assert_eq!(edit_distance("kitten", "sitting"), 3);
        assert_eq!(edit_distance("", "abc"), 3);
        assert_eq!(edit_distance("abc", ""), 3);
        assert_eq!(edit_distance("get-usr", "get-user"), 1);
    }

    #[test]
    fn test_closest_match_prefers_smallest_distance() {
        let names = ["get-user", "send-email", "send-sms"];
        assert_eq!(closest_match("sendemail", names), Some("send-email"));
        assert_eq!(closest_match("get_users", names), Some("get-user"));
    }

    #[test]
    fn test_closest_match_rejects_unrelated_names() {
        let names = ["get-user", "send-email", "send-sms"];
        assert_eq!(closest_match("stripe-charge", names), None);
        assert_eq!(closest_match("x", names), None);
        // Exactly half the longer name is still accepted
        assert_eq!(suggestion_distance("send-sms", "send-xxxx"), 4);
        assert_eq!(closest_match("send-xxxx", ["send-sms"]), Some("send-sms"));
    }

    #[test]
    fn test_closest_match_ties_follow_order() {
        assert_eq!(closest_match("ab", ["aa", "bb"]), Some("aa"));
        assert_eq!(closest_match("x", Vec::<&str>::new()), None);
    }
}
