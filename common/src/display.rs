use crate::config::DisplayLimits;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderedLines(Vec<String>);

impl RenderedLines {
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

pub fn truncate_chars(message: &str, max_chars: usize) -> &str {
    match message.char_indices().nth(max_chars) {
        Some((idx, _)) => &message[..idx],
        None => message,
    }
}

/// Greedy word wrap. Words longer than a line stay whole on their own line.
pub fn wrap_message(message: &str, limits: &DisplayLimits) -> RenderedLines {
    let message = truncate_chars(message, limits.max_chars);
    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut current_len = 0_usize;

    for word in message.split(' ') {
        let word_len = word.chars().count();
        let separator = usize::from(current_len > 0);

        if current_len + separator + word_len <= limits.chars_per_line {
            if separator == 1 {
                current.push(' ');
            }
            current.push_str(word);
            current_len += separator + word_len;
        } else {
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            current.push_str(word);
            current_len = word_len;
        }
    }

    if !current.is_empty() {
        lines.push(current);
    }

    lines.truncate(limits.max_lines);
    RenderedLines(lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn wrap(message: &str) -> Vec<String> {
        wrap_message(message, &DisplayLimits::default())
            .as_slice()
            .to_vec()
    }

    #[test]
    fn short_message_fits_one_line() {
        assert_eq!(wrap("HELLO WORLD"), vec!["HELLO WORLD"]);
    }

    #[test]
    fn empty_message_yields_no_lines() {
        assert!(wrap_message("", &DisplayLimits::default()).is_empty());
    }

    #[test]
    fn packs_words_greedily_up_to_line_width() {
        assert_eq!(
            wrap("the quick brown fox jumps over the lazy dog"),
            vec!["the quick brown", "fox jumps over", "the lazy dog"]
        );
    }

    #[test]
    fn line_may_reach_exactly_sixteen_characters() {
        assert_eq!(wrap("ABC DEFGHIJKLMNO PQ"), vec!["ABC DEFGHIJKLMNO", "PQ"]);
        assert_eq!(wrap("ABCDEFGHIJKLMNOP"), vec!["ABCDEFGHIJKLMNOP"]);
    }

    #[test]
    fn leading_full_width_word_does_not_open_an_empty_line() {
        assert_eq!(wrap("ABCDEFGHIJKLMNOP HI"), vec!["ABCDEFGHIJKLMNOP", "HI"]);
        assert_eq!(wrap("ABCDEFGHIJKLMNOPQ HI"), vec!["ABCDEFGHIJKLMNOPQ", "HI"]);
    }

    #[test]
    fn overlong_word_keeps_its_own_line_unsplit() {
        assert_eq!(
            wrap("HI ABCDEFGHIJKLMNOPQRSTU OK"),
            vec!["HI", "ABCDEFGHIJKLMNOPQRSTU", "OK"]
        );
    }

    #[test]
    fn output_is_bounded_to_four_lines() {
        let lines = wrap("aaaaaaaaaaaa bbbbbbbbbbbb cccccccccccc dddddddddddd eeee");

        assert_eq!(lines.len(), 4);
        assert_eq!(lines[3], "dddddddddddd");
    }

    #[test]
    fn long_messages_are_cut_to_sixty_four_characters_first() {
        let message = "x".repeat(10) + " " + &"y".repeat(80);
        let lines = wrap(&message);

        assert_eq!(lines, vec!["x".repeat(10), "y".repeat(53)]);
    }

    #[test]
    fn rejoined_lines_reproduce_the_word_sequence() {
        let messages = [
            "one two three four five six seven eight nine ten",
            "status OK temp nominal humidity nominal",
            "a b c d e f g h i j k l m n o p q r s t u v w x y z",
            "sixteen-chars-ok short",
        ];
        for message in messages {
            let lines = wrap(message);
            assert!(lines.len() <= 4);
            assert!(lines.iter().all(|line| line.chars().count() <= 16));

            let rejoined = lines.join(" ");
            let expected: Vec<&str> = message.split(' ').collect();
            let got: Vec<&str> = rejoined.split(' ').collect();
            assert_eq!(got, expected[..got.len()].to_vec());
        }
    }

    #[test]
    fn truncation_counts_characters_not_bytes() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }

    #[test]
    fn respects_custom_limits() {
        let limits = DisplayLimits {
            chars_per_line: 5,
            max_chars: 11,
            max_lines: 2,
        };
        let lines = wrap_message("ab cd ef gh ij", &limits);

        assert_eq!(lines.as_slice().to_vec(), vec!["ab cd", "ef gh"]);
    }
}
