/// A run of characters with its position in the prompt.
pub type Token = Vec<(usize, char)>;

/// Split the prompt into words, each carrying its trailing spaces, so a word
/// is never broken across lines and spaces stay attached to what precedes them.
pub fn tokens(chars: &[char]) -> Vec<Token> {
    let mut result = Vec::new();
    let mut current: Token = Vec::new();

    for (idx, &c) in chars.iter().enumerate() {
        current.push((idx, c));
        let next = chars.get(idx + 1);

        let ends_token = match next {
            None => true,
            Some(&n) => c == ' ' && n != ' ',
        };
        if ends_token {
            result.push(std::mem::take(&mut current));
        }
    }

    result
}

/// Greedy line fill over [`tokens`]. Tokens wider than the line get a line of
/// their own and are split by the renderer's wrap.
pub fn wrap_tokens(tokens: &[Token], max_width: usize) -> Vec<Vec<&Token>> {
    let mut lines: Vec<Vec<&Token>> = Vec::new();
    let mut line: Vec<&Token> = Vec::new();
    let mut width = 0;

    for token in tokens {
        let token_width = token_width(token);
        let visible_width = token_width - trailing_spaces(token);

        if !line.is_empty() && width + visible_width > max_width {
            lines.push(std::mem::take(&mut line));
            width = 0;
        }
        line.push(token);
        width += token_width;
    }

    if !line.is_empty() {
        lines.push(line);
    }
    lines
}

fn token_width(token: &Token) -> usize {
    token
        .iter()
        .map(|&(_, c)| unicode_width::UnicodeWidthChar::width(c).unwrap_or(0))
        .sum()
}

fn trailing_spaces(token: &Token) -> usize {
    token.iter().rev().take_while(|&&(_, c)| c == ' ').count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(text: &str) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        tokens(&chars)
            .into_iter()
            .map(|t| t.into_iter().map(|(_, c)| c).collect())
            .collect()
    }

    #[test]
    fn test_tokens_keep_trailing_spaces() {
        assert_eq!(words("cat sat on"), vec!["cat ", "sat ", "on"]);
    }

    #[test]
    fn test_tokens_group_repeated_spaces() {
        assert_eq!(words("a  b"), vec!["a  ", "b"]);
    }

    #[test]
    fn test_tokens_keep_positions() {
        let chars: Vec<char> = "ab cd".chars().collect();
        let toks = tokens(&chars);
        assert_eq!(toks[1], vec![(3, 'c'), (4, 'd')]);
    }

    #[test]
    fn test_tokens_leading_space_and_empty() {
        assert_eq!(words(" hi"), vec![" ", "hi"]);
        assert!(words("").is_empty());
    }

    #[test]
    fn test_wrap_never_splits_words() {
        let chars: Vec<char> = "the quick brown fox".chars().collect();
        let toks = tokens(&chars);
        let lines = wrap_tokens(&toks, 10);

        let rendered: Vec<String> = lines
            .iter()
            .map(|line| {
                line.iter()
                    .flat_map(|t| t.iter().map(|&(_, c)| c))
                    .collect()
            })
            .collect();
        assert_eq!(rendered, vec!["the quick ", "brown fox"]);
    }

    #[test]
    fn test_wrap_puts_long_word_on_own_line() {
        let chars: Vec<char> = "a extraordinarily b".chars().collect();
        let toks = tokens(&chars);
        let lines = wrap_tokens(&toks, 5);
        assert_eq!(lines.len(), 3);
    }
}
